//! Startup restoration from a SQL dump, and creation of new dumps.
//!
//! A dump is UTF-8 text: a comment header, `BEGIN TRANSACTION;`, one `INSERT`
//! per row of `messages` then `memories`, and `COMMIT;`. Restoration only ever
//! populates an empty store; it never merges into existing rows.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use celebration_common::{Error, Result};
use chrono::Local;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::sql::{insert_statement, quote_identifier, split_statements, sql_literal};
use crate::store::{CONTENT_TABLES, ContentCounts, content_counts, live_columns};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoBackup,
    AlreadyPopulated,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoBackup => f.write_str("no backup file"),
            Self::AlreadyPopulated => f.write_str("database already has data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RestorationOutcome {
    Skipped { reason: SkipReason },
    Restored { messages: i64, memories: i64 },
    Failed { error: String },
}

impl RestorationOutcome {
    pub fn records_restored(&self) -> i64 {
        match self {
            Self::Restored { messages, memories } => messages + memories,
            _ => 0,
        }
    }
}

/// What an operations endpoint reports about the boot-time restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestorationStatus {
    pub backup_exists: bool,
    pub records_restored: i64,
    pub dump_location: PathBuf,
    pub store_location: String,
    pub outcome: RestorationOutcome,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DumpSummary {
    pub messages: usize,
    pub memories: usize,
}

#[derive(Debug, Clone)]
pub struct BackupRestorer {
    store_location: String,
    dump_path: PathBuf,
}

impl BackupRestorer {
    pub fn new(store_location: impl Into<String>, dump_path: impl Into<PathBuf>) -> Self {
        Self {
            store_location: store_location.into(),
            dump_path: dump_path.into(),
        }
    }

    pub fn backup_exists(&self) -> bool {
        self.dump_path.is_file()
    }

    /// Replay the dump if, and only if, both content tables are empty.
    /// Never returns an error: failures are logged and reported as
    /// [`RestorationOutcome::Failed`] with the store rolled back.
    pub fn restore_if_empty(&self, conn: &mut Connection) -> RestorationOutcome {
        if !self.backup_exists() {
            info!(
                "no backup file at {} - skipping restoration",
                self.dump_path.display()
            );
            return RestorationOutcome::Skipped {
                reason: SkipReason::NoBackup,
            };
        }

        let counts = match content_counts(conn) {
            Ok(counts) => counts,
            Err(e) => {
                error!("failed to check whether restore is needed: {e}");
                return RestorationOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        if !counts.is_empty() {
            info!(
                "database already has data (messages: {}, memories: {}) - skipping restore",
                counts.messages, counts.memories
            );
            return RestorationOutcome::Skipped {
                reason: SkipReason::AlreadyPopulated,
            };
        }

        info!(
            "database is empty and {} exists - restoring",
            self.dump_path.display()
        );
        let started = Instant::now();
        match self.replay(conn) {
            Ok(restored) => {
                info!(
                    "backup restoration completed in {:.2}s: {} messages + {} memories",
                    started.elapsed().as_secs_f64(),
                    restored.messages,
                    restored.memories
                );
                RestorationOutcome::Restored {
                    messages: restored.messages,
                    memories: restored.memories,
                }
            }
            Err(e) => {
                error!(
                    "backup restoration from {} failed: {e}",
                    self.dump_path.display()
                );
                RestorationOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    fn replay(&self, conn: &mut Connection) -> Result<ContentCounts> {
        let script = fs::read_to_string(&self.dump_path)?;
        replay_dump(conn, &script)?;
        content_counts(conn)
    }

    pub fn status(&self, outcome: RestorationOutcome) -> RestorationStatus {
        RestorationStatus {
            backup_exists: self.backup_exists(),
            records_restored: outcome.records_restored(),
            dump_location: self.dump_path.clone(),
            store_location: self.store_location.clone(),
            outcome,
        }
    }
}

/// Statement-level classification of transaction markers inside a dump.
#[derive(Debug, PartialEq, Eq)]
enum Marker {
    Begin,
    Commit,
    Rollback,
}

fn marker(statement: &str) -> Option<Marker> {
    let upper = statement.to_ascii_uppercase();
    let words: Vec<&str> = upper.split_whitespace().collect();
    match words.as_slice() {
        ["BEGIN", ..] => Some(Marker::Begin),
        ["COMMIT"] | ["COMMIT", "TRANSACTION"] | ["END"] | ["END", "TRANSACTION"] => {
            Some(Marker::Commit)
        }
        ["ROLLBACK", ..] => Some(Marker::Rollback),
        _ => None,
    }
}

/// Split a dump into the statements to run, stripping its BEGIN/COMMIT
/// markers. A BEGIN with no closing COMMIT means the file was cut short.
pub fn parse_dump(script: &str) -> Result<Vec<String>> {
    let mut body = Vec::new();
    let mut opened = false;
    let mut closed = false;

    for statement in split_statements(script)? {
        if closed {
            return Err(Error::DumpParse(format!(
                "statement after COMMIT: {statement}"
            )));
        }
        match marker(&statement) {
            Some(Marker::Begin) if opened => {
                return Err(Error::DumpParse("nested BEGIN".into()));
            }
            Some(Marker::Begin) => opened = true,
            Some(Marker::Commit) if !opened => {
                return Err(Error::DumpParse("COMMIT without BEGIN".into()));
            }
            Some(Marker::Commit) => closed = true,
            Some(Marker::Rollback) => {
                return Err(Error::DumpParse("dump contains ROLLBACK".into()));
            }
            None => body.push(statement),
        }
    }

    if opened && !closed {
        return Err(Error::DumpParse(
            "dump ends without COMMIT; file is truncated".into(),
        ));
    }

    Ok(body)
}

/// Execute a whole dump as one transaction. Nothing is kept on any error.
pub fn replay_dump(conn: &mut Connection, script: &str) -> Result<usize> {
    let statements = parse_dump(script)?;
    let tx = conn
        .transaction()
        .map_err(|e| Error::Database(format!("failed to begin restore: {e}")))?;

    for (idx, statement) in statements.iter().enumerate() {
        tx.execute_batch(statement).map_err(|e| {
            Error::Database(format!("dump statement {} failed: {e}", idx + 1))
        })?;
    }

    tx.commit()
        .map_err(|e| Error::Database(format!("failed to commit restore: {e}")))?;
    Ok(statements.len())
}

/// `backup_YYYYmmdd_HHMMSS.sql` under `dir`, or the working directory.
pub fn default_dump_path(dir: Option<&Path>) -> PathBuf {
    let name = Local::now().format("backup_%Y%m%d_%H%M%S.sql").to_string();
    match dir {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

/// Write a dump of both content tables, logging instead of returning the error.
pub fn create_dump(conn: &Connection, output: &Path) -> bool {
    info!("creating backup at {}", output.display());
    match write_dump(conn, output) {
        Ok(summary) => {
            info!(
                "backup created at {} ({} messages, {} memories)",
                output.display(),
                summary.messages,
                summary.memories
            );
            true
        }
        Err(e) => {
            error!("failed to create backup at {}: {e}", output.display());
            false
        }
    }
}

/// Write a dump to a sibling temp file and rename it over `output` once complete.
pub fn write_dump(conn: &Connection, output: &Path) -> Result<DumpSummary> {
    let tmp = temp_path(output);
    let result = write_dump_to(conn, &tmp).and_then(|summary| {
        fs::rename(&tmp, output)?;
        Ok(summary)
    });

    if result.is_err() && tmp.exists() {
        if let Err(e) = fs::remove_file(&tmp) {
            warn!("failed to remove partial dump {}: {e}", tmp.display());
        }
    }
    result
}

fn temp_path(output: &Path) -> PathBuf {
    let mut name = output.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    output.with_file_name(name)
}

fn write_dump_to(conn: &Connection, path: &Path) -> Result<DumpSummary> {
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);

    write_header(&mut out, "Database Backup")?;

    // One read transaction so both tables come from the same snapshot.
    let snapshot = conn
        .unchecked_transaction()
        .map_err(|e| Error::Dump(format!("failed to open read snapshot: {e}")))?;

    let mut summary = DumpSummary::default();
    for table in CONTENT_TABLES {
        let rows = dump_table(&snapshot, table, &mut out)?;
        writeln!(out)?;
        match table {
            "messages" => summary.messages = rows,
            _ => summary.memories = rows,
        }
    }

    snapshot
        .commit()
        .map_err(|e| Error::Dump(format!("failed to close read snapshot: {e}")))?;

    writeln!(out, "COMMIT;")?;
    let file = out
        .into_inner()
        .map_err(|e| Error::Dump(format!("failed to flush dump: {e}")))?;
    file.sync_all()?;

    Ok(summary)
}

pub(crate) fn write_header<W: Write>(out: &mut W, title: &str) -> Result<()> {
    writeln!(out, "-- {title}")?;
    writeln!(out, "-- Generated: {}", Local::now().to_rfc3339())?;
    writeln!(out)?;
    writeln!(out, "BEGIN TRANSACTION;")?;
    writeln!(out)?;
    Ok(())
}

fn dump_table<W: Write>(conn: &Connection, table: &str, out: &mut W) -> Result<usize> {
    let columns = live_columns(conn, table)?;
    if columns.is_empty() {
        return Err(Error::Dump(format!("table {table} does not exist")));
    }

    let select_list = columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");
    let order = if columns.iter().any(|c| c == "created_at") {
        " ORDER BY created_at DESC, rowid DESC"
    } else {
        " ORDER BY rowid DESC"
    };
    let query = format!(
        "SELECT {select_list} FROM {}{order}",
        quote_identifier(table)
    );

    let mut stmt = conn
        .prepare(&query)
        .map_err(|e| Error::Database(format!("failed to read {table}: {e}")))?;
    let mut rows = stmt
        .query([])
        .map_err(|e| Error::Database(format!("failed to read {table}: {e}")))?;

    let mut count = 0;
    while let Some(row) = rows
        .next()
        .map_err(|e| Error::Database(format!("failed to read {table}: {e}")))?
    {
        let values = (0..columns.len())
            .map(|idx| row.get_ref(idx).map(sql_literal))
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Database(format!("failed to read {table} row: {e}")))?;
        writeln!(out, "{}", insert_statement(table, &columns, &values))?;
        count += 1;
    }

    Ok(count)
}
