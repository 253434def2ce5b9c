//! Additive schema migration driven by the live table definition.
//!
//! There is no migration-version ledger: every boot re-reads the live columns,
//! diffs them against the declared [`ColumnSpec`] set and adds what is missing.
//! Columns are only ever added, never dropped or renamed.

use celebration_common::{Error, Result};
use rusqlite::types::Value;
use rusqlite::{Connection, Transaction};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::sql::{quote_identifier, validate_identifier, value_literal};
use crate::store::live_columns;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Boolean,
}

impl ColumnType {
    fn as_sql(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
            Self::Boolean => "BOOLEAN",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnDefault {
    Text(String),
    Integer(i64),
    Boolean(bool),
}

impl ColumnDefault {
    fn to_sql(&self) -> String {
        let value = match self {
            Self::Text(s) => Value::Text(s.clone()),
            Self::Integer(i) => Value::Integer(*i),
            Self::Boolean(b) => Value::Integer(i64::from(*b)),
        };
        value_literal(&value)
    }
}

/// Desired shape of one optional column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
    pub default: Option<ColumnDefault>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            default: None,
        }
    }

    pub fn with_default(mut self, default: ColumnDefault) -> Self {
        self.default = Some(default);
        self
    }

    fn add_column_sql(&self, table: &str) -> String {
        let mut sql = format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            quote_identifier(table),
            quote_identifier(&self.name),
            self.column_type.as_sql()
        );
        if let Some(default) = &self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default.to_sql());
        }
        sql
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ColumnFailure {
    pub column: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MigrationReport {
    pub table: String,
    pub added: Vec<String>,
    pub failed: Vec<ColumnFailure>,
    /// Rows touched by default backfill across all added columns.
    pub backfilled_rows: usize,
    /// True when at least one column was added and committed.
    pub applied: bool,
    /// Live schema re-read after the migration.
    pub final_columns: Vec<String>,
}

impl MigrationReport {
    fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            added: Vec::new(),
            failed: Vec::new(),
            backfilled_rows: 0,
            applied: false,
            final_columns: Vec::new(),
        }
    }

    pub fn log_summary(&self) {
        if self.applied {
            info!(
                "migrated {}: added [{}], {} row(s) backfilled",
                self.table,
                self.added.join(", "),
                self.backfilled_rows
            );
        } else if self.failed.is_empty() {
            info!("{} schema already up to date", self.table);
        }
        for failure in &self.failed {
            warn!(
                "could not add {}.{}: {}",
                self.table, failure.column, failure.error
            );
        }
        debug!("{} columns: {}", self.table, self.final_columns.join(", "));
    }
}

/// Brings one table up to a declared set of optional columns.
#[derive(Debug, Clone)]
pub struct SchemaMigrator {
    table: String,
    desired: Vec<ColumnSpec>,
}

impl SchemaMigrator {
    pub fn new(table: impl Into<String>, desired: Vec<ColumnSpec>) -> Self {
        Self {
            table: table.into(),
            desired,
        }
    }

    /// The application's target shape for `memories`.
    pub fn memories() -> Self {
        Self::new(
            "memories",
            vec![
                ColumnSpec::new("storage_type", ColumnType::Text)
                    .with_default(ColumnDefault::Text("cloudinary".to_string())),
                ColumnSpec::new("file_size", ColumnType::Integer),
            ],
        )
    }

    /// Desired columns absent from `live`, by exact name.
    pub fn plan<'a>(&'a self, live: &[String]) -> Vec<&'a ColumnSpec> {
        self.desired
            .iter()
            .filter(|spec| !live.iter().any(|name| name == &spec.name))
            .collect()
    }

    /// Add every missing column. Failing to introspect the table is fatal;
    /// a column that cannot be added is recorded and the rest still run.
    /// All additions commit together at the end.
    pub fn apply(&self, conn: &mut Connection) -> Result<MigrationReport> {
        let live = live_columns(conn, &self.table)?;
        if live.is_empty() {
            return Err(Error::Migration(format!(
                "table {} does not exist",
                self.table
            )));
        }
        debug!("{} live columns: {}", self.table, live.join(", "));

        let mut report = MigrationReport::new(&self.table);
        let pending = self.plan(&live);

        if pending.is_empty() {
            report.final_columns = live;
            return Ok(report);
        }

        let mut tx = conn
            .transaction()
            .map_err(|e| Error::Database(format!("failed to begin migration: {e}")))?;

        for spec in pending {
            match add_column(&mut tx, &self.table, spec) {
                Ok(backfilled) => {
                    info!("added column {}.{}", self.table, spec.name);
                    report.added.push(spec.name.clone());
                    report.backfilled_rows += backfilled;
                }
                Err(e) => {
                    warn!("failed to add column {}.{}: {e}", self.table, spec.name);
                    report.failed.push(ColumnFailure {
                        column: spec.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if report.added.is_empty() {
            tx.rollback()
                .map_err(|e| Error::Database(format!("failed to end migration: {e}")))?;
        } else {
            tx.commit()
                .map_err(|e| Error::Migration(format!("failed to commit migration: {e}")))?;
            report.applied = true;
        }

        report.final_columns = live_columns(conn, &self.table)?;
        Ok(report)
    }
}

/// Add one column inside its own savepoint, then backfill its default onto
/// rows where it is unset. Returns the number of backfilled rows.
fn add_column(tx: &mut Transaction<'_>, table: &str, spec: &ColumnSpec) -> Result<usize> {
    validate_identifier(&spec.name)?;

    let sp = tx
        .savepoint()
        .map_err(|e| Error::Database(format!("failed to open savepoint: {e}")))?;

    sp.execute_batch(&spec.add_column_sql(table))
        .map_err(|e| Error::Database(e.to_string()))?;

    let backfilled = match &spec.default {
        Some(default) => {
            let column = quote_identifier(&spec.name);
            sp.execute(
                &format!(
                    "UPDATE {} SET {column} = {} WHERE {column} IS NULL",
                    quote_identifier(table),
                    default.to_sql()
                ),
                [],
            )
            .map_err(|e| Error::Database(format!("backfill failed: {e}")))?
        }
        None => 0,
    };

    sp.commit()
        .map_err(|e| Error::Database(format!("failed to release savepoint: {e}")))?;
    Ok(backfilled)
}
