//! Convert JSON exports of the content tables into a replayable dump.
//!
//! Accepts `{"messages": [...]}` and `{"memories": [...]}` as produced by the
//! old hosted deployment's export endpoints. The output has the same shape as
//! [`crate::backup::write_dump`] output, so `restore_if_empty` can consume it.

use std::fs;
use std::path::Path;

use celebration_common::Result;
use rusqlite::types::Value;
use serde::Deserialize;
use tracing::{info, warn};

use crate::backup::write_header;
use crate::sql::{insert_statement, value_literal};

#[derive(Debug, Default, Deserialize)]
struct MessagesExport {
    #[serde(default)]
    messages: Vec<ExportedMessage>,
}

#[derive(Debug, Default, Deserialize)]
struct MemoriesExport {
    #[serde(default)]
    memories: Vec<ExportedMemory>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportedMessage {
    pub name: Option<String>,
    pub relationship: Option<String>,
    pub message: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportedMemory {
    pub name: Option<String>,
    pub caption: Option<String>,
    pub image_url: Option<String>,
    pub cloudinary_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub storage_type: Option<String>,
    pub file_size: Option<i64>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ImportScript {
    pub script: String,
    pub messages: usize,
    pub memories: usize,
    /// Per-file problems; a failed file contributes no rows.
    pub errors: Vec<String>,
}

/// Read both export files and render the dump. A missing or malformed file
/// is logged and skipped so the other can still be converted.
pub fn convert_files(messages_path: &Path, memories_path: &Path) -> Result<ImportScript> {
    let mut errors = Vec::new();

    let messages = match read_export::<MessagesExport>(messages_path) {
        Ok(export) => export.messages,
        Err(e) => {
            warn!("skipping messages export {}: {e}", messages_path.display());
            errors.push(format!("{}: {e}", messages_path.display()));
            Vec::new()
        }
    };
    let memories = match read_export::<MemoriesExport>(memories_path) {
        Ok(export) => export.memories,
        Err(e) => {
            warn!("skipping memories export {}: {e}", memories_path.display());
            errors.push(format!("{}: {e}", memories_path.display()));
            Vec::new()
        }
    };

    let mut script = render(&messages, &memories)?;
    script.errors = errors;
    info!(
        "converted {} messages and {} memories from JSON",
        script.messages, script.memories
    );
    Ok(script)
}

fn read_export<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Render already-parsed exports as a dump script.
pub fn render(messages: &[ExportedMessage], memories: &[ExportedMemory]) -> Result<ImportScript> {
    let mut out = Vec::new();
    write_header(&mut out, "Celebration Database Backup (from JSON exports)")?;

    let mut script = String::from_utf8_lossy(&out).into_owned();

    for msg in messages {
        let mut row = vec![
            ("name", text_or_empty(&msg.name)),
            ("relationship", text_or_empty(&msg.relationship)),
            ("message", text_or_empty(&msg.message)),
        ];
        push_created_at(&mut row, &msg.created_at);
        push_insert(&mut script, "messages", &row);
    }
    script.push('\n');

    for mem in memories {
        let mut row = vec![
            ("name", text_or_empty(&mem.name)),
            ("caption", text_or_empty(&mem.caption)),
            ("image_url", text_or_empty(&mem.image_url)),
            ("cloudinary_id", text_or_empty(&mem.cloudinary_id)),
            ("type", text_or(&mem.kind, "photo")),
            ("storage_type", text_or(&mem.storage_type, "cloudinary")),
            ("file_size", Value::Integer(mem.file_size.unwrap_or(0))),
        ];
        push_created_at(&mut row, &mem.created_at);
        push_insert(&mut script, "memories", &row);
    }

    script.push_str("\nCOMMIT;\n");

    Ok(ImportScript {
        script,
        messages: messages.len(),
        memories: memories.len(),
        errors: Vec::new(),
    })
}

fn text_or_empty(value: &Option<String>) -> Value {
    Value::Text(value.clone().unwrap_or_default())
}

fn text_or(value: &Option<String>, fallback: &str) -> Value {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Value::Text(v.to_string()),
        _ => Value::Text(fallback.to_string()),
    }
}

/// Rows without a timestamp leave `created_at` to the column default.
fn push_created_at(row: &mut Vec<(&'static str, Value)>, created_at: &Option<String>) {
    if let Some(ts) = created_at.as_deref().filter(|ts| !ts.is_empty()) {
        row.push(("created_at", Value::Text(ts.to_string())));
    }
}

fn push_insert(script: &mut String, table: &str, row: &[(&'static str, Value)]) {
    let columns: Vec<&str> = row.iter().map(|(column, _)| *column).collect();
    let values: Vec<String> = row.iter().map(|(_, value)| value_literal(value)).collect();
    script.push_str(&insert_statement(table, &columns, &values));
    script.push('\n');
}
