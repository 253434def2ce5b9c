use std::path::Path;
use std::time::Duration;

use celebration_common::{Error, Result};
use rusqlite::Connection;
use serde::Serialize;
use tracing::debug;

use crate::sql::{quote_identifier, validate_identifier};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Tables whose rows make up the guest-submitted content a dump carries, in dump order.
pub const CONTENT_TABLES: [&str; 2] = ["messages", "memories"];

/// Base shape of every table. `memories` deliberately lacks the columns
/// [`crate::SchemaMigrator::memories`] adds, so older databases and fresh ones
/// converge through the same migration.
pub const BASE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        relationship TEXT,
        message TEXT NOT NULL,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS memories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        caption TEXT,
        image_url TEXT NOT NULL,
        cloudinary_id TEXT,
        type TEXT DEFAULT 'photo',
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS donations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        donor_name TEXT NOT NULL,
        donor_email TEXT NOT NULL,
        amount REAL NOT NULL,
        charity_id TEXT,
        charity_name TEXT,
        message TEXT,
        stripe_payment_id TEXT UNIQUE,
        status TEXT DEFAULT 'pending',
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS cancellations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        email TEXT NOT NULL,
        phone TEXT,
        request_type TEXT NOT NULL,
        number_of_guests INTEGER,
        reason TEXT NOT NULL,
        zoom_interest BOOLEAN DEFAULT 0,
        future_updates BOOLEAN DEFAULT 0,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS gallery_folders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT UNIQUE NOT NULL,
        display_name TEXT NOT NULL,
        icon TEXT DEFAULT 'fa-folder',
        gradient TEXT DEFAULT 'folder-solo',
        description TEXT,
        image_count INTEGER DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS gallery_images (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        folder_name TEXT NOT NULL,
        image_url TEXT NOT NULL,
        cloudinary_id TEXT,
        order_index INTEGER DEFAULT 0,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (folder_name) REFERENCES gallery_folders(name)
    );
";

/// Row counts of the two content tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContentCounts {
    pub messages: i64,
    pub memories: i64,
}

impl ContentCounts {
    pub fn is_empty(&self) -> bool {
        self.messages == 0 && self.memories == 0
    }

    pub fn total(&self) -> i64 {
        self.messages + self.memories
    }
}

/// An owned handle on the SQLite database. Each boot step and each request
/// opens its own and drops it when done; nothing is shared process-wide.
pub struct Store {
    conn: Connection,
    location: String,
}

impl Store {
    pub fn open(db_path: &Path) -> Result<Self> {
        debug!("opening store at {}", db_path.display());
        let conn = Connection::open(db_path).map_err(|e| {
            Error::StoreUnreachable(format!("failed to open {}: {e}", db_path.display()))
        })?;

        Self::configure(conn, db_path.display().to_string())
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            Error::StoreUnreachable(format!("failed to open in-memory database: {e}"))
        })?;

        Self::configure(conn, ":memory:".to_string())
    }

    fn configure(conn: Connection, location: String) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| Error::StoreUnreachable(format!("failed to set busy timeout: {e}")))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::StoreUnreachable(format!("failed to set pragmas: {e}")))?;

        Ok(Self { conn, location })
    }

    /// Create any missing table in its base shape.
    pub fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(BASE_SCHEMA)
            .map_err(|e| Error::Database(format!("failed to create base schema: {e}")))
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub fn live_columns(&self, table: &str) -> Result<Vec<String>> {
        live_columns(&self.conn, table)
    }

    pub fn row_count(&self, table: &str) -> Result<i64> {
        row_count(&self.conn, table)
    }

    pub fn content_counts(&self) -> Result<ContentCounts> {
        content_counts(&self.conn)
    }

    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| Error::Database(format!("failed to close {}: {e}", self.location)))
    }
}

/// Ordered column names of `table` as SQLite reports them. Empty when the
/// table does not exist.
pub fn live_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    validate_identifier(table)?;
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({})", quote_identifier(table)))
        .map_err(|e| Error::StoreUnreachable(format!("failed to introspect {table}: {e}")))?;

    stmt.query_map([], |row| row.get::<_, String>(1))
        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
        .map_err(|e| Error::StoreUnreachable(format!("failed to read columns of {table}: {e}")))
}

pub fn row_count(conn: &Connection, table: &str) -> Result<i64> {
    validate_identifier(table)?;
    conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", quote_identifier(table)),
        [],
        |row| row.get(0),
    )
    .map_err(|e| Error::Database(format!("failed to count rows in {table}: {e}")))
}

pub fn content_counts(conn: &Connection) -> Result<ContentCounts> {
    Ok(ContentCounts {
        messages: row_count(conn, "messages")?,
        memories: row_count(conn, "memories")?,
    })
}
