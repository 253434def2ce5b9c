pub mod backup;
pub mod boot;
pub mod content;
pub mod json_import;
pub mod migrations;
pub mod sql;
pub mod store;

pub use backup::{
    BackupRestorer, DumpSummary, RestorationOutcome, RestorationStatus, SkipReason, create_dump,
    default_dump_path, write_dump,
};
pub use boot::{BootReport, auto_restore_backup_on_init, boot, run_migrations};
pub use migrations::{
    ColumnDefault, ColumnFailure, ColumnSpec, ColumnType, MigrationReport, SchemaMigrator,
};
pub use store::{ContentCounts, Store};
