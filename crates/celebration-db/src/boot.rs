//! Process boot hooks: migrate first, then restore, then the server may listen.
//!
//! Each step opens its own [`Store`] and closes it before returning, so no
//! connection outlives the boot sequence.

use std::path::Path;

use celebration_common::Result;
use celebration_config::DatabaseConfig;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::backup::{BackupRestorer, RestorationOutcome, RestorationStatus};
use crate::migrations::{MigrationReport, SchemaMigrator};
use crate::store::Store;

#[derive(Debug, Clone, Serialize)]
pub struct BootReport {
    pub migration: MigrationReport,
    pub restoration: RestorationStatus,
}

/// Ensure the base tables exist and `memories` has every expected column.
/// An unreachable store is an error the caller should treat as fatal.
pub fn run_migrations(store_path: &Path) -> Result<MigrationReport> {
    let mut store = Store::open(store_path)?;
    store.init_schema()?;

    let report = SchemaMigrator::memories().apply(store.connection_mut())?;
    report.log_summary();

    store.close()?;
    Ok(report)
}

/// Repopulate an empty store from `dump_path`. Never fails the boot: any
/// problem is logged and carried in the returned status.
pub fn auto_restore_backup_on_init(store_path: &Path, dump_path: &Path) -> RestorationStatus {
    let restorer = BackupRestorer::new(store_path.display().to_string(), dump_path);

    let outcome = match Store::open(store_path) {
        Ok(mut store) => {
            let outcome = restorer.restore_if_empty(store.connection_mut());
            if let Err(e) = store.close() {
                warn!("failed to close store after restoration: {e}");
            }
            outcome
        }
        Err(e) => {
            error!("failed to open store for restoration: {e}");
            RestorationOutcome::Failed {
                error: e.to_string(),
            }
        }
    };

    match &outcome {
        RestorationOutcome::Restored { .. } => {
            info!("backup data successfully integrated into database");
        }
        RestorationOutcome::Failed { .. } => {
            warn!("backup restoration failed, continuing with empty database");
        }
        RestorationOutcome::Skipped { reason } => {
            info!("backup restoration skipped: {reason}");
        }
    }

    restorer.status(outcome)
}

/// Run the whole boot sequence in order.
pub fn boot(config: &DatabaseConfig) -> Result<BootReport> {
    let migration = run_migrations(&config.path)?;
    let restoration = auto_restore_backup_on_init(&config.path, &config.backup_path);
    Ok(BootReport {
        migration,
        restoration,
    })
}
