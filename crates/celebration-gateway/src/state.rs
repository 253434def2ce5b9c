use std::path::PathBuf;
use std::sync::Arc;

use celebration_common::{Error, Result};
use celebration_config::AppConfig;
use celebration_db::{BootReport, Store};

/// Shared application state accessible from all request handlers.
pub struct AppState {
    pub config: AppConfig,
    /// Outcome of the migrate/restore hooks that ran before the listener bound.
    pub boot: BootReport,
}

impl AppState {
    pub fn new(config: AppConfig, boot: BootReport) -> Self {
        Self { config, boot }
    }

    pub fn db_path(&self) -> PathBuf {
        self.config.database.path.clone()
    }

    /// Run `f` against a fresh store on the blocking pool. The connection is
    /// closed when `f` returns.
    pub async fn with_store<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Store) -> Result<T> + Send + 'static,
    {
        let path = self.db_path();
        tokio::task::spawn_blocking(move || {
            let store = Store::open(&path)?;
            let out = f(&store)?;
            store.close()?;
            Ok(out)
        })
        .await
        .map_err(|e| Error::Other(format!("store task failed: {e}")))?
    }
}

pub type SharedState = Arc<AppState>;
