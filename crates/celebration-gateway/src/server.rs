use std::sync::Arc;

use celebration_common::Result;
use celebration_config::AppConfig;
use celebration_db::BootReport;
use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Binds the configured address and serves the API. Expects the boot
/// sequence to have completed already.
pub struct GatewayServer {
    config: AppConfig,
    boot: BootReport,
}

impl GatewayServer {
    pub fn new(config: AppConfig, boot: BootReport) -> Self {
        Self { config, boot }
    }

    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.server.host, self.config.server.port);

        let state = Arc::new(AppState::new(self.config, self.boot));
        let app = build_router(state);

        let listener = TcpListener::bind(&addr).await?;
        info!("celebration backend listening on {}", addr);

        axum::serve(listener, app)
            .await
            .map_err(|e| celebration_common::Error::Gateway(format!("server error: {e}")))?;

        Ok(())
    }
}
