use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use celebration_config::KeepAliveConfig;
use chrono::{DateTime, Local};
use serde_json::Value;
use tokio::time::{Instant, interval_at, sleep};
use tracing::{debug, error, info, warn};

const BASE_BACKOFF_SECS: u64 = 5;
const MAX_BACKOFF_SECS: u64 = 60;

/// Delay before retry number `retry` (0-based): 5s, 10s, 20s, ... capped at 60s.
pub fn backoff_delay(retry: u32) -> Duration {
    let factor = 1u64.checked_shl(retry).unwrap_or(u64::MAX);
    Duration::from_secs(BASE_BACKOFF_SECS.saturating_mul(factor).min(MAX_BACKOFF_SECS))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingKind {
    /// First ping after the startup delay; failures are expected while the
    /// server is still coming up and are not counted.
    Startup,
    Scheduled,
}

#[derive(Debug, Clone, Default)]
pub struct KeepAliveStats {
    pub success_count: u64,
    pub failure_count: u64,
    pub consecutive_failures: u32,
    pub last_ping: Option<DateTime<Local>>,
    /// Database status reported by the last health check.
    pub last_health: Option<String>,
}

impl KeepAliveStats {
    pub fn record_success(&mut self) {
        self.success_count += 1;
        self.consecutive_failures = 0;
        self.last_ping = Some(Local::now());
    }

    /// Returns true exactly when this failure brings the streak up to `threshold`.
    pub fn record_failure(&mut self, threshold: u32) -> bool {
        self.failure_count += 1;
        self.consecutive_failures += 1;
        self.consecutive_failures == threshold
    }
}

/// Periodically pings the backend health endpoint so the host does not idle it out.
pub struct KeepAlive {
    client: reqwest::Client,
    health_url: String,
    config: KeepAliveConfig,
    stats: KeepAliveStats,
}

impl KeepAlive {
    pub fn new(config: KeepAliveConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        let health_url = format!("{}/api/health", config.backend_url.trim_end_matches('/'));

        Ok(Self {
            client,
            health_url,
            config,
            stats: KeepAliveStats::default(),
        })
    }

    pub fn stats(&self) -> &KeepAliveStats {
        &self.stats
    }

    async fn fetch_health(&self) -> Result<Value> {
        let body = self
            .client
            .get(&self.health_url)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;
        Ok(body)
    }

    /// One ping round: the initial attempt plus up to `max_retries` retries
    /// with backoff. Returns whether any attempt succeeded.
    pub async fn ping(&mut self, kind: PingKind) -> bool {
        for retry in 0..=self.config.max_retries {
            match self.fetch_health().await {
                Ok(body) => {
                    self.stats.record_success();
                    info!(
                        "{kind:?} ping ok (total successes: {})",
                        self.stats.success_count
                    );
                    if let Some(db) = body["database"]["status"].as_str() {
                        debug!("database: {db}");
                    }
                    return true;
                }
                Err(e) if retry < self.config.max_retries => {
                    let delay = backoff_delay(retry);
                    match kind {
                        PingKind::Startup => debug!("startup ping not ready yet: {e}"),
                        PingKind::Scheduled => warn!("ping failed: {e}"),
                    }
                    debug!(
                        "retrying in {}s ({}/{})",
                        delay.as_secs(),
                        retry + 1,
                        self.config.max_retries
                    );
                    sleep(delay).await;
                }
                Err(e) => match kind {
                    PingKind::Startup => {
                        info!("startup ping failed ({e}), will retry on the regular interval");
                    }
                    PingKind::Scheduled => warn!("ping failed after all retries: {e}"),
                },
            }
        }

        if kind == PingKind::Scheduled && self.stats.record_failure(self.config.failure_threshold)
        {
            error!(
                "backend unreachable for {} consecutive rounds at {}",
                self.stats.consecutive_failures, self.health_url
            );
        }
        false
    }

    /// Lightweight status check; never retried and never counted as a failure.
    pub async fn check_health(&mut self) {
        match self.fetch_health().await {
            Ok(body) => {
                let db = body["database"]["status"]
                    .as_str()
                    .unwrap_or("unknown")
                    .to_string();
                debug!("health check passed, database: {db}");
                self.stats.last_health = Some(db);
            }
            Err(e) => {
                warn!("health check failed: {e}");
                self.stats.last_health = Some("unhealthy".to_string());
            }
        }
    }

    /// Run until `shutdown` resolves. Shutdown also interrupts a ping round
    /// that is waiting out its retry backoff.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> KeepAliveStats {
        tokio::pin!(shutdown);

        info!(
            "keep-alive started for {} (every {}s, health every {}s)",
            self.health_url, self.config.interval_secs, self.config.health_interval_secs
        );

        tokio::select! {
            _ = sleep(Duration::from_secs(self.config.startup_delay_secs)) => {}
            _ = &mut shutdown => return self.stats,
        }
        tokio::select! {
            _ = self.ping(PingKind::Startup) => {}
            _ = &mut shutdown => return self.stats,
        }

        let period = Duration::from_secs(self.config.interval_secs.max(1));
        let health_period = Duration::from_secs(self.config.health_interval_secs.max(1));
        let mut pings = interval_at(Instant::now() + period, period);
        let mut health = interval_at(Instant::now() + health_period, health_period);

        loop {
            tokio::select! {
                _ = pings.tick() => {
                    tokio::select! {
                        _ = self.ping(PingKind::Scheduled) => {}
                        _ = &mut shutdown => break,
                    }
                }
                _ = health.tick() => {
                    tokio::select! {
                        _ = self.check_health() => {}
                        _ = &mut shutdown => break,
                    }
                }
                _ = &mut shutdown => break,
            }
        }

        info!(
            "keep-alive stopped: {} ok, {} failed",
            self.stats.success_count, self.stats.failure_count
        );
        self.stats
    }
}
