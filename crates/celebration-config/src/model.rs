use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub keep_alive: KeepAliveConfig,

    /// Used when neither `RUST_LOG` nor `--log-level` is given.
    #[serde(default)]
    pub log_level: Option<String>,
}

impl AppConfig {
    /// Log filter to install: an explicit flag wins, then the config file, then `info`.
    pub fn log_level_or<'a>(&'a self, flag: Option<&'a str>) -> &'a str {
        flag.or(self.log_level.as_deref()).unwrap_or("info")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            keep_alive: KeepAliveConfig::default(),
            log_level: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

/// Location of the SQLite store and of the dump replayed into it at boot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_backup_path")]
    pub backup_path: PathBuf,

    /// Where `celebration dump` writes timestamped dumps. The loader fills in
    /// `<config dir>/backups` when the file leaves it unset.
    #[serde(default)]
    pub dump_dir: Option<PathBuf>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            backup_path: default_backup_path(),
            dump_dir: None,
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("celebration.db")
}

fn default_backup_path() -> PathBuf {
    PathBuf::from("backup.sql")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeepAliveConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Seconds between scheduled pings.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_health_interval_secs")]
    pub health_interval_secs: u64,

    #[serde(default = "default_startup_delay_secs")]
    pub startup_delay_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Consecutive failed rounds before an alert is logged.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend_url: default_backend_url(),
            interval_secs: default_interval_secs(),
            health_interval_secs: default_health_interval_secs(),
            startup_delay_secs: default_startup_delay_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            failure_threshold: default_failure_threshold(),
        }
    }
}

fn default_backend_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_interval_secs() -> u64 {
    25 * 60
}

fn default_health_interval_secs() -> u64 {
    2 * 60
}

fn default_startup_delay_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_failure_threshold() -> u32 {
    5
}
