use std::path::{Path, PathBuf};

use celebration_common::{Error, Result};
use tracing::{debug, info};

use crate::model::AppConfig;

pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new() -> Result<Self> {
        let config_dir = Self::default_config_dir();
        Ok(Self { config_dir })
    }

    pub fn default_config_dir() -> PathBuf {
        let home_config = dirs::home_dir().map(|h| h.join(".celebration"));
        let xdg_config = dirs::config_dir().map(|c| c.join("celebration"));

        match (xdg_config, home_config) {
            (Some(xdg), Some(home)) => {
                if xdg.exists() {
                    xdg
                } else if home.exists() {
                    home
                } else {
                    xdg
                }
            }
            (Some(xdg), None) => xdg,
            (None, Some(home)) => home,
            (None, None) => PathBuf::from(".celebration"),
        }
    }

    pub fn with_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn load(&self) -> Result<AppConfig> {
        let mut config = self.load_file()?;
        config
            .database
            .dump_dir
            .get_or_insert_with(|| self.backups_dir());
        Ok(config)
    }

    /// Directory `ensure_dirs` creates for timestamped dumps.
    pub fn backups_dir(&self) -> PathBuf {
        self.config_dir.join("backups")
    }

    fn load_file(&self) -> Result<AppConfig> {
        let yaml_path = self.config_dir.join("config.yml");
        let toml_path = self.config_dir.join("config.toml");

        if yaml_path.exists() {
            info!("loading config from {}", yaml_path.display());
            let contents = std::fs::read_to_string(&yaml_path)?;
            serde_yaml::from_str(&contents)
                .map_err(|e| Error::Config(format!("failed to parse YAML config: {e}")))
        } else if toml_path.exists() {
            info!("loading config from {}", toml_path.display());
            let contents = std::fs::read_to_string(&toml_path)?;
            toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("failed to parse TOML config: {e}")))
        } else {
            info!("no config file found, using defaults");
            Ok(AppConfig::default())
        }
    }

    /// Load the config file, then layer `.env` and process environment overrides on top.
    pub fn load_with_env(&self) -> Result<AppConfig> {
        let mut config = self.load()?;
        if let Ok(path) = dotenvy::dotenv() {
            debug!("loaded environment from {}", path.display());
        }
        apply_overrides(&mut config, |key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        let dirs = [self.config_dir.clone(), self.backups_dir()];

        for dir in &dirs {
            if !dir.exists() {
                std::fs::create_dir_all(dir)?;
            }
        }

        Ok(())
    }
}

/// Apply deployment overrides (`PORT`, `CELEBRATION_HOST`, `CELEBRATION_DB_PATH`,
/// `CELEBRATION_BACKUP_PATH`, `BACKEND_URL`) resolved through `lookup`.
pub fn apply_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("PORT") {
        config.server.port = port
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("invalid PORT value {port:?}: {e}")))?;
    }
    if let Some(host) = lookup("CELEBRATION_HOST") {
        config.server.host = host;
    }
    if let Some(path) = lookup("CELEBRATION_DB_PATH") {
        config.database.path = PathBuf::from(path);
    }
    if let Some(path) = lookup("CELEBRATION_BACKUP_PATH") {
        config.database.backup_path = PathBuf::from(path);
    }
    if let Some(url) = lookup("BACKEND_URL") {
        config.keep_alive.backend_url = url;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{ConfigLoader, apply_overrides};
    use crate::model::AppConfig;
    use std::collections::HashMap;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(label: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "celebration-config-test-{}-{}-{}",
            label,
            std::process::id(),
            nanos
        ))
    }

    #[test]
    fn load_returns_default_when_no_config_exists() {
        let dir = temp_dir("default");
        fs::create_dir_all(&dir).expect("failed to create temp dir");

        let loader = ConfigLoader::with_dir(&dir);
        let config = loader.load().expect("load should succeed");

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.database.path, PathBuf::from("celebration.db"));
        assert_eq!(config.database.backup_path, PathBuf::from("backup.sql"));
        assert!(!config.keep_alive.enabled);
        assert_eq!(config.keep_alive.interval_secs, 1500);
        assert_eq!(config.database.dump_dir, Some(dir.join("backups")));
        assert_eq!(config.log_level_or(None), "info");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn load_prefers_yaml_over_toml_when_both_exist() {
        let dir = temp_dir("yaml-precedence");
        fs::create_dir_all(&dir).expect("failed to create temp dir");

        fs::write(
            dir.join("config.yml"),
            "server:\n  host: \"0.0.0.0\"\n  port: 4001\n",
        )
        .expect("failed to write yaml config");
        fs::write(
            dir.join("config.toml"),
            "[server]\nhost = \"127.0.0.2\"\nport = 4999\n",
        )
        .expect("failed to write toml config");

        let loader = ConfigLoader::with_dir(&dir);
        let config = loader.load().expect("load should succeed");

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 4001);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn load_reads_toml_database_section() {
        let dir = temp_dir("toml");
        fs::create_dir_all(&dir).expect("failed to create temp dir");

        fs::write(
            dir.join("config.toml"),
            "[database]\npath = \"/var/lib/celebration/app.db\"\nbackup_path = \"seed.sql\"\n",
        )
        .expect("failed to write toml config");

        let loader = ConfigLoader::with_dir(&dir);
        let config = loader.load().expect("load should succeed");

        assert_eq!(
            config.database.path,
            PathBuf::from("/var/lib/celebration/app.db")
        );
        assert_eq!(config.database.backup_path, PathBuf::from("seed.sql"));
        assert_eq!(config.server.port, 5000);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn malformed_yaml_is_a_config_error() {
        let dir = temp_dir("bad-yaml");
        fs::create_dir_all(&dir).expect("failed to create temp dir");
        fs::write(dir.join("config.yml"), "server: [unclosed").expect("failed to write yaml");

        let err = ConfigLoader::with_dir(&dir)
            .load()
            .expect_err("malformed yaml should fail");
        assert!(err.to_string().contains("failed to parse YAML config"));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn overrides_replace_loaded_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("PORT", "8080"),
            ("CELEBRATION_DB_PATH", "/data/celebration.db"),
            ("BACKEND_URL", "https://celebration.example.org"),
        ]);
        let mut config = AppConfig::default();

        apply_overrides(&mut config, |key| vars.get(key).map(|v| v.to_string()))
            .expect("overrides should apply");

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.database.path, PathBuf::from("/data/celebration.db"));
        assert_eq!(
            config.keep_alive.backend_url,
            "https://celebration.example.org"
        );
    }

    #[test]
    fn unparsable_port_override_is_rejected() {
        let mut config = AppConfig::default();
        let err = apply_overrides(&mut config, |key| {
            (key == "PORT").then(|| "not-a-port".to_string())
        })
        .expect_err("bad port should fail");

        assert!(err.to_string().contains("invalid PORT value"));
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn ensure_dirs_creates_expected_subdirectories() {
        let dir = temp_dir("ensure-dirs");
        let loader = ConfigLoader::with_dir(&dir);

        loader.ensure_dirs().expect("ensure_dirs should succeed");

        assert!(dir.exists());
        assert!(dir.join("backups").exists());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn configured_dump_dir_and_log_level_are_kept() {
        let dir = temp_dir("dump-dir");
        fs::create_dir_all(&dir).expect("failed to create temp dir");
        fs::write(
            dir.join("config.yml"),
            "log_level: debug\ndatabase:\n  dump_dir: /srv/dumps\n",
        )
        .expect("failed to write yaml config");

        let config = ConfigLoader::with_dir(&dir)
            .load()
            .expect("load should succeed");

        assert_eq!(config.database.dump_dir, Some(PathBuf::from("/srv/dumps")));
        assert_eq!(config.log_level_or(None), "debug");
        assert_eq!(config.log_level_or(Some("warn")), "warn");

        let _ = fs::remove_dir_all(dir);
    }
}
