mod keep_alive;
mod report;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use celebration_config::ConfigLoader;
use celebration_db::Store;
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::keep_alive::KeepAlive;

#[derive(Parser)]
#[command(
    name = "celebration",
    version,
    about = "Celebration website backend"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error); defaults to the config file's, then info
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Directory holding config.yml / config.toml
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate, restore an empty store from backup, then serve the API
    Start {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },

    /// Bring the database schema up to date
    Migrate,

    /// Restore an empty database from a SQL dump
    Restore {
        /// Dump to restore from (defaults to the configured backup path)
        #[arg(long)]
        backup: Option<PathBuf>,
    },

    /// Write a SQL dump of messages and memories
    Dump {
        /// Output file (defaults to backup_<timestamp>.sql)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Convert JSON exports into a restorable SQL dump
    ImportJson {
        #[arg(long, default_value = "backup_messages.json")]
        messages: PathBuf,

        #[arg(long, default_value = "backup_memories.json")]
        memories: PathBuf,

        #[arg(long, default_value = "backup_from_json.sql")]
        output: PathBuf,
    },

    /// Ping the backend periodically so the host keeps it awake
    KeepAlive {
        /// Backend base URL (defaults to the configured backend_url)
        #[arg(long)]
        url: Option<String>,
    },

    /// Show what the running server did at boot
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_loader = match cli.config_dir {
        Some(dir) => ConfigLoader::with_dir(dir),
        None => ConfigLoader::new()?,
    };
    config_loader.ensure_dirs()?;
    let config = config_loader.load_with_env().with_context(|| {
        format!(
            "failed to load config from {}",
            config_loader.config_dir().display()
        )
    })?;

    let log_level = config.log_level_or(cli.log_level.as_deref()).to_string();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)),
        )
        .init();
    debug!(
        "using config directory {}",
        config_loader.config_dir().display()
    );

    match cli.command {
        Commands::Start { host, port } => {
            let mut config = config;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            let report = celebration_db::boot(&config.database).context("boot sequence failed")?;

            if config.keep_alive.enabled {
                let keep_alive = KeepAlive::new(config.keep_alive.clone())?;
                tokio::spawn(keep_alive.run(std::future::pending()));
            }

            let server = celebration_gateway::GatewayServer::new(config, report);
            server.run().await?;
        }
        Commands::Migrate => {
            let report = celebration_db::run_migrations(&config.database.path)
                .context("migration failed")?;
            report::print_migration(&report);
        }
        Commands::Restore { backup } => {
            let mut database = config.database;
            if let Some(backup) = backup {
                database.backup_path = backup;
            }
            // Migrate first; dumps carry the migrated memories columns.
            let report = celebration_db::boot(&database).context("restore failed")?;
            println!("{}", serde_json::to_string_pretty(&report.restoration)?);
        }
        Commands::Dump { output } => {
            let output = output.unwrap_or_else(|| {
                celebration_db::default_dump_path(config.database.dump_dir.as_deref())
            });
            let store = Store::open(&config.database.path)?;
            let written = celebration_db::create_dump(store.connection(), &output);
            store.close()?;
            if !written {
                anyhow::bail!("failed to write dump to {}", output.display());
            }
            println!("Backup written to {}", output.display());
        }
        Commands::ImportJson {
            messages,
            memories,
            output,
        } => {
            let script = celebration_db::json_import::convert_files(&messages, &memories)?;
            fs::write(&output, &script.script)
                .with_context(|| format!("failed to write {}", output.display()))?;
            report::print_import(&script);
            println!("SQL written to {}", output.display());
        }
        Commands::KeepAlive { url } => {
            let mut settings = config.keep_alive;
            if let Some(url) = url {
                settings.backend_url = url;
            }
            let keep_alive = KeepAlive::new(settings)?;
            let stats = keep_alive
                .run(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!("failed to listen for ctrl-c: {e}");
                    }
                })
                .await;
            info!(
                "keep-alive finished: {} ok, {} failed",
                stats.success_count, stats.failure_count
            );
        }
        Commands::Status => {
            let url = format!(
                "http://{}:{}/api/status",
                config.server.host, config.server.port
            );
            let resp = reqwest::get(&url).await.map_err(|_| {
                anyhow::anyhow!(
                    "Server is not running at {}:{}",
                    config.server.host,
                    config.server.port
                )
            })?;

            let body = resp.json::<serde_json::Value>().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}
