//! ICD diagnostic console: entry point.
//!
//! Serves the built-in telemetry and command messages over a line-based TCP
//! console.  Connect with any raw TCP client:
//!
//! ```text
//! $ nc 127.0.0.1 24900
//! ICD diagnostic console ready; type 'help' for a list of objects
//! telemetry.status.mode = 3
//! telemetry.status.mode = 3
//! OK: telemetry.status.mode set to 3
//! ```
//!
//! # Usage
//!
//! ```text
//! icd-console [OPTIONS]
//!
//! Options:
//!   --config <PATH>      TOML config file [default: icd-console.toml]
//!   --bind <IP>          Listener IP, overrides the config file
//!   --port <PORT>        Listener port, overrides the config file
//!   --write-config       Write the effective file config to --config and exit
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable             | Description                    |
//! |----------------------|--------------------------------|
//! | `ICD_CONSOLE_CONFIG` | Path of the TOML config file   |
//! | `ICD_CONSOLE_BIND`   | Listener IP                    |
//! | `ICD_CONSOLE_PORT`   | Listener port                  |
//! | `RUST_LOG`           | `tracing` filter (wins over `[logging] level`) |
//!
//! Precedence: command line, then environment, then config file, then
//! built-in defaults.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use icd_console::infrastructure::config_file::{load_config, save_config, ConsoleFileConfig};
use icd_console::{ConsoleServer, ScriptRegistry};
use icd_core::catalog;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Line-based TCP console for inspecting and driving ICD messages.
#[derive(Debug, Parser)]
#[command(
    name = "icd-console",
    about = "Diagnostic TCP console for ICD messages",
    version
)]
struct Cli {
    /// Path of the TOML configuration file.  A missing file means defaults.
    #[arg(long, default_value = "icd-console.toml", env = "ICD_CONSOLE_CONFIG")]
    config: PathBuf,

    /// IP address to bind the console listener to.
    ///
    /// Use `0.0.0.0` to accept operators from any interface.
    #[arg(long, env = "ICD_CONSOLE_BIND")]
    bind: Option<String>,

    /// TCP port of the console listener.
    #[arg(long, env = "ICD_CONSOLE_PORT")]
    port: Option<u16>,

    /// Write the effective file configuration to `--config` and exit.
    #[arg(long)]
    write_config: bool,
}

impl Cli {
    /// Loads the config file and applies command-line overrides on top.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    fn file_config(&self) -> anyhow::Result<ConsoleFileConfig> {
        let mut file = load_config(&self.config)
            .with_context(|| format!("failed to load config '{}'", self.config.display()))?;
        if let Some(bind) = &self.bind {
            file.console.bind_address = bind.clone();
        }
        if let Some(port) = self.port {
            file.console.port = port;
        }
        Ok(file)
    }
}

/// Registry holding every message from the built-in catalog.
fn catalog_registry() -> anyhow::Result<ScriptRegistry> {
    let mut registry = ScriptRegistry::new();
    registry
        .register(Box::new(
            catalog::telemetry_message().context("invalid telemetry definition")?,
        ))
        .context("registering telemetry")?;
    registry
        .register(Box::new(
            catalog::command_message().context("invalid command definition")?,
        ))
        .context("registering command")?;
    Ok(registry)
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// # What happens at startup
///
/// 1. CLI arguments are parsed and the config file is loaded.
/// 2. `tracing_subscriber` is initialised; `RUST_LOG` wins over the file's
///    `[logging] level`.
/// 3. The catalog messages are registered and the console starts listening.
/// 4. Ctrl+C closes the console: queued commands drain, sockets close.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let file_config = cli.file_config()?;

    if cli.write_config {
        save_config(&cli.config, &file_config)
            .with_context(|| format!("failed to write '{}'", cli.config.display()))?;
        println!("wrote {}", cli.config.display());
        return Ok(());
    }

    // ── Logging setup ─────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&file_config.logging.level)),
        )
        .init();

    let config = file_config
        .into_console_config()
        .context("invalid console configuration")?;
    let registry = catalog_registry()?;
    info!(
        "ICD console starting on {} with {} object(s): {}",
        config.bind_addr,
        registry.len(),
        registry.names().join(", ")
    );

    let mut console = ConsoleServer::start(config, registry)
        .await
        .context("failed to start console")?;

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C; closing console"),
        Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
    }

    console.close().await;
    info!("ICD console stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["icd-console"]);

        assert_eq!(cli.config, PathBuf::from("icd-console.toml"));
        assert!(cli.bind.is_none());
        assert!(cli.port.is_none());
        assert!(!cli.write_config);
    }

    #[test]
    fn test_cli_overrides_apply_on_top_of_file() {
        // Arrange: the config path does not exist, so the file layer is defaults.
        let missing = std::env::temp_dir().join(format!("icd-{}.toml", uuid::Uuid::new_v4()));
        let cli = Cli::parse_from([
            "icd-console",
            "--config",
            missing.to_str().expect("utf-8 temp path"),
            "--bind",
            "0.0.0.0",
            "--port",
            "7000",
        ]);

        // Act
        let config = cli
            .file_config()
            .and_then(|f| Ok(f.into_console_config()?))
            .expect("config");

        // Assert
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:7000");
    }

    #[test]
    fn test_cli_invalid_bind_is_error() {
        let missing = std::env::temp_dir().join(format!("icd-{}.toml", uuid::Uuid::new_v4()));
        let cli = Cli::parse_from([
            "icd-console",
            "--config",
            missing.to_str().expect("utf-8 temp path"),
            "--bind",
            "nowhere",
        ]);

        let result = cli
            .file_config()
            .and_then(|f| Ok(f.into_console_config()?));

        assert!(result.is_err());
    }

    #[test]
    fn test_catalog_registry_holds_both_messages() {
        let registry = catalog_registry().expect("catalog");
        assert_eq!(registry.names(), vec!["command", "telemetry"]);
    }
}
