//! vpkg - install reusable template packages into a project
//!
//! Thin presentation layer over `vpkg_core`: argument parsing, tables and
//! progress lines. Install semantics live in the library.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use vpkg_core::{Settings, SettingsOverrides};

mod package_cli;
mod progress;

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "vpkg",
    about = "Install reusable template packages from a registry into your project",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: package_cli::Command,

    /// Set log level
    #[clap(long, default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Emit logs as JSON
    #[clap(long, global = true)]
    log_json: bool,

    /// Registry index URL (overrides config and VPKG_REGISTRY_URL)
    #[clap(long, global = true)]
    registry: Option<String>,

    /// Install root relative to the project (overrides config and VPKG_INSTALL_ROOT)
    #[clap(long, global = true)]
    install_root: Option<PathBuf>,

    /// Project root (defaults to the current directory)
    #[clap(long, global = true)]
    project_root: Option<PathBuf>,
}

/// Initialize tracing with CLI flags
///
/// Logs always go to stderr; stdout is reserved for command output.
fn initialize_tracing(log_level: &LogLevel, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_filter_directive()));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing(&cli.log_level, cli.log_json);

    let project_root = match cli.project_root {
        Some(root) => root,
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };

    let settings = Settings::load(
        &project_root,
        &SettingsOverrides {
            registry_url: cli.registry,
            install_root: cli.install_root,
        },
    )
    .context("Failed to load settings")?;

    tracing::debug!(
        "Using registry {} with install root {}",
        settings.registry_url,
        settings.install_root.display()
    );

    let code = cli
        .command
        .execute(package_cli::Session {
            project_root,
            settings,
        })
        .await?;

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
