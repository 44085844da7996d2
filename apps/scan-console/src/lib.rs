//! # Pack Station Console
//!
//! Runs one [`ShipmentSession`] against stdin: a barcode scanner in
//! keyboard mode types one line per scan.
//!
//! ## Module Organization
//! ```text
//! packstation_console/
//! ├── lib.rs        ◄─── startup (flags, config, logging, wiring)
//! ├── config.rs     ◄─── packstation.toml + PACKSTATION_* overrides
//! ├── console.rs    ◄─── read / dispatch loop
//! └── feedback.rs   ◄─── stdout lines and audio cues
//! ```
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Parse flags ──────────► --config, --db, --audit-dir                 │
//! │  2. Load configuration ───► defaults → file → env → flags, validate     │
//! │  3. Initialize logging ───► stderr, or [debug] log_file                 │
//! │  4. Open catalog ─────────► SQLite, migrations                          │
//! │  5. Build session ────────► catalog + FsAuditStore + TerminalFeedback   │
//! │  6. Loop ─────────────────► until EXIT or end of input                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod console;
pub mod feedback;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use packstation_core::ShipmentSession;
use packstation_store::{Database, DbConfig, FsAuditStore};

use crate::config::ConsoleConfig;
use crate::console::Console;
use crate::feedback::TerminalFeedback;

const DEFAULT_LOG_FILTER: &str = "info,packstation=debug,sqlx=warn";

/// Command-line flags. They override the file and the environment.
#[derive(Debug, Parser)]
#[command(name = "packstation", version, about = "Scanner console for the pack station")]
pub struct Args {
    /// Configuration file (default: platform config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Catalog database file
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Audit record directory
    #[arg(long)]
    pub audit_dir: Option<PathBuf>,
}

impl Args {
    pub fn apply(&self, config: &mut ConsoleConfig) {
        if let Some(db) = &self.db {
            config.catalog.database = db.clone();
        }
        if let Some(dir) = &self.audit_dir {
            config.audit.root = dir.clone();
        }
    }
}

/// Runs the console until EXIT or end of input.
pub async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = ConsoleConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    init_tracing(config.debug.log_file.as_deref())?;
    info!(
        station = %config.station.name,
        catalog = %config.catalog.database.display(),
        audit = %config.audit.root.display(),
        "Starting pack station console"
    );

    let db = Database::new(DbConfig::new(&config.catalog.database))
        .await
        .context("opening the catalog database")?;
    let audit = FsAuditStore::new(&config.audit.root);
    let feedback = TerminalFeedback::new(config.cues.clone());

    let session = ShipmentSession::new(
        config.session_config(),
        Arc::new(db.clone()),
        Arc::new(audit),
        Box::new(feedback.clone()),
    );
    let mut console = Console::new(session, db.clone(), Box::new(feedback), config.debug.shell_escape);

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    console.run(stdin).await.context("reading scans")?;

    db.close().await;
    info!("Console stopped");
    Ok(())
}

/// `RUST_LOG` overrides the default filter. Operator output owns stdout, so
/// logs go to stderr or to the configured file.
fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from(["packstation", "--db", "/tmp/x.db", "--audit-dir", "/srv/a"]);
        let mut config = ConsoleConfig::default();
        args.apply(&mut config);

        assert_eq!(config.catalog.database, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.audit.root, PathBuf::from("/srv/a"));
    }

    #[test]
    fn test_no_flags_keep_config() {
        let args = Args::parse_from(["packstation"]);
        let mut config = ConsoleConfig::default();
        args.apply(&mut config);
        assert_eq!(config, ConsoleConfig::default());
    }
}
