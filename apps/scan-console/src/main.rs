//! # Pack Station Console Entry Point
//!
//! ```bash
//! packstation --db ./packstation_dev.db --audit-dir ./audit
//! ```
//!
//! One scan at a time on a single-threaded runtime; see the library crate
//! for the startup sequence.

use clap::Parser;

use packstation_console::Args;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    packstation_console::run(Args::parse()).await
}
