//! Print the contents of a cynic snapshot store file.
//!
//! Usage:
//!   cynic-store --input 2024-05-01T12:00:00+02:00.1.cynic

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use cynic_status::SnapshotStore;

#[derive(Parser)]
#[command(name = "cynic-store", version, about = "Inspect a cynic snapshot store file")]
struct Cli {
    /// Snapshot store file to read
    #[arg(short, long)]
    input: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = SnapshotStore::read_from(&cli.input)
        .with_context(|| format!("failed to read snapshot store {}", cli.input.display()))?;
    print!("{store}");
    Ok(())
}
