//! Stations command handler
//!
//! Prints the stored result set without searching.

use crate::cli::{open_store, print_report};
use crate::config::Config;
use crate::error::Result;
use crate::format::StationReport;
use clap::Args;

/// Stations command arguments
#[derive(Args)]
pub struct StationsArgs {
    /// Output format
    #[arg(long, short = 'f')]
    pub format: Option<String>,

    /// Show the stations file path
    #[arg(long)]
    pub path: bool,
}

/// Run the stations command
pub async fn run(args: StationsArgs) -> Result<()> {
    let config = Config::load()?;

    if args.path {
        println!("{}", config.stations_path()?.display());
        return Ok(());
    }

    let store = open_store(&config)?;
    let report = StationReport::new(store.snapshot());
    store.shutdown().await?;

    print_report(&report, args.format.as_deref(), &config)
}
