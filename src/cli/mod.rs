//! CLI command handlers
//!
//! Each subcommand has its own module with handler functions.

pub mod config;
pub mod near;
pub mod search;
pub mod stations;
pub mod track;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::format::{available_formats, get_formatter, StationReport};
use crate::search::bahnql::BahnQlService;
use crate::search::{SearchCoordinator, SearchOutcome};
use crate::store::{JsonFileTable, ResultStore};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Find railway stations near a position or by name
#[derive(Parser)]
#[command(name = "station-finder")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log debug output to stderr
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search stations around a position
    Near(near::NearArgs),

    /// Search stations by name
    Search(search::SearchArgs),

    /// Show the stations from the last search
    Stations(stations::StationsArgs),

    /// Replay a recorded track of position fixes
    Track(track::TrackArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

/// Run the CLI
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Near(args) => near::run(args).await,
        Commands::Search(args) => search::run(args).await,
        Commands::Stations(args) => stations::run(args).await,
        Commands::Track(args) => track::run(args).await,
        Commands::Config(args) => config::run(args),
    }
}

/// Install the tracing subscriber; logs go to stderr
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Open the result store on the configured stations file
pub fn open_store(config: &Config) -> Result<Arc<ResultStore>> {
    let path = config.stations_path()?;
    debug!(path = %path.display(), "Opening stations file");
    Ok(Arc::new(ResultStore::open(JsonFileTable::open_at(path)?)?))
}

/// Build the search coordinator for the configured endpoint
pub fn build_coordinator(
    config: &Config,
    store: Arc<ResultStore>,
) -> Result<SearchCoordinator<BahnQlService>> {
    let service = BahnQlService::with_endpoint(config.search.endpoint.clone(), None)?;
    Ok(SearchCoordinator::new(service, store, config.search.max_results)
        .with_timeout(config.search_timeout()))
}

/// Format `report` with the requested or configured format and print it
pub fn print_report(report: &StationReport, format: Option<&str>, config: &Config) -> Result<()> {
    let format = format.unwrap_or(&config.output.format);
    let formatter = get_formatter(format)
        .ok_or_else(|| Error::Config(format!("Unknown format: {}", format)))?;
    print!("{}", formatter.format(report)?);
    Ok(())
}

/// Tell the user when a search did not produce fresh results
pub fn report_outcome(outcome: SearchOutcome) {
    match outcome {
        SearchOutcome::Completed(_) => {}
        SearchOutcome::Failed => eprintln!("Search failed; stored results were cleared"),
        SearchOutcome::Dropped => eprintln!("Another search is in progress; request dropped"),
    }
}

/// Print available output formats
pub fn list_formats() {
    println!("Available output formats:");
    for format in available_formats() {
        println!("  {:6} - {}", format.name, format.description);
    }
}
