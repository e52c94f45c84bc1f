//! Search command handler
//!
//! Searches stations by name.

use crate::cli::{build_coordinator, open_store, print_report, report_outcome};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::format::StationReport;
use crate::search::SearchRequest;
use clap::Args;

/// Search command arguments
#[derive(Args)]
pub struct SearchArgs {
    /// Station name or part of it
    pub term: String,

    /// Output format
    #[arg(long, short = 'f')]
    pub format: Option<String>,
}

/// Run the search command
pub async fn run(args: SearchArgs) -> Result<()> {
    let term = args.term.trim();
    if term.is_empty() {
        return Err(Error::Config("Search term cannot be empty".to_string()));
    }

    let config = Config::load()?;
    let store = open_store(&config)?;
    let coordinator = build_coordinator(&config, store.clone())?;

    let request = SearchRequest::Text(term.to_string());
    let query = request.to_string();
    report_outcome(coordinator.execute(request).await);

    store.flush().await?;
    let report = StationReport::new(store.snapshot()).with_query(query);
    store.shutdown().await?;

    print_report(&report, args.format.as_deref(), &config)
}
