//! Near command handler
//!
//! Searches stations around explicit coordinates.

use crate::cli::{build_coordinator, list_formats, open_store, print_report, report_outcome};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::format::StationReport;
use crate::position::Coordinates;
use crate::search::SearchRequest;
use clap::Args;

/// Near command arguments
#[derive(Args)]
pub struct NearArgs {
    /// Latitude
    #[arg(long, allow_negative_numbers = true, required_unless_present = "list_formats")]
    pub lat: Option<f64>,

    /// Longitude
    #[arg(long, allow_negative_numbers = true, required_unless_present = "list_formats")]
    pub lng: Option<f64>,

    /// Search radius in meters
    #[arg(long, short = 'r')]
    pub radius: Option<u32>,

    /// Output format
    #[arg(long, short = 'f')]
    pub format: Option<String>,

    /// List available formats
    #[arg(short = 'F', long = "list-formats")]
    pub list_formats: bool,
}

/// Run the near command
pub async fn run(args: NearArgs) -> Result<()> {
    if args.list_formats {
        list_formats();
        return Ok(());
    }

    let config = Config::load()?;

    let (Some(lat), Some(lng)) = (args.lat, args.lng) else {
        eprintln!("Error: No location specified. Use --lat and --lng");
        std::process::exit(1);
    };
    let center = Coordinates::new(lat, lng);
    center.validate()?;

    let radius = args.radius.unwrap_or(config.search.default_radius_meters);
    if radius == 0 {
        return Err(Error::InvalidRadius("radius must be positive".to_string()));
    }

    let store = open_store(&config)?;
    let coordinator = build_coordinator(&config, store.clone())?;

    let request = SearchRequest::Nearby {
        latitude: center.lat,
        longitude: center.lng,
        radius_meters: radius,
    };
    let query = request.to_string();
    report_outcome(coordinator.execute(request).await);

    store.flush().await?;
    let report = StationReport::new(store.snapshot())
        .with_query(query);
    store.shutdown().await?;

    print_report(&report, args.format.as_deref(), &config)
}
