//! Track command handler
//!
//! Replays a recorded list of position fixes through the full pipeline:
//! simulated platform, position feed, fix arbitration and station search.

use crate::cli::{build_coordinator, open_store, print_report};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::feed::{PositionFeed, SimulatedPlatform, StaticPermissionGate, Subscription};
use crate::finder::StationFinder;
use crate::format::StationReport;
use crate::position::PositionFix;
use crate::search::SearchOutcome;
use clap::Args;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Track command arguments
#[derive(Args)]
pub struct TrackArgs {
    /// JSON file holding an array of position fixes
    pub file: PathBuf,

    /// Search radius in meters
    #[arg(long, short = 'r')]
    pub radius: Option<u32>,

    /// Position source to subscribe to (repeatable)
    #[arg(long, short = 's')]
    pub source: Vec<String>,

    /// Wall-clock delay between fixes, in milliseconds
    #[arg(long, default_value = "0")]
    pub pace_ms: u64,

    /// Output format
    #[arg(long, short = 'f')]
    pub format: Option<String>,
}

/// Counts collected while replaying a track
#[derive(Debug, Default, PartialEq, Eq)]
struct ReplaySummary {
    fixes: usize,
    delivered: usize,
    completed: usize,
    failed: usize,
    dropped: usize,
}

impl ReplaySummary {
    fn record(&mut self, outcome: SearchOutcome) {
        match outcome {
            SearchOutcome::Completed(_) => self.completed += 1,
            SearchOutcome::Failed => self.failed += 1,
            SearchOutcome::Dropped => self.dropped += 1,
        }
    }
}

/// Read a track file
fn load_track(path: &Path) -> Result<Vec<PositionFix>> {
    let content = fs::read_to_string(path)?;
    let fixes: Vec<PositionFix> = serde_json::from_str(&content)?;
    for fix in &fixes {
        fix.coordinates().validate()?;
    }
    Ok(fixes)
}

/// Run the track command
pub async fn run(args: TrackArgs) -> Result<()> {
    let config = Config::load()?;
    let fixes = load_track(&args.file)?;
    if fixes.is_empty() {
        return Err(Error::Config(format!("No fixes in {}", args.file.display())));
    }

    let radius = args.radius.unwrap_or(config.search.default_radius_meters);

    let platform = Arc::new(SimulatedPlatform::with_default_source(
        config.location.default_source.clone(),
    ));
    let gate = if config.location.permission_granted {
        StaticPermissionGate::allow_all()
    } else {
        StaticPermissionGate::deny_all()
    };
    let feed = Arc::new(PositionFeed::new(
        platform.clone(),
        Arc::new(gate),
        config.feed_settings(),
    ));

    let store = open_store(&config)?;
    let coordinator = Arc::new(build_coordinator(&config, store.clone())?);
    let finder = StationFinder::new(feed, coordinator, args.source.clone());
    finder.set_search_radius(Some(radius))?;

    if finder.start_positioning() == Subscription::PermissionDenied {
        eprintln!("Location permission not granted; no fixes will be delivered");
    }

    info!(fixes = fixes.len(), radius, "Replaying track");

    let mut summary = ReplaySummary {
        fixes: fixes.len(),
        ..ReplaySummary::default()
    };
    let mut searches = Vec::new();

    for fix in fixes {
        summary.delivered += platform.publish(fix);
        searches.extend(finder.process_pending());

        if args.pace_ms > 0 {
            tokio::time::sleep(Duration::from_millis(args.pace_ms)).await;
        }
    }

    for search in searches {
        match search.await {
            Ok(outcome) => summary.record(outcome),
            Err(e) => return Err(Error::Search(format!("Search task failed: {}", e))),
        }
    }

    finder.stop_positioning();
    info!(?summary, "Track replay finished");
    eprintln!(
        "Replayed {} fixes ({} delivered): {} searches completed, {} failed, {} dropped",
        summary.fixes, summary.delivered, summary.completed, summary.failed, summary.dropped
    );

    store.flush().await?;
    let report = StationReport::new(store.snapshot()).with_fix(finder.trusted_fix());
    store.shutdown().await?;

    print_report(&report, args.format.as_deref(), &config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_track() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("track.json");
        fs::write(
            &path,
            r#"[
                {"timestamp_millis": 0, "accuracy_meters": 30.0, "latitude": 51.04, "longitude": 13.73},
                {"timestamp_millis": 15000, "accuracy_meters": 8.0, "latitude": 51.05, "longitude": 13.74, "source_id": "gps"}
            ]"#,
        )
        .unwrap();

        let fixes = load_track(&path).unwrap();
        assert_eq!(fixes.len(), 2);
        assert_eq!(fixes[0].source_id, None);
        assert_eq!(fixes[1].source_id.as_deref(), Some("gps"));
    }

    #[test]
    fn test_load_track_rejects_bad_coordinates() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("track.json");
        fs::write(
            &path,
            r#"[{"timestamp_millis": 0, "accuracy_meters": 1.0, "latitude": 123.0, "longitude": 0.0}]"#,
        )
        .unwrap();
        assert!(load_track(&path).is_err());
    }

    #[test]
    fn test_load_track_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_track(&temp_dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_summary_record() {
        let mut summary = ReplaySummary::default();
        summary.record(SearchOutcome::Completed(3));
        summary.record(SearchOutcome::Dropped);
        summary.record(SearchOutcome::Dropped);
        summary.record(SearchOutcome::Failed);
        assert_eq!(
            summary,
            ReplaySummary {
                completed: 1,
                failed: 1,
                dropped: 2,
                ..ReplaySummary::default()
            }
        );
    }
}
