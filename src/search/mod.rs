//! Station search
//!
//! This module defines the `SearchService` trait for remote station lookups
//! and the coordinator that runs one search at a time against it.
//!
//! ## Flex Point
//! Adding a new search backend requires:
//! 1. Create `src/search/{backend_name}.rs` implementing `SearchService`
//! 2. Add `pub mod {backend_name};` below
//! 3. Construct it in `cli::build_coordinator`

pub mod bahnql;
pub mod coordinator;

use crate::error::Result;
use crate::station::Station;
use std::fmt;

pub use coordinator::SearchCoordinator;

/// Remote station search capability
///
/// Implementations must be thread-safe (Send + Sync); calls are made from
/// whichever task runs the coordinator.
pub trait SearchService: Send + Sync {
    /// Returns the service name used in log messages
    fn name(&self) -> &'static str;

    /// Stations within `radius_meters` of a position, at most `max_results`
    fn search_near(
        &self,
        latitude: f64,
        longitude: f64,
        radius_meters: u32,
        max_results: u32,
    ) -> impl std::future::Future<Output = Result<Vec<Station>>> + Send;

    /// Stations whose name matches `term`
    fn search_by_text(
        &self,
        term: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Station>>> + Send;
}

/// A single search the coordinator can run
#[derive(Debug, Clone, PartialEq)]
pub enum SearchRequest {
    /// Radius search around a position
    Nearby {
        latitude: f64,
        longitude: f64,
        radius_meters: u32,
    },
    /// Name search
    Text(String),
}

impl fmt::Display for SearchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearby {
                latitude,
                longitude,
                radius_meters,
            } => write!(
                f,
                "nearby(lat={}, lng={}, radius={}m)",
                latitude, longitude, radius_meters
            ),
            Self::Text(term) => write!(f, "search(term={:?})", term),
        }
    }
}

/// How a coordinator call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The service answered; this many stations were handed to the store
    Completed(usize),
    /// The service call failed; the store was cleared
    Failed,
    /// Another search was in flight; nothing was done
    Dropped,
}
