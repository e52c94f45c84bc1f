//! Single-flight search coordinator
//!
//! Turns a position or a text query into exactly one search service call
//! and hands whatever came back to the result store. At most one search runs
//! at a time per coordinator: a request arriving while another is in flight
//! is logged and dropped, never queued.

use crate::error::{Error, Result};
use crate::search::{SearchOutcome, SearchRequest, SearchService};
use crate::station::Station;
use crate::store::ResultStore;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Runs searches one at a time and stores their results
pub struct SearchCoordinator<S> {
    service: S,
    store: Arc<ResultStore>,
    max_results: u32,
    timeout: Option<Duration>,
    in_flight: Mutex<bool>,
    progress: watch::Sender<bool>,
}

/// Marks a search as running; clears the flag when dropped
struct InFlight<'a> {
    flag: &'a Mutex<bool>,
    progress: &'a watch::Sender<bool>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut flag = self.flag.lock().unwrap_or_else(|e| e.into_inner());
        *flag = false;
        self.progress.send_replace(false);
    }
}

impl<S: SearchService> SearchCoordinator<S> {
    /// Create a coordinator without a call timeout
    pub fn new(service: S, store: Arc<ResultStore>, max_results: u32) -> Self {
        let (progress, _) = watch::channel(false);
        Self {
            service,
            store,
            max_results,
            timeout: None,
            in_flight: Mutex::new(false),
            progress,
        }
    }

    /// Fail service calls that take longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Search stations around a position
    pub async fn search_by_position(
        &self,
        latitude: f64,
        longitude: f64,
        radius_meters: u32,
    ) -> SearchOutcome {
        self.execute(SearchRequest::Nearby {
            latitude,
            longitude,
            radius_meters,
        })
        .await
    }

    /// Search stations by name
    pub async fn search_by_text(&self, term: &str) -> SearchOutcome {
        self.execute(SearchRequest::Text(term.to_string())).await
    }

    /// Run `request` unless another search is in flight
    ///
    /// A failed service call is logged and stored as an empty result set;
    /// it is never returned as an error.
    pub async fn execute(&self, request: SearchRequest) -> SearchOutcome {
        let Some(_in_flight) = self.begin(&request) else {
            return SearchOutcome::Dropped;
        };

        info!(service = self.service.name(), request = %request, "Searching stations");

        match self.call(&request).await {
            Ok(stations) => {
                let count = stations.len();
                info!(
                    service = self.service.name(),
                    request = %request,
                    stations = count,
                    "Search completed"
                );
                self.store.replace_all(stations);
                SearchOutcome::Completed(count)
            }
            Err(e) => {
                error!(
                    service = self.service.name(),
                    request = %request,
                    error = %e,
                    "Failure on executing search"
                );
                self.store.replace_all(Vec::new());
                SearchOutcome::Failed
            }
        }
    }

    /// Observable in-progress flag
    pub fn is_in_flight(&self) -> watch::Receiver<bool> {
        self.progress.subscribe()
    }

    /// Whether a search is running right now
    pub fn in_flight(&self) -> bool {
        *self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The store results are written to
    pub fn store(&self) -> &Arc<ResultStore> {
        &self.store
    }

    pub fn max_results(&self) -> u32 {
        self.max_results
    }

    fn begin(&self, request: &SearchRequest) -> Option<InFlight<'_>> {
        let mut flag = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if *flag {
            warn!(request = %request, "Search already in progress, dropping request");
            return None;
        }

        *flag = true;
        self.progress.send_replace(true);

        Some(InFlight {
            flag: &self.in_flight,
            progress: &self.progress,
        })
    }

    async fn call(&self, request: &SearchRequest) -> Result<Vec<Station>> {
        let search = async {
            match request {
                SearchRequest::Nearby {
                    latitude,
                    longitude,
                    radius_meters,
                } => {
                    self.service
                        .search_near(*latitude, *longitude, *radius_meters, self.max_results)
                        .await
                }
                SearchRequest::Text(term) => self.service.search_by_text(term).await,
            }
        };

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, search)
                .await
                .map_err(|_| Error::Search(format!("Search timed out after {:?}", limit)))?,
            None => search.await,
        }
    }
}
