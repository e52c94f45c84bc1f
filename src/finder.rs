//! Station finder
//!
//! Glue between the position feed, the fix arbiter and the search
//! coordinator. The finder consumes position events, keeps the trusted fix,
//! and starts a radius search whenever a better fix is accepted.
//!
//! The coordinator drops a request that overlaps a running search. A fix
//! accepted during that window is picked up afterwards: when a position
//! search completes and the trusted fix has moved on, the same task runs one
//! more search for the trusted fix.
//!
//! All state is published through `watch` channels: the trusted fix, the
//! search radius and term, and the positioning flags. Arbitration runs
//! inside `send_if_modified`, so concurrent candidates are compared one at a
//! time against a consistent trusted value.

use crate::error::{Error, Result};
use crate::feed::{Consumer, PositionEvent, PositionFeed, SourceStatus, Subscription};
use crate::position::{is_better_fix, PositionFix};
use crate::search::{SearchCoordinator, SearchOutcome, SearchService};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What happened to a candidate fix
#[derive(Debug)]
pub enum FixDecision {
    /// The trusted fix is at least as good; nothing changed
    Rejected,
    /// The candidate became the trusted fix; `search` is the position search
    /// it started, if a radius is set and a runtime is available
    Accepted {
        search: Option<JoinHandle<SearchOutcome>>,
    },
}

impl FixDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Orchestrates position updates and station searches
pub struct StationFinder<S> {
    feed: Arc<PositionFeed>,
    coordinator: Arc<SearchCoordinator<S>>,
    sources: Vec<String>,
    consumer: Consumer,
    events: Mutex<Option<mpsc::UnboundedReceiver<PositionEvent>>>,
    trusted_fix: watch::Sender<Option<PositionFix>>,
    search_radius: watch::Sender<Option<u32>>,
    search_term: watch::Sender<Option<String>>,
    positioning_active: watch::Sender<bool>,
    positioning_available: watch::Sender<bool>,
}

impl<S: SearchService + 'static> StationFinder<S> {
    /// Create a finder listening on `sources` (the feed's default source when empty)
    pub fn new(
        feed: Arc<PositionFeed>,
        coordinator: Arc<SearchCoordinator<S>>,
        sources: Vec<String>,
    ) -> Self {
        let (consumer, events) = Consumer::channel();
        Self {
            feed,
            coordinator,
            sources,
            consumer,
            events: Mutex::new(Some(events)),
            trusted_fix: watch::channel(None).0,
            search_radius: watch::channel(None).0,
            search_term: watch::channel(None).0,
            positioning_active: watch::channel(false).0,
            positioning_available: watch::channel(false).0,
        }
    }

    /// Start consuming position events on a background task
    ///
    /// Returns `None` if the event loop was already started.
    pub fn spawn(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let mut events = self
            .events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()?;

        let finder = Arc::clone(self);
        Some(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                finder.handle_event(event);
            }
            debug!("Position event stream closed");
        }))
    }

    /// Apply every event already queued, without waiting for more
    ///
    /// Returns the searches started along the way. Does nothing once the
    /// event loop has been spawned.
    pub fn process_pending(&self) -> Vec<JoinHandle<SearchOutcome>> {
        let mut guard = self.events.lock().unwrap_or_else(|e| e.into_inner());
        let Some(events) = guard.as_mut() else {
            return Vec::new();
        };

        let mut searches = Vec::new();
        while let Ok(event) = events.try_recv() {
            searches.extend(self.handle_event(event));
        }
        searches
    }

    /// Apply one position event
    pub fn handle_event(&self, event: PositionEvent) -> Option<JoinHandle<SearchOutcome>> {
        match event {
            PositionEvent::FixChanged(fix) => match self.handle_fix(fix) {
                FixDecision::Accepted { search } => search,
                FixDecision::Rejected => None,
            },
            PositionEvent::StatusChanged { source, status } => {
                info!(source = %source, status = ?status, "Position source status changed");
                if source_is_ours(&self.sources, self.feed.settings().default_source.as_str(), &source)
                    && status == SourceStatus::OutOfService
                {
                    self.positioning_available.send_replace(false);
                }
                None
            }
            PositionEvent::SourceEnabled(source) => {
                info!(source = %source, "Position source enabled");
                None
            }
            PositionEvent::SourceDisabled(source) => {
                info!(source = %source, "Position source disabled");
                None
            }
        }
    }

    /// Arbitrate a candidate fix against the trusted one
    pub fn handle_fix(&self, fix: PositionFix) -> FixDecision {
        let (latitude, longitude) = (fix.latitude, fix.longitude);
        let accuracy = fix.accuracy_meters;

        let accepted = self.trusted_fix.send_if_modified(|trusted| {
            if is_better_fix(Some(&fix), trusted.as_ref()) {
                *trusted = Some(fix.clone());
                true
            } else {
                false
            }
        });

        if !accepted {
            debug!(latitude, longitude, accuracy, "Keeping current fix");
            return FixDecision::Rejected;
        }

        info!(latitude, longitude, accuracy, "Accepted new position fix");
        self.positioning_active.send_replace(true);
        self.positioning_available.send_replace(true);

        let radius = *self.search_radius.borrow();
        let search = radius.and_then(|radius| self.spawn_position_search(fix, radius));

        FixDecision::Accepted { search }
    }

    /// Subscribe to position updates
    ///
    /// A last known fix, if the platform has one, is arbitrated right away.
    pub fn start_positioning(&self) -> Subscription {
        let sources: Vec<&str> = self.sources.iter().map(String::as_str).collect();
        let subscription = self.feed.subscribe(&self.consumer, &sources);

        match subscription {
            Subscription::Registered => {
                self.positioning_active.send_replace(true);
                if let Some(fix) = self.feed.last_known_fix(sources.first().copied()) {
                    debug!("Seeding with last known fix");
                    self.handle_fix(fix);
                }
            }
            Subscription::AlreadyRegistered => {
                self.positioning_active.send_replace(true);
            }
            Subscription::PermissionDenied => {
                self.positioning_active.send_replace(false);
                self.positioning_available.send_replace(false);
            }
        }

        subscription
    }

    /// Unsubscribe from position updates; the trusted fix is kept
    pub fn stop_positioning(&self) {
        self.feed.unsubscribe(self.consumer.id());
        self.positioning_active.send_replace(false);
    }

    /// Switch positioning on or off
    pub fn set_positioning_active(&self, active: bool) {
        if active {
            self.start_positioning();
        } else {
            self.stop_positioning();
        }
    }

    /// Set the radius used for position searches; `None` disables them
    pub fn set_search_radius(&self, radius_meters: Option<u32>) -> Result<()> {
        if radius_meters == Some(0) {
            return Err(Error::InvalidRadius("radius must be positive".to_string()));
        }
        self.search_radius.send_replace(radius_meters);
        Ok(())
    }

    /// Search around the trusted fix again
    ///
    /// Does nothing without a trusted fix or a radius.
    pub fn search_by_location(&self) -> Option<JoinHandle<SearchOutcome>> {
        let radius = (*self.search_radius.borrow())?;
        let fix = self.trusted_fix.borrow().clone()?;

        self.spawn_position_search(fix, radius)
    }

    /// Search by station name
    ///
    /// Positioning is stopped first so a later fix cannot replace the
    /// name results with a radius search.
    pub fn search_by_term(&self, term: &str) -> Option<JoinHandle<SearchOutcome>> {
        self.stop_positioning();
        self.search_term.send_replace(Some(term.to_string()));

        let coordinator = Arc::clone(&self.coordinator);
        let term = term.to_string();
        spawn_search(async move { coordinator.search_by_text(&term).await })
    }

    /// Search around `fix`, then once more if the trusted fix changed meanwhile
    fn spawn_position_search(
        &self,
        fix: PositionFix,
        radius_meters: u32,
    ) -> Option<JoinHandle<SearchOutcome>> {
        let coordinator = Arc::clone(&self.coordinator);
        let trusted_fix = self.trusted_fix.subscribe();
        let search_radius = self.search_radius.subscribe();

        spawn_search(async move {
            let outcome = coordinator
                .search_by_position(fix.latitude, fix.longitude, radius_meters)
                .await;
            if outcome == SearchOutcome::Dropped {
                return outcome;
            }

            let latest = trusted_fix.borrow().clone();
            let radius = *search_radius.borrow();
            match (latest, radius) {
                (Some(latest), Some(radius)) if latest != fix => {
                    info!(
                        latitude = latest.latitude,
                        longitude = latest.longitude,
                        "Trusted fix changed during search, searching again"
                    );
                    coordinator
                        .search_by_position(latest.latitude, latest.longitude, radius)
                        .await
                }
                _ => outcome,
            }
        })
    }

    pub fn trusted_fix(&self) -> Option<PositionFix> {
        self.trusted_fix.borrow().clone()
    }

    pub fn watch_trusted_fix(&self) -> watch::Receiver<Option<PositionFix>> {
        self.trusted_fix.subscribe()
    }

    pub fn search_radius(&self) -> watch::Receiver<Option<u32>> {
        self.search_radius.subscribe()
    }

    pub fn search_term(&self) -> watch::Receiver<Option<String>> {
        self.search_term.subscribe()
    }

    pub fn positioning_active(&self) -> watch::Receiver<bool> {
        self.positioning_active.subscribe()
    }

    pub fn positioning_available(&self) -> watch::Receiver<bool> {
        self.positioning_available.subscribe()
    }

    pub fn coordinator(&self) -> &Arc<SearchCoordinator<S>> {
        &self.coordinator
    }
}

impl<S> Drop for StationFinder<S> {
    fn drop(&mut self) {
        if self.feed.is_subscribed(self.consumer.id()) {
            warn!(consumer = %self.consumer.id(), "Finder dropped while subscribed, unsubscribing");
            self.feed.unsubscribe(self.consumer.id());
        }
    }
}

/// Spawn `search` on the current runtime, if there is one
fn spawn_search<F>(search: F) -> Option<JoinHandle<SearchOutcome>>
where
    F: Future<Output = SearchOutcome> + Send + 'static,
{
    match Handle::try_current() {
        Ok(runtime) => Some(runtime.spawn(search)),
        Err(e) => {
            warn!(error = %e, "No async runtime, search not started");
            None
        }
    }
}

fn source_is_ours(sources: &[String], default_source: &str, source: &str) -> bool {
    if sources.is_empty() {
        source == default_source
    } else {
        sources.iter().any(|s| s == source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{FeedSettings, PositionPlatform, SimulatedPlatform, StaticPermissionGate};
    use crate::station::Station;
    use crate::store::{MemoryTable, ResultStore};
    use tokio::sync::Semaphore;

    /// Search service double: records searched latitudes, optionally gated
    struct StubService {
        searched: Arc<Mutex<Vec<f64>>>,
        gate: Option<Arc<Semaphore>>,
        fail: bool,
    }

    impl StubService {
        fn new(fail: bool) -> Self {
            Self {
                searched: Arc::new(Mutex::new(Vec::new())),
                gate: None,
                fail,
            }
        }

        fn gated(gate: Arc<Semaphore>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::new(false)
            }
        }
    }

    impl SearchService for StubService {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn search_near(
            &self,
            latitude: f64,
            _longitude: f64,
            _radius_meters: u32,
            _max_results: u32,
        ) -> Result<Vec<Station>> {
            self.searched.lock().unwrap().push(latitude);
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            if self.fail {
                return Err(Error::Search("unreachable".to_string()));
            }
            Ok(vec![Station::new(latitude as i64, format!("near {}", latitude))])
        }

        async fn search_by_text(&self, term: &str) -> Result<Vec<Station>> {
            Ok(vec![Station::new(2, term)])
        }
    }

    struct Harness {
        platform: Arc<SimulatedPlatform>,
        store: Arc<ResultStore>,
        finder: Arc<StationFinder<StubService>>,
    }

    fn harness(granted: bool, fail: bool, initial: Vec<Station>) -> Harness {
        harness_with(StubService::new(fail), granted, initial)
    }

    fn harness_with(service: StubService, granted: bool, initial: Vec<Station>) -> Harness {
        let platform = Arc::new(SimulatedPlatform::new());
        let gate = if granted {
            StaticPermissionGate::allow_all()
        } else {
            StaticPermissionGate::deny_all()
        };
        let settings = FeedSettings {
            min_time_between_updates_millis: 0,
            min_distance_between_updates_meters: 0,
            ..FeedSettings::default()
        };
        let feed = Arc::new(PositionFeed::new(platform.clone(), Arc::new(gate), settings));
        let store = Arc::new(ResultStore::open(MemoryTable::with_stations(initial)).unwrap());
        let coordinator = Arc::new(SearchCoordinator::new(service, store.clone(), 10));
        let finder = Arc::new(StationFinder::new(feed, coordinator, Vec::new()));
        Harness {
            platform,
            store,
            finder,
        }
    }

    fn fix(accuracy: f32, timestamp: i64) -> PositionFix {
        PositionFix {
            source_id: Some("gps".to_string()),
            ..PositionFix::new(51.04, 13.73, accuracy, timestamp)
        }
    }

    #[tokio::test]
    async fn test_first_fix_accepted_without_radius() {
        let h = harness(true, false, Vec::new());

        let decision = h.finder.handle_fix(fix(10.0, 1_000));
        match decision {
            FixDecision::Accepted { search } => assert!(search.is_none()),
            FixDecision::Rejected => panic!("first fix must be accepted"),
        }
        assert_eq!(h.finder.trusted_fix(), Some(fix(10.0, 1_000)));
        assert!(*h.finder.positioning_active().borrow());
        assert!(*h.finder.positioning_available().borrow());
    }

    #[tokio::test]
    async fn test_worse_fix_rejected() {
        let h = harness(true, false, Vec::new());

        assert!(h.finder.handle_fix(fix(10.0, 1_000)).is_accepted());
        // Same source, only slightly newer and much less accurate
        assert!(!h.finder.handle_fix(fix(300.0, 2_000)).is_accepted());
        assert_eq!(h.finder.trusted_fix(), Some(fix(10.0, 1_000)));
    }

    #[tokio::test]
    async fn test_accepted_fix_triggers_search() {
        let h = harness(true, false, Vec::new());
        h.finder.set_search_radius(Some(2000)).unwrap();

        let FixDecision::Accepted { search: Some(search) } = h.finder.handle_fix(fix(10.0, 1_000)) else {
            panic!("expected a search to start");
        };
        assert_eq!(search.await.unwrap(), SearchOutcome::Completed(1));

        h.store.flush().await.unwrap();
        assert_eq!(h.store.snapshot(), vec![Station::new(51, "near 51.04")]);
    }

    #[tokio::test]
    async fn test_failed_search_still_clears_results() {
        let h = harness(true, true, vec![Station::new(9, "Stale")]);
        h.finder.set_search_radius(Some(2000)).unwrap();

        let search = h.finder.handle_event(PositionEvent::FixChanged(fix(10.0, 1_000)));
        assert_eq!(search.unwrap().await.unwrap(), SearchOutcome::Failed);

        h.store.flush().await.unwrap();
        assert!(h.store.snapshot().is_empty());
        assert!(!h.finder.coordinator().in_flight());
    }

    #[tokio::test]
    async fn test_search_by_location_needs_fix_and_radius() {
        let h = harness(true, false, Vec::new());
        assert!(h.finder.search_by_location().is_none());

        h.finder.handle_fix(fix(10.0, 1_000));
        assert!(h.finder.search_by_location().is_none());

        h.finder.set_search_radius(Some(500)).unwrap();
        let search = h.finder.search_by_location().unwrap();
        assert_eq!(search.await.unwrap(), SearchOutcome::Completed(1));
    }

    #[tokio::test]
    async fn test_zero_radius_rejected() {
        let h = harness(true, false, Vec::new());
        assert!(h.finder.set_search_radius(Some(0)).is_err());
        assert_eq!(*h.finder.search_radius().borrow(), None);
    }

    #[tokio::test]
    async fn test_search_by_term_stops_positioning() {
        let h = harness(true, false, Vec::new());
        assert_eq!(h.finder.start_positioning(), Subscription::Registered);
        assert_eq!(h.platform.registration_count(), 1);

        let outcome = h.finder.search_by_term("Pirna").unwrap().await.unwrap();
        assert_eq!(outcome, SearchOutcome::Completed(1));
        assert_eq!(h.platform.registration_count(), 0);
        assert!(!*h.finder.positioning_active().borrow());
        assert_eq!(h.finder.search_term().borrow().as_deref(), Some("Pirna"));

        h.store.flush().await.unwrap();
        assert_eq!(h.store.snapshot(), vec![Station::new(2, "Pirna")]);
    }

    #[tokio::test]
    async fn test_duplicate_start_registers_once() {
        let h = harness(true, false, Vec::new());
        assert_eq!(h.finder.start_positioning(), Subscription::Registered);
        assert_eq!(h.finder.start_positioning(), Subscription::AlreadyRegistered);
        assert_eq!(h.platform.registration_count(), 1);
    }

    #[tokio::test]
    async fn test_permission_denied_gives_no_fixes() {
        let h = harness(false, false, Vec::new());
        assert_eq!(h.finder.start_positioning(), Subscription::PermissionDenied);
        assert_eq!(h.platform.registration_count(), 0);
        assert_eq!(h.platform.publish(fix(5.0, 1_000)), 0);
        assert_eq!(h.finder.trusted_fix(), None);
        assert!(!*h.finder.positioning_active().borrow());
    }

    #[tokio::test]
    async fn test_start_seeds_last_known_fix() {
        let h = harness(true, false, Vec::new());
        h.platform.publish(fix(20.0, 1_000));

        h.finder.start_positioning();
        assert_eq!(h.finder.trusted_fix(), Some(fix(20.0, 1_000)));
    }

    #[tokio::test]
    async fn test_event_loop_applies_published_fixes() {
        let h = harness(true, false, Vec::new());
        let mut trusted = h.finder.watch_trusted_fix();
        let handle = h.finder.spawn().unwrap();
        assert!(h.finder.spawn().is_none());

        h.finder.start_positioning();
        assert_eq!(h.platform.publish(fix(8.0, 5_000)), 1);

        trusted.wait_for(|f| f.is_some()).await.unwrap();
        assert_eq!(h.finder.trusted_fix(), Some(fix(8.0, 5_000)));

        h.finder.stop_positioning();
        handle.abort();
    }

    #[tokio::test]
    async fn test_process_pending_drains_queue() {
        let h = harness(true, false, Vec::new());
        h.finder.set_search_radius(Some(1000)).unwrap();
        h.finder.start_positioning();

        assert!(h.finder.process_pending().is_empty());

        h.platform.publish(fix(50.0, 1_000));
        h.platform.publish(fix(10.0, 2_000));
        let searches = h.finder.process_pending();
        assert_eq!(h.finder.trusted_fix(), Some(fix(10.0, 2_000)));

        // Both fixes were accepted; the second search may overlap the first,
        // in which case the first one searches again for the second fix
        assert_eq!(searches.len(), 2);
        let mut completed = 0;
        for search in searches {
            if let SearchOutcome::Completed(_) = search.await.unwrap() {
                completed += 1;
            }
        }
        assert!(completed >= 1);

        h.finder.spawn().unwrap().abort();
        assert!(h.finder.process_pending().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_service_marks_unavailable() {
        let h = harness(true, false, Vec::new());
        h.finder.handle_fix(fix(8.0, 1_000));
        assert!(*h.finder.positioning_available().borrow());

        h.finder.handle_event(PositionEvent::StatusChanged {
            source: "network".to_string(),
            status: SourceStatus::OutOfService,
        });
        assert!(*h.finder.positioning_available().borrow());

        h.finder.handle_event(PositionEvent::StatusChanged {
            source: "gps".to_string(),
            status: SourceStatus::OutOfService,
        });
        assert!(!*h.finder.positioning_available().borrow());
    }

    #[tokio::test]
    async fn test_fix_accepted_during_search_is_searched_afterwards() {
        let gate = Arc::new(Semaphore::new(0));
        let service = StubService::gated(gate.clone());
        let searched = service.searched.clone();
        let h = harness_with(service, true, Vec::new());
        h.finder.set_search_radius(Some(2000)).unwrap();

        let first = PositionFix::new(51.0, 13.7, 50.0, 1_000);
        let FixDecision::Accepted { search: Some(first_search) } = h.finder.handle_fix(first) else {
            panic!("expected a search for the first fix");
        };
        h.finder
            .coordinator()
            .is_in_flight()
            .wait_for(|running| *running)
            .await
            .unwrap();

        let second = PositionFix::new(52.5, 13.7, 10.0, 2_000);
        let FixDecision::Accepted { search: Some(second_search) } = h.finder.handle_fix(second) else {
            panic!("expected the second fix to be accepted");
        };
        assert_eq!(second_search.await.unwrap(), SearchOutcome::Dropped);

        gate.add_permits(2);
        assert_eq!(first_search.await.unwrap(), SearchOutcome::Completed(1));

        h.store.flush().await.unwrap();
        assert_eq!(h.store.snapshot(), vec![Station::new(52, "near 52.5")]);
        assert_eq!(*searched.lock().unwrap(), vec![51.0, 52.5]);
        assert!(!h.finder.coordinator().in_flight());
    }

    #[tokio::test]
    async fn test_unchanged_fix_searched_once() {
        let service = StubService::new(false);
        let searched = service.searched.clone();
        let h = harness_with(service, true, Vec::new());
        h.finder.set_search_radius(Some(2000)).unwrap();

        let FixDecision::Accepted { search: Some(search) } = h.finder.handle_fix(fix(10.0, 1_000)) else {
            panic!("expected a search to start");
        };
        assert_eq!(search.await.unwrap(), SearchOutcome::Completed(1));
        assert_eq!(*searched.lock().unwrap(), vec![51.04]);
    }

    #[test]
    fn test_fix_without_runtime_is_stored_but_not_searched() {
        let h = harness(true, false, Vec::new());
        h.finder.set_search_radius(Some(2000)).unwrap();

        match h.finder.handle_fix(fix(10.0, 1_000)) {
            FixDecision::Accepted { search } => assert!(search.is_none()),
            FixDecision::Rejected => panic!("first fix must be accepted"),
        }
        assert_eq!(h.finder.trusted_fix(), Some(fix(10.0, 1_000)));
        assert!(h.finder.search_by_term("Pirna").is_none());
    }

    #[test]
    fn test_source_is_ours() {
        assert!(source_is_ours(&[], "gps", "gps"));
        assert!(!source_is_ours(&[], "gps", "network"));
        let sources = vec!["network".to_string()];
        assert!(source_is_ours(&sources, "gps", "network"));
        assert!(!source_is_ours(&sources, "gps", "gps"));
    }

    #[tokio::test]
    async fn test_platform_last_known_unaffected_by_rejection() {
        let h = harness(true, false, Vec::new());
        h.finder.handle_fix(fix(5.0, 1_000));
        h.platform.publish(fix(500.0, 2_000));
        assert!(!h.finder.handle_fix(fix(500.0, 2_000)).is_accepted());
        assert_eq!(h.platform.last_known_fix("gps"), Some(fix(500.0, 2_000)));
    }
}
