//! In-process position platform
//!
//! Fixes are pushed in by the caller (a recorded track, a test) and fanned
//! out to the registrations on the fix's source. Each registration's
//! minimum interval and minimum distance are enforced against the last fix
//! delivered to it, using fix timestamps rather than the wall clock so a
//! replayed track behaves the same at any speed.

use crate::feed::{
    Consumer, ConsumerId, PositionEvent, PositionPlatform, SourceStatus, UpdateRequest,
};
use crate::constants::feed::DEFAULT_SOURCE;
use crate::position::PositionFix;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

struct Registration {
    source: String,
    request: UpdateRequest,
    consumer: Consumer,
    last_delivered: Option<PositionFix>,
}

impl Registration {
    fn accepts(&self, fix: &PositionFix) -> bool {
        let Some(previous) = &self.last_delivered else {
            return true;
        };

        let elapsed = fix.timestamp_millis - previous.timestamp_millis;
        if elapsed < 0 || (elapsed as u128) < self.request.min_interval.as_millis() {
            return false;
        }

        previous.coordinates().distance_to(&fix.coordinates()) >= self.request.min_distance_meters
    }
}

/// Position platform driven by explicit `publish` calls
pub struct SimulatedPlatform {
    default_source: String,
    registrations: Mutex<Vec<Registration>>,
    last_known: Mutex<HashMap<String, PositionFix>>,
}

impl SimulatedPlatform {
    /// Create a platform; fixes without a source id belong to "gps"
    pub fn new() -> Self {
        Self::with_default_source(DEFAULT_SOURCE)
    }

    /// Create a platform with a different source for unattributed fixes
    pub fn with_default_source(source: impl Into<String>) -> Self {
        Self {
            default_source: source.into(),
            registrations: Mutex::new(Vec::new()),
            last_known: Mutex::new(HashMap::new()),
        }
    }

    /// Emit a fix from its source
    ///
    /// Returns the number of consumers it was delivered to.
    pub fn publish(&self, fix: PositionFix) -> usize {
        let source = fix
            .source_id
            .clone()
            .unwrap_or_else(|| self.default_source.clone());

        self.last_known
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(source.clone(), fix.clone());

        let mut registrations = self.registrations.lock().unwrap_or_else(|e| e.into_inner());
        registrations.retain(|r| !r.consumer.is_closed());

        let mut delivered = 0;
        for registration in registrations.iter_mut().filter(|r| r.source == source) {
            if !registration.accepts(&fix) {
                continue;
            }
            if registration
                .consumer
                .deliver(PositionEvent::FixChanged(fix.clone()))
            {
                registration.last_delivered = Some(fix.clone());
                delivered += 1;
            }
        }

        debug!(source = %source, delivered, "Published fix");
        delivered
    }

    /// Announce that a source was switched on or off
    pub fn set_enabled(&self, source: &str, enabled: bool) {
        let event = if enabled {
            PositionEvent::SourceEnabled(source.to_string())
        } else {
            PositionEvent::SourceDisabled(source.to_string())
        };
        self.broadcast(source, event);
    }

    /// Announce a change in a source's availability
    pub fn set_status(&self, source: &str, status: SourceStatus) {
        self.broadcast(
            source,
            PositionEvent::StatusChanged {
                source: source.to_string(),
                status,
            },
        );
    }

    /// Number of live registrations across all sources
    pub fn registration_count(&self) -> usize {
        self.registrations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|r| !r.consumer.is_closed())
            .count()
    }

    fn broadcast(&self, source: &str, event: PositionEvent) {
        let registrations = self.registrations.lock().unwrap_or_else(|e| e.into_inner());
        for registration in registrations.iter().filter(|r| r.source == source) {
            registration.consumer.deliver(event.clone());
        }
    }
}

impl Default for SimulatedPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionPlatform for SimulatedPlatform {
    fn request_updates(&self, source: &str, request: UpdateRequest, consumer: Consumer) {
        self.registrations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Registration {
                source: source.to_string(),
                request,
                consumer,
                last_delivered: None,
            });
    }

    fn remove_updates(&self, consumer: ConsumerId) {
        self.registrations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|r| r.consumer.id() != consumer);
    }

    fn last_known_fix(&self, source: &str) -> Option<PositionFix> {
        self.last_known
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(source)
            .cloned()
    }
}
