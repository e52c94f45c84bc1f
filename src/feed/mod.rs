//! Position feed
//!
//! Subscribes consumers to named position sources on a platform, gated by a
//! runtime permission. Each consumer is a channel sender; every fix or
//! source event the platform emits for it arrives as one [`PositionEvent`].
//!
//! ## Flex Point
//! Adding a new position platform requires:
//! 1. Create `src/feed/{platform}.rs` implementing `PositionPlatform`
//! 2. Add `pub mod {platform};` below
//! 3. Hand an `Arc` of it to `PositionFeed::new`

pub mod permission;
pub mod simulated;

use crate::config::defaults::{
    DEFAULT_MIN_DISTANCE_BETWEEN_UPDATES_METERS, DEFAULT_MIN_TIME_BETWEEN_UPDATES_MILLIS, DEFAULT_SOURCE,
};
use crate::constants::feed::FINE_LOCATION_PERMISSION;
use crate::position::PositionFix;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use permission::StaticPermissionGate;
pub use simulated::SimulatedPlatform;

/// Availability reported by a position source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus {
    Available,
    TemporarilyUnavailable,
    OutOfService,
}

/// Everything a position source can tell its consumer
#[derive(Debug, Clone, PartialEq)]
pub enum PositionEvent {
    /// A new fix was produced
    FixChanged(PositionFix),
    /// The source's availability changed
    StatusChanged { source: String, status: SourceStatus },
    /// The source was switched on
    SourceEnabled(String),
    /// The source was switched off
    SourceDisabled(String),
}

/// Identity of a feed consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsumerId(Uuid);

impl ConsumerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sending half of a consumer's event channel
///
/// Clones share the same identity; registering a clone of an already
/// registered consumer is a duplicate registration.
#[derive(Debug, Clone)]
pub struct Consumer {
    id: ConsumerId,
    events: mpsc::UnboundedSender<PositionEvent>,
}

impl Consumer {
    /// Create a consumer and the receiver its events arrive on
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PositionEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        (
            Self {
                id: ConsumerId::new(),
                events,
            },
            receiver,
        )
    }

    pub fn id(&self) -> ConsumerId {
        self.id
    }

    /// Deliver an event; false once the receiving side is gone
    pub fn deliver(&self, event: PositionEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Whether the receiving side has been dropped
    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}

/// Answers whether a runtime permission has been granted
pub trait PermissionGate: Send + Sync {
    fn is_granted(&self, permission: &str) -> bool;
}

/// Delivery throttling requested for one registration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateRequest {
    /// Minimum time between two deliveries
    pub min_interval: Duration,
    /// Minimum distance moved between two deliveries, in meters
    pub min_distance_meters: f64,
}

/// The device positioning system
pub trait PositionPlatform: Send + Sync {
    /// Start delivering events from `source` to `consumer`
    fn request_updates(&self, source: &str, request: UpdateRequest, consumer: Consumer);

    /// Stop all deliveries to `consumer`, on every source
    fn remove_updates(&self, consumer: ConsumerId);

    /// The most recent fix the platform holds for `source`
    fn last_known_fix(&self, source: &str) -> Option<PositionFix>;
}

/// Settings applied to every subscription
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSettings {
    /// Source used when the subscriber names none
    pub default_source: String,
    /// Minimum time between updates, in milliseconds
    pub min_time_between_updates_millis: u64,
    /// Minimum distance between updates, in meters
    pub min_distance_between_updates_meters: u32,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            default_source: DEFAULT_SOURCE.to_string(),
            min_time_between_updates_millis: DEFAULT_MIN_TIME_BETWEEN_UPDATES_MILLIS,
            min_distance_between_updates_meters: DEFAULT_MIN_DISTANCE_BETWEEN_UPDATES_METERS,
        }
    }
}

impl FeedSettings {
    fn update_request(&self) -> UpdateRequest {
        UpdateRequest {
            min_interval: Duration::from_millis(self.min_time_between_updates_millis),
            min_distance_meters: f64::from(self.min_distance_between_updates_meters),
        }
    }
}

/// Result of a subscription attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscription {
    /// The consumer now receives updates
    Registered,
    /// The consumer was already registered; nothing changed
    AlreadyRegistered,
    /// Location permission is not granted; nothing was registered
    PermissionDenied,
}

/// Permission-gated access to a position platform
pub struct PositionFeed {
    platform: Arc<dyn PositionPlatform>,
    gate: Arc<dyn PermissionGate>,
    settings: FeedSettings,
    registry: Mutex<HashSet<ConsumerId>>,
}

impl PositionFeed {
    pub fn new(
        platform: Arc<dyn PositionPlatform>,
        gate: Arc<dyn PermissionGate>,
        settings: FeedSettings,
    ) -> Self {
        Self {
            platform,
            gate,
            settings,
            registry: Mutex::new(HashSet::new()),
        }
    }

    pub fn settings(&self) -> &FeedSettings {
        &self.settings
    }

    /// Register `consumer` on every named source, or on the default source
    /// when `sources` is empty
    ///
    /// Denied permission is a normal outcome, not an error: nothing is
    /// registered and the caller simply receives no fixes.
    pub fn subscribe(&self, consumer: &Consumer, sources: &[&str]) -> Subscription {
        let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());

        if registry.contains(&consumer.id()) {
            warn!(consumer = %consumer.id(), "Consumer already subscribed, ignoring");
            return Subscription::AlreadyRegistered;
        }

        if !self.gate.is_granted(FINE_LOCATION_PERMISSION) {
            info!(
                permission = FINE_LOCATION_PERMISSION,
                "Permission not granted, can't request position updates"
            );
            return Subscription::PermissionDenied;
        }

        let request = self.settings.update_request();
        let default_source = [self.settings.default_source.as_str()];
        let sources = if sources.is_empty() {
            &default_source[..]
        } else {
            sources
        };

        for source in sources {
            debug!(
                consumer = %consumer.id(),
                source,
                min_interval_ms = self.settings.min_time_between_updates_millis,
                min_distance_m = self.settings.min_distance_between_updates_meters,
                "Requesting position updates"
            );
            self.platform
                .request_updates(source, request, consumer.clone());
        }

        registry.insert(consumer.id());
        Subscription::Registered
    }

    /// Last fix cached by the platform for `source` (default source if `None`)
    ///
    /// Never subscribes. Returns `None` when permission is denied.
    pub fn last_known_fix(&self, source: Option<&str>) -> Option<PositionFix> {
        if !self.gate.is_granted(FINE_LOCATION_PERMISSION) {
            info!(
                permission = FINE_LOCATION_PERMISSION,
                "Permission not granted, can't query last known position"
            );
            return None;
        }

        let source = source.unwrap_or(&self.settings.default_source);
        self.platform.last_known_fix(source)
    }

    /// Remove every registration of `consumer`; safe to call repeatedly
    pub fn unsubscribe(&self, consumer: ConsumerId) {
        let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        self.platform.remove_updates(consumer);
        if registry.remove(&consumer) {
            debug!(consumer = %consumer, "Stopped position updates");
        }
    }

    pub fn is_subscribed(&self, consumer: ConsumerId) -> bool {
        self.registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&consumer)
    }
}
