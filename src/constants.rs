//! Centralized constants for the station-finder crate
//!
//! Values shared by more than one module live here so the feed, the
//! search layer and the CLI agree on them.

/// Geographic constants
pub mod geo {
    /// Mean Earth radius in meters (WGS84 approximation)
    pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;
}

/// Position feed constants
pub mod feed {
    /// Permission that guards every platform subscription and last-known-fix query
    pub const FINE_LOCATION_PERMISSION: &str = "location.fine";

    /// Source used when a subscriber names none
    pub const DEFAULT_SOURCE: &str = "gps";
}

/// External API endpoints
pub mod api {
    /// Deutsche Bahn 1BahnQL GraphQL endpoint
    pub const BAHNQL_URL: &str = "https://developer.deutschebahn.com/free1bahnql/graphql";
}
