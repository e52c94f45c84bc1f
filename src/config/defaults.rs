//! Default configuration values
//!
//! Named constants for all tunable parameters

/// Default position source
pub const DEFAULT_SOURCE: &str = crate::constants::feed::DEFAULT_SOURCE;

/// Default minimum time between position updates, in milliseconds
pub const DEFAULT_MIN_TIME_BETWEEN_UPDATES_MILLIS: u64 = 10_000;

/// Default minimum distance between position updates, in meters
pub const DEFAULT_MIN_DISTANCE_BETWEEN_UPDATES_METERS: u32 = 200;

/// Default search endpoint
pub const DEFAULT_ENDPOINT: &str = crate::constants::api::BAHNQL_URL;

/// Default maximum number of stations per position search
pub const DEFAULT_MAX_RESULTS: u32 = 10;

/// Default search radius in meters
pub const DEFAULT_RADIUS_METERS: u32 = 2000;

/// Default search call timeout in seconds (0 disables it)
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default output format
pub const DEFAULT_FORMAT: &str = "text";

/// Config file name
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Application directory name (for XDG paths)
pub const APP_DIR_NAME: &str = "station-finder";
