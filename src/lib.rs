//! station-finder: nearby railway station search
//!
//! A library and CLI tool that follows a device's position, keeps the most
//! trustworthy fix, and looks up railway stations around it.
//!
//! ## Features
//!
//! - Fix arbitration by age, accuracy and source
//! - Permission-gated position feed over a pluggable platform
//! - Single-flight station search with a pluggable backend (1BahnQL)
//! - Local result store with full-replacement writes on one storage thread
//! - CLI with track replay
//!
//! ## Quick Start
//!
//! ```rust
//! use station_finder::position::{is_better_fix, PositionFix};
//!
//! let trusted = PositionFix::new(51.0504, 13.7373, 25.0, 1_000);
//! let candidate = PositionFix::new(51.0505, 13.7374, 10.0, 2_000);
//!
//! // More recent and more accurate: replaces the trusted fix
//! assert!(is_better_fix(Some(&candidate), Some(&trusted)));
//! // Nothing at all is never better
//! assert!(!is_better_fix(None, Some(&trusted)));
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod feed;
pub mod finder;
pub mod format;
pub mod position;
pub mod search;
pub mod station;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use finder::StationFinder;
pub use position::{Coordinates, PositionFix};
pub use station::Station;
