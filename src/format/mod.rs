//! Output formatters
//!
//! Provides trait-based output formatting for station results.

pub mod json;
pub mod text;

use crate::error::Result;
use crate::position::PositionFix;
use crate::station::Station;
use serde::{Deserialize, Serialize};

/// Information about an output format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatInfo {
    /// Format name
    pub name: String,
    /// Format description
    pub description: String,
}

/// Everything a command prints: what was asked, from where, and the stations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StationReport {
    /// Human-readable description of the search, if one ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Position the search was made from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<PositionFix>,
    pub stations: Vec<Station>,
}

impl StationReport {
    pub fn new(stations: Vec<Station>) -> Self {
        Self {
            stations,
            ..Self::default()
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_fix(mut self, fix: Option<PositionFix>) -> Self {
        self.fix = fix;
        self
    }
}

/// Trait for output formatters
pub trait OutputFormatter: Send + Sync {
    /// Get the format name
    fn name(&self) -> &str;

    /// Get the format description
    fn description(&self) -> &str;

    /// Format a station report
    fn format(&self, report: &StationReport) -> Result<String>;
}

/// Get a formatter by name
pub fn get_formatter(name: &str) -> Option<Box<dyn OutputFormatter>> {
    match name.to_lowercase().as_str() {
        "json" => Some(Box::new(json::JsonFormatter)),
        "text" => Some(Box::new(text::TextFormatter)),
        _ => None,
    }
}

/// List all available formatters
pub fn available_formats() -> Vec<FormatInfo> {
    vec![
        FormatInfo {
            name: "json".to_string(),
            description: "Full JSON report".to_string(),
        },
        FormatInfo {
            name: "text".to_string(),
            description: "Human-readable text".to_string(),
        },
    ]
}
