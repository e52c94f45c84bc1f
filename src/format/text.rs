//! Human-readable text output formatter

use crate::error::Result;
use crate::format::{OutputFormatter, StationReport};

/// Text formatter - outputs a human-readable station list
pub struct TextFormatter;

impl OutputFormatter for TextFormatter {
    fn name(&self) -> &str {
        "text"
    }

    fn description(&self) -> &str {
        "Human-readable text"
    }

    fn format(&self, report: &StationReport) -> Result<String> {
        let mut output = String::new();

        // Header
        if let Some(query) = &report.query {
            output.push_str(&format!("Search: {}\n", query));
        }
        if let Some(fix) = &report.fix {
            output.push_str(&format!(
                "Position: ({:.6}, {:.6}) ±{:.0}m",
                fix.latitude, fix.longitude, fix.accuracy_meters
            ));
            if let Some(source) = &fix.source_id {
                output.push_str(&format!(" [{}]", source));
            }
            if let Some(at) = fix.captured_at() {
                output.push_str(&format!(" at {}", at.format("%Y-%m-%d %H:%M:%S UTC")));
            }
            output.push('\n');
        }
        if !output.is_empty() {
            output.push('\n');
        }

        if report.stations.is_empty() {
            output.push_str("No stations found\n");
            return Ok(output);
        }

        output.push_str(&format!("Stations ({}):\n", report.stations.len()));
        for station in &report.stations {
            let mut features = Vec::new();
            if station.has_wifi {
                features.push("wifi");
            }
            if station.has_parking {
                features.push("parking");
            }
            if station.has_stepless_access {
                features.push("stepless");
            }

            output.push_str(&format!("  {:>8}  {}", station.id, station.name));
            if !features.is_empty() {
                output.push_str(&format!(" ({})", features.join(", ")));
            }
            output.push('\n');
        }

        Ok(output)
    }
}
