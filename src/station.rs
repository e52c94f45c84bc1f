//! Train station search results

use serde::{Deserialize, Serialize};
use std::fmt;

/// A station returned by the search service
///
/// `id` is the stable station number and the persistence key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub has_wifi: bool,
    #[serde(default)]
    pub has_parking: bool,
    #[serde(default)]
    pub has_stepless_access: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture_url: Option<String>,
}

impl Station {
    /// Create a station with all facility flags off and no picture
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            has_wifi: false,
            has_parking: false,
            has_stepless_access: false,
            picture_url: None,
        }
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Station [id={}, name={}, wifi={}, parking={}, steplessAccess={}]",
            self.id, self.name, self.has_wifi, self.has_parking, self.has_stepless_access
        )
    }
}

/// Parse a "yes"/"no" flag, ignoring case
///
/// Returns `None` for anything else, including empty input.
pub fn parse_yes_no(value: Option<&str>) -> Option<bool> {
    match value?.to_ascii_lowercase().as_str() {
        "yes" => Some(true),
        "no" => Some(false),
        _ => None,
    }
}
