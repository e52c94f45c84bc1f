//! JSON file station table
//!
//! Stores the result set in the XDG data directory
//! (~/.local/share/station-finder/stations.json). Every write goes to a
//! sibling temp file first and is renamed into place, so the file on disk is
//! always a complete snapshot.

use crate::error::{Error, Result};
use crate::station::Station;
use crate::store::table::StationTable;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "station-finder";
const STATIONS_FILE_NAME: &str = "stations.json";

/// Station table persisted as a JSON array
#[derive(Debug)]
pub struct JsonFileTable {
    rows: BTreeMap<i64, Station>,
    path: PathBuf,
}

impl JsonFileTable {
    /// Get the data directory path
    pub fn data_dir() -> Result<PathBuf> {
        dirs::data_dir()
            .map(|p| p.join(APP_DIR_NAME))
            .ok_or_else(|| Error::Config("Could not determine data directory".to_string()))
    }

    /// Get the default stations file path
    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join(STATIONS_FILE_NAME))
    }

    /// Open the table at the default path
    pub fn open() -> Result<Self> {
        Self::open_at(Self::default_path()?)
    }

    /// Open the table at a specific path
    ///
    /// A missing file is an empty table.
    pub fn open_at(path: PathBuf) -> Result<Self> {
        let rows = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| {
                Error::Storage(format!("Failed to read stations file: {}", e))
            })?;

            let stations: Vec<Station> = serde_json::from_str(&content).map_err(|e| {
                Error::Storage(format!("Failed to parse stations file: {}", e))
            })?;

            stations.into_iter().map(|s| (s.id, s)).collect()
        } else {
            BTreeMap::new()
        };

        Ok(Self { rows, path })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::Storage(format!("Failed to create data directory: {}", e))
            })?;
        }

        let stations: Vec<&Station> = self.rows.values().collect();
        let content = serde_json::to_string_pretty(&stations)?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|e| {
            Error::Storage(format!("Failed to write stations file: {}", e))
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            Error::Storage(format!("Failed to replace stations file: {}", e))
        })?;

        Ok(())
    }
}

impl StationTable for JsonFileTable {
    fn name(&self) -> &'static str {
        "json-file"
    }

    fn delete_all(&mut self) -> Result<()> {
        self.rows.clear();
        self.persist()
    }

    fn insert_all(&mut self, stations: &[Station]) -> Result<()> {
        for station in stations {
            self.rows.insert(station.id, station.clone());
        }
        self.persist()
    }

    fn query_all(&self) -> Result<Vec<Station>> {
        Ok(self.rows.values().cloned().collect())
    }

    // One rename instead of an intermediate empty file
    fn replace_all(&mut self, stations: &[Station]) -> Result<()> {
        let previous = std::mem::take(&mut self.rows);
        for station in stations {
            self.rows.insert(station.id, station.clone());
        }

        if let Err(e) = self.persist() {
            self.rows = previous;
            return Err(e);
        }
        Ok(())
    }
}
