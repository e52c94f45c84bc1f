//! Persistent station table
//!
//! The storage engine behind the result store. A table is owned by exactly
//! one storage worker, so implementations need `Send` but not `Sync`.

use crate::error::Result;
use crate::station::Station;
use std::collections::BTreeMap;
use tracing::error;

/// Key-ordered station table keyed by `Station::id`
pub trait StationTable: Send {
    /// Short name used in log messages
    fn name(&self) -> &'static str;

    /// Remove every stored station
    fn delete_all(&mut self) -> Result<()>;

    /// Insert stations, replacing any row with the same id
    fn insert_all(&mut self, stations: &[Station]) -> Result<()>;

    /// All stored stations in key order
    fn query_all(&self) -> Result<Vec<Station>>;

    /// Delete everything, then insert `stations`
    ///
    /// If the insert fails the previous rows are restored and the insert
    /// error is returned. Backends that can do better (a single write, a
    /// transaction) should override this.
    fn replace_all(&mut self, stations: &[Station]) -> Result<()> {
        let previous = self.query_all()?;
        self.delete_all()?;

        if let Err(e) = self.insert_all(stations) {
            let restored = self.delete_all().and_then(|()| self.insert_all(&previous));
            if let Err(restore) = restored {
                error!(table = self.name(), error = %restore, "Failed to restore previous stations");
            }
            return Err(e);
        }
        Ok(())
    }
}

/// In-memory table, lost on drop
#[derive(Debug, Default)]
pub struct MemoryTable {
    rows: BTreeMap<i64, Station>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table pre-populated with `stations`
    pub fn with_stations(stations: impl IntoIterator<Item = Station>) -> Self {
        Self {
            rows: stations.into_iter().map(|s| (s.id, s)).collect(),
        }
    }
}

impl StationTable for MemoryTable {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn delete_all(&mut self) -> Result<()> {
        self.rows.clear();
        Ok(())
    }

    fn insert_all(&mut self, stations: &[Station]) -> Result<()> {
        for station in stations {
            self.rows.insert(station.id, station.clone());
        }
        Ok(())
    }

    fn query_all(&self) -> Result<Vec<Station>> {
        Ok(self.rows.values().cloned().collect())
    }
}
