//! Local result store
//!
//! Holds the stations found by the most recent completed search. All table
//! access is serialized through one dedicated storage thread, so callers
//! never block on storage I/O and writes apply in enqueue order.
//!
//! Readers observe the result set through a `watch` channel that is only
//! updated after a replacement has fully completed: they see either the
//! previous full set or the new full set, never a partial table.

pub mod file;
pub mod table;

use crate::error::{Error, Result};
use crate::station::Station;
use std::sync::Mutex;
use std::thread;
use table::StationTable;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info};

pub use file::JsonFileTable;
pub use table::MemoryTable;

/// Work items for the storage thread
enum StoreCommand {
    ReplaceAll(Vec<Station>),
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// Result store backed by a single storage worker
#[derive(Debug)]
pub struct ResultStore {
    commands: mpsc::UnboundedSender<StoreCommand>,
    stations: watch::Receiver<Vec<Station>>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl ResultStore {
    /// Start the storage worker for `table`
    ///
    /// The current table contents become the initial snapshot.
    pub fn open<T: StationTable + 'static>(table: T) -> Result<Self> {
        let initial = table.query_all()?;
        info!(
            table = table.name(),
            stations = initial.len(),
            "Opening result store"
        );

        let (commands, receiver) = mpsc::unbounded_channel();
        let (publisher, stations) = watch::channel(initial);

        let worker = thread::Builder::new()
            .name("station-store".to_string())
            .spawn(move || run_worker(table, receiver, publisher))?;

        Ok(Self {
            commands,
            stations,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Replace the whole result set with `stations`
    ///
    /// Returns immediately; the write happens on the storage thread.
    pub fn replace_all(&self, stations: Vec<Station>) {
        let count = stations.len();
        if self.commands.send(StoreCommand::ReplaceAll(stations)).is_err() {
            error!(stations = count, "Result store is closed, dropping replacement");
        }
    }

    /// Live view of the stored stations
    pub fn current_stations(&self) -> watch::Receiver<Vec<Station>> {
        self.stations.clone()
    }

    /// The latest published result set
    pub fn snapshot(&self) -> Vec<Station> {
        self.stations.borrow().clone()
    }

    /// Wait until every previously enqueued write has been applied
    pub async fn flush(&self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(StoreCommand::Flush(ack))
            .map_err(|_| Error::Storage("Result store is closed".to_string()))?;
        done.await
            .map_err(|_| Error::Storage("Result store worker stopped".to_string()))
    }

    /// Apply pending writes and stop the storage worker
    pub async fn shutdown(&self) -> Result<()> {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        let Some(handle) = handle else {
            return Ok(());
        };

        // Ignored: the worker may already have exited on its own
        let _ = self.commands.send(StoreCommand::Shutdown);

        tokio::task::spawn_blocking(move || handle.join())
            .await
            .map_err(|e| Error::Storage(format!("Failed to join result store worker: {}", e)))?
            .map_err(|_| Error::Storage("Result store worker panicked".to_string()))
    }
}

fn run_worker<T: StationTable>(
    mut table: T,
    mut commands: mpsc::UnboundedReceiver<StoreCommand>,
    publisher: watch::Sender<Vec<Station>>,
) {
    while let Some(command) = commands.blocking_recv() {
        match command {
            StoreCommand::ReplaceAll(stations) => {
                debug!(
                    table = table.name(),
                    "Replacing stored stations with {}",
                    stations
                        .iter()
                        .map(|s| s.to_string())
                        .collect::<Vec<_>>()
                        .join("|")
                );

                match table.replace_all(&stations).and_then(|_| table.query_all()) {
                    Ok(rows) => {
                        publisher.send_replace(rows);
                    }
                    Err(e) => {
                        error!(table = table.name(), error = %e, "Failed to replace stored stations");
                    }
                }
            }
            StoreCommand::Flush(ack) => {
                let _ = ack.send(());
            }
            StoreCommand::Shutdown => break,
        }
    }
    debug!(table = table.name(), "Result store worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Table whose inserts always fail after deleting
    struct FailingTable {
        inner: MemoryTable,
    }

    impl StationTable for FailingTable {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn delete_all(&mut self) -> Result<()> {
            self.inner.delete_all()
        }

        fn insert_all(&mut self, _stations: &[Station]) -> Result<()> {
            Err(Error::Storage("disk full".to_string()))
        }

        fn query_all(&self) -> Result<Vec<Station>> {
            self.inner.query_all()
        }
    }

    fn s(id: i64) -> Station {
        Station::new(id, format!("Station {}", id))
    }

    #[tokio::test]
    async fn test_initial_snapshot_from_table() {
        let store = ResultStore::open(MemoryTable::with_stations([s(1), s(2)])).unwrap();
        assert_eq!(store.snapshot(), vec![s(1), s(2)]);
    }

    #[tokio::test]
    async fn test_replace_all_is_full_replacement() {
        let store = ResultStore::open(MemoryTable::new()).unwrap();

        store.replace_all(vec![s(1), s(2)]);
        store.replace_all(vec![s(3)]);
        store.flush().await.unwrap();

        assert_eq!(store.snapshot(), vec![s(3)]);
    }

    #[tokio::test]
    async fn test_replace_all_with_empty_clears() {
        let store = ResultStore::open(MemoryTable::with_stations([s(1)])).unwrap();
        store.replace_all(Vec::new());
        store.flush().await.unwrap();
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_writes_apply_in_fifo_order() {
        let store = ResultStore::open(MemoryTable::new()).unwrap();
        for id in 0..50 {
            store.replace_all(vec![s(id)]);
        }
        store.flush().await.unwrap();
        assert_eq!(store.snapshot(), vec![s(49)]);
    }

    #[tokio::test]
    async fn test_observers_only_see_full_snapshots() {
        let store = ResultStore::open(MemoryTable::new()).unwrap();
        let mut view = store.current_stations();

        let first = vec![s(1), s(2)];
        let second = vec![s(3)];

        let observer = {
            let first = first.clone();
            let second = second.clone();
            tokio::spawn(async move {
                loop {
                    let current = view.borrow_and_update().clone();
                    assert!(
                        current.is_empty() || current == first || current == second,
                        "observed partial state {:?}",
                        current
                    );
                    if current == second {
                        break;
                    }
                    if view.changed().await.is_err() {
                        break;
                    }
                }
            })
        };

        store.replace_all(first);
        store.replace_all(second.clone());
        store.flush().await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), observer)
            .await
            .expect("observer timed out")
            .unwrap();
        assert_eq!(store.snapshot(), second);
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_snapshot() {
        let table = FailingTable {
            inner: MemoryTable::with_stations([s(1)]),
        };
        let store = ResultStore::open(table).unwrap();

        store.replace_all(vec![s(2)]);
        store.flush().await.unwrap();

        assert_eq!(store.snapshot(), vec![s(1)]);
    }

    #[tokio::test]
    async fn test_shutdown_stops_worker() {
        let store = ResultStore::open(MemoryTable::new()).unwrap();
        store.replace_all(vec![s(1)]);
        store.shutdown().await.unwrap();

        assert_eq!(store.snapshot(), vec![s(1)]);

        // Closed store: writes are dropped, flush reports the closure
        store.replace_all(vec![s(2)]);
        assert!(store.flush().await.is_err());
        assert!(store.shutdown().await.is_ok());
    }
}
