//! In-memory window record store and expired-record sweep.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::debug;

/// A key that uniquely identifies a tracked caller.
///
/// The key is composed of the limiter scope and the caller identifier, so
/// limiters sharing one store never count against each other's quota.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey {
    /// The limiter scope this record belongs to
    pub scope: String,
    /// The per-caller identifier (typically a client address)
    pub identifier: String,
}

impl StoreKey {
    /// Create a new store key from a scope and caller identifier.
    pub fn new(scope: &str, identifier: &str) -> Self {
        Self {
            scope: scope.to_string(),
            identifier: identifier.to_string(),
        }
    }
}

impl std::fmt::Display for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.scope, self.identifier)
    }
}

/// One counting window for one caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRecord {
    /// Requests counted in the current window
    pub count: u32,
    /// Epoch milliseconds at which this window expires
    pub window_end_ms: i64,
}

impl WindowRecord {
    /// Whether this record's window has passed at `now_ms`.
    ///
    /// A check landing exactly on `window_end_ms` still belongs to the
    /// current window.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms > self.window_end_ms
    }
}

/// The process-wide mapping from caller to window record.
///
/// All mutation goes through [`LimiterStore::with_record`], which holds the
/// write lock across the whole read-modify-write so concurrent checks and the
/// sweep observe consistent records.
pub struct LimiterStore {
    /// Window records indexed by store key
    records: RwLock<HashMap<StoreKey, WindowRecord>>,
}

impl LimiterStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Get a copy of the record for a key.
    ///
    /// Returns `None` if the caller has no live record.
    pub fn get(&self, key: &StoreKey) -> Option<WindowRecord> {
        self.records.read().get(key).copied()
    }

    /// Atomically read, update, and store the record for a key.
    ///
    /// The closure receives the current record (or `None`) and may replace it
    /// in place; clearing the slot removes the record. The write lock is held
    /// for the duration of the closure.
    pub fn with_record<T>(
        &self,
        key: &StoreKey,
        f: impl FnOnce(&mut Option<WindowRecord>) -> T,
    ) -> T {
        let mut records = self.records.write();
        let mut slot = records.remove(key);
        let result = f(&mut slot);
        if let Some(record) = slot {
            records.insert(key.clone(), record);
        }
        result
    }

    /// Remove every record whose window has passed.
    ///
    /// Returns the number of records removed. Live records are left alone, so
    /// a caller mid-window never loses quota state to the sweep.
    pub fn sweep(&self, now_ms: i64) -> usize {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now_ms));
        before - records.len()
    }

    /// Get the number of tracked callers.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the store is tracking any callers.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Remove all records.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.records.write().clear();
    }

    /// Spawn the periodic sweep task.
    ///
    /// The task runs for the life of the process; there is no teardown beyond
    /// process exit.
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick fires immediately; on a fresh store it is a no-op.
            loop {
                ticker.tick().await;
                let removed = store.sweep(Utc::now().timestamp_millis());
                if removed > 0 {
                    debug!(removed, remaining = store.len(), "Swept expired window records");
                }
            }
        })
    }
}

impl Default for LimiterStore {
    fn default() -> Self {
        Self::new()
    }
}
