//! Windowed counter store.
//!
//! Maps client identities to fixed-window counting records. One mutex guards
//! the whole map: contention is per-gateway-process and low, and it keeps
//! `observe` atomic end to end, so no caller can see a record mid-update.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::clock::Clock;
use super::identity::ClientId;

/// A single client's counting record for the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterRecord {
    /// Requests observed in the current window, including the current one
    pub count: u64,
    /// Absolute time the window ends, epoch milliseconds
    pub reset_at_ms: i64,
}

/// Fixed-window counter store keyed by client identity.
pub struct CounterStore {
    records: Mutex<HashMap<ClientId, CounterRecord>>,
    clock: Arc<dyn Clock>,
}

impl CounterStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Current time as seen by the store's clock, epoch milliseconds.
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Record one observation of `key` and return the updated record.
    ///
    /// Creates a fresh record (`count = 1`) on first observation or when the
    /// previous window has elapsed; expired records are replaced, never
    /// merged. This is a fixed window: a burst straddling a window boundary
    /// can momentarily admit up to twice the per-window ceiling within a
    /// short real-time span. Documented behavior, not a bug.
    pub fn observe(&self, key: &ClientId, window_ms: u64) -> CounterRecord {
        let now = self.clock.now_ms();
        let fresh = CounterRecord {
            count: 1,
            reset_at_ms: now + window_ms as i64,
        };
        let mut records = self.records.lock();

        match records.entry(key.clone()) {
            std::collections::hash_map::Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                if record.reset_at_ms > now {
                    record.count += 1;
                } else {
                    *record = fresh;
                }
                *record
            }
            std::collections::hash_map::Entry::Vacant(vacant) => *vacant.insert(fresh),
        }
    }

    /// Apply a signed adjustment to an existing record's count.
    ///
    /// Saturates at zero; no-op if the key is absent.
    pub fn adjust(&self, key: &ClientId, delta: i64) {
        let mut records = self.records.lock();
        if let Some(record) = records.get_mut(key) {
            record.count = if delta < 0 {
                record.count.saturating_sub(delta.unsigned_abs())
            } else {
                record.count.saturating_add(delta as u64)
            };
        }
    }

    /// Read a record without mutating it.
    pub fn peek(&self, key: &ClientId) -> Option<CounterRecord> {
        self.records.lock().get(key).copied()
    }

    /// Delete every record whose window ended before `now_ms`.
    ///
    /// Returns the number of records removed. Runs on a timer independent of
    /// request traffic so idle clients do not accumulate.
    pub fn sweep(&self, now_ms: i64) -> usize {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|_, record| record.reset_at_ms >= now_ms);
        before - records.len()
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawn the periodic sweep task for this store.
    ///
    /// The task runs until the returned handle is shut down.
    pub fn spawn_sweeper(store: Arc<CounterStore>, every: Duration) -> SweeperTask {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately; harmless against an empty map.
            loop {
                ticker.tick().await;
                let removed = store.sweep(store.now_ms());
                if removed > 0 {
                    debug!(removed, remaining = store.len(), "Swept expired counters");
                }
            }
        });
        SweeperTask { handle }
    }
}

/// Handle to the background sweep task, owned by the server lifecycle.
pub struct SweeperTask {
    handle: tokio::task::JoinHandle<()>,
}

impl SweeperTask {
    /// Stop the sweep task.
    pub fn shutdown(self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::clock::ManualClock;
    use axum::http::HeaderMap;

    fn store_at(start_ms: i64) -> (Arc<CounterStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start_ms));
        let store = Arc::new(CounterStore::new(clock.clone()));
        (store, clock)
    }

    fn key(name: &str) -> ClientId {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-real-ip",
            axum::http::HeaderValue::from_str(name).unwrap(),
        );
        ClientId::derive(None, &headers)
    }

    #[test]
    fn test_first_observation_creates_record() {
        let (store, _) = store_at(1_000);
        let record = store.observe(&key("1.1.1.1"), 60_000);

        assert_eq!(record.count, 1);
        assert_eq!(record.reset_at_ms, 61_000);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_observations_increment_within_window() {
        let (store, clock) = store_at(0);
        let k = key("1.1.1.1");

        store.observe(&k, 60_000);
        clock.advance(1_000);
        let record = store.observe(&k, 60_000);

        assert_eq!(record.count, 2);
        // Reset time is anchored at the first observation.
        assert_eq!(record.reset_at_ms, 60_000);
    }

    #[test]
    fn test_elapsed_window_replaces_record() {
        let (store, clock) = store_at(0);
        let k = key("1.1.1.1");

        for _ in 0..5 {
            store.observe(&k, 1_000);
        }
        clock.advance(1_000);

        let record = store.observe(&k, 1_000);
        assert_eq!(record.count, 1);
        assert_eq!(record.reset_at_ms, 2_000);
    }

    #[test]
    fn test_adjust_refunds_and_saturates() {
        let (store, _) = store_at(0);
        let k = key("1.1.1.1");

        store.observe(&k, 60_000);
        store.observe(&k, 60_000);
        store.adjust(&k, -1);
        assert_eq!(store.peek(&k).unwrap().count, 1);

        store.adjust(&k, -5);
        assert_eq!(store.peek(&k).unwrap().count, 0);
    }

    #[test]
    fn test_adjust_absent_key_is_noop() {
        let (store, _) = store_at(0);
        store.adjust(&key("ghost"), -1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let (store, clock) = store_at(0);
        store.observe(&key("short"), 1_000);
        store.observe(&key("long"), 120_000);

        clock.advance(2_000);
        let removed = store.sweep(clock.now_ms());

        assert_eq!(removed, 1);
        assert_eq!(store.len(), 1);
        assert!(store.peek(&key("long")).is_some());
        assert!(store.peek(&key("short")).is_none());
    }

    #[test]
    fn test_distinct_keys_are_independent() {
        let (store, _) = store_at(0);
        store.observe(&key("1.1.1.1"), 60_000);
        store.observe(&key("1.1.1.1"), 60_000);
        store.observe(&key("2.2.2.2"), 60_000);

        assert_eq!(store.peek(&key("1.1.1.1")).unwrap().count, 2);
        assert_eq!(store.peek(&key("2.2.2.2")).unwrap().count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_task_evicts_and_stops() {
        let (store, clock) = store_at(0);
        store.observe(&key("1.1.1.1"), 1_000);
        clock.advance(5_000);

        let sweeper = CounterStore::spawn_sweeper(store.clone(), Duration::from_secs(60));
        tokio::time::advance(Duration::from_secs(61)).await;
        // Let the sweep task run its pending tick.
        tokio::task::yield_now().await;

        assert!(store.is_empty());
        sweeper.shutdown();
    }
}
