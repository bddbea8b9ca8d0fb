//! Event Store - blocking side of the async-to-sync bridge.
//!
//! Maps correlation IDs to the most recent RESPONSE event that carried them.
//! The session's delivery thread publishes; the driver thread waits.
//!
//! Flow:
//! 1. Driver picks a CorrelationId and sends the request
//! 2. Driver calls `wait_for()` / `wait_for_timeout()` and parks
//! 3. Delivery thread receives the response and calls `publish()`
//! 4. Driver wakes, reads the event, extracts what it needs
//! 5. Driver calls `remove()`
//!
//! The map and the condition variable share one mutex, so a publish that
//! lands before the waiter's presence check is always seen.

use crate::error::{LatencyError, LatencyResult};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};
use venue_types::{CorrelationId, Event};

/// Statistics for the event store
#[derive(Debug, Default)]
pub struct StoreStats {
    /// Total publishes (including overwrites)
    pub total_published: AtomicU64,
    /// Publishes that replaced an unconsumed entry
    pub total_overwritten: AtomicU64,
    /// Waits that returned an event
    pub total_consumed: AtomicU64,
    /// Waits that hit their deadline
    pub total_timeouts: AtomicU64,
    /// Removals of present entries
    pub total_removed: AtomicU64,
}

/// Thread-safe correlation map with blocking lookup.
pub struct EventStore {
    entries: Mutex<HashMap<CorrelationId, Event>>,
    /// Broadcast on every publish; waiters recheck their own id.
    published: Condvar,
    stats: StoreStats,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            published: Condvar::new(),
            stats: StoreStats::default(),
        }
    }

    /// Insert or overwrite the event for `correlation_id` and wake all waiters.
    pub fn publish(&self, correlation_id: CorrelationId, event: Event) {
        let replaced = {
            let mut entries = self.entries.lock();
            trace!(correlation_id = %correlation_id, "Publishing event");
            entries.insert(correlation_id.clone(), event).is_some()
        };
        self.published.notify_all();

        self.stats.total_published.fetch_add(1, Ordering::Relaxed);
        if replaced {
            self.stats.total_overwritten.fetch_add(1, Ordering::Relaxed);
            warn!(
                correlation_id = %correlation_id,
                "Overwrote unconsumed event for correlation ID"
            );
        } else {
            debug!(correlation_id = %correlation_id, "Published event");
        }
    }

    /// Block until an entry for `correlation_id` exists and return a copy of it.
    ///
    /// Waits indefinitely. Prefer [`EventStore::wait_for_timeout`].
    pub fn wait_for(&self, correlation_id: &CorrelationId) -> Event {
        let mut entries = self.entries.lock();
        loop {
            if let Some(event) = entries.get(correlation_id) {
                self.stats.total_consumed.fetch_add(1, Ordering::Relaxed);
                return event.clone();
            }
            self.published.wait(&mut entries);
        }
    }

    /// Block until an entry for `correlation_id` exists or `timeout` elapses.
    pub fn wait_for_timeout(
        &self,
        correlation_id: &CorrelationId,
        timeout: Duration,
    ) -> LatencyResult<Event> {
        let deadline = Instant::now() + timeout;
        let mut entries = self.entries.lock();
        loop {
            if let Some(event) = entries.get(correlation_id) {
                self.stats.total_consumed.fetch_add(1, Ordering::Relaxed);
                return Ok(event.clone());
            }
            if self.published.wait_until(&mut entries, deadline).timed_out() {
                // The lock is held again here; one last look before giving up.
                if let Some(event) = entries.get(correlation_id) {
                    self.stats.total_consumed.fetch_add(1, Ordering::Relaxed);
                    return Ok(event.clone());
                }
                self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
                return Err(LatencyError::CorrelationTimeout {
                    correlation_id: correlation_id.clone(),
                    timeout,
                });
            }
        }
    }

    /// Wait with an optional deadline; `None` blocks indefinitely.
    pub fn wait(
        &self,
        correlation_id: &CorrelationId,
        timeout: Option<Duration>,
    ) -> LatencyResult<Event> {
        match timeout {
            Some(timeout) => self.wait_for_timeout(correlation_id, timeout),
            None => Ok(self.wait_for(correlation_id)),
        }
    }

    /// Delete the entry for `correlation_id`.
    ///
    /// Returns true if an entry was present. Absent ids are a no-op.
    pub fn remove(&self, correlation_id: &CorrelationId) -> bool {
        let removed = self.entries.lock().remove(correlation_id).is_some();
        if removed {
            self.stats.total_removed.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Check if an entry is present for `correlation_id`
    pub fn contains(&self, correlation_id: &CorrelationId) -> bool {
        self.entries.lock().contains_key(correlation_id)
    }

    /// Number of entries currently held
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new()
    }
}
