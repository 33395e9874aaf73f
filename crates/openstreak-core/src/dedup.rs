//! Short-lived idempotency cache for webhook deliveries.
//!
//! Webhook senders retry, and email clients fire the same tracking ping more
//! than once. The tracker records each event's [`Fingerprint`] here before
//! touching storage; a fingerprint already present within the window is
//! reported as a duplicate and the event is dropped.
//!
//! State is process-local and never persisted. Each entry carries its own
//! deadline on a monotonic clock, so expiry needs no background timer: stale
//! entries are ignored on lookup and swept whenever a new one is recorded.
//! The check and the insert share one lock, so a recorded fingerprint can
//! never look available before its deadline.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::event::Fingerprint;

/// Default grace window for duplicate deliveries.
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(5);

/// Source of monotonic time for entry deadlines.
pub trait MonotonicClock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;
}

/// The process monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl MonotonicClock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.elapsed.lock()
    }
}

impl<C: MonotonicClock> MonotonicClock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Time-scoped set of recently processed fingerprints.
///
/// Implementations must be safe to share across request handlers.
pub trait DedupStore: Send + Sync {
    /// Whether `fingerprint` was recorded and has not expired yet.
    fn seen(&self, fingerprint: &Fingerprint) -> bool;

    /// Record `fingerprint`, (re)starting its expiry window.
    fn record(&self, fingerprint: &Fingerprint);

    /// Atomically record `fingerprint` if it is not live.
    ///
    /// Returns `true` when the fingerprint was novel and is now recorded,
    /// `false` when it is a duplicate within the window.
    fn check_and_record(&self, fingerprint: &Fingerprint) -> bool;

    /// Release `fingerprint` before its window ends.
    fn forget(&self, fingerprint: &Fingerprint);
}

/// In-memory [`DedupStore`] with a per-entry deadline.
#[derive(Debug)]
pub struct InMemoryDedup<C: MonotonicClock = SystemClock> {
    window: Duration,
    clock: C,
    deadlines: Mutex<HashMap<blake3::Hash, Instant>>,
}

impl InMemoryDedup<SystemClock> {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self::with_clock(window, SystemClock)
    }
}

impl Default for InMemoryDedup<SystemClock> {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_WINDOW)
    }
}

impl<C: MonotonicClock> InMemoryDedup<C> {
    pub fn with_clock(window: Duration, clock: C) -> Self {
        Self {
            window,
            clock,
            deadlines: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Number of live (unexpired) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.deadlines
            .lock()
            .values()
            .filter(|deadline| **deadline > now)
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut deadlines = self.deadlines.lock();
        let before = deadlines.len();
        deadlines.retain(|_, deadline| *deadline > now);
        before - deadlines.len()
    }
}

impl<C: MonotonicClock> DedupStore for InMemoryDedup<C> {
    fn seen(&self, fingerprint: &Fingerprint) -> bool {
        let now = self.clock.now();
        self.deadlines
            .lock()
            .get(fingerprint.digest())
            .is_some_and(|deadline| *deadline > now)
    }

    fn record(&self, fingerprint: &Fingerprint) {
        let now = self.clock.now();
        let mut deadlines = self.deadlines.lock();
        deadlines.retain(|_, deadline| *deadline > now);
        deadlines.insert(*fingerprint.digest(), now + self.window);
    }

    fn check_and_record(&self, fingerprint: &Fingerprint) -> bool {
        let now = self.clock.now();
        let mut deadlines = self.deadlines.lock();
        deadlines.retain(|_, deadline| *deadline > now);
        if deadlines.contains_key(fingerprint.digest()) {
            return false;
        }
        deadlines.insert(*fingerprint.digest(), now + self.window);
        true
    }

    fn forget(&self, fingerprint: &Fingerprint) {
        self.deadlines.lock().remove(fingerprint.digest());
    }
}
