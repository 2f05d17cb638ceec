//! Keyed debounce timers
//!
//! Each key has at most one pending deadline. Scheduling a key again
//! cancels the pending timer and starts a fresh one.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Debouncer statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebouncerStats {
    /// Total `schedule` calls
    pub scheduled: u64,

    /// Pending timers replaced by a newer `schedule` for the same key
    pub superseded: u64,

    /// Timers removed through `cancel` or `cancel_all`
    pub cancelled: u64,

    /// Timers handed out by `take_due`
    pub fired: u64,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    deadline: Instant,
    seq: u64,
}

#[derive(Debug)]
pub struct Debouncer<K> {
    delay: Duration,
    pending: HashMap<K, Pending>,
    next_seq: u64,
    stats: DebouncerStats,
}

impl<K: Eq + Hash + Clone> Debouncer<K> {
    pub fn new(delay: Duration) -> Self {
        Self { delay, pending: HashMap::new(), next_seq: 0, stats: DebouncerStats::default() }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Change the delay used by subsequent `schedule` calls.
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    /// Start (or restart) the timer for `key` at `now + delay`.
    ///
    /// Returns `true` when a pending timer was replaced.
    pub fn schedule(&mut self, key: K, now: Instant) -> bool {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.stats.scheduled += 1;

        let replaced = self.pending.insert(key, Pending { deadline: now + self.delay, seq }).is_some();
        if replaced {
            self.stats.superseded += 1;
        }
        replaced
    }

    /// Drop the pending timer for `key`. Returns `true` if one existed.
    pub fn cancel(&mut self, key: &K) -> bool {
        let removed = self.pending.remove(key).is_some();
        if removed {
            self.stats.cancelled += 1;
        }
        removed
    }

    /// Drop every pending timer, returning how many there were.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        self.stats.cancelled += count as u64;
        count
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    pub fn deadline(&self, key: &K) -> Option<Instant> {
        self.pending.get(key).map(|pending| pending.deadline)
    }

    /// Earliest pending deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|pending| pending.deadline).min()
    }

    /// Remove and return every key whose deadline is at or before `now`,
    /// earliest deadline first and in scheduling order on ties.
    pub fn take_due(&mut self, now: Instant) -> Vec<K> {
        let mut due: Vec<(K, Pending)> = self
            .pending
            .iter()
            .filter(|(_, pending)| pending.deadline <= now)
            .map(|(key, pending)| (key.clone(), *pending))
            .collect();

        due.sort_by_key(|(_, pending)| (pending.deadline, pending.seq));

        for (key, _) in &due {
            self.pending.remove(key);
        }
        self.stats.fired += due.len() as u64;

        due.into_iter().map(|(key, _)| key).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn stats(&self) -> DebouncerStats {
        self.stats
    }
}
