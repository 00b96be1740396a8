//! Drop queue: holding set while queuing, staggered release afterwards

use rand::Rng;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Usernames waiting for the queue to be released, in arrival order
#[derive(Debug, Default)]
pub struct DropQueue {
    names: Vec<String>,
}

impl DropQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a username; returns false if it is already waiting
    pub fn enqueue(&mut self, username: &str) -> bool {
        if self.contains(username) {
            return false;
        }
        self.names.push(username.to_string());
        true
    }

    pub fn contains(&self, username: &str) -> bool {
        self.names.iter().any(|n| n == username)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }

    /// Empty the holding set, returning everyone in arrival order
    pub fn take_all(&mut self) -> Vec<String> {
        std::mem::take(&mut self.names)
    }
}

/// Releases queued names one at a time with a random gap between drops
#[derive(Debug)]
pub struct QueueDrain {
    pending: VecDeque<String>,
    next_at: Instant,
    min_gap: Duration,
    max_gap: Duration,
}

impl QueueDrain {
    /// The first name is due immediately
    pub fn new(names: Vec<String>, now: Instant, min_gap: Duration, max_gap: Duration) -> Self {
        Self {
            pending: names.into(),
            next_at: now,
            min_gap,
            max_gap: max_gap.max(min_gap),
        }
    }

    /// Next name whose release time has come, if any. The following release
    /// is scheduled from this one's due time, not from `now`.
    pub fn poll<R: Rng + ?Sized>(&mut self, now: Instant, rng: &mut R) -> Option<String> {
        if now < self.next_at {
            return None;
        }
        let name = self.pending.pop_front()?;
        self.next_at += self.gap(rng);
        Some(name)
    }

    fn gap<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let min = self.min_gap.as_millis() as u64;
        let max = self.max_gap.as_millis() as u64;
        if max <= min {
            return self.min_gap;
        }
        Duration::from_millis(rng.gen_range(min..max))
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    pub fn is_finished(&self) -> bool {
        self.pending.is_empty()
    }
}
