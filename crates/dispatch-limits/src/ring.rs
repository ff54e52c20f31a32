// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Count-based rolling counters over the last N observations.
//!
//! - [`EventCounter`]: boolean outcomes, reports the share of `true` as a percentage. Internally
//!   locked so it can be shared between the dispatch loop and reporters.
//! - [`SumCounter`]: numeric observations, reports a mean. Mutation takes `&mut self`; callers
//!   that share one across threads must wrap it themselves.

use parking_lot::Mutex;

use crate::error::{Error, Result};

/// Fixed slot storage with a wrapping cursor and a saturating fill count.
#[derive(Debug)]
struct RingWindow<T> {
    slots: Vec<T>,
    cursor: usize,
    filled: usize,
}

impl<T: Copy + Default> RingWindow<T> {
    fn new(capacity: usize, counter: &str) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::invalid_argument(format!(
                "{counter} capacity must be greater than 0"
            )));
        }
        Ok(Self {
            slots: vec![T::default(); capacity],
            cursor: 0,
            filled: 0,
        })
    }

    /// Writes `value` into the oldest slot and returns what it replaced.
    fn push(&mut self, value: T) -> T {
        let old = std::mem::replace(&mut self.slots[self.cursor], value);
        self.cursor = (self.cursor + 1) % self.slots.len();
        if self.filled < self.slots.len() {
            self.filled += 1;
        }
        old
    }

    fn filled(&self) -> usize {
        self.filled
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[derive(Debug)]
struct EventState {
    ring: RingWindow<bool>,
    count: usize,
}

/// Counts `true` outcomes (errors, successful sends, ...) among the last N events.
#[derive(Debug)]
pub struct EventCounter {
    state: Mutex<EventState>,
}

impl EventCounter {
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            state: Mutex::new(EventState {
                ring: RingWindow::new(capacity, "event counter")?,
                count: 0,
            }),
        })
    }

    pub fn event(&self, what: bool) {
        let mut state = self.state.lock();
        let old = state.ring.push(what);
        match (old, what) {
            (false, true) => state.count += 1,
            (true, false) => state.count = state.count.saturating_sub(1),
            _ => {}
        }
    }

    /// Number of `true` events still in the window.
    pub fn count(&self) -> usize {
        self.state.lock().count
    }

    /// Number of slots holding real events, at most the capacity.
    pub fn total(&self) -> usize {
        self.state.lock().ring.filled()
    }

    /// Share of `true` events in `[0, 100]`; 0 before the first event.
    pub fn percentage(&self) -> f64 {
        let state = self.state.lock();
        let total = state.ring.filled();
        if total == 0 {
            return 0.0;
        }
        state.count as f64 * 100.0 / total as f64
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().ring.capacity()
    }
}

/// Sums numeric observations (bytes sent, queue depth, ...) over the last N events.
#[derive(Debug)]
pub struct SumCounter {
    ring: RingWindow<u64>,
    /// Exact sum of the retained values; `capacity` values of at most `u64::MAX` fit in a u128.
    sum: u128,
}

impl SumCounter {
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            ring: RingWindow::new(capacity, "sum counter")?,
            sum: 0,
        })
    }

    pub fn event(&mut self, value: u64) {
        let old = self.ring.push(value);
        if old != value {
            self.sum = self.sum - u128::from(old) + u128::from(value);
        }
    }

    /// Sum of the retained values, clamped to `u64::MAX` while it does not fit.
    pub fn sum(&self) -> u64 {
        u64::try_from(self.sum).unwrap_or(u64::MAX)
    }

    pub fn total(&self) -> usize {
        self.ring.filled()
    }

    /// Arithmetic mean of the retained values; 0 before the first event.
    pub fn mean(&self) -> f64 {
        let total = self.ring.filled();
        if total == 0 {
            return 0.0;
        }
        self.sum as f64 / total as f64
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}
