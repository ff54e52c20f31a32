// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use tracing::{trace, warn};

use crate::clock::Clock;

/// A per-event payload that knows how to fold itself into the window's running totals.
///
/// `exclude` must undo exactly what `include` did, so the totals always describe the entries
/// currently retained without ever rescanning them.
pub trait Sample {
    type Totals: Default + fmt::Debug;

    fn include(&self, totals: &mut Self::Totals);
    fn exclude(&self, totals: &mut Self::Totals);
}

struct TimedEntry<S> {
    arrival: Instant,
    sample: S,
}

/// Time-ordered log of samples with eviction of everything older than `period`.
///
/// Entries are stamped from the log's own clock at insertion, and a stamp is never allowed to
/// precede the newest entry. Arrival times are therefore non-decreasing, which is what lets
/// [`WindowLog::evict_expired`] find the cutoff with a binary search.
pub struct WindowLog<S: Sample> {
    entries: VecDeque<TimedEntry<S>>,
    totals: S::Totals,
    period: Duration,
    clock: Clock,
}

impl<S: Sample> WindowLog<S> {
    pub fn new(period: Duration, clock: Clock) -> Self {
        Self {
            entries: VecDeque::new(),
            totals: S::Totals::default(),
            period,
            clock,
        }
    }

    pub fn push(&mut self, sample: S) {
        let now = (self.clock)();
        let arrival = match self.entries.back() {
            Some(last) if now < last.arrival => {
                warn!(
                    behind = ?(last.arrival - now),
                    "Clock read earlier than the newest window entry, clamping"
                );
                last.arrival
            }
            _ => now,
        };
        sample.include(&mut self.totals);
        self.entries.push_back(TimedEntry { arrival, sample });
    }

    /// Drops every entry that arrived strictly before `now - period` and returns how many were
    /// dropped. Entries exactly on the cutoff are kept.
    pub fn evict_expired(&mut self) -> usize {
        if self.entries.is_empty() {
            return 0;
        }
        let Some(cutoff) = (self.clock)().checked_sub(self.period) else {
            return 0;
        };
        let expired = self.entries.partition_point(|entry| entry.arrival < cutoff);
        for entry in self.entries.drain(..expired) {
            entry.sample.exclude(&mut self.totals);
        }
        if expired > 0 {
            trace!(expired, retained = self.entries.len(), "Evicted window entries");
        }
        expired
    }

    pub fn totals(&self) -> &S::Totals {
        &self.totals
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Swaps the time source. Only meaningful before the first `push`.
    pub(crate) fn set_clock(&mut self, clock: Clock) {
        self.clock = clock;
    }
}
