// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of "now" for window stamping and eviction.
///
/// Mirrors the clock hook on the concurrency limiter: any monotonic `Fn() -> Instant` works,
/// so tests can drive windows with synthetic time instead of sleeping.
pub type Clock = Arc<dyn Fn() -> Instant + Send + Sync>;

/// The process monotonic clock.
pub fn system_clock() -> Clock {
    Arc::new(Instant::now)
}

/// A clock that only moves when told to.
///
/// Clones share the same offset, so a test can keep one handle and hand a [`Clock`] built from
/// another to the component under test.
#[derive(Clone, Debug)]
pub struct ManualClock {
    base: Instant,
    offset_nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset_nanos: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn now(&self) -> Instant {
        self.base + Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }

    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        // Saturate so the clock never wraps back past earlier readings.
        let _ = self
            .offset_nanos
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |offset| {
                Some(offset.saturating_add(nanos))
            });
    }

    pub fn clock(&self) -> Clock {
        let this = self.clone();
        Arc::new(move || this.now())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}
