// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Measured throughput of a downstream resource over a trailing time window.
//!
//! The assessor counts work as it is issued (`add`) and reports how much of it, in size units
//! and in tasks, was issued per second during the last `period`. Recomputing the published
//! numbers is batched: it happens once per `power` insertions and once per `power` evictions, and
//! immediately when the window empties so the rate drops to zero as soon as traffic stops.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::clock::{system_clock, Clock};
use crate::error::{Error, Result};
use crate::window::{Sample, WindowLog};

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Common interface of throughput assessors.
pub trait ThroughputAssessor {
    /// Record one unit of issued work of the given size.
    fn add(&mut self, size: u64);
    /// Evict work older than the analysis period.
    fn cleanup(&mut self);
    /// Size units per second, per unit of power, as of the last recomputation.
    fn performance_in_size(&self) -> f64;
    /// Tasks per second, per unit of power, as of the last recomputation.
    fn performance_in_tasks(&self) -> f64;
    fn active(&self) -> bool;
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssessorKind {
    Dummy,
    #[default]
    Simple,
}

impl fmt::Display for AssessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dummy => f.write_str("dummy"),
            Self::Simple => f.write_str("simple"),
        }
    }
}

impl FromStr for AssessorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dummy" => Ok(Self::Dummy),
            "simple" => Ok(Self::Simple),
            other => Err(Error::invalid_argument(format!(
                "Incorrect performance assessor kind: {other}"
            ))),
        }
    }
}

struct ExecutedTask {
    size: u64,
}

impl Sample for ExecutedTask {
    type Totals = u128;

    fn include(&self, sum_size: &mut u128) {
        *sum_size += u128::from(self.size);
    }

    fn exclude(&self, sum_size: &mut u128) {
        *sum_size -= u128::from(self.size);
    }
}

/// Windowed throughput assessor.
///
/// `power` is how many tasks the downstream handles at once; published figures are divided by
/// it so they describe a single unit of that capacity.
pub struct WindowedAssessor {
    log: WindowLog<ExecutedTask>,
    power: u32,
    /// Insertions since the last recomputation.
    pending_in: u32,
    /// Evictions since the last recomputation.
    pending_out: u32,
    in_size: f64,
    in_tasks: f64,
}

impl WindowedAssessor {
    pub fn new(period: Duration, power: u32) -> Result<Self> {
        if period.is_zero() {
            return Err(Error::invalid_argument(
                "performance assessor period must be greater than 0",
            ));
        }
        if power == 0 {
            return Err(Error::invalid_argument(
                "performance assessor power must be greater than 0",
            ));
        }
        let mut assessor = Self {
            log: WindowLog::new(period, system_clock()),
            power,
            pending_in: 0,
            pending_out: 0,
            in_size: 0.0,
            in_tasks: 0.0,
        };
        assessor.assess();
        Ok(assessor)
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.log.set_clock(clock);
        self
    }

    pub fn period(&self) -> Duration {
        self.log.period()
    }

    pub fn power(&self) -> u32 {
        self.power
    }

    pub fn tasks_in_window(&self) -> usize {
        self.log.len()
    }

    fn assess(&mut self) {
        let period_nanos = self.log.period().as_nanos() as f64;
        let power = self.power as f64;
        self.in_size = *self.log.totals() as f64 * NANOS_PER_SEC / period_nanos / power;
        self.in_tasks = self.log.len() as f64 * NANOS_PER_SEC / period_nanos / power;
        trace!(
            in_size = self.in_size,
            in_tasks = self.in_tasks,
            "Assessed throughput"
        );
    }
}

impl ThroughputAssessor for WindowedAssessor {
    fn add(&mut self, size: u64) {
        self.log.push(ExecutedTask { size });
        self.pending_in += 1;
        if self.pending_in == self.power {
            self.pending_in = 0;
            self.pending_out = 0;
            self.assess();
        }
    }

    fn cleanup(&mut self) {
        if self.log.is_empty() {
            return;
        }
        let evicted = self.log.evict_expired();
        self.pending_out = self
            .pending_out
            .saturating_add(u32::try_from(evicted).unwrap_or(u32::MAX));
        if self.log.is_empty() {
            self.assess();
        }
        if self.pending_out >= self.power {
            self.pending_out = 0;
            self.assess();
        }
    }

    fn performance_in_size(&self) -> f64 {
        self.in_size
    }

    fn performance_in_tasks(&self) -> f64 {
        self.in_tasks
    }

    fn active(&self) -> bool {
        true
    }
}

/// Stand-in used when throughput assessment is switched off. Reports nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct DummyAssessor;

impl ThroughputAssessor for DummyAssessor {
    fn add(&mut self, _size: u64) {}

    fn cleanup(&mut self) {}

    fn performance_in_size(&self) -> f64 {
        0.0
    }

    fn performance_in_tasks(&self) -> f64 {
        0.0
    }

    fn active(&self) -> bool {
        false
    }
}

/// An assessor of either kind, as produced by [`assessor_factory`].
pub enum Assessor {
    Dummy(DummyAssessor),
    Windowed(WindowedAssessor),
}

impl ThroughputAssessor for Assessor {
    fn add(&mut self, size: u64) {
        match self {
            Self::Dummy(a) => a.add(size),
            Self::Windowed(a) => a.add(size),
        }
    }

    fn cleanup(&mut self) {
        match self {
            Self::Dummy(a) => a.cleanup(),
            Self::Windowed(a) => a.cleanup(),
        }
    }

    fn performance_in_size(&self) -> f64 {
        match self {
            Self::Dummy(a) => a.performance_in_size(),
            Self::Windowed(a) => a.performance_in_size(),
        }
    }

    fn performance_in_tasks(&self) -> f64 {
        match self {
            Self::Dummy(a) => a.performance_in_tasks(),
            Self::Windowed(a) => a.performance_in_tasks(),
        }
    }

    fn active(&self) -> bool {
        match self {
            Self::Dummy(a) => a.active(),
            Self::Windowed(a) => a.active(),
        }
    }
}

pub fn assessor_factory(
    kind: AssessorKind,
    period: Duration,
    power: u32,
    clock: Clock,
) -> Result<Assessor> {
    debug!(%kind, ?period, power, "Building performance assessor");
    match kind {
        AssessorKind::Dummy => Ok(Assessor::Dummy(DummyAssessor)),
        AssessorKind::Simple => Ok(Assessor::Windowed(
            WindowedAssessor::new(period, power)?.with_clock(clock),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const PERIOD_MS: u64 = 200;

    fn assessor(period_ms: u64, power: u32) -> (ManualClock, WindowedAssessor) {
        let manual = ManualClock::new();
        let assessor = WindowedAssessor::new(Duration::from_millis(period_ms), power)
            .unwrap()
            .with_clock(manual.clock());
        (manual, assessor)
    }

    fn assert_rates(assessor: &impl ThroughputAssessor, size: f64, tasks: f64) {
        let (got_size, got_tasks) = (
            assessor.performance_in_size(),
            assessor.performance_in_tasks(),
        );
        assert!(
            (got_size - size).abs() < 1e-6,
            "in_size: expected {size}, got {got_size}"
        );
        assert!(
            (got_tasks - tasks).abs() < 1e-6,
            "in_tasks: expected {tasks}, got {got_tasks}"
        );
    }

    /// Per-second rate of `x` over the test period.
    fn rate(x: f64) -> f64 {
        x * 1000.0 / PERIOD_MS as f64
    }

    #[test]
    fn fresh_assessor_reports_zero() {
        let (_clock, assessor) = assessor(PERIOD_MS, 1);
        assert_rates(&assessor, 0.0, 0.0);
        assert!(assessor.active());
    }

    #[test]
    fn add_recomputes_every_insertion_with_unit_power() {
        let (_clock, mut assessor) = assessor(PERIOD_MS, 1);
        assessor.add(5);
        assert_rates(&assessor, 25.0, rate(1.0));
        assessor.add(5);
        assert_rates(&assessor, 50.0, rate(2.0));
        assessor.add(2);
        assert_rates(&assessor, rate(12.0), rate(3.0));
    }

    #[test]
    fn cleanup_evicts_expired_work() {
        let (clock, mut assessor) = assessor(PERIOD_MS, 1);
        assessor.add(5);

        clock.advance(Duration::from_millis(100));
        assessor.cleanup();
        assert_rates(&assessor, rate(5.0), rate(1.0));

        assessor.add(5);
        assert_rates(&assessor, rate(10.0), rate(2.0));

        clock.advance(Duration::from_millis(150));
        assessor.cleanup();
        assert_rates(&assessor, rate(5.0), rate(1.0));

        clock.advance(Duration::from_millis(150));
        assessor.cleanup();
        assert_rates(&assessor, 0.0, 0.0);
        assert_eq!(assessor.tasks_in_window(), 0);
    }

    #[test]
    fn cleanup_retains_entries_inside_window() {
        let (clock, mut assessor) = assessor(290, 1);
        for _ in 0..10 {
            assessor.add(5);
            clock.advance(Duration::from_millis(50));
        }
        assessor.cleanup();
        assert_eq!(assessor.tasks_in_window(), 5);
    }

    #[test]
    fn power_batches_recomputation() {
        let (clock, mut assessor) = assessor(PERIOD_MS, 3);
        assessor.add(5);
        assert_rates(&assessor, 0.0, 0.0);
        assessor.add(5);
        assert_rates(&assessor, 0.0, 0.0);
        assessor.add(5);
        assert_rates(&assessor, rate(5.0), rate(1.0));

        clock.advance(Duration::from_millis(100));
        assessor.cleanup();
        assert_rates(&assessor, rate(5.0), rate(1.0));

        assessor.add(5);
        assert_rates(&assessor, rate(5.0), rate(1.0));
        assessor.add(5);
        assert_rates(&assessor, rate(5.0), rate(1.0));
        assessor.add(5);
        assert_rates(&assessor, rate(10.0), rate(2.0));

        clock.advance(Duration::from_millis(150));
        assessor.cleanup();
        assert_rates(&assessor, rate(5.0), rate(1.0));

        clock.advance(Duration::from_millis(150));
        assessor.cleanup();
        assert_rates(&assessor, 0.0, 0.0);
    }

    #[test]
    fn power_partial_batch_published_on_empty_window() {
        let (clock, mut assessor) = assessor(PERIOD_MS, 3);
        assessor.add(5);
        assert_rates(&assessor, 0.0, 0.0);

        clock.advance(Duration::from_millis(100));
        assessor.cleanup();
        assert_rates(&assessor, 0.0, 0.0);

        assessor.add(5);
        assert_rates(&assessor, 0.0, 0.0);
        assessor.add(5);
        assert_rates(&assessor, rate(5.0), rate(1.0));

        // Only the first entry expires: one eviction is less than a batch.
        clock.advance(Duration::from_millis(150));
        assessor.cleanup();
        assert_rates(&assessor, rate(5.0), rate(1.0));

        clock.advance(Duration::from_millis(100));
        assessor.cleanup();
        assert_rates(&assessor, 0.0, 0.0);
    }

    #[test]
    fn sizes_beyond_u64_are_summed_exactly() {
        let (clock, mut assessor) = assessor(PERIOD_MS, 1);
        assessor.add(u64::MAX);
        assessor.add(u64::MAX);
        assert!(assessor.performance_in_size() > rate(u64::MAX as f64));

        clock.advance(Duration::from_millis(150));
        assessor.add(5);
        clock.advance(Duration::from_millis(60));
        assessor.cleanup();
        assert_eq!(assessor.tasks_in_window(), 1);
        assert_rates(&assessor, rate(5.0), rate(1.0));
    }

    #[test]
    fn rejects_zero_power_and_period() {
        assert!(matches!(
            WindowedAssessor::new(Duration::from_millis(200), 0),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            WindowedAssessor::new(Duration::ZERO, 1),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn dummy_ignores_everything() {
        let mut dummy = DummyAssessor;
        dummy.add(100);
        dummy.cleanup();
        assert_rates(&dummy, 0.0, 0.0);
        assert!(!dummy.active());
    }

    #[test]
    fn factory_selects_by_kind() {
        let manual = ManualClock::new();
        let mut dummy = assessor_factory(
            AssessorKind::Dummy,
            Duration::from_millis(PERIOD_MS),
            1,
            manual.clock(),
        )
        .unwrap();
        dummy.add(5);
        assert!(!dummy.active());
        assert_rates(&dummy, 0.0, 0.0);

        let mut simple = assessor_factory(
            AssessorKind::Simple,
            Duration::from_millis(PERIOD_MS),
            1,
            manual.clock(),
        )
        .unwrap();
        simple.add(5);
        assert!(simple.active());
        assert_rates(&simple, 25.0, rate(1.0));
    }

    #[test]
    fn kind_parsing() {
        assert_eq!("dummy".parse::<AssessorKind>().unwrap(), AssessorKind::Dummy);
        assert_eq!(
            "simple".parse::<AssessorKind>().unwrap(),
            AssessorKind::Simple
        );
        assert!(matches!(
            "adaptive".parse::<AssessorKind>(),
            Err(Error::InvalidArgument(_))
        ));
    }
}
