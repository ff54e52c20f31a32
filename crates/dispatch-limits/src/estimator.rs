// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Latency-derived capacity estimate.
//!
//! Each completed task reports how long it was in progress and how large it was. The estimate is
//! `size / time in progress` and `tasks / time in progress` over the tasks completed within the
//! trailing period, recomputed on every completion. Eviction alone never changes the published
//! values, so the last estimate survives idle periods until new completions arrive.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::clock::{system_clock, Clock};
use crate::error::{Error, Result};
use crate::window::{Sample, WindowLog};

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Common interface of throughput estimators.
pub trait ThroughputEstimator {
    /// Record a completed task that spent `in_progress` in flight.
    fn add(&mut self, in_progress: Duration, size: u64);
    /// Evict completions older than the analysis period.
    fn cleanup(&mut self);
    /// Size units per second of in-flight time.
    fn performance_in_size(&self) -> f64;
    /// Tasks per second of in-flight time.
    fn performance_in_tasks(&self) -> f64;
    fn active(&self) -> bool;
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorKind {
    Dummy,
    #[default]
    Simple,
}

impl fmt::Display for EstimatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dummy => f.write_str("dummy"),
            Self::Simple => f.write_str("simple"),
        }
    }
}

impl FromStr for EstimatorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dummy" => Ok(Self::Dummy),
            "simple" => Ok(Self::Simple),
            other => Err(Error::invalid_argument(format!(
                "Incorrect performance estimator kind: {other}"
            ))),
        }
    }
}

struct SolvedTask {
    in_progress: Duration,
    size: u64,
}

#[derive(Debug, Default)]
struct SolvedTotals {
    in_progress_nanos: u128,
    size: u128,
}

impl Sample for SolvedTask {
    type Totals = SolvedTotals;

    fn include(&self, totals: &mut SolvedTotals) {
        totals.in_progress_nanos = totals
            .in_progress_nanos
            .wrapping_add(self.in_progress.as_nanos());
        totals.size = totals.size.wrapping_add(u128::from(self.size));
    }

    fn exclude(&self, totals: &mut SolvedTotals) {
        totals.in_progress_nanos = totals
            .in_progress_nanos
            .wrapping_sub(self.in_progress.as_nanos());
        totals.size = totals.size.wrapping_sub(u128::from(self.size));
    }
}

pub struct LatencyEstimator {
    log: WindowLog<SolvedTask>,
    in_size: f64,
    in_tasks: f64,
}

impl LatencyEstimator {
    /// The start values are published until the first completion with a non-zero duration.
    pub fn new(period: Duration, start_in_tasks: f64, start_in_size: f64) -> Result<Self> {
        if period.is_zero() {
            return Err(Error::invalid_argument(
                "performance estimator period must be greater than 0",
            ));
        }
        Ok(Self {
            log: WindowLog::new(period, system_clock()),
            in_size: start_in_size,
            in_tasks: start_in_tasks,
        })
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.log.set_clock(clock);
        self
    }

    pub fn period(&self) -> Duration {
        self.log.period()
    }

    pub fn tasks_in_window(&self) -> usize {
        self.log.len()
    }

    fn estimate(&mut self) {
        let totals = self.log.totals();
        if self.log.is_empty() || totals.in_progress_nanos == 0 {
            return;
        }
        let in_progress_nanos = totals.in_progress_nanos as f64;
        self.in_size = totals.size as f64 * NANOS_PER_SEC / in_progress_nanos;
        self.in_tasks = self.log.len() as f64 * NANOS_PER_SEC / in_progress_nanos;
        trace!(
            in_size = self.in_size,
            in_tasks = self.in_tasks,
            "Estimated throughput"
        );
    }
}

impl ThroughputEstimator for LatencyEstimator {
    fn add(&mut self, in_progress: Duration, size: u64) {
        self.log.push(SolvedTask { in_progress, size });
        self.estimate();
    }

    fn cleanup(&mut self) {
        self.log.evict_expired();
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

/// Stand-in used when estimation is switched off: the resource is treated as unbounded.
#[derive(Debug, Default, Clone, Copy)]
pub struct DummyEstimator;

impl ThroughputEstimator for DummyEstimator {
    fn add(&mut self, _in_progress: Duration, _size: u64) {}

    fn cleanup(&mut self) {}

    fn performance_in_size(&self) -> f64 {
        f64::MAX
    }

    fn performance_in_tasks(&self) -> f64 {
        f64::MAX
    }

    fn active(&self) -> bool {
        false
    }
}

/// An estimator of either kind, as produced by [`estimator_factory`].
pub enum Estimator {
    Dummy(DummyEstimator),
    Latency(LatencyEstimator),
}

impl ThroughputEstimator for Estimator {
    fn add(&mut self, in_progress: Duration, size: u64) {
        match self {
            Self::Dummy(e) => e.add(in_progress, size),
            Self::Latency(e) => e.add(in_progress, size),
        }
    }

    fn cleanup(&mut self) {
        match self {
            Self::Dummy(e) => e.cleanup(),
            Self::Latency(e) => e.cleanup(),
        }
    }

    fn performance_in_size(&self) -> f64 {
        match self {
            Self::Dummy(e) => e.performance_in_size(),
            Self::Latency(e) => e.performance_in_size(),
        }
    }

    fn performance_in_tasks(&self) -> f64 {
        match self {
            Self::Dummy(e) => e.performance_in_tasks(),
            Self::Latency(e) => e.performance_in_tasks(),
        }
    }

    fn active(&self) -> bool {
        match self {
            Self::Dummy(e) => e.active(),
            Self::Latency(e) => e.active(),
        }
    }
}

pub fn estimator_factory(
    kind: EstimatorKind,
    period: Duration,
    start_in_tasks: f64,
    start_in_size: f64,
    clock: Clock,
) -> Result<Estimator> {
    debug!(
        %kind,
        ?period,
        start_in_tasks,
        start_in_size,
        "Building performance estimator"
    );
    match kind {
        EstimatorKind::Dummy => Ok(Estimator::Dummy(DummyEstimator)),
        EstimatorKind::Simple => Ok(Estimator::Latency(
            LatencyEstimator::new(period, start_in_tasks, start_in_size)?.with_clock(clock),
        )),
    }
}
