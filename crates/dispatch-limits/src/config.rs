// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::assessor::{assessor_factory, Assessor, AssessorKind, ThroughputAssessor};
use crate::clock::{system_clock, Clock};
use crate::error::{Error, Result};
use crate::estimator::{estimator_factory, Estimator, EstimatorKind, ThroughputEstimator};
use crate::volume::{volume_controller_factory, Volume, VolumeKind};

/// Limits and measurements for one downstream resource.
///
/// ```toml
/// [assessor]
/// kind = "simple"
/// period-ms = 5000
/// power = 4
///
/// [estimator]
/// kind = "simple"
/// period-ms = 10000
/// start-in-tasks = 100.0
/// start-in-size = 65536.0
///
/// [volume]
/// kind = "constant"
/// size-capacity = 1048576
/// task-capacity = 64
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct DispatchLimitsConfig {
    pub assessor: AssessorConfig,
    pub estimator: EstimatorConfig,
    pub volume: VolumeConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct AssessorConfig {
    pub kind: AssessorKind,
    /// Analysis window, in milliseconds.
    pub period_ms: u64,
    /// Insertions (and evictions) between recomputations of the published rate.
    pub power: u32,
}

impl Default for AssessorConfig {
    fn default() -> Self {
        Self {
            kind: AssessorKind::default(),
            period_ms: 1000,
            power: 1,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct EstimatorConfig {
    pub kind: EstimatorKind,
    /// Analysis window, in milliseconds.
    pub period_ms: u64,
    pub start_in_tasks: f64,
    pub start_in_size: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            kind: EstimatorKind::default(),
            period_ms: 1000,
            start_in_tasks: 0.0,
            start_in_size: 0.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct VolumeConfig {
    pub kind: VolumeKind,
    /// Required by the `constant` kind; ignored by `dummy`.
    pub size_capacity: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_capacity: Option<u64>,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            kind: VolumeKind::default(),
            size_capacity: 0,
            task_capacity: None,
        }
    }
}

impl DispatchLimitsConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn build(&self) -> Result<DispatchLimits> {
        self.build_with_clock(system_clock())
    }

    /// Build every component, sharing one time source between the windowed ones.
    pub fn build_with_clock(&self, clock: Clock) -> Result<DispatchLimits> {
        Ok(DispatchLimits {
            assessor: self.assessor.build_with_clock(clock.clone())?,
            estimator: self.estimator.build_with_clock(clock)?,
            volume: self.volume.build(),
        })
    }
}

impl AssessorConfig {
    pub fn build(&self) -> Result<Assessor> {
        self.build_with_clock(system_clock())
    }

    pub fn build_with_clock(&self, clock: Clock) -> Result<Assessor> {
        assessor_factory(
            self.kind,
            Duration::from_millis(self.period_ms),
            self.power,
            clock,
        )
    }
}

impl EstimatorConfig {
    pub fn build(&self) -> Result<Estimator> {
        self.build_with_clock(system_clock())
    }

    pub fn build_with_clock(&self, clock: Clock) -> Result<Estimator> {
        estimator_factory(
            self.kind,
            Duration::from_millis(self.period_ms),
            self.start_in_tasks,
            self.start_in_size,
            clock,
        )
    }
}

impl VolumeConfig {
    pub fn build(&self) -> Volume {
        volume_controller_factory(self.kind, self.size_capacity, self.task_capacity)
    }
}

/// The built components for one downstream resource, owned by a single dispatch loop.
pub struct DispatchLimits {
    pub assessor: Assessor,
    pub estimator: Estimator,
    pub volume: Volume,
}

impl DispatchLimits {
    /// Evict expired entries from both windows.
    pub fn cleanup(&mut self) {
        self.assessor.cleanup();
        self.estimator.cleanup();
    }
}
