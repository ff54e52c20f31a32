// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Rolling-window measurements and admission control for a task-dispatch loop.
//!
//! A dispatcher talking to one downstream resource keeps:
//!
//! - an **assessor** ([`ThroughputAssessor`]): how much work was actually issued per second over
//!   a trailing window, recomputed in batches of `power`;
//! - an **estimator** ([`ThroughputEstimator`]): how fast the resource completes work, derived
//!   from the time each task spent in flight;
//! - a **volume controller** ([`VolumeController`]): how much more may be loaded before the
//!   outstanding volume hits its ceiling.
//!
//! Each family has a real implementation and a dummy one used when the measurement or limit is
//! switched off. The `*_factory` functions, or [`DispatchLimitsConfig::build`], pick between them
//! by kind. [`EventCounter`] and [`SumCounter`] are count-based counterparts over the last N
//! observations.
//!
//! Apart from [`EventCounter`], nothing here synchronises internally: mutation goes through
//! `&mut self` and instances are expected to be owned by a single dispatch loop.

pub mod assessor;
pub mod clock;
pub mod config;
pub mod error;
pub mod estimator;
pub mod metrics;
pub mod ring;
pub mod volume;
pub mod window;

pub use assessor::{
    assessor_factory, Assessor, AssessorKind, DummyAssessor, ThroughputAssessor, WindowedAssessor,
};
pub use clock::{system_clock, Clock, ManualClock};
pub use config::{
    AssessorConfig, DispatchLimits, DispatchLimitsConfig, EstimatorConfig, VolumeConfig,
};
pub use error::{Error, Result};
pub use estimator::{
    estimator_factory, DummyEstimator, Estimator, EstimatorKind, LatencyEstimator,
    ThroughputEstimator,
};
pub use metrics::DispatchMetrics;
pub use ring::{EventCounter, SumCounter};
pub use volume::{
    volume_controller_factory, ConstantVolumeController, DummyVolumeController, Volume,
    VolumeController, VolumeKind,
};
