// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use prometheus::{
    register_gauge_vec_with_registry, register_int_gauge_vec_with_registry, GaugeVec,
    IntGaugeVec, Registry,
};

use crate::assessor::ThroughputAssessor;
use crate::estimator::ThroughputEstimator;
use crate::volume::VolumeController;

/// Gauges mirroring the published figures of each resource's components, labelled by resource.
///
/// Nothing here is updated implicitly; the dispatch loop calls the `observe_*` methods at
/// whatever cadence it reports at. Disabled (dummy) components are skipped so their sentinel
/// values never reach dashboards.
#[derive(Clone, Debug)]
pub struct DispatchMetrics {
    pub assessed_size_per_sec: GaugeVec,
    pub assessed_tasks_per_sec: GaugeVec,
    pub estimated_size_per_sec: GaugeVec,
    pub estimated_tasks_per_sec: GaugeVec,
    pub volume_size_allowed: IntGaugeVec,
    pub volume_tasks_allowed: IntGaugeVec,
}

impl DispatchMetrics {
    pub fn new(registry: &Registry) -> Self {
        Self {
            assessed_size_per_sec: register_gauge_vec_with_registry!(
                "dispatch_assessed_size_per_sec",
                "Issued size per second per unit of power over the assessor window",
                &["resource"],
                registry,
            )
            .unwrap(),
            assessed_tasks_per_sec: register_gauge_vec_with_registry!(
                "dispatch_assessed_tasks_per_sec",
                "Issued tasks per second per unit of power over the assessor window",
                &["resource"],
                registry,
            )
            .unwrap(),
            estimated_size_per_sec: register_gauge_vec_with_registry!(
                "dispatch_estimated_size_per_sec",
                "Completed size per second of in-flight time over the estimator window",
                &["resource"],
                registry,
            )
            .unwrap(),
            estimated_tasks_per_sec: register_gauge_vec_with_registry!(
                "dispatch_estimated_tasks_per_sec",
                "Completed tasks per second of in-flight time over the estimator window",
                &["resource"],
                registry,
            )
            .unwrap(),
            volume_size_allowed: register_int_gauge_vec_with_registry!(
                "dispatch_volume_size_allowed",
                "Size that may still be loaded into the resource",
                &["resource"],
                registry,
            )
            .unwrap(),
            volume_tasks_allowed: register_int_gauge_vec_with_registry!(
                "dispatch_volume_tasks_allowed",
                "Tasks that may still be loaded into the resource",
                &["resource"],
                registry,
            )
            .unwrap(),
        }
    }

    pub fn new_for_tests() -> Self {
        Self::new(&Registry::new())
    }

    pub fn observe_assessor(&self, resource: &str, assessor: &impl ThroughputAssessor) {
        if !assessor.active() {
            return;
        }
        self.assessed_size_per_sec
            .with_label_values(&[resource])
            .set(assessor.performance_in_size());
        self.assessed_tasks_per_sec
            .with_label_values(&[resource])
            .set(assessor.performance_in_tasks());
    }

    pub fn observe_estimator(&self, resource: &str, estimator: &impl ThroughputEstimator) {
        if !estimator.active() {
            return;
        }
        self.estimated_size_per_sec
            .with_label_values(&[resource])
            .set(estimator.performance_in_size());
        self.estimated_tasks_per_sec
            .with_label_values(&[resource])
            .set(estimator.performance_in_tasks());
    }

    pub fn observe_volume(&self, resource: &str, volume: &impl VolumeController) {
        if !volume.active() {
            return;
        }
        self.volume_size_allowed
            .with_label_values(&[resource])
            .set(clamp_to_i64(volume.how_much_is_allowed()));
        self.volume_tasks_allowed
            .with_label_values(&[resource])
            .set(clamp_to_i64(volume.how_many_tasks_allowed()));
    }
}

fn clamp_to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
