// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Volume admission control: how much more work may be in flight against a resource.
//!
//! The controller is told when work is loaded into the resource and when it is unloaded, and
//! answers how much size (and how many tasks) may still be issued. Unloading more than was
//! loaded saturates at zero, since load/unload notifications can race each other.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Common interface of volume controllers.
pub trait VolumeController {
    fn loaded(&mut self, size: u64);
    fn unloaded(&mut self, size: u64);
    /// Remaining size that may be loaded.
    fn how_much_is_allowed(&self) -> u64;
    /// Remaining number of tasks that may be loaded.
    fn how_many_tasks_allowed(&self) -> u64;
    fn active(&self) -> bool;
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum VolumeKind {
    #[default]
    Dummy,
    Constant,
}

impl fmt::Display for VolumeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dummy => f.write_str("dummy"),
            Self::Constant => f.write_str("constant"),
        }
    }
}

impl FromStr for VolumeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dummy" => Ok(Self::Dummy),
            "constant" => Ok(Self::Constant),
            other => Err(Error::invalid_argument(format!(
                "Incorrect volume controller kind: {other}"
            ))),
        }
    }
}

/// Fixed-capacity controller.
#[derive(Debug, Clone)]
pub struct ConstantVolumeController {
    size_capacity: u64,
    task_capacity: u64,
    outstanding_size: u64,
    outstanding_tasks: u64,
}

impl ConstantVolumeController {
    /// A controller bounding outstanding size only; the task count is unbounded.
    pub fn new(size_capacity: u64) -> Self {
        Self {
            size_capacity,
            task_capacity: u64::MAX,
            outstanding_size: 0,
            outstanding_tasks: 0,
        }
    }

    pub fn with_task_capacity(mut self, task_capacity: u64) -> Self {
        self.task_capacity = task_capacity;
        self
    }

    pub fn outstanding_size(&self) -> u64 {
        self.outstanding_size
    }

    pub fn outstanding_tasks(&self) -> u64 {
        self.outstanding_tasks
    }
}

impl VolumeController for ConstantVolumeController {
    fn loaded(&mut self, size: u64) {
        self.outstanding_size = self.outstanding_size.saturating_add(size);
        self.outstanding_tasks = self.outstanding_tasks.saturating_add(1);
    }

    fn unloaded(&mut self, size: u64) {
        self.outstanding_size = self.outstanding_size.saturating_sub(size);
        self.outstanding_tasks = self.outstanding_tasks.saturating_sub(1);
    }

    fn how_much_is_allowed(&self) -> u64 {
        self.size_capacity.saturating_sub(self.outstanding_size)
    }

    fn how_many_tasks_allowed(&self) -> u64 {
        self.task_capacity.saturating_sub(self.outstanding_tasks)
    }

    fn active(&self) -> bool {
        true
    }
}

/// Controller that imposes no limit.
#[derive(Debug, Default, Clone, Copy)]
pub struct DummyVolumeController;

impl VolumeController for DummyVolumeController {
    fn loaded(&mut self, _size: u64) {}

    fn unloaded(&mut self, _size: u64) {}

    fn how_much_is_allowed(&self) -> u64 {
        u64::MAX
    }

    fn how_many_tasks_allowed(&self) -> u64 {
        u64::MAX
    }

    fn active(&self) -> bool {
        false
    }
}

/// A volume controller of either kind, as produced by [`volume_controller_factory`].
#[derive(Debug, Clone)]
pub enum Volume {
    Dummy(DummyVolumeController),
    Constant(ConstantVolumeController),
}

impl VolumeController for Volume {
    fn loaded(&mut self, size: u64) {
        match self {
            Self::Dummy(v) => v.loaded(size),
            Self::Constant(v) => v.loaded(size),
        }
    }

    fn unloaded(&mut self, size: u64) {
        match self {
            Self::Dummy(v) => v.unloaded(size),
            Self::Constant(v) => v.unloaded(size),
        }
    }

    fn how_much_is_allowed(&self) -> u64 {
        match self {
            Self::Dummy(v) => v.how_much_is_allowed(),
            Self::Constant(v) => v.how_much_is_allowed(),
        }
    }

    fn how_many_tasks_allowed(&self) -> u64 {
        match self {
            Self::Dummy(v) => v.how_many_tasks_allowed(),
            Self::Constant(v) => v.how_many_tasks_allowed(),
        }
    }

    fn active(&self) -> bool {
        match self {
            Self::Dummy(v) => v.active(),
            Self::Constant(v) => v.active(),
        }
    }
}

/// `task_capacity: None` leaves the task count unbounded.
pub fn volume_controller_factory(
    kind: VolumeKind,
    size_capacity: u64,
    task_capacity: Option<u64>,
) -> Volume {
    debug!(%kind, size_capacity, ?task_capacity, "Building volume controller");
    match kind {
        VolumeKind::Dummy => Volume::Dummy(DummyVolumeController),
        VolumeKind::Constant => {
            let controller = ConstantVolumeController::new(size_capacity);
            Volume::Constant(match task_capacity {
                Some(tasks) => controller.with_task_capacity(tasks),
                None => controller,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_controller_allows_full_capacity() {
        let controller = ConstantVolumeController::new(200);
        assert_eq!(controller.how_much_is_allowed(), 200);
        assert_eq!(controller.how_many_tasks_allowed(), u64::MAX);
        assert!(controller.active());
    }

    #[test]
    fn load_unload() {
        let mut controller = ConstantVolumeController::new(200);
        controller.loaded(100);
        assert_eq!(controller.how_much_is_allowed(), 100);
        controller.loaded(100);
        assert_eq!(controller.how_much_is_allowed(), 0);
        controller.unloaded(50);
        assert_eq!(controller.how_much_is_allowed(), 50);
        controller.unloaded(100);
        assert_eq!(controller.how_much_is_allowed(), 150);
        controller.unloaded(100);
        assert_eq!(controller.how_much_is_allowed(), 200);
    }

    #[test]
    fn unload_beyond_loaded_saturates() {
        let mut controller = ConstantVolumeController::new(200);
        controller.loaded(100);
        controller.loaded(100);
        controller.unloaded(1000);
        assert_eq!(controller.outstanding_size(), 0);
        assert_eq!(controller.how_much_is_allowed(), 200);
    }

    #[test]
    fn overload_reports_zero() {
        let mut controller = ConstantVolumeController::new(200);
        controller.loaded(250);
        assert_eq!(controller.how_much_is_allowed(), 0);
        controller.unloaded(25);
        assert_eq!(controller.how_much_is_allowed(), 0);
        controller.unloaded(100);
        assert_eq!(controller.how_much_is_allowed(), 75);
    }

    #[test]
    fn task_capacity_counts_loads() {
        let mut controller = ConstantVolumeController::new(1000).with_task_capacity(2);
        assert_eq!(controller.how_many_tasks_allowed(), 2);
        controller.loaded(10);
        controller.loaded(10);
        assert_eq!(controller.how_many_tasks_allowed(), 0);
        controller.loaded(10);
        assert_eq!(controller.how_many_tasks_allowed(), 0);
        controller.unloaded(10);
        controller.unloaded(10);
        assert_eq!(controller.how_many_tasks_allowed(), 1);
        controller.unloaded(10);
        controller.unloaded(10);
        assert_eq!(controller.outstanding_tasks(), 0);
        assert_eq!(controller.how_many_tasks_allowed(), 2);
    }

    #[test]
    fn dummy_is_unlimited() {
        let mut dummy = DummyVolumeController;
        dummy.loaded(u64::MAX);
        dummy.unloaded(7);
        assert_eq!(dummy.how_much_is_allowed(), u64::MAX);
        assert_eq!(dummy.how_many_tasks_allowed(), u64::MAX);
        assert!(!dummy.active());
    }

    #[test]
    fn factory_selects_by_kind() {
        let dummy = volume_controller_factory(VolumeKind::Dummy, 100, None);
        assert_eq!(dummy.how_much_is_allowed(), u64::MAX);
        assert!(!dummy.active());

        let mut constant = volume_controller_factory(VolumeKind::Constant, 100, Some(5));
        assert_eq!(constant.how_much_is_allowed(), 100);
        constant.loaded(40);
        assert_eq!(constant.how_much_is_allowed(), 60);
        assert_eq!(constant.how_many_tasks_allowed(), 4);
    }

    #[test]
    fn kind_parsing() {
        assert_eq!(
            "constant".parse::<VolumeKind>().unwrap(),
            VolumeKind::Constant
        );
        assert_eq!("dummy".parse::<VolumeKind>().unwrap(), VolumeKind::Dummy);
        let err = "elastic".parse::<VolumeKind>().unwrap_err();
        assert_eq!(
            err,
            Error::InvalidArgument("Incorrect volume controller kind: elastic".to_string())
        );
    }
}
