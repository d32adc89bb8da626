// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

pub mod error;
pub mod keys;
pub mod legs;
pub mod migration;
pub mod navigation;
pub mod plan;
pub mod repository;
pub mod schema;
pub mod storage;

use std::path::PathBuf;

pub use error::{FieldError, PlanError};
pub use legs::{LegCollection, Reorder};
pub use navigation::{compute_legs, ComputedLeg, LegComputation};
pub use plan::{Aircraft, Airfield, FlightPlan, Leg, LegPatch, PersistedFlightPlan};
pub use repository::{ExportedPlan, FlightPlanRepository};
pub use storage::{FileStore, KeyValueStore, MemoryStore};

/// Environment variable overriding the configuration directory.
pub const CONFIG_DIR_ENV: &str = "VFR_NAV_CONFIG_DIR";

/// Root directory for everything the planner persists.
///
/// `VFR_NAV_CONFIG_DIR` wins when set, then the platform config directory,
/// then `.vfr_nav` relative to the working directory.
pub fn get_config_root() -> PathBuf {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }

    directories::ProjectDirs::from("org", "vfr-nav", "vfr-nav")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".vfr_nav"))
}
