//! Validation helpers for `planner validate`.

use std::path::Path;

use anyhow::{Context, Result};

use crate::core::id::SubtaskId;
use crate::io::config::load_config;
use crate::io::tree_store::load_plan;

/// High-level validation outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidateOutcome {
    /// Total number of subtasks, at every level.
    pub subtasks: usize,
    pub frontier: SubtaskId,
}

/// Validate the config at `config_path` and the plan at `plan_path` against
/// the limits it declares.
pub fn validate_planner(config_path: &Path, plan_path: &Path) -> Result<ValidateOutcome> {
    let cfg = load_config(config_path).context("load planner.toml")?;
    let plan = load_plan(plan_path, &cfg.plan_limits()).context("load plan")?;
    Ok(ValidateOutcome {
        subtasks: plan.iter().count(),
        frontier: plan.frontier().clone(),
    })
}
