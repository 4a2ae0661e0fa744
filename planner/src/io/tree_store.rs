//! Plan load/save helpers with invariant validation.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};

use crate::core::invariants::validate_invariants;
use crate::core::types::PlanLimits;
use crate::tree::PlanTree;

/// Load a plan from disk and check it against `limits`.
pub fn load_plan(plan_path: &Path, limits: &PlanLimits) -> Result<PlanTree> {
    let contents = fs::read_to_string(plan_path)
        .with_context(|| format!("read plan {}", plan_path.display()))?;
    let plan: PlanTree = serde_json::from_str(&contents)
        .with_context(|| format!("parse plan {}", plan_path.display()))?;
    validate_plan(&plan, limits)?;
    Ok(plan)
}

/// Write a plan to disk (temp file + rename).
pub fn write_plan(plan_path: &Path, plan: &PlanTree) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(plan).context("serialize plan")?;
    buf.push('\n');
    let tmp_path = plan_path.with_extension("json.tmp");
    fs::write(&tmp_path, buf).with_context(|| format!("write plan {}", tmp_path.display()))?;
    fs::rename(&tmp_path, plan_path)
        .with_context(|| format!("replace plan {}", plan_path.display()))
}

pub fn validate_plan(plan: &PlanTree, limits: &PlanLimits) -> Result<()> {
    let errors = validate_invariants(plan, limits);
    if errors.is_empty() {
        return Ok(());
    }
    Err(anyhow!("plan invariants failed: {}", errors.join("; ")))
}
