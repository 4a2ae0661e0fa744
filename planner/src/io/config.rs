//! Planner configuration stored in `planner.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::mutation::PlanMutator;
use crate::core::retry::RetryPolicy;
use crate::core::types::PlanLimits;

/// Planner configuration (TOML).
///
/// Loaded once and passed by value into the components that need it. Missing
/// fields default to the values the planning prompts were written for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PlannerConfig {
    /// Maximum subtasks per parent (and at the top level).
    pub max_plan_tree_width: usize,

    /// Maximum id depth of any subtask.
    pub max_plan_tree_depth: usize,

    /// Accepted mutations per refinement round before further proposals
    /// count as exit.
    pub max_mutation_ops_per_round: usize,

    /// Attempts for a whole tool-resolution step on transient failures.
    pub max_retry_attempts: usize,

    pub generator: GeneratorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Command that answers generation requests (request JSON on stdin,
    /// response JSON on stdout).
    pub command: Vec<String>,

    /// Wall-clock budget for one generation call.
    pub timeout_secs: u64,

    /// Responses larger than this are rejected as malformed.
    pub output_limit_bytes: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            command: vec!["planner-generate".to_string()],
            timeout_secs: 120,
            output_limit_bytes: 1_000_000,
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_plan_tree_width: 4,
            max_plan_tree_depth: 3,
            max_mutation_ops_per_round: 4,
            max_retry_attempts: 3,
            generator: GeneratorConfig::default(),
        }
    }
}

impl PlannerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_plan_tree_width == 0 {
            return Err(anyhow!("max_plan_tree_width must be >= 1"));
        }
        if self.max_plan_tree_depth == 0 {
            return Err(anyhow!("max_plan_tree_depth must be >= 1"));
        }
        if self.generator.timeout_secs == 0 {
            return Err(anyhow!("generator.timeout_secs must be > 0"));
        }
        if self.generator.output_limit_bytes == 0 {
            return Err(anyhow!("generator.output_limit_bytes must be > 0"));
        }
        if self.generator.command.is_empty() || self.generator.command[0].trim().is_empty() {
            return Err(anyhow!("generator.command must be a non-empty array"));
        }
        Ok(())
    }

    pub fn plan_limits(&self) -> PlanLimits {
        PlanLimits {
            max_width: self.max_plan_tree_width,
            max_depth: self.max_plan_tree_depth,
        }
    }

    pub fn mutator(&self) -> PlanMutator {
        PlanMutator::new(self.plan_limits(), self.max_mutation_ops_per_round)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retry_attempts)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PlannerConfig::default()`.
pub fn load_config(path: &Path) -> Result<PlannerConfig> {
    if !path.exists() {
        let cfg = PlannerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PlannerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &PlannerConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let tmp_path = path.with_extension("toml.tmp");
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
