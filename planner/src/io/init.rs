//! Initialization helpers for a planner working directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use super::config::{PlannerConfig, write_config};
use super::tree_store::write_plan;
use crate::tree::default_plan;

pub const CONFIG_FILE: &str = "planner.toml";
pub const PLAN_FILE: &str = "plan.json";

/// Canonical file locations for a project root.
#[derive(Debug, Clone)]
pub struct PlannerPaths {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub plan_path: PathBuf,
}

impl PlannerPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            config_path: root.join(CONFIG_FILE),
            plan_path: root.join(PLAN_FILE),
            root,
        }
    }

    /// Place the config at `config_path` instead of `<root>/planner.toml`.
    pub fn with_config_path(mut self, config_path: impl Into<PathBuf>) -> Self {
        self.config_path = config_path.into();
        self
    }
}

/// Options for `init_planner`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite existing planner-owned files.
    pub force: bool,
}

/// Write the default config and a one-subtask plan into `root`.
///
/// Fails if either file already exists unless `options.force` is set.
pub fn init_planner(root: &Path, options: &InitOptions) -> Result<PlannerPaths> {
    init_paths(PlannerPaths::new(root), options)
}

/// Like [`init_planner`], for explicit `paths`.
pub fn init_paths(paths: PlannerPaths, options: &InitOptions) -> Result<PlannerPaths> {
    if !options.force {
        for path in [&paths.config_path, &paths.plan_path] {
            if path.exists() {
                return Err(anyhow!(
                    "planner init: {} already exists (use --force to overwrite)",
                    path.display()
                ));
            }
        }
    }

    fs::create_dir_all(&paths.root)
        .with_context(|| format!("create directory {}", paths.root.display()))?;
    write_config(&paths.config_path, &PlannerConfig::default())?;
    write_plan(&paths.plan_path, &default_plan())?;
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::load_config;
    use crate::io::tree_store::load_plan;

    #[test]
    fn init_creates_config_and_plan() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_planner(temp.path(), &InitOptions { force: false }).expect("init");

        let cfg = load_config(&paths.config_path).expect("config");
        assert_eq!(cfg, PlannerConfig::default());
        let plan = load_plan(&paths.plan_path, &cfg.plan_limits()).expect("plan");
        assert_eq!(plan, default_plan());
    }

    #[test]
    fn init_writes_config_to_custom_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let custom = temp.path().join("conf").join("alt.toml");
        let paths = init_paths(
            PlannerPaths::new(temp.path()).with_config_path(&custom),
            &InitOptions { force: false },
        )
        .expect("init");

        assert_eq!(paths.config_path, custom);
        assert!(custom.is_file());
        assert!(!temp.path().join(CONFIG_FILE).exists());
        assert!(paths.plan_path.is_file());
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = PlannerPaths::new(temp.path());
        fs::write(&paths.plan_path, "keep").expect("write");

        let err = init_planner(temp.path(), &InitOptions { force: false }).unwrap_err();
        assert!(err.to_string().contains("already exists"), "{err}");
        assert_eq!(fs::read_to_string(&paths.plan_path).expect("read"), "keep");

        init_planner(temp.path(), &InitOptions { force: true }).expect("forced init");
        assert_ne!(fs::read_to_string(&paths.plan_path).expect("read"), "keep");
    }
}
