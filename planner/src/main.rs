//! Bounded subtask planner.
//!
//! Works on a plan file (`plan.json`) holding a hierarchical decomposition of
//! a goal. Rounds of split/add/delete/exit operations refine the plan without
//! touching anything at or before the frontier.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;

use planner::exit_codes;
use planner::io::init::{CONFIG_FILE, InitOptions, PLAN_FILE, PlannerPaths, init_paths};
use planner::logging;
use planner::refine::refine_from_paths;
use planner::resolve::resolve_from_paths;
use planner::select::{NextOutcome, select_from_path};
use planner::validate::validate_planner;

#[derive(Parser)]
#[command(
    name = "planner",
    version,
    about = "Bounded subtask planner and tool-call resolver"
)]
struct Cli {
    /// Planner config (TOML). Missing file means defaults; `init` writes it here.
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write `planner.toml` and a one-subtask `plan.json`.
    Init {
        /// Overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },
    /// Check the plan against the configured width/depth limits and numbering rules.
    Validate {
        #[arg(long, default_value = PLAN_FILE)]
        plan: PathBuf,
    },
    /// Print the id of the subtask processed after the frontier.
    Next {
        #[arg(long, default_value = PLAN_FILE)]
        plan: PathBuf,
    },
    /// Run one refinement round over a JSON list of operations.
    Refine {
        #[arg(long, default_value = PLAN_FILE)]
        plan: PathBuf,
        #[arg(long)]
        ops: PathBuf,
    },
    /// Resolve a structured model response into a validated tool invocation.
    Resolve {
        /// JSON array of tool schemas.
        #[arg(long)]
        registry: PathBuf,
        /// JSON structured response.
        #[arg(long)]
        response: PathBuf,
    },
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Validate { plan } => cmd_validate(&cli.config, &plan),
        Command::Next { plan } => cmd_next(&cli.config, &plan),
        Command::Refine { plan, ops } => cmd_refine(&cli.config, &plan, &ops),
        Command::Resolve { registry, response } => cmd_resolve(&cli.config, &registry, &response),
    }
}

fn cmd_init(config: &Path, force: bool) -> Result<i32> {
    let paths = init_paths(
        PlannerPaths::new(".").with_config_path(config),
        &InitOptions { force },
    )?;
    println!("wrote {}", paths.config_path.display());
    println!("wrote {}", paths.plan_path.display());
    Ok(exit_codes::OK)
}

fn cmd_validate(config: &Path, plan: &Path) -> Result<i32> {
    let outcome = validate_planner(config, plan)?;
    println!(
        "ok: {} subtasks, frontier {}",
        outcome.subtasks, outcome.frontier
    );
    Ok(exit_codes::OK)
}

fn cmd_next(config: &Path, plan: &Path) -> Result<i32> {
    let cfg = planner::io::config::load_config(config).context("load planner.toml")?;
    match select_from_path(plan, &cfg.plan_limits())? {
        NextOutcome::Next(selected) => {
            println!("{}", selected.id);
            Ok(exit_codes::OK)
        }
        NextOutcome::Exhausted => {
            eprintln!("no subtask after the frontier");
            Ok(exit_codes::EXHAUSTED)
        }
    }
}

fn cmd_refine(config: &Path, plan: &Path, ops: &Path) -> Result<i32> {
    let outcome = refine_from_paths(config, plan, ops)?;
    for report in &outcome.reports {
        println!("{report}");
    }
    if outcome.skipped > 0 {
        println!("skipped {} operations after the round closed", outcome.skipped);
    }
    if outcome.rejection().is_some() {
        return Ok(exit_codes::REJECTED);
    }
    Ok(exit_codes::OK)
}

fn cmd_resolve(config: &Path, registry: &Path, response: &Path) -> Result<i32> {
    let step = resolve_from_paths(config, registry, response)?;
    let (name, arguments) = step.invocation.into_parts();
    let rendered = json!({
        "name": name,
        "arguments": arguments,
        "reasoning": step.reasoning,
        "content": step.content,
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&rendered).context("serialize invocation")?
    );
    Ok(exit_codes::OK)
}
