//! Orchestration for one `planner refine` round.
//!
//! Proposals are fed to a [`RefinementRound`] in order until the round
//! closes. Operations accepted before a rejection stay applied, so the plan
//! is written back whenever at least one operation was accepted.

use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::core::id::SubtaskId;
use crate::core::mutation::{Applied, MutationError, MutationOp, PlanMutator};
use crate::core::round::{RefinementRound, RoundState, RoundStep};
use crate::io::config::load_config;
use crate::io::tree_store::{load_plan, write_plan};
use crate::tree::PlanTree;

/// What happened to one proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpResult {
    Applied(Applied),
    Exited { implicit: bool },
    Rejected(MutationError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpReport {
    pub op: &'static str,
    pub target: Option<SubtaskId>,
    pub result: OpResult,
}

impl fmt::Display for OpReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op)?;
        if let Some(target) = &self.target {
            write!(f, " {target}")?;
        }
        match &self.result {
            OpResult::Applied(Applied::Created(ids)) => {
                let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
                write!(f, ": created {}", ids.join(", "))
            }
            OpResult::Applied(Applied::Deleted(id)) => write!(f, ": deleted {id}"),
            OpResult::Applied(Applied::Exit) | OpResult::Exited { implicit: false } => {
                write!(f, ": exit")
            }
            OpResult::Exited { implicit: true } => write!(f, ": budget spent, exit"),
            OpResult::Rejected(err) => write!(f, ": rejected ({}) {err}", err.reason()),
        }
    }
}

/// Result of a whole round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefineOutcome {
    pub reports: Vec<OpReport>,
    pub state: RoundState,
    pub accepted: usize,
    /// Proposals never submitted because the round had already closed.
    pub skipped: usize,
}

impl RefineOutcome {
    pub fn rejection(&self) -> Option<&MutationError> {
        self.reports.iter().find_map(|report| match &report.result {
            OpResult::Rejected(err) => Some(err),
            _ => None,
        })
    }
}

/// Run `ops` as one refinement round against `plan`.
#[instrument(skip_all, fields(ops = ops.len()))]
pub fn run_round(mutator: &PlanMutator, plan: &mut PlanTree, ops: &[MutationOp]) -> RefineOutcome {
    let mut round = RefinementRound::new(mutator, plan);
    let mut reports = Vec::with_capacity(ops.len());
    for op in ops {
        let result = match round.propose(op) {
            Ok(RoundStep::Applied { applied, .. }) => OpResult::Applied(applied),
            Ok(RoundStep::Exited { implicit }) => OpResult::Exited { implicit },
            Err(err) => OpResult::Rejected(err),
        };
        reports.push(OpReport {
            op: op.kind(),
            target: op.target().cloned(),
            result,
        });
        if round.is_closed() {
            break;
        }
    }

    let outcome = RefineOutcome {
        skipped: ops.len() - reports.len(),
        state: round.state(),
        accepted: round.accepted(),
        reports,
    };
    info!(
        accepted = outcome.accepted,
        skipped = outcome.skipped,
        state = ?outcome.state,
        "refinement round finished"
    );
    outcome
}

/// Load a JSON list of operations.
pub fn load_ops(ops_path: &Path) -> Result<Vec<MutationOp>> {
    let contents = fs::read_to_string(ops_path)
        .with_context(|| format!("read ops {}", ops_path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse ops {}", ops_path.display()))
}

/// Load config, plan and ops from disk, run one round and write the plan
/// back if anything was accepted.
pub fn refine_from_paths(
    config_path: &Path,
    plan_path: &Path,
    ops_path: &Path,
) -> Result<RefineOutcome> {
    let cfg = load_config(config_path).context("load planner.toml")?;
    let mut plan = load_plan(plan_path, &cfg.plan_limits()).context("load plan for refinement")?;
    let ops = load_ops(ops_path)?;
    let outcome = run_round(&cfg.mutator(), &mut plan, &ops);
    if outcome.accepted > 0 {
        write_plan(plan_path, &plan).context("write refined plan")?;
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{done_leaf, id, leaf, limits, plan};

    fn mutator(max_ops: usize) -> PlanMutator {
        PlanMutator::new(limits(4, 3), max_ops)
    }

    #[test]
    fn round_stops_at_exit_and_skips_the_rest() {
        let mut tree = plan(vec![leaf("1"), leaf("2")], "1");
        let ops = vec![
            MutationOp::split(id("2"), 2),
            MutationOp::Exit,
            MutationOp::delete(id("2")),
        ];
        let outcome = run_round(&mutator(4), &mut tree, &ops);

        assert_eq!(outcome.state, RoundState::Done);
        assert_eq!(outcome.accepted, 1);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.rejection(), None);
        assert_eq!(
            outcome.reports[0].result,
            OpResult::Applied(Applied::Created(vec![id("2.1"), id("2.2")]))
        );
        assert!(tree.contains(&id("2.2")));
    }

    #[test]
    fn rejection_halts_round_but_keeps_earlier_ops() {
        let mut tree = plan(vec![done_leaf("1"), leaf("2"), leaf("3")], "2");
        let ops = vec![
            MutationOp::delete(id("3")),
            MutationOp::delete(id("1")),
            MutationOp::add(id("2"), 1),
        ];
        let outcome = run_round(&mutator(4), &mut tree, &ops);

        assert_eq!(outcome.state, RoundState::Rejected);
        assert_eq!(outcome.accepted, 1);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.rejection().map(MutationError::reason), Some("TargetBeforeFrontier"));
        assert!(!tree.contains(&id("3")));
        assert!(tree.contains(&id("1")));
    }

    #[test]
    fn spent_budget_turns_next_proposal_into_exit() {
        let mut tree = plan(vec![leaf("1"), leaf("2")], "1");
        let ops = vec![MutationOp::add(id("2"), 1), MutationOp::delete(id("3"))];
        let outcome = run_round(&mutator(1), &mut tree, &ops);

        assert_eq!(outcome.accepted, 1);
        assert_eq!(
            outcome.reports[1].result,
            OpResult::Exited { implicit: true }
        );
        assert!(tree.contains(&id("3")));
    }

    #[test]
    fn reports_render_one_line_per_op() {
        let mut tree = plan(vec![leaf("1"), leaf("2")], "1");
        let ops = vec![MutationOp::split(id("2"), 2), MutationOp::split(id("1"), 5)];
        let outcome = run_round(&mutator(4), &mut tree, &ops);
        assert_eq!(outcome.reports[0].to_string(), "split 2: created 2.1, 2.2");
        assert!(
            outcome.reports[1]
                .to_string()
                .starts_with("split 1: rejected (InvalidChildCount)"),
            "{}",
            outcome.reports[1]
        );
    }

    #[test]
    fn refine_from_paths_writes_plan_back() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config_path = temp.path().join("planner.toml");
        let plan_path = temp.path().join("plan.json");
        let ops_path = temp.path().join("ops.json");
        write_plan(&plan_path, &plan(vec![leaf("1"), leaf("2")], "1")).expect("write plan");
        fs::write(
            &ops_path,
            r#"[{"op":"add","target":"2","subtasks":[{"name":"verify","goal":"run tests"}]},{"op":"exit"}]"#,
        )
        .expect("write ops");

        let outcome = refine_from_paths(&config_path, &plan_path, &ops_path).expect("refine");
        assert_eq!(outcome.accepted, 1);

        let reloaded = load_plan(&plan_path, &limits(4, 3)).expect("reload");
        assert_eq!(reloaded.get(&id("3")).expect("3").name, "verify");
    }
}
