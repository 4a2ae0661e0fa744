//! Selection helpers for `planner next`.

use std::path::Path;

use anyhow::{Context, Result};

use crate::core::id::SubtaskId;
use crate::core::types::PlanLimits;
use crate::io::tree_store::load_plan;
use crate::tree::PlanTree;

/// Structured selection outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextOutcome {
    /// The frontier is the rightmost subtask; nothing follows it.
    Exhausted,
    /// Subtask processed after the frontier.
    Next(SelectedSubtask),
}

/// Minimal selected subtask metadata for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedSubtask {
    pub id: SubtaskId,
    pub name: String,
    pub is_leaf: bool,
}

/// Select the successor of the frontier in an in-memory plan.
pub fn select_next(plan: &PlanTree) -> NextOutcome {
    let Some(id) = plan.successor(plan.frontier()) else {
        return NextOutcome::Exhausted;
    };
    let Some(node) = plan.get(&id) else {
        return NextOutcome::Exhausted;
    };
    NextOutcome::Next(SelectedSubtask {
        name: node.name.clone(),
        is_leaf: node.is_leaf(),
        id,
    })
}

/// Load a plan from disk and select the successor of its frontier.
pub fn select_from_path(plan_path: &Path, limits: &PlanLimits) -> Result<NextOutcome> {
    let plan = load_plan(plan_path, limits).context("load plan for selection")?;
    Ok(select_next(&plan))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{id, leaf, limits, node_with_children, plan};
    use crate::tree::default_plan;

    #[test]
    fn next_descends_into_children() {
        let tree = plan(
            vec![leaf("1"), node_with_children("2", vec![leaf("2.1")])],
            "1",
        );
        assert_eq!(
            select_next(&tree),
            NextOutcome::Next(SelectedSubtask {
                id: id("2"),
                name: "2 name".to_string(),
                is_leaf: false,
            })
        );

        let tree = plan(
            vec![leaf("1"), node_with_children("2", vec![leaf("2.1")])],
            "2",
        );
        assert_eq!(
            select_next(&tree),
            NextOutcome::Next(SelectedSubtask {
                id: id("2.1"),
                name: "2.1 name".to_string(),
                is_leaf: true,
            })
        );
    }

    #[test]
    fn next_is_exhausted_after_rightmost_leaf() {
        assert_eq!(select_next(&default_plan()), NextOutcome::Exhausted);
    }

    #[test]
    fn select_from_path_validates_plan() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("plan.json");
        let tree = plan(vec![leaf("1"), leaf("2"), leaf("3")], "1");
        crate::io::tree_store::write_plan(&path, &tree).expect("write");

        assert!(select_from_path(&path, &limits(2, 1)).is_err());
        assert!(matches!(
            select_from_path(&path, &limits(3, 1)).expect("select"),
            NextOutcome::Next(_)
        ));
    }
}
