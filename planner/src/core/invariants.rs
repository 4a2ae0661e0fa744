//! Structural invariants of the plan tree.

use crate::core::id::SubtaskId;
use crate::core::types::PlanLimits;
use crate::tree::{PlanTree, SubtaskNode};

/// Check the structural invariants of `tree` under `limits`:
/// - Every node's depth is at most `max_depth`
/// - Every node (and the top level) has at most `max_width` children
/// - Children are numbered contiguously `1..k` under their parent's id
/// - The frontier names an existing subtask
pub fn validate_invariants(tree: &PlanTree, limits: &PlanLimits) -> Vec<String> {
    let mut errors = Vec::new();

    if tree.subtasks().is_empty() {
        errors.push("plan has no subtasks".to_string());
    }
    check_children(tree.subtasks(), None, limits, &mut errors);

    if !tree.contains(tree.frontier()) {
        errors.push(format!("frontier {} does not exist", tree.frontier()));
    }

    errors
}

fn check_children(
    children: &[SubtaskNode],
    parent: Option<&SubtaskId>,
    limits: &PlanLimits,
    errors: &mut Vec<String>,
) {
    let label = parent.map_or_else(|| "<top level>".to_string(), ToString::to_string);
    if children.len() > limits.max_width {
        errors.push(format!(
            "{label}: {} children exceeds max width {}",
            children.len(),
            limits.max_width
        ));
    }

    for (child, position) in children.iter().zip(1u32..) {
        let expected = match parent {
            Some(parent) => parent.child(position),
            None => SubtaskId::top(position),
        };
        if child.id != expected {
            errors.push(format!(
                "{label}: child at position {position} has id {} (expected {expected})",
                child.id
            ));
        }
        if child.id.depth() > limits.max_depth {
            errors.push(format!(
                "{}: depth {} exceeds max depth {}",
                child.id,
                child.id.depth(),
                limits.max_depth
            ));
        }
        check_children(&child.children, Some(&child.id), limits, errors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{leaf, limits, node_with_children, plan};

    #[test]
    fn accepts_well_formed_tree() {
        let tree = plan(
            vec![node_with_children("1", vec![leaf("1.1"), leaf("1.2")]), leaf("2")],
            "1.1",
        );
        assert!(validate_invariants(&tree, &limits(4, 3)).is_empty());
    }

    #[test]
    fn reports_width_depth_and_numbering_errors() {
        let tree = plan(
            vec![node_with_children(
                "1",
                vec![
                    node_with_children("1.1", vec![leaf("1.1.1")]),
                    leaf("1.3"),
                    leaf("1.4"),
                ],
            )],
            "9",
        );

        let errors = validate_invariants(&tree, &limits(2, 2));
        assert!(errors.iter().any(|err| err.contains("exceeds max width 2")));
        assert!(errors.iter().any(|err| err.contains("1.1.1: depth 3")));
        assert!(errors.iter().any(|err| err.contains("expected 1.2")));
        assert!(errors.iter().any(|err| err.contains("frontier 9")));
    }
}
