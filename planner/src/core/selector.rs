//! Deterministic traversal order for the plan tree.
//!
//! Subtasks are processed in pre-order: a node first, then its children left
//! to right, then its next sibling. Because ids encode positions, that order
//! coincides with the ordering of [`SubtaskId`].

use crate::core::id::SubtaskId;
use crate::tree::{PlanTree, SubtaskNode};

/// Next subtask after `id` in processing order.
///
/// Descends to the first child if there is one, otherwise moves to the next
/// sibling, climbing to the nearest ancestor that has one. Returns `None` for
/// the rightmost leaf or an unknown id.
pub fn successor(tree: &PlanTree, id: &SubtaskId) -> Option<SubtaskId> {
    let node = tree.get(id)?;
    if let Some(first) = node.children.first() {
        return Some(first.id.clone());
    }

    let mut current = id.clone();
    loop {
        let sibling = current.with_position(current.position() + 1);
        if tree.contains(&sibling) {
            return Some(sibling);
        }
        current = current.parent()?;
    }
}

/// True when `a` is processed no later than `b`.
pub fn is_before(a: &SubtaskId, b: &SubtaskId) -> bool {
    a <= b
}

/// Pre-order iterator over a forest of subtasks.
pub fn preorder(roots: &[SubtaskNode]) -> Preorder<'_> {
    Preorder {
        stack: roots.iter().rev().collect(),
    }
}

pub struct Preorder<'a> {
    stack: Vec<&'a SubtaskNode>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = &'a SubtaskNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}
