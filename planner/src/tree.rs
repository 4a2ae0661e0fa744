use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::id::SubtaskId;
use crate::core::selector;

/// Execution status of a subtask. Only the execution agent changes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
    #[default]
    Pending,
    InProgress,
    Done,
    Failed,
}

impl SubtaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubtaskStatus::Pending => "pending",
            SubtaskStatus::InProgress => "in_progress",
            SubtaskStatus::Done => "done",
            SubtaskStatus::Failed => "failed",
        }
    }
}

/// Description of a subtask to create, as proposed by a planning agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtaskSpec {
    pub name: String,
    pub goal: String,
    pub criticism: String,
    pub milestones: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubtaskNode {
    pub id: SubtaskId,
    pub name: String,
    pub goal: String,
    pub criticism: String,
    pub milestones: Vec<String>,
    pub status: SubtaskStatus,
    #[serde(default)]
    pub children: Vec<SubtaskNode>,
}

impl SubtaskNode {
    pub fn from_spec(id: SubtaskId, spec: SubtaskSpec) -> Self {
        Self {
            id,
            name: spec.name,
            goal: spec.goal,
            criticism: spec.criticism,
            milestones: spec.milestones,
            status: SubtaskStatus::Pending,
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// True if this node or any descendant is `done`.
    pub fn any_done(&self) -> bool {
        self.status == SubtaskStatus::Done || self.children.iter().any(SubtaskNode::any_done)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("subtask {0} not found")]
pub struct NotFound(pub SubtaskId);

/// Hierarchical decomposition of one goal plus the frontier: the subtask the
/// execution agent is currently processing.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanTree {
    goal: String,
    subtasks: Vec<SubtaskNode>,
    frontier: SubtaskId,
}

impl PlanTree {
    /// Build a tree whose top level is `specs`, numbered `1..n`, with the
    /// frontier on the first subtask. An empty list yields a single subtask
    /// carrying the goal itself.
    pub fn new(goal: impl Into<String>, specs: Vec<SubtaskSpec>) -> Self {
        let goal = goal.into();
        let specs = if specs.is_empty() {
            vec![SubtaskSpec {
                name: "Goal".to_string(),
                goal: goal.clone(),
                ..SubtaskSpec::default()
            }]
        } else {
            specs
        };
        let subtasks = specs
            .into_iter()
            .zip(1u32..)
            .map(|(spec, position)| SubtaskNode::from_spec(SubtaskId::top(position), spec))
            .collect();
        Self {
            goal,
            subtasks,
            frontier: SubtaskId::top(1),
        }
    }

    /// Assemble a tree from already-numbered nodes. Callers are expected to
    /// run [`crate::core::invariants::validate_invariants`] on the result.
    pub fn from_parts(goal: impl Into<String>, subtasks: Vec<SubtaskNode>, frontier: SubtaskId) -> Self {
        Self {
            goal: goal.into(),
            subtasks,
            frontier,
        }
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn subtasks(&self) -> &[SubtaskNode] {
        &self.subtasks
    }

    pub fn frontier(&self) -> &SubtaskId {
        &self.frontier
    }

    pub fn get(&self, id: &SubtaskId) -> Option<&SubtaskNode> {
        let mut nodes = self.subtasks.as_slice();
        let mut found = None;
        for &position in id.components() {
            let node = nodes.get(position.checked_sub(1)? as usize)?;
            nodes = &node.children;
            found = Some(node);
        }
        found.filter(|node| &node.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: &SubtaskId) -> Option<&mut SubtaskNode> {
        let (first, rest) = id.components().split_first()?;
        let mut node = self.subtasks.get_mut(first.checked_sub(1)? as usize)?;
        for &position in rest {
            node = node.children.get_mut(position.checked_sub(1)? as usize)?;
        }
        Some(node)
    }

    pub fn contains(&self, id: &SubtaskId) -> bool {
        self.get(id).is_some()
    }

    pub fn is_leaf(&self, id: &SubtaskId) -> bool {
        self.get(id).is_some_and(SubtaskNode::is_leaf)
    }

    /// True if `a` is a strict ancestor of `b` and both exist.
    pub fn is_ancestor(&self, a: &SubtaskId, b: &SubtaskId) -> bool {
        a.is_ancestor_of(b) && self.contains(a) && self.contains(b)
    }

    /// Depth of an existing subtask; top-level subtasks have depth 1.
    pub fn depth(&self, id: &SubtaskId) -> Option<usize> {
        self.contains(id).then(|| id.depth())
    }

    /// Parent of an existing subtask; `None` for top-level or unknown ids.
    pub fn parent(&self, id: &SubtaskId) -> Option<SubtaskId> {
        if !self.contains(id) {
            return None;
        }
        id.parent()
    }

    /// Children of `parent`, or the top level when `parent` is `None`.
    pub fn children(&self, parent: Option<&SubtaskId>) -> Option<&[SubtaskNode]> {
        match parent {
            None => Some(&self.subtasks),
            Some(id) => self.get(id).map(|node| node.children.as_slice()),
        }
    }

    pub(crate) fn children_mut(&mut self, parent: Option<&SubtaskId>) -> Option<&mut Vec<SubtaskNode>> {
        match parent {
            None => Some(&mut self.subtasks),
            Some(id) => self.get_mut(id).map(|node| &mut node.children),
        }
    }

    pub fn child_count(&self, parent: Option<&SubtaskId>) -> usize {
        self.children(parent).map_or(0, <[SubtaskNode]>::len)
    }

    /// Next subtask in processing order (pre-order, left to right).
    pub fn successor(&self, id: &SubtaskId) -> Option<SubtaskId> {
        selector::successor(self, id)
    }

    /// True when `a` is processed no later than `b`.
    pub fn is_before(&self, a: &SubtaskId, b: &SubtaskId) -> bool {
        selector::is_before(a, b)
    }

    /// Record an execution outcome. Called by the execution agent, never by
    /// the mutator.
    pub fn set_status(&mut self, id: &SubtaskId, status: SubtaskStatus) -> Result<(), NotFound> {
        let node = self.get_mut(id).ok_or_else(|| NotFound(id.clone()))?;
        node.status = status;
        Ok(())
    }

    /// Move the frontier to its successor. Returns the new frontier, or
    /// `None` (frontier unchanged) once the rightmost leaf is reached.
    pub fn advance_frontier(&mut self) -> Option<&SubtaskId> {
        let next = self.successor(&self.frontier)?;
        self.frontier = next;
        Some(&self.frontier)
    }

    /// Pre-order walk over every subtask.
    pub fn iter(&self) -> impl Iterator<Item = &SubtaskNode> {
        selector::preorder(&self.subtasks)
    }

    /// Indented outline of the plan, one subtask per line.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        for node in self.iter() {
            let indent = "  ".repeat(node.id.depth() - 1);
            let marker = if node.id == self.frontier { " <- frontier" } else { "" };
            lines.push(format!(
                "{indent}- {} [{}] {}: {}{marker}",
                node.id,
                node.status.as_str(),
                node.name,
                node.goal
            ));
        }
        lines.join("\n")
    }
}

/// Reassign ids below `parent` so that positions are contiguous `1..k`,
/// recursing into every subtree.
pub(crate) fn renumber(nodes: &mut [SubtaskNode], parent: Option<&SubtaskId>) {
    for (node, position) in nodes.iter_mut().zip(1u32..) {
        node.id = match parent {
            Some(parent) => parent.child(position),
            None => SubtaskId::top(position),
        };
        let id = node.id.clone();
        renumber(&mut node.children, Some(&id));
    }
}

/// Single-subtask plan used by `planner init`.
pub fn default_plan() -> PlanTree {
    PlanTree::new("Top-level goal (edit plan.json)", Vec::new())
}
