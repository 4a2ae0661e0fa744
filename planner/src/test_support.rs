//! Test-only helpers for building plans, registries and scripted generators.

use std::cell::RefCell;
use std::collections::VecDeque;

use serde_json::json;

use crate::core::id::SubtaskId;
use crate::core::types::{Generation, PlanLimits, StructuredResponse};
use crate::io::generator::{GenerateError, GenerateRequest, Generator};
use crate::tools::registry::{ToolSchema, ToolSchemaRegistry};
use crate::tree::{PlanTree, SubtaskNode, SubtaskStatus};

/// Parse a dotted id, panicking on malformed input.
pub fn id(raw: &str) -> SubtaskId {
    raw.parse().expect("valid subtask id")
}

/// Create a deterministic pending leaf.
pub fn leaf(raw: &str) -> SubtaskNode {
    SubtaskNode {
        id: id(raw),
        name: format!("{raw} name"),
        goal: format!("{raw} goal"),
        criticism: String::new(),
        milestones: Vec::new(),
        status: SubtaskStatus::Pending,
        children: Vec::new(),
    }
}

/// Create a leaf already marked `done`.
pub fn done_leaf(raw: &str) -> SubtaskNode {
    SubtaskNode {
        status: SubtaskStatus::Done,
        ..leaf(raw)
    }
}

/// Create a node with children using deterministic defaults.
pub fn node_with_children(raw: &str, children: Vec<SubtaskNode>) -> SubtaskNode {
    SubtaskNode {
        children,
        ..leaf(raw)
    }
}

/// Assemble a plan from top-level nodes with the frontier at `frontier`.
pub fn plan(subtasks: Vec<SubtaskNode>, frontier: &str) -> PlanTree {
    PlanTree::from_parts("test goal", subtasks, id(frontier))
}

pub fn limits(max_width: usize, max_depth: usize) -> PlanLimits {
    PlanLimits {
        max_width,
        max_depth,
    }
}

/// Registry holding a single `search` tool that requires `query`.
pub fn search_registry() -> ToolSchemaRegistry {
    ToolSchemaRegistry::from_schemas([ToolSchema {
        name: "search".to_string(),
        description: Some("Search the web".to_string()),
        parameters: json!({"required": ["query"]}),
    }])
    .expect("search registry")
}

/// Generator that replays queued outcomes and records every request.
///
/// Running out of queued outcomes is reported as a transport error so tests
/// see unexpected calls instead of hanging.
#[derive(Default)]
pub struct ScriptedGenerator {
    outcomes: RefCell<VecDeque<Result<StructuredResponse, GenerateError>>>,
    requests: RefCell<Vec<GenerateRequest>>,
}

impl ScriptedGenerator {
    pub fn new(outcomes: Vec<Result<StructuredResponse, GenerateError>>) -> Self {
        Self {
            outcomes: RefCell::new(outcomes.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Requests seen so far, in call order.
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.borrow().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl Generator for ScriptedGenerator {
    fn generate(&self, request: &GenerateRequest) -> Result<Generation, GenerateError> {
        self.requests.borrow_mut().push(request.clone());
        let outcome = self
            .outcomes
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(GenerateError::Transport("script exhausted".to_string())))?;
        Ok(Generation {
            response: outcome,
            usage_tokens: 1,
        })
    }
}
