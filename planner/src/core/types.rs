//! Shared types for the planner core.
//!
//! These types define the contracts between the plan tree, the tool-call
//! resolver and the generation collaborator. They carry no I/O.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Width/depth bounds every plan tree must respect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanLimits {
    /// Maximum children per subtask (and top-level subtasks).
    pub max_width: usize,
    /// Maximum id depth (`1.2.3` has depth 3).
    pub max_depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry of the message context sent to the generation collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Function call emitted by the model. `arguments` is either a JSON string
/// or an already-decoded object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Structured response contract of the generation collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Map<String, Value>>,
}

/// A response together with the tokens it consumed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub response: StructuredResponse,
    #[serde(default)]
    pub usage_tokens: u64,
}

/// A tool invocation whose arguments passed schema validation.
///
/// Only [`crate::tools::resolver::ToolCallResolver`] constructs these.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInvocation {
    name: String,
    arguments: Map<String, Value>,
}

impl ToolInvocation {
    pub(crate) fn validated(name: String, arguments: Map<String, Value>) -> Self {
        Self { name, arguments }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &Map<String, Value> {
        &self.arguments
    }

    pub fn into_parts(self) -> (String, Map<String, Value>) {
        (self.name, self.arguments)
    }
}
