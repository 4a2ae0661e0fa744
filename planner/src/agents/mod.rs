//! Agent capabilities built on the generation collaborator.
//!
//! Each agent is a distinct type implementing [`Capability`]; callers pick
//! one through [`AgentRegistry`] by [`CapabilityTag`].

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::retry::Retryable;
use crate::core::types::{Message, StructuredResponse};
use crate::io::generator::{GenerateError, GenerateRequest, Generator};
use crate::io::prompt::{SlotValues, TemplateError};
use crate::tools::registry::ToolSchema;
use crate::tools::resolver::{ResolveError, ResolvedStep};

pub mod dispatcher;
pub mod plan_generate;
pub mod plan_refine;
pub mod reflect;
pub mod tool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CapabilityTag {
    Dispatcher,
    PlanGenerate,
    PlanRefine,
    Reflect,
    Tool,
}

impl CapabilityTag {
    pub fn as_str(self) -> &'static str {
        match self {
            CapabilityTag::Dispatcher => "dispatcher",
            CapabilityTag::PlanGenerate => "plan_generate",
            CapabilityTag::PlanRefine => "plan_refine",
            CapabilityTag::Reflect => "reflect",
            CapabilityTag::Tool => "tool",
        }
    }
}

impl fmt::Display for CapabilityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs shared by every capability.
#[derive(Debug, Clone)]
pub struct AgentContext {
    /// Values for the agent's prompt slots.
    pub values: SlotValues,
    /// Extra messages spliced into the rendered prompt.
    pub additional_messages: Vec<Message>,
    /// Where agents that support it insert `additional_messages`; negative
    /// values count from the end (`-1` is before the last message).
    pub additional_insert_index: isize,
    pub functions: Vec<ToolSchema>,
    pub function_call: Option<String>,
    pub stop: Vec<String>,
    pub arguments: Option<Map<String, Value>>,
}

impl Default for AgentContext {
    fn default() -> Self {
        Self {
            values: SlotValues::default(),
            additional_messages: Vec::new(),
            additional_insert_index: -1,
            functions: Vec::new(),
            function_call: None,
            stop: Vec::new(),
            arguments: None,
        }
    }
}

impl AgentContext {
    pub fn new(values: SlotValues) -> Self {
        Self {
            values,
            ..Self::default()
        }
    }

    pub(crate) fn request(&self, messages: Vec<Message>) -> GenerateRequest {
        GenerateRequest {
            messages,
            functions: self.functions.clone(),
            function_call: self.function_call.clone(),
            stop: self.stop.clone(),
            arguments: self.arguments.clone(),
        }
    }
}

/// What a capability produced.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentOutput {
    /// Prompt messages for another agent (dispatcher).
    Prompt(Vec<Message>),
    /// The collaborator's response, unchanged (planning and reflection).
    Response(StructuredResponse),
    /// A validated tool invocation.
    ToolCall(ResolvedStep),
    /// The model declared the subtask finished instead of calling a tool.
    Submit {
        content: Option<String>,
        arguments: Map<String, Value>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentResponse {
    pub output: AgentOutput,
    pub usage_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AgentError {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl Retryable for AgentError {
    fn is_retryable(&self) -> bool {
        match self {
            AgentError::Template(_) => false,
            AgentError::Generate(err) => err.is_retryable(),
            AgentError::Resolve(err) => err.is_retryable(),
        }
    }
}

/// One agent behavior.
pub trait Capability {
    fn tag(&self) -> CapabilityTag;

    fn resolve(
        &self,
        context: &AgentContext,
        generator: &dyn Generator,
    ) -> Result<AgentResponse, AgentError>;
}

/// Capabilities keyed by tag. Registering a tag twice replaces the earlier
/// capability.
#[derive(Default)]
pub struct AgentRegistry<'a> {
    agents: BTreeMap<CapabilityTag, Box<dyn Capability + 'a>>,
}

impl<'a> AgentRegistry<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, agent: impl Capability + 'a) {
        self.agents.insert(agent.tag(), Box::new(agent));
    }

    pub fn get(&self, tag: CapabilityTag) -> Option<&(dyn Capability + 'a)> {
        self.agents.get(&tag).map(Box::as_ref)
    }

    pub fn tags(&self) -> impl Iterator<Item = CapabilityTag> + '_ {
        self.agents.keys().copied()
    }
}

/// Splice `extra` into `messages` before `index`, clamping to the ends.
/// Negative indices count from the end.
pub(crate) fn insert_messages(
    mut messages: Vec<Message>,
    extra: &[Message],
    index: isize,
) -> Vec<Message> {
    let len = messages.len() as isize;
    let at = (if index < 0 { len + index } else { index }).clamp(0, len) as usize;
    let tail = messages.split_off(at);
    messages.extend_from_slice(extra);
    messages.extend(tail);
    messages
}
