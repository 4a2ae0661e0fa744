//! Plan-generation agent: proposes the initial top-level subtasks.

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::core::types::{PlanLimits, StructuredResponse};
use crate::io::generator::Generator;
use crate::io::prompt::{PromptPair, Slot, SlotValues, TemplateError};
use crate::tools::envelope::{ParseError, call_arguments};
use crate::tools::registry::ToolSchema;
use crate::tree::{PlanTree, SubtaskSpec};

use super::{AgentContext, AgentError, AgentOutput, AgentResponse, Capability, CapabilityTag};

pub const PLAN_FUNCTION: &str = "plan_generate";

/// Function the model calls to return a plan.
pub fn plan_schema() -> ToolSchema {
    ToolSchema {
        name: PLAN_FUNCTION.to_string(),
        description: Some("Return the ordered top-level subtasks of the plan.".to_string()),
        parameters: json!({
            "type": "object",
            "properties": {
                "subtasks": {
                    "type": "array",
                    "items": subtask_spec_schema(),
                }
            },
            "required": ["subtasks"]
        }),
    }
}

pub(crate) fn subtask_spec_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": {"type": "string"},
            "goal": {"type": "string"},
            "criticism": {"type": "string"},
            "milestones": {"type": "array", "items": {"type": "string"}}
        },
        "required": ["name", "goal"]
    })
}

/// Slot values shared by the planning prompts.
pub fn limit_values(limits: &PlanLimits) -> SlotValues {
    SlotValues::new()
        .with(Slot::MaxPlanTreeWidth, limits.max_width)
        .with(Slot::MaxPlanTreeDepth, limits.max_depth)
}

/// Subtask specs carried by a plan response.
pub fn subtasks_from_response(response: &StructuredResponse) -> Result<Vec<SubtaskSpec>, ParseError> {
    let mut arguments = call_arguments(response).ok_or(ParseError::MissingField("subtasks"))?;
    let subtasks = arguments
        .remove("subtasks")
        .ok_or(ParseError::MissingField("subtasks"))?;
    serde_json::from_value(subtasks).map_err(|err| ParseError::InvalidField {
        field: "subtasks",
        detail: err.to_string(),
    })
}

/// Build a plan for `goal` from a plan response. An unusable response is
/// logged and yields the single-subtask plan for the goal. Subtasks beyond
/// `limits.max_width` are dropped.
pub fn plan_from_response(
    goal: &str,
    limits: &PlanLimits,
    response: &StructuredResponse,
) -> PlanTree {
    let mut specs = subtasks_from_response(response).unwrap_or_else(|err| {
        warn!(%err, "plan response unusable, falling back to a single subtask");
        Vec::new()
    });
    if specs.len() > limits.max_width {
        warn!(
            subtasks = specs.len(),
            max_width = limits.max_width,
            "plan response exceeds max width, keeping the first subtasks"
        );
        specs.truncate(limits.max_width);
    }
    debug!(subtasks = specs.len(), "generated plan");
    PlanTree::new(goal, specs)
}

#[derive(Debug)]
pub struct PlanGenerateAgent {
    prompt: PromptPair,
}

impl PlanGenerateAgent {
    pub fn new() -> Result<Self, TemplateError> {
        Ok(Self {
            prompt: PromptPair::plan_generate()?,
        })
    }
}

impl Capability for PlanGenerateAgent {
    fn tag(&self) -> CapabilityTag {
        CapabilityTag::PlanGenerate
    }

    fn resolve(
        &self,
        context: &AgentContext,
        generator: &dyn Generator,
    ) -> Result<AgentResponse, AgentError> {
        let mut messages = self.prompt.messages(&context.values)?;
        messages.extend(context.additional_messages.iter().cloned());

        let mut request = context.request(messages);
        if request.functions.is_empty() {
            request.functions = vec![plan_schema()];
            request.function_call = Some(PLAN_FUNCTION.to_string());
        }
        let generation = generator.generate(&request)?;
        Ok(AgentResponse {
            output: AgentOutput::Response(generation.response),
            usage_tokens: generation.usage_tokens,
        })
    }
}
