//! Plan-refinement agent: proposes one mutation per call.

use serde_json::{Value, json};

use crate::core::mutation::MutationOp;
use crate::core::round::RefinementRound;
use crate::core::types::StructuredResponse;
use crate::io::generator::Generator;
use crate::io::prompt::{PromptPair, Slot, SlotValues, TemplateError};
use crate::tools::envelope::{ParseError, call_arguments};
use crate::tools::registry::ToolSchema;

use super::plan_generate::{limit_values, subtask_spec_schema};
use super::{
    AgentContext, AgentError, AgentOutput, AgentResponse, Capability, CapabilityTag,
    insert_messages,
};

pub const OPERATION_FUNCTION: &str = "subtask_operation";

/// Function the model calls to propose one mutation.
pub fn operation_schema() -> ToolSchema {
    ToolSchema {
        name: OPERATION_FUNCTION.to_string(),
        description: Some("Apply one operation to the plan, or exit refinement.".to_string()),
        parameters: json!({
            "type": "object",
            "properties": {
                "op": {"enum": ["split", "add", "delete", "exit"]},
                "target": {"type": "string", "pattern": "^[1-9][0-9]*(\\.[1-9][0-9]*)*$"},
                "subtasks": {"type": "array", "items": subtask_spec_schema()}
            },
            "required": ["op"]
        }),
    }
}

/// Slot values for the refinement prompt at the current point of `round`.
pub fn round_values(
    round: &RefinementRound<'_>,
    workspace_files: &str,
    refine_node_message: &str,
) -> SlotValues {
    let limits = round.mutator().limits();
    limit_values(limits)
        .with(Slot::SubtaskId, round.tree().frontier())
        .with(Slot::MaxStep, round.mutator().max_ops_per_round())
        .with(Slot::ModifySteps, round.accepted())
        .with(Slot::WorkspaceFiles, workspace_files)
        .with(Slot::RefineNodeMessage, refine_node_message)
}

/// The mutation proposed by a refinement response.
pub fn proposal_from_response(response: &StructuredResponse) -> Result<MutationOp, ParseError> {
    let arguments = call_arguments(response).ok_or(ParseError::MissingField("op"))?;
    if !arguments.contains_key("op") {
        return Err(ParseError::MissingField("op"));
    }
    serde_json::from_value(Value::Object(arguments)).map_err(|err| ParseError::InvalidField {
        field: "op",
        detail: err.to_string(),
    })
}

#[derive(Debug)]
pub struct PlanRefineAgent {
    prompt: PromptPair,
}

impl PlanRefineAgent {
    pub fn new() -> Result<Self, TemplateError> {
        Ok(Self {
            prompt: PromptPair::plan_refine()?,
        })
    }
}

impl Capability for PlanRefineAgent {
    fn tag(&self) -> CapabilityTag {
        CapabilityTag::PlanRefine
    }

    fn resolve(
        &self,
        context: &AgentContext,
        generator: &dyn Generator,
    ) -> Result<AgentResponse, AgentError> {
        let messages = insert_messages(
            self.prompt.messages(&context.values)?,
            &context.additional_messages,
            context.additional_insert_index,
        );

        let mut request = context.request(messages);
        if request.functions.is_empty() {
            request.functions = vec![operation_schema()];
            request.function_call = Some(OPERATION_FUNCTION.to_string());
        }
        let generation = generator.generate(&request)?;
        Ok(AgentResponse {
            output: AgentOutput::Response(generation.response),
            usage_tokens: generation.usage_tokens,
        })
    }
}
