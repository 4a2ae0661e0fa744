//! Tool agent: asks for the next step of a subtask and turns the answer
//! into a validated tool invocation.
//!
//! The model answers through one of two wrapper functions:
//! `subtask_handle` (reasoning plus an embedded tool call) or
//! `subtask_submit` (the subtask is finished). The whole step, generation
//! and resolution together, runs under the agent's [`RetryPolicy`].

use serde_json::json;
use tracing::{debug, info, instrument};

use crate::core::retry::RetryPolicy;
use crate::core::types::StructuredResponse;
use crate::io::generator::Generator;
use crate::io::prompt::{PromptPair, Slot, TemplateError};
use crate::tools::envelope::call_arguments;
use crate::tools::registry::{ToolSchema, ToolSchemaRegistry};
use crate::tools::resolver::ToolCallResolver;

use super::{
    AgentContext, AgentError, AgentOutput, AgentResponse, Capability, CapabilityTag,
    insert_messages,
};

pub const HANDLE_FUNCTION: &str = "subtask_handle";
pub const SUBMIT_FUNCTION: &str = "subtask_submit";

pub fn handle_schema() -> ToolSchema {
    ToolSchema {
        name: HANDLE_FUNCTION.to_string(),
        description: Some("Make one tool call to progress the current subtask.".to_string()),
        parameters: json!({
            "type": "object",
            "properties": {
                "thought": {"type": "string"},
                "plan": {"type": "array", "items": {"type": "string"}},
                "criticism": {"type": "string"},
                "tool_call": {
                    "type": "object",
                    "properties": {
                        "tool_name": {"type": "string"},
                        "tool_input": {"type": ["object", "string"]}
                    },
                    "required": ["tool_name"]
                }
            },
            "required": ["thought", "tool_call"]
        }),
    }
}

pub fn submit_schema() -> ToolSchema {
    ToolSchema {
        name: SUBMIT_FUNCTION.to_string(),
        description: Some("Finish the current subtask and report the outcome.".to_string()),
        parameters: json!({
            "type": "object",
            "properties": {
                "success": {"type": "boolean"},
                "conclusion": {"type": "string"},
                "milestones": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["success", "conclusion"]
        }),
    }
}

/// Tool list as shown to the model.
pub fn describe_tools(registry: &ToolSchemaRegistry) -> String {
    serde_json::to_string_pretty(&registry.schemas()).unwrap_or_default()
}

fn is_submit(response: &StructuredResponse) -> bool {
    response
        .function_call
        .as_ref()
        .is_some_and(|call| call.name == SUBMIT_FUNCTION)
}

pub struct ToolAgent<'a> {
    prompt: PromptPair,
    registry: &'a ToolSchemaRegistry,
    retry: RetryPolicy,
}

impl<'a> ToolAgent<'a> {
    pub fn new(registry: &'a ToolSchemaRegistry, retry: RetryPolicy) -> Result<Self, TemplateError> {
        Ok(Self {
            prompt: PromptPair::tool()?,
            registry,
            retry,
        })
    }
}

impl Capability for ToolAgent<'_> {
    fn tag(&self) -> CapabilityTag {
        CapabilityTag::Tool
    }

    /// [`Slot::ToolFunctionsDescriptionList`] defaults to the registry's
    /// schemas when the context leaves it unset.
    #[instrument(skip_all, fields(max_attempts = self.retry.max_attempts()))]
    fn resolve(
        &self,
        context: &AgentContext,
        generator: &dyn Generator,
    ) -> Result<AgentResponse, AgentError> {
        let mut values = context.values.clone();
        values.set_default(Slot::ToolFunctionsDescriptionList, describe_tools(self.registry));
        let messages = insert_messages(
            self.prompt.messages(&values)?,
            &context.additional_messages,
            context.additional_insert_index,
        );

        let mut request = context.request(messages.clone());
        if request.functions.is_empty() {
            request.functions = vec![submit_schema(), handle_schema()];
        }

        let resolver = ToolCallResolver::new(generator);
        let mut usage_tokens = 0;
        let output = self
            .retry
            .run(|attempt| -> Result<AgentOutput, AgentError> {
                debug!(attempt, "requesting next step");
                let generation = generator.generate(&request)?;
                usage_tokens += generation.usage_tokens;
                let response = generation.response;

                if is_submit(&response) {
                    info!("subtask submitted");
                    return Ok(AgentOutput::Submit {
                        arguments: call_arguments(&response).unwrap_or_default(),
                        content: response.content,
                    });
                }
                let step = resolver.resolve_response(&response, self.registry, &messages)?;
                info!(tool = step.invocation.name(), "tool call resolved");
                Ok(AgentOutput::ToolCall(step))
            })?;

        Ok(AgentResponse {
            output,
            usage_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::FunctionCall;
    use crate::io::generator::GenerateError;
    use crate::io::prompt::SlotValues;
    use crate::test_support::{ScriptedGenerator, search_registry};
    use crate::tools::resolver::ResolveError;
    use serde_json::{Value, json};

    fn context() -> AgentContext {
        AgentContext::new(
            SlotValues::new()
                .with(Slot::AllPlan, "- 1 [in_progress] research")
                .with(Slot::TerminalPlan, "1 research")
                .with(Slot::WorkspaceFiles, "(empty)")
                .with(Slot::ActionProcess, "(none)"),
        )
    }

    fn handle(tool_input: Value) -> StructuredResponse {
        StructuredResponse {
            function_call: Some(FunctionCall {
                name: HANDLE_FUNCTION.to_string(),
                arguments: json!({
                    "thought": "search first",
                    "tool_call": {"tool_name": "search", "tool_input": tool_input}
                }),
            }),
            ..StructuredResponse::default()
        }
    }

    fn repair(arguments: Value) -> StructuredResponse {
        StructuredResponse {
            function_call: Some(FunctionCall {
                name: "search".to_string(),
                arguments,
            }),
            ..StructuredResponse::default()
        }
    }

    #[test]
    fn handle_call_is_resolved_with_one_repair() {
        let registry = search_registry();
        let generator = ScriptedGenerator::new(vec![
            Ok(handle(json!({}))),
            Ok(repair(json!({"query": "x"}))),
        ]);
        let agent = ToolAgent::new(&registry, RetryPolicy::new(3)).expect("agent");
        let response = agent.resolve(&context(), &generator).expect("resolve");

        let AgentOutput::ToolCall(step) = response.output else {
            panic!("expected tool call");
        };
        assert_eq!(step.invocation.name(), "search");
        assert_eq!(step.invocation.arguments()["query"], "x");
        assert_eq!(step.reasoning["thought"], "search first");
        assert_eq!(response.usage_tokens, 1);

        let requests = generator.requests();
        assert_eq!(requests.len(), 2);
        let names: Vec<&str> = requests[0].functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec![SUBMIT_FUNCTION, HANDLE_FUNCTION]);
        assert!(requests[0].messages[0].content.contains("\"search\""));
        assert_eq!(requests[1].function_call.as_deref(), Some("search"));
    }

    #[test]
    fn transient_failures_retry_the_whole_step() {
        let registry = search_registry();
        let generator = ScriptedGenerator::new(vec![
            Err(GenerateError::Timeout(std::time::Duration::from_secs(1))),
            Ok(handle(json!("{\"query\":\"y\"}"))),
        ]);
        let agent = ToolAgent::new(&registry, RetryPolicy::new(2)).expect("agent");
        let response = agent.resolve(&context(), &generator).expect("resolve");
        assert!(matches!(response.output, AgentOutput::ToolCall(_)));
        assert_eq!(generator.calls(), 2);
    }

    #[test]
    fn last_transient_failure_is_surfaced() {
        let registry = search_registry();
        let generator = ScriptedGenerator::new(vec![
            Err(GenerateError::Transport("reset".to_string())),
            Err(GenerateError::MalformedEnvelope("eof".to_string())),
        ]);
        let agent = ToolAgent::new(&registry, RetryPolicy::new(2)).expect("agent");
        let err = agent.resolve(&context(), &generator).unwrap_err();
        assert_eq!(
            err,
            AgentError::Generate(GenerateError::MalformedEnvelope("eof".to_string()))
        );
    }

    #[test]
    fn tool_call_error_is_not_retried() {
        let registry = search_registry();
        let generator = ScriptedGenerator::new(vec![
            Ok(handle(json!({}))),
            Ok(repair(json!({"nope": 1}))),
        ]);
        let agent = ToolAgent::new(&registry, RetryPolicy::new(5)).expect("agent");
        let err = agent.resolve(&context(), &generator).unwrap_err();
        assert!(matches!(err, AgentError::Resolve(ResolveError::ToolCall { .. })));
        assert_eq!(generator.calls(), 2);
    }

    #[test]
    fn submit_ends_the_subtask() {
        let registry = search_registry();
        let generator = ScriptedGenerator::new(vec![Ok(StructuredResponse {
            content: Some("done".to_string()),
            function_call: Some(FunctionCall {
                name: SUBMIT_FUNCTION.to_string(),
                arguments: json!({"success": true, "conclusion": "found it"}),
            }),
            arguments: None,
        })]);
        let agent = ToolAgent::new(&registry, RetryPolicy::new(1)).expect("agent");
        let response = agent.resolve(&context(), &generator).expect("resolve");
        match response.output {
            AgentOutput::Submit { content, arguments } => {
                assert_eq!(content.as_deref(), Some("done"));
                assert_eq!(arguments["conclusion"], "found it");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
