//! Dispatcher agent: tailors another agent's prompt to a concrete task.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::types::{Message, StructuredResponse};
use crate::io::generator::Generator;
use crate::io::prompt::{PromptPair, Slot, SlotValues, TemplateError};
use crate::tools::envelope::{ParseError, decode_object};

use super::{AgentContext, AgentError, AgentOutput, AgentResponse, Capability, CapabilityTag};

const ADDITIONAL_PROMPT: &str = "additional_prompt";
const ADDITIONAL_HEADING: &str = "Additional instructions";

static FENCED_PROMPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)ADDITIONAL USER PROMPT:?\n```(.*)```").expect("valid regex")
});

/// Worked example handed to the dispatcher for one target capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchExample {
    pub input: &'static str,
    pub system_prompt: &'static str,
    pub user_prompt: &'static str,
}

/// Example prompt pair for `tag`, taken from that agent's own templates.
pub fn example_for(tag: CapabilityTag) -> Result<DispatchExample, TemplateError> {
    let (input, pair) = match tag {
        CapabilityTag::Dispatcher => ("Write prompts for a code review agent.", PromptPair::dispatcher()?),
        CapabilityTag::PlanGenerate => ("Plan a Python-based calculator.", PromptPair::plan_generate()?),
        CapabilityTag::PlanRefine => ("Refine the plan for a Python-based calculator.", PromptPair::plan_refine()?),
        CapabilityTag::Reflect => ("Reflect on the previous actions.", PromptPair::reflect()?),
        CapabilityTag::Tool => ("Handle the current subtask with tools.", PromptPair::tool()?),
    };
    let (system_prompt, user_prompt) = pair.source();
    Ok(DispatchExample {
        input,
        system_prompt,
        user_prompt,
    })
}

/// Slot values for dispatching `task` to the agent behind `example`.
pub fn dispatch_values(task: &str, example: &DispatchExample, procedure: Option<&str>) -> SlotValues {
    SlotValues::new()
        .with(Slot::Task, task)
        .with(Slot::ExampleInput, example.input)
        .with(Slot::ExampleSystemPrompt, example.system_prompt)
        .with(Slot::ExampleUserPrompt, example.user_prompt)
        .with(Slot::RetrievedProcedure, procedure.unwrap_or("None"))
}

/// Pull the additional prompt out of a dispatcher response.
///
/// Looks at top-level arguments, then function-call arguments, then a
/// fenced `ADDITIONAL USER PROMPT` block in the content.
pub fn extract_additional_prompt(response: &StructuredResponse) -> Result<String, ParseError> {
    let from_arguments = response
        .arguments
        .as_ref()
        .and_then(|args| args.get(ADDITIONAL_PROMPT))
        .and_then(Value::as_str)
        .map(str::to_string);
    let from_call = || {
        response
            .function_call
            .as_ref()
            .and_then(|call| decode_object(&call.arguments).ok())
            .and_then(|args| args.get(ADDITIONAL_PROMPT)?.as_str().map(str::to_string))
    };
    let from_content = || {
        let content = response.content.as_deref()?;
        let captures = FENCED_PROMPT_RE.captures(content)?;
        Some(captures.get(1)?.as_str().trim().to_string())
    };

    from_arguments
        .or_else(from_call)
        .or_else(from_content)
        .ok_or(ParseError::MissingField(ADDITIONAL_PROMPT))
}

/// `[system, user]` messages built from the example prompts, with the
/// additional prompt appended to the user message when non-empty.
pub fn build_messages(example: &DispatchExample, additional_prompt: &str) -> Vec<Message> {
    let mut user_prompt = example.user_prompt.to_string();
    if !additional_prompt.is_empty() {
        user_prompt.push_str(&format!("\n\n{ADDITIONAL_HEADING}\n{additional_prompt}"));
    }
    vec![
        Message::system(example.system_prompt),
        Message::user(user_prompt),
    ]
}

/// Renders the dispatcher prompt for a target capability and returns the
/// tailored prompt messages for that capability.
#[derive(Debug)]
pub struct DispatcherAgent {
    prompt: PromptPair,
    example: DispatchExample,
}

impl DispatcherAgent {
    pub fn new(target: CapabilityTag) -> Result<Self, TemplateError> {
        Ok(Self {
            prompt: PromptPair::dispatcher()?,
            example: example_for(target)?,
        })
    }

    pub fn example(&self) -> &DispatchExample {
        &self.example
    }
}

impl Capability for DispatcherAgent {
    fn tag(&self) -> CapabilityTag {
        CapabilityTag::Dispatcher
    }

    /// `context.values` must carry at least [`Slot::Task`]; example slots
    /// missing from it are filled from the target's templates.
    fn resolve(
        &self,
        context: &AgentContext,
        generator: &dyn Generator,
    ) -> Result<AgentResponse, AgentError> {
        let mut values = context.values.clone();
        let defaults = dispatch_values("", &self.example, None);
        for slot in [
            Slot::ExampleInput,
            Slot::ExampleSystemPrompt,
            Slot::ExampleUserPrompt,
            Slot::RetrievedProcedure,
        ] {
            if let Some(value) = defaults.get(slot) {
                values.set_default(slot, value);
            }
        }

        let mut messages = self.prompt.messages(&values)?;
        messages.extend(context.additional_messages.iter().cloned());
        let generation = generator.generate(&context.request(messages))?;

        let additional_prompt = extract_additional_prompt(&generation.response).unwrap_or_else(|err| {
            warn!(%err, "dispatcher gave no additional prompt, using the example prompt as is");
            String::new()
        });
        debug!(bytes = additional_prompt.len(), "dispatcher additional prompt");

        Ok(AgentResponse {
            output: AgentOutput::Prompt(build_messages(&self.example, &additional_prompt)),
            usage_tokens: generation.usage_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::FunctionCall;
    use crate::test_support::ScriptedGenerator;
    use serde_json::json;

    fn task_context() -> AgentContext {
        AgentContext::new(SlotValues::new().with(Slot::Task, "Build a calculator"))
    }

    #[test]
    fn additional_prompt_from_arguments() {
        let response = StructuredResponse {
            arguments: json!({"additional_prompt": "use Rust"}).as_object().cloned(),
            ..StructuredResponse::default()
        };
        assert_eq!(extract_additional_prompt(&response), Ok("use Rust".to_string()));
    }

    #[test]
    fn additional_prompt_from_function_call_string() {
        let response = StructuredResponse {
            function_call: Some(FunctionCall {
                name: "dispatch".to_string(),
                arguments: json!("{\"additional_prompt\":\"be brief\"}"),
            }),
            ..StructuredResponse::default()
        };
        assert_eq!(extract_additional_prompt(&response), Ok("be brief".to_string()));
    }

    #[test]
    fn additional_prompt_from_fenced_block() {
        let response = StructuredResponse {
            content: Some("Sure.\nADDITIONAL USER PROMPT:\n```\n  check edge cases\n```".to_string()),
            ..StructuredResponse::default()
        };
        assert_eq!(extract_additional_prompt(&response), Ok("check edge cases".to_string()));
    }

    #[test]
    fn missing_additional_prompt_is_a_parse_error() {
        assert_eq!(
            extract_additional_prompt(&StructuredResponse::default()),
            Err(ParseError::MissingField("additional_prompt"))
        );
    }

    #[test]
    fn resolve_appends_additional_instructions() {
        let generator = ScriptedGenerator::new(vec![Ok(StructuredResponse {
            arguments: json!({"additional_prompt": "prefer small steps"}).as_object().cloned(),
            ..StructuredResponse::default()
        })]);
        let agent = DispatcherAgent::new(CapabilityTag::PlanRefine).expect("agent");
        let response = agent.resolve(&task_context(), &generator).expect("resolve");

        let AgentOutput::Prompt(messages) = response.output else {
            panic!("expected prompt output");
        };
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, agent.example().system_prompt);
        assert!(messages[1].content.starts_with(agent.example().user_prompt));
        assert!(messages[1]
            .content
            .ends_with("Additional instructions\nprefer small steps"));

        let request = &generator.requests()[0];
        assert!(request.messages[0].content.contains("Build a calculator"));
        assert!(request.messages[0].content.contains("Refine the plan"));
    }

    #[test]
    fn resolve_without_additional_prompt_keeps_example() {
        let generator = ScriptedGenerator::new(vec![Ok(StructuredResponse::default())]);
        let agent = DispatcherAgent::new(CapabilityTag::Reflect).expect("agent");
        let response = agent.resolve(&task_context(), &generator).expect("resolve");
        assert_eq!(
            response.output,
            AgentOutput::Prompt(vec![
                Message::system(agent.example().system_prompt),
                Message::user(agent.example().user_prompt),
            ])
        );
    }

    #[test]
    fn missing_task_is_a_template_error() {
        let generator = ScriptedGenerator::new(vec![]);
        let agent = DispatcherAgent::new(CapabilityTag::Tool).expect("agent");
        let err = agent
            .resolve(&AgentContext::default(), &generator)
            .unwrap_err();
        assert!(matches!(err, AgentError::Template(TemplateError::MissingSlot { slot: "task", .. })));
        assert_eq!(generator.calls(), 0);
    }
}
