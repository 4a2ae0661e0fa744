//! Reflection agent: summarises a finished subtask for the next one.

use crate::io::generator::Generator;
use crate::io::prompt::{PromptPair, TemplateError};

use super::{AgentContext, AgentError, AgentOutput, AgentResponse, Capability, CapabilityTag};

#[derive(Debug)]
pub struct ReflectAgent {
    prompt: PromptPair,
}

impl ReflectAgent {
    pub fn new() -> Result<Self, TemplateError> {
        Ok(Self {
            prompt: PromptPair::reflect()?,
        })
    }
}

impl Capability for ReflectAgent {
    fn tag(&self) -> CapabilityTag {
        CapabilityTag::Reflect
    }

    fn resolve(
        &self,
        context: &AgentContext,
        generator: &dyn Generator,
    ) -> Result<AgentResponse, AgentError> {
        let mut messages = self.prompt.messages(&context.values)?;
        messages.extend(context.additional_messages.iter().cloned());
        let generation = generator.generate(&context.request(messages))?;
        Ok(AgentResponse {
            output: AgentOutput::Response(generation.response),
            usage_tokens: generation.usage_tokens,
        })
    }
}
