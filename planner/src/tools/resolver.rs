//! Turns raw tool calls into validated [`ToolInvocation`]s.
//!
//! Validation failures get exactly one repair round-trip through the
//! generation collaborator. Retrying the whole step on transient failures
//! is the caller's job (see [`crate::core::retry::RetryPolicy`]).

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::core::retry::Retryable;
use crate::core::types::{Message, StructuredResponse, ToolInvocation};
use crate::io::generator::{GenerateError, GenerateRequest, Generator};
use crate::tools::envelope::{self, RawToolCall, decode_object};
use crate::tools::registry::{ToolSchema, ToolSchemaRegistry};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The referenced tool is not registered. No repair is attempted.
    #[error("tool {0} has no registered schema")]
    SchemaNotFound(String),
    /// The payload is still invalid after the repair attempt.
    #[error("arguments for tool {name} are invalid after repair: {error}")]
    ToolCall { name: String, error: String },
    #[error(transparent)]
    Generate(#[from] GenerateError),
}

impl ResolveError {
    pub fn reason(&self) -> &'static str {
        match self {
            ResolveError::SchemaNotFound(_) => "SchemaNotFound",
            ResolveError::ToolCall { .. } => "ToolCall",
            ResolveError::Generate(_) => "Generate",
        }
    }
}

impl Retryable for ResolveError {
    fn is_retryable(&self) -> bool {
        match self {
            ResolveError::Generate(err) => err.is_retryable(),
            ResolveError::SchemaNotFound(_) | ResolveError::ToolCall { .. } => false,
        }
    }
}

/// A resolved step: the validated invocation plus the response's residual
/// reasoning fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStep {
    pub content: Option<String>,
    pub invocation: ToolInvocation,
    pub reasoning: Map<String, Value>,
}

pub struct ToolCallResolver<G> {
    generator: G,
}

impl<G: Generator> ToolCallResolver<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    /// Validate `raw` against its registered schema, repairing it once on
    /// failure. `messages` is the context that produced `raw`; it is
    /// forwarded with the repair request.
    #[instrument(skip_all, fields(tool = %raw.name))]
    pub fn resolve(
        &self,
        raw: &RawToolCall,
        registry: &ToolSchemaRegistry,
        messages: &[Message],
    ) -> Result<ToolInvocation, ResolveError> {
        let schema = registry
            .get(&raw.name)
            .ok_or_else(|| ResolveError::SchemaNotFound(raw.name.clone()))?;

        let first_error = match check(registry, &raw.name, &raw.payload) {
            Ok(arguments) => {
                debug!("arguments valid");
                return Ok(ToolInvocation::validated(raw.name.clone(), arguments));
            }
            Err(error) => error,
        };

        info!(error = %first_error, "arguments invalid, requesting repair");
        let request = repair_request(schema, &raw.payload, &first_error, messages);
        let generation = self.generator.generate(&request)?;
        let repaired = repaired_payload(generation.response);

        match check(registry, &raw.name, &repaired) {
            Ok(arguments) => {
                info!("repair produced valid arguments");
                Ok(ToolInvocation::validated(raw.name.clone(), arguments))
            }
            Err(error) => {
                warn!(%error, "repair did not produce valid arguments");
                Err(ResolveError::ToolCall {
                    name: raw.name.clone(),
                    error,
                })
            }
        }
    }

    /// Extract the tool call from a response and resolve it.
    ///
    /// A response without a usable function call names no tool; the empty
    /// default name is reported as `SchemaNotFound`.
    pub fn resolve_response(
        &self,
        response: &StructuredResponse,
        registry: &ToolSchemaRegistry,
        messages: &[Message],
    ) -> Result<ResolvedStep, ResolveError> {
        let envelope = envelope::extract(response);
        let raw = envelope
            .call
            .ok_or_else(|| ResolveError::SchemaNotFound(String::new()))?;
        let invocation = self.resolve(&raw, registry, messages)?;
        Ok(ResolvedStep {
            content: envelope.content,
            invocation,
            reasoning: envelope.reasoning,
        })
    }
}

/// Decode and validate a payload, returning the argument map or the joined
/// error text.
fn check(
    registry: &ToolSchemaRegistry,
    name: &str,
    payload: &Value,
) -> Result<Map<String, Value>, String> {
    let arguments = decode_object(payload)?;
    let errors = registry
        .validation_errors(name, &Value::Object(arguments.clone()))
        .ok_or_else(|| format!("tool {name} has no registered schema"))?;
    if !errors.is_empty() {
        return Err(errors.join("; "));
    }
    Ok(arguments)
}

fn repair_request(
    schema: &ToolSchema,
    payload: &Value,
    error: &str,
    messages: &[Message],
) -> GenerateRequest {
    let broken = match payload {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    let mut context = messages.to_vec();
    context.push(Message::user(format!(
        "The arguments for function `{}` are invalid.\n\
         Arguments:\n```json\n{broken}\n```\n\
         Validation error:\n```\n{error}\n```\n\
         Call `{}` again with arguments that satisfy its parameter schema.",
        schema.name, schema.name
    )));
    GenerateRequest::new(context)
        .with_functions(vec![schema.clone()])
        .with_function_call(schema.name.clone())
}

/// The repaired payload is the forced function call's arguments, falling
/// back to top-level arguments when the collaborator returns those instead.
fn repaired_payload(response: StructuredResponse) -> Value {
    if let Some(call) = response.function_call {
        return call.arguments;
    }
    match response.arguments {
        Some(arguments) => Value::Object(arguments),
        None => {
            warn!("repair response carried no arguments");
            Value::Object(Map::new())
        }
    }
}
