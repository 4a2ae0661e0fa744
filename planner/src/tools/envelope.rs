//! Extraction of candidate tool calls from structured model responses.
//!
//! Two envelope shapes are accepted:
//!
//! - a plain function call: `function_call = {name, arguments}`;
//! - a wrapped call whose `arguments` carry reasoning fields (thought,
//!   plan, criticism...) plus `tool_call = {tool_name, tool_input}`.
//!
//! The wrapped shape is split into the embedded tool call and the residual
//! reasoning fields.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::core::types::StructuredResponse;

const TOOL_CALL: &str = "tool_call";
const TOOL_NAME: &str = "tool_name";
const TOOL_INPUT: &str = "tool_input";

/// A tool name and its unvalidated payload (JSON text or an object).
#[derive(Debug, Clone, PartialEq)]
pub struct RawToolCall {
    pub name: String,
    pub payload: Value,
}

impl RawToolCall {
    pub fn new(name: impl Into<String>, payload: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
        }
    }
}

/// The pieces of a response relevant to tool execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    pub content: Option<String>,
    pub call: Option<RawToolCall>,
    /// Per-step reasoning fields left after removing the tool call.
    pub reasoning: Map<String, Value>,
}

/// A structured field the response was expected to carry is missing or
/// unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("response has no function_call")]
    MissingFunctionCall,
    #[error("tool_call has no tool_name")]
    MissingToolName,
    #[error("response has no {0} field")]
    MissingField(&'static str),
    #[error("response field {field} is malformed: {detail}")]
    InvalidField { field: &'static str, detail: String },
}

/// Strict extraction; any missing field is an error.
pub fn try_extract(response: &StructuredResponse) -> Result<Envelope, ParseError> {
    let call = response
        .function_call
        .as_ref()
        .ok_or(ParseError::MissingFunctionCall)?;
    let content = response.content.clone();

    let wrapped = decode_object(&call.arguments)
        .ok()
        .filter(|args| args.contains_key(TOOL_CALL));
    let Some(mut reasoning) = wrapped else {
        return Ok(Envelope {
            content,
            call: Some(RawToolCall::new(call.name.clone(), call.arguments.clone())),
            reasoning: response.arguments.clone().unwrap_or_default(),
        });
    };

    let embedded = reasoning.remove(TOOL_CALL).unwrap_or(Value::Null);
    let name = embedded
        .get(TOOL_NAME)
        .and_then(Value::as_str)
        .ok_or(ParseError::MissingToolName)?
        .to_string();
    let payload = embedded
        .get(TOOL_INPUT)
        .cloned()
        .unwrap_or_else(|| Value::String(String::new()));

    Ok(Envelope {
        content,
        call: Some(RawToolCall { name, payload }),
        reasoning,
    })
}

/// Lenient extraction: parse errors are logged and replaced by defaults.
///
/// A response without a usable function call yields an envelope whose
/// `call` is `None`; its reasoning fields are kept.
pub fn extract(response: &StructuredResponse) -> Envelope {
    match try_extract(response) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(%err, "could not extract tool call, using empty default");
            let reasoning = response
                .function_call
                .as_ref()
                .and_then(|call| decode_object(&call.arguments).ok())
                .map(|mut args| {
                    args.remove(TOOL_CALL);
                    args
                })
                .or_else(|| response.arguments.clone())
                .unwrap_or_default();
            Envelope {
                content: response.content.clone(),
                call: None,
                reasoning,
            }
        }
    }
}

/// Arguments of the response's function call, falling back to its
/// top-level arguments.
pub fn call_arguments(response: &StructuredResponse) -> Option<Map<String, Value>> {
    response
        .function_call
        .as_ref()
        .and_then(|call| decode_object(&call.arguments).ok())
        .filter(|args| !args.is_empty())
        .or_else(|| response.arguments.clone())
}

/// Decode a payload into an object. An empty string is an empty object.
pub fn decode_object(payload: &Value) -> Result<Map<String, Value>, String> {
    match payload {
        Value::Object(map) => Ok(map.clone()),
        Value::Null => Ok(Map::new()),
        Value::String(text) if text.trim().is_empty() => Ok(Map::new()),
        Value::String(text) => match parse_lenient(text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(format!("expected a JSON object, got {}", kind(&other))),
            Err(err) => Err(format!("invalid JSON: {err}")),
        },
        other => Err(format!("expected a JSON object, got {}", kind(other))),
    }
}

/// Strict JSON first, then JSON5 (single quotes, unquoted keys, trailing
/// commas). The strict parser's error is reported when both fail.
fn parse_lenient(text: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(text).or_else(|err| json5::from_str(text).map_err(|_| err))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::FunctionCall;
    use serde_json::json;

    fn response(name: &str, arguments: Value) -> StructuredResponse {
        StructuredResponse {
            content: Some("thinking".to_string()),
            function_call: Some(FunctionCall {
                name: name.to_string(),
                arguments,
            }),
            arguments: None,
        }
    }

    #[test]
    fn plain_call_passes_through() {
        let envelope = try_extract(&response("search", json!("{\"query\":\"x\"}"))).expect("extract");
        assert_eq!(
            envelope.call,
            Some(RawToolCall::new("search", "{\"query\":\"x\"}"))
        );
        assert!(envelope.reasoning.is_empty());
        assert_eq!(envelope.content.as_deref(), Some("thinking"));
    }

    #[test]
    fn wrapped_call_is_split_from_reasoning() {
        let args = json!({
            "thought": "look it up",
            "criticism": "none",
            "tool_call": {"tool_name": "search", "tool_input": {"query": "x"}}
        });
        let envelope = try_extract(&response("subtask_handle", args)).expect("extract");
        assert_eq!(envelope.call, Some(RawToolCall::new("search", json!({"query": "x"}))));
        assert_eq!(envelope.reasoning.len(), 2);
        assert_eq!(envelope.reasoning["thought"], "look it up");
        assert!(!envelope.reasoning.contains_key(TOOL_CALL));
    }

    #[test]
    fn wrapped_call_in_string_arguments_is_decoded() {
        let args = json!({"thought": "t", "tool_call": {"tool_name": "noop"}}).to_string();
        let envelope = try_extract(&response("subtask_handle", Value::String(args))).expect("extract");
        assert_eq!(envelope.call, Some(RawToolCall::new("noop", "")));
        assert_eq!(envelope.reasoning["thought"], "t");
    }

    #[test]
    fn missing_function_call_defaults_to_no_call() {
        let response = StructuredResponse {
            content: Some("done".to_string()),
            function_call: None,
            arguments: Some(json!({"thought": "t"}).as_object().cloned().expect("object")),
        };
        assert_eq!(try_extract(&response), Err(ParseError::MissingFunctionCall));
        let envelope = extract(&response);
        assert_eq!(envelope.call, None);
        assert_eq!(envelope.reasoning["thought"], "t");
    }

    #[test]
    fn missing_tool_name_is_a_parse_error() {
        let args = json!({"tool_call": {"tool_input": {}}});
        let response = response("subtask_handle", args);
        assert_eq!(try_extract(&response), Err(ParseError::MissingToolName));
        assert_eq!(extract(&response).call, None);
    }

    #[test]
    fn decode_object_handles_payload_shapes() {
        assert_eq!(decode_object(&json!("")), Ok(Map::new()));
        assert_eq!(decode_object(&json!({"a": 1})).expect("object")["a"], 1);
        assert_eq!(decode_object(&json!("{\"a\":1}")).expect("string")["a"], 1);
        assert!(decode_object(&json!("[1]")).unwrap_err().contains("array"));
        assert!(decode_object(&json!("{oops")).unwrap_err().contains("invalid JSON"));
        assert!(decode_object(&json!(3)).is_err());
    }

    #[test]
    fn decode_object_accepts_json5_payloads() {
        let decoded = decode_object(&json!("{query: 'x', tags: ['a',],}")).expect("json5");
        assert_eq!(decoded["query"], "x");
        assert_eq!(decoded["tags"], json!(["a"]));
        assert!(decode_object(&json!("['x']")).unwrap_err().contains("array"));
    }

    #[test]
    fn call_arguments_prefers_function_call() {
        let mut with_both = response("plan", json!("{\"a\":1}"));
        with_both.arguments = json!({"b": 2}).as_object().cloned();
        assert_eq!(call_arguments(&with_both).expect("args")["a"], 1);

        with_both.function_call = None;
        assert_eq!(call_arguments(&with_both).expect("args")["b"], 2);
        assert_eq!(call_arguments(&StructuredResponse::default()), None);
    }
}
