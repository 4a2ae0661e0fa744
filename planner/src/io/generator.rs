//! Generation collaborator boundary.
//!
//! The [`Generator`] trait is the single blocking request/response call into
//! whatever produces model output. The planner never looks past the
//! [`crate::core::types::StructuredResponse`] contract. Tests use scripted generators; the CLI
//! uses [`CommandGenerator`], which delegates to an external process.

use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::core::retry::Retryable;
use crate::core::types::{Generation, Message};
use crate::io::config::GeneratorConfig;
use crate::io::process::{ProcessLimits, run_with_input};
use crate::tools::registry::ToolSchema;

/// Everything the collaborator needs to produce one response.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerateRequest {
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<ToolSchema>,
    /// Name of the function the model is required to call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Map<String, Value>>,
}

impl GenerateRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn with_functions(mut self, functions: Vec<ToolSchema>) -> Self {
        self.functions = functions;
        self
    }

    pub fn with_function_call(mut self, name: impl Into<String>) -> Self {
        self.function_call = Some(name.into());
        self
    }
}

/// Failures of the generation call itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerateError {
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
    #[error("generation transport failed: {0}")]
    Transport(String),
    #[error("generation returned a malformed envelope: {0}")]
    MalformedEnvelope(String),
}

impl Retryable for GenerateError {
    fn is_retryable(&self) -> bool {
        true
    }
}

/// Blocking request/response call into the generation collaborator.
pub trait Generator {
    fn generate(&self, request: &GenerateRequest) -> Result<Generation, GenerateError>;
}

impl<G: Generator + ?Sized> Generator for &G {
    fn generate(&self, request: &GenerateRequest) -> Result<Generation, GenerateError> {
        (**self).generate(request)
    }
}

/// Generator backed by an external command.
///
/// The JSON-encoded [`GenerateRequest`] is written to the command's stdin;
/// the command must print a JSON [`Generation`] on stdout and exit zero.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    argv: Vec<String>,
    limits: ProcessLimits,
}

impl CommandGenerator {
    pub fn new(config: &GeneratorConfig) -> Self {
        Self {
            argv: config.command.clone(),
            limits: ProcessLimits {
                timeout: Duration::from_secs(config.timeout_secs),
                output_limit_bytes: config.output_limit_bytes,
            },
        }
    }
}

impl Generator for CommandGenerator {
    #[instrument(skip_all, fields(messages = request.messages.len(), functions = request.functions.len()))]
    fn generate(&self, request: &GenerateRequest) -> Result<Generation, GenerateError> {
        let payload = serde_json::to_vec(request)
            .map_err(|err| GenerateError::Transport(format!("encode request: {err}")))?;

        info!(command = ?self.argv, "invoking generator command");
        let output = run_with_input(&self.argv, &payload, self.limits)
            .map_err(|err| GenerateError::Transport(format!("{err:#}")))?;

        if output.timed_out {
            warn!(timeout_secs = self.limits.timeout.as_secs(), "generator timed out");
            return Err(GenerateError::Timeout(self.limits.timeout));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "generator failed");
            return Err(GenerateError::Transport(format!(
                "exit status {:?}: {}",
                output.status.code(),
                output.stderr_lossy()
            )));
        }
        if output.stdout_dropped > 0 {
            return Err(GenerateError::MalformedEnvelope(format!(
                "response truncated ({} bytes over limit)",
                output.stdout_dropped
            )));
        }

        let generation: Generation = serde_json::from_slice(&output.stdout)
            .map_err(|err| GenerateError::MalformedEnvelope(err.to_string()))?;
        debug!(usage_tokens = generation.usage_tokens, "generator responded");
        Ok(generation)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn generator(script: &str, timeout_secs: u64) -> CommandGenerator {
        CommandGenerator::new(&GeneratorConfig {
            command: vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            timeout_secs,
            output_limit_bytes: 10_000,
        })
    }

    fn request() -> GenerateRequest {
        GenerateRequest::new(vec![Message::user("hi")])
    }

    #[test]
    fn parses_generation_from_stdout() {
        let script = r#"cat > /dev/null; echo '{"response":{"content":"ok"},"usage_tokens":12}'"#;
        let generation = generator(script, 5).generate(&request()).expect("generate");
        assert_eq!(generation.response.content.as_deref(), Some("ok"));
        assert_eq!(generation.usage_tokens, 12);
    }

    #[test]
    fn non_json_stdout_is_malformed_envelope() {
        let err = generator("cat > /dev/null; echo nope", 5)
            .generate(&request())
            .unwrap_err();
        assert!(matches!(err, GenerateError::MalformedEnvelope(_)));
    }

    #[test]
    fn non_zero_exit_is_transport_error() {
        let err = generator("cat > /dev/null; echo boom >&2; exit 3", 5)
            .generate(&request())
            .unwrap_err();
        match err {
            GenerateError::Transport(message) => assert!(message.contains("boom")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn slow_command_times_out() {
        let err = generator("exec sleep 5", 1).generate(&request()).unwrap_err();
        assert_eq!(err, GenerateError::Timeout(Duration::from_secs(1)));
    }

    #[test]
    fn request_serializes_optional_fields_only_when_set() {
        let json = serde_json::to_value(request().with_function_call("search")).expect("json");
        assert_eq!(json["function_call"], "search");
        assert!(json.get("functions").is_none());
        assert!(json.get("stop").is_none());
    }
}
