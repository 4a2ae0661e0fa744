//! Orchestration for `planner resolve`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::instrument;

use crate::core::retry::RetryPolicy;
use crate::core::types::{Message, StructuredResponse};
use crate::io::config::load_config;
use crate::io::generator::{CommandGenerator, Generator};
use crate::tools::registry::{ToolSchemaRegistry, load_registry};
use crate::tools::resolver::{ResolveError, ResolvedStep, ToolCallResolver};

/// Resolve `response` under `retry`, repairing through `generator` when the
/// payload does not validate.
#[instrument(skip_all, fields(max_attempts = retry.max_attempts()))]
pub fn resolve_with_retry<G: Generator>(
    generator: G,
    registry: &ToolSchemaRegistry,
    response: &StructuredResponse,
    messages: &[Message],
    retry: RetryPolicy,
) -> Result<ResolvedStep, ResolveError> {
    let resolver = ToolCallResolver::new(generator);
    retry.run(|_| resolver.resolve_response(response, registry, messages))
}

pub fn load_response(response_path: &Path) -> Result<StructuredResponse> {
    let contents = fs::read_to_string(response_path)
        .with_context(|| format!("read response {}", response_path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("parse response {}", response_path.display()))
}

/// Load config, registry and response from disk and resolve the response
/// through the configured generator command.
pub fn resolve_from_paths(
    config_path: &Path,
    registry_path: &Path,
    response_path: &Path,
) -> Result<ResolvedStep> {
    let cfg = load_config(config_path).context("load planner.toml")?;
    let registry = load_registry(registry_path)?;
    let response = load_response(response_path)?;
    let generator = CommandGenerator::new(&cfg.generator);
    let step = resolve_with_retry(&generator, &registry, &response, &[], cfg.retry_policy())
        .context("resolve tool call")?;
    Ok(step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::FunctionCall;
    use crate::io::generator::GenerateError;
    use crate::test_support::{ScriptedGenerator, search_registry};
    use serde_json::json;

    fn call(name: &str, arguments: serde_json::Value) -> StructuredResponse {
        StructuredResponse {
            function_call: Some(FunctionCall {
                name: name.to_string(),
                arguments,
            }),
            ..StructuredResponse::default()
        }
    }

    #[test]
    fn transient_repair_failure_is_retried() {
        let registry = search_registry();
        let generator = ScriptedGenerator::new(vec![
            Err(GenerateError::Transport("reset".to_string())),
            Ok(call("search", json!({"query": "x"}))),
        ]);
        let step = resolve_with_retry(
            &generator,
            &registry,
            &call("search", json!({})),
            &[],
            RetryPolicy::new(2),
        )
        .expect("resolve");
        assert_eq!(step.invocation.arguments()["query"], "x");
        assert_eq!(generator.calls(), 2);
    }

    #[test]
    fn unknown_tool_is_not_retried() {
        let generator = ScriptedGenerator::new(Vec::new());
        let err = resolve_with_retry(
            &generator,
            &search_registry(),
            &call("browse", json!({})),
            &[],
            RetryPolicy::new(3),
        )
        .unwrap_err();
        assert_eq!(err, ResolveError::SchemaNotFound("browse".to_string()));
        assert_eq!(generator.calls(), 0);
    }

    #[test]
    fn load_response_reads_structured_response() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("response.json");
        fs::write(
            &path,
            r#"{"function_call":{"name":"search","arguments":"{\"query\":\"rust\"}"}}"#,
        )
        .expect("write");
        let response = load_response(&path).expect("load");
        assert_eq!(response.function_call.expect("call").name, "search");
    }
}
