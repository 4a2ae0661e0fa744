//! Read-only registry of tool parameter schemas.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use jsonschema::{Draft, Validator};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Parameter contract for one tool, in function-calling shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema the call arguments must satisfy.
    #[serde(default = "empty_object")]
    pub parameters: Value,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

struct RegisteredTool {
    schema: ToolSchema,
    validator: Validator,
}

/// Tool schemas keyed by exact name, each compiled once on insert.
///
/// Lookups never mutate the registry; callers share it by reference.
#[derive(Default)]
pub struct ToolSchemaRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolSchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_schemas(schemas: impl IntoIterator<Item = ToolSchema>) -> Result<Self> {
        let mut registry = Self::new();
        for schema in schemas {
            registry.insert(schema)?;
        }
        Ok(registry)
    }

    /// Compile and register `schema`. Duplicate names are rejected.
    pub fn insert(&mut self, schema: ToolSchema) -> Result<()> {
        if self.tools.contains_key(&schema.name) {
            bail!("duplicate tool schema {}", schema.name);
        }
        let validator = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(&schema.parameters)
            .with_context(|| format!("compile parameters of tool {}", schema.name))?;
        debug!(tool = %schema.name, "registered tool schema");
        self.tools
            .insert(schema.name.clone(), RegisteredTool { schema, validator });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ToolSchema> {
        self.tools.get(name).map(|tool| &tool.schema)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Registered schemas in name order.
    pub fn schemas(&self) -> Vec<&ToolSchema> {
        let mut schemas: Vec<&ToolSchema> = self.tools.values().map(|tool| &tool.schema).collect();
        schemas.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Validation errors of `arguments` against the parameters of `name`.
    ///
    /// Returns `None` for unknown tools and an empty list for valid input.
    pub fn validation_errors(&self, name: &str, arguments: &Value) -> Option<Vec<String>> {
        let tool = self.tools.get(name)?;
        Some(
            tool.validator
                .iter_errors(arguments)
                .map(|err| err.to_string())
                .collect(),
        )
    }
}

impl fmt::Debug for ToolSchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSchemaRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

/// Load a registry from a JSON array of tool schemas.
pub fn load_registry(path: &Path) -> Result<ToolSchemaRegistry> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read registry {}", path.display()))?;
    let schemas: Vec<ToolSchema> = serde_json::from_str(&contents)
        .with_context(|| format!("parse registry {}", path.display()))?;
    ToolSchemaRegistry::from_schemas(schemas)
        .with_context(|| format!("build registry {}", path.display()))
}
