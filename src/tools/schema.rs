//! Typed argument schemas for inspection tools
//!
//! Arguments arrive from the reasoning engine as a JSON object. They are
//! checked against the tool's `ArgSchema` before the tool runs: no coercion,
//! no defaults for required fields. Keys the schema does not name are ignored.

use log::debug;
use serde_json::{Map, Value, json};
use thiserror::Error;

/// Argument map passed to a tool
pub type ToolArgs = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    String,
    Integer,
    Boolean,
}

impl ArgKind {
    fn json_type(self) -> &'static str {
        match self {
            ArgKind::String => "string",
            ArgKind::Integer => "integer",
            ArgKind::Boolean => "boolean",
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            ArgKind::String => value.is_string(),
            ArgKind::Integer => value.is_i64() || value.is_u64(),
            ArgKind::Boolean => value.is_boolean(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSpec {
    pub name: &'static str,
    pub kind: ArgKind,
    pub description: &'static str,
    pub required: bool,
}

/// Ordered list of the arguments a tool accepts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgSchema {
    args: Vec<ArgSpec>,
}

/// Why a set of arguments was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("missing required field '{0}'")]
    MissingField(String),

    #[error("field '{field}' must be of type {expected}, got {found}")]
    WrongType {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl ArgSchema {
    /// Schema for a tool that takes no arguments
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: &'static str, kind: ArgKind, description: &'static str) -> Self {
        self.args.push(ArgSpec {
            name,
            kind,
            description,
            required: true,
        });
        self
    }

    pub fn optional(mut self, name: &'static str, kind: ArgKind, description: &'static str) -> Self {
        self.args.push(ArgSpec {
            name,
            kind,
            description,
            required: false,
        });
        self
    }

    pub fn args(&self) -> &[ArgSpec] {
        &self.args
    }

    /// Check `input` against the schema
    ///
    /// A `null` value for an optional field counts as absent.
    pub fn validate(&self, input: &ToolArgs) -> Result<(), SchemaViolation> {
        for spec in &self.args {
            match input.get(spec.name) {
                None | Some(Value::Null) if spec.required => {
                    return Err(SchemaViolation::MissingField(spec.name.to_string()));
                }
                None | Some(Value::Null) => {}
                Some(value) if !spec.kind.accepts(value) => {
                    return Err(SchemaViolation::WrongType {
                        field: spec.name.to_string(),
                        expected: spec.kind.json_type(),
                        found: json_type_name(value),
                    });
                }
                Some(_) => {}
            }
        }

        for extra in input.keys().filter(|key| !self.args.iter().any(|a| a.name == key.as_str())) {
            debug!("Ignoring unrecognized argument '{}'", extra);
        }

        Ok(())
    }

    /// JSON Schema object presented to the reasoning engine
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .args
            .iter()
            .map(|a| {
                (
                    a.name.to_string(),
                    json!({ "type": a.kind.json_type(), "description": a.description }),
                )
            })
            .collect();
        let required: Vec<&str> = self.args.iter().filter(|a| a.required).map(|a| a.name).collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}
