//! Inspection tools and the registry that dispatches them
//!
//! Each tool is a read-only query over the active `CloudBackend`. Tools are
//! registered into a `ToolRegistry`, which validates arguments and turns every
//! failure into a text observation the reasoning engine can read.

mod compute;
mod context;
mod identity;
mod registry;
mod schema;
mod storage;

pub use compute::{InstanceSizeTool, ListInstancesTool};
pub use context::ToolContext;
pub use identity::{ListUsersTool, UserPermissionsTool};
pub use registry::{RegistryError, ToolDescriptor, ToolInvocationResult, ToolRegistry};
pub use schema::{ArgKind, ArgSchema, ArgSpec, SchemaViolation, ToolArgs};
pub use storage::{BucketContentsTool, ListBucketsTool, PublicBucketsTool};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::backend::BackendError;

/// A read-only inspection operation the reasoning engine can call
#[async_trait]
pub trait InspectionTool: Send + Sync {
    /// Tool name (matches the engine's tool_use name)
    fn name(&self) -> &'static str;

    /// Human-readable description
    fn description(&self) -> &'static str;

    /// Accepted arguments
    fn schema(&self) -> ArgSchema;

    /// Run the tool against already-validated arguments
    async fn run(&self, args: &ToolArgs, ctx: &ToolContext) -> Result<Value, ToolError>;
}

/// Failure inside a tool body
#[derive(Debug, Error)]
pub enum ToolError {
    /// The backend rejected the call; `action` names what was attempted
    #[error("Error {action}: {source}")]
    Backend {
        action: String,
        #[source]
        source: BackendError,
    },

    /// Arguments passed validation but could not be used
    #[error("Invalid argument: {0}")]
    Argument(String),
}

impl ToolError {
    pub fn backend(action: impl Into<String>, source: BackendError) -> Self {
        ToolError::Backend {
            action: action.into(),
            source,
        }
    }
}

/// Fetch a string argument the schema already marked as required
pub(crate) fn required_str<'a>(args: &'a ToolArgs, name: &str) -> Result<&'a str, ToolError> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::Argument(format!("'{name}' must be a string")))
}

/// Fetch an optional string argument
pub(crate) fn optional_str<'a>(args: &'a ToolArgs, name: &str) -> Option<&'a str> {
    args.get(name).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_error_names_action() {
        let err = ToolError::backend(
            "listing contents of bucket nope",
            BackendError::not_found("NoSuchBucket", "The specified bucket does not exist"),
        );
        assert_eq!(
            err.to_string(),
            "Error listing contents of bucket nope: NoSuchBucket: The specified bucket does not exist"
        );
    }

    #[test]
    fn test_required_str() {
        let args = json!({"bucket_name": "logs", "count": 3}).as_object().cloned().unwrap();
        assert_eq!(required_str(&args, "bucket_name").unwrap(), "logs");
        assert!(matches!(required_str(&args, "count"), Err(ToolError::Argument(_))));
        assert!(optional_str(&args, "missing").is_none());
    }
}
