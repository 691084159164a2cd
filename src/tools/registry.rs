//! Tool registry - owns the catalog and guarantees non-throwing invocation

use std::collections::HashMap;
use std::fmt;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    ArgSchema, BucketContentsTool, InspectionTool, InstanceSizeTool, ListBucketsTool, ListInstancesTool,
    ListUsersTool, PublicBucketsTool, SchemaViolation, ToolArgs, ToolContext, ToolError, UserPermissionsTool,
};
use crate::llm::ToolDefinition;

/// Registry-level failures
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Tool '{0}' is already registered")]
    DuplicateTool(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for tool '{tool}': {reason}")]
    InvalidArguments {
        tool: String,
        #[source]
        reason: SchemaViolation,
    },

    #[error(transparent)]
    Execution(#[from] ToolError),

    #[error("Failed to serialize tool output: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Outcome of one tool invocation, always readable as text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolInvocationResult {
    Success { payload: String },
    Failure { message: String },
}

impl ToolInvocationResult {
    pub fn success(payload: impl Into<String>) -> Self {
        ToolInvocationResult::Success {
            payload: payload.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        ToolInvocationResult::Failure {
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ToolInvocationResult::Failure { .. })
    }

    /// The observation text fed back to the reasoning engine
    pub fn text(&self) -> &str {
        match self {
            ToolInvocationResult::Success { payload } => payload,
            ToolInvocationResult::Failure { message } => message,
        }
    }
}

/// A registered tool: name, description, schema and the bound operation
pub struct ToolDescriptor {
    name: &'static str,
    description: &'static str,
    schema: ArgSchema,
    tool: Box<dyn InspectionTool>,
}

impl ToolDescriptor {
    pub fn new(tool: Box<dyn InspectionTool>) -> Self {
        Self {
            name: tool.name(),
            description: tool.description(),
            schema: tool.schema(),
            tool,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    pub fn schema(&self) -> &ArgSchema {
        &self.schema
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name, self.description, self.schema.to_json_schema())
    }
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .finish()
    }
}

/// Catalog of inspection tools in registration order
#[derive(Debug)]
pub struct ToolRegistry {
    context: ToolContext,
    tools: Vec<ToolDescriptor>,
    index: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    /// Create an empty registry bound to a backend context
    pub fn new(context: ToolContext) -> Self {
        Self {
            context,
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Create the fixed inspection catalog
    pub fn inspection_catalog(context: ToolContext) -> Result<Self, RegistryError> {
        let mut registry = Self::new(context);

        let tools: Vec<Box<dyn InspectionTool>> = vec![
            Box::new(ListBucketsTool),
            Box::new(BucketContentsTool),
            Box::new(ListInstancesTool),
            Box::new(ListUsersTool),
            Box::new(PublicBucketsTool),
            Box::new(InstanceSizeTool),
            Box::new(UserPermissionsTool),
        ];
        for tool in tools {
            registry.register(ToolDescriptor::new(tool))?;
        }

        Ok(registry)
    }

    pub fn register(&mut self, descriptor: ToolDescriptor) -> Result<(), RegistryError> {
        if self.index.contains_key(descriptor.name) {
            return Err(RegistryError::DuplicateTool(descriptor.name.to_string()));
        }
        debug!("Registering tool: {}", descriptor.name);
        self.index.insert(descriptor.name, self.tools.len());
        self.tools.push(descriptor);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&ToolDescriptor, RegistryError> {
        self.index
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))
    }

    /// Registered tools in registration order
    pub fn list(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name).collect()
    }

    /// Catalog as presented to the reasoning engine
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(ToolDescriptor::definition).collect()
    }

    /// Validate and run a tool, returning its JSON payload
    pub async fn try_invoke(&self, name: &str, args: &ToolArgs) -> Result<String, RegistryError> {
        let descriptor = self.lookup(name)?;
        descriptor
            .schema
            .validate(args)
            .map_err(|reason| RegistryError::InvalidArguments {
                tool: name.to_string(),
                reason,
            })?;

        let value = descriptor.tool.run(args, &self.context).await?;
        Ok(serde_json::to_string(&value)?)
    }

    /// Run a tool; every failure comes back as `ToolInvocationResult::Failure`
    pub async fn invoke(&self, name: &str, args: &ToolArgs) -> ToolInvocationResult {
        match self.try_invoke(name, args).await {
            Ok(payload) => ToolInvocationResult::success(payload),
            Err(e) => {
                warn!("Tool {} failed: {}", name, e);
                ToolInvocationResult::failure(e.to_string())
            }
        }
    }
}
