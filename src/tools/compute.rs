//! Compute instance inspection tools

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use super::{ArgKind, ArgSchema, InspectionTool, ToolArgs, ToolContext, ToolError, optional_str};
use crate::backend::BackendError;

/// ec2_list_instances - instance ids with their state and tags
pub struct ListInstancesTool;

#[async_trait]
impl InspectionTool for ListInstancesTool {
    fn name(&self) -> &'static str {
        "ec2_list_instances"
    }

    fn description(&self) -> &'static str {
        "List all EC2 instances in the AWS account with their state and tags."
    }

    fn schema(&self) -> ArgSchema {
        ArgSchema::empty()
    }

    async fn run(&self, _args: &ToolArgs, ctx: &ToolContext) -> Result<Value, ToolError> {
        let instances = ctx
            .backend()
            .describe_instances()
            .await
            .map_err(|e| ToolError::backend("listing EC2 instances", e))?;

        let listed: Vec<Value> = instances
            .into_iter()
            .map(|i| {
                json!({
                    "instance_id": i.instance_id,
                    "state": i.state,
                    "tags": i.tags,
                })
            })
            .collect();
        Ok(Value::Array(listed))
    }
}

/// ec2_instance_size - instance id to instance type
pub struct InstanceSizeTool;

#[async_trait]
impl InspectionTool for InstanceSizeTool {
    fn name(&self) -> &'static str {
        "ec2_instance_size"
    }

    fn description(&self) -> &'static str {
        "Get the size (instance type) of EC2 instances, keyed by instance id. Pass instance_id to look up a single instance."
    }

    fn schema(&self) -> ArgSchema {
        ArgSchema::empty().optional(
            "instance_id",
            ArgKind::String,
            "Only report this instance (default: all instances).",
        )
    }

    async fn run(&self, args: &ToolArgs, ctx: &ToolContext) -> Result<Value, ToolError> {
        let wanted = optional_str(args, "instance_id");
        let action = match wanted {
            Some(id) => format!("retrieving the size of EC2 instance {id}"),
            None => "retrieving EC2 instance sizes".to_string(),
        };

        let instances = ctx
            .backend()
            .describe_instances()
            .await
            .map_err(|e| ToolError::backend(action.clone(), e))?;

        let sizes: Map<String, Value> = instances
            .into_iter()
            .filter(|i| wanted.is_none_or(|id| i.instance_id == id))
            .map(|i| (i.instance_id, Value::String(i.instance_type)))
            .collect();

        if let Some(id) = wanted
            && sizes.is_empty()
        {
            return Err(ToolError::backend(
                action,
                BackendError::not_found(
                    "InvalidInstanceID.NotFound",
                    format!("The instance ID '{id}' does not exist"),
                ),
            ));
        }

        Ok(Value::Object(sizes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SimulatedBackend;
    use std::sync::Arc;

    fn simulated() -> ToolContext {
        ToolContext::new(Arc::new(SimulatedBackend::install("us-east-1")))
    }

    #[tokio::test]
    async fn test_list_instances_includes_tags() {
        let value = ListInstancesTool.run(&ToolArgs::new(), &simulated()).await.unwrap();
        let listed = value.as_array().unwrap();
        assert_eq!(listed.len(), 3);

        let names: Vec<&str> = listed.iter().filter_map(|i| i["tags"]["Name"].as_str()).collect();
        assert_eq!(names, vec!["Web Server 1", "Web Server 2", "Database Server"]);
        assert!(listed.iter().all(|i| i["state"] == "running"));
    }

    #[tokio::test]
    async fn test_instance_sizes_all() {
        let value = InstanceSizeTool.run(&ToolArgs::new(), &simulated()).await.unwrap();
        let sizes = value.as_object().unwrap();
        assert_eq!(sizes.len(), 3);

        let mut types: Vec<&str> = sizes.values().filter_map(Value::as_str).collect();
        types.sort();
        assert_eq!(types, vec!["m5.large", "t2.micro", "t2.micro"]);
    }

    #[tokio::test]
    async fn test_instance_size_single() {
        let ctx = simulated();
        let listed = ListInstancesTool.run(&ToolArgs::new(), &ctx).await.unwrap();
        let db_id = listed
            .as_array()
            .unwrap()
            .iter()
            .find(|i| i["tags"]["Name"] == "Database Server")
            .and_then(|i| i["instance_id"].as_str())
            .unwrap()
            .to_string();

        let args = json!({ "instance_id": &db_id }).as_object().cloned().unwrap();
        let value = InstanceSizeTool.run(&args, &ctx).await.unwrap();

        let mut expected = Map::new();
        expected.insert(db_id, json!("m5.large"));
        assert_eq!(value, Value::Object(expected));
    }

    #[tokio::test]
    async fn test_instance_size_unknown_id() {
        let args = json!({ "instance_id": "i-0000000000000dead" }).as_object().cloned().unwrap();
        let err = InstanceSizeTool.run(&args, &simulated()).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("i-0000000000000dead"));
        assert!(message.contains("InvalidInstanceID.NotFound"));
    }
}
