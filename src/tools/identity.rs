//! Identity and policy inspection tools

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{ArgKind, ArgSchema, InspectionTool, ToolArgs, ToolContext, ToolError, required_str};

/// iam_list_users - user names in the account
pub struct ListUsersTool;

#[async_trait]
impl InspectionTool for ListUsersTool {
    fn name(&self) -> &'static str {
        "iam_list_users"
    }

    fn description(&self) -> &'static str {
        "List all IAM users in the AWS account."
    }

    fn schema(&self) -> ArgSchema {
        ArgSchema::empty()
    }

    async fn run(&self, _args: &ToolArgs, ctx: &ToolContext) -> Result<Value, ToolError> {
        let users = ctx
            .backend()
            .list_users()
            .await
            .map_err(|e| ToolError::backend("listing IAM users", e))?;
        let names: Vec<String> = users.into_iter().map(|u| u.user_name).collect();
        Ok(json!(names))
    }
}

/// iam_user_permissions - managed policies attached directly to a user
pub struct UserPermissionsTool;

#[async_trait]
impl InspectionTool for UserPermissionsTool {
    fn name(&self) -> &'static str {
        "iam_user_permissions"
    }

    fn description(&self) -> &'static str {
        "Get the permissions (attached managed policies) of a specified IAM user."
    }

    fn schema(&self) -> ArgSchema {
        ArgSchema::empty().required(
            "username",
            ArgKind::String,
            "The IAM username to check permissions for",
        )
    }

    async fn run(&self, args: &ToolArgs, ctx: &ToolContext) -> Result<Value, ToolError> {
        let username = required_str(args, "username")?;
        let policies = ctx
            .backend()
            .list_attached_user_policies(username)
            .await
            .map_err(|e| ToolError::backend(format!("retrieving permissions for IAM user {username}"), e))?;
        let names: Vec<String> = policies.into_iter().map(|p| p.policy_name).collect();
        Ok(json!(names))
    }
}
