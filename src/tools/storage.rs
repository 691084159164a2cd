//! Object storage inspection tools

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{ArgKind, ArgSchema, InspectionTool, ToolArgs, ToolContext, ToolError, required_str};

/// s3_list_buckets - names of every bucket in the account
pub struct ListBucketsTool;

#[async_trait]
impl InspectionTool for ListBucketsTool {
    fn name(&self) -> &'static str {
        "s3_list_buckets"
    }

    fn description(&self) -> &'static str {
        "List all S3 buckets in the AWS account."
    }

    fn schema(&self) -> ArgSchema {
        ArgSchema::empty()
    }

    async fn run(&self, _args: &ToolArgs, ctx: &ToolContext) -> Result<Value, ToolError> {
        let buckets = ctx
            .backend()
            .list_buckets()
            .await
            .map_err(|e| ToolError::backend("listing S3 buckets", e))?;
        let names: Vec<String> = buckets.into_iter().map(|b| b.name).collect();
        Ok(json!(names))
    }
}

/// s3_bucket_contents - object keys in one bucket
pub struct BucketContentsTool;

#[async_trait]
impl InspectionTool for BucketContentsTool {
    fn name(&self) -> &'static str {
        "s3_bucket_contents"
    }

    fn description(&self) -> &'static str {
        "List contents of a specified S3 bucket."
    }

    fn schema(&self) -> ArgSchema {
        ArgSchema::empty().required("bucket_name", ArgKind::String, "The name of the S3 bucket.")
    }

    async fn run(&self, args: &ToolArgs, ctx: &ToolContext) -> Result<Value, ToolError> {
        let bucket = required_str(args, "bucket_name")?;
        let objects = ctx
            .backend()
            .list_objects(bucket)
            .await
            .map_err(|e| ToolError::backend(format!("listing contents of bucket {bucket}"), e))?;
        let keys: Vec<String> = objects.into_iter().map(|o| o.key).collect();
        Ok(json!(keys))
    }
}

/// s3_public_buckets - buckets whose ACL grants read access to everyone
///
/// A bucket whose public access block ignores public ACLs is not public even
/// if such a grant exists.
pub struct PublicBucketsTool;

#[async_trait]
impl InspectionTool for PublicBucketsTool {
    fn name(&self) -> &'static str {
        "s3_public_buckets"
    }

    fn description(&self) -> &'static str {
        "List all public S3 buckets in the AWS account."
    }

    fn schema(&self) -> ArgSchema {
        ArgSchema::empty()
    }

    async fn run(&self, _args: &ToolArgs, ctx: &ToolContext) -> Result<Value, ToolError> {
        let backend = ctx.backend();
        let buckets = backend
            .list_buckets()
            .await
            .map_err(|e| ToolError::backend("listing public S3 buckets", e))?;

        let mut public = Vec::new();
        for bucket in buckets {
            let grants = backend
                .get_bucket_acl(&bucket.name)
                .await
                .map_err(|e| ToolError::backend(format!("reading the ACL of bucket {}", bucket.name), e))?;
            if !grants.iter().any(|g| g.is_public()) {
                continue;
            }

            let block = backend
                .get_public_access_block(&bucket.name)
                .await
                .map_err(|e| {
                    ToolError::backend(format!("reading the public access block of bucket {}", bucket.name), e)
                })?;
            if block.is_some_and(|b| b.ignore_public_acls) {
                continue;
            }

            public.push(bucket.name);
        }

        Ok(json!(public))
    }
}
