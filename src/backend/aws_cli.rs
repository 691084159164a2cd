//! Live backend driven through the `aws` command line
//!
//! Each inspection call runs one `aws <service> <operation>` invocation with
//! `--output json` and an explicit `--region`. Credentials are resolved by the
//! CLI itself (environment, shared config, SSO, instance profile).

use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::process::Command;

use super::{
    AclGrant, AttachedPolicy, BackendError, BackendResult, BucketSummary, CloudBackend, InstanceDescription,
    ObjectSummary, PublicAccessBlock, UserSummary,
};

/// Settings for the live backend
#[derive(Debug, Clone)]
pub struct AwsCliConfig {
    pub cli_path: String,
    pub region: String,
    pub profile: Option<String>,
    pub timeout: Duration,
}

impl Default for AwsCliConfig {
    fn default() -> Self {
        Self {
            cli_path: "aws".to_string(),
            region: "us-east-1".to_string(),
            profile: None,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AwsCliBackend {
    config: AwsCliConfig,
}

impl AwsCliBackend {
    pub fn new(config: AwsCliConfig) -> Self {
        Self { config }
    }

    /// Full argument list for one CLI invocation
    fn command_args(&self, operation: &[&str]) -> Vec<String> {
        let mut args: Vec<String> = operation.iter().map(|s| s.to_string()).collect();
        args.extend(["--region".to_string(), self.config.region.clone()]);
        args.extend(["--output".to_string(), "json".to_string()]);
        if let Some(profile) = &self.config.profile {
            args.extend(["--profile".to_string(), profile.clone()]);
        }
        args
    }

    /// Run one CLI operation and deserialize its JSON output
    async fn call<T: DeserializeOwned + Default>(&self, operation: &[&str]) -> BackendResult<T> {
        let args = self.command_args(operation);
        debug!("Running {} {}", self.config.cli_path, args.join(" "));

        let child = Command::new(&self.config.cli_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.config.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(BackendError::transient(
                    "CommandFailed",
                    format!("failed to run {}: {}", self.config.cli_path, e),
                ));
            }
            Err(_) => {
                return Err(BackendError::transient(
                    "RequestTimeout",
                    format!("{} timed out after {}ms", operation.join(" "), self.config.timeout.as_millis()),
                ));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(parse_cli_error(&stderr));
        }

        parse_cli_output(&output.stdout)
    }
}

/// Deserialize CLI stdout; an empty body means "no fields"
fn parse_cli_output<T: DeserializeOwned + Default>(stdout: &[u8]) -> BackendResult<T> {
    if stdout.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(stdout)
        .map_err(|e| BackendError::from_code("InvalidResponse", format!("unexpected CLI output: {e}")))
}

/// Turn CLI stderr into a `BackendError`
///
/// The CLI reports service errors as
/// `An error occurred (Code) when calling the Operation operation: message`.
fn parse_cli_error(stderr: &str) -> BackendError {
    let text = stderr.trim();
    if let Some(start) = text.find("An error occurred (") {
        let rest = &text[start + "An error occurred (".len()..];
        if let Some(end) = rest.find(')') {
            let code = &rest[..end];
            let message = rest[end..]
                .split_once(": ")
                .map(|(_, msg)| msg.trim())
                .unwrap_or_default();
            return BackendError::from_code(code, message);
        }
    }

    if text.contains("Unable to locate credentials") || text.contains("could not be found") {
        return BackendError::from_code("AccessDenied", text);
    }

    BackendError::from_code("CommandFailed", text)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketsOutput {
    #[serde(default)]
    buckets: Vec<CliBucket>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CliBucket {
    name: String,
    creation_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListObjectsOutput {
    #[serde(default)]
    contents: Vec<CliObject>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CliObject {
    key: String,
    #[serde(default)]
    size: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BucketAclOutput {
    #[serde(default)]
    grants: Vec<CliGrant>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CliGrant {
    grantee: CliGrantee,
    permission: String,
}

#[derive(Debug, Deserialize)]
struct CliGrantee {
    #[serde(rename = "Type")]
    kind: String,
    #[serde(rename = "URI")]
    uri: Option<String>,
    #[serde(rename = "ID")]
    id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PublicAccessBlockOutput {
    public_access_block_configuration: Option<PublicAccessBlock>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstancesOutput {
    #[serde(default)]
    reservations: Vec<CliReservation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CliReservation {
    #[serde(default)]
    instances: Vec<CliInstance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CliInstance {
    instance_id: String,
    instance_type: String,
    state: Option<CliInstanceState>,
    private_ip_address: Option<String>,
    #[serde(default)]
    tags: Vec<CliTag>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CliInstanceState {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CliTag {
    key: String,
    value: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListUsersOutput {
    #[serde(default)]
    users: Vec<CliUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CliUser {
    user_name: String,
    user_id: String,
    arn: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AttachedPoliciesOutput {
    #[serde(default)]
    attached_policies: Vec<CliAttachedPolicy>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CliAttachedPolicy {
    policy_name: String,
    policy_arn: String,
}

impl From<CliInstance> for InstanceDescription {
    fn from(instance: CliInstance) -> Self {
        Self {
            instance_id: instance.instance_id,
            instance_type: instance.instance_type,
            state: instance.state.map(|s| s.name).unwrap_or_else(|| "unknown".to_string()),
            private_ip: instance.private_ip_address,
            tags: instance.tags.into_iter().map(|t| (t.key, t.value)).collect::<BTreeMap<_, _>>(),
        }
    }
}

#[async_trait]
impl CloudBackend for AwsCliBackend {
    fn name(&self) -> &'static str {
        "aws-cli"
    }

    async fn list_buckets(&self) -> BackendResult<Vec<BucketSummary>> {
        let output: ListBucketsOutput = self.call(&["s3api", "list-buckets"]).await?;
        Ok(output
            .buckets
            .into_iter()
            .map(|b| BucketSummary {
                name: b.name,
                creation_date: b.creation_date,
            })
            .collect())
    }

    async fn list_objects(&self, bucket: &str) -> BackendResult<Vec<ObjectSummary>> {
        let output: ListObjectsOutput = self.call(&["s3api", "list-objects-v2", "--bucket", bucket]).await?;
        Ok(output
            .contents
            .into_iter()
            .map(|o| ObjectSummary { key: o.key, size: o.size })
            .collect())
    }

    async fn get_bucket_acl(&self, bucket: &str) -> BackendResult<Vec<AclGrant>> {
        let output: BucketAclOutput = self.call(&["s3api", "get-bucket-acl", "--bucket", bucket]).await?;
        Ok(output
            .grants
            .into_iter()
            .map(|g| AclGrant {
                grantee_type: g.grantee.kind,
                grantee_uri: g.grantee.uri,
                grantee_id: g.grantee.id,
                permission: g.permission,
            })
            .collect())
    }

    async fn get_public_access_block(&self, bucket: &str) -> BackendResult<Option<PublicAccessBlock>> {
        let result: BackendResult<PublicAccessBlockOutput> =
            self.call(&["s3api", "get-public-access-block", "--bucket", bucket]).await;
        match result {
            Ok(output) => Ok(output.public_access_block_configuration),
            Err(e) if e.code == "NoSuchPublicAccessBlockConfiguration" => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn describe_instances(&self) -> BackendResult<Vec<InstanceDescription>> {
        let output: DescribeInstancesOutput = self.call(&["ec2", "describe-instances"]).await?;
        Ok(output
            .reservations
            .into_iter()
            .flat_map(|r| r.instances)
            .map(InstanceDescription::from)
            .collect())
    }

    async fn list_users(&self) -> BackendResult<Vec<UserSummary>> {
        let output: ListUsersOutput = self.call(&["iam", "list-users"]).await?;
        Ok(output
            .users
            .into_iter()
            .map(|u| UserSummary {
                user_name: u.user_name,
                user_id: u.user_id,
                arn: u.arn,
            })
            .collect())
    }

    async fn list_attached_user_policies(&self, user: &str) -> BackendResult<Vec<AttachedPolicy>> {
        let output: AttachedPoliciesOutput = self
            .call(&["iam", "list-attached-user-policies", "--user-name", user])
            .await?;
        Ok(output
            .attached_policies
            .into_iter()
            .map(|p| AttachedPolicy {
                policy_name: p.policy_name,
                policy_arn: p.policy_arn,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendErrorKind;

    #[test]
    fn test_command_args_with_profile() {
        let backend = AwsCliBackend::new(AwsCliConfig {
            region: "eu-west-1".to_string(),
            profile: Some("audit".to_string()),
            ..Default::default()
        });
        let args = backend.command_args(&["s3api", "list-buckets"]);
        assert_eq!(
            args,
            vec!["s3api", "list-buckets", "--region", "eu-west-1", "--output", "json", "--profile", "audit"]
        );
    }

    #[test]
    fn test_parse_cli_error_service_code() {
        let stderr = "\nAn error occurred (NoSuchBucket) when calling the ListObjectsV2 operation: The specified bucket does not exist\n";
        let err = parse_cli_error(stderr);
        assert_eq!(err.code, "NoSuchBucket");
        assert_eq!(err.kind, BackendErrorKind::NotFound);
        assert_eq!(err.message, "The specified bucket does not exist");
    }

    #[test]
    fn test_parse_cli_error_access_denied() {
        let stderr = "An error occurred (AccessDenied) when calling the ListUsers operation: User is not authorized";
        let err = parse_cli_error(stderr);
        assert_eq!(err.kind, BackendErrorKind::AccessDenied);
    }

    #[test]
    fn test_parse_cli_error_missing_credentials() {
        let err = parse_cli_error("Unable to locate credentials. You can configure credentials by running \"aws configure\".");
        assert_eq!(err.kind, BackendErrorKind::AccessDenied);
    }

    #[test]
    fn test_parse_cli_error_unstructured() {
        let err = parse_cli_error("segmentation fault");
        assert_eq!(err.code, "CommandFailed");
        assert_eq!(err.kind, BackendErrorKind::Other);
    }

    #[test]
    fn test_parse_empty_output_defaults() {
        let output: ListObjectsOutput = parse_cli_output(b"  \n").unwrap();
        assert!(output.contents.is_empty());
    }

    #[test]
    fn test_parse_describe_instances() {
        let json = br#"{
            "Reservations": [{
                "Instances": [{
                    "InstanceId": "i-0abc",
                    "InstanceType": "m5.large",
                    "State": {"Code": 16, "Name": "running"},
                    "PrivateIpAddress": "10.0.1.10",
                    "Tags": [{"Key": "Name", "Value": "Database Server"}]
                }]
            }]
        }"#;
        let output: DescribeInstancesOutput = parse_cli_output(json).unwrap();
        let instances: Vec<InstanceDescription> = output
            .reservations
            .into_iter()
            .flat_map(|r| r.instances)
            .map(InstanceDescription::from)
            .collect();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].instance_type, "m5.large");
        assert_eq!(instances[0].state, "running");
        assert_eq!(instances[0].tags.get("Name").map(String::as_str), Some("Database Server"));
    }

    #[test]
    fn test_parse_bucket_acl() {
        let json = br#"{
            "Owner": {"ID": "abc"},
            "Grants": [
                {"Grantee": {"Type": "CanonicalUser", "ID": "abc"}, "Permission": "FULL_CONTROL"},
                {"Grantee": {"Type": "Group", "URI": "http://acs.amazonaws.com/groups/global/AllUsers"}, "Permission": "READ"}
            ]
        }"#;
        let output: BucketAclOutput = parse_cli_output(json).unwrap();
        assert_eq!(output.grants.len(), 2);
        assert_eq!(output.grants[1].grantee.uri.as_deref(), Some(crate::backend::ALL_USERS_URI));
    }

    #[test]
    fn test_parse_list_buckets_with_dates() {
        let json = br#"{"Buckets": [{"Name": "logs", "CreationDate": "2024-12-01T09:00:00+00:00"}], "Owner": {"ID": "x"}}"#;
        let output: ListBucketsOutput = parse_cli_output(json).unwrap();
        assert_eq!(output.buckets[0].name, "logs");
        assert!(output.buckets[0].creation_date.is_some());
    }

    #[test]
    fn test_parse_invalid_output() {
        let err = parse_cli_output::<ListUsersOutput>(b"not json").unwrap_err();
        assert_eq!(err.code, "InvalidResponse");
    }

    #[tokio::test]
    async fn test_missing_cli_binary_is_transient_error() {
        let backend = AwsCliBackend::new(AwsCliConfig {
            cli_path: "/nonexistent/skyquery-aws-cli".to_string(),
            ..Default::default()
        });
        let err = backend.list_users().await.unwrap_err();
        assert_eq!(err.code, "CommandFailed");
        assert_eq!(err.kind, BackendErrorKind::Transient);
    }
}
