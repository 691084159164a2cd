//! Cloud inspection backend
//!
//! `CloudBackend` is the seam between the inspection tools and the account
//! being inspected. Two implementations exist:
//! - `SimulatedBackend` - deterministic in-memory fixtures
//! - `AwsCliBackend` - the live account, through the `aws` command line
//!
//! Which one the tools see is decided by the `EnvironmentManager`.

mod aws_cli;
mod fixtures;
mod simulated;

pub use aws_cli::{AwsCliBackend, AwsCliConfig};
pub use fixtures::{
    ACCOUNT_ID, FixtureBucket, FixtureGroup, FixtureInstance, FixtureObject, FixtureSet, FixtureUser, InlinePolicy,
    ManagedPolicy, Network,
};
pub use simulated::SimulatedBackend;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Grantee URI of the "everyone" group in storage ACLs
pub const ALL_USERS_URI: &str = "http://acs.amazonaws.com/groups/global/AllUsers";

/// Read-only inspection operations over one cloud account
#[async_trait]
pub trait CloudBackend: Send + Sync {
    /// Short label for logs
    fn name(&self) -> &'static str;

    async fn list_buckets(&self) -> BackendResult<Vec<BucketSummary>>;

    async fn list_objects(&self, bucket: &str) -> BackendResult<Vec<ObjectSummary>>;

    async fn get_bucket_acl(&self, bucket: &str) -> BackendResult<Vec<AclGrant>>;

    /// `None` when the bucket has no public access block configured
    async fn get_public_access_block(&self, bucket: &str) -> BackendResult<Option<PublicAccessBlock>>;

    async fn describe_instances(&self) -> BackendResult<Vec<InstanceDescription>>;

    async fn list_users(&self) -> BackendResult<Vec<UserSummary>>;

    async fn list_attached_user_policies(&self, user: &str) -> BackendResult<Vec<AttachedPolicy>>;
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSummary {
    pub name: String,
    pub creation_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclGrant {
    pub grantee_type: String,
    pub grantee_uri: Option<String>,
    pub grantee_id: Option<String>,
    pub permission: String,
}

impl AclGrant {
    /// Whether the grant opens the bucket to anonymous users
    pub fn is_public(&self) -> bool {
        self.grantee_uri.as_deref().is_some_and(|uri| uri.contains("AllUsers"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PublicAccessBlock {
    pub block_public_acls: bool,
    pub ignore_public_acls: bool,
    pub block_public_policy: bool,
    pub restrict_public_buckets: bool,
}

impl PublicAccessBlock {
    pub fn all_enabled() -> Self {
        Self {
            block_public_acls: true,
            ignore_public_acls: true,
            block_public_policy: true,
            restrict_public_buckets: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDescription {
    pub instance_id: String,
    pub instance_type: String,
    pub state: String,
    pub private_ip: Option<String>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub user_name: String,
    pub user_id: String,
    pub arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedPolicy {
    pub policy_name: String,
    pub policy_arn: String,
}

/// Broad classes of backend failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    NotFound,
    AccessDenied,
    Transient,
    /// The environment scope backing this handle was closed
    Inactive,
    Other,
}

/// Operation-level failure reported by a backend, carrying the service code
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub code: String,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::NotFound, code, message)
    }

    pub fn transient(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Transient, code, message)
    }

    pub fn inactive() -> Self {
        Self::new(
            BackendErrorKind::Inactive,
            "EnvironmentInactive",
            "the environment behind this handle has been deactivated",
        )
    }

    /// Build an error from a service error code, classifying it by name
    pub fn from_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        let kind = classify_code(&code);
        Self::new(kind, code, message)
    }
}

fn classify_code(code: &str) -> BackendErrorKind {
    match code {
        c if c.starts_with("NoSuch") || c.contains("NotFound") => BackendErrorKind::NotFound,
        c if c.contains("AccessDenied") || c.contains("Unauthorized") || c == "Forbidden" => {
            BackendErrorKind::AccessDenied
        }
        "Throttling" | "ThrottlingException" | "RequestLimitExceeded" | "RequestTimeout" | "ServiceUnavailable"
        | "InternalError" | "SlowDown" => BackendErrorKind::Transient,
        _ => BackendErrorKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_code_classification() {
        assert_eq!(BackendError::from_code("NoSuchBucket", "x").kind, BackendErrorKind::NotFound);
        assert_eq!(BackendError::from_code("NoSuchEntity", "x").kind, BackendErrorKind::NotFound);
        assert_eq!(
            BackendError::from_code("InvalidInstanceID.NotFound", "x").kind,
            BackendErrorKind::NotFound
        );
        assert_eq!(BackendError::from_code("AccessDenied", "x").kind, BackendErrorKind::AccessDenied);
        assert_eq!(
            BackendError::from_code("UnauthorizedOperation", "x").kind,
            BackendErrorKind::AccessDenied
        );
        assert_eq!(BackendError::from_code("Throttling", "x").kind, BackendErrorKind::Transient);
        assert_eq!(BackendError::from_code("ValidationError", "x").kind, BackendErrorKind::Other);
    }

    #[test]
    fn test_display_includes_code_and_message() {
        let err = BackendError::not_found("NoSuchBucket", "The specified bucket does not exist");
        assert_eq!(err.to_string(), "NoSuchBucket: The specified bucket does not exist");
    }

    #[test]
    fn test_inactive_error() {
        let err = BackendError::inactive();
        assert_eq!(err.kind, BackendErrorKind::Inactive);
        assert_eq!(err.code, "EnvironmentInactive");
    }

    #[test]
    fn test_acl_grant_is_public() {
        let public = AclGrant {
            grantee_type: "Group".to_string(),
            grantee_uri: Some(ALL_USERS_URI.to_string()),
            grantee_id: None,
            permission: "READ".to_string(),
        };
        let owner = AclGrant {
            grantee_type: "CanonicalUser".to_string(),
            grantee_uri: None,
            grantee_id: Some("owner".to_string()),
            permission: "FULL_CONTROL".to_string(),
        };
        assert!(public.is_public());
        assert!(!owner.is_public());
    }

    #[test]
    fn test_public_access_block_pascal_case() {
        let block: PublicAccessBlock = serde_json::from_str(
            r#"{"BlockPublicAcls": true, "IgnorePublicAcls": true, "BlockPublicPolicy": false, "RestrictPublicBuckets": false}"#,
        )
        .unwrap();
        assert!(block.ignore_public_acls);
        assert!(!block.block_public_policy);
    }
}
