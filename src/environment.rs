//! Environment lifecycle - which backend the tools talk to, and for how long
//!
//! `EnvironmentManager::activate` returns an `ActiveEnvironment` guard. While
//! the guard lives, every backend handle it gives out routes to the selected
//! backend. Dropping the guard (or calling `deactivate`) closes the scope:
//! simulated fixtures are uninstalled and any handle still held afterwards
//! fails with `EnvironmentInactive`.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};

use crate::backend::{
    AclGrant, AttachedPolicy, AwsCliBackend, AwsCliConfig, BackendError, BackendResult, BucketSummary, CloudBackend,
    FixtureSet, InstanceDescription, ObjectSummary, PublicAccessBlock, SimulatedBackend, UserSummary,
};
use crate::error::{Result, SkyqueryError};

/// Appended to the system prompt when running against fixtures
pub const SIMULATED_PROMPT_NOTE: &str = "Note: Connected to a simulated AWS environment.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentMode {
    Live,
    Simulated,
}

impl EnvironmentMode {
    pub fn from_mock_flag(mock: bool) -> Self {
        if mock { EnvironmentMode::Simulated } else { EnvironmentMode::Live }
    }

    /// Name shown in the session banner
    pub fn label(&self) -> &'static str {
        match self {
            EnvironmentMode::Live => "AWS",
            EnvironmentMode::Simulated => "Simulated AWS",
        }
    }

    pub fn prompt_note(&self) -> Option<&'static str> {
        match self {
            EnvironmentMode::Live => None,
            EnvironmentMode::Simulated => Some(SIMULATED_PROMPT_NOTE),
        }
    }
}

impl fmt::Display for EnvironmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Chooses and activates a backend
#[derive(Debug, Clone)]
pub struct EnvironmentManager {
    mode: EnvironmentMode,
    aws: AwsCliConfig,
}

impl EnvironmentManager {
    pub fn new(mode: EnvironmentMode, aws: AwsCliConfig) -> Self {
        Self { mode, aws }
    }

    pub fn mode(&self) -> EnvironmentMode {
        self.mode
    }

    pub fn region(&self) -> &str {
        &self.aws.region
    }

    /// Open an environment scope
    pub fn activate(&self) -> Result<ActiveEnvironment> {
        validate_region(&self.aws.region)?;

        let (inner, simulated): (Arc<dyn CloudBackend>, Option<SimulatedBackend>) = match self.mode {
            EnvironmentMode::Simulated => {
                let backend = SimulatedBackend::install(&self.aws.region);
                (Arc::new(backend.clone()), Some(backend))
            }
            EnvironmentMode::Live => {
                if self.aws.cli_path.trim().is_empty() {
                    return Err(SkyqueryError::Environment("aws cli path is empty".to_string()));
                }
                (Arc::new(AwsCliBackend::new(self.aws.clone())), None)
            }
        };

        info!("Activated {} environment in {}", self.mode.label(), self.aws.region);
        Ok(ActiveEnvironment {
            mode: self.mode,
            region: self.aws.region.clone(),
            active: Arc::new(AtomicBool::new(true)),
            inner,
            simulated,
        })
    }
}

fn validate_region(region: &str) -> Result<()> {
    let well_formed = !region.is_empty()
        && region.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && region.contains('-');
    if well_formed {
        Ok(())
    } else {
        Err(SkyqueryError::Environment(format!("invalid region '{region}'")))
    }
}

/// Scope guard for an activated environment
pub struct ActiveEnvironment {
    mode: EnvironmentMode,
    region: String,
    active: Arc<AtomicBool>,
    inner: Arc<dyn CloudBackend>,
    simulated: Option<SimulatedBackend>,
}

impl ActiveEnvironment {
    pub fn mode(&self) -> EnvironmentMode {
        self.mode
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Backend handle bound to this scope
    pub fn backend(&self) -> Arc<dyn CloudBackend> {
        Arc::new(ScopedBackend {
            active: self.active.clone(),
            inner: self.inner.clone(),
        })
    }

    /// Installed fixtures in simulated mode
    pub fn fixtures(&self) -> Option<FixtureSet> {
        self.simulated.as_ref().and_then(SimulatedBackend::snapshot)
    }

    /// Close the scope now instead of at drop
    pub fn deactivate(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(simulated) = self.simulated.take() {
            simulated.uninstall();
        }
        info!("Deactivated {} environment", self.mode.label());
    }
}

impl Drop for ActiveEnvironment {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for ActiveEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveEnvironment")
            .field("mode", &self.mode)
            .field("region", &self.region)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Forwards to the selected backend while its scope is open
struct ScopedBackend {
    active: Arc<AtomicBool>,
    inner: Arc<dyn CloudBackend>,
}

impl ScopedBackend {
    fn check(&self) -> BackendResult<&dyn CloudBackend> {
        if self.active.load(Ordering::SeqCst) {
            Ok(self.inner.as_ref())
        } else {
            Err(BackendError::inactive())
        }
    }
}

#[async_trait]
impl CloudBackend for ScopedBackend {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn list_buckets(&self) -> BackendResult<Vec<BucketSummary>> {
        self.check()?.list_buckets().await
    }

    async fn list_objects(&self, bucket: &str) -> BackendResult<Vec<ObjectSummary>> {
        self.check()?.list_objects(bucket).await
    }

    async fn get_bucket_acl(&self, bucket: &str) -> BackendResult<Vec<AclGrant>> {
        self.check()?.get_bucket_acl(bucket).await
    }

    async fn get_public_access_block(&self, bucket: &str) -> BackendResult<Option<PublicAccessBlock>> {
        self.check()?.get_public_access_block(bucket).await
    }

    async fn describe_instances(&self) -> BackendResult<Vec<InstanceDescription>> {
        self.check()?.describe_instances().await
    }

    async fn list_users(&self) -> BackendResult<Vec<UserSummary>> {
        self.check()?.list_users().await
    }

    async fn list_attached_user_policies(&self, user: &str) -> BackendResult<Vec<AttachedPolicy>> {
        self.check()?.list_attached_user_policies(user).await
    }
}
