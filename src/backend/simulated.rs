//! In-memory emulation of the inspection API
//!
//! All clones of a `SimulatedBackend` share one fixture slot. The slot is
//! filled in a single write after the whole `FixtureSet` has been built and
//! emptied on `uninstall`, so a handle sees either the full set or nothing.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use log::info;

use super::{
    AclGrant, AttachedPolicy, BackendError, BackendResult, BucketSummary, CloudBackend, FixtureSet,
    InstanceDescription, ObjectSummary, PublicAccessBlock, UserSummary,
};

#[derive(Debug, Clone, Default)]
pub struct SimulatedBackend {
    fixtures: Arc<RwLock<Option<FixtureSet>>>,
}

impl SimulatedBackend {
    /// Build the fixture set for `region` and install it
    pub fn install(region: &str) -> Self {
        let backend = Self::default();
        let fixtures = FixtureSet::populate(region);
        match backend.fixtures.write() {
            Ok(mut slot) => *slot = Some(fixtures),
            Err(poisoned) => *poisoned.into_inner() = Some(fixtures),
        }
        info!("Simulated backend installed for region {}", region);
        backend
    }

    /// Drop the fixtures; later calls on any clone fail with `EnvironmentInactive`
    pub fn uninstall(&self) {
        let previous = match self.fixtures.write() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if previous.is_some() {
            info!("Simulated backend uninstalled");
        }
    }

    pub fn is_active(&self) -> bool {
        self.fixtures.read().map(|slot| slot.is_some()).unwrap_or(false)
    }

    /// Copy of the installed fixtures, if active
    pub fn snapshot(&self) -> Option<FixtureSet> {
        self.fixtures.read().ok().and_then(|slot| slot.as_ref().cloned())
    }

    fn with_fixtures<T>(&self, f: impl FnOnce(&FixtureSet) -> BackendResult<T>) -> BackendResult<T> {
        let slot = self
            .fixtures
            .read()
            .map_err(|_| BackendError::transient("InternalError", "simulated backend lock poisoned"))?;
        match slot.as_ref() {
            Some(fixtures) => f(fixtures),
            None => Err(BackendError::inactive()),
        }
    }
}

fn no_such_bucket(bucket: &str) -> BackendError {
    BackendError::not_found(
        "NoSuchBucket",
        format!("The specified bucket does not exist (bucket: {bucket})"),
    )
}

#[async_trait]
impl CloudBackend for SimulatedBackend {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn list_buckets(&self) -> BackendResult<Vec<BucketSummary>> {
        self.with_fixtures(|set| {
            let mut buckets: Vec<BucketSummary> = set
                .buckets
                .iter()
                .map(|b| BucketSummary {
                    name: b.name.clone(),
                    creation_date: Some(b.creation_date),
                })
                .collect();
            buckets.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(buckets)
        })
    }

    async fn list_objects(&self, bucket: &str) -> BackendResult<Vec<ObjectSummary>> {
        self.with_fixtures(|set| {
            let found = set.bucket(bucket).ok_or_else(|| no_such_bucket(bucket))?;
            let mut objects: Vec<ObjectSummary> = found
                .objects
                .iter()
                .map(|o| ObjectSummary {
                    key: o.key.clone(),
                    size: o.size,
                })
                .collect();
            objects.sort_by(|a, b| a.key.cmp(&b.key));
            Ok(objects)
        })
    }

    async fn get_bucket_acl(&self, bucket: &str) -> BackendResult<Vec<AclGrant>> {
        self.with_fixtures(|set| {
            let found = set.bucket(bucket).ok_or_else(|| no_such_bucket(bucket))?;
            Ok(found.acl.clone())
        })
    }

    async fn get_public_access_block(&self, bucket: &str) -> BackendResult<Option<PublicAccessBlock>> {
        self.with_fixtures(|set| {
            let found = set.bucket(bucket).ok_or_else(|| no_such_bucket(bucket))?;
            Ok(found.public_access_block)
        })
    }

    async fn describe_instances(&self) -> BackendResult<Vec<InstanceDescription>> {
        self.with_fixtures(|set| {
            Ok(set
                .instances
                .iter()
                .map(|i| InstanceDescription {
                    instance_id: i.instance_id.clone(),
                    instance_type: i.instance_type.clone(),
                    state: "running".to_string(),
                    private_ip: Some(i.private_ip.clone()),
                    tags: i.tags.clone(),
                })
                .collect())
        })
    }

    async fn list_users(&self) -> BackendResult<Vec<UserSummary>> {
        self.with_fixtures(|set| {
            Ok(set
                .users
                .iter()
                .map(|u| UserSummary {
                    user_name: u.user_name.clone(),
                    user_id: u.user_id.clone(),
                    arn: u.arn.clone(),
                })
                .collect())
        })
    }

    async fn list_attached_user_policies(&self, user: &str) -> BackendResult<Vec<AttachedPolicy>> {
        self.with_fixtures(|set| {
            let found = set.user(user).ok_or_else(|| {
                BackendError::not_found("NoSuchEntity", format!("The user with name {user} cannot be found."))
            })?;
            Ok(found
                .attached_policies
                .iter()
                .filter_map(|arn| set.policy_by_arn(arn))
                .map(|p| AttachedPolicy {
                    policy_name: p.name.clone(),
                    policy_arn: p.arn.clone(),
                })
                .collect())
        })
    }
}
