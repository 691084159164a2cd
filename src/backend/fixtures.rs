//! Deterministic fixture set for the simulated backend
//!
//! Identifiers are derived from SHA-256 digests of fixed seeds so every
//! build of the set is identical, down to the byte.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{ALL_USERS_URI, AclGrant, PublicAccessBlock};

/// Account id used for every simulated ARN
pub const ACCOUNT_ID: &str = "123456789012";

const OWNER_ID: &str = "75aa57f09aa0c8caeab4f8c24e99d10f8e7faeebf76c078efc7c6caea54ba06a";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureObject {
    pub key: String,
    pub size: u64,
    pub content_type: String,
    /// Hex digest of the body
    pub etag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureBucket {
    pub name: String,
    pub creation_date: DateTime<Utc>,
    pub objects: Vec<FixtureObject>,
    pub acl: Vec<AclGrant>,
    pub public_access_block: Option<PublicAccessBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub vpc_id: String,
    pub vpc_cidr: String,
    pub subnet_id: String,
    pub subnet_cidr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureInstance {
    pub instance_id: String,
    pub image_id: String,
    pub instance_type: String,
    pub private_ip: String,
    pub subnet_id: String,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedPolicy {
    pub name: String,
    pub arn: String,
    pub document: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlinePolicy {
    pub name: String,
    pub document: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureUser {
    pub user_name: String,
    pub user_id: String,
    pub arn: String,
    /// ARNs of attached managed policies
    pub attached_policies: Vec<String>,
    pub inline_policies: Vec<InlinePolicy>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureGroup {
    pub name: String,
    pub arn: String,
    pub members: Vec<String>,
    pub attached_policies: Vec<String>,
}

/// The complete simulated account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureSet {
    pub region: String,
    pub buckets: Vec<FixtureBucket>,
    pub network: Network,
    pub instances: Vec<FixtureInstance>,
    pub users: Vec<FixtureUser>,
    pub policies: Vec<ManagedPolicy>,
    pub groups: Vec<FixtureGroup>,
}

impl FixtureSet {
    /// Build the fixture set: storage first, then network and instances,
    /// then the identity graph.
    pub fn populate(region: &str) -> Self {
        let buckets = storage_fixtures();
        debug!("Populated {} simulated buckets", buckets.len());

        let network = network_fixture(region);
        let instances = instance_fixtures(&network);
        debug!("Populated {} simulated instances in {}", instances.len(), network.vpc_id);

        let (users, policies, groups) = identity_fixtures();
        debug!(
            "Populated {} users, {} policies, {} groups",
            users.len(),
            policies.len(),
            groups.len()
        );

        Self {
            region: region.to_string(),
            buckets,
            network,
            instances,
            users,
            policies,
            groups,
        }
    }

    pub fn bucket(&self, name: &str) -> Option<&FixtureBucket> {
        self.buckets.iter().find(|b| b.name == name)
    }

    pub fn user(&self, name: &str) -> Option<&FixtureUser> {
        self.users.iter().find(|u| u.user_name == name)
    }

    pub fn policy_by_arn(&self, arn: &str) -> Option<&ManagedPolicy> {
        self.policies.iter().find(|p| p.arn == arn)
    }
}

/// Deterministic identifier: `prefix` followed by `len` hex chars of sha256(seed)
fn fixture_id(prefix: &str, seed: &str, len: usize) -> String {
    let digest = hex::encode(Sha256::digest(seed.as_bytes()));
    format!("{}{}", prefix, &digest[..len])
}

fn creation_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 12, 1, 9, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn object(key: &str, body: &[u8], content_type: &str) -> FixtureObject {
    FixtureObject {
        key: key.to_string(),
        size: body.len() as u64,
        content_type: content_type.to_string(),
        etag: hex::encode(&Sha256::digest(body)[..16]),
    }
}

fn owner_grant() -> AclGrant {
    AclGrant {
        grantee_type: "CanonicalUser".to_string(),
        grantee_uri: None,
        grantee_id: Some(OWNER_ID.to_string()),
        permission: "FULL_CONTROL".to_string(),
    }
}

fn public_read_acl() -> Vec<AclGrant> {
    vec![
        owner_grant(),
        AclGrant {
            grantee_type: "Group".to_string(),
            grantee_uri: Some(ALL_USERS_URI.to_string()),
            grantee_id: None,
            permission: "READ".to_string(),
        },
    ]
}

fn storage_fixtures() -> Vec<FixtureBucket> {
    let public_objects = [
        ("test-bucket-1", object("text_test_data.txt", b"This is a sample file.", "text/plain")),
        ("test-bucket-2", object("csv_test_data.csv", b"id,name\n1,John\n2,Doe", "text/csv")),
        (
            "test-bucket-3",
            object("images/logo.png", "PNG data".repeat(100).as_bytes(), "image/png"),
        ),
        (
            "test-bucket-4",
            object("json_test_data.json", br#"{"key": "value"}"#, "application/json"),
        ),
    ];

    let mut buckets: Vec<FixtureBucket> = public_objects
        .into_iter()
        .map(|(name, obj)| FixtureBucket {
            name: name.to_string(),
            creation_date: creation_date(),
            objects: vec![obj],
            acl: public_read_acl(),
            public_access_block: None,
        })
        .collect();

    buckets.push(FixtureBucket {
        name: "private-backups".to_string(),
        creation_date: creation_date(),
        objects: vec![object(
            "backup-2024-12.tar.gz",
            "backup data".repeat(10_000).as_bytes(),
            "application/gzip",
        )],
        acl: vec![owner_grant()],
        public_access_block: Some(PublicAccessBlock::all_enabled()),
    });

    buckets
}

fn network_fixture(region: &str) -> Network {
    Network {
        vpc_id: fixture_id("vpc-", &format!("{region}/vpc/10.0.0.0/16"), 17),
        vpc_cidr: "10.0.0.0/16".to_string(),
        subnet_id: fixture_id("subnet-", &format!("{region}/subnet/10.0.1.0/24"), 17),
        subnet_cidr: "10.0.1.0/24".to_string(),
    }
}

fn instance_fixtures(network: &Network) -> Vec<FixtureInstance> {
    let specs = [
        ("test-12345678", "t2.micro", "10.0.1.5", "Web Server 1", "Production"),
        ("test-12345678", "t2.micro", "10.0.1.6", "Web Server 2", "UAT"),
        ("test-87654321", "m5.large", "10.0.1.10", "Database Server", "Production"),
    ];

    specs
        .into_iter()
        .map(|(image, size, ip, name, environment)| {
            let tags = BTreeMap::from([
                ("Name".to_string(), name.to_string()),
                ("Environment".to_string(), environment.to_string()),
            ]);
            FixtureInstance {
                instance_id: fixture_id("i-", &format!("{}/{}", network.subnet_id, ip), 17),
                image_id: image.to_string(),
                instance_type: size.to_string(),
                private_ip: ip.to_string(),
                subnet_id: network.subnet_id.clone(),
                tags,
            }
        })
        .collect()
}

fn policy_arn(name: &str) -> String {
    format!("arn:aws:iam::{ACCOUNT_ID}:policy/{name}")
}

fn managed_policy(name: &str, document: &str) -> ManagedPolicy {
    ManagedPolicy {
        name: name.to_string(),
        arn: policy_arn(name),
        document: document.to_string(),
    }
}

fn identity_fixtures() -> (Vec<FixtureUser>, Vec<ManagedPolicy>, Vec<FixtureGroup>) {
    let admin = managed_policy(
        "AdministratorAccessPolicy",
        r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Action":"*","Resource":"*"}]}"#,
    );
    let read_only = managed_policy(
        "ReadOnlyAccessPolicy",
        r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Action":["s3:Get*","s3:List*","ec2:Describe*"],"Resource":"*"}]}"#,
    );
    let monitoring = managed_policy(
        "CloudWatchReadOnly",
        r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Action":["cloudwatch:Describe*","cloudwatch:Get*","cloudwatch:List*"],"Resource":"*"}]}"#,
    );

    let mut users: Vec<FixtureUser> = ["grinch", "santa", "max"]
        .into_iter()
        .map(|name| FixtureUser {
            user_name: name.to_string(),
            user_id: fixture_id("AIDA", &format!("user/{name}"), 17).to_uppercase(),
            arn: format!("arn:aws:iam::{ACCOUNT_ID}:user/{name}"),
            attached_policies: Vec::new(),
            inline_policies: Vec::new(),
        })
        .collect();

    for user in &mut users {
        match user.user_name.as_str() {
            "santa" => {
                user.attached_policies.push(admin.arn.clone());
                user.inline_policies.push(InlinePolicy {
                    name: "EC2Describe".to_string(),
                    document: r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Action":"ec2:Describe*","Resource":"*"}]}"#
                        .to_string(),
                });
            }
            "grinch" => user.attached_policies.push(read_only.arn.clone()),
            _ => {}
        }
    }

    let developers = FixtureGroup {
        name: "Developers".to_string(),
        arn: format!("arn:aws:iam::{ACCOUNT_ID}:group/Developers"),
        members: vec!["santa".to_string()],
        attached_policies: vec![monitoring.arn.clone()],
    };

    (users, vec![admin, read_only, monitoring], vec![developers])
}
