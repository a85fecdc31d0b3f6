//! Lookups of pre-existing cloud resources.
//!
//! Builders never call the provider. Anything that already exists (networks,
//! machine images, availability zones) is resolved through a
//! [`ResourceLookup`], normally backed by a context file kept next to the
//! environment descriptor.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{IacError, IacResult};
use crate::stack::StackEnvironment;

/// Default lookup context file name.
pub const DEFAULT_CONTEXT_FILE: &str = "strata.context.yaml";

/// Zones used for a region the context knows nothing about.
const FALLBACK_ZONE_SUFFIXES: [&str; 3] = ["a", "b", "c"];

/// Subnet tiers a VPC is carved into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetTier {
    /// Routed to an internet gateway, public IPs assigned on launch.
    Public,
    /// Outbound internet through the shared NAT gateway.
    PrivateWithEgress,
    /// No route out of the VPC.
    PrivateIsolated,
}

impl SubnetTier {
    /// Tiers in allocation order.
    pub fn all() -> [SubnetTier; 3] {
        [
            SubnetTier::Public,
            SubnetTier::PrivateWithEgress,
            SubnetTier::PrivateIsolated,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubnetTier::Public => "public",
            SubnetTier::PrivateWithEgress => "private_with_egress",
            SubnetTier::PrivateIsolated => "private_isolated",
        }
    }

    /// Subnet configuration name used when a VPC is created.
    pub fn subnet_name(&self) -> &'static str {
        match self {
            SubnetTier::Public => "snet-public-subnet-01",
            SubnetTier::PrivateWithEgress => "snet-private-internet-subnet-01",
            SubnetTier::PrivateIsolated => "snet-private-subnet-01",
        }
    }

    /// Tier selected for an instance.
    pub fn for_instance(is_public: bool) -> Self {
        if is_public {
            SubnetTier::Public
        } else {
            SubnetTier::PrivateWithEgress
        }
    }
}

impl fmt::Display for SubnetTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An existing subnet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetRef {
    pub subnet_id: String,
    pub availability_zone: String,
    pub tier: SubnetTier,
}

/// An existing VPC and its subnets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcRef {
    pub vpc_id: String,
    pub region: String,
    #[serde(default)]
    pub subnets: Vec<SubnetRef>,
}

impl VpcRef {
    /// Subnets of one tier, in context order.
    pub fn subnets_in(&self, tier: SubnetTier) -> impl Iterator<Item = &SubnetRef> {
        self.subnets.iter().filter(move |s| s.tier == tier)
    }

    /// The subnet an instance of the given tier is placed in.
    pub fn select_subnet(&self, tier: SubnetTier) -> IacResult<&SubnetRef> {
        self.subnets_in(tier)
            .next()
            .ok_or_else(|| IacError::not_found(format!("{} subnet in vpc", tier), self.vpc_id.clone()))
    }
}

/// An existing machine image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub name: String,
    pub region: String,
    pub image_id: String,
}

/// Resolves references to resources this tool does not create.
pub trait ResourceLookup {
    /// Availability zones usable in the environment, in provider order.
    fn availability_zones(&self, env: &StackEnvironment) -> Vec<String>;

    /// Resolve a VPC by id.
    fn vpc(&self, env: &StackEnvironment, vpc_id: &str) -> IacResult<VpcRef>;

    /// Resolve a machine image by name.
    fn machine_image(&self, env: &StackEnvironment, name: &str) -> IacResult<ImageRef>;
}

/// Lookup answers recorded in a YAML context file.
///
/// ```yaml
/// availability_zones:
///   eu-west-1: [eu-west-1a, eu-west-1b, eu-west-1c]
/// vpcs:
///   - vpc_id: vpc-0abc
///     region: eu-west-1
///     subnets:
///       - subnet_id: subnet-1
///         availability_zone: eu-west-1a
///         tier: public
/// images:
///   - name: ubuntu-22.04
///     region: eu-west-1
///     image_id: ami-0123456789
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupContext {
    #[serde(default)]
    pub availability_zones: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub vpcs: Vec<VpcRef>,
    #[serde(default)]
    pub images: Vec<ImageRef>,
}

impl LookupContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a context file.
    pub fn from_file(path: &Path) -> IacResult<Self> {
        debug!("Reading lookup context from {:?}", path);
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let context: LookupContext = serde_yaml::from_str(&content)?;
        Ok(context)
    }

    /// Load a context file, or start empty when it does not exist.
    pub fn load_or_default(path: &Path) -> IacResult<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            warn!("Lookup context {:?} not found; existing resources cannot be resolved", path);
            Ok(Self::default())
        }
    }

    /// Save the context to a YAML file.
    pub fn to_file(&self, path: &Path) -> IacResult<()> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn with_availability_zones<I, S>(mut self, region: impl Into<String>, zones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.availability_zones
            .insert(region.into(), zones.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_vpc(mut self, vpc: VpcRef) -> Self {
        self.vpcs.push(vpc);
        self
    }

    pub fn with_image(mut self, image: ImageRef) -> Self {
        self.images.push(image);
        self
    }
}

impl ResourceLookup for LookupContext {
    fn availability_zones(&self, env: &StackEnvironment) -> Vec<String> {
        match self.availability_zones.get(&env.region) {
            Some(zones) => zones.clone(),
            None => {
                warn!(
                    "No availability zones recorded for {}; assuming {}a-{}c",
                    env.region, env.region, env.region
                );
                FALLBACK_ZONE_SUFFIXES
                    .iter()
                    .map(|suffix| format!("{}{}", env.region, suffix))
                    .collect()
            }
        }
    }

    fn vpc(&self, env: &StackEnvironment, vpc_id: &str) -> IacResult<VpcRef> {
        self.vpcs
            .iter()
            .find(|v| v.vpc_id == vpc_id && v.region == env.region)
            .cloned()
            .ok_or_else(|| IacError::not_found(format!("vpc in {}", env.region), vpc_id))
    }

    fn machine_image(&self, env: &StackEnvironment, name: &str) -> IacResult<ImageRef> {
        self.images
            .iter()
            .find(|i| i.name == name && i.region == env.region)
            .cloned()
            .ok_or_else(|| IacError::not_found(format!("machine image in {}", env.region), name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn env() -> StackEnvironment {
        StackEnvironment::new("111122223333", "eu-west-1")
    }

    fn vpc() -> VpcRef {
        VpcRef {
            vpc_id: "vpc-0abc".to_string(),
            region: "eu-west-1".to_string(),
            subnets: vec![
                SubnetRef {
                    subnet_id: "subnet-priv".to_string(),
                    availability_zone: "eu-west-1a".to_string(),
                    tier: SubnetTier::PrivateWithEgress,
                },
                SubnetRef {
                    subnet_id: "subnet-pub".to_string(),
                    availability_zone: "eu-west-1b".to_string(),
                    tier: SubnetTier::Public,
                },
            ],
        }
    }

    #[test]
    fn test_instance_tier() {
        assert_eq!(SubnetTier::for_instance(true), SubnetTier::Public);
        assert_eq!(SubnetTier::for_instance(false), SubnetTier::PrivateWithEgress);
    }

    #[test]
    fn test_select_subnet() {
        let vpc = vpc();
        assert_eq!(vpc.select_subnet(SubnetTier::Public).unwrap().subnet_id, "subnet-pub");
        assert!(vpc.select_subnet(SubnetTier::PrivateIsolated).is_err());
    }

    #[test]
    fn test_vpc_lookup_is_region_scoped() {
        let context = LookupContext::new().with_vpc(vpc());
        assert!(context.vpc(&env(), "vpc-0abc").is_ok());

        let other = StackEnvironment::new("111122223333", "us-east-1");
        let err = context.vpc(&other, "vpc-0abc").unwrap_err();
        assert!(matches!(err, IacError::ResourceNotFound { .. }));
    }

    #[test]
    fn test_zone_fallback() {
        let context = LookupContext::new();
        assert_eq!(
            context.availability_zones(&env()),
            vec!["eu-west-1a", "eu-west-1b", "eu-west-1c"]
        );

        let context = context.with_availability_zones("eu-west-1", ["eu-west-1a", "eu-west-1b"]);
        assert_eq!(context.availability_zones(&env()).len(), 2);
    }

    #[test]
    fn test_context_file_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONTEXT_FILE);

        let context = LookupContext::new().with_vpc(vpc()).with_image(ImageRef {
            name: "ubuntu-22.04".to_string(),
            region: "eu-west-1".to_string(),
            image_id: "ami-123".to_string(),
        });
        context.to_file(&path).unwrap();

        let loaded = LookupContext::from_file(&path).unwrap();
        assert_eq!(loaded, context);
        assert_eq!(loaded.machine_image(&env(), "ubuntu-22.04").unwrap().image_id, "ami-123");
    }

    #[test]
    fn test_missing_context_file_is_empty() {
        let dir = tempdir().unwrap();
        let context = LookupContext::load_or_default(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(context, LookupContext::default());
    }

    #[test]
    fn test_vpc_entry_ignores_block_key() {
        let context: LookupContext = serde_yaml::from_str(
            r#"
vpcs:
  - vpc_id: vpc-0abc
    region: eu-west-1
    cidr: 10.0.0.0/16
"#,
        )
        .unwrap();

        let found = context.vpc(&env(), "vpc-0abc").unwrap();
        assert_eq!(found.vpc_id, "vpc-0abc");
        assert!(found.subnets.is_empty());
        assert!(!serde_yaml::to_string(&found).unwrap().contains("cidr"));
    }
}
