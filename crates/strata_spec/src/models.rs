//! Data models for environment descriptors.

use std::collections::BTreeMap;
use std::fmt;

use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};

/// Root environment descriptor.
///
/// Each family is an ordered list; records are provisioned in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSpec {
    #[serde(default)]
    pub vpc: Vec<VpcRecord>,
    #[serde(default)]
    pub ec2: Vec<ComputeRecord>,
    #[serde(default)]
    pub db: Vec<DatabaseRecord>,
}

impl EnvironmentSpec {
    /// Total number of records across all families.
    pub fn record_count(&self) -> usize {
        self.vpc.len() + self.ec2.len() + self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }
}

/// A network to create from scratch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcRecord {
    pub name: String,
    pub region: String,
    #[serde(deserialize_with = "scalar::string")]
    pub account: String,
    /// IPv4 block for the whole VPC, e.g. `10.10.0.0/16`.
    pub cidr: String,
}

/// A compute instance placed in a pre-existing VPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeRecord {
    pub name: String,
    pub env_name: String,
    pub region: String,
    #[serde(deserialize_with = "scalar::string")]
    pub account: String,
    #[serde(rename = "type")]
    pub instance_type: String,
    /// Machine image name, resolved through the lookup context.
    #[serde(rename = "ami")]
    pub ami_name: String,
    pub device_name: String,
    pub key_name: String,
    pub vpc_id: String,
    pub is_public: bool,
    /// File name under the scripts directory used as instance user data.
    #[serde(rename = "script")]
    pub user_data_script: String,
    pub allowed_ports: Vec<IngressRule>,
}

/// A database instance and the subnet group it lives in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseRecord {
    pub name: String,
    pub id: String,
    pub subnet_ids: Vec<String>,
    #[serde(deserialize_with = "scalar::string")]
    pub account: String,
    pub region: String,
    pub engine: String,
    pub instance_type: String,
    /// Allocated storage in GiB.
    #[serde(deserialize_with = "scalar::u32")]
    pub storage: u32,
    /// Name of the environment variable holding the master username.
    #[serde(rename = "username")]
    pub username_env_var: String,
    /// Name of the environment variable holding the master password.
    #[serde(rename = "password")]
    pub password_env_var: String,
    pub vpc_id: String,
    pub allowed_ports: Vec<IngressRule>,
    pub multi_az: bool,
    #[serde(deserialize_with = "scalar::u16")]
    pub port: u16,
}

/// Source of inbound traffic for an ingress rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IpSource {
    /// Any IPv4 address.
    Any,
    /// A literal address or CIDR, used as given.
    Cidr(String),
}

impl IpSource {
    pub const ANY: &'static str = "any";
    pub const ANY_IPV4: &'static str = "0.0.0.0/0";

    pub fn parse(value: &str) -> Self {
        if value == Self::ANY {
            IpSource::Any
        } else {
            IpSource::Cidr(value.to_string())
        }
    }

    /// The value as written in the descriptor.
    pub fn as_str(&self) -> &str {
        match self {
            IpSource::Any => Self::ANY,
            IpSource::Cidr(cidr) => cidr,
        }
    }

    /// The address block a firewall rule should allow, in CIDR notation.
    ///
    /// A bare address becomes a /32 and host bits are cleared. Values that do
    /// not parse are returned unchanged; the validator rejects them.
    pub fn peer(&self) -> String {
        match self {
            IpSource::Any => Self::ANY_IPV4.to_string(),
            IpSource::Cidr(cidr) => cidr
                .parse::<Ipv4Network>()
                .and_then(|network| Ipv4Network::new(network.network(), network.prefix()))
                .map(|network| network.to_string())
                .unwrap_or_else(|_| cidr.clone()),
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, IpSource::Any)
    }
}

impl From<String> for IpSource {
    fn from(value: String) -> Self {
        if value == Self::ANY {
            IpSource::Any
        } else {
            IpSource::Cidr(value)
        }
    }
}

impl From<IpSource> for String {
    fn from(source: IpSource) -> Self {
        match source {
            IpSource::Any => IpSource::ANY.to_string(),
            IpSource::Cidr(cidr) => cidr,
        }
    }
}

impl fmt::Display for IpSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One inbound TCP permission.
///
/// In YAML a rule is a single-key mapping whose value is a one-element list:
///
/// ```yaml
/// allowed_ports:
///   - ssh:
///       - port: 22
///         ip: any
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawIngressRule", into = "RawIngressRule")]
pub struct IngressRule {
    pub name: String,
    pub port: u16,
    pub source: IpSource,
}

impl IngressRule {
    pub fn new(name: impl Into<String>, port: u16, source: IpSource) -> Self {
        Self {
            name: name.into(),
            port,
            source,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(transparent)]
struct RawIngressRule(BTreeMap<String, Vec<RawPortEntry>>);

#[derive(Serialize, Deserialize)]
struct RawPortEntry {
    #[serde(deserialize_with = "scalar::u16")]
    port: u16,
    ip: IpSource,
}

impl TryFrom<RawIngressRule> for IngressRule {
    type Error = String;

    fn try_from(raw: RawIngressRule) -> Result<Self, Self::Error> {
        if raw.0.len() != 1 {
            return Err(format!(
                "ingress rule must have exactly one name key, found {}",
                raw.0.len()
            ));
        }

        let (name, mut entries) = raw
            .0
            .into_iter()
            .next()
            .ok_or_else(|| "ingress rule is empty".to_string())?;

        if entries.len() != 1 {
            return Err(format!(
                "ingress rule '{}' must hold exactly one port entry, found {}",
                name,
                entries.len()
            ));
        }

        let entry = entries.remove(0);
        Ok(IngressRule {
            name,
            port: entry.port,
            source: entry.ip,
        })
    }
}

impl From<IngressRule> for RawIngressRule {
    fn from(rule: IngressRule) -> Self {
        let mut map = BTreeMap::new();
        map.insert(
            rule.name,
            vec![RawPortEntry {
                port: rule.port,
                ip: rule.source,
            }],
        );
        RawIngressRule(map)
    }
}

/// Lenient scalar deserializers: YAML authors write `port: 5432` and
/// `port: "5432"` interchangeably, and account ids often come unquoted.
mod scalar {
    use std::fmt::Display;
    use std::str::FromStr;

    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Int(u64),
        Str(String),
    }

    fn integer<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<u64> + FromStr,
        <T as FromStr>::Err: Display,
    {
        match Scalar::deserialize(deserializer)? {
            Scalar::Int(n) => {
                T::try_from(n).map_err(|_| D::Error::custom(format!("integer {} out of range", n)))
            }
            Scalar::Str(s) => s
                .trim()
                .parse::<T>()
                .map_err(|e| D::Error::custom(format!("invalid integer '{}': {}", s, e))),
        }
    }

    pub fn u16<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
        integer(deserializer)
    }

    pub fn u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        integer(deserializer)
    }

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        match Scalar::deserialize(deserializer)? {
            Scalar::Int(n) => Ok(n.to_string()),
            Scalar::Str(s) => Ok(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_source_sentinel() {
        assert!(IpSource::parse("any").is_any());
        assert!(!IpSource::parse("10.0.0.0/8").is_any());
        assert!(!IpSource::parse("ANY").is_any());
        assert_eq!(IpSource::Any.peer(), "0.0.0.0/0");
        assert_eq!(IpSource::parse("203.0.113.7/32").peer(), "203.0.113.7/32");
    }

    #[test]
    fn test_ip_source_peer_is_cidr() {
        assert_eq!(IpSource::parse("203.0.113.10").peer(), "203.0.113.10/32");
        assert_eq!(IpSource::parse("10.1.2.3/16").peer(), "10.1.0.0/16");
        assert_eq!(IpSource::parse("203.0.113.10").as_str(), "203.0.113.10");
    }

    #[test]
    fn test_ingress_rule_from_yaml() {
        let rule: IngressRule = serde_yaml::from_str("rule1:\n  - port: 22\n    ip: any\n").unwrap();
        assert_eq!(rule, IngressRule::new("rule1", 22, IpSource::Any));
    }

    #[test]
    fn test_ingress_rule_port_as_string() {
        let rule: IngressRule =
            serde_yaml::from_str("https:\n  - port: \"443\"\n    ip: 10.0.0.0/16\n").unwrap();
        assert_eq!(rule.port, 443);
        assert_eq!(rule.source, IpSource::Cidr("10.0.0.0/16".to_string()));
    }

    #[test]
    fn test_ingress_rule_rejects_missing_ip() {
        let result: Result<IngressRule, _> = serde_yaml::from_str("ssh:\n  - port: 22\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_ingress_rule_rejects_multiple_keys() {
        let yaml = "a:\n  - port: 22\n    ip: any\nb:\n  - port: 80\n    ip: any\n";
        let result: Result<IngressRule, _> = serde_yaml::from_str(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn test_ingress_rule_rejects_empty_list() {
        let result: Result<IngressRule, _> = serde_yaml::from_str("ssh: []\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_ingress_rule_serializes_to_descriptor_shape() {
        let rule = IngressRule::new("web", 80, IpSource::Any);
        let yaml = serde_yaml::to_string(&rule).unwrap();
        assert!(yaml.contains("web:"));
        assert!(yaml.contains("port: 80"));
        assert!(yaml.contains("ip: any"));
    }

    #[test]
    fn test_numeric_account_is_coerced() {
        let yaml = "name: core\nregion: eu-west-1\naccount: 123456789012\ncidr: 10.0.0.0/16\n";
        let record: VpcRecord = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(record.account, "123456789012");
    }
}
