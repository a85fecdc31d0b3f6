//! Declared resources and their template properties.
//!
//! Property structs serialize to the shape the provisioning engine consumes:
//! each resource becomes `{ "Type": ..., "Properties": { ... } }` with
//! PascalCase property names.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// A property value that is either known at declaration time or resolved
/// by the provisioning engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A plain value.
    Literal(String),
    /// The primary identifier of another resource in the same stack.
    Ref(String),
    /// A named attribute of another resource in the same stack.
    GetAtt(String, String),
    /// A literal value the engine base64-encodes.
    Base64(String),
}

impl Token {
    pub fn literal(value: impl Into<String>) -> Self {
        Token::Literal(value.into())
    }

    pub fn reference(logical_id: impl Into<String>) -> Self {
        Token::Ref(logical_id.into())
    }

    pub fn attribute(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Token::GetAtt(logical_id.into(), attribute.into())
    }

    /// The literal value, if this token is not resolved by the engine.
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Token::Literal(value) | Token::Base64(value) => Some(value),
            Token::Ref(_) | Token::GetAtt(_, _) => None,
        }
    }

    /// The logical id this token points at, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            Token::Ref(id) | Token::GetAtt(id, _) => Some(id),
            Token::Literal(_) | Token::Base64(_) => None,
        }
    }
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Token::Literal(value) => serializer.serialize_str(value),
            Token::Ref(id) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Ref", id)?;
                map.end()
            }
            Token::GetAtt(id, attribute) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Fn::GetAtt", &[id, attribute])?;
                map.end()
            }
            Token::Base64(value) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Fn::Base64", value)?;
                map.end()
            }
        }
    }
}

/// Key/value tag attached to a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn name(value: impl Into<String>) -> Self {
        Self::new("Name", value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct VpcProps {
    pub cidr_block: String,
    pub enable_dns_hostnames: bool,
    pub enable_dns_support: bool,
    pub instance_tenancy: String,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubnetProps {
    pub vpc_id: Token,
    pub cidr_block: String,
    pub availability_zone: String,
    pub map_public_ip_on_launch: bool,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InternetGatewayProps {
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GatewayAttachmentProps {
    pub vpc_id: Token,
    pub internet_gateway_id: Token,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ElasticIpProps {
    pub domain: String,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NatGatewayProps {
    pub subnet_id: Token,
    pub allocation_id: Token,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RouteTableProps {
    pub vpc_id: Token,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RouteProps {
    pub route_table_id: Token,
    pub destination_cidr_block: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_id: Option<Token>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nat_gateway_id: Option<Token>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RouteTableAssociationProps {
    pub route_table_id: Token,
    pub subnet_id: Token,
}

/// One inbound permission of a security group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IngressProps {
    pub ip_protocol: String,
    pub from_port: u16,
    pub to_port: u16,
    pub cidr_ip: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EgressProps {
    pub ip_protocol: String,
    pub cidr_ip: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecurityGroupProps {
    pub group_name: String,
    pub group_description: String,
    pub vpc_id: Token,
    pub security_group_ingress: Vec<IngressProps>,
    pub security_group_egress: Vec<EgressProps>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoleProps {
    pub role_name: String,
    pub description: String,
    pub assume_role_policy_document: serde_json::Value,
    pub managed_policy_arns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceProfileProps {
    pub roles: Vec<Token>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EbsProps {
    pub volume_size: u32,
    pub iops: u32,
    pub volume_type: String,
    pub delete_on_termination: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlockDeviceMapping {
    pub device_name: String,
    pub ebs: EbsProps,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceProps {
    pub availability_zone: String,
    pub image_id: String,
    pub instance_type: String,
    pub key_name: String,
    pub subnet_id: String,
    pub security_group_ids: Vec<Token>,
    pub iam_instance_profile: Token,
    pub block_device_mappings: Vec<BlockDeviceMapping>,
    pub user_data: Token,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DbSubnetGroupProps {
    #[serde(rename = "DBSubnetGroupName")]
    pub db_subnet_group_name: String,
    #[serde(rename = "DBSubnetGroupDescription")]
    pub db_subnet_group_description: String,
    pub subnet_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DbInstanceProps {
    pub engine: String,
    #[serde(rename = "DBInstanceIdentifier")]
    pub db_instance_identifier: String,
    #[serde(rename = "DBInstanceClass")]
    pub db_instance_class: String,
    pub allocated_storage: String,
    pub master_username: String,
    pub master_user_password: String,
    #[serde(rename = "MultiAZ")]
    pub multi_az: bool,
    pub port: String,
    #[serde(rename = "DBSubnetGroupName")]
    pub db_subnet_group_name: String,
    #[serde(rename = "VPCSecurityGroups")]
    pub vpc_security_groups: Vec<Token>,
    #[serde(rename = "CACertificateIdentifier")]
    pub ca_certificate_identifier: String,
    pub publicly_accessible: bool,
}

/// Every resource type a builder can declare.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "Type", content = "Properties")]
pub enum ResourceProperties {
    #[serde(rename = "AWS::EC2::VPC")]
    Vpc(VpcProps),
    #[serde(rename = "AWS::EC2::Subnet")]
    Subnet(SubnetProps),
    #[serde(rename = "AWS::EC2::InternetGateway")]
    InternetGateway(InternetGatewayProps),
    #[serde(rename = "AWS::EC2::VPCGatewayAttachment")]
    GatewayAttachment(GatewayAttachmentProps),
    #[serde(rename = "AWS::EC2::EIP")]
    ElasticIp(ElasticIpProps),
    #[serde(rename = "AWS::EC2::NatGateway")]
    NatGateway(NatGatewayProps),
    #[serde(rename = "AWS::EC2::RouteTable")]
    RouteTable(RouteTableProps),
    #[serde(rename = "AWS::EC2::Route")]
    Route(RouteProps),
    #[serde(rename = "AWS::EC2::SubnetRouteTableAssociation")]
    RouteTableAssociation(RouteTableAssociationProps),
    #[serde(rename = "AWS::EC2::SecurityGroup")]
    SecurityGroup(SecurityGroupProps),
    #[serde(rename = "AWS::IAM::Role")]
    Role(RoleProps),
    #[serde(rename = "AWS::IAM::InstanceProfile")]
    InstanceProfile(InstanceProfileProps),
    #[serde(rename = "AWS::EC2::Instance")]
    Instance(InstanceProps),
    #[serde(rename = "AWS::RDS::DBSubnetGroup")]
    DbSubnetGroup(DbSubnetGroupProps),
    #[serde(rename = "AWS::RDS::DBInstance")]
    DbInstance(DbInstanceProps),
}

impl ResourceProperties {
    /// Provider type name, e.g. `AWS::EC2::VPC`.
    pub fn type_name(&self) -> &'static str {
        match self {
            ResourceProperties::Vpc(_) => "AWS::EC2::VPC",
            ResourceProperties::Subnet(_) => "AWS::EC2::Subnet",
            ResourceProperties::InternetGateway(_) => "AWS::EC2::InternetGateway",
            ResourceProperties::GatewayAttachment(_) => "AWS::EC2::VPCGatewayAttachment",
            ResourceProperties::ElasticIp(_) => "AWS::EC2::EIP",
            ResourceProperties::NatGateway(_) => "AWS::EC2::NatGateway",
            ResourceProperties::RouteTable(_) => "AWS::EC2::RouteTable",
            ResourceProperties::Route(_) => "AWS::EC2::Route",
            ResourceProperties::RouteTableAssociation(_) => "AWS::EC2::SubnetRouteTableAssociation",
            ResourceProperties::SecurityGroup(_) => "AWS::EC2::SecurityGroup",
            ResourceProperties::Role(_) => "AWS::IAM::Role",
            ResourceProperties::InstanceProfile(_) => "AWS::IAM::InstanceProfile",
            ResourceProperties::Instance(_) => "AWS::EC2::Instance",
            ResourceProperties::DbSubnetGroup(_) => "AWS::RDS::DBSubnetGroup",
            ResourceProperties::DbInstance(_) => "AWS::RDS::DBInstance",
        }
    }
}

/// A resource declared in a stack.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    /// Template-unique identifier derived from the construct id.
    pub logical_id: String,
    /// The id the builder declared the resource under.
    pub construct_id: String,
    pub properties: ResourceProperties,
    pub depends_on: Vec<String>,
}

impl Resource {
    pub fn type_name(&self) -> &'static str {
        self.properties.type_name()
    }
}

/// Derive a template logical id from a construct id.
///
/// Logical ids are alphanumeric only, so separators are dropped:
/// `InstanceRole-application-web` becomes `InstanceRoleapplicationweb`.
pub fn logical_id(construct_id: &str) -> String {
    construct_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}
