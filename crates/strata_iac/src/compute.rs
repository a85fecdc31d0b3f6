//! Compute instance builder.

use serde_json::json;
use tracing::info;

use strata_spec::ComputeRecord;

use crate::error::IacResult;
use crate::lookup::{ResourceLookup, SubnetTier};
use crate::network::SecurityGroupSpec;
use crate::resource::{
    BlockDeviceMapping, EbsProps, InstanceProfileProps, InstanceProps, ResourceProperties,
    RoleProps, Tag, Token,
};
use crate::stack::{Stack, StackEnvironment};

/// Service principal allowed to assume the instance role.
pub const INSTANCE_SERVICE_PRINCIPAL: &str = "ec2.amazonaws.com";

/// Managed policies attached to every instance role.
pub const INSTANCE_MANAGED_POLICIES: [&str; 2] =
    ["AmazonSSMManagedInstanceCore", "AmazonSSMPatchAssociation"];

/// Root volume sizing.
pub const VOLUME_SIZE_GIB: u32 = 200;
pub const VOLUME_IOPS: u32 = 3000;
pub const VOLUME_TYPE: &str = "gp3";

/// Declares an instance, its role and security group from a [`ComputeRecord`].
pub struct ComputeBuilder<'a> {
    record: &'a ComputeRecord,
    user_data: &'a str,
}

impl<'a> ComputeBuilder<'a> {
    /// `user_data` is the script body, passed through verbatim.
    pub fn new(record: &'a ComputeRecord, user_data: &'a str) -> Self {
        Self { record, user_data }
    }

    pub fn environment(&self) -> StackEnvironment {
        StackEnvironment::new(&self.record.account, &self.record.region)
    }

    pub fn stack_name(&self) -> String {
        format!(
            "ec2-{}-{}-{}",
            self.record.name, self.record.env_name, self.record.region
        )
    }

    /// Subnet tier the instance is placed in.
    pub fn subnet_tier(&self) -> SubnetTier {
        SubnetTier::for_instance(self.record.is_public)
    }

    pub fn build(&self, lookup: &dyn ResourceLookup) -> IacResult<Stack> {
        let record = self.record;
        let env = self.environment();
        let mut stack = Stack::new(self.stack_name(), env.clone())?
            .with_description(format!("Instance {} ({})", record.name, record.env_name));

        // Role
        let role = stack.add_resource(
            &format!("InstanceRole-application-{}", record.name),
            ResourceProperties::Role(RoleProps {
                role_name: format!("{}-AmazonSSMRole", record.name),
                description: "EC2 role for SSM for Quick-Setup".to_string(),
                assume_role_policy_document: json!({
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Principal": { "Service": INSTANCE_SERVICE_PRINCIPAL },
                        "Action": "sts:AssumeRole"
                    }]
                }),
                managed_policy_arns: INSTANCE_MANAGED_POLICIES
                    .iter()
                    .map(|policy| format!("arn:aws:iam::aws:policy/{}", policy))
                    .collect(),
            }),
        )?;
        let profile = stack.add_resource(
            &format!("InstanceProfile-application-{}", record.name),
            ResourceProperties::InstanceProfile(InstanceProfileProps {
                roles: vec![Token::reference(&role)],
            }),
        )?;

        // Network
        let vpc = lookup.vpc(&env, &record.vpc_id)?;

        let security_group = stack.add_resource(
            &format!("SecurityGroup-application-{}", record.name),
            ResourceProperties::SecurityGroup(
                SecurityGroupSpec {
                    group_name: format!("application-{}", record.name),
                    description: format!("Security group for {}", record.name),
                    vpc_id: &vpc.vpc_id,
                    allowed_ports: &record.allowed_ports,
                }
                .into_props(),
            ),
        )?;

        let block_device = BlockDeviceMapping {
            device_name: record.device_name.clone(),
            ebs: EbsProps {
                volume_size: VOLUME_SIZE_GIB,
                iops: VOLUME_IOPS,
                volume_type: VOLUME_TYPE.to_string(),
                delete_on_termination: false,
            },
        };

        let subnet = vpc.select_subnet(self.subnet_tier())?;
        let image = lookup.machine_image(&env, &record.ami_name)?;

        let instance = stack.add_resource(
            &format!("Instance-application-{}", record.name),
            ResourceProperties::Instance(InstanceProps {
                availability_zone: subnet.availability_zone.clone(),
                image_id: image.image_id.clone(),
                instance_type: record.instance_type.clone(),
                key_name: record.key_name.clone(),
                subnet_id: subnet.subnet_id.clone(),
                security_group_ids: vec![Token::attribute(&security_group, "GroupId")],
                iam_instance_profile: Token::reference(&profile),
                block_device_mappings: vec![block_device],
                user_data: Token::Base64(self.user_data.to_string()),
                tags: vec![Tag::name(format!("application-{}", record.name))],
            }),
        )?;
        stack.add_resource_dependency(&instance, &role)?;

        info!(
            "Declared instance application-{} ({}, {} subnet {}, image {})",
            record.name,
            record.instance_type,
            self.subnet_tier(),
            subnet.subnet_id,
            image.image_id
        );
        Ok(stack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IacError;
    use crate::lookup::{ImageRef, LookupContext, SubnetRef, VpcRef};
    use strata_spec::{IngressRule, IpSource};

    fn record(is_public: bool) -> ComputeRecord {
        ComputeRecord {
            name: "web".to_string(),
            env_name: "dev".to_string(),
            region: "eu-west-1".to_string(),
            account: "111122223333".to_string(),
            instance_type: "t3.small".to_string(),
            ami_name: "ubuntu-22.04".to_string(),
            device_name: "/dev/sda1".to_string(),
            key_name: "ops".to_string(),
            vpc_id: "vpc-0abc".to_string(),
            is_public,
            user_data_script: "web.sh".to_string(),
            allowed_ports: vec![
                IngressRule::new("rule1", 22, IpSource::Any),
                IngressRule::new("https", 443, IpSource::parse("203.0.113.0/24")),
            ],
        }
    }

    fn lookup() -> LookupContext {
        LookupContext::new()
            .with_vpc(VpcRef {
                vpc_id: "vpc-0abc".to_string(),
                region: "eu-west-1".to_string(),
                subnets: vec![
                    SubnetRef {
                        subnet_id: "subnet-public-a".to_string(),
                        availability_zone: "eu-west-1a".to_string(),
                        tier: SubnetTier::Public,
                    },
                    SubnetRef {
                        subnet_id: "subnet-private-a".to_string(),
                        availability_zone: "eu-west-1a".to_string(),
                        tier: SubnetTier::PrivateWithEgress,
                    },
                ],
            })
            .with_image(ImageRef {
                name: "ubuntu-22.04".to_string(),
                region: "eu-west-1".to_string(),
                image_id: "ami-0123".to_string(),
            })
    }

    fn instance(stack: &Stack) -> &InstanceProps {
        match &stack.resource("Instanceapplicationweb").unwrap().properties {
            ResourceProperties::Instance(props) => props,
            other => panic!("unexpected resource: {:?}", other),
        }
    }

    #[test]
    fn test_public_instance() {
        let record = record(true);
        let stack = ComputeBuilder::new(&record, "#!/bin/bash\necho hi\n")
            .build(&lookup())
            .unwrap();

        assert_eq!(stack.name(), "ec2-web-dev-eu-west-1");
        let props = instance(&stack);
        assert_eq!(props.subnet_id, "subnet-public-a");
        assert_eq!(props.image_id, "ami-0123");
        assert_eq!(props.instance_type, "t3.small");
        assert_eq!(props.key_name, "ops");
        assert_eq!(props.user_data, Token::Base64("#!/bin/bash\necho hi\n".to_string()));
    }

    #[test]
    fn test_private_instance() {
        let record = record(false);
        let stack = ComputeBuilder::new(&record, "").build(&lookup()).unwrap();
        assert_eq!(instance(&stack).subnet_id, "subnet-private-a");
    }

    #[test]
    fn test_block_device() {
        let record = record(true);
        let stack = ComputeBuilder::new(&record, "").build(&lookup()).unwrap();
        let mapping = &instance(&stack).block_device_mappings[0];

        assert_eq!(mapping.device_name, "/dev/sda1");
        assert_eq!(mapping.ebs.volume_size, 200);
        assert_eq!(mapping.ebs.iops, 3000);
        assert_eq!(mapping.ebs.volume_type, "gp3");
        assert!(!mapping.ebs.delete_on_termination);
    }

    #[test]
    fn test_role_and_security_group() {
        let record = record(true);
        let stack = ComputeBuilder::new(&record, "").build(&lookup()).unwrap();

        match &stack.resource("InstanceRoleapplicationweb").unwrap().properties {
            ResourceProperties::Role(role) => {
                assert_eq!(role.role_name, "web-AmazonSSMRole");
                assert_eq!(role.managed_policy_arns.len(), 2);
                assert!(role.managed_policy_arns[0].ends_with("AmazonSSMManagedInstanceCore"));
                assert!(role.managed_policy_arns[1].ends_with("AmazonSSMPatchAssociation"));
            }
            other => panic!("unexpected resource: {:?}", other),
        }

        match &stack.resource("SecurityGroupapplicationweb").unwrap().properties {
            ResourceProperties::SecurityGroup(sg) => {
                assert_eq!(sg.group_name, "application-web");
                assert_eq!(sg.vpc_id, Token::literal("vpc-0abc"));
                assert_eq!(sg.security_group_ingress.len(), 2);
                assert_eq!(sg.security_group_ingress[0].cidr_ip, "0.0.0.0/0");
                assert_eq!(sg.security_group_ingress[1].cidr_ip, "203.0.113.0/24");
                assert_eq!(sg.security_group_ingress[1].description, "203.0.113.0/24");
            }
            other => panic!("unexpected resource: {:?}", other),
        }

        stack.to_template().unwrap();
    }

    #[test]
    fn test_unknown_vpc() {
        let mut record = record(true);
        record.vpc_id = "vpc-missing".to_string();
        let err = ComputeBuilder::new(&record, "").build(&lookup()).unwrap_err();
        assert!(matches!(err, IacError::ResourceNotFound { .. }));
    }

    #[test]
    fn test_unknown_image() {
        let mut record = record(true);
        record.ami_name = "windows".to_string();
        let err = ComputeBuilder::new(&record, "").build(&lookup()).unwrap_err();
        assert!(matches!(err, IacError::ResourceNotFound { .. }));
    }
}
