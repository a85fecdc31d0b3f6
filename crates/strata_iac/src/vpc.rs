//! VPC builder.

use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use tracing::info;

use strata_spec::{VpcRecord, SUBNET_PREFIX};

use crate::error::{IacError, IacResult};
use crate::lookup::SubnetTier;
use crate::resource::{
    ElasticIpProps, GatewayAttachmentProps, InternetGatewayProps, NatGatewayProps,
    ResourceProperties, RouteProps, RouteTableAssociationProps, RouteTableProps, SubnetProps, Tag,
    Token, VpcProps,
};
use crate::stack::{Stack, StackEnvironment};

/// Upper bound on zones a VPC spans.
pub const MAX_AZS: usize = 3;

/// Number of NAT gateways shared by all private-with-egress subnets.
pub const NAT_GATEWAYS: usize = 1;

/// One subnet of a VPC plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSubnet {
    pub tier: SubnetTier,
    pub availability_zone: String,
    pub cidr: Ipv4Network,
}

impl PlannedSubnet {
    /// Construct id, e.g. `snet-public-subnet-01-Subnet2`.
    pub fn construct_id(&self, zone_index: usize) -> String {
        format!("{}-Subnet{}", self.tier.subnet_name(), zone_index + 1)
    }
}

/// Subnet layout of a VPC: every tier in every zone, each a /24.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetPlan {
    pub vpc_cidr: Ipv4Network,
    pub availability_zones: Vec<String>,
    pub subnets: Vec<PlannedSubnet>,
}

impl SubnetPlan {
    /// Allocate /24 blocks sequentially from the start of the VPC block,
    /// tier by tier and zone by zone.
    pub fn new(cidr: &str, available_zones: &[String]) -> IacResult<Self> {
        let vpc_cidr: Ipv4Network = cidr.parse().map_err(|e: ipnetwork::IpNetworkError| {
            IacError::InvalidCidr {
                cidr: cidr.to_string(),
                message: e.to_string(),
            }
        })?;

        if vpc_cidr.ip() != vpc_cidr.network() {
            return Err(IacError::InvalidCidr {
                cidr: cidr.to_string(),
                message: format!(
                    "host bits set, network is {}/{}",
                    vpc_cidr.network(),
                    vpc_cidr.prefix()
                ),
            });
        }

        if vpc_cidr.prefix() > SUBNET_PREFIX {
            return Err(IacError::InvalidCidr {
                cidr: cidr.to_string(),
                message: format!("prefix must be /{} or larger", SUBNET_PREFIX),
            });
        }

        let zones: Vec<String> = available_zones.iter().take(MAX_AZS).cloned().collect();
        if zones.is_empty() {
            return Err(IacError::not_found("availability zones for vpc", cidr));
        }

        let tiers = SubnetTier::all();
        let needed = (tiers.len() * zones.len()) as u64;
        let capacity = 1u64 << (SUBNET_PREFIX - vpc_cidr.prefix());
        if needed > capacity {
            return Err(IacError::InvalidCidr {
                cidr: cidr.to_string(),
                message: format!(
                    "room for {} /{} subnet(s), {} needed",
                    capacity, SUBNET_PREFIX, needed
                ),
            });
        }

        let base = u32::from(vpc_cidr.network());
        let block = 1u32 << (32 - SUBNET_PREFIX);
        let mut subnets = Vec::with_capacity(needed as usize);

        for (tier_index, tier) in tiers.iter().enumerate() {
            for (zone_index, zone) in zones.iter().enumerate() {
                let offset = (tier_index * zones.len() + zone_index) as u32;
                let address = Ipv4Addr::from(base + offset * block);
                let subnet = Ipv4Network::new(address, SUBNET_PREFIX).map_err(|e| {
                    IacError::InvalidCidr {
                        cidr: cidr.to_string(),
                        message: e.to_string(),
                    }
                })?;

                subnets.push(PlannedSubnet {
                    tier: *tier,
                    availability_zone: zone.clone(),
                    cidr: subnet,
                });
            }
        }

        Ok(Self {
            vpc_cidr,
            availability_zones: zones,
            subnets,
        })
    }

    pub fn subnets_in(&self, tier: SubnetTier) -> impl Iterator<Item = &PlannedSubnet> {
        self.subnets.iter().filter(move |s| s.tier == tier)
    }
}

/// Declares a new VPC from a [`VpcRecord`].
pub struct VpcBuilder<'a> {
    record: &'a VpcRecord,
}

impl<'a> VpcBuilder<'a> {
    pub fn new(record: &'a VpcRecord) -> Self {
        Self { record }
    }

    pub fn environment(&self) -> StackEnvironment {
        StackEnvironment::new(&self.record.account, &self.record.region)
    }

    pub fn stack_name(&self) -> String {
        format!("network-vpc-{}-{}", self.record.name, self.record.region)
    }

    pub fn vpc_name(&self) -> String {
        format!("vpc-{}-{}", self.record.name, self.record.region)
    }

    /// Declare the VPC, its subnets, gateways and routing.
    pub fn build(&self, available_zones: &[String]) -> IacResult<Stack> {
        let plan = SubnetPlan::new(&self.record.cidr, available_zones)?;
        let vpc_name = self.vpc_name();

        let mut stack = Stack::new(self.stack_name(), self.environment())?
            .with_description(format!("Network {} in {}", self.record.name, self.record.region));

        let vpc = stack.add_resource(
            &vpc_name,
            ResourceProperties::Vpc(VpcProps {
                cidr_block: plan.vpc_cidr.to_string(),
                enable_dns_hostnames: true,
                enable_dns_support: true,
                instance_tenancy: "default".to_string(),
                tags: vec![Tag::name(&vpc_name)],
            }),
        )?;

        let igw = stack.add_resource(
            &format!("{}-IGW", vpc_name),
            ResourceProperties::InternetGateway(InternetGatewayProps {
                tags: vec![Tag::name(&vpc_name)],
            }),
        )?;
        let attachment = stack.add_resource(
            &format!("{}-VPCGW", vpc_name),
            ResourceProperties::GatewayAttachment(GatewayAttachmentProps {
                vpc_id: Token::reference(&vpc),
                internet_gateway_id: Token::reference(&igw),
            }),
        )?;

        let mut nat_gateway: Option<String> = None;

        for tier in SubnetTier::all() {
            for (zone_index, planned) in plan.subnets_in(tier).enumerate() {
                let construct_id = format!("{}-{}", vpc_name, planned.construct_id(zone_index));
                let subnet_label = format!("{}/{}", vpc_name, planned.construct_id(zone_index));

                let subnet = stack.add_resource(
                    &construct_id,
                    ResourceProperties::Subnet(SubnetProps {
                        vpc_id: Token::reference(&vpc),
                        cidr_block: planned.cidr.to_string(),
                        availability_zone: planned.availability_zone.clone(),
                        map_public_ip_on_launch: tier == SubnetTier::Public,
                        tags: vec![
                            Tag::name(&subnet_label),
                            Tag::new("strata:subnet-name", tier.subnet_name()),
                            Tag::new("strata:subnet-type", tier.as_str()),
                        ],
                    }),
                )?;

                let route_table = stack.add_resource(
                    &format!("{}-RouteTable", construct_id),
                    ResourceProperties::RouteTable(RouteTableProps {
                        vpc_id: Token::reference(&vpc),
                        tags: vec![Tag::name(&subnet_label)],
                    }),
                )?;
                stack.add_resource(
                    &format!("{}-RouteTableAssociation", construct_id),
                    ResourceProperties::RouteTableAssociation(RouteTableAssociationProps {
                        route_table_id: Token::reference(&route_table),
                        subnet_id: Token::reference(&subnet),
                    }),
                )?;

                match tier {
                    SubnetTier::Public => {
                        let route = stack.add_resource(
                            &format!("{}-DefaultRoute", construct_id),
                            ResourceProperties::Route(RouteProps {
                                route_table_id: Token::reference(&route_table),
                                destination_cidr_block: "0.0.0.0/0".to_string(),
                                gateway_id: Some(Token::reference(&igw)),
                                nat_gateway_id: None,
                            }),
                        )?;
                        stack.add_resource_dependency(&route, &attachment)?;

                        if nat_gateway.is_none() {
                            nat_gateway = Some(self.declare_nat_gateway(
                                &mut stack,
                                &construct_id,
                                &subnet_label,
                                &subnet,
                                &route,
                            )?);
                        }
                    }
                    SubnetTier::PrivateWithEgress => {
                        let nat = nat_gateway
                            .as_ref()
                            .ok_or_else(|| IacError::not_found("nat gateway", &vpc_name))?;
                        stack.add_resource(
                            &format!("{}-DefaultRoute", construct_id),
                            ResourceProperties::Route(RouteProps {
                                route_table_id: Token::reference(&route_table),
                                destination_cidr_block: "0.0.0.0/0".to_string(),
                                gateway_id: None,
                                nat_gateway_id: Some(Token::reference(nat)),
                            }),
                        )?;
                    }
                    SubnetTier::PrivateIsolated => {}
                }
            }
        }

        stack.add_output(
            "VpcId",
            Token::reference(&vpc),
            Some(format!("Id of {}", vpc_name)),
        );

        info!(
            "Declared {} across {} zone(s) with {} subnet(s) and {} NAT gateway(s)",
            vpc_name,
            plan.availability_zones.len(),
            plan.subnets.len(),
            NAT_GATEWAYS
        );
        Ok(stack)
    }

    fn declare_nat_gateway(
        &self,
        stack: &mut Stack,
        construct_id: &str,
        subnet_label: &str,
        subnet: &str,
        route: &str,
    ) -> IacResult<String> {
        let eip = stack.add_resource(
            &format!("{}-EIP", construct_id),
            ResourceProperties::ElasticIp(ElasticIpProps {
                domain: "vpc".to_string(),
                tags: vec![Tag::name(subnet_label)],
            }),
        )?;
        let nat = stack.add_resource(
            &format!("{}-NATGateway", construct_id),
            ResourceProperties::NatGateway(NatGatewayProps {
                subnet_id: Token::reference(subnet),
                allocation_id: Token::attribute(&eip, "AllocationId"),
                tags: vec![Tag::name(subnet_label)],
            }),
        )?;
        stack.add_resource_dependency(&nat, route)?;
        Ok(nat)
    }
}
