//! Security group declarations shared by the compute and database builders.

use strata_spec::IngressRule;

use crate::resource::{EgressProps, IngressProps, SecurityGroupProps, Token};

/// Declaration of a security group in an existing VPC.
pub struct SecurityGroupSpec<'a> {
    pub group_name: String,
    pub description: String,
    pub vpc_id: &'a str,
    pub allowed_ports: &'a [IngressRule],
}

impl SecurityGroupSpec<'_> {
    /// Build the group with one TCP ingress rule per allowed port and all
    /// outbound traffic allowed.
    pub fn into_props(self) -> SecurityGroupProps {
        SecurityGroupProps {
            group_name: self.group_name,
            group_description: self.description,
            vpc_id: Token::literal(self.vpc_id),
            security_group_ingress: ingress_rules(self.allowed_ports),
            security_group_egress: vec![allow_all_outbound()],
        }
    }
}

/// Translate descriptor rules into ingress permissions, one per rule.
///
/// The description carries the source string as written in the descriptor
/// (`any` or the address), not the rule name.
pub fn ingress_rules(rules: &[IngressRule]) -> Vec<IngressProps> {
    rules
        .iter()
        .map(|rule| IngressProps {
            ip_protocol: "tcp".to_string(),
            from_port: rule.port,
            to_port: rule.port,
            cidr_ip: rule.source.peer(),
            description: rule.source.as_str().to_string(),
        })
        .collect()
}

fn allow_all_outbound() -> EgressProps {
    EgressProps {
        ip_protocol: "-1".to_string(),
        cidr_ip: "0.0.0.0/0".to_string(),
        description: "Allow all outbound traffic by default".to_string(),
    }
}
