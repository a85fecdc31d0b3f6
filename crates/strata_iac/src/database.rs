//! Database subnet group and instance builders.
//!
//! The two builders are chained: [`SubnetGroupBuilder`] returns a
//! [`SubnetGroupOutput`] that [`DatabaseInstanceBuilder`] consumes, and the
//! instance stack records a dependency on the subnet group stack.

use std::fmt;

use tracing::{info, warn};

use strata_spec::DatabaseRecord;

use crate::credentials::{CredentialSource, DatabaseCredentials};
use crate::error::IacResult;
use crate::lookup::ResourceLookup;
use crate::network::SecurityGroupSpec;
use crate::resource::{DbInstanceProps, DbSubnetGroupProps, ResourceProperties, Token};
use crate::stack::{Stack, StackEnvironment};

/// Managed CA bundle every instance is pinned to.
pub const CA_CERTIFICATE_IDENTIFIER: &str = "rds-ca-rsa2048-g1";

/// Name of the subnet group stack output.
pub const SUBNET_GROUP_OUTPUT: &str = "SubnetGroupName";

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseEngine {
    Postgres,
    Mysql,
}

impl DatabaseEngine {
    /// Map a descriptor engine name. Unrecognized names fall back to MySQL.
    pub fn from_name(name: &str) -> Self {
        match name {
            "postgres" => DatabaseEngine::Postgres,
            "mysql" => DatabaseEngine::Mysql,
            other => {
                warn!("Unrecognized database engine '{}', falling back to mysql", other);
                DatabaseEngine::Mysql
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseEngine::Postgres => "postgres",
            DatabaseEngine::Mysql => "mysql",
        }
    }
}

impl fmt::Display for DatabaseEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Handle to a declared subnet group, passed to the instance builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetGroupOutput {
    /// Stack that declares the group.
    pub stack_name: String,
    /// Generated group name.
    pub subnet_group_name: String,
}

/// Declares a database subnet group.
pub struct SubnetGroupBuilder<'a> {
    name: &'a str,
    id: &'a str,
    subnet_ids: &'a [String],
}

impl<'a> SubnetGroupBuilder<'a> {
    pub fn new(name: &'a str, id: &'a str, subnet_ids: &'a [String]) -> Self {
        Self {
            name,
            id,
            subnet_ids,
        }
    }

    pub fn from_record(record: &'a DatabaseRecord) -> Self {
        Self::new(&record.name, &record.id, &record.subnet_ids)
    }

    pub fn stack_name(&self) -> String {
        format!("DatabaseSubnetGroupStack-{}", self.name)
    }

    pub fn subnet_group_name(&self) -> String {
        format!("{}-{}-subnet-group", self.id, self.name)
    }

    pub fn build(&self, env: StackEnvironment) -> IacResult<(Stack, SubnetGroupOutput)> {
        let group_name = self.subnet_group_name();
        let mut stack = Stack::new(self.stack_name(), env)?;

        let group = stack.add_resource(
            &format!("MyDBSubnetGroup-{}", self.name),
            ResourceProperties::DbSubnetGroup(DbSubnetGroupProps {
                db_subnet_group_name: group_name.clone(),
                db_subnet_group_description: format!("{}-{} subnet group", self.id, self.name),
                subnet_ids: self.subnet_ids.to_vec(),
            }),
        )?;
        stack.add_output(
            SUBNET_GROUP_OUTPUT,
            Token::reference(&group),
            Some(format!("Subnet group for {}", self.name)),
        );

        info!(
            "Declared subnet group {} over {} subnet(s)",
            group_name,
            self.subnet_ids.len()
        );

        let output = SubnetGroupOutput {
            stack_name: stack.name().to_string(),
            subnet_group_name: group_name,
        };
        Ok((stack, output))
    }
}

/// Declares a database instance from a [`DatabaseRecord`].
pub struct DatabaseInstanceBuilder<'a> {
    record: &'a DatabaseRecord,
    subnet_group: &'a SubnetGroupOutput,
}

impl<'a> DatabaseInstanceBuilder<'a> {
    pub fn new(record: &'a DatabaseRecord, subnet_group: &'a SubnetGroupOutput) -> Self {
        Self {
            record,
            subnet_group,
        }
    }

    pub fn environment(&self) -> StackEnvironment {
        StackEnvironment::new(&self.record.account, &self.record.region)
    }

    pub fn stack_name(&self) -> String {
        format!("RDSInstanceStack-{}", self.record.name)
    }

    /// Instance class for the engine API, e.g. `t3.micro` → `db.t3.micro`.
    pub fn instance_class(&self) -> String {
        let instance_type = &self.record.instance_type;
        if instance_type.starts_with("db.") {
            instance_type.clone()
        } else {
            format!("db.{}", instance_type)
        }
    }

    pub fn build(
        &self,
        lookup: &dyn ResourceLookup,
        credentials: &dyn CredentialSource,
    ) -> IacResult<Stack> {
        let record = self.record;
        let env = self.environment();

        let engine = DatabaseEngine::from_name(&record.engine);
        let creds = DatabaseCredentials::resolve(
            credentials,
            &record.username_env_var,
            &record.password_env_var,
        )?;
        let vpc = lookup.vpc(&env, &record.vpc_id)?;

        let mut stack = Stack::new(self.stack_name(), env)?
            .with_description(format!("{} database {}", engine, record.name));
        stack.add_dependency(&self.subnet_group.stack_name);

        let security_group = stack.add_resource(
            &format!("SecurityGroup-db-{}", record.name),
            ResourceProperties::SecurityGroup(
                SecurityGroupSpec {
                    group_name: format!("db-{}", record.name),
                    description: format!("Security group for {}", record.name),
                    vpc_id: &vpc.vpc_id,
                    allowed_ports: &record.allowed_ports,
                }
                .into_props(),
            ),
        )?;

        stack.add_resource(
            &format!("DBInstance-{}", record.name),
            ResourceProperties::DbInstance(DbInstanceProps {
                engine: engine.as_str().to_string(),
                db_instance_identifier: record.name.clone(),
                db_instance_class: self.instance_class(),
                allocated_storage: record.storage.to_string(),
                master_username: creds.username.clone(),
                master_user_password: creds.password().to_string(),
                multi_az: record.multi_az,
                port: record.port.to_string(),
                db_subnet_group_name: self.subnet_group.subnet_group_name.clone(),
                vpc_security_groups: vec![Token::attribute(&security_group, "GroupId")],
                ca_certificate_identifier: CA_CERTIFICATE_IDENTIFIER.to_string(),
                publicly_accessible: false,
            }),
        )?;

        info!(
            "Declared {} instance {} ({}, {} GiB, port {}, multi-az {})",
            engine,
            record.name,
            self.instance_class(),
            record.storage,
            record.port,
            record.multi_az
        );
        Ok(stack)
    }
}
