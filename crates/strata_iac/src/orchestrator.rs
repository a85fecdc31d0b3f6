//! Drives the builders over an environment document.
//!
//! One entry point per resource family. Records are processed in document
//! order and the stacks of a record are registered with the assembly as one
//! batch, so a record either contributes all of its stacks or none.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use strata_spec::{ComputeRecord, DatabaseRecord, EnvironmentSpec, VpcRecord};

use crate::assembly::Assembly;
use crate::compute::ComputeBuilder;
use crate::credentials::CredentialSource;
use crate::database::{DatabaseInstanceBuilder, SubnetGroupBuilder};
use crate::error::{IacError, IacResult};
use crate::lookup::ResourceLookup;
use crate::stack::{Stack, StackEnvironment};
use crate::vpc::VpcBuilder;

/// Default directory user data scripts are read from.
pub const DEFAULT_SCRIPTS_DIR: &str = "scripts";

/// The resource families of an environment document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceFamily {
    Vpc,
    Compute,
    Database,
}

impl ResourceFamily {
    /// All families, in the order `all` provisions them.
    pub fn all() -> [ResourceFamily; 3] {
        [
            ResourceFamily::Vpc,
            ResourceFamily::Compute,
            ResourceFamily::Database,
        ]
    }

    /// Document key of the family.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceFamily::Vpc => "vpc",
            ResourceFamily::Compute => "ec2",
            ResourceFamily::Database => "db",
        }
    }
}

impl fmt::Display for ResourceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Options for a provisioning run.
#[derive(Debug, Clone)]
pub struct ProvisionOptions {
    pub scripts_dir: PathBuf,
    /// Collect record failures instead of aborting on the first one.
    pub keep_going: bool,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            scripts_dir: PathBuf::from(DEFAULT_SCRIPTS_DIR),
            keep_going: false,
        }
    }
}

/// A record that could not be provisioned.
#[derive(Debug)]
pub struct RecordFailure {
    pub family: ResourceFamily,
    pub record: String,
    pub error: IacError,
}

/// Outcome of a provisioning run.
#[derive(Debug, Default)]
pub struct ProvisionReport {
    /// Stacks registered, in registration order.
    pub declared: Vec<String>,
    /// Only populated when `keep_going` is set.
    pub failures: Vec<RecordFailure>,
}

impl ProvisionReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn merge(&mut self, other: ProvisionReport) {
        self.declared.extend(other.declared);
        self.failures.extend(other.failures);
    }
}

/// Runs the builders of each family against a shared assembly.
pub struct Orchestrator<'a> {
    lookup: &'a dyn ResourceLookup,
    credentials: &'a dyn CredentialSource,
    options: ProvisionOptions,
}

impl<'a> Orchestrator<'a> {
    pub fn new(lookup: &'a dyn ResourceLookup, credentials: &'a dyn CredentialSource) -> Self {
        Self {
            lookup,
            credentials,
            options: ProvisionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ProvisionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_scripts_dir(mut self, scripts_dir: impl Into<PathBuf>) -> Self {
        self.options.scripts_dir = scripts_dir.into();
        self
    }

    pub fn with_keep_going(mut self, keep_going: bool) -> Self {
        self.options.keep_going = keep_going;
        self
    }

    pub fn options(&self) -> &ProvisionOptions {
        &self.options
    }

    /// Provision one family.
    pub fn provision(
        &self,
        spec: &EnvironmentSpec,
        family: ResourceFamily,
        assembly: &mut Assembly,
    ) -> IacResult<ProvisionReport> {
        match family {
            ResourceFamily::Vpc => self.provision_vpcs(&spec.vpc, assembly),
            ResourceFamily::Compute => self.provision_compute(&spec.ec2, assembly),
            ResourceFamily::Database => self.provision_databases(&spec.db, assembly),
        }
    }

    /// Provision every family into the same assembly.
    pub fn provision_all(
        &self,
        spec: &EnvironmentSpec,
        assembly: &mut Assembly,
    ) -> IacResult<ProvisionReport> {
        let mut report = ProvisionReport::default();
        for family in ResourceFamily::all() {
            report.merge(self.provision(spec, family, assembly)?);
        }
        Ok(report)
    }

    pub fn provision_vpcs(
        &self,
        records: &[VpcRecord],
        assembly: &mut Assembly,
    ) -> IacResult<ProvisionReport> {
        self.run(
            ResourceFamily::Vpc,
            records,
            |record| record.name.as_str(),
            |record| {
                let builder = VpcBuilder::new(record);
                let zones = self.lookup.availability_zones(&builder.environment());
                Ok(vec![builder.build(&zones)?])
            },
            assembly,
        )
    }

    pub fn provision_compute(
        &self,
        records: &[ComputeRecord],
        assembly: &mut Assembly,
    ) -> IacResult<ProvisionReport> {
        self.run(
            ResourceFamily::Compute,
            records,
            |record| record.name.as_str(),
            |record| {
                let user_data = self.read_script(&record.user_data_script)?;
                let stack = ComputeBuilder::new(record, &user_data).build(self.lookup)?;
                Ok(vec![stack])
            },
            assembly,
        )
    }

    pub fn provision_databases(
        &self,
        records: &[DatabaseRecord],
        assembly: &mut Assembly,
    ) -> IacResult<ProvisionReport> {
        self.run(
            ResourceFamily::Database,
            records,
            |record| record.name.as_str(),
            |record| {
                let env = StackEnvironment::new(&record.account, &record.region);
                let (group_stack, group) = SubnetGroupBuilder::from_record(record).build(env)?;
                let instance_stack = DatabaseInstanceBuilder::new(record, &group)
                    .build(self.lookup, self.credentials)?;
                Ok(vec![group_stack, instance_stack])
            },
            assembly,
        )
    }

    /// Read a user data script from the scripts directory.
    pub fn read_script(&self, script: &str) -> IacResult<String> {
        read_script(&self.options.scripts_dir, script)
    }

    fn run<T, N, B>(
        &self,
        family: ResourceFamily,
        records: &[T],
        name: N,
        build: B,
        assembly: &mut Assembly,
    ) -> IacResult<ProvisionReport>
    where
        N: Fn(&T) -> &str,
        B: Fn(&T) -> IacResult<Vec<Stack>>,
    {
        info!("Provisioning {} {} record(s)", records.len(), family);
        let mut report = ProvisionReport::default();

        for record in records {
            let record_name = name(record);
            let outcome = build(record).and_then(|stacks| {
                let names: Vec<String> = stacks.iter().map(|s| s.name().to_string()).collect();
                assembly.add_stacks(stacks)?;
                Ok(names)
            });

            match outcome {
                Ok(names) => report.declared.extend(names),
                Err(error) if self.options.keep_going => {
                    warn!("Skipping {} record {}: {}", family, record_name, error);
                    report.failures.push(RecordFailure {
                        family,
                        record: record_name.to_string(),
                        error,
                    });
                }
                Err(error) => return Err(error),
            }
        }

        Ok(report)
    }
}

fn read_script(scripts_dir: &Path, script: &str) -> IacResult<String> {
    let path = scripts_dir.join(script);
    fs::read_to_string(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => IacError::ScriptNotFound(path),
        _ => IacError::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use tempfile::tempdir;

    use crate::lookup::{ImageRef, LookupContext, SubnetRef, SubnetTier, VpcRef};
    use strata_spec::EnvironmentReader;

    const SPEC: &str = r#"
vpc:
  - name: core
    region: eu-west-1
    account: "111122223333"
    cidr: 10.0.0.0/16
ec2:
  - name: web
    env_name: dev
    region: eu-west-1
    account: "111122223333"
    type: t3.small
    ami: ubuntu-22.04
    device_name: /dev/sda1
    key_name: ops
    vpc_id: vpc-0abc
    is_public: true
    script: web.sh
    allowed_ports:
      - rule1:
          - port: 22
            ip: any
db:
  - name: orders
    id: shop
    subnet_ids: [subnet-a, subnet-b]
    account: "111122223333"
    region: eu-west-1
    engine: postgres
    instance_type: t3.medium
    storage: 20
    username: DB_USER
    password: DB_PASS
    vpc_id: vpc-0abc
    allowed_ports: []
    multi_az: false
    port: 5432
  - name: billing
    id: shop
    subnet_ids: [subnet-a]
    account: "111122223333"
    region: eu-west-1
    engine: mysql
    instance_type: t3.small
    storage: 20
    username: BILLING_USER
    password: BILLING_PASS
    vpc_id: vpc-0abc
    allowed_ports: []
    multi_az: false
    port: 3306
"#;

    fn lookup() -> LookupContext {
        LookupContext::new()
            .with_availability_zones("eu-west-1", ["eu-west-1a", "eu-west-1b"])
            .with_vpc(VpcRef {
                vpc_id: "vpc-0abc".to_string(),
                region: "eu-west-1".to_string(),
                subnets: vec![SubnetRef {
                    subnet_id: "subnet-public-a".to_string(),
                    availability_zone: "eu-west-1a".to_string(),
                    tier: SubnetTier::Public,
                }],
            })
            .with_image(ImageRef {
                name: "ubuntu-22.04".to_string(),
                region: "eu-west-1".to_string(),
                image_id: "ami-0123".to_string(),
            })
    }

    fn credentials() -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("DB_USER".to_string(), "admin".to_string());
        vars.insert("DB_PASS".to_string(), "secret".to_string());
        vars
    }

    #[test]
    fn test_family_keys() {
        let keys: Vec<&str> = ResourceFamily::all().iter().map(|f| f.as_str()).collect();
        assert_eq!(keys, vec!["vpc", "ec2", "db"]);
    }

    #[test]
    fn test_provision_vpcs() {
        let spec = EnvironmentReader::from_str(SPEC).unwrap();
        let lookup = lookup();
        let credentials = credentials();
        let mut assembly = Assembly::new();

        let report = Orchestrator::new(&lookup, &credentials)
            .provision(&spec, ResourceFamily::Vpc, &mut assembly)
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.declared, vec!["network-vpc-core-eu-west-1"]);
        assert_eq!(assembly.len(), 1);
    }

    #[test]
    fn test_missing_script() {
        let spec = EnvironmentReader::from_str(SPEC).unwrap();
        let scripts = tempdir().unwrap();
        let lookup = lookup();
        let credentials = credentials();
        let mut assembly = Assembly::new();

        let err = Orchestrator::new(&lookup, &credentials)
            .with_scripts_dir(scripts.path())
            .provision(&spec, ResourceFamily::Compute, &mut assembly)
            .unwrap_err();

        assert!(matches!(err, IacError::ScriptNotFound(_)));
        assert!(assembly.is_empty());
    }

    #[test]
    fn test_compute_reads_script() {
        let spec = EnvironmentReader::from_str(SPEC).unwrap();
        let scripts = tempdir().unwrap();
        fs::write(scripts.path().join("web.sh"), "#!/bin/bash\n").unwrap();
        let lookup = lookup();
        let credentials = credentials();
        let mut assembly = Assembly::new();

        let report = Orchestrator::new(&lookup, &credentials)
            .with_scripts_dir(scripts.path())
            .provision(&spec, ResourceFamily::Compute, &mut assembly)
            .unwrap();

        assert_eq!(report.declared, vec!["ec2-web-dev-eu-west-1"]);
    }

    #[test]
    fn test_fail_fast_stops_at_first_record() {
        let spec = EnvironmentReader::from_str(SPEC).unwrap();
        let lookup = lookup();
        let credentials = credentials();
        let mut assembly = Assembly::new();

        // orders succeeds, billing has no credentials
        let err = Orchestrator::new(&lookup, &credentials)
            .provision(&spec, ResourceFamily::Database, &mut assembly)
            .unwrap_err();

        assert!(matches!(err, IacError::MissingCredential { .. }));
        assert_eq!(
            assembly.stack_names(),
            vec!["DatabaseSubnetGroupStack-orders", "RDSInstanceStack-orders"]
        );
    }

    #[test]
    fn test_keep_going_collects_failures() {
        let spec = EnvironmentReader::from_str(SPEC).unwrap();
        let lookup = lookup();
        let credentials = credentials();
        let mut assembly = Assembly::new();

        let report = Orchestrator::new(&lookup, &credentials)
            .with_keep_going(true)
            .provision(&spec, ResourceFamily::Database, &mut assembly)
            .unwrap();

        assert!(!report.is_success());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].record, "billing");
        assert_eq!(report.failures[0].family, ResourceFamily::Database);
        // the failed record leaves no subnet group stack behind
        assert!(assembly.stack("DatabaseSubnetGroupStack-billing").is_none());
        assert_eq!(assembly.len(), 2);
    }
}
