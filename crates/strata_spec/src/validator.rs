//! Semantic validation of environment descriptors.
//!
//! Parsing already guarantees the document shape (required fields, ingress
//! rule layout, integer coercion). The checks here catch values that parse
//! fine but could never provision.

use std::collections::HashSet;

use ipnetwork::Ipv4Network;

use crate::error::{SpecError, SpecResult};
use crate::models::{ComputeRecord, DatabaseRecord, EnvironmentSpec, IngressRule, IpSource, VpcRecord};

/// Database engine names with a dedicated mapping.
pub const KNOWN_ENGINES: &[&str] = &["postgres", "mysql"];

/// Largest prefix a VPC block may have; every subnet tier is a /24.
pub const SUBNET_PREFIX: u8 = 24;

/// Validation result with details.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn merge(&mut self, other: ValidationResult) {
        if !other.valid {
            self.valid = false;
        }
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Convert into an error when any check failed.
    pub fn into_result(self) -> SpecResult<Self> {
        if self.valid {
            Ok(self)
        } else {
            Err(SpecError::ValidationFailed(self.errors.join("; ")))
        }
    }
}

/// Validator for environment descriptors.
pub struct EnvironmentValidator;

impl EnvironmentValidator {
    /// Validate every record of every family.
    pub fn validate(spec: &EnvironmentSpec) -> ValidationResult {
        let mut result = ValidationResult::new();

        for record in &spec.vpc {
            result.merge(Self::validate_vpc(record));
        }
        for record in &spec.ec2 {
            result.merge(Self::validate_compute(record));
        }
        for record in &spec.db {
            result.merge(Self::validate_database(record));
        }

        // Keyed on what the stack names are built from.
        result.merge(Self::validate_unique_names(
            "vpc",
            spec.vpc
                .iter()
                .map(|r| format!("'{}' in region {}", r.name, r.region)),
        ));
        result.merge(Self::validate_unique_names(
            "ec2",
            spec.ec2
                .iter()
                .map(|r| format!("'{}' ({}) in region {}", r.name, r.env_name, r.region)),
        ));
        result.merge(Self::validate_unique_names(
            "db",
            spec.db.iter().map(|r| format!("'{}'", r.name)),
        ));

        result
    }

    /// Validate a VPC record.
    pub fn validate_vpc(record: &VpcRecord) -> ValidationResult {
        let mut result = ValidationResult::new();
        let label = format!("vpc '{}'", record.name);

        Self::require(&mut result, &label, "name", &record.name);
        Self::require(&mut result, &label, "region", &record.region);
        Self::require(&mut result, &label, "account", &record.account);

        match record.cidr.parse::<Ipv4Network>() {
            Ok(network) if network.prefix() > SUBNET_PREFIX => {
                result.add_error(format!(
                    "{} cidr {} is smaller than a single /{} subnet",
                    label, record.cidr, SUBNET_PREFIX
                ));
            }
            Ok(network) if network.ip() != network.network() => {
                result.add_error(format!(
                    "{} cidr {} has host bits set (network is {}/{})",
                    label,
                    record.cidr,
                    network.network(),
                    network.prefix()
                ));
            }
            Ok(network) if network.prefix() > 20 => {
                result.add_warning(format!(
                    "{} cidr {} may not fit three /{} tiers across three zones",
                    label, record.cidr, SUBNET_PREFIX
                ));
            }
            Ok(_) => {}
            Err(e) => {
                result.add_error(format!("{} has invalid cidr '{}': {}", label, record.cidr, e));
            }
        }

        result
    }

    /// Validate a compute record.
    pub fn validate_compute(record: &ComputeRecord) -> ValidationResult {
        let mut result = ValidationResult::new();
        let label = format!("ec2 '{}'", record.name);

        Self::require(&mut result, &label, "name", &record.name);
        Self::require(&mut result, &label, "env_name", &record.env_name);
        Self::require(&mut result, &label, "region", &record.region);
        Self::require(&mut result, &label, "account", &record.account);
        Self::require(&mut result, &label, "type", &record.instance_type);
        Self::require(&mut result, &label, "ami", &record.ami_name);
        Self::require(&mut result, &label, "device_name", &record.device_name);
        Self::require(&mut result, &label, "key_name", &record.key_name);
        Self::require(&mut result, &label, "vpc_id", &record.vpc_id);
        Self::require(&mut result, &label, "script", &record.user_data_script);

        result.merge(Self::validate_rules(&label, &record.allowed_ports));
        result
    }

    /// Validate a database record.
    pub fn validate_database(record: &DatabaseRecord) -> ValidationResult {
        let mut result = ValidationResult::new();
        let label = format!("db '{}'", record.name);

        Self::require(&mut result, &label, "name", &record.name);
        Self::require(&mut result, &label, "id", &record.id);
        Self::require(&mut result, &label, "region", &record.region);
        Self::require(&mut result, &label, "account", &record.account);
        Self::require(&mut result, &label, "instance_type", &record.instance_type);
        Self::require(&mut result, &label, "username", &record.username_env_var);
        Self::require(&mut result, &label, "password", &record.password_env_var);
        Self::require(&mut result, &label, "vpc_id", &record.vpc_id);

        if record.storage == 0 {
            result.add_error(format!("{} storage must be greater than zero", label));
        }
        if record.port == 0 {
            result.add_error(format!("{} port must be greater than zero", label));
        }
        if record.subnet_ids.is_empty() {
            result.add_warning(format!("{} has no subnet_ids; the subnet group will be empty", label));
        }
        if !KNOWN_ENGINES.contains(&record.engine.as_str()) {
            result.add_warning(format!(
                "{} engine '{}' is not recognized and will fall back to mysql",
                label, record.engine
            ));
        }

        result.merge(Self::validate_rules(&label, &record.allowed_ports));
        result
    }

    /// Validate ingress rules of one record.
    pub fn validate_rules(label: &str, rules: &[IngressRule]) -> ValidationResult {
        let mut result = ValidationResult::new();

        for rule in rules {
            if rule.port == 0 {
                result.add_error(format!("{} rule '{}' has port 0", label, rule.name));
            }
            if let IpSource::Cidr(cidr) = &rule.source {
                if let Err(e) = cidr.parse::<Ipv4Network>() {
                    result.add_error(format!(
                        "{} rule '{}' has invalid source '{}': {}",
                        label, rule.name, cidr, e
                    ));
                }
            }
        }

        result
    }

    fn validate_unique_names(
        family: &str,
        keys: impl Iterator<Item = String>,
    ) -> ValidationResult {
        let mut result = ValidationResult::new();
        let mut seen = HashSet::new();

        for key in keys {
            if seen.contains(&key) {
                result.add_error(format!("duplicate {} record {}", family, key));
            } else {
                seen.insert(key);
            }
        }

        result
    }

    fn require(result: &mut ValidationResult, label: &str, field: &str, value: &str) {
        if value.trim().is_empty() {
            result.add_error(format!("{} has empty {}", label, field));
        }
    }
}
