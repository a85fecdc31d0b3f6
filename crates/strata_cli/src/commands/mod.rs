//! CLI command definitions.
//!
//! One subcommand per resource family, plus `all` and `validate`. Every
//! command reads the same environment descriptor and lookup context.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::warn;

use strata_iac::{DEFAULT_CONTEXT_FILE, DEFAULT_OUT_DIR, DEFAULT_SCRIPTS_DIR};
use strata_spec::{
    EnvironmentReader, EnvironmentSpec, EnvironmentValidator, DEFAULT_ENVIRONMENT_FILE,
};

pub mod provision;
pub mod validate;

/// Strata - declarative cloud environment provisioning
#[derive(Parser)]
#[command(name = "strata")]
#[command(version, about = "Strata - declarative cloud environment provisioning")]
#[command(long_about = r#"
Strata reads an environment descriptor (VPCs, compute instances, databases),
declares the matching cloud resources and writes them out as a cloud
assembly: one template per stack plus a manifest.

COMMANDS:
  vpc       → Declare the VPCs of the descriptor
  ec2       → Declare the compute instances of the descriptor
  db        → Declare the database subnet groups and instances
  all       → Declare every family into one assembly
  validate  → Load and validate the descriptor only

EXIT CODES:
  0 - Success
  1 - General error
  2 - Configuration error
  3 - Missing credential
  4 - Resource not found
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Environment descriptor
    #[arg(short, long, global = true, env = "STRATA_CONFIG", default_value = DEFAULT_ENVIRONMENT_FILE)]
    pub config: PathBuf,

    /// Lookup context describing existing resources
    #[arg(long, global = true, env = "STRATA_CONTEXT", default_value = DEFAULT_CONTEXT_FILE)]
    pub context: PathBuf,

    /// Directory user data scripts are read from
    #[arg(long, global = true, default_value = DEFAULT_SCRIPTS_DIR)]
    pub scripts_dir: PathBuf,

    /// Output directory for the synthesized assembly
    #[arg(short, long, global = true, env = "STRATA_OUT", default_value = DEFAULT_OUT_DIR)]
    pub out: PathBuf,

    /// Continue with the remaining records when one fails
    #[arg(long, global = true)]
    pub keep_going: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Declare VPCs
    Vpc,

    /// Declare compute instances
    Ec2,

    /// Declare database subnet groups and instances
    Db,

    /// Declare every resource family
    All,

    /// Validate the environment descriptor
    Validate(validate::ValidateArgs),
}

/// Load the descriptor and run semantic validation.
///
/// Warnings are logged; errors abort before any builder runs.
pub fn load_environment(path: &Path) -> Result<EnvironmentSpec> {
    let spec = EnvironmentReader::load(path)
        .with_context(|| format!("Failed to load environment {:?}", path))?;

    let result = EnvironmentValidator::validate(&spec);
    for warning in &result.warnings {
        warn!("{}", warning);
    }
    result
        .into_result()
        .with_context(|| format!("Environment {:?} is invalid", path))?;

    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use strata_spec::SpecError;
    use tempfile::tempdir;

    const VALID: &str = r#"
vpc:
  - name: platform
    region: eu-central-1
    account: 123456789012
    cidr: 10.40.0.0/16
"#;

    #[test]
    fn test_load_environment_valid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_ENVIRONMENT_FILE);
        fs::write(&path, VALID).unwrap();

        let spec = load_environment(&path).unwrap();
        assert_eq!(spec.vpc.len(), 1);
    }

    #[test]
    fn test_load_environment_rejects_invalid_descriptor() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_ENVIRONMENT_FILE);
        fs::write(&path, VALID.replace("10.40.0.0/16", "10.40.0.5/16")).unwrap();

        let err = load_environment(&path).unwrap_err();
        let cause = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<SpecError>())
            .unwrap();
        assert!(matches!(cause, SpecError::ValidationFailed(msg) if msg.contains("host bits")));
    }

    #[test]
    fn test_load_environment_missing_file() {
        let dir = tempdir().unwrap();
        let err = load_environment(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(err
            .chain()
            .any(|cause| matches!(cause.downcast_ref::<SpecError>(), Some(SpecError::NotFound(_)))));
    }
}
