//! Validate command - Load and validate the environment descriptor.

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use strata_spec::{EnvironmentReader, EnvironmentValidator};

use super::GlobalArgs;

#[derive(Args)]
pub struct ValidateArgs {
    /// Treat warnings as errors
    #[arg(long)]
    strict: bool,
}

pub fn execute(global: &GlobalArgs, args: ValidateArgs) -> Result<()> {
    info!("Validating environment: {:?}", global.config);

    let spec = EnvironmentReader::load(&global.config)
        .with_context(|| format!("Failed to load environment {:?}", global.config))?;

    println!("📋 Validating {:?}...", global.config);
    println!(
        "   {} vpc, {} ec2, {} db record(s)",
        spec.vpc.len(),
        spec.ec2.len(),
        spec.db.len()
    );

    let mut result = EnvironmentValidator::validate(&spec);
    if args.strict {
        for warning in std::mem::take(&mut result.warnings) {
            result.add_error(format!("{} (strict)", warning));
        }
    }

    for warning in &result.warnings {
        println!("   ⚠️  {}", warning);
    }

    if result.valid {
        println!("   ✅ Environment is valid");
        return Ok(());
    }

    println!("   ❌ Validation failed:");
    for error in &result.errors {
        println!("      - {}", error);
    }
    result
        .into_result()
        .map(|_| ())
        .with_context(|| format!("Environment {:?} is invalid", global.config))
}
