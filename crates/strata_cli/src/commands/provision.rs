//! Provision commands - Declare resources and synthesize the assembly.

use anyhow::{Context, Result};
use tracing::info;

use strata_iac::{
    Assembly, AssemblyWriter, LookupContext, Orchestrator, ProcessEnv, ProvisionOptions,
    ProvisionReport, ProvisioningEngine, ResourceFamily,
};

use super::{load_environment, GlobalArgs};

pub fn execute(global: &GlobalArgs, families: &[ResourceFamily]) -> Result<()> {
    let spec = load_environment(&global.config)?;
    let lookup = LookupContext::load_or_default(&global.context)
        .with_context(|| format!("Failed to load lookup context {:?}", global.context))?;

    let orchestrator = Orchestrator::new(&lookup, &ProcessEnv).with_options(ProvisionOptions {
        scripts_dir: global.scripts_dir.clone(),
        keep_going: global.keep_going,
    });

    let mut assembly = Assembly::new();
    let mut report = ProvisionReport::default();
    for family in families {
        info!("Provisioning {} records", family);
        let family_report = orchestrator
            .provision(&spec, *family, &mut assembly)
            .with_context(|| format!("Failed to provision {} records", family))?;
        report.merge(family_report);
    }

    let synth = AssemblyWriter::new(&global.out)
        .synthesize(&assembly)
        .context("Failed to synthesize assembly")?;

    if !global.quiet {
        println!("✅ Synthesized {} stack(s) into {:?}", synth.templates.len(), synth.out_dir);
        for name in &report.declared {
            println!("   - {}", name);
        }
    }

    if report.is_success() {
        return Ok(());
    }

    let failed = report.failures.len();
    println!();
    println!("❌ {} record(s) failed:", failed);
    for failure in &report.failures {
        println!("   - {} {}: {}", failure.family, failure.record, failure.error);
    }

    // The first failure decides the exit code.
    let first = report.failures.remove(0);
    Err(anyhow::Error::new(first.error).context(format!(
        "{} record(s) could not be provisioned, first was {} {}",
        failed, first.family, first.record
    )))
}
