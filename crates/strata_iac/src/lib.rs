//! # strata_iac
//!
//! Resource builders and cloud assembly synthesis for Strata.
//!
//! This crate turns the records of an environment document into stacks of
//! declared cloud resources, collects them into an [`Assembly`] and hands the
//! assembly to a [`ProvisioningEngine`].
//!
//! ## Features
//!
//! - VPC builder with a fixed three-tier subnet layout
//! - Compute builder (instance, role, security group, root volume)
//! - Database subnet group and instance builders with credential indirection
//! - Lookup context for resources that already exist
//! - Assembly writer producing one template per stack and a manifest
//!
//! ## Example
//!
//! ```rust,no_run
//! use strata_iac::{Assembly, AssemblyWriter, LookupContext, Orchestrator, ProcessEnv, ProvisioningEngine};
//! use strata_spec::EnvironmentReader;
//! use std::path::Path;
//!
//! let spec = EnvironmentReader::load(Path::new("environment.yaml")).unwrap();
//! let lookup = LookupContext::load_or_default(Path::new("strata.context.yaml")).unwrap();
//!
//! let mut assembly = Assembly::new();
//! Orchestrator::new(&lookup, &ProcessEnv)
//!     .with_scripts_dir("scripts")
//!     .provision_all(&spec, &mut assembly)
//!     .unwrap();
//!
//! AssemblyWriter::new("strata.out").synthesize(&assembly).unwrap();
//! ```

pub mod assembly;
pub mod compute;
pub mod credentials;
pub mod database;
pub mod engine;
pub mod error;
pub mod lookup;
pub mod network;
pub mod orchestrator;
pub mod resource;
pub mod stack;
pub mod vpc;

pub use assembly::Assembly;
pub use compute::ComputeBuilder;
pub use credentials::{CredentialSource, DatabaseCredentials, ProcessEnv};
pub use database::{
    DatabaseEngine, DatabaseInstanceBuilder, SubnetGroupBuilder, SubnetGroupOutput,
    CA_CERTIFICATE_IDENTIFIER,
};
pub use engine::{
    AssemblyManifest, AssemblyWriter, ManifestEntry, ProvisioningEngine, SynthReport,
    DEFAULT_OUT_DIR, MANIFEST_FILE,
};
pub use error::{ErrorCategory, IacError, IacResult};
pub use lookup::{
    ImageRef, LookupContext, ResourceLookup, SubnetRef, SubnetTier, VpcRef, DEFAULT_CONTEXT_FILE,
};
pub use network::SecurityGroupSpec;
pub use orchestrator::{
    Orchestrator, ProvisionOptions, ProvisionReport, RecordFailure, ResourceFamily,
    DEFAULT_SCRIPTS_DIR,
};
pub use resource::{Resource, ResourceProperties, Token};
pub use stack::{Stack, StackEnvironment};
pub use vpc::{SubnetPlan, VpcBuilder};
