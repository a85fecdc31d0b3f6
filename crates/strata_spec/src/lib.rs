//! # strata_spec
//!
//! Environment descriptor models, loading and validation for Strata.
//!
//! An environment descriptor is a single YAML document with three optional
//! top-level lists:
//!
//! - `vpc`: networks to create
//! - `ec2`: compute instances to place in existing networks
//! - `db`: database instances and their subnet groups
//!
//! ## Example
//!
//! ```rust,no_run
//! use strata_spec::{EnvironmentReader, EnvironmentValidator};
//!
//! let spec = EnvironmentReader::load("environment.yaml").unwrap();
//!
//! let result = EnvironmentValidator::validate(&spec);
//! if !result.valid {
//!     for error in &result.errors {
//!         eprintln!("Error: {}", error);
//!     }
//! }
//! ```

pub mod error;
pub mod models;
pub mod reader;
pub mod validator;
pub mod writer;

pub use error::{SpecError, SpecResult};
pub use models::*;
pub use reader::{EnvironmentReader, DEFAULT_ENVIRONMENT_FILE};
pub use validator::{EnvironmentValidator, ValidationResult, KNOWN_ENGINES, SUBNET_PREFIX};
pub use writer::EnvironmentWriter;
