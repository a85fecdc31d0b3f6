//! Environment descriptor loading.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{SpecError, SpecResult};
use crate::models::EnvironmentSpec;

/// Default descriptor file name, resolved against the working directory.
pub const DEFAULT_ENVIRONMENT_FILE: &str = "environment.yaml";

/// Reader for environment descriptors.
pub struct EnvironmentReader;

impl EnvironmentReader {
    /// Load and parse a descriptor from disk.
    ///
    /// Either the whole document parses or an error is returned; there is
    /// no partially loaded spec.
    pub fn load(path: impl AsRef<Path>) -> SpecResult<EnvironmentSpec> {
        let path = path.as_ref();
        debug!("Reading environment from {:?}", path);

        if !path.exists() {
            return Err(SpecError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let spec = Self::parse(&content).map_err(|e| SpecError::InvalidFormat {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        info!(
            "Loaded environment from {:?}: {} vpc, {} ec2, {} db record(s)",
            path,
            spec.vpc.len(),
            spec.ec2.len(),
            spec.db.len()
        );
        Ok(spec)
    }

    /// Parse a descriptor from YAML text.
    pub fn from_str(content: &str) -> SpecResult<EnvironmentSpec> {
        Ok(Self::parse(content)?)
    }

    fn parse(content: &str) -> Result<EnvironmentSpec, serde_yaml::Error> {
        // An empty document is an environment with nothing to provision.
        if content.trim().is_empty() {
            return Ok(EnvironmentSpec::default());
        }
        serde_yaml::from_str(content)
    }
}
