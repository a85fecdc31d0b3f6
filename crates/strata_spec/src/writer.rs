//! Environment descriptor writing utilities.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::SpecResult;
use crate::models::EnvironmentSpec;

/// Writer for environment descriptors.
pub struct EnvironmentWriter;

impl EnvironmentWriter {
    /// Serialize a spec to YAML in the same shape the reader accepts.
    pub fn to_string(spec: &EnvironmentSpec) -> SpecResult<String> {
        Ok(serde_yaml::to_string(spec)?)
    }

    /// Write a spec to disk.
    pub fn write(path: impl AsRef<Path>, spec: &EnvironmentSpec) -> SpecResult<()> {
        let path = path.as_ref();
        debug!("Writing environment to {:?}", path);

        let content = Self::to_string(spec)?;
        fs::write(path, content)?;
        Ok(())
    }
}
