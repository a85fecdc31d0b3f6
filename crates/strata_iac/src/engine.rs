//! Provisioning engine boundary and the on-disk assembly writer.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::assembly::Assembly;
use crate::error::IacResult;

/// Default output directory for synthesized assemblies.
pub const DEFAULT_OUT_DIR: &str = "strata.out";

/// Manifest file name inside the output directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Suffix of every synthesized template.
pub const TEMPLATE_SUFFIX: &str = ".template.json";

/// Manifest format version.
pub const MANIFEST_VERSION: &str = "1.0";

/// Receives a finished assembly.
pub trait ProvisioningEngine {
    fn synthesize(&self, assembly: &Assembly) -> IacResult<SynthReport>;
}

/// Files produced by a synthesis run.
#[derive(Debug, Clone)]
pub struct SynthReport {
    pub out_dir: PathBuf,
    pub templates: Vec<PathBuf>,
    pub manifest: PathBuf,
}

/// Index of the synthesized stacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyManifest {
    pub version: String,
    pub generated_at: DateTime<Utc>,
    pub stacks: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    /// `aws://{account}/{region}`
    pub environment: String,
    /// Template file name relative to the output directory.
    pub template: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

impl AssemblyManifest {
    pub fn from_assembly(assembly: &Assembly) -> Self {
        let stacks = assembly
            .stacks()
            .iter()
            .map(|stack| ManifestEntry {
                name: stack.name().to_string(),
                environment: stack.environment().to_string(),
                template: template_file_name(stack.name()),
                dependencies: stack.dependencies().to_vec(),
            })
            .collect();

        Self {
            version: MANIFEST_VERSION.to_string(),
            generated_at: Utc::now(),
            stacks,
        }
    }

    /// Load a manifest written by [`AssemblyWriter`].
    pub fn from_file(path: &Path) -> IacResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

pub fn template_file_name(stack_name: &str) -> String {
    format!("{}{}", stack_name, TEMPLATE_SUFFIX)
}

/// Writes one template per stack plus a manifest into a directory.
#[derive(Debug, Clone)]
pub struct AssemblyWriter {
    out_dir: PathBuf,
}

impl AssemblyWriter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Remove templates left over from a previous run.
    fn clear_stale(&self) -> IacResult<()> {
        for entry in fs::read_dir(&self.out_dir)? {
            let path = entry?.path();
            let is_template = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(TEMPLATE_SUFFIX));
            if is_template {
                debug!("Removing stale template {:?}", path);
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

impl Default for AssemblyWriter {
    fn default() -> Self {
        Self::new(DEFAULT_OUT_DIR)
    }
}

impl ProvisioningEngine for AssemblyWriter {
    fn synthesize(&self, assembly: &Assembly) -> IacResult<SynthReport> {
        // Render everything first so a bad reference leaves the directory untouched.
        let rendered = assembly
            .stacks()
            .iter()
            .map(|stack| -> IacResult<(&str, String)> {
                let template = stack.to_template()?;
                Ok((stack.name(), serde_json::to_string_pretty(&template)?))
            })
            .collect::<IacResult<Vec<_>>>()?;

        fs::create_dir_all(&self.out_dir)?;
        self.clear_stale()?;

        let mut templates = Vec::with_capacity(rendered.len());
        for (name, body) in rendered {
            let path = self.out_dir.join(template_file_name(name));
            fs::write(&path, body)?;
            debug!("Wrote template {:?}", path);
            templates.push(path);
        }

        let manifest = AssemblyManifest::from_assembly(assembly);
        let manifest_path = self.out_dir.join(MANIFEST_FILE);
        fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)?;

        info!(
            "Synthesized {} stack(s) into {:?}",
            templates.len(),
            self.out_dir
        );

        Ok(SynthReport {
            out_dir: self.out_dir.clone(),
            templates,
            manifest: manifest_path,
        })
    }
}
