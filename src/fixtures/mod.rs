//! Fixtures

use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use thiserror::Error;

use crate::{fixtures::instances::InstanceFixture, instance::Instance};

pub mod instances;

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Instance data failed validation
    #[error(transparent)]
    Instance(#[from] crate::instance::InstanceError),

    /// Format name not recognised
    #[error("Unknown instance format: {0} (expected `text` or `yaml`)")]
    UnknownFormat(String),
}

/// Instance file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceFormat {
    /// Whitespace-delimited text
    Text,

    /// YAML fixture
    Yaml,
}

impl InstanceFormat {
    /// Guess the format from a file extension: `.yml` and `.yaml` are YAML,
    /// anything else is text.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml") => {
                InstanceFormat::Yaml
            }
            _ => InstanceFormat::Text,
        }
    }
}

impl FromStr for InstanceFormat {
    type Err = FixtureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(InstanceFormat::Text),
            "yaml" | "yml" => Ok(InstanceFormat::Yaml),
            _ => Err(FixtureError::UnknownFormat(s.to_string())),
        }
    }
}

/// Fixture
#[derive(Debug, Clone)]
pub struct Fixture {
    /// Base path for fixture files
    base_path: PathBuf,
}

impl Fixture {
    /// Create a new fixture loader with default base path
    pub fn new() -> Self {
        Self::with_base_path("./fixtures")
    }

    /// Create a new fixture loader with custom base path
    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Load an instance from `<base>/instances/<name>.yml`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn instance(&self, name: &str) -> Result<Instance, FixtureError> {
        let file_path = self
            .base_path
            .join("instances")
            .join(format!("{name}.yml"));

        Self::load_path(&file_path, InstanceFormat::Yaml)
    }

    /// Load an instance from `<base>/instances/<name>.txt`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn text_instance(&self, name: &str) -> Result<Instance, FixtureError> {
        let file_path = self
            .base_path
            .join("instances")
            .join(format!("{name}.txt"));

        Self::load_path(&file_path, InstanceFormat::Text)
    }

    /// Load an instance from any path in the given format.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load_path(path: &Path, format: InstanceFormat) -> Result<Instance, FixtureError> {
        let contents = fs::read_to_string(path)?;

        match format {
            InstanceFormat::Text => Ok(Instance::parse(&contents)?),
            InstanceFormat::Yaml => parse_yaml(&contents),
        }
    }

    /// Base path fixtures are read from
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse an instance from YAML.
///
/// # Errors
///
/// Returns an error if the YAML is malformed or the instance fails validation.
pub fn parse_yaml(contents: &str) -> Result<Instance, FixtureError> {
    let fixture: InstanceFixture = serde_norway::from_str(contents)?;

    Instance::try_from(fixture)
}
