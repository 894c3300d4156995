//! gantry.toml configuration parsing, env overrides, and validation.
//!
//! Project id and region are read once at startup and treated as immutable
//! inputs from then on. Validation fails fast, before any resource is
//! declared.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Region used when neither the config file nor the environment sets one.
pub const DEFAULT_REGION: &str = "asia-northeast1";

/// Service name prefix used for every resource the stack declares.
pub const DEFAULT_SERVICE_NAME: &str = "mcp-on-cloudrun";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("project id must not be empty (set [stack].project or GANTRY_PROJECT)")]
    MissingProject,

    #[error("service name must not be empty")]
    MissingServiceName,
}

/// Top-level gantry.toml document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub stack: StackConfig,
}

/// Stack configuration: project context plus the local inputs the
/// components read (build context, OpenAPI template).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    /// GCP project id. Required (validated non-empty).
    #[serde(default)]
    pub project: String,
    /// Deployment region. Defaults to `asia-northeast1` when unset.
    #[serde(default = "default_region")]
    pub region: String,
    /// Name prefix for every declared resource.
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Container build context directory.
    #[serde(default = "default_build_context")]
    pub build_context: String,
    /// OpenAPI template with `${cloud_run_url}` placeholders.
    #[serde(default = "default_template")]
    pub openapi_template: String,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_service_name() -> String {
    DEFAULT_SERVICE_NAME.to_string()
}

fn default_build_context() -> String {
    "./server".to_string()
}

fn default_template() -> String {
    "openapi.yaml".to_string()
}

impl Default for StackConfig {
    fn default() -> Self {
        StackConfig {
            project: String::new(),
            region: default_region(),
            service_name: default_service_name(),
            build_context: default_build_context(),
            openapi_template: default_template(),
        }
    }
}

impl StackConfig {
    /// Load from a gantry.toml file, then apply environment overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let file: ConfigFile = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = file.stack;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Build from environment variables alone (no config file present).
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = StackConfig::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// `GANTRY_PROJECT` and `GANTRY_REGION` override the file values.
    fn apply_env_overrides(&mut self) {
        if let Ok(project) = std::env::var("GANTRY_PROJECT") {
            debug!(%project, "project overridden from environment");
            self.project = project;
        }
        if let Ok(region) = std::env::var("GANTRY_REGION") {
            debug!(%region, "region overridden from environment");
            self.region = region;
        }
        if self.region.is_empty() {
            self.region = default_region();
        }
    }

    /// Fail fast on inputs that would otherwise surface as a half-applied
    /// stack: empty project id, empty service name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project.is_empty() {
            return Err(ConfigError::MissingProject);
        }
        if self.service_name.is_empty() {
            return Err(ConfigError::MissingServiceName);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_minimal() {
        let toml_str = r#"
[stack]
project = "demo-proj"
"#;
        let file: ConfigFile = toml::from_str(toml_str).unwrap();
        assert_eq!(file.stack.project, "demo-proj");
        assert_eq!(file.stack.region, DEFAULT_REGION);
        assert_eq!(file.stack.service_name, DEFAULT_SERVICE_NAME);
    }

    #[test]
    fn region_defaults_when_unset() {
        let config = StackConfig {
            project: "demo-proj".into(),
            ..StackConfig::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.region, "asia-northeast1");
    }

    #[test]
    fn empty_project_rejected() {
        let config = StackConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingProject)
        ));
    }

    #[test]
    fn from_file_round_trip() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
[stack]
project = "demo-proj"
region = "us-central1"
build_context = "../../mcp-server"
"#
        )
        .unwrap();
        let config = StackConfig::from_file(f.path()).unwrap();
        assert_eq!(config.project, "demo-proj");
        assert_eq!(config.region, "us-central1");
        assert_eq!(config.build_context, "../../mcp-server");
    }
}
