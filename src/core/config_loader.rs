//! Configuration file loader for repo-publisher
//!
//! Reads the optional YAML configuration file and expands `${VAR}`
//! references from the environment before parsing.

use super::config::PublishConfig;
use crate::core::error::{PublishError, Result};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::fs;
use tracing::debug;

/// Configuration file looked up in the working directory
pub const CONFIG_FILENAME: &str = ".repo-publish.yaml";

/// Environment variable pattern (${VAR_NAME})
static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid pattern"));

/// Configuration load options
#[derive(Debug, Clone, Default)]
pub struct ConfigLoadOptions {
    /// Explicit configuration file; must exist when given
    pub config_path: Option<PathBuf>,

    /// Directory searched for [`CONFIG_FILENAME`] when no path is given
    pub project_path: PathBuf,

    /// Environment used for `${VAR}` expansion
    pub env: HashMap<String, String>,
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load the configuration file layer
    ///
    /// Returns the default (empty) configuration when no explicit path is
    /// given and the project directory has no configuration file.
    pub async fn load(options: &ConfigLoadOptions) -> Result<PublishConfig> {
        let path = match &options.config_path {
            Some(path) => {
                if !path.exists() {
                    return Err(PublishError::ConfigError(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                path.clone()
            }
            None => {
                let path = options.project_path.join(CONFIG_FILENAME);
                if !path.exists() {
                    debug!(path = %path.display(), "no configuration file");
                    return Ok(PublishConfig::default());
                }
                path
            }
        };

        Self::load_file(&path, &options.env).await
    }

    async fn load_file(path: &Path, env: &HashMap<String, String>) -> Result<PublishConfig> {
        debug!(path = %path.display(), "loading configuration file");

        let content = fs::read_to_string(path).await.map_err(|e| {
            PublishError::ConfigError(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        Self::parse(&content, env)
    }

    /// Expand `${VAR}` references and parse YAML
    pub fn parse(content: &str, env: &HashMap<String, String>) -> Result<PublishConfig> {
        let expanded = Self::expand_env_vars(content, env)?;

        serde_yaml::from_str(&expanded)
            .map_err(|e| PublishError::ConfigError(format!("Failed to parse YAML config: {}", e)))
    }

    /// Replace every `${VAR}` with its value; an undefined variable is an error
    pub fn expand_env_vars(content: &str, env: &HashMap<String, String>) -> Result<String> {
        let mut missing = Vec::new();

        let expanded = ENV_VAR_PATTERN.replace_all(content, |caps: &Captures| {
            let name = &caps[1];
            match env.get(name) {
                Some(value) => value.clone(),
                None => {
                    missing.push(name.to_string());
                    String::new()
                }
            }
        });

        if !missing.is_empty() {
            return Err(PublishError::ConfigError(format!(
                "Undefined environment variables: {}",
                missing.join(", ")
            )));
        }

        Ok(expanded.into_owned())
    }
}
