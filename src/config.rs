//! `tef.toml` configuration
//!
//! Reporting settings are layered: config file (or a camelCase
//! `reportportal.json`), then `RP_*` environment variables, then CLI flags.

use crate::crystallization::DEFAULT_REGISTRY_FILE;
use crate::models::{Attribute, CrystallizationConfig, LaunchMode};
use crate::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "tef.toml";

pub const ENV_ENDPOINT: &str = "RP_ENDPOINT";
pub const ENV_TOKEN: &str = "RP_TOKEN";
pub const ENV_PROJECT: &str = "RP_PROJECT";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_registry_path")]
    pub registry_path: PathBuf,

    #[serde(default)]
    pub crystallization: CrystallizationConfig,

    #[serde(default)]
    pub reporting: ReportingConfig,
}

fn default_registry_path() -> PathBuf {
    PathBuf::from(DEFAULT_REGISTRY_FILE)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry_path: default_registry_path(),
            crystallization: CrystallizationConfig::default(),
            reporting: ReportingConfig::default(),
        }
    }
}

impl Config {
    /// Load from `path`, or from `./tef.toml` when no path is given
    ///
    /// A missing default file yields defaults; an explicitly named file
    /// must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (config_path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        if !explicit && !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config: {}", config_path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Invalid config: {}", config_path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Connection and launch settings for the reporting backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    pub endpoint: String,
    pub token: String,
    pub project: String,

    #[serde(alias = "launchName", skip_serializing_if = "Option::is_none")]
    pub launch_name: Option<String>,

    #[serde(alias = "launchDescription", skip_serializing_if = "Option::is_none")]
    pub launch_description: Option<String>,

    #[serde(alias = "launchAttributes")]
    pub launch_attributes: Vec<Attribute>,

    pub mode: LaunchMode,

    pub debug: bool,

    /// Per-request timeout in milliseconds
    #[serde(alias = "timeout", alias = "timeoutMs")]
    pub timeout_ms: u64,

    #[serde(alias = "maxRetries")]
    pub max_retries: u32,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            token: String::new(),
            project: String::new(),
            launch_name: None,
            launch_description: None,
            launch_attributes: Vec::new(),
            mode: LaunchMode::Default,
            debug: false,
            timeout_ms: 30_000,
            max_retries: 3,
        }
    }
}

impl ReportingConfig {
    /// Read a camelCase `reportportal.json` document
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read reporting config: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid reporting config: {}", path.display()))
    }

    /// Override endpoint/token/project from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key| lookup(key).filter(|v: &String| !v.trim().is_empty());
        if let Some(endpoint) = non_empty(ENV_ENDPOINT) {
            self.endpoint = endpoint;
        }
        if let Some(token) = non_empty(ENV_TOKEN) {
            self.token = token;
        }
        if let Some(project) = non_empty(ENV_PROJECT) {
            self.project = project;
        }
    }

    /// Fail when any of endpoint, token or project is missing
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("endpoint", &self.endpoint),
            ("token", &self.token),
            ("project", &self.project),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            anyhow::bail!(
                "Reporting configuration incomplete, missing: {} (set them in {}, or via {}, {}, {})",
                missing.join(", "),
                DEFAULT_CONFIG_FILE,
                ENV_ENDPOINT,
                ENV_TOKEN,
                ENV_PROJECT
            );
        }
        Ok(())
    }

    pub fn base_url(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }
}
