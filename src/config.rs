//! Runner configuration.
//!
//! Read as JSON from the `SNIPPET_RUNNER_CONFIG` environment variable. Every
//! field has a default, so an unset variable yields a working configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;

use crate::language::{Language, LanguageRegistry};
use crate::supervisor::ExecutionLimits;
use crate::workspace::ScratchRoot;

/// Environment variable holding the JSON configuration.
pub const CONFIG_ENV: &str = "SNIPPET_RUNNER_CONFIG";

/// Top-level configuration for the runner.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory under which per-execution scratch files are created.
    #[serde(default = "default_scratch_root")]
    pub scratch_root: PathBuf,

    /// Wall-clock deadline for every execution, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Delay between SIGTERM and SIGKILL on timeout, in milliseconds.
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,

    /// Launcher command overrides, keyed by language id.
    #[serde(default)]
    pub launchers: HashMap<Language, String>,
}

/// Rejected configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("timeout_ms must be greater than zero")]
    ZeroTimeout,

    #[error("launcher for '{0}' is empty")]
    EmptyLauncher(Language),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scratch_root: default_scratch_root(),
            timeout_ms: default_timeout_ms(),
            kill_grace_ms: default_kill_grace_ms(),
            launchers: HashMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from `SNIPPET_RUNNER_CONFIG`, or defaults if unset.
    pub fn from_env() -> Result<Self> {
        match std::env::var(CONFIG_ENV) {
            Ok(json) => Self::from_json(&json)
                .with_context(|| format!("Failed to parse {CONFIG_ENV}")),
            Err(std::env::VarError::NotPresent) => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("Cannot read {CONFIG_ENV}")),
        }
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("Invalid configuration JSON")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if let Some((lang, _)) = self.launchers.iter().find(|(_, cmd)| cmd.trim().is_empty()) {
            return Err(ConfigError::EmptyLauncher(*lang));
        }
        Ok(())
    }

    pub const fn limits(&self) -> ExecutionLimits {
        ExecutionLimits {
            deadline: Duration::from_millis(self.timeout_ms),
            kill_grace: Duration::from_millis(self.kill_grace_ms),
        }
    }

    pub fn registry(&self) -> LanguageRegistry {
        LanguageRegistry::new(&self.launchers)
    }

    pub fn scratch(&self) -> ScratchRoot {
        ScratchRoot::new(&self.scratch_root)
    }
}

fn default_scratch_root() -> PathBuf {
    std::env::temp_dir().join("snippet-runner")
}

const fn default_timeout_ms() -> u64 {
    10_000
}

const fn default_kill_grace_ms() -> u64 {
    500
}
