//! Core configuration.
//!
//! Resolved from a TOML file with compiled defaults; a missing file is not
//! an error (defaults apply), an explicit path that cannot be read is.
//! Embedders load this once and hand it to [`crate::CoreService`].

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

/// What happens when a verification is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionPolicy {
    /// Reset the task straight back to `todo`, no vote.
    Reset,
    /// Escalate the rejection to a group vote.
    Vote,
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    verification: VerificationFileConfig,
    takeover: TakeoverFileConfig,
    workflow: WorkflowFileConfig,
}

/// `[verification]` section of the config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VerificationFileConfig {
    rejection_policy: Option<RejectionPolicy>,
}

/// `[takeover]` section of the config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TakeoverFileConfig {
    weekly_limit: Option<u32>,
}

/// `[workflow]` section of the config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WorkflowFileConfig {
    expiry_hours: Option<i64>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Fully resolved core configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// Behavior on a rejected verification.
    pub rejection_policy: RejectionPolicy,
    /// Takeovers a member may record per calendar week.
    pub takeover_weekly_limit: u32,
    /// Hours until a pending workflow may be expired by the sweep.
    pub workflow_expiry_hours: i64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            rejection_policy: RejectionPolicy::Vote,
            takeover_weekly_limit: 3,
            workflow_expiry_hours: 48,
        }
    }
}

impl CoreConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    ///
    /// If `path` is `None` defaults are returned. A path that does not
    /// exist is an error; the caller chose it explicitly.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text, falling back to defaults for
    /// missing keys.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseToml`] on malformed TOML.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(contents)?;
        Ok(Self::resolve(&file))
    }

    /// Priority: file > default.
    fn resolve(file: &ConfigFile) -> Self {
        let defaults = Self::default();
        Self {
            rejection_policy: file
                .verification
                .rejection_policy
                .unwrap_or(defaults.rejection_policy),
            takeover_weekly_limit: file
                .takeover
                .weekly_limit
                .unwrap_or(defaults.takeover_weekly_limit),
            workflow_expiry_hours: file
                .workflow
                .expiry_hours
                .unwrap_or(defaults.workflow_expiry_hours),
        }
    }
}
