//! Labeler configuration loaded from `labeler.toml`.
//!
//! Every field has a default, so the file is optional. The `GITHUB_TOKEN`
//! environment variable takes precedence over a token in the file.

use std::path::Path;

use serde::Deserialize;

use crate::error::LabelerError;
use crate::forge::client::API_URL;
use crate::retry::{DEFAULT_RETRY_SECS, RetrySchedule};

pub const DEFAULT_CONFIG_FILE: &str = "labeler.toml";
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LabelerConfig {
    /// Forge API token.
    #[serde(default)]
    pub token: String,

    /// Base URL of the forge REST and GraphQL API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Backoff delays in seconds, consumed in order on transient faults.
    #[serde(default = "default_retries")]
    pub retries: Vec<u64>,

    #[serde(default = "default_threshold")]
    pub threshold: f32,

    #[serde(default = "default_issues_page_size")]
    pub issues_page_size: u32,

    #[serde(default = "default_pulls_page_size")]
    pub pulls_page_size: u32,

    #[serde(default = "default_issues_page_limit")]
    pub issues_page_limit: u32,

    #[serde(default = "default_pulls_page_limit")]
    pub pulls_page_limit: u32,

    /// Rows read from an export when testing without an explicit limit.
    #[serde(default = "default_test_row_limit")]
    pub test_row_limit: usize,
}

fn default_api_url() -> String {
    API_URL.to_string()
}

fn default_retries() -> Vec<u64> {
    DEFAULT_RETRY_SECS.to_vec()
}

fn default_threshold() -> f32 {
    0.4
}

fn default_issues_page_size() -> u32 {
    100
}

fn default_pulls_page_size() -> u32 {
    25
}

fn default_issues_page_limit() -> u32 {
    1000
}

fn default_pulls_page_limit() -> u32 {
    4000
}

fn default_test_row_limit() -> usize {
    50_000
}

impl Default for LabelerConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_url: default_api_url(),
            retries: default_retries(),
            threshold: default_threshold(),
            issues_page_size: default_issues_page_size(),
            pulls_page_size: default_pulls_page_size(),
            issues_page_limit: default_issues_page_limit(),
            pulls_page_limit: default_pulls_page_limit(),
            test_row_limit: default_test_row_limit(),
        }
    }
}

impl LabelerConfig {
    /// Loads `path`, or `labeler.toml` in the working directory when `path`
    /// is `None`. A missing default file yields the defaults; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, LabelerError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Self::default()
                }
            }
        };

        if let Ok(token) = std::env::var(TOKEN_ENV) {
            if !token.is_empty() {
                config.token = token;
            }
        }

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, LabelerError> {
        if !path.exists() {
            return Err(LabelerError::Config(format!(
                "config file '{}' does not exist",
                path.display()
            )));
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// The token, or a configuration error when none was provided.
    pub fn require_token(&self) -> Result<String, LabelerError> {
        let token = self.token.trim();
        if token.is_empty() {
            return Err(LabelerError::Config(format!(
                "no forge token; set {TOKEN_ENV} or `token` in {DEFAULT_CONFIG_FILE}"
            )));
        }
        Ok(token.to_string())
    }

    pub fn retry_schedule(&self) -> RetrySchedule {
        RetrySchedule::from_secs(&self.retries)
    }
}
