//! Subcommand handlers. Each takes its parsed arguments plus the shared
//! [`Context`] and returns the process exit code.

pub mod download;
pub mod predict;
pub mod validate;

use anyhow::Result;
use tracing::warn;

use crate::cli::PagingArgs;
use crate::config::LabelerConfig;
use crate::error::LabelerError;
use crate::forge::{ForgeClient, ItemKind, PagerOptions};
use crate::input::Threshold;
use crate::retry::RetrySchedule;

/// Configuration resolved once per run, with CLI flags applied over the file.
pub struct Context {
    pub config: LabelerConfig,
    pub retries: RetrySchedule,
}

impl Context {
    pub fn new(config: LabelerConfig, retries: Option<RetrySchedule>) -> Self {
        let retries = retries.unwrap_or_else(|| config.retry_schedule());
        if retries.is_empty() {
            warn!("Retries are disabled; the first transient fault ends each request.");
        }
        Self { config, retries }
    }

    /// Fails before any network call when no token is configured.
    pub fn forge_client(&self) -> Result<ForgeClient> {
        let token = self.config.require_token()?;
        ForgeClient::with_base_url(token, &self.config.api_url, self.retries.clone())
    }

    pub fn threshold(&self, flag: Option<Threshold>) -> Result<Threshold, LabelerError> {
        match flag {
            Some(threshold) => Ok(threshold),
            None => Ok(Threshold::new(self.config.threshold)?),
        }
    }

    /// Command-level limits count rows written or items evaluated, so the
    /// pager itself is never item-limited here.
    pub fn pager_options(&self, kind: ItemKind, paging: &PagingArgs) -> PagerOptions {
        let (page_size, page_limit) = match kind {
            ItemKind::Issue => (self.config.issues_page_size, self.config.issues_page_limit),
            ItemKind::PullRequest => (self.config.pulls_page_size, self.config.pulls_page_limit),
        };
        PagerOptions {
            kind,
            page_size: paging.page_size.unwrap_or(page_size),
            page_limit: Some(paging.page_limit.unwrap_or(page_limit)),
            item_limit: None,
        }
    }
}
