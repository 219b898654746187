//! Command-line interface built on clap.
//!
//! Defines [`Cli`] with the [`Command`] subcommands (download, predict, test,
//! validate) and the global flags (--retries, --config, --verbose).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::forge::ItemKind;
use crate::input::{ExcludedAuthors, LabelPredicate, NumberSet, RepoList, RepoRef, Threshold};
use crate::retry::RetrySchedule;

/// Predicts topic labels for issues and pull requests and applies them.
#[derive(Debug, Parser)]
#[command(name = "labeler", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Backoff delays in seconds for transient faults, e.g. `30,30,300`.
    #[arg(long, global = true)]
    pub retries: Option<RetrySchedule>,

    /// Path to the configuration file. Defaults to `labeler.toml`.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download labeled issues and pull requests into tab-separated training data.
    Download(DownloadArgs),

    /// Predict and apply labels to specific issues and pull requests.
    Predict(PredictArgs),

    /// Compare predictions against the labels items already carry.
    Test(TestArgs),

    /// Check that a training data file is usable.
    Validate(ValidateArgs),
}

/// Options shared by commands that page through repositories.
#[derive(Debug, Clone, Args)]
pub struct PagingArgs {
    /// Items per page. Defaults to the configured size for each kind.
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Maximum pages per repository. Defaults to the configured limit for each kind.
    #[arg(long)]
    pub page_limit: Option<u32>,
}

#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// Repositories as `org/repo`, comma separated. All must share one org.
    #[arg(long)]
    pub repo: RepoList,

    /// Only labels starting with this prefix are exported, e.g. `area-`.
    #[arg(long)]
    pub label_prefix: LabelPredicate,

    /// Output path for issue rows.
    #[arg(long)]
    pub issues_data: Option<PathBuf>,

    /// Maximum issue rows to write, in total across all repositories.
    #[arg(long, requires = "issues_data")]
    pub issues_limit: Option<usize>,

    /// Output path for pull request rows.
    #[arg(long)]
    pub pulls_data: Option<PathBuf>,

    /// Maximum pull request rows to write, in total across all repositories.
    #[arg(long, requires = "pulls_data")]
    pub pulls_limit: Option<usize>,

    #[command(flatten)]
    pub paging: PagingArgs,

    /// Authors whose items are skipped, comma separated.
    #[arg(long, default_value = "")]
    pub excluded_authors: ExcludedAuthors,
}

#[derive(Debug, Args)]
pub struct PredictArgs {
    /// Repository as `org/repo`.
    #[arg(long, env = "GITHUB_REPOSITORY")]
    pub repo: RepoRef,

    /// Only labels starting with this prefix are eligible, e.g. `area-`.
    #[arg(long)]
    pub label_prefix: LabelPredicate,

    /// Issue numbers, e.g. `1-3,5,7-9`.
    #[arg(long, requires = "issues_model")]
    pub issues: Option<NumberSet>,

    /// Model endpoint for issues.
    #[arg(long)]
    pub issues_model: Option<String>,

    /// Pull request numbers, e.g. `10,12-14`.
    #[arg(long, requires = "pulls_model")]
    pub pulls: Option<NumberSet>,

    /// Model endpoint for pull requests.
    #[arg(long)]
    pub pulls_model: Option<String>,

    /// Minimum confidence in (0, 1]. Defaults to the configured threshold.
    #[arg(long)]
    pub threshold: Option<Threshold>,

    /// Label applied when no prediction meets the threshold.
    #[arg(long)]
    pub default_label: Option<String>,

    /// Authors whose items are skipped, comma separated.
    #[arg(long, default_value = "")]
    pub excluded_authors: ExcludedAuthors,

    /// Decide everything but make no label changes.
    #[arg(long, default_value_t = false)]
    pub test: bool,
}

#[derive(Debug, Args)]
pub struct TestArgs {
    /// Repositories as `org/repo`, comma separated. Used when no data file is given.
    #[arg(long)]
    pub repo: Option<RepoList>,

    /// Only labels starting with this prefix are counted, e.g. `area-`.
    #[arg(long)]
    pub label_prefix: LabelPredicate,

    /// Model endpoint for issues.
    #[arg(long)]
    pub issues_model: Option<String>,

    /// Read issues from this export instead of the repository.
    #[arg(long, requires = "issues_model")]
    pub issues_data: Option<PathBuf>,

    /// Maximum issues to test, in total across all repositories.
    #[arg(long)]
    pub issues_limit: Option<usize>,

    /// Model endpoint for pull requests.
    #[arg(long)]
    pub pulls_model: Option<String>,

    /// Read pull requests from this export instead of the repository.
    #[arg(long, requires = "pulls_model")]
    pub pulls_data: Option<PathBuf>,

    /// Maximum pull requests to test, in total across all repositories.
    #[arg(long)]
    pub pulls_limit: Option<usize>,

    /// Minimum confidence in (0, 1]. Defaults to the configured threshold.
    #[arg(long)]
    pub threshold: Option<Threshold>,

    /// Authors whose items are skipped, comma separated.
    #[arg(long, default_value = "")]
    pub excluded_authors: ExcludedAuthors,

    #[command(flatten)]
    pub paging: PagingArgs,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Which export layout the file uses.
    #[arg(long, value_enum)]
    pub kind: KindArg,

    /// Path to the export file.
    #[arg(long)]
    pub data: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Issues,
    Pulls,
}

impl From<KindArg> for ItemKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Issues => ItemKind::Issue,
            KindArg::Pulls => ItemKind::PullRequest,
        }
    }
}
