//! `predict`: runs the prediction workflow on selected issues and pull requests.

use std::process::ExitCode;

use anyhow::Result;
use tracing::{info, warn};

use super::Context;
use crate::classifier::{HttpClassifier, ModelSet};
use crate::cli::PredictArgs;
use crate::error::LabelerError;
use crate::forge::ItemKind;
use crate::orchestrator::{BatchReport, Orchestrator};
use crate::state_machine::{ItemDecision, PredictionWorkflow, WorkflowSettings};
use crate::summary::{AlertKind, RunSummary, write_outputs};
use crate::ui;

pub async fn run(args: PredictArgs, ctx: &Context) -> Result<ExitCode> {
    let units = work_units(&args);
    if units.is_empty() {
        return Err(LabelerError::Config(
            "no item numbers given; pass --issues and/or --pulls".into(),
        )
        .into());
    }

    let models = ModelSet {
        issues: args.issues_model.as_deref().map(HttpClassifier::new).transpose()?,
        pulls: args.pulls_model.as_deref().map(HttpClassifier::new).transpose()?,
    };
    let settings = WorkflowSettings {
        repo: args.repo.clone(),
        predicate: args.label_prefix.clone(),
        threshold: ctx.threshold(args.threshold)?,
        default_label: args.default_label.clone(),
        excluded: args.excluded_authors.clone(),
        dry_run: args.test,
    };
    let client = ctx.forge_client()?;

    let mut summary = RunSummary::new();
    summary.set_status(format!(
        "Predicting labels for {} items in {}{}.",
        units.len(),
        args.repo,
        if args.test { " (test mode, no labels changed)" } else { "" }
    ));
    info!(
        "Label predicate: {}, threshold: {}",
        settings.predicate, settings.threshold
    );

    let orchestrator = Orchestrator::new(PredictionWorkflow::new(client, models, settings));
    let batch = orchestrator.run_all(units).await;

    ui::print_batch(&batch, &args.repo);
    record_results(&batch, &args.repo, &mut summary);

    if let Some(outputs) = single_item_outputs(&batch) {
        write_outputs(&outputs)?;
    }
    summary.write_to_env()?;

    if batch.success {
        info!(
            "Processed {} items ({} skipped).",
            batch.items.len(),
            batch.skipped()
        );
        Ok(ExitCode::SUCCESS)
    } else {
        warn!(
            "{} of {} items failed.",
            batch.failures().count(),
            batch.items.len()
        );
        Ok(ExitCode::FAILURE)
    }
}

fn work_units(args: &PredictArgs) -> Vec<(ItemKind, u64)> {
    let issues = args.issues.iter().flat_map(|set| set.iter()).map(|n| (ItemKind::Issue, n));
    let pulls = args
        .pulls
        .iter()
        .flat_map(|set| set.iter())
        .map(|n| (ItemKind::PullRequest, n));
    issues.chain(pulls).collect()
}

/// Failures become alerts above the per-item sections.
pub fn record_results(batch: &BatchReport, repo: &impl std::fmt::Display, summary: &mut RunSummary) {
    for item in batch.failures() {
        let kind = match item.decision {
            ItemDecision::Faulted { .. } => AlertKind::Caution,
            _ => AlertKind::Warning,
        };
        summary.alert(kind, item.headline(repo));
    }
    for item in &batch.items {
        summary.item(item, repo);
    }
}

/// `label` and `score` step outputs, produced only when exactly one item ran.
pub fn single_item_outputs(batch: &BatchReport) -> Option<[(&'static str, String); 2]> {
    match batch.items.as_slice() {
        [item] => Some([
            ("label", item.label.clone().unwrap_or_default()),
            (
                "score",
                item.score.map(|s| format!("{s:.4}")).unwrap_or_default(),
            ),
        ]),
        _ => None,
    }
}
