use std::fmt;

use tracing::{debug, error, instrument, warn};

use super::decision::{ItemDecision, ItemReport, Mutation, MutationAction, MutationStatus};
use crate::classifier::{Candidate, Classifier};
use crate::forge::{ItemGateway, ItemKind, Record};
use crate::input::{ExcludedAuthors, LabelPredicate, RepoRef, Threshold};

/// Read-only settings shared by every item of a run.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub repo: RepoRef,
    pub predicate: LabelPredicate,
    pub threshold: Threshold,
    pub default_label: Option<String>,
    pub excluded: ExcludedAuthors,
    /// Decide everything but make no mutating calls.
    pub dry_run: bool,
}

/// Stages of the decision procedure, in evaluation order.
///
/// Each record flows through: TOO_MANY_LABELS → AUTHOR_EXCLUDED →
/// APPLICABLE_LABEL_EXISTS → PREDICT → APPLY | DEFAULT_FALLBACK → DONE,
/// leaving early as soon as a terminal decision is reached.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    TooManyLabels,
    AuthorExcluded,
    ApplicableLabelExists,
    Predict,
    Apply(Candidate),
    DefaultFallback,
    Done(ItemDecision),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::TooManyLabels => write!(f, "TOO_MANY_LABELS"),
            Stage::AuthorExcluded => write!(f, "AUTHOR_EXCLUDED"),
            Stage::ApplicableLabelExists => write!(f, "APPLICABLE_LABEL_EXISTS"),
            Stage::Predict => write!(f, "PREDICT"),
            Stage::Apply(_) => write!(f, "APPLY"),
            Stage::DefaultFallback => write!(f, "DEFAULT_FALLBACK"),
            Stage::Done(_) => write!(f, "DONE"),
        }
    }
}

/// Turns one record plus a model score into at most one label change.
pub struct PredictionWorkflow<G, C> {
    gateway: G,
    classifier: C,
    settings: WorkflowSettings,
}

impl<G: ItemGateway, C: Classifier> PredictionWorkflow<G, C> {
    pub fn new(gateway: G, classifier: C, settings: WorkflowSettings) -> Self {
        Self {
            gateway,
            classifier,
            settings,
        }
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    #[cfg(test)]
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Fetches the item and runs the decision procedure on it.
    ///
    /// A missing item is a skip, not a failure.
    #[instrument(skip(self), fields(repo = %self.settings.repo))]
    pub async fn process(&self, kind: ItemKind, number: u64) -> ItemReport {
        match self
            .gateway
            .fetch_one(&self.settings.repo, kind, number)
            .await
        {
            Ok(Some(record)) => self.decide(&record).await,
            Ok(None) => {
                warn!("{kind} #{number} could not be found, skipping");
                ItemReport::new(kind, number, ItemDecision::SkippedNotFound)
            }
            Err(err) => {
                error!("failed to fetch {kind} #{number}: {err}");
                ItemReport::new(
                    kind,
                    number,
                    ItemDecision::Faulted {
                        cause: format!("fetch failed: {err}"),
                    },
                )
            }
        }
    }

    /// Runs the stages for an already fetched record.
    pub async fn decide(&self, record: &Record) -> ItemReport {
        let mut report = ItemReport::new(record.kind, record.number, ItemDecision::NoPredictionMade);
        let mut stage = Stage::TooManyLabels;
        loop {
            debug!(number = record.number, %stage, "workflow stage");
            stage = match stage {
                Stage::Done(decision) => {
                    report.decision = decision;
                    return report;
                }
                current => self.step(current, record, &mut report).await,
            };
        }
    }

    async fn step(&self, stage: Stage, record: &Record, report: &mut ItemReport) -> Stage {
        match stage {
            Stage::TooManyLabels => {
                if record.has_more_labels {
                    Stage::Done(ItemDecision::SkippedTooManyLabels)
                } else {
                    Stage::AuthorExcluded
                }
            }

            Stage::AuthorExcluded => match record
                .author
                .as_deref()
                .filter(|author| self.settings.excluded.contains(author))
            {
                Some(author) => Stage::Done(ItemDecision::SkippedAuthorExcluded {
                    author: author.to_string(),
                }),
                None => Stage::ApplicableLabelExists,
            },

            Stage::ApplicableLabelExists => {
                let Some(existing) = self.settings.predicate.first_match(&record.labels) else {
                    return Stage::Predict;
                };
                report
                    .notes
                    .push(format!("Applicable label '{existing}' already exists."));

                if let Some(default) = self.present_default(record) {
                    if let Err(cause) = self
                        .mutate(record, MutationAction::Remove, default, report)
                        .await
                    {
                        return Stage::Done(ItemDecision::MutationFailed { cause });
                    }
                }
                Stage::Done(ItemDecision::SkippedHasApplicableLabel {
                    label: existing.to_string(),
                })
            }

            Stage::Predict => {
                let prediction = match self.classifier.predict(record).await {
                    Ok(prediction) => prediction.filter(|p| !p.is_empty()),
                    Err(err) => {
                        return Stage::Done(ItemDecision::Faulted {
                            cause: format!("model failed: {err}"),
                        });
                    }
                };
                let Some(prediction) = prediction else {
                    return Stage::Done(ItemDecision::NoPredictionMade);
                };

                let ranking = prediction.rank(&self.settings.predicate, self.settings.threshold);
                report.notes.push("Label predictions:".to_string());
                report.notes.extend(
                    ranking
                        .top
                        .iter()
                        .map(|c| format!("  '{}' - Score: {}", c.label, c.score)),
                );
                report.candidates = ranking.top;

                match ranking.best {
                    Some(best) => {
                        report.notes.push(format!(
                            "Label '{}' meets threshold of {}.",
                            best.label, self.settings.threshold
                        ));
                        Stage::Apply(best)
                    }
                    None => {
                        report.notes.push(format!(
                            "No label meets the threshold of {}.",
                            self.settings.threshold
                        ));
                        Stage::DefaultFallback
                    }
                }
            }

            Stage::Apply(best) => {
                report.label = Some(best.label.clone());
                report.score = Some(best.score);

                if let Err(cause) = self
                    .mutate(record, MutationAction::Add, &best.label, report)
                    .await
                {
                    return Stage::Done(ItemDecision::MutationFailed { cause });
                }
                if let Some(default) = self.present_default(record) {
                    if let Err(cause) = self
                        .mutate(record, MutationAction::Remove, default, report)
                        .await
                    {
                        return Stage::Done(ItemDecision::MutationFailed { cause });
                    }
                }
                Stage::Done(ItemDecision::AppliedPrediction {
                    label: best.label,
                    score: best.score,
                })
            }

            Stage::DefaultFallback => {
                let Some(default) = self.settings.default_label.as_deref() else {
                    return Stage::Done(ItemDecision::NoPredictionMade);
                };
                report.label = Some(default.to_string());

                if record.has_label(default) {
                    report
                        .notes
                        .push(format!("Default label '{default}' is already applied."));
                    return Stage::Done(ItemDecision::AppliedDefault {
                        label: default.to_string(),
                        added: false,
                    });
                }

                match self
                    .mutate(record, MutationAction::Add, default, report)
                    .await
                {
                    Ok(()) => Stage::Done(ItemDecision::AppliedDefault {
                        label: default.to_string(),
                        added: true,
                    }),
                    Err(cause) => Stage::Done(ItemDecision::MutationFailed { cause }),
                }
            }

            done @ Stage::Done(_) => done,
        }
    }

    /// The configured default label, when the record carries it.
    fn present_default(&self, record: &Record) -> Option<&str> {
        self.settings
            .default_label
            .as_deref()
            .filter(|label| record.has_label(label))
    }

    /// Adds or removes one label, honoring dry-run, and records the attempt.
    async fn mutate(
        &self,
        record: &Record,
        action: MutationAction,
        label: &str,
        report: &mut ItemReport,
    ) -> Result<(), String> {
        let status = if self.settings.dry_run {
            MutationStatus::Simulated
        } else {
            let repo = &self.settings.repo;
            let result = match action {
                MutationAction::Add => {
                    self.gateway
                        .add_label(repo, record.kind, record.number, label)
                        .await
                }
                MutationAction::Remove => {
                    self.gateway
                        .remove_label(repo, record.kind, record.number, label)
                        .await
                }
            };
            match result {
                Ok(()) => MutationStatus::Applied,
                Err(err) => MutationStatus::Failed(err.to_string()),
            }
        };

        let mutation = Mutation {
            action,
            label: label.to_string(),
            status,
        };
        let outcome = match &mutation.status {
            MutationStatus::Failed(_) => {
                error!(number = record.number, "{mutation}");
                Err(mutation.to_string())
            }
            _ => Ok(()),
        };
        report.mutations.push(mutation);
        outcome
    }
}
