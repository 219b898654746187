use std::fmt;

use crate::classifier::Candidate;
use crate::forge::ItemKind;

/// Terminal outcome of the prediction workflow for one item. Exactly one per item.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemDecision {
    /// The label set was not fully observed.
    SkippedTooManyLabels,
    SkippedAuthorExcluded { author: String },
    /// An applicable label was already present.
    SkippedHasApplicableLabel { label: String },
    /// The item number does not exist in the repository.
    SkippedNotFound,
    AppliedPrediction { label: String, score: f32 },
    /// `added` is false when the default label was already present.
    AppliedDefault { label: String, added: bool },
    NoPredictionMade,
    MutationFailed { cause: String },
    /// The item could not be processed at all: fetch or model failure, or a
    /// panic trapped by the orchestrator.
    Faulted { cause: String },
}

impl ItemDecision {
    pub fn is_success(&self) -> bool {
        !matches!(
            self,
            ItemDecision::MutationFailed { .. } | ItemDecision::Faulted { .. }
        )
    }

    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            ItemDecision::SkippedTooManyLabels
                | ItemDecision::SkippedAuthorExcluded { .. }
                | ItemDecision::SkippedHasApplicableLabel { .. }
                | ItemDecision::SkippedNotFound
        )
    }
}

impl fmt::Display for ItemDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemDecision::SkippedTooManyLabels => write!(
                f,
                "No action taken. Too many labels applied already; cannot be sure no applicable label is already applied."
            ),
            ItemDecision::SkippedAuthorExcluded { author } => {
                write!(f, "No action taken. Author '{author}' is excluded.")
            }
            ItemDecision::SkippedHasApplicableLabel { .. } => write!(f, "No prediction needed."),
            ItemDecision::SkippedNotFound => write!(f, "Could not be found. Skipped."),
            ItemDecision::AppliedPrediction { label, .. } => write!(f, "Predicted: {label}"),
            ItemDecision::AppliedDefault { label, .. } => {
                write!(f, "Applied default label: {label}")
            }
            ItemDecision::NoPredictionMade => write!(f, "No prediction was made."),
            ItemDecision::MutationFailed { cause } => {
                write!(f, "Error occurred during prediction: {cause}")
            }
            ItemDecision::Faulted { cause } => write!(f, "Processing failed: {cause}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationAction {
    Add,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationStatus {
    Applied,
    /// Dry-run: the call was decided on but not made.
    Simulated,
    Failed(String),
}

/// One label add or remove decided by the workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub action: MutationAction,
    pub label: String,
    pub status: MutationStatus,
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.action {
            MutationAction::Add => "add",
            MutationAction::Remove => "remove",
        };
        match &self.status {
            MutationStatus::Applied => write!(f, "{verb} '{}'", self.label),
            MutationStatus::Simulated => write!(f, "{verb} '{}' (simulated)", self.label),
            MutationStatus::Failed(cause) => {
                write!(f, "{verb} '{}' failed: {cause}", self.label)
            }
        }
    }
}

/// Everything the workflow learned about one item, returned by value to the
/// orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemReport {
    pub kind: ItemKind,
    pub number: u64,
    pub decision: ItemDecision,
    /// Best eligible candidates, at most three.
    pub candidates: Vec<Candidate>,
    /// Label chosen for the item, by prediction or default.
    pub label: Option<String>,
    /// Confidence of `label` when it came from the model.
    pub score: Option<f32>,
    pub mutations: Vec<Mutation>,
    /// Human-readable detail lines, in the order they happened.
    pub notes: Vec<String>,
}

impl ItemReport {
    pub fn new(kind: ItemKind, number: u64, decision: ItemDecision) -> Self {
        Self {
            kind,
            number,
            decision,
            candidates: Vec::new(),
            label: None,
            score: None,
            mutations: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn success(&self) -> bool {
        self.decision.is_success()
    }

    /// Label calls actually sent to the forge. Simulated ones are excluded.
    #[cfg(test)]
    pub fn mutating_calls(&self) -> usize {
        self.mutations
            .iter()
            .filter(|m| m.status != MutationStatus::Simulated)
            .count()
    }

    /// `[Issue org/repo#12] Predicted: area-foo`
    pub fn headline(&self, repo: &impl fmt::Display) -> String {
        format!("[{} {repo}#{}] {}", self.kind, self.number, self.decision)
    }
}
