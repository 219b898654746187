//! Scoring backends and candidate ranking.
//!
//! The workflow treats the model as an opaque function from a record's
//! features to ranked `(label, score)` pairs. [`HttpClassifier`] reaches a
//! model served over HTTP; [`ModelSet`] picks the model for the record's kind.

use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ClassifierError;
use crate::forge::{ItemKind, Record};
use crate::input::{LabelPredicate, Threshold};

/// Number of candidates kept for reporting.
pub const TOP_CANDIDATES: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub label: String,
    pub score: f32,
}

#[cfg(test)]
impl Candidate {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Scored candidates as returned by a model, in no particular order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LabelPrediction {
    candidates: Vec<Candidate>,
}

/// Candidates restricted to the label predicate, best first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ranking {
    /// At most [`TOP_CANDIDATES`] entries.
    pub top: Vec<Candidate>,
    /// Highest-ranked candidate meeting the threshold.
    pub best: Option<Candidate>,
}

impl LabelPrediction {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates }
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    #[cfg(test)]
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn rank(&self, predicate: &LabelPredicate, threshold: Threshold) -> Ranking {
        let mut eligible: Vec<&Candidate> = self
            .candidates
            .iter()
            .filter(|c| predicate.matches(&c.label))
            .collect();
        eligible.sort_by(|a, b| b.score.total_cmp(&a.score));

        let best = eligible
            .iter()
            .find(|c| threshold.is_met_by(c.score))
            .map(|c| (*c).clone());
        let top = eligible
            .into_iter()
            .take(TOP_CANDIDATES)
            .cloned()
            .collect();

        Ranking { top, best }
    }
}

/// A scoring backend. Must be safe to call from concurrent item workflows.
pub trait Classifier: Send + Sync {
    /// `Ok(None)` when the model made no prediction.
    fn predict(
        &self,
        record: &Record,
    ) -> impl Future<Output = Result<Option<LabelPrediction>, ClassifierError>> + Send;
}

#[derive(Debug, Serialize)]
struct Features<'a> {
    kind: ItemKind,
    title: &'a str,
    body: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    file_names: Vec<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    folder_names: Vec<&'a str>,
}

impl<'a> From<&'a Record> for Features<'a> {
    fn from(record: &'a Record) -> Self {
        Self {
            kind: record.kind,
            title: &record.title,
            body: &record.body,
            file_names: record.file_names(),
            folder_names: record.folder_names(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Candidate>,
}

/// Model served behind an HTTP endpoint accepting record features as JSON.
pub struct HttpClassifier {
    client: Client,
    endpoint: Url,
}

impl HttpClassifier {
    pub fn new(endpoint: &str) -> anyhow::Result<Self> {
        let endpoint =
            Url::parse(endpoint).with_context(|| format!("invalid model URL '{endpoint}'"))?;
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, endpoint })
    }
}

impl Classifier for HttpClassifier {
    async fn predict(&self, record: &Record) -> Result<Option<LabelPrediction>, ClassifierError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&Features::from(record))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ClassifierError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let parsed: PredictResponse =
            serde_json::from_str(&body).map_err(|e| ClassifierError::Parse(e.to_string()))?;
        debug!(
            number = record.number,
            candidates = parsed.predictions.len(),
            "model responded"
        );

        if parsed.predictions.is_empty() {
            Ok(None)
        } else {
            Ok(Some(LabelPrediction::new(parsed.predictions)))
        }
    }
}

/// One optional model per item kind.
pub struct ModelSet<C> {
    pub issues: Option<C>,
    pub pulls: Option<C>,
}

impl<C> ModelSet<C> {
    pub fn for_kind(&self, kind: ItemKind) -> Option<&C> {
        match kind {
            ItemKind::Issue => self.issues.as_ref(),
            ItemKind::PullRequest => self.pulls.as_ref(),
        }
    }
}

impl<C: Classifier> Classifier for ModelSet<C> {
    async fn predict(&self, record: &Record) -> Result<Option<LabelPrediction>, ClassifierError> {
        match self.for_kind(record.kind) {
            Some(model) => model.predict(record).await,
            None => Err(ClassifierError::NoModel(record.kind)),
        }
    }
}
