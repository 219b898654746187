//! Streaming comparison of predicted labels against labels already on items.
//!
//! Used by the offline tester in place of mutation. [`TestStats`] is a plain
//! value with no interior synchronization; feed it from one consuming loop.

use std::fmt;

/// Matches needed for a favorable verdict, as a fraction of all items.
pub const FAVORABLE_MATCH_RATE: f64 = 0.65;
/// Mismatches must stay below this fraction for a favorable verdict.
pub const FAVORABLE_MISMATCH_RATE: f64 = 0.15;

/// Which counter one observation landed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Predicted equals existing, ignoring case. Also when neither is present.
    Match,
    Mismatch,
    /// No prediction, but the item had a label.
    NoPrediction,
    /// A prediction, but the item had no label.
    NoExisting,
}

impl Outcome {
    pub fn classify(predicted: Option<&str>, existing: Option<&str>) -> Self {
        match (predicted, existing) {
            (None, Some(_)) => Outcome::NoPrediction,
            (Some(_), None) => Outcome::NoExisting,
            (None, None) => Outcome::Match,
            (Some(p), Some(e)) if p.to_lowercase() == e.to_lowercase() => Outcome::Match,
            (Some(_), Some(_)) => Outcome::Mismatch,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestStats {
    matches: u64,
    mismatches: u64,
    no_prediction: u64,
    no_existing: u64,
    match_scores: Vec<f32>,
    mismatch_scores: Vec<f32>,
}

impl TestStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one item. `score` is kept only for matches and mismatches.
    pub fn observe(
        &mut self,
        predicted: Option<&str>,
        existing: Option<&str>,
        score: Option<f32>,
    ) -> Outcome {
        let outcome = Outcome::classify(predicted, existing);
        match outcome {
            Outcome::Match => {
                self.matches += 1;
                self.match_scores.extend(score);
            }
            Outcome::Mismatch => {
                self.mismatches += 1;
                self.mismatch_scores.extend(score);
            }
            Outcome::NoPrediction => self.no_prediction += 1,
            Outcome::NoExisting => self.no_existing += 1,
        }
        outcome
    }

    pub fn total(&self) -> u64 {
        self.matches + self.mismatches + self.no_prediction + self.no_existing
    }

    pub fn summary(&self) -> TestSummary {
        let total = self.total();
        let rate = |count: u64| count as f64 / total as f64;
        let percentages = (total > 0).then(|| Percentages {
            matches: rate(self.matches),
            mismatches: rate(self.mismatches),
            no_prediction: rate(self.no_prediction),
            no_existing: rate(self.no_existing),
        });

        TestSummary {
            total,
            matches: self.matches,
            mismatches: self.mismatches,
            no_prediction: self.no_prediction,
            no_existing: self.no_existing,
            percentages,
            match_scores: ScoreStats::from_scores(&self.match_scores),
            mismatch_scores: ScoreStats::from_scores(&self.mismatch_scores),
        }
    }
}

/// Fractions in `[0, 1]` of each counter over the total.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Percentages {
    pub matches: f64,
    pub mismatches: f64,
    pub no_prediction: f64,
    pub no_existing: f64,
}

/// Min, mean, max and population standard deviation of a score list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreStats {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
    pub std_dev: f64,
}

impl ScoreStats {
    /// `None` for an empty list.
    pub fn from_scores(scores: &[f32]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }
        let n = scores.len() as f64;
        let values = scores.iter().map(|&s| f64::from(s));
        let min = values.clone().fold(f64::INFINITY, f64::min);
        let max = values.clone().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.clone().sum::<f64>() / n;
        let variance = values.map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        Some(Self {
            min,
            mean,
            max,
            std_dev: variance.sqrt(),
        })
    }
}

impl fmt::Display for ScoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.4} | {:.4} | {:.4} | {:.4}",
            self.min, self.mean, self.max, self.std_dev
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestSummary {
    pub total: u64,
    pub matches: u64,
    pub mismatches: u64,
    pub no_prediction: u64,
    pub no_existing: u64,
    /// `None` while nothing has been observed.
    pub percentages: Option<Percentages>,
    pub match_scores: Option<ScoreStats>,
    pub mismatch_scores: Option<ScoreStats>,
}

impl TestSummary {
    pub fn is_favorable(&self) -> bool {
        self.percentages.is_some_and(|p| {
            p.matches >= FAVORABLE_MATCH_RATE && p.mismatches < FAVORABLE_MISMATCH_RATE
        })
    }

    /// Running totals, one line per counter.
    pub fn lines(&self) -> Vec<String> {
        let p = self.percentages.as_ref();
        vec![
            format!(
                "Matches      : {} ({}) - Min | Avg | Max | StdDev: {}",
                self.matches,
                percent(p.map(|p| p.matches)),
                stats(self.match_scores.as_ref())
            ),
            format!(
                "Mismatches   : {} ({}) - Min | Avg | Max | StdDev: {}",
                self.mismatches,
                percent(p.map(|p| p.mismatches)),
                stats(self.mismatch_scores.as_ref())
            ),
            format!(
                "No Prediction: {} ({})",
                self.no_prediction,
                percent(p.map(|p| p.no_prediction))
            ),
            format!(
                "No Existing  : {} ({})",
                self.no_existing,
                percent(p.map(|p| p.no_existing))
            ),
        ]
    }
}

/// `65.00%`, or `N/A` when there is nothing to divide by.
pub fn percent(fraction: Option<f64>) -> String {
    match fraction {
        Some(fraction) => format!("{:.2}%", fraction * 100.0),
        None => "N/A".to_string(),
    }
}

fn stats(stats: Option<&ScoreStats>) -> String {
    stats.map_or_else(|| "N/A".to_string(), ToString::to_string)
}
