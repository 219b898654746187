//! Typed values parsed from command-line input.
//!
//! Every parser here runs before any network activity, so malformed input is
//! reported as a configuration error and the process exits non-zero.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error(
        "'{0}' must be a comma-separated list of numbers and/or dash-separated ranges. Example: 1-3,5,7-9."
    )]
    NumberRanges(String),

    #[error("range '{range}' spans more than {max} numbers")]
    RangeTooLarge { range: String, max: u64 },

    #[error(
        "label prefix '{0}' must end in a non-alphanumeric character. The recommended terminating character is '-', as in 'area-'."
    )]
    LabelPrefix(String),

    #[error("'{0}' is not in the format of '{{org}}/{{repo}}'")]
    Repo(String),

    #[error("all repositories must be from the same org: found '{found}' after '{expected}'")]
    MixedOrgs { expected: String, found: String },

    #[error("threshold '{0}' must be a decimal value in the range (0,1]")]
    Threshold(String),

    #[error("retries '{0}' must be a comma-separated list of whole seconds")]
    RetrySchedule(String),
}

/// Widest single range accepted by [`NumberSet`].
pub const MAX_RANGE_SPAN: u64 = 100_000;

/// Set of item numbers selected with `1-3,5,7-9` syntax.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NumberSet(BTreeSet<u64>);

impl NumberSet {
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.0.iter().copied()
    }
}

impl FromStr for NumberSet {
    type Err = InputError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || InputError::NumberRanges(input.to_string());
        let mut numbers = BTreeSet::new();

        for range in input.split(',') {
            let parts: Vec<&str> = range.split('-').map(str::trim).collect();
            match parts.as_slice() {
                [single] => {
                    numbers.insert(single.parse::<u64>().map_err(|_| invalid())?);
                }
                [begin, end] => {
                    let begin = begin.parse::<u64>().map_err(|_| invalid())?;
                    let end = end.parse::<u64>().map_err(|_| invalid())?;
                    if begin > end {
                        return Err(invalid());
                    }
                    if end - begin >= MAX_RANGE_SPAN {
                        return Err(InputError::RangeTooLarge {
                            range: range.trim().to_string(),
                            max: MAX_RANGE_SPAN,
                        });
                    }
                    numbers.extend(begin..=end);
                }
                _ => return Err(invalid()),
            }
        }

        Ok(Self(numbers))
    }
}

/// Restricts which labels are eligible predictions: case-insensitive prefix match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelPredicate {
    prefix: String,
    lowered: String,
}

impl LabelPredicate {
    pub fn matches(&self, label: &str) -> bool {
        label.to_lowercase().starts_with(&self.lowered)
    }

    /// First label in `labels` that satisfies the predicate.
    pub fn first_match<'a, I>(&self, labels: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a String>,
    {
        labels
            .into_iter()
            .map(String::as_str)
            .find(|label| self.matches(label))
    }
}

impl FromStr for LabelPredicate {
    type Err = InputError;

    fn from_str(prefix: &str) -> Result<Self, Self::Err> {
        // A prefix like "area" would also match "areal-..." labels.
        match prefix.chars().last() {
            Some(last) if !last.is_alphanumeric() => Ok(Self {
                prefix: prefix.to_string(),
                lowered: prefix.to_lowercase(),
            }),
            _ => Err(InputError::LabelPrefix(prefix.to_string())),
        }
    }
}

impl fmt::Display for LabelPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}*", self.prefix)
    }
}

/// One `org/repo` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    pub org: String,
    pub repo: String,
}

impl FromStr for RepoRef {
    type Err = InputError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().split_once('/') {
            Some((org, repo)) if !org.is_empty() && !repo.is_empty() && !repo.contains('/') => {
                Ok(Self {
                    org: org.to_string(),
                    repo: repo.to_string(),
                })
            }
            _ => Err(InputError::Repo(input.to_string())),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.org, self.repo)
    }
}

/// Comma-separated repositories that must all belong to one org.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoList {
    pub org: String,
    pub repos: Vec<String>,
}

impl RepoList {
    pub fn iter(&self) -> impl Iterator<Item = RepoRef> + '_ {
        self.repos.iter().map(|repo| RepoRef {
            org: self.org.clone(),
            repo: repo.clone(),
        })
    }
}

impl FromStr for RepoList {
    type Err = InputError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut org: Option<String> = None;
        let mut repos = Vec::new();

        for part in input.split(',') {
            let parsed: RepoRef = part.parse()?;
            match &org {
                Some(expected) if *expected != parsed.org => {
                    return Err(InputError::MixedOrgs {
                        expected: expected.clone(),
                        found: parsed.org,
                    });
                }
                Some(_) => {}
                None => org = Some(parsed.org),
            }
            repos.push(parsed.repo);
        }

        match org {
            Some(org) => Ok(Self { org, repos }),
            None => Err(InputError::Repo(input.to_string())),
        }
    }
}

/// Minimum confidence a prediction needs before it is applied. Always in (0,1].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Threshold(f32);

impl Threshold {
    pub fn new(value: f32) -> Result<Self, InputError> {
        if value > 0.0 && value <= 1.0 {
            Ok(Self(value))
        } else {
            Err(InputError::Threshold(value.to_string()))
        }
    }

    #[cfg(test)]
    pub fn value(self) -> f32 {
        self.0
    }

    /// Closed test: a score exactly at the threshold passes.
    pub fn is_met_by(self, score: f32) -> bool {
        score >= self.0
    }
}

impl FromStr for Threshold {
    type Err = InputError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let value = input
            .trim()
            .parse::<f32>()
            .map_err(|_| InputError::Threshold(input.to_string()))?;
        Self::new(value)
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Author logins whose items are never processed. Comparison ignores case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcludedAuthors(HashSet<String>);

impl ExcludedAuthors {
    pub fn contains(&self, login: &str) -> bool {
        self.0.contains(&login.to_lowercase())
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for ExcludedAuthors {
    type Err = InputError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Ok(Self(
            input
                .split(',')
                .map(str::trim)
                .filter(|login| !login.is_empty())
                .map(str::to_lowercase)
                .collect(),
        ))
    }
}

impl<S: AsRef<str>> FromIterator<S> for ExcludedAuthors {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(|s| s.as_ref().to_lowercase()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_ranges_expand() {
        let set: NumberSet = "1-3,5,7-9".parse().unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![1, 2, 3, 5, 7, 8, 9]);
    }

    #[test]
    fn number_ranges_dedupe_overlaps() {
        let set: NumberSet = "1-3,2,3-4".parse().unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn number_ranges_reject_malformed() {
        for bad in ["3-", "a-b", "", "1,,2", "1-2-3", "-4", "5-3", "x"] {
            assert!(bad.parse::<NumberSet>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn number_ranges_reject_huge_spans() {
        let err = "1-4000000000".parse::<NumberSet>().unwrap_err();
        assert_eq!(
            err,
            InputError::RangeTooLarge {
                range: "1-4000000000".into(),
                max: MAX_RANGE_SPAN,
            }
        );

        let widest = format!("1-{MAX_RANGE_SPAN}");
        let set: NumberSet = widest.parse().unwrap();
        assert_eq!(set.iter().count() as u64, MAX_RANGE_SPAN);
    }

    #[test]
    fn number_ranges_error_message() {
        let err = "3-".parse::<NumberSet>().unwrap_err();
        assert!(err.to_string().contains("Example: 1-3,5,7-9"));
    }

    #[test]
    fn label_prefix_matches_case_insensitively() {
        let predicate: LabelPredicate = "area-".parse().unwrap();
        assert!(predicate.matches("area-System.Net"));
        assert!(predicate.matches("AREA-foo"));
        assert!(!predicate.matches("needs-triage"));
        assert!(!predicate.matches("area"));
    }

    #[test]
    fn label_prefix_must_end_in_non_alphanumeric() {
        assert!("area".parse::<LabelPredicate>().is_err());
        assert!("area1".parse::<LabelPredicate>().is_err());
        assert!("".parse::<LabelPredicate>().is_err());
        assert!("area/".parse::<LabelPredicate>().is_ok());
    }

    #[test]
    fn first_match_returns_first_applicable() {
        let predicate: LabelPredicate = "area-".parse().unwrap();
        let labels = vec![
            "bug".to_string(),
            "area-foo".to_string(),
            "area-bar".to_string(),
        ];
        assert_eq!(predicate.first_match(&labels), Some("area-foo"));
    }

    #[test]
    fn repo_parsing() {
        let repo: RepoRef = "dotnet/runtime".parse().unwrap();
        assert_eq!(repo.org, "dotnet");
        assert_eq!(repo.repo, "runtime");
        assert!("runtime".parse::<RepoRef>().is_err());
        assert!("/runtime".parse::<RepoRef>().is_err());
        assert!("a/b/c".parse::<RepoRef>().is_err());
    }

    #[test]
    fn repo_list_requires_single_org() {
        let list: RepoList = "dotnet/runtime, dotnet/aspire".parse().unwrap();
        assert_eq!(list.org, "dotnet");
        assert_eq!(list.repos, vec!["runtime", "aspire"]);

        let err = "dotnet/runtime,microsoft/vscode".parse::<RepoList>().unwrap_err();
        assert!(matches!(err, InputError::MixedOrgs { .. }));
    }

    #[test]
    fn threshold_range() {
        assert_eq!("0.4".parse::<Threshold>().unwrap().value(), 0.4);
        assert!("1".parse::<Threshold>().is_ok());
        assert!("0".parse::<Threshold>().is_err());
        assert!("1.01".parse::<Threshold>().is_err());
        assert!("high".parse::<Threshold>().is_err());
    }

    #[test]
    fn threshold_is_closed_at_boundary() {
        let threshold = Threshold::new(0.4).unwrap();
        assert!(threshold.is_met_by(0.4));
        let just_below = f32::from_bits(0.4f32.to_bits() - 1);
        assert!(!threshold.is_met_by(just_below));
    }

    #[test]
    fn excluded_authors_ignore_case() {
        let authors: ExcludedAuthors = "dependabot[bot], Octocat".parse().unwrap();
        assert!(authors.contains("octocat"));
        assert!(authors.contains("Dependabot[BOT]"));
        assert!(!authors.contains("someone"));
    }
}
