//! In-memory forge and model doubles shared by workflow and orchestrator tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::classifier::{Candidate, Classifier, LabelPrediction};
use crate::error::ClassifierError;
use crate::forge::{ForgeError, ItemGateway, ItemKind, Page, PageRequest, PageSource, Record};
use crate::input::RepoRef;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Add(u64, String),
    Remove(u64, String),
}

/// Stores records by number; label calls are recorded and applied to the stored record.
#[derive(Default)]
pub struct MockGateway {
    records: Mutex<HashMap<u64, Record>>,
    calls: Mutex<Vec<Call>>,
    pub fail_mutations: bool,
    pub panic_on: Option<u64>,
}

impl MockGateway {
    pub fn with_records(records: Vec<Record>) -> Self {
        Self {
            records: Mutex::new(records.into_iter().map(|r| (r.number, r)).collect()),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn record(&self, number: u64) -> Option<Record> {
        self.records.lock().unwrap().get(&number).cloned()
    }

    fn mutate(&self, call: Call) -> Result<(), ForgeError> {
        self.calls.lock().unwrap().push(call.clone());
        if self.fail_mutations {
            return Err(ForgeError::Api {
                status: 422,
                message: "validation failed".into(),
            });
        }
        let mut records = self.records.lock().unwrap();
        match call {
            Call::Add(number, label) => {
                if let Some(record) = records.get_mut(&number) {
                    record.labels.push(label);
                }
            }
            Call::Remove(number, label) => {
                if let Some(record) = records.get_mut(&number) {
                    record.labels.retain(|l| !l.eq_ignore_ascii_case(&label));
                }
            }
        }
        Ok(())
    }
}

impl ItemGateway for MockGateway {
    async fn fetch_one(
        &self,
        _repo: &RepoRef,
        _kind: ItemKind,
        number: u64,
    ) -> Result<Option<Record>, ForgeError> {
        if self.panic_on == Some(number) {
            panic!("gateway exploded on #{number}");
        }
        Ok(self.record(number))
    }

    async fn add_label(
        &self,
        _repo: &RepoRef,
        _kind: ItemKind,
        number: u64,
        label: &str,
    ) -> Result<(), ForgeError> {
        self.mutate(Call::Add(number, label.to_string()))
    }

    async fn remove_label(
        &self,
        _repo: &RepoRef,
        _kind: ItemKind,
        number: u64,
        label: &str,
    ) -> Result<(), ForgeError> {
        self.mutate(Call::Remove(number, label.to_string()))
    }
}

/// Serves a fixed record list as a single page, filtered by the requested kind.
pub struct StaticSource(pub Vec<Record>);

impl PageSource for StaticSource {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page, ForgeError> {
        Ok(Page {
            records: self
                .0
                .iter()
                .filter(|r| r.kind == request.kind)
                .cloned()
                .collect(),
            end_cursor: None,
            has_next_page: false,
        })
    }
}

/// Answers with fixed candidates per item number.
#[derive(Default)]
pub struct MockClassifier {
    responses: HashMap<u64, Vec<Candidate>>,
    calls: AtomicUsize,
    pub fail: bool,
}

impl MockClassifier {
    pub fn with(responses: Vec<(u64, Vec<Candidate>)>) -> Self {
        Self {
            responses: responses.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Classifier for MockClassifier {
    async fn predict(&self, record: &Record) -> Result<Option<LabelPrediction>, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ClassifierError::Parse("model unavailable".into()));
        }
        Ok(self
            .responses
            .get(&record.number)
            .cloned()
            .map(LabelPrediction::new))
    }
}

pub fn issue(number: u64, labels: &[&str]) -> Record {
    Record {
        kind: ItemKind::Issue,
        number,
        title: format!("Issue {number}"),
        body: "body".into(),
        author: Some("octocat".into()),
        labels: labels.iter().map(|l| l.to_string()).collect(),
        has_more_labels: false,
        files: Vec::new(),
        folders: Vec::new(),
    }
}
