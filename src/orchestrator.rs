use std::any::Any;
use std::sync::Arc;

use tokio::task::JoinError;
use tracing::{error, info};

use crate::classifier::Classifier;
use crate::forge::{ItemGateway, ItemKind};
use crate::state_machine::{ItemDecision, ItemReport, PredictionWorkflow};

/// Outcome of a whole batch, ordered by item number.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub items: Vec<ItemReport>,
    /// Logical AND of every item's success.
    pub success: bool,
}

impl BatchReport {
    pub fn new(mut items: Vec<ItemReport>) -> Self {
        items.sort_by_key(|item| item.number);
        let success = items.iter().all(ItemReport::success);
        Self { items, success }
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemReport> {
        self.items.iter().filter(|item| !item.success())
    }

    pub fn skipped(&self) -> usize {
        self.items.iter().filter(|item| item.decision.is_skip()).count()
    }
}

/// Fans out one prediction unit per item and joins them all.
pub struct Orchestrator<G, C> {
    workflow: Arc<PredictionWorkflow<G, C>>,
}

impl<G, C> Orchestrator<G, C>
where
    G: ItemGateway + 'static,
    C: Classifier + 'static,
{
    pub fn new(workflow: PredictionWorkflow<G, C>) -> Self {
        Self {
            workflow: Arc::new(workflow),
        }
    }

    /// Runs every unit concurrently and waits for all of them.
    ///
    /// A unit that panics is reported as a faulted item; its siblings still
    /// complete.
    pub async fn run_all<I>(&self, units: I) -> BatchReport
    where
        I: IntoIterator<Item = (ItemKind, u64)>,
    {
        let repo = &self.workflow.settings().repo;
        let handles: Vec<_> = units
            .into_iter()
            .map(|(kind, number)| {
                info!("[{kind} {repo}#{number}] Queued for prediction.");
                let workflow = Arc::clone(&self.workflow);
                let handle = tokio::spawn(async move { workflow.process(kind, number).await });
                (kind, number, handle)
            })
            .collect();

        let mut items = Vec::with_capacity(handles.len());
        for (kind, number, handle) in handles {
            let report = match handle.await {
                Ok(report) => report,
                Err(err) => {
                    let cause = join_failure(err);
                    error!("[{kind} {repo}#{number}] {cause}");
                    ItemReport::new(kind, number, ItemDecision::Faulted { cause })
                }
            };
            items.push(report);
        }

        BatchReport::new(items)
    }
}

fn join_failure(err: JoinError) -> String {
    if err.is_cancelled() {
        return "task was cancelled".to_string();
    }
    match err.try_into_panic() {
        Ok(payload) => format!("task panicked: {}", panic_message(payload.as_ref())),
        Err(err) => format!("task failed: {err}"),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
