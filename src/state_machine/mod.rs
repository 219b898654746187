mod decision;
mod workflow;

#[cfg(test)]
pub(crate) mod testing;

pub use decision::{ItemDecision, ItemReport};
pub use workflow::{PredictionWorkflow, WorkflowSettings};

#[cfg(test)]
pub use decision::{Mutation, MutationAction, MutationStatus};
