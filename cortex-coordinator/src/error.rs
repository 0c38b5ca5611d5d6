//! Errors from [`crate::Coordinator::execute_task`]'s internal stages.
//!
//! `execute_task` itself never returns this type to its caller — every
//! early return path still produces a populated [`crate::ExecuteTaskResult`]
//! (`spec.md` §4.7) — but each stage uses it internally via `?` before
//! being folded into the outcome.

use thiserror::Error;

/// Internal error type threaded through one `execute_task` invocation.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CoordError {
    /// Execution preparation failed.
    #[error("preparation failed: {0}")]
    Prep(#[from] cortex_prep::PrepError),

    /// The ReAct engine returned an error.
    #[error("react engine failed: {0}")]
    React(#[from] cortex_react::ReactError),

    /// A workflow node transition failed.
    #[error("workflow error: {0}")]
    Workflow(#[from] cortex_workflow::WorkflowError),

    /// The session store failed to save the final session.
    #[error("session store failed: {0}")]
    SessionStore(#[from] cortex_core::SessionStoreError),
}

impl CoordError {
    /// Whether this error originated from the run being cancelled, as
    /// opposed to a genuine failure (`spec.md` §5's cancellation path
    /// gets a best-effort session save; a real failure does not).
    pub fn is_cancellation(&self) -> bool {
        matches!(self, CoordError::React(cortex_react::ReactError::Cancelled))
    }
}
