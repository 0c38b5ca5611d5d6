//! # cortex-coordinator — task coordinator
//!
//! `spec.md` §4.7. The coordinator owns one task's [`cortex_workflow::Workflow`]
//! and drives it through the `prepare` -> `execute` -> `summarize` ->
//! `persist` stage sequence, calling out to `cortex-prep`, `cortex-react`,
//! and `cortex-reviewer` for the work each stage actually performs.
//!
//! Grounded on `neuron-orch-kit`/`neuron-orch-local`'s `OrchestratedRunner`/
//! `LocalOrch`: a thin driver over already-decomposed collaborators,
//! rather than a crate that reimplements their logic inline.

#![deny(missing_docs)]

mod coordinator;
mod error;

pub use coordinator::{Coordinator, ExecuteTaskRequest, ExecuteTaskResult, TaskOutcome};
pub use error::CoordError;
