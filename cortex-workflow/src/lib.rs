//! # cortex-workflow — named-node workflow state machine and event translator
//!
//! Two collaborating pieces (`spec.md` §4.1, §4.2):
//!
//! - [`Workflow`]: an insertion-ordered list of named nodes with strict
//!   `Pending -> Running -> {Succeeded | Failed}` transitions, a derived
//!   phase, and a synchronous, registration-ordered listener fan-out.
//! - [`Translator`]: wraps a [`cortex_core::Listener`] and is itself one,
//!   turning domain envelopes (`node_added`, `node_started`, ...) into
//!   the wire-stable `workflow.*` event stream, with subflow aggregation
//!   and recorder-only node filtering along the way.

#![deny(missing_docs)]

mod translator;
mod workflow;

pub use translator::{SubflowKey, Translator};
pub use workflow::{phase_of, Workflow, WorkflowContext, WorkflowError};
