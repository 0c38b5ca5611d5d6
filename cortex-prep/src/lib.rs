//! # cortex-prep — Execution Preparation
//!
//! `spec.md` §4.5. [`Preparer::prepare`] runs the eight-step pipeline
//! every ReAct invocation goes through before its first iteration:
//! session acquisition, context compression, per-session client
//! isolation, optional pre-analysis, history recall, inherited
//! subagent state, tool registry selection, and optional RAG preload.
//!
//! Three of these steps have no analog in the teacher repo's ReAct
//! operator and are built directly from the specification: pre-analysis
//! ([`analysis`]), history recall's summarize/inline split
//! ([`history`]), and RAG preload ([`rag`]). The rest compose
//! `cortex-cost`, `cortex-preset`, and `cortex-context`'s already
//! established ports.

#![deny(missing_docs)]

pub mod analysis;
mod error;
pub mod history;
mod preparation;
pub mod rag;

pub use error::PrepError;
pub use preparation::{ExecutionEnvironment, PrepConfig, PrepareRequest, Preparer};
