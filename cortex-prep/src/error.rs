//! Errors from the execution preparation pipeline.

use cortex_core::error::{ContextPortError, ModelError, SessionStoreError};
use cortex_preset::PresetError;
use thiserror::Error;

/// Errors from [`crate::Preparer::prepare`] (`spec.md` §4.5).
///
/// Every variant here corresponds to a step whose failure is fatal —
/// session acquisition, context compression, and tool preset
/// resolution all abort preparation outright. Pre-analysis, history
/// summarization fallback, and RAG preload degrade gracefully instead
/// and never surface as this error.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum PrepError {
    /// Session acquisition (create or load) failed.
    #[error("session acquisition failed: {0}")]
    SessionStore(#[from] SessionStoreError),

    /// Context compression failed.
    #[error("context compression failed: {0}")]
    Context(#[from] ContextPortError),

    /// A required (non-best-effort) model call failed.
    #[error("model call failed: {0}")]
    Model(#[from] ModelError),

    /// Tool preset resolution failed (unknown preset name).
    #[error("preset resolution failed: {0}")]
    Preset(#[from] PresetError),
}
