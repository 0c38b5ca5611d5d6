//! Port-level error types.
//!
//! These sit one layer below the richer crate-specific errors
//! (`cortex-tool::ToolError`, `cortex-context::ContextError`,
//! `cortex-prep::PrepError`, `cortex-react::ReactError`,
//! `cortex-coordinator::CoordError`) — each of those wraps the relevant
//! port error with `#[from]` and adds its own variants, the same way
//! `layer0::error::OrchError` wraps `OperatorError`.

use thiserror::Error;

/// Errors from a [`crate::ports::SessionStore`] implementation.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SessionStoreError {
    /// The requested session does not exist.
    #[error("session not found: {0}")]
    NotFound(String),

    /// The backing store failed to read or write.
    #[error("store I/O failed: {0}")]
    Io(String),

    /// The session data failed to (de)serialize.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors from a [`crate::ports::ModelClient`] implementation.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ModelError {
    /// The request could not be sent or the transport failed.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// The provider rate-limited the request.
    #[error("rate limited")]
    RateLimited,

    /// Authentication/authorization failed.
    #[error("auth failed: {0}")]
    AuthFailed(String),

    /// The provider's response could not be parsed.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ModelError {
    /// Whether retrying the request might succeed. The engine itself
    /// does not retry (`spec.md` §4.6's determinism note) — this is
    /// for the model transport's own retry policy.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ModelError::RateLimited | ModelError::RequestFailed(_))
    }
}

/// Errors from a [`crate::ports::ToolRegistryPort`] / [`crate::ports::ToolExecutor`].
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ToolPortError {
    /// The requested tool was not registered.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// Tool execution failed.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// The input given to the tool was invalid.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors from a [`crate::ports::FunctionCallParser`].
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ParserError {
    /// The model content did not contain a recognizable tool call.
    #[error("no tool call found")]
    NoToolCall,

    /// The tool call was malformed.
    #[error("malformed tool call: {0}")]
    Malformed(String),
}

/// Errors from a [`crate::ports::ContextManager`].
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ContextPortError {
    /// Token estimation or compression failed.
    #[error("context operation failed: {0}")]
    Failed(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
