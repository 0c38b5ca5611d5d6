//! Usage accounting and final-answer assessment types.

use crate::id::SessionId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One billing/accounting record for a single model call. Immutable
/// once recorded — a cost tracker appends these, it never edits one
/// after the fact.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    /// The session the call belongs to.
    pub session: SessionId,
    /// Model identifier (provider-specific string, e.g. "claude-opus-4").
    pub model: String,
    /// Provider identifier (e.g. "anthropic", "openai").
    pub provider: String,
    /// Input tokens consumed.
    pub input_tokens: u64,
    /// Output tokens generated.
    pub output_tokens: u64,
    /// Total tokens (input + output).
    pub total_tokens: u64,
    /// Input cost in USD.
    pub input_cost: Decimal,
    /// Output cost in USD.
    pub output_cost: Decimal,
    /// Total cost in USD.
    pub total_cost: Decimal,
    /// When this record was created (milliseconds since epoch).
    pub timestamp: u64,
}

impl UsageRecord {
    /// Construct a usage record, deriving the `total_*` fields from
    /// their input/output components.
    pub fn new(
        session: SessionId,
        model: impl Into<String>,
        provider: impl Into<String>,
        input_tokens: u64,
        output_tokens: u64,
        input_cost: Decimal,
        output_cost: Decimal,
        timestamp: u64,
    ) -> Self {
        Self {
            session,
            model: model.into(),
            provider: provider.into(),
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            input_cost,
            output_cost,
            total_cost: input_cost + output_cost,
            timestamp,
        }
    }
}

/// Letter grade assigned by the auto-reviewer.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Grade {
    /// Excellent.
    A,
    /// Good.
    B,
    /// Acceptable.
    C,
    /// Poor.
    D,
    /// Unacceptable.
    F,
}

/// The auto-reviewer's heuristic judgment of a final answer.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    /// Score in [0, 1].
    pub score: f64,
    /// Letter grade derived from the score.
    pub grade: Grade,
    /// Free-form notes explaining the score.
    pub notes: Vec<String>,
    /// Whether the reviewer recommends a rework iteration.
    pub needs_rework: bool,
}

impl Assessment {
    /// Construct an assessment, deriving the grade from the score via
    /// the standard cutoffs (A >= 0.9, B >= 0.8, C >= 0.7, D >= 0.6, else F).
    pub fn from_score(score: f64, notes: Vec<String>, needs_rework: bool) -> Self {
        let grade = if score >= 0.9 {
            Grade::A
        } else if score >= 0.8 {
            Grade::B
        } else if score >= 0.7 {
            Grade::C
        } else if score >= 0.6 {
            Grade::D
        } else {
            Grade::F
        };
        Self {
            score,
            grade,
            notes,
            needs_rework,
        }
    }
}
