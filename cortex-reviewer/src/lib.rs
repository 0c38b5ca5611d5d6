//! # cortex-reviewer — heuristic auto-reviewer and rework prompting
//!
//! `spec.md` §4.8. [`Reviewer::assess`] scores a final answer against a
//! closed set of heuristics and reuses `layer0::usage::{Assessment,
//! Grade}` rather than redefining a parallel type — this crate adds
//! the scoring function and the rework-prompt builder, nothing else.

#![deny(missing_docs)]

use cortex_react::StopReason;
use layer0::usage::Assessment;

const INABILITY_PHRASES: &[&str] = &[
    "i cannot",
    "i can't",
    "i'm unable",
    "i am unable",
    "i don't have access",
    "i do not have access",
    "as an ai",
];

const PENDING_PHRASES: &[&str] = &["todo", "to-do", "not yet implemented", "still pending", "work in progress"];

const APOLOGY_PHRASES: &[&str] = &["i apologize", "i'm sorry", "i am sorry", "sorry for"];

/// Configuration for [`Reviewer`].
#[derive(Debug, Clone)]
pub struct ReviewerConfig {
    /// Scores below this threshold set `needs_rework`.
    pub min_passing_score: f64,
    /// Maximum number of rework iterations the coordinator may request.
    pub max_rework_attempts: u32,
    /// How many characters of the prior answer to embed in a rework
    /// prompt before truncating with `"..."`.
    pub truncate_chars: usize,
}

impl Default for ReviewerConfig {
    fn default() -> Self {
        Self {
            min_passing_score: 0.7,
            max_rework_attempts: 1,
            truncate_chars: 1500,
        }
    }
}

/// Heuristic reviewer over a final answer. Stateless: every method
/// takes its inputs explicitly.
pub struct Reviewer {
    config: ReviewerConfig,
}

impl Reviewer {
    /// Build a reviewer with the given configuration.
    pub fn new(config: ReviewerConfig) -> Self {
        Self { config }
    }

    /// Score `answer` against the closed heuristic feature set
    /// (`spec.md` §4.8), deriving `needs_rework` from
    /// `config.min_passing_score`.
    pub fn assess(&self, answer: &str, stop_reason: StopReason, iterations_completed: u32) -> Assessment {
        let lower = answer.to_ascii_lowercase();
        let word_count = answer.split_whitespace().count();

        let mut score = 1.0f64;
        let mut notes = Vec::new();

        if word_count < 10 {
            score -= 0.4;
            notes.push(format!("very short answer ({word_count} words)"));
        } else if word_count < 30 {
            score -= 0.2;
            notes.push(format!("short answer ({word_count} words)"));
        }

        if INABILITY_PHRASES.iter().any(|p| lower.contains(p)) {
            score -= 0.3;
            notes.push("answer contains an explicit inability phrase".to_string());
        }

        if PENDING_PHRASES.iter().any(|p| lower.contains(p)) {
            score -= 0.2;
            notes.push("answer mentions unfinished/pending work".to_string());
        }

        if APOLOGY_PHRASES.iter().any(|p| lower.contains(p)) {
            score -= 0.1;
            notes.push("answer contains an apology marker".to_string());
        }

        if answer.contains("```") {
            score += 0.05;
            notes.push("answer includes a code fence".to_string());
        }

        if stop_reason == StopReason::MaxIterations {
            score -= 0.2;
            notes.push("engine stopped on max_iterations rather than a clean stop".to_string());
        }

        if iterations_completed <= 1 && word_count < 30 {
            score -= 0.15;
            notes.push("single short iteration with no elaboration".to_string());
        }

        let score = score.clamp(0.0, 1.0);
        let needs_rework = score < self.config.min_passing_score;
        Assessment::from_score(score, notes, needs_rework)
    }

    /// Whether another rework attempt is allowed given `attempts_made`
    /// so far (not counting the original attempt).
    pub fn rework_allowed(&self, attempts_made: u32) -> bool {
        attempts_made < self.config.max_rework_attempts
    }

    /// Build a rework prompt embedding the reviewer's grade, notes, and
    /// a truncated copy of the prior answer.
    pub fn build_rework_prompt(&self, original_task: &str, assessment: &Assessment, prior_answer: &str) -> String {
        let truncated = truncate(prior_answer, self.config.truncate_chars);
        let notes = if assessment.notes.is_empty() {
            "(no notes)".to_string()
        } else {
            assessment.notes.join("; ")
        };
        format!(
            "Your previous answer to the task below was graded {grade:?} (score {score:.2}) \
             and needs rework. Reviewer notes: {notes}\n\n\
             Original task:\n{original_task}\n\n\
             Your previous answer:\n{truncated}\n\n\
             Revise your answer to address the reviewer's notes.",
            grade = assessment.grade,
            score = assessment.score,
        )
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_confident_answer_scores_high() {
        let reviewer = Reviewer::new(ReviewerConfig::default());
        let answer = "Here is a thorough answer. ".repeat(10);
        let assessment = reviewer.assess(&answer, StopReason::Stop, 2);
        assert!(assessment.score >= 0.7);
        assert!(!assessment.needs_rework);
    }

    #[test]
    fn short_answer_with_inability_phrase_needs_rework() {
        let reviewer = Reviewer::new(ReviewerConfig::default());
        let assessment = reviewer.assess("I cannot help with that.", StopReason::Stop, 1);
        assert!(assessment.needs_rework);
        assert!(assessment.notes.iter().any(|n| n.contains("inability")));
    }

    #[test]
    fn max_iterations_stop_reason_penalized() {
        let reviewer = Reviewer::new(ReviewerConfig::default());
        let long_answer = "word ".repeat(40);
        let clean = reviewer.assess(&long_answer, StopReason::Stop, 3);
        let maxed_out = reviewer.assess(&long_answer, StopReason::MaxIterations, 3);
        assert!(maxed_out.score < clean.score);
    }

    #[test]
    fn score_never_exceeds_one() {
        let reviewer = Reviewer::new(ReviewerConfig::default());
        let answer = format!("```rust\nfn main() {{}}\n```\n{}", "detailed explanation ".repeat(20));
        let assessment = reviewer.assess(&answer, StopReason::Stop, 3);
        assert!(assessment.score <= 1.0);
    }

    #[test]
    fn rework_allowed_respects_max_attempts() {
        let reviewer = Reviewer::new(ReviewerConfig {
            max_rework_attempts: 1,
            ..ReviewerConfig::default()
        });
        assert!(reviewer.rework_allowed(0));
        assert!(!reviewer.rework_allowed(1));
    }

    #[test]
    fn rework_prompt_truncates_long_prior_answer() {
        let reviewer = Reviewer::new(ReviewerConfig {
            truncate_chars: 10,
            ..ReviewerConfig::default()
        });
        let assessment = Assessment::from_score(0.4, vec!["too short".into()], true);
        let prompt = reviewer.build_rework_prompt("do the thing", &assessment, "0123456789ABCDEF");
        assert!(prompt.contains("0123456789..."));
        assert!(!prompt.contains("ABCDEF"));
    }
}
