//! Pre-analysis (`spec.md` §4.5 step 4): a short, low-temperature model
//! call that sketches the task before the ReAct loop starts, parsed
//! defensively out of a fixed `<task_analysis>` XML schema.

use cortex_core::ports::{CompletionRequest, ModelClient};
use std::time::Duration;

/// Upper bound on the pre-analysis call's output length.
pub const MAX_ANALYSIS_TOKENS: u32 = 450;

/// Upper bound on how long preparation waits for pre-analysis.
pub const ANALYSIS_TIMEOUT: Duration = Duration::from_secs(5);

/// Sampling temperature used for the pre-analysis call. Low, so the
/// sketch is stable across runs of the same task.
pub const ANALYSIS_TEMPERATURE: f64 = 0.1;

/// One step of the task's planned approach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisStep {
    /// What this step does.
    pub description: String,
    /// Whether this step is expected to need information outside the
    /// model's own knowledge (tool use, retrieval, the outside world).
    pub requires_external_context: bool,
}

/// The parsed result of a pre-analysis call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskAnalysis {
    /// The single action the task boils down to.
    pub action: String,
    /// The underlying goal behind the action.
    pub goal: String,
    /// The planned approach, in prose.
    pub approach: String,
    /// Criteria the final answer should satisfy to count as done.
    pub success_criteria: Vec<String>,
    /// The step breakdown.
    pub steps: Vec<AnalysisStep>,
    /// Free-form retrieval plan, if the model proposed one.
    pub retrieval_plan: Option<String>,
}

impl TaskAnalysis {
    /// Whether any step (or the retrieval plan) implies external
    /// context is needed — the signal `crate::rag` uses to decide
    /// whether to run RAG preload at all.
    pub fn wants_external_context(&self) -> bool {
        self.retrieval_plan.is_some() || self.steps.iter().any(|s| s.requires_external_context)
    }
}

/// The system prompt for the pre-analysis call, instructing the model
/// to answer with exactly the fixed schema this module parses.
pub fn analysis_prompt(task_description: &str) -> String {
    format!(
        "Analyze the following task. Respond with exactly one \
         <task_analysis> block and nothing else, using this shape:\n\
         <task_analysis>\n  \
         <action>...</action>\n  \
         <goal>...</goal>\n  \
         <approach>...</approach>\n  \
         <success_criteria>\n    <criterion>...</criterion>\n  </success_criteria>\n  \
         <steps>\n    <step external=\"true|false\">...</step>\n  </steps>\n  \
         <retrieval_plan>...</retrieval_plan>\n\
         </task_analysis>\n\n\
         Task:\n{task_description}"
    )
}

/// Run the pre-analysis call against `model`, returning `None` on any
/// failure, timeout, or unparseable response — pre-analysis is never
/// fatal to preparation (`spec.md` §4.5 step 4).
pub async fn run_pre_analysis(model: &dyn ModelClient, task_description: &str) -> Option<TaskAnalysis> {
    use layer0::session::{Message, MessageSource, Role};

    let request = CompletionRequest {
        temperature: Some(ANALYSIS_TEMPERATURE),
        max_tokens: Some(MAX_ANALYSIS_TOKENS),
        ..CompletionRequest::new(vec![Message::new(
            Role::User,
            analysis_prompt(task_description),
            MessageSource::Debug,
        )])
    };

    let response = match tokio::time::timeout(ANALYSIS_TIMEOUT, model.complete(request)).await {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => {
            tracing::debug!(error = %err, "pre-analysis call failed, proceeding without it");
            return None;
        }
        Err(_) => {
            tracing::debug!("pre-analysis call timed out, proceeding without it");
            return None;
        }
    };

    parse_task_analysis(&response.content)
}

/// Parse a `<task_analysis>` fragment out of raw model output.
///
/// Accepts the fragment between the first `<task_analysis>` and its
/// matching `</task_analysis>`, even when wrapped in markdown fences or
/// surrounded by other prose — the model is not trusted to emit a bare,
/// well-formed document.
pub fn parse_task_analysis(raw: &str) -> Option<TaskAnalysis> {
    let start = raw.find("<task_analysis>")?;
    let body_start = start + "<task_analysis>".len();
    let end = raw[body_start..].find("</task_analysis>")? + body_start;
    let fragment = &raw[body_start..end];

    let action = extract_tag(fragment, "action").unwrap_or_default();
    let goal = extract_tag(fragment, "goal").unwrap_or_default();
    let approach = extract_tag(fragment, "approach").unwrap_or_default();
    let retrieval_plan = extract_tag(fragment, "retrieval_plan").filter(|s| !s.is_empty());

    let success_criteria = extract_section(fragment, "success_criteria")
        .map(|section| extract_all_tags(&section, "criterion"))
        .unwrap_or_default();

    let steps = extract_section(fragment, "steps")
        .map(|section| extract_all_step_tags(&section))
        .unwrap_or_default();

    if action.is_empty() && goal.is_empty() && approach.is_empty() && steps.is_empty() {
        return None;
    }

    Some(TaskAnalysis {
        action,
        goal,
        approach,
        success_criteria,
        steps,
        retrieval_plan,
    })
}

fn extract_tag(text: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = text.find(&open)? + open.len();
    let end = text[start..].find(&close)? + start;
    Some(text[start..end].trim().to_string())
}

fn extract_section(text: &str, tag: &str) -> Option<String> {
    let open_prefix = format!("<{tag}");
    let open_start = text.find(&open_prefix)?;
    let open_end = text[open_start..].find('>')? + open_start + 1;
    let close = format!("</{tag}>");
    let close_start = text[open_end..].find(&close)? + open_end;
    Some(text[open_end..close_start].to_string())
}

fn extract_all_tags(text: &str, tag: &str) -> Vec<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let mut out = Vec::new();
    let mut cursor = 0;
    while let Some(rel_start) = text[cursor..].find(&open) {
        let start = cursor + rel_start + open.len();
        let Some(rel_end) = text[start..].find(&close) else {
            break;
        };
        let end = start + rel_end;
        out.push(text[start..end].trim().to_string());
        cursor = end + close.len();
    }
    out
}

fn extract_all_step_tags(text: &str) -> Vec<AnalysisStep> {
    let mut out = Vec::new();
    let mut cursor = 0;
    while let Some(rel_start) = text[cursor..].find("<step") {
        let tag_start = cursor + rel_start;
        let Some(rel_tag_end) = text[tag_start..].find('>') else {
            break;
        };
        let tag_end = tag_start + rel_tag_end + 1;
        let attrs = &text[tag_start..tag_end];
        let requires_external_context = attrs.contains("external=\"true\"");

        let Some(rel_close) = text[tag_end..].find("</step>") else {
            break;
        };
        let close_start = tag_end + rel_close;
        out.push(AnalysisStep {
            description: text[tag_end..close_start].trim().to_string(),
            requires_external_context,
        });
        cursor = close_start + "</step>".len();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_fragment() {
        let raw = "<task_analysis>\n\
             <action>write code</action>\n\
             <goal>fix the bug</goal>\n\
             <approach>read then patch</approach>\n\
             <success_criteria><criterion>tests pass</criterion><criterion>no regressions</criterion></success_criteria>\n\
             <steps><step external=\"true\">search the repo</step><step external=\"false\">write the patch</step></steps>\n\
             <retrieval_plan>grep for the failing function</retrieval_plan>\n\
             </task_analysis>";

        let analysis = parse_task_analysis(raw).unwrap();
        assert_eq!(analysis.action, "write code");
        assert_eq!(analysis.goal, "fix the bug");
        assert_eq!(analysis.success_criteria.len(), 2);
        assert_eq!(analysis.steps.len(), 2);
        assert!(analysis.steps[0].requires_external_context);
        assert!(!analysis.steps[1].requires_external_context);
        assert!(analysis.wants_external_context());
    }

    #[test]
    fn accepts_fragment_wrapped_in_markdown_fence() {
        let raw = "Sure, here you go:\n```xml\n<task_analysis><action>a</action><goal>g</goal>\
             <approach>ap</approach></task_analysis>\n```\nLet me know if you need anything else.";
        let analysis = parse_task_analysis(raw).unwrap();
        assert_eq!(analysis.action, "a");
    }

    #[test]
    fn returns_none_for_unrelated_text() {
        assert!(parse_task_analysis("I can help with that.").is_none());
    }

    #[test]
    fn empty_retrieval_plan_is_treated_as_absent() {
        let raw = "<task_analysis><action>a</action><goal>g</goal><approach>ap</approach>\
             <retrieval_plan></retrieval_plan></task_analysis>";
        let analysis = parse_task_analysis(raw).unwrap();
        assert_eq!(analysis.retrieval_plan, None);
    }
}
