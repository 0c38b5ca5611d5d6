//! RAG preload (`spec.md` §4.5 step 8): a bounded, best-effort set of
//! retrieval calls run before the ReAct loop starts, so the model opens
//! its first iteration with relevant context already in hand.
//!
//! Never fatal: a missing tool degrades to a summary note rather than
//! aborting preparation, and every individual call failure is folded
//! into that note instead of propagated.

use crate::analysis::TaskAnalysis;
use cortex_core::ports::{CompletionRequest, ModelClient, ToolRegistryPort};
use cortex_core::tool_call::ToolCall;
use layer0::id::{SessionId, TaskId};
use layer0::session::{Message, MessageSource, Role};
use serde_json::json;

/// Tool names RAG preload looks for, in the order they're attempted.
const CODE_SEARCH_TOOL: &str = "code_search";
const WEB_SEARCH_TOOL: &str = "web_search";
const WEB_FETCH_TOOL: &str = "web_fetch";

/// Upper bound on `web_fetch` calls per preload pass.
const MAX_WEB_FETCH_CALLS: usize = 3;

/// Directives derived from pre-analysis that RAG preload acts on.
#[derive(Debug, Clone)]
pub struct RagDirectives {
    /// Free-text summary of why retrieval is warranted, used both to
    /// seed tool queries and to annotate session metadata.
    pub summary: String,
}

/// Derive RAG directives from a task analysis. Returns `None` when
/// nothing in the analysis implies external context is needed.
pub fn derive_directives(analysis: &TaskAnalysis) -> Option<RagDirectives> {
    if !analysis.wants_external_context() {
        return None;
    }
    let summary = analysis
        .retrieval_plan
        .clone()
        .unwrap_or_else(|| analysis.approach.clone());
    Some(RagDirectives { summary })
}

/// The outcome of a preload pass.
#[derive(Debug, Clone, Default)]
pub struct RagPreloadResult {
    /// Tool-result-tagged messages to fold into the working history.
    pub messages: Vec<Message>,
    /// A human-readable note summarizing what preload did (and what it
    /// skipped), stored in session metadata.
    pub note: String,
}

/// Run bounded RAG preload against `directives`, using whatever of
/// `code_search`/`web_search`/`web_fetch` are present in `tools`.
pub async fn run_rag_preload(
    directives: &RagDirectives,
    tools: &dyn ToolRegistryPort,
    model: &dyn ModelClient,
    session: SessionId,
    task: TaskId,
) -> RagPreloadResult {
    let mut messages = Vec::new();
    let mut notes = Vec::new();

    if let Some(tool) = tools.get(CODE_SEARCH_TOOL) {
        let call = ToolCall::new(
            "rag:code_search",
            CODE_SEARCH_TOOL,
            json!({ "query": directives.summary }),
            session.clone(),
            task.clone(),
        );
        match tool.execute(&call).await {
            Ok(result) => {
                messages.push(tool_result_message(&result.content));
                notes.push("ran code_search once".to_string());
            }
            Err(err) => notes.push(format!("code_search failed: {err}")),
        }
    } else {
        notes.push("code_search tool unavailable, skipped".to_string());
    }

    let mut fetch_urls: Vec<String> = Vec::new();

    if let Some(tool) = tools.get(WEB_SEARCH_TOOL) {
        let query = refine_query(&directives.summary, model).await;
        let call = ToolCall::new(
            "rag:web_search",
            WEB_SEARCH_TOOL,
            json!({ "query": query }),
            session.clone(),
            task.clone(),
        );
        match tool.execute(&call).await {
            Ok(result) => {
                fetch_urls = extract_urls(&result.content);
                messages.push(tool_result_message(&result.content));
                notes.push("ran web_search once".to_string());
            }
            Err(err) => notes.push(format!("web_search failed: {err}")),
        }
    } else {
        notes.push("web_search tool unavailable, skipped".to_string());
    }

    if let Some(tool) = tools.get(WEB_FETCH_TOOL) {
        if fetch_urls.is_empty() {
            notes.push("web_fetch available but no URLs surfaced by web_search".to_string());
        }
        for (index, url) in fetch_urls.iter().take(MAX_WEB_FETCH_CALLS).enumerate() {
            let call = ToolCall::new(
                format!("rag:web_fetch:{index}"),
                WEB_FETCH_TOOL,
                json!({ "url": url }),
                session.clone(),
                task.clone(),
            );
            match tool.execute(&call).await {
                Ok(result) => messages.push(tool_result_message(&result.content)),
                Err(err) => notes.push(format!("web_fetch({url}) failed: {err}")),
            }
        }
        if fetch_urls.len() > MAX_WEB_FETCH_CALLS {
            notes.push(format!(
                "{} additional URLs were not fetched (bounded to {MAX_WEB_FETCH_CALLS})",
                fetch_urls.len() - MAX_WEB_FETCH_CALLS
            ));
        }
    } else if !fetch_urls.is_empty() {
        notes.push("web_fetch tool unavailable, skipped despite surfaced URLs".to_string());
    }

    RagPreloadResult {
        messages,
        note: notes.join("; "),
    }
}

fn tool_result_message(content: &str) -> Message {
    Message::new(Role::Tool, content, MessageSource::ToolResult)
}

/// Best-effort query refinement through the model. Falls back to the
/// original summary text on any failure — refinement is a nicety, not
/// a requirement (`spec.md` §4.5 step 8's "optionally").
async fn refine_query(summary: &str, model: &dyn ModelClient) -> String {
    let request = CompletionRequest::new(vec![Message::new(
        Role::User,
        format!("Write a single, concise web search query for: {summary}"),
        MessageSource::Debug,
    )]);

    match model.complete(request).await {
        Ok(response) if !response.content.trim().is_empty() => response.content.trim().to_string(),
        _ => summary.to_string(),
    }
}

/// Extract `http(s)://` URLs from a tool result's plain-text content.
/// `web_search` tools are not assumed to return structured data here —
/// this is a plain substring scan, generous about what counts as a URL
/// boundary.
fn extract_urls(content: &str) -> Vec<String> {
    let mut urls = Vec::new();
    for word in content.split_whitespace() {
        let trimmed = word.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '/' && c != ':' && c != '.' && c != '-' && c != '_');
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            urls.push(trimmed.to_string());
        }
    }
    urls
}
