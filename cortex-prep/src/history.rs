//! History recall (`spec.md` §4.5 step 5): fold relevant prior session
//! messages back into the working message list, tagged
//! [`MessageSource::UserHistory`] so they're never persisted back.

use cortex_core::ports::{CompletionRequest, ContextManager, ModelClient};
use layer0::session::{Message, MessageSource, Role, Session};

/// Fraction of the token limit above which recalled history is
/// summarized instead of inlined verbatim.
const SUMMARIZE_THRESHOLD_NUMERATOR: u64 = 70;
const SUMMARIZE_THRESHOLD_DENOMINATOR: u64 = 100;

fn is_recallable(message: &Message) -> bool {
    message.role != Role::System
        && message.source != MessageSource::UserHistory
        && message.source != MessageSource::Debug
}

/// Recall `session`'s prior history into `working_messages`, choosing
/// between a one-shot summary and an inline clone based on estimated
/// token cost against `token_limit`.
///
/// The raw (inline) path keeps tool-result messages; the summarized
/// path excludes them before the summarization call, since a textual
/// summary of a tool result carries little of its value and bloats the
/// prompt sent to produce the summary (`spec.md` §9's resolution of
/// this inconsistency).
pub async fn recall_history(
    session: &Session,
    token_limit: u64,
    context: &dyn ContextManager,
    model: &dyn ModelClient,
) -> Vec<Message> {
    let eligible: Vec<Message> = session.messages.iter().filter(|m| is_recallable(m)).cloned().collect();

    if eligible.is_empty() {
        return vec![];
    }

    let estimated = context.estimate_tokens(&eligible);
    let threshold = token_limit * SUMMARIZE_THRESHOLD_NUMERATOR / SUMMARIZE_THRESHOLD_DENOMINATOR;

    if estimated <= threshold {
        return eligible
            .into_iter()
            .map(|mut m| {
                m.source = MessageSource::UserHistory;
                m
            })
            .collect();
    }

    let without_tool_results: Vec<Message> = eligible
        .iter()
        .filter(|m| m.source != MessageSource::ToolResult)
        .cloned()
        .collect();

    match summarize(&without_tool_results, model).await {
        Some(summary) => vec![Message::new(Role::System, summary, MessageSource::UserHistory)],
        None => {
            tracing::debug!("history summarization failed, falling back to inline recall");
            eligible
                .into_iter()
                .map(|mut m| {
                    m.source = MessageSource::UserHistory;
                    m
                })
                .collect()
        }
    }
}

async fn summarize(messages: &[Message], model: &dyn ModelClient) -> Option<String> {
    if messages.is_empty() {
        return None;
    }

    let mut transcript = String::new();
    for message in messages {
        transcript.push_str(&format!("{:?}: {}\n", message.role, message.content));
    }

    let prompt = format!(
        "Summarize the following prior conversation concisely, preserving any \
         facts, decisions, or constraints the assistant will need later:\n\n{transcript}"
    );

    let request = CompletionRequest::new(vec![Message::new(Role::User, prompt, MessageSource::Debug)]);

    match model.complete(request).await {
        Ok(response) => Some(response.content),
        Err(err) => {
            tracing::debug!(error = %err, "history summarization call failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cortex_core::error::ModelError;
    use cortex_core::ports::{CompletionResponse, Usage};

    struct FixedContext {
        tokens_per_call: u64,
    }

    #[async_trait]
    impl ContextManager for FixedContext {
        fn estimate_tokens(&self, messages: &[Message]) -> u64 {
            messages.len() as u64 * self.tokens_per_call
        }

        async fn compress(
            &self,
            messages: &[Message],
            _target: u64,
        ) -> Result<Vec<Message>, cortex_core::error::ContextPortError> {
            Ok(messages.to_vec())
        }

        async fn build_window(
            &self,
            session: &Session,
            limit: u64,
        ) -> Result<cortex_core::ports::Window, cortex_core::error::ContextPortError> {
            Ok(cortex_core::ports::Window {
                messages: session.messages.clone(),
                estimated_tokens: limit,
            })
        }
    }

    struct EchoModel;

    #[async_trait]
    impl ModelClient for EchoModel {
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, ModelError> {
            Ok(CompletionResponse {
                content: "summary of the above".into(),
                tool_calls: vec![],
                stop_reason: "end_turn".into(),
                usage: Usage::new(10, 5),
            })
        }

        fn model(&self) -> &str {
            "echo"
        }
    }

    struct FailingModel;

    #[async_trait]
    impl ModelClient for FailingModel {
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, ModelError> {
            Err(ModelError::RequestFailed("boom".into()))
        }

        fn model(&self) -> &str {
            "echo"
        }
    }

    fn session_with(messages: Vec<Message>) -> Session {
        let mut session = Session::new(layer0::id::SessionId::new("s1"), 0);
        session.messages = messages;
        session
    }

    #[tokio::test]
    async fn small_history_is_inlined_and_tagged() {
        let session = session_with(vec![Message::new(Role::User, "hi", MessageSource::UserInput)]);
        let context = FixedContext { tokens_per_call: 1 };
        let recalled = recall_history(&session, 1000, &context, &EchoModel).await;
        assert_eq!(recalled.len(), 1);
        assert_eq!(recalled[0].source, MessageSource::UserHistory);
        assert_eq!(recalled[0].content, "hi");
    }

    #[tokio::test]
    async fn large_history_is_summarized_into_one_message() {
        let session = session_with(vec![
            Message::new(Role::User, "hi", MessageSource::UserInput),
            Message::new(Role::Assistant, "hello", MessageSource::AssistantReply),
        ]);
        let context = FixedContext { tokens_per_call: 1000 };
        let recalled = recall_history(&session, 100, &context, &EchoModel).await;
        assert_eq!(recalled.len(), 1);
        assert_eq!(recalled[0].source, MessageSource::UserHistory);
        assert_eq!(recalled[0].content, "summary of the above");
    }

    #[tokio::test]
    async fn summarization_failure_falls_back_to_inline() {
        let session = session_with(vec![Message::new(Role::User, "hi", MessageSource::UserInput)]);
        let context = FixedContext { tokens_per_call: 1000 };
        let recalled = recall_history(&session, 100, &context, &FailingModel).await;
        assert_eq!(recalled.len(), 1);
        assert_eq!(recalled[0].content, "hi");
        assert_eq!(recalled[0].source, MessageSource::UserHistory);
    }

    #[tokio::test]
    async fn tool_results_excluded_from_summarized_path_but_kept_when_inlined() {
        let mut tool_msg = Message::new(Role::Tool, "tool output", MessageSource::ToolResult);
        tool_msg.metadata.insert("marker".into(), "x".into());
        let session = session_with(vec![
            Message::new(Role::User, "hi", MessageSource::UserInput),
            tool_msg.clone(),
        ]);

        let small_context = FixedContext { tokens_per_call: 1 };
        let inline = recall_history(&session, 1000, &small_context, &EchoModel).await;
        assert!(inline.iter().any(|m| m.source == MessageSource::UserHistory && m.content == "tool output"));

        let large_context = FixedContext { tokens_per_call: 1000 };
        let summarized = recall_history(&session, 100, &large_context, &EchoModel).await;
        assert_eq!(summarized.len(), 1);
        assert_eq!(summarized[0].content, "summary of the above");
    }
}
