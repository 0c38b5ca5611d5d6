//! Sliding window context strategy.

use async_trait::async_trait;
use cortex_core::error::ContextPortError;
use cortex_core::ports::{ContextManager, TurnRecord, Window};
use layer0::content::ContentBlock;
use layer0::session::{Message, Session};

/// Sliding window `ContextManager`.
///
/// When a message list exceeds a token limit, drops the oldest messages
/// while keeping the first (typically the initial user message) and as
/// many of the most recent messages as fit within a target budget.
pub struct SlidingWindow {
    chars_per_token: usize,
}

impl SlidingWindow {
    /// Create a new sliding window with the default estimation ratio
    /// (4 characters per token).
    pub fn new() -> Self {
        Self { chars_per_token: 4 }
    }

    /// Create with a custom chars-per-token ratio.
    pub fn with_ratio(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }

    fn estimate_block_tokens(&self, block: &ContentBlock) -> u64 {
        let chars = match block {
            ContentBlock::Text { text } => text.len(),
            ContentBlock::ToolUse { input, .. } => input.to_string().len(),
            ContentBlock::ToolResult { content, .. } => content.len(),
            ContentBlock::Image { .. } => return 1000,
            ContentBlock::Custom { data, .. } => data.to_string().len(),
        };
        (chars / self.chars_per_token) as u64
    }

    fn estimate_message_tokens(&self, msg: &Message) -> u64 {
        let mut total = (msg.content.len() / self.chars_per_token) as u64;
        for block in msg.tool_calls.iter().chain(msg.tool_results.iter()) {
            total += self.estimate_block_tokens(block);
        }
        total + 4 // overhead per message (role, formatting)
    }

    /// Drop oldest messages, keeping the first and as much recent
    /// context as fits within `target` tokens.
    fn compact_to(&self, messages: &[Message], target: u64) -> Vec<Message> {
        if messages.len() <= 2 {
            return messages.to_vec();
        }

        let first = messages[0].clone();
        let rest = &messages[1..];

        let mut kept = Vec::new();
        let mut current_tokens = self.estimate_message_tokens(&first);

        for msg in rest.iter().rev() {
            let msg_tokens = self.estimate_message_tokens(msg);
            if current_tokens + msg_tokens > target && !kept.is_empty() {
                break;
            }
            kept.push(msg.clone());
            current_tokens += msg_tokens;
        }

        kept.reverse();
        let mut result = vec![first];
        result.extend(kept);
        result
    }
}

impl Default for SlidingWindow {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContextManager for SlidingWindow {
    fn estimate_tokens(&self, messages: &[Message]) -> u64 {
        messages.iter().map(|m| self.estimate_message_tokens(m)).sum()
    }

    async fn compress(
        &self,
        messages: &[Message],
        target: u64,
    ) -> Result<Vec<Message>, ContextPortError> {
        Ok(self.compact_to(messages, target))
    }

    async fn build_window(
        &self,
        session: &Session,
        limit: u64,
    ) -> Result<Window, ContextPortError> {
        let messages: Vec<Message> = session.messages.clone();
        let estimated = self.estimate_tokens(&messages);
        if estimated <= limit {
            return Ok(Window {
                messages,
                estimated_tokens: estimated,
            });
        }
        let compacted = self.compact_to(&messages, limit);
        let estimated_tokens = self.estimate_tokens(&compacted);
        Ok(Window {
            messages: compacted,
            estimated_tokens,
        })
    }

    async fn record_turn(&self, _record: TurnRecord) -> Result<(), ContextPortError> {
        Ok(())
    }
}
