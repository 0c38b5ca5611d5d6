//! Request/response mapping between `cortex-core`'s port types and the
//! Anthropic Messages API wire format.
//!
//! Reference: <https://docs.anthropic.com/en/api/messages>

use cortex_core::error::ModelError;
use cortex_core::ports::{CompletionRequest, CompletionResponse, ToolChoice, ToolDefinition, Usage};
use cortex_core::tool_call::ToolCall;
use layer0::id::{SessionId, TaskId};
use layer0::session::{Message, Role};
use layer0::ContentBlock;

/// Convert a [`CompletionRequest`] into the Anthropic Messages API JSON body.
///
/// `cortex-core`'s [`CompletionRequest`] has no per-call model override —
/// the client's configured model (`spec.md`'s Model Client port) always
/// applies. The returned value does not include `"stream"` — the caller
/// sets that.
pub(crate) fn to_api_request(req: &CompletionRequest, model: &str) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": model,
        "messages": map_messages(&req.messages),
        "max_tokens": req.max_tokens.unwrap_or(4096),
    });

    if let Some(system) = system_prompt(&req.messages) {
        body["system"] = serde_json::Value::String(system);
    }

    if let Some(temp) = req.temperature {
        body["temperature"] = serde_json::Value::from(temp);
    }

    if let Some(top_p) = req.top_p {
        body["top_p"] = serde_json::Value::from(top_p);
    }

    if !req.stop_sequences.is_empty() {
        body["stop_sequences"] = serde_json::Value::Array(
            req.stop_sequences
                .iter()
                .cloned()
                .map(serde_json::Value::String)
                .collect(),
        );
    }

    if !req.tools.is_empty() {
        body["tools"] =
            serde_json::Value::Array(req.tools.iter().map(map_tool_definition).collect());
    }

    body["tool_choice"] = map_tool_choice(&req.tool_choice);

    body
}

/// Concatenate the content of every [`Role::System`] message into the
/// Anthropic request's top-level `system` string. Anthropic does not
/// accept system turns inline in `messages`.
fn system_prompt(messages: &[Message]) -> Option<String> {
    let parts: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

fn map_messages(messages: &[Message]) -> serde_json::Value {
    let arr: Vec<serde_json::Value> = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|msg| {
            let role = match msg.role {
                Role::User | Role::Tool => "user",
                Role::Assistant => "assistant",
                Role::System => unreachable!("filtered above"),
            };
            serde_json::json!({ "role": role, "content": map_message_content(msg) })
        })
        .collect();
    serde_json::Value::Array(arr)
}

/// Build one message's Anthropic content array from its text, tool
/// calls, and tool results. A message can carry more than one of these
/// at once (the engine's tool-result turns carry only `tool_results`;
/// its assistant turns carry `content` plus `tool_calls`).
fn map_message_content(msg: &Message) -> serde_json::Value {
    let mut blocks = Vec::new();
    if !msg.content.is_empty() {
        blocks.push(serde_json::json!({ "type": "text", "text": msg.content }));
    }
    for block in &msg.tool_calls {
        if let ContentBlock::ToolUse { id, name, input } = block {
            blocks.push(serde_json::json!({
                "type": "tool_use",
                "id": id,
                "name": name,
                "input": input,
            }));
        }
    }
    for block in &msg.tool_results {
        if let ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } = block
        {
            blocks.push(serde_json::json!({
                "type": "tool_result",
                "tool_use_id": tool_use_id,
                "content": content,
                "is_error": is_error,
            }));
        }
    }
    serde_json::Value::Array(blocks)
}

fn map_tool_definition(tool: &ToolDefinition) -> serde_json::Value {
    serde_json::json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.input_schema,
    })
}

fn map_tool_choice(choice: &ToolChoice) -> serde_json::Value {
    match choice {
        ToolChoice::Auto => serde_json::json!({ "type": "auto" }),
        ToolChoice::None => serde_json::json!({ "type": "none" }),
        ToolChoice::Any => serde_json::json!({ "type": "any" }),
        ToolChoice::Specific { name } => serde_json::json!({ "type": "tool", "name": name }),
    }
}

/// Parse an Anthropic Messages API response JSON into a [`CompletionResponse`].
///
/// # Errors
///
/// Returns [`ModelError::InvalidResponse`] if required fields are missing
/// or malformed.
pub(crate) fn from_api_response(body: &serde_json::Value) -> Result<CompletionResponse, ModelError> {
    let content_arr = body["content"]
        .as_array()
        .ok_or_else(|| ModelError::InvalidResponse("missing 'content' array in response".into()))?;

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for block in content_arr {
        match block["type"].as_str() {
            Some("text") => {
                if let Some(t) = block["text"].as_str() {
                    text.push_str(t);
                }
            }
            Some("tool_use") => {
                let id = block["id"]
                    .as_str()
                    .ok_or_else(|| ModelError::InvalidResponse("tool_use block missing 'id'".into()))?;
                let name = block["name"]
                    .as_str()
                    .ok_or_else(|| ModelError::InvalidResponse("tool_use block missing 'name'".into()))?;
                let input = block["input"].clone();
                // session/task/parent_task are stamped by the engine from
                // the workflow's ambient context; the provider never knows them.
                tool_calls.push(ToolCall::new(
                    id,
                    name,
                    input,
                    SessionId::new(String::new()),
                    TaskId::new(String::new()),
                ));
            }
            _ => {}
        }
    }

    let stop_reason = body["stop_reason"]
        .as_str()
        .unwrap_or("end_turn")
        .to_string();

    let usage = Usage::new(
        body["usage"]["input_tokens"].as_u64().unwrap_or(0),
        body["usage"]["output_tokens"].as_u64().unwrap_or(0),
    );

    Ok(CompletionResponse {
        content: text,
        tool_calls,
        stop_reason,
        usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use layer0::session::MessageSource;

    #[test]
    fn system_messages_go_to_top_level_field_and_are_excluded_from_messages() {
        let req = CompletionRequest::new(vec![
            Message::new(Role::System, "be terse", MessageSource::SystemPrompt),
            Message::new(Role::User, "hi", MessageSource::UserInput),
        ]);
        let body = to_api_request(&req, "claude-sonnet-4-5");
        assert_eq!(body["system"], "be terse");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn empty_request_model_falls_back_to_default() {
        let req = CompletionRequest::new(vec![]);
        let body = to_api_request(&req, "claude-sonnet-4-5");
        assert_eq!(body["model"], "claude-sonnet-4-5");
    }

    #[test]
    fn max_tokens_defaults_to_4096() {
        let req = CompletionRequest::new(vec![]);
        let body = to_api_request(&req, "claude-sonnet-4-5");
        assert_eq!(body["max_tokens"], 4096);
    }

    #[test]
    fn tool_role_maps_to_user() {
        let mut msg = Message::new(Role::Tool, "", MessageSource::ToolResult);
        msg.tool_results.push(ContentBlock::ToolResult {
            tool_use_id: "call-1".into(),
            content: "42".into(),
            is_error: false,
        });
        let req = CompletionRequest::new(vec![msg]);
        let body = to_api_request(&req, "claude-sonnet-4-5");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"][0]["type"], "tool_result");
    }

    #[test]
    fn parse_text_response() {
        let body = serde_json::json!({
            "content": [{"type": "text", "text": "hello"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 5},
        });
        let resp = from_api_response(&body).unwrap();
        assert_eq!(resp.content, "hello");
        assert_eq!(resp.stop_reason, "end_turn");
        assert_eq!(resp.usage.prompt, 10);
        assert_eq!(resp.usage.completion, 5);
        assert!(resp.tool_calls.is_empty());
    }

    #[test]
    fn parse_tool_use_response() {
        let body = serde_json::json!({
            "content": [{"type": "tool_use", "id": "tu_1", "name": "search", "input": {"q": "rust"}}],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 20, "output_tokens": 8},
        });
        let resp = from_api_response(&body).unwrap();
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].name, "search");
        assert_eq!(resp.tool_calls[0].id, "tu_1");
    }

    #[test]
    fn missing_content_array_is_invalid_response() {
        let body = serde_json::json!({ "stop_reason": "end_turn", "usage": {} });
        let err = from_api_response(&body).unwrap_err();
        assert!(matches!(err, ModelError::InvalidResponse(_)));
    }

    #[test]
    fn missing_usage_fields_default_to_zero() {
        let body = serde_json::json!({
            "content": [{"type": "text", "text": "hi"}],
            "stop_reason": "end_turn",
        });
        let resp = from_api_response(&body).unwrap();
        assert_eq!(resp.usage.prompt, 0);
        assert_eq!(resp.usage.completion, 0);
    }

    #[test]
    fn tool_choice_auto_maps_correctly() {
        let mut req = CompletionRequest::new(vec![]);
        req.tool_choice = ToolChoice::Specific { name: "bash".into() };
        let body = to_api_request(&req, "claude-sonnet-4-5");
        assert_eq!(body["tool_choice"]["type"], "tool");
        assert_eq!(body["tool_choice"]["name"], "bash");
    }
}
