//! Request/response mapping between `cortex-core`'s port types and the
//! OpenAI Chat Completions API wire format.
//!
//! Reference: <https://platform.openai.com/docs/api-reference/chat>

use cortex_core::error::ModelError;
use cortex_core::ports::{CompletionRequest, CompletionResponse, ToolChoice, ToolDefinition, Usage};
use cortex_core::tool_call::ToolCall;
use layer0::id::{SessionId, TaskId};
use layer0::session::{Message, Role};
use layer0::ContentBlock;

/// Convert a [`CompletionRequest`] into the OpenAI Chat Completions JSON body.
pub(crate) fn to_api_request(req: &CompletionRequest, model: &str) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": model,
        "messages": map_messages(&req.messages),
    });

    if let Some(max_tokens) = req.max_tokens {
        body["max_tokens"] = serde_json::Value::from(max_tokens);
    }

    if let Some(temp) = req.temperature {
        body["temperature"] = serde_json::Value::from(temp);
    }

    if let Some(top_p) = req.top_p {
        body["top_p"] = serde_json::Value::from(top_p);
    }

    if !req.stop_sequences.is_empty() {
        body["stop"] = serde_json::Value::Array(
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
        body["tool_choice"] = map_tool_choice(&req.tool_choice);
    }

    body
}

/// Map the message log to OpenAI's flat array. Unlike Anthropic, OpenAI
/// keeps `system` as an ordinary message role and gives tool results
/// their own `"tool"` role rather than folding them into `"user"`.
fn map_messages(messages: &[Message]) -> serde_json::Value {
    let mut out = Vec::new();
    for msg in messages {
        match msg.role {
            Role::System => out.push(serde_json::json!({ "role": "system", "content": msg.content })),
            Role::User => out.push(serde_json::json!({ "role": "user", "content": msg.content })),
            Role::Assistant => out.push(map_assistant_message(msg)),
            Role::Tool => out.extend(map_tool_messages(msg)),
        }
    }
    serde_json::Value::Array(out)
}

fn map_assistant_message(msg: &Message) -> serde_json::Value {
    let mut obj = serde_json::json!({ "role": "assistant" });
    if msg.content.is_empty() {
        obj["content"] = serde_json::Value::Null;
    } else {
        obj["content"] = serde_json::Value::String(msg.content.clone());
    }

    let tool_calls: Vec<serde_json::Value> = msg
        .tool_calls
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolUse { id, name, input } => Some(serde_json::json!({
                "id": id,
                "type": "function",
                "function": {
                    "name": name,
                    "arguments": serde_json::to_string(input).unwrap_or_default(),
                },
            })),
            _ => None,
        })
        .collect();

    if !tool_calls.is_empty() {
        obj["tool_calls"] = serde_json::Value::Array(tool_calls);
    }

    obj
}

/// One `Role::Tool` message carries every tool result for an iteration;
/// OpenAI wants one `"tool"`-role message per result, each tagged with
/// the call id it answers.
fn map_tool_messages(msg: &Message) -> Vec<serde_json::Value> {
    msg.tool_results
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                ..
            } => Some(serde_json::json!({
                "role": "tool",
                "tool_call_id": tool_use_id,
                "content": content,
            })),
            _ => None,
        })
        .collect()
}

fn map_tool_definition(tool: &ToolDefinition) -> serde_json::Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.input_schema,
        },
    })
}

fn map_tool_choice(choice: &ToolChoice) -> serde_json::Value {
    match choice {
        ToolChoice::Auto => serde_json::Value::String("auto".into()),
        ToolChoice::None => serde_json::Value::String("none".into()),
        ToolChoice::Any => serde_json::Value::String("required".into()),
        ToolChoice::Specific { name } => {
            serde_json::json!({ "type": "function", "function": { "name": name } })
        }
    }
}

/// Parse an OpenAI Chat Completions response JSON into a [`CompletionResponse`].
///
/// # Errors
///
/// Returns [`ModelError::InvalidResponse`] if required fields are missing
/// or malformed.
pub(crate) fn from_api_response(body: &serde_json::Value) -> Result<CompletionResponse, ModelError> {
    let choice = body["choices"]
        .get(0)
        .ok_or_else(|| ModelError::InvalidResponse("no choices in response".into()))?;

    let content = choice["message"]["content"]
        .as_str()
        .unwrap_or("")
        .to_string();

    let mut tool_calls = Vec::new();
    if let Some(calls) = choice["message"]["tool_calls"].as_array() {
        for call in calls {
            let id = call["id"]
                .as_str()
                .ok_or_else(|| ModelError::InvalidResponse("tool call missing 'id'".into()))?;
            let name = call["function"]["name"].as_str().ok_or_else(|| {
                ModelError::InvalidResponse("tool call missing 'function.name'".into())
            })?;
            let arguments_str = call["function"]["arguments"].as_str().unwrap_or("{}");
            let input: serde_json::Value =
                serde_json::from_str(arguments_str).unwrap_or(serde_json::Value::Null);

            // session/task/parent_task are stamped by the engine from the
            // workflow's ambient context; the provider never knows them.
            tool_calls.push(ToolCall::new(
                id,
                name,
                input,
                SessionId::new(String::new()),
                TaskId::new(String::new()),
            ));
        }
    }

    let stop_reason = choice["finish_reason"]
        .as_str()
        .unwrap_or("stop")
        .to_string();

    let usage = Usage::new(
        body["usage"]["prompt_tokens"].as_u64().unwrap_or(0),
        body["usage"]["completion_tokens"].as_u64().unwrap_or(0),
    );

    Ok(CompletionResponse {
        content,
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
    fn system_message_keeps_its_own_role() {
        let req = CompletionRequest::new(vec![Message::new(
            Role::System,
            "be terse",
            MessageSource::SystemPrompt,
        )]);
        let body = to_api_request(&req, "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "be terse");
    }

    #[test]
    fn tool_role_splits_into_one_message_per_result() {
        let mut msg = Message::new(Role::Tool, "", MessageSource::ToolResult);
        msg.tool_results.push(ContentBlock::ToolResult {
            tool_use_id: "call-1".into(),
            content: "42".into(),
            is_error: false,
        });
        msg.tool_results.push(ContentBlock::ToolResult {
            tool_use_id: "call-2".into(),
            content: "43".into(),
            is_error: false,
        });
        let req = CompletionRequest::new(vec![msg]);
        let body = to_api_request(&req, "gpt-4o-mini");
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "tool");
        assert_eq!(messages[0]["tool_call_id"], "call-1");
    }

    #[test]
    fn assistant_tool_calls_serialize_arguments_as_json_string() {
        let mut msg = Message::new(Role::Assistant, "", MessageSource::AssistantReply);
        msg.tool_calls.push(ContentBlock::ToolUse {
            id: "call-1".into(),
            name: "search".into(),
            input: serde_json::json!({ "q": "rust" }),
        });
        let req = CompletionRequest::new(vec![msg]);
        let body = to_api_request(&req, "gpt-4o-mini");
        let call = &body["messages"][0]["tool_calls"][0];
        assert_eq!(call["function"]["name"], "search");
        assert!(call["function"]["arguments"].as_str().unwrap().contains("rust"));
    }

    #[test]
    fn parse_text_response() {
        let body = serde_json::json!({
            "choices": [{"message": {"content": "hello", "role": "assistant"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5},
        });
        let resp = from_api_response(&body).unwrap();
        assert_eq!(resp.content, "hello");
        assert_eq!(resp.stop_reason, "stop");
        assert_eq!(resp.usage.prompt, 10);
        assert_eq!(resp.usage.completion, 5);
    }

    #[test]
    fn parse_tool_calls_response() {
        let body = serde_json::json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "search", "arguments": "{\"q\":\"rust\"}"},
                    }],
                },
                "finish_reason": "tool_calls",
            }],
            "usage": {"prompt_tokens": 20, "completion_tokens": 8},
        });
        let resp = from_api_response(&body).unwrap();
        assert_eq!(resp.content, "");
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].name, "search");
        assert_eq!(resp.stop_reason, "tool_calls");
    }

    #[test]
    fn missing_choices_is_invalid_response() {
        let body = serde_json::json!({ "choices": [], "usage": {} });
        let err = from_api_response(&body).unwrap_err();
        assert!(matches!(err, ModelError::InvalidResponse(_)));
    }

    #[test]
    fn tool_choice_specific_maps_to_function_object() {
        let mut req = CompletionRequest::new(vec![]);
        req.tools.push(ToolDefinition {
            name: "bash".into(),
            description: "run a shell command".into(),
            input_schema: serde_json::json!({"type": "object"}),
        });
        req.tool_choice = ToolChoice::Specific { name: "bash".into() };
        let body = to_api_request(&req, "gpt-4o-mini");
        assert_eq!(body["tool_choice"]["function"]["name"], "bash");
    }
}
