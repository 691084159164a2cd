//! Turns a Messages API response body into a `CompletionResponse`
//!
//! A `tool_use` block that lacks an id or name, or whose input is not an
//! object, is not dropped silently: it is described in
//! `CompletionResponse::malformed` so the caller can ask for a correction.

use serde_json::Value;

use crate::llm::client::LlmError;
use crate::llm::types::{CompletionResponse, StopReason, ToolCall, Usage};

/// Parse a raw Anthropic API response into a CompletionResponse
pub fn parse_response(response: &Value) -> Result<CompletionResponse, LlmError> {
    if let Some(kind) = response.get("type").and_then(Value::as_str)
        && kind == "error"
    {
        let message = response
            .pointer("/error/message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(LlmError::InvalidResponse(message.to_string()));
    }

    let mut content = String::new();
    let mut tool_calls = Vec::new();
    let mut malformed = Vec::new();

    if let Some(blocks) = response.get("content").and_then(Value::as_array) {
        for block in blocks {
            match block.get("type").and_then(Value::as_str) {
                Some("text") => {
                    if let Some(text) = block.get("text").and_then(Value::as_str) {
                        if !content.is_empty() {
                            content.push('\n');
                        }
                        content.push_str(text);
                    }
                }
                Some("tool_use") => match parse_tool_use_block(block) {
                    Ok(call) => tool_calls.push(call),
                    Err(reason) => malformed.push(reason),
                },
                _ => {}
            }
        }
    }

    let stop_reason = response
        .get("stop_reason")
        .and_then(Value::as_str)
        .map(parse_stop_reason)
        .unwrap_or(StopReason::EndTurn);

    let usage = response.get("usage").map(parse_usage).unwrap_or_default();

    Ok(CompletionResponse {
        content,
        tool_calls,
        malformed,
        stop_reason,
        usage,
    })
}

fn parse_tool_use_block(block: &Value) -> Result<ToolCall, String> {
    let id = block
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| "tool_use block without an id".to_string())?;
    let name = block
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| format!("tool_use block {id} without a tool name"))?;

    let input = match block.get("input") {
        None | Some(Value::Null) => Value::Object(Default::default()),
        Some(obj @ Value::Object(_)) => obj.clone(),
        Some(other) => return Err(format!("tool_use block {id} for {name} has non-object input: {other}")),
    };

    Ok(ToolCall::new(id, name, input))
}

fn parse_stop_reason(reason: &str) -> StopReason {
    match reason {
        "end_turn" => StopReason::EndTurn,
        "tool_use" => StopReason::ToolUse,
        "max_tokens" => StopReason::MaxTokens,
        "stop_sequence" => StopReason::StopSequence,
        _ => StopReason::EndTurn,
    }
}

fn parse_usage(usage: &Value) -> Usage {
    Usage {
        input_tokens: usage.get("input_tokens").and_then(Value::as_u64).unwrap_or(0),
        output_tokens: usage.get("output_tokens").and_then(Value::as_u64).unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_response_text_only() {
        let response = json!({
            "content": [
                {"type": "text", "text": "There are five buckets."}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        });

        let result = parse_response(&response).unwrap();
        assert_eq!(result.content, "There are five buckets.");
        assert!(result.tool_calls.is_empty());
        assert!(result.malformed.is_empty());
        assert_eq!(result.stop_reason, StopReason::EndTurn);
        assert_eq!(result.usage.input_tokens, 10);
        assert_eq!(result.usage.output_tokens, 5);
    }

    #[test]
    fn test_parse_response_with_tool_use() {
        let response = json!({
            "content": [
                {"type": "text", "text": "Let me check the bucket."},
                {
                    "type": "tool_use",
                    "id": "toolu_123",
                    "name": "s3_bucket_contents",
                    "input": {"bucket_name": "test-bucket-2"}
                }
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 20, "output_tokens": 15}
        });

        let result = parse_response(&response).unwrap();
        assert_eq!(result.content, "Let me check the bucket.");
        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(result.tool_calls[0].id, "toolu_123");
        assert_eq!(result.tool_calls[0].name, "s3_bucket_contents");
        assert_eq!(result.tool_calls[0].input["bucket_name"], "test-bucket-2");
        assert_eq!(result.stop_reason, StopReason::ToolUse);
    }

    #[test]
    fn test_parse_response_multiple_tools_keeps_order() {
        let response = json!({
            "content": [
                {"type": "tool_use", "id": "toolu_1", "name": "iam_list_users", "input": {}},
                {"type": "tool_use", "id": "toolu_2", "name": "s3_list_buckets", "input": {}}
            ],
            "stop_reason": "tool_use"
        });

        let result = parse_response(&response).unwrap();
        assert_eq!(result.tool_calls.len(), 2);
        assert_eq!(result.tool_calls[0].name, "iam_list_users");
        assert_eq!(result.tool_calls[1].name, "s3_list_buckets");
    }

    #[test]
    fn test_parse_response_missing_fields() {
        let result = parse_response(&json!({})).unwrap();
        assert!(result.content.is_empty());
        assert!(result.tool_calls.is_empty());
        assert_eq!(result.stop_reason, StopReason::EndTurn);
        assert_eq!(result.usage.total(), 0);
    }

    #[test]
    fn test_parse_multiple_text_blocks() {
        let response = json!({
            "content": [
                {"type": "text", "text": "First part."},
                {"type": "text", "text": "Second part."}
            ]
        });

        let result = parse_response(&response).unwrap();
        assert_eq!(result.content, "First part.\nSecond part.");
    }

    #[test]
    fn test_parse_tool_use_empty_input() {
        let response = json!({
            "content": [{"type": "tool_use", "id": "toolu_abc", "name": "s3_list_buckets"}],
            "stop_reason": "tool_use"
        });

        let result = parse_response(&response).unwrap();
        assert_eq!(result.tool_calls.len(), 1);
        assert!(result.tool_calls[0].input.is_object());
    }

    #[test]
    fn test_parse_tool_use_malformed_blocks() {
        let response = json!({
            "content": [
                {"type": "tool_use", "name": "s3_list_buckets", "input": {}},
                {"type": "tool_use", "id": "toolu_2", "input": {}},
                {"type": "tool_use", "id": "toolu_3", "name": "iam_user_permissions", "input": "santa"}
            ],
            "stop_reason": "tool_use"
        });

        let result = parse_response(&response).unwrap();
        assert!(result.tool_calls.is_empty());
        assert_eq!(result.malformed.len(), 3);
        assert!(result.malformed[0].contains("without an id"));
        assert!(result.malformed[1].contains("toolu_2"));
        assert!(result.malformed[2].contains("non-object input"));
    }

    #[test]
    fn test_parse_error_envelope() {
        let response = json!({
            "type": "error",
            "error": {"type": "overloaded_error", "message": "Overloaded"}
        });

        let err = parse_response(&response).unwrap_err();
        assert_eq!(err.to_string(), "Invalid response: Overloaded");
    }

    #[test]
    fn test_parse_stop_reason() {
        assert_eq!(parse_stop_reason("end_turn"), StopReason::EndTurn);
        assert_eq!(parse_stop_reason("tool_use"), StopReason::ToolUse);
        assert_eq!(parse_stop_reason("max_tokens"), StopReason::MaxTokens);
        assert_eq!(parse_stop_reason("stop_sequence"), StopReason::StopSequence);
        assert_eq!(parse_stop_reason("unknown"), StopReason::EndTurn);
    }
}
