//! Request and response types of the Messages API.
//!
//! Content blocks, roles and tools serialise straight into the wire format.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A completion request.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Falls back to the client's model when `None`.
    #[serde(skip)]
    pub model: Option<String>,
    pub max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

impl Request {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            model: None,
            max_tokens: 4096,
            system: None,
            messages,
            temperature: None,
            tools: None,
            tool_choice: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = Some(tool_choice);
        self
    }
}

/// One conversation message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self::text_block(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text_block(Role::Assistant, text)
    }

    fn text_block(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    /// Text of all text blocks, joined.
    pub fn text(&self) -> String {
        join_text(&self.content)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
}

impl ContentBlock {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// A tool the model may call. `input_schema` is a JSON Schema object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// How the model may use the declared tools.
///
/// `None` keeps the tools declared (required once the history holds tool
/// blocks) but forces a text answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    Any,
    Tool { name: String },
    None,
}

/// A completed (non-streaming) response.
#[derive(Debug, Clone)]
pub struct Response {
    pub id: String,
    pub model: String,
    pub content: Vec<ContentBlock>,
    pub stop_reason: StopReason,
    pub usage: Usage,
}

impl Response {
    pub fn text(&self) -> String {
        join_text(&self.content)
    }

    /// Tool calls in the order the model made them.
    pub fn tool_uses(&self) -> Vec<ToolUse> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => Some(ToolUse {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

fn join_text(blocks: &[ContentBlock]) -> String {
    blocks.iter().filter_map(ContentBlock::as_text).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    ToolUse,
    /// Any reason this client does not know.
    Other,
}

impl From<String> for StopReason {
    fn from(reason: String) -> Self {
        match reason.as_str() {
            "end_turn" => StopReason::EndTurn,
            "max_tokens" => StopReason::MaxTokens,
            "stop_sequence" => StopReason::StopSequence,
            "tool_use" => StopReason::ToolUse,
            _ => StopReason::Other,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Usage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

#[derive(Debug, Clone)]
pub struct ToolUse {
    pub id: String,
    pub name: String,
    pub input: Value,
}

/// Outcome of running a tool locally.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }

    /// The block answering tool call `tool_use_id`.
    pub fn into_block(self, tool_use_id: impl Into<String>) -> ContentBlock {
        ContentBlock::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: self.content,
            is_error: self.is_error,
        }
    }
}

/// Body of a non-streaming response. Blocks other than text and tool use
/// (thinking, for instance) are dropped.
#[derive(Debug, Deserialize)]
pub(crate) struct WireResponse {
    id: String,
    model: String,
    content: Vec<WireBlock>,
    stop_reason: Option<StopReason>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    #[serde(other)]
    Unsupported,
}

impl From<WireResponse> for Response {
    fn from(wire: WireResponse) -> Self {
        let content = wire
            .content
            .into_iter()
            .filter_map(|block| match block {
                WireBlock::Text { text } => Some(ContentBlock::Text { text }),
                WireBlock::ToolUse { id, name, input } => {
                    Some(ContentBlock::ToolUse { id, name, input })
                }
                WireBlock::Unsupported => None,
            })
            .collect();
        Response {
            id: wire.id,
            model: wire.model,
            content,
            stop_reason: wire.stop_reason.unwrap_or(StopReason::EndTurn),
            usage: wire.usage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_format() {
        let request = Request::new(vec![
            Message::user("Was ist Wahrheit?"),
            Message {
                role: Role::User,
                content: vec![ToolResult::error("no documents").into_block("toolu_1")],
            },
        ])
        .with_system("You are AEGIS")
        .with_max_tokens(1000);

        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(wire["max_tokens"], 1000);
        assert_eq!(wire["system"], "You are AEGIS");
        assert!(wire.get("model").is_none());
        assert!(wire.get("tools").is_none());
        assert!(wire.get("tool_choice").is_none());
        assert_eq!(
            wire["messages"][0],
            json!({"role": "user", "content": [{"type": "text", "text": "Was ist Wahrheit?"}]})
        );
        assert_eq!(
            wire["messages"][1]["content"][0],
            json!({"type": "tool_result", "tool_use_id": "toolu_1", "content": "no documents", "is_error": true})
        );
    }

    #[test]
    fn test_tool_choice_wire_format() {
        let request = Request::new(vec![Message::user("hi")]).with_tool_choice(ToolChoice::None);
        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(wire["tool_choice"], json!({"type": "none"}));

        let forced = serde_json::to_value(ToolChoice::Tool {
            name: "search_knowledge".into(),
        })
        .unwrap();
        assert_eq!(forced, json!({"type": "tool", "name": "search_knowledge"}));
    }

    #[test]
    fn test_response_drops_thinking_blocks() {
        let wire: WireResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "model": "claude-test",
            "content": [
                {"type": "thinking", "thinking": "hmm", "signature": "x"},
                {"type": "text", "text": "Searching."},
                {"type": "tool_use", "id": "toolu_1", "name": "search_knowledge", "input": {"query": "coherence"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 12, "output_tokens": 3}
        }))
        .unwrap();

        let response = Response::from(wire);
        assert_eq!(response.text(), "Searching.");
        assert_eq!(response.stop_reason, StopReason::ToolUse);
        assert_eq!(response.usage.output_tokens, 3);
        let uses = response.tool_uses();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].input["query"], "coherence");
    }

    #[test]
    fn test_unknown_stop_reason() {
        let reason: StopReason = serde_json::from_value(json!("refusal")).unwrap();
        assert_eq!(reason, StopReason::Other);
    }
}
