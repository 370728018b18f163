//! Testing utilities for the platform.
//!
//! This module provides tools for integration testing:
//! - `MockModel` for deterministic testing without API calls
//! - `TestHarness` for scripted chat sessions
//! - Assertion helpers for verifying replies and requests

use crate::locale::Language;
use crate::platform::{ChatReply, LanguageModel, PlatformError, PlatformSession, Persona};
use async_trait::async_trait;
use claude::{ContentBlock, EventStream, Request, Response, StopReason, StreamEvent, Usage};
use futures::stream;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

pub const MOCK_MODEL: &str = "mock-model";

/// A scripted model reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    ToolUse {
        text: Option<String>,
        id: String,
        name: String,
        input: Value,
    },
    /// Fail the call with an API error.
    Error(String),
}

impl MockReply {
    pub fn text(text: impl Into<String>) -> Self {
        MockReply::Text(text.into())
    }

    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        MockReply::ToolUse {
            text: None,
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        MockReply::Error(message.into())
    }

    fn into_response(self, n: usize) -> Result<Response, claude::Error> {
        let (content, stop_reason) = match self {
            MockReply::Text(text) => (vec![ContentBlock::Text { text }], StopReason::EndTurn),
            MockReply::ToolUse {
                text,
                id,
                name,
                input,
            } => {
                let mut content: Vec<ContentBlock> =
                    text.into_iter().map(|text| ContentBlock::Text { text }).collect();
                content.push(ContentBlock::ToolUse { id, name, input });
                (content, StopReason::ToolUse)
            }
            MockReply::Error(message) => {
                return Err(claude::Error::Api {
                    status: 500,
                    message,
                })
            }
        };
        Ok(Response {
            id: format!("mock_{n}"),
            model: MOCK_MODEL.to_string(),
            content,
            stop_reason,
            usage: Usage::default(),
        })
    }
}

/// A model that returns scripted replies in order.
///
/// When the script runs out it answers `Mock reply #n`. Every request is
/// recorded for inspection.
#[derive(Default)]
pub struct MockModel {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<Request>>,
}

impl MockModel {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Add a reply to the queue.
    pub fn queue(&self, reply: MockReply) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    fn next(&self, request: Request) -> Result<Response, claude::Error> {
        let n = match self.requests.lock() {
            Ok(mut requests) => {
                requests.push(request);
                requests.len()
            }
            Err(_) => 0,
        };
        let reply = self
            .replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front())
            .unwrap_or_else(|| MockReply::text(format!("Mock reply #{n}")));
        reply.into_response(n)
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn complete(&self, request: Request) -> Result<Response, claude::Error> {
        self.next(request)
    }

    /// Streams the reply text word by word.
    async fn stream(&self, request: Request) -> Result<EventStream, claude::Error> {
        let response = self.next(request)?;
        let text = response.text();

        let mut events = vec![Ok(StreamEvent::MessageStart {
            id: response.id.clone(),
            model: response.model.clone(),
        })];
        events.extend(
            text.split_inclusive(' ')
                .map(|word| Ok(StreamEvent::TextDelta { index: 0, text: word.to_string() })),
        );
        events.push(Ok(StreamEvent::MessageDelta {
            stop_reason: Some(response.stop_reason),
        }));
        events.push(Ok(StreamEvent::MessageStop));
        Ok(Box::pin(stream::iter(events)))
    }

    fn model_name(&self) -> &str {
        MOCK_MODEL
    }
}

/// Test harness for scripted chat sessions.
pub struct TestHarness {
    pub session: PlatformSession<MockModel>,
    /// Text streamed by the last `prompt`.
    pub streamed: Vec<String>,
}

impl TestHarness {
    /// A session in English with the bundled data.
    pub fn new() -> Self {
        Self::with_language(Language::En)
    }

    pub fn with_language(language: Language) -> Self {
        let session = match PlatformSession::new(MockModel::default(), language) {
            Ok(session) => session,
            Err(e) => panic!("bundled data failed to load: {e}"),
        };
        Self {
            session,
            streamed: Vec::new(),
        }
    }

    /// Queue a text reply.
    pub fn expect_text(&mut self, text: impl Into<String>) -> &mut Self {
        self.session.model().queue(MockReply::text(text));
        self
    }

    /// Queue any reply.
    pub fn expect(&mut self, reply: MockReply) -> &mut Self {
        self.session.model().queue(reply);
        self
    }

    /// Send free text, capturing the streamed deltas.
    pub async fn prompt(&mut self, text: &str) -> Result<ChatReply, PlatformError> {
        let mut streamed = Vec::new();
        let reply = self
            .session
            .prompt(text, |delta| streamed.push(delta.to_string()))
            .await;
        self.streamed = streamed;
        reply
    }

    pub fn requests(&self) -> Vec<Request> {
        self.session.model().requests()
    }

    /// System prompt of request `index`.
    pub fn system_prompt(&self, index: usize) -> String {
        self.requests()
            .get(index)
            .and_then(|r| r.system.clone())
            .unwrap_or_default()
    }

    pub fn turn_count(&self) -> usize {
        self.session.conversation().len()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion helpers
// ============================================================================

/// Assert which persona answered.
#[track_caller]
pub fn assert_persona(reply: &ChatReply, expected: Persona) {
    assert_eq!(
        reply.persona, expected,
        "Expected {expected:?} to answer, got {:?}",
        reply.persona
    );
}

/// Assert that request `index`'s system prompt contains `needle`.
#[track_caller]
pub fn assert_system_contains(harness: &TestHarness, index: usize, needle: &str) {
    let system = harness.system_prompt(index);
    assert!(
        system.contains(needle),
        "Expected system prompt of request {index} to contain {needle:?}, got:\n{system}"
    );
}

/// Assert the number of model calls made.
#[track_caller]
pub fn assert_request_count(harness: &TestHarness, expected: usize) {
    let actual = harness.session.model().request_count();
    assert_eq!(actual, expected, "Expected {expected} model calls, got {actual}");
}

/// Assert that a request carried the knowledge tool.
#[track_caller]
pub fn assert_offers_tools(request: &Request, expected: bool) {
    let offered = request.tools.as_ref().is_some_and(|t| !t.is_empty());
    assert_eq!(
        offered, expected,
        "Expected tools offered = {expected}, got {offered}"
    );
}

/// Assert that a request is one the Messages API accepts: no empty text
/// blocks, and tools declared whenever the history holds tool blocks.
#[track_caller]
pub fn assert_well_formed(request: &Request) {
    let blocks = || request.messages.iter().flat_map(|m| m.content.iter());
    assert!(
        !blocks().any(|b| b.as_text().is_some_and(|t| t.trim().is_empty())),
        "Request has an empty text block: {:?}",
        request.messages
    );
    let has_tool_blocks = blocks().any(|b| {
        matches!(
            b,
            ContentBlock::ToolUse { .. } | ContentBlock::ToolResult { .. }
        )
    });
    let declares_tools = request.tools.as_ref().is_some_and(|t| !t.is_empty());
    assert!(
        !has_tool_blocks || declares_tools,
        "Request holds tool blocks but declares no tools"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::collect_text;
    use claude::Message;

    #[tokio::test]
    async fn test_mock_replays_script_then_falls_back() {
        let model = MockModel::new(vec![MockReply::text("first")]);
        let request = || Request::new(vec![Message::user("hi")]);

        assert_eq!(model.complete(request()).await.unwrap().text(), "first");
        assert_eq!(model.complete(request()).await.unwrap().text(), "Mock reply #2");
        assert_eq!(model.request_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_stream_splits_words() {
        let model = MockModel::new(vec![MockReply::text("one two three")]);
        let mut deltas = Vec::new();
        let text = collect_text(
            model.stream(Request::new(vec![Message::user("hi")])).await.unwrap(),
            |d| deltas.push(d.to_string()),
        )
        .await
        .unwrap();
        assert_eq!(text, "one two three");
        assert_eq!(deltas, ["one ", "two ", "three"]);
    }

    #[tokio::test]
    async fn test_mock_error_and_tool_use() {
        let model = MockModel::new(vec![
            MockReply::error("boom"),
            MockReply::tool_use("t1", "search_knowledge", serde_json::json!({"query": "x"})),
        ]);
        let request = || Request::new(vec![Message::user("hi")]);

        assert!(matches!(
            model.complete(request()).await,
            Err(claude::Error::Api { status: 500, .. })
        ));
        let response = model.complete(request()).await.unwrap();
        assert_eq!(response.stop_reason, StopReason::ToolUse);
        assert_eq!(response.tool_uses()[0].name, "search_knowledge");
    }
}
