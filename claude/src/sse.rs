//! Server-sent events of a streaming completion.

use crate::{Error, StopReason};
use serde::Deserialize;

/// One decoded event of a streaming response.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    MessageStart { id: String, model: String },
    ContentBlockStart { index: usize, content_type: String },
    TextDelta { index: usize, text: String },
    InputJsonDelta { index: usize, partial_json: String },
    ContentBlockStop { index: usize },
    MessageDelta { stop_reason: Option<StopReason> },
    MessageStop,
    Ping,
    Error { message: String },
}

impl StreamEvent {
    /// The text carried by a text delta, if this is one.
    pub fn text_delta(&self) -> Option<&str> {
        match self {
            StreamEvent::TextDelta { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// Turns raw response chunks into events.
///
/// Bytes are held until a full line arrives, so a chunk boundary inside a
/// line (or inside a multibyte character) never corrupts the event.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Vec<Result<StreamEvent, Error>> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(end) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = decode_line(line.trim_end()) {
                events.push(event);
            }
        }
        events
    }
}

/// `event:` lines and blank separators carry nothing the `data:` payload
/// does not repeat, so only data lines are decoded.
fn decode_line(line: &str) -> Option<Result<StreamEvent, Error>> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }
    match serde_json::from_str::<WireEvent>(data) {
        Ok(event) => event.into_event().map(Ok),
        Err(e) => Some(Err(Error::Parse(format!("bad stream event: {e}")))),
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    MessageStart {
        message: WireMessage,
    },
    ContentBlockStart {
        index: usize,
        content_block: WireBlockType,
    },
    ContentBlockDelta {
        index: usize,
        delta: WireDelta,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageDelta {
        delta: WireMessageDelta,
    },
    MessageStop,
    Ping,
    Error {
        error: WireError,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    id: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct WireBlockType {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireDelta {
    TextDelta {
        text: String,
    },
    InputJsonDelta {
        partial_json: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct WireMessageDelta {
    stop_reason: Option<StopReason>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    message: String,
}

impl WireEvent {
    fn into_event(self) -> Option<StreamEvent> {
        let event = match self {
            WireEvent::MessageStart { message } => StreamEvent::MessageStart {
                id: message.id,
                model: message.model,
            },
            WireEvent::ContentBlockStart {
                index,
                content_block,
            } => StreamEvent::ContentBlockStart {
                index,
                content_type: content_block.kind,
            },
            WireEvent::ContentBlockDelta { index, delta } => match delta {
                WireDelta::TextDelta { text } => StreamEvent::TextDelta { index, text },
                WireDelta::InputJsonDelta { partial_json } => {
                    StreamEvent::InputJsonDelta {
                        index,
                        partial_json,
                    }
                }
                // thinking and signature deltas
                WireDelta::Other => return None,
            },
            WireEvent::ContentBlockStop { index } => StreamEvent::ContentBlockStop { index },
            WireEvent::MessageDelta { delta } => StreamEvent::MessageDelta {
                stop_reason: delta.stop_reason,
            },
            WireEvent::MessageStop => StreamEvent::MessageStop,
            WireEvent::Ping => StreamEvent::Ping,
            WireEvent::Error { error } => StreamEvent::Error {
                message: error.message,
            },
            WireEvent::Unknown => return None,
        };
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(events: Vec<Result<StreamEvent, Error>>) -> Vec<StreamEvent> {
        events.into_iter().map(|e| e.unwrap()).collect()
    }

    #[test]
    fn test_split_lines_and_characters() {
        let payload = "event: content_block_delta\n\
            data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Kohärenz\"}}\n\n"
            .as_bytes();
        // split inside the two-byte 'ä'
        let cut = payload.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(&payload[..cut]).is_empty());
        let events = ok(decoder.feed(&payload[cut..]));
        assert_eq!(
            events,
            vec![StreamEvent::TextDelta {
                index: 0,
                text: "Kohärenz".into()
            }]
        );
    }

    #[test]
    fn test_message_lifecycle() {
        let body = concat!(
            "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\",\"model\":\"claude-test\",\"content\":[]}}\n",
            "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"thinking\",\"thinking\":\"\"}}\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"thinking_delta\",\"thinking\":\"hm\"}}\n",
            "data: {\"type\":\"ping\"}\n",
            "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"max_tokens\"},\"usage\":{\"output_tokens\":9}}\n",
            "data: {\"type\":\"message_stop\"}\n",
            "data: [DONE]\n",
        );

        let events = ok(SseDecoder::new().feed(body.as_bytes()));
        assert_eq!(
            events,
            vec![
                StreamEvent::MessageStart {
                    id: "msg_1".into(),
                    model: "claude-test".into()
                },
                StreamEvent::ContentBlockStart {
                    index: 0,
                    content_type: "thinking".into()
                },
                StreamEvent::Ping,
                StreamEvent::MessageDelta {
                    stop_reason: Some(StopReason::MaxTokens)
                },
                StreamEvent::MessageStop,
            ]
        );
    }

    #[test]
    fn test_error_event_and_malformed_data() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(
            b"data: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\ndata: {oops\n",
        );
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &StreamEvent::Error {
                message: "Overloaded".into()
            }
        );
        assert!(matches!(events[1], Err(Error::Parse(_))));
    }
}
