//! Small client for the Anthropic Messages API.
//!
//! Supports what the Kohärenz personas need:
//! - plain completions, used for tool-use rounds
//! - streamed completions decoded from server-sent events
//! - tool definitions with tool-use and tool-result blocks

mod client;
mod sse;
mod types;

use std::pin::Pin;
use thiserror::Error;
use tokio_stream::Stream;

pub use client::{Claude, DEFAULT_MODEL};
pub use sse::StreamEvent;
pub use types::{
    ContentBlock, Message, Request, Response, Role, StopReason, Tool, ToolChoice, ToolResult,
    ToolUse, Usage,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("API key not configured")]
    NoApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Events of a streamed completion, in arrival order.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, Error>> + Send>>;
