//! The language-model seam between the platform and a hosted LLM.

use async_trait::async_trait;
use claude::{Claude, EventStream, Request, Response, StreamEvent};
use futures::StreamExt;

/// A hosted (or mocked) chat model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: Request) -> Result<Response, claude::Error>;

    async fn stream(&self, request: Request) -> Result<EventStream, claude::Error>;

    /// Default model name, for display.
    fn model_name(&self) -> &str;
}

#[async_trait]
impl LanguageModel for Claude {
    async fn complete(&self, request: Request) -> Result<Response, claude::Error> {
        Claude::complete(self, request).await
    }

    async fn stream(&self, request: Request) -> Result<EventStream, claude::Error> {
        Claude::stream(self, request).await
    }

    fn model_name(&self) -> &str {
        self.model()
    }
}

/// Drain a stream, forwarding text deltas to `on_text`, and return the full
/// text. An in-stream error event ends the reply with an error.
pub async fn collect_text(
    mut events: EventStream,
    mut on_text: impl FnMut(&str),
) -> Result<String, claude::Error> {
    let mut text = String::new();
    while let Some(event) = events.next().await {
        match event? {
            StreamEvent::TextDelta { text: delta, .. } => {
                on_text(&delta);
                text.push_str(&delta);
            }
            StreamEvent::Error { message } => {
                return Err(claude::Error::Api {
                    status: 0,
                    message,
                })
            }
            StreamEvent::MessageStop => break,
            _ => {}
        }
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn events(items: Vec<Result<StreamEvent, claude::Error>>) -> EventStream {
        Box::pin(stream::iter(items))
    }

    #[tokio::test]
    async fn test_collect_text_forwards_deltas() {
        let mut seen = Vec::new();
        let text = collect_text(
            events(vec![
                Ok(StreamEvent::Ping),
                Ok(StreamEvent::TextDelta { index: 0, text: "Truth ".into() }),
                Ok(StreamEvent::TextDelta { index: 0, text: "coheres.".into() }),
                Ok(StreamEvent::MessageStop),
                Ok(StreamEvent::TextDelta { index: 0, text: "ignored".into() }),
            ]),
            |delta| seen.push(delta.to_string()),
        )
        .await
        .unwrap();

        assert_eq!(text, "Truth coheres.");
        assert_eq!(seen, ["Truth ", "coheres."]);
    }

    #[tokio::test]
    async fn test_collect_text_surfaces_errors() {
        let result = collect_text(
            events(vec![
                Ok(StreamEvent::TextDelta { index: 0, text: "partial".into() }),
                Ok(StreamEvent::Error { message: "overloaded".into() }),
            ]),
            |_| {},
        )
        .await;
        assert!(matches!(result, Err(claude::Error::Api { message, .. }) if message == "overloaded"));

        let result = collect_text(
            events(vec![Err(claude::Error::Parse("bad json".into()))]),
            |_| {},
        )
        .await;
        assert!(matches!(result, Err(claude::Error::Parse(_))));
    }
}
