use crate::sse::SseDecoder;
use crate::types::WireResponse;
use crate::{Error, EventStream, Request, Response};
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Serialize;
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Messages API client.
#[derive(Clone)]
pub struct Claude {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl Claude {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Reads `ANTHROPIC_API_KEY`. A blank key counts as missing.
    pub fn from_env() -> Result<Self, Error> {
        match std::env::var("ANTHROPIC_API_KEY") {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(key)),
            _ => Err(Error::NoApiKey),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Use another API base, e.g. a gateway.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Model for requests that do not name one.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn complete(&self, request: Request) -> Result<Response, Error> {
        let response = self.post(&request, false).await?;
        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;
        Ok(wire.into())
    }

    pub async fn stream(&self, request: Request) -> Result<EventStream, Error> {
        let response = self.post(&request, true).await?;

        let events = response
            .bytes_stream()
            .scan(SseDecoder::new(), |decoder, chunk| {
                let events = match chunk {
                    Ok(bytes) => decoder.feed(&bytes),
                    Err(e) => vec![Err(Error::Network(e.to_string()))],
                };
                futures::future::ready(Some(futures::stream::iter(events)))
            })
            .flatten();

        Ok(Box::pin(events))
    }

    async fn post(&self, request: &Request, stream: bool) -> Result<reqwest::Response, Error> {
        let body = self.body(request, stream);
        tracing::debug!(
            model = body.model,
            messages = request.messages.len(),
            stream,
            "posting messages request"
        );

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::debug!(status = status.as_u16(), "messages request rejected");
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    fn headers(&self) -> Result<HeaderMap, Error> {
        let key = HeaderValue::from_str(&self.api_key)
            .map_err(|e| Error::Config(format!("API key is not a valid header: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-api-key", key);
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        Ok(headers)
    }

    fn body<'a>(&'a self, request: &'a Request, stream: bool) -> Body<'a> {
        Body {
            model: request.model.as_deref().unwrap_or(&self.model),
            request,
            stream,
        }
    }
}

#[derive(Serialize)]
struct Body<'a> {
    model: &'a str,
    #[serde(flatten)]
    request: &'a Request,
    stream: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Message;

    #[test]
    fn test_client_settings() {
        let client = Claude::new("test-key");
        assert_eq!(client.model(), DEFAULT_MODEL);
        assert_eq!(client.base_url, DEFAULT_API_BASE);

        let client = client
            .with_model("claude-opus-4-1")
            .with_base_url("http://localhost:8080/v1/");
        assert_eq!(client.model(), "claude-opus-4-1");
        assert_eq!(client.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_body_model() {
        let client = Claude::new("test-key");
        let request = Request::new(vec![Message::user("Hallo")]).with_temperature(0.5);

        let body = serde_json::to_value(client.body(&request, true)).unwrap();
        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["stream"], true);
        assert_eq!(body["temperature"], 0.5);
        assert_eq!(body["messages"][0]["role"], "user");

        let request = request.with_model("claude-haiku");
        let body = serde_json::to_value(client.body(&request, false)).unwrap();
        assert_eq!(body["model"], "claude-haiku");
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn test_invalid_key_header() {
        let client = Claude::new("bad\nkey");
        assert!(matches!(client.headers(), Err(Error::Config(_))));
    }
}
