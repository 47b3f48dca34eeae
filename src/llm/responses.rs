//! Responses-API style HTTP client.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::CompletionClient;
use crate::error::LlmError;

/// Error bodies are cut to this many characters.
const ERROR_SNIPPET_CHARS: usize = 200;

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: &'a str,
}

/// Client for an endpoint taking `{model, input}` and returning either a
/// flat `output_text` or nested `output[].content[].text`.
pub struct ResponsesClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl ResponsesClient {
    pub fn new(endpoint: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl CompletionClient for ResponsesClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, api_key: &SecretString, prompt: &str) -> Result<String, LlmError> {
        let body = ResponsesRequest {
            model: &self.model,
            input: prompt,
        };

        debug!(model = %self.model, prompt_chars = prompt.chars().count(), "Sending completion request");

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            // A body we cannot read still produces the status error.
            let text = resp.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(ERROR_SNIPPET_CHARS).collect();
            warn!(status = status.as_u16(), "Completion endpoint returned an error");
            return Err(LlmError::Status {
                status: status.as_u16(),
                snippet,
            });
        }

        let data: Value = resp.json().await.map_err(|e| LlmError::InvalidResponse {
            reason: e.to_string(),
        })?;

        let text = extract_output_text(&data);
        debug!(output_chars = text.chars().count(), "Completion received");
        Ok(text)
    }
}

/// Normalize a response body to plain text.
///
/// A non-empty top-level `output_text` wins. Otherwise every
/// `output[].content[].text` is gathered: fragments of one item are joined
/// without a separator, items with newlines. The result is trimmed.
pub fn extract_output_text(data: &Value) -> String {
    if let Some(text) = data
        .get("output_text")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
    {
        return text.trim().to_string();
    }

    let Some(items) = data.get("output").and_then(Value::as_array) else {
        return String::new();
    };

    items
        .iter()
        .map(|item| {
            item.get("content")
                .and_then(Value::as_array)
                .map(|parts| {
                    parts
                        .iter()
                        .filter_map(|p| p.get("text").and_then(Value::as_str))
                        .collect::<String>()
                })
                .unwrap_or_default()
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
