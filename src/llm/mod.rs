//! Completion endpoint integration.
//!
//! A single request/response round trip: prompt in, plain text out. The
//! [`CompletionClient`] trait is the seam the orchestrator depends on;
//! [`ResponsesClient`] is the HTTP implementation.

pub mod responses;

pub use responses::{ResponsesClient, extract_output_text};

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::config::AppConfig;
use crate::error::LlmError;

/// Something that can turn a prompt into model output.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Model identifier this client sends.
    fn model_name(&self) -> &str;

    /// Run one completion with `api_key` as the bearer token.
    async fn complete(&self, api_key: &SecretString, prompt: &str) -> Result<String, LlmError>;
}

/// Create the HTTP completion client from configuration.
pub fn create_client(config: &AppConfig) -> Arc<dyn CompletionClient> {
    tracing::info!("Using completion endpoint {} (model: {})", config.api_url, config.model);
    Arc::new(ResponsesClient::new(&config.api_url, &config.model))
}
