//! OpenAI API client struct and [`ModelClient`] implementation.

use async_trait::async_trait;
use cortex_core::error::ModelError;
use cortex_core::ports::{CompletionRequest, CompletionResponse, ModelClient};

use crate::error::{map_http_status, map_reqwest_error};
use crate::mapping::{from_api_response, to_api_request};

/// Default model used when the client is built without an explicit `.model(...)` call.
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default OpenAI API base URL.
const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Client for the OpenAI Chat Completions API.
///
/// Implements [`ModelClient`] for use anywhere `cortex-core`'s Model
/// Client port is accepted.
///
/// # Example
///
/// ```no_run
/// use cortex_provider_openai::OpenAi;
///
/// let client = OpenAi::new("sk-...")
///     .model("gpt-4o")
///     .base_url("https://api.openai.com");
/// ```
pub struct OpenAi {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAi {
    /// Create a new client with the given API key and sensible defaults.
    ///
    /// Default model: `gpt-4o-mini`.
    /// Default base URL: `https://api.openai.com`.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Override the default model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API base URL. Useful for testing with a local mock
    /// server or an OpenAI-compatible proxy.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ModelClient for OpenAi {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ModelError> {
        let body = to_api_request(&request, &self.model);

        tracing::debug!(url = %self.completions_url(), model = %self.model, "sending completion request");

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let response_text = response.text().await.map_err(map_reqwest_error)?;

        if !status.is_success() {
            return Err(map_http_status(status, &response_text));
        }

        let json: serde_json::Value = serde_json::from_str(&response_text)
            .map_err(|e| ModelError::InvalidResponse(format!("invalid JSON response: {e}")))?;

        from_api_response(&json)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_model_is_set() {
        let client = OpenAi::new("test-key");
        assert_eq!(client.model, DEFAULT_MODEL);
    }

    #[test]
    fn default_base_url_is_set() {
        let client = OpenAi::new("test-key");
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn builder_overrides_model() {
        let client = OpenAi::new("test-key").model("gpt-4o");
        assert_eq!(client.model, "gpt-4o");
    }

    #[test]
    fn builder_overrides_base_url() {
        let client = OpenAi::new("test-key").base_url("http://localhost:9999");
        assert_eq!(client.base_url, "http://localhost:9999");
    }

    #[test]
    fn completions_url_includes_path() {
        let client = OpenAi::new("test-key").base_url("http://localhost:9999");
        assert_eq!(
            client.completions_url(),
            "http://localhost:9999/v1/chat/completions"
        );
    }

    #[test]
    fn model_accessor_reflects_builder() {
        let client = OpenAi::new("test-key").model("gpt-4o");
        assert_eq!(ModelClient::model(&client), "gpt-4o");
    }
}
