use std::time::Duration;

use async_trait::async_trait;
use irf_core::{GenerationError, GenerationRequest, TextGenerator};
use reqwest::header::RETRY_AFTER;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument};

use crate::error::ProviderError;
use crate::wire::{classify_status, Message, MessagesRequest, MessagesResponse};

/// Messages API endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";

/// Model used when none is configured
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

const API_VERSION: &str = "2023-06-01";

/// Standing instructions sent with every section prompt
pub const SYSTEM_PROMPT: &str = "You are an institutional-grade investment analyst writing a detailed research report.

Your writing must follow these standards:
- Institutional tone: professional, evidence-based, balanced
- No first person (never \"I\", \"we\", \"our\")
- No hype language (avoid \"massive\", \"incredible\", \"game-changing\", \"revolutionary\")
- Specific metrics: use actual numbers, percentages, dollar amounts
- Named entities: reference specific companies, products, customers by name
- Citations: embed [N] references inline where claims are supported by sources
- Tables: use markdown tables for financial data and peer comparisons
- Forward-looking statements must reference the source (management guidance, analyst estimates)

Structure each section with clear headers and logical flow.";

/// Connection settings for [`AnthropicGenerator`]
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// API key, never logged
    pub api_key: SecretString,
    /// Model id
    pub model: String,
    /// Output cap per section
    pub max_tokens: u32,
    /// Endpoint URL
    pub endpoint: String,
    /// HTTP-level timeout; the session applies its own per-call deadline
    pub request_timeout: Option<Duration>,
}

impl ProviderConfig {
    /// Defaults for everything but the key
    #[must_use]
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 4096,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout: None,
        }
    }

    /// With model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// With output cap
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// With endpoint
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// With HTTP timeout
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

/// Text generator calling the Anthropic Messages API
#[derive(Debug, Clone)]
pub struct AnthropicGenerator {
    client: Client,
    config: ProviderConfig,
}

impl AnthropicGenerator {
    /// Build a generator
    ///
    /// # Errors
    /// [`ProviderError::MissingApiKey`] for an empty key,
    /// [`ProviderError::InvalidConfig`] for an empty model or zero
    /// `max_tokens`, [`ProviderError::Client`] when the HTTP client fails
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        if config.api_key.expose_secret().trim().is_empty() {
            return Err(ProviderError::MissingApiKey);
        }
        if config.model.trim().is_empty() {
            return Err(ProviderError::InvalidConfig("model is empty".into()));
        }
        if config.max_tokens == 0 {
            return Err(ProviderError::InvalidConfig("max_tokens must be positive".into()));
        }
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ProviderError::Client(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Configured model id
    #[must_use]
    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl TextGenerator for AnthropicGenerator {
    #[instrument(skip(self, request), fields(section = %request.section_id, model = %self.config.model))]
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let payload = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system: SYSTEM_PROMPT,
            messages: [Message {
                role: "user",
                content: &request.prompt,
            }],
        };
        debug!(prompt_chars = request.prompt.len(), context = %request.context, "sending request");

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("x-api-key", self.config.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let body = response.text().await.unwrap_or_default();
            let err = classify_status(status.as_u16(), retry_after.as_deref(), &body);
            debug!(status = status.as_u16(), error = %err, "request rejected");
            return Err(err);
        }

        let body: MessagesResponse = response.json().await.map_err(transport_error)?;
        if let Some(usage) = &body.usage {
            debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "response received"
            );
        }
        body.into_text()
    }
}

fn transport_error(e: reqwest::Error) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Timeout
    } else {
        GenerationError::Provider(e.to_string())
    }
}
