/// Errors constructing a generator
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// No API key configured
    #[error("no API key configured; run `irf config set api_key <key>` or set ANTHROPIC_API_KEY")]
    MissingApiKey,

    /// Configuration value out of range
    #[error("invalid provider config: {0}")]
    InvalidConfig(String),

    /// HTTP client could not be built
    #[error("http client: {0}")]
    Client(String),
}
