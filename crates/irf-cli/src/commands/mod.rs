//! Subcommand handlers
//!
//! Handlers write user-facing output to the supplied writer; diagnostics go
//! through `tracing` to stderr.

pub mod framework;
pub mod report;
pub mod settings;

use std::io::Write;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use clap::ArgMatches;
use irf_core::{GenerationError, GenerationRequest, TextGenerator};
use irf_provider::AnthropicGenerator;
use irf_store::Store;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;

/// Everything a command needs
pub struct App {
    pub config: AppConfig,
    pub store: Store,
    generator: Option<Arc<dyn TextGenerator>>,
    cancel: CancellationToken,
}

impl App {
    /// Open the store under the configured data directory
    ///
    /// # Errors
    /// Database failures
    pub fn open(config: AppConfig) -> anyhow::Result<Self> {
        let store = Store::open(&config.data_dir)
            .with_context(|| format!("cannot open store in {}", config.data_dir.display()))?;
        Ok(Self::with_store(config, store))
    }

    #[must_use]
    pub fn with_store(config: AppConfig, store: Store) -> Self {
        Self {
            config,
            store,
            generator: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Use `generator` instead of the configured provider
    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Token that stops in-flight generation when cancelled
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Generator for commands that write section text
    ///
    /// # Errors
    /// No API key is configured
    pub(crate) fn generator(&self) -> anyhow::Result<Arc<dyn TextGenerator>> {
        if let Some(generator) = &self.generator {
            return Ok(Arc::clone(generator));
        }
        let config = self.config.provider_config().context(
            "set an API key with `irf config set api_key <KEY>` or ANTHROPIC_API_KEY",
        )?;
        Ok(Arc::new(AnthropicGenerator::new(config)?))
    }

    /// Generator for commands that only read or judge existing text
    ///
    /// QA and approval never call the provider, so a missing key is not an
    /// error for them.
    pub(crate) fn generator_or_offline(&self) -> Arc<dyn TextGenerator> {
        self.generator().unwrap_or_else(|_| Arc::new(Offline))
    }
}

/// Stands in for a provider when none is configured
struct Offline;

#[async_trait]
impl TextGenerator for Offline {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String, GenerationError> {
        Err(GenerationError::Auth("no API key configured".into()))
    }
}

/// Run the matched subcommand
///
/// # Errors
/// Any failure of the command; the caller maps it to exit status 1
pub async fn dispatch(app: &App, matches: &ArgMatches, out: &mut dyn Write) -> anyhow::Result<()> {
    match matches.subcommand() {
        Some(("init", sub)) => settings::init(app, sub, out),
        Some(("config", sub)) => settings::config(&app.config.data_dir, sub, out),
        Some(("framework", sub)) => framework::run(app, sub, out),
        Some(("report", sub)) => report::run(app, sub, out).await,
        Some((other, _)) => bail!("unknown command `{other}`"),
        None => bail!("no command given"),
    }
}

/// Value of an argument clap has already required
pub(crate) fn required<'a>(matches: &'a ArgMatches, name: &str) -> anyhow::Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing argument <{name}>"))
}
