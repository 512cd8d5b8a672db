//! Application configuration
//!
//! Loaded from `<data_dir>/config.toml`, then overridden by environment
//! variables (`ANTHROPIC_API_KEY`, `IRF_MODEL`). The data directory itself
//! comes from `--data-dir`, `IRF_DATA_DIR`, or the platform data directory.
//! The effective config is stored once in a process-wide cell at startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use irf_core::{DependencyPolicy, ReportConfig, RetryPolicy};
use irf_provider::{ProviderConfig, ProviderError, DEFAULT_MODEL};
use once_cell::sync::OnceCell;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

/// Config file name inside the data directory
pub const CONFIG_FILE: &str = "config.toml";

static CONFIG: OnceCell<AppConfig> = OnceCell::new();

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("could not encode config: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("unknown config key `{0}`")]
    UnknownKey(String),

    #[error("invalid value for `{key}`: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Settings for report generation runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub call_timeout_secs: u64,
    pub max_concurrency: usize,
    pub dependency_policy: DependencyPolicy,
    pub auto_qa: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            call_timeout_secs: 120,
            max_concurrency: 2,
            dependency_policy: DependencyPolicy::Generated,
            auto_qa: false,
        }
    }
}

/// Effective application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(
        serialize_with = "expose_key",
        deserialize_with = "secret_key",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<SecretString>,
    pub model: String,
    pub max_tokens_per_section: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    pub generation: GenerationConfig,
    #[serde(skip)]
    pub data_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            max_tokens_per_section: 4096,
            output_dir: None,
            generation: GenerationConfig::default(),
            data_dir: default_data_dir(),
        }
    }
}

impl AppConfig {
    /// File values with environment overrides applied
    ///
    /// # Errors
    /// Unreadable or malformed config file
    pub fn load(data_dir: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_file(data_dir)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// File values only; defaults when the file does not exist
    ///
    /// # Errors
    /// Unreadable or malformed config file
    pub fn load_file(data_dir: &Path) -> Result<Self, ConfigError> {
        let path = data_dir.join(CONFIG_FILE);
        let mut config: Self = match std::fs::read_to_string(&path) {
            Ok(text) => toml::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                Self::default()
            }
            Err(e) => return Err(e.into()),
        };
        config.data_dir = data_dir.to_path_buf();
        Ok(config)
    }

    /// Apply `ANTHROPIC_API_KEY` and `IRF_MODEL`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("ANTHROPIC_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(SecretString::from(key));
            debug!("ANTHROPIC_API_KEY env override applied");
        }
        if let Some(model) = lookup("IRF_MODEL").filter(|m| !m.trim().is_empty()) {
            self.model = model;
            debug!("IRF_MODEL env override applied");
        }
    }

    /// Write to `<data_dir>/config.toml`
    ///
    /// # Errors
    /// Encoding or filesystem failures
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        std::fs::create_dir_all(&self.data_dir)?;
        let path = self.data_dir.join(CONFIG_FILE);
        std::fs::write(&path, toml::to_string_pretty(self)?)?;
        Ok(path)
    }

    /// Set one key from its string form
    ///
    /// # Errors
    /// [`ConfigError::UnknownKey`] or [`ConfigError::InvalidValue`]
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let g = &mut self.generation;
        match key {
            "api_key" => self.api_key = Some(SecretString::from(value.to_string())),
            "model" => self.model = value.to_string(),
            "max_tokens_per_section" => self.max_tokens_per_section = parse(key, value)?,
            "output_dir" => self.output_dir = Some(PathBuf::from(value)),
            "generation.max_retries" => g.max_retries = parse(key, value)?,
            "generation.base_delay_ms" => g.base_delay_ms = parse(key, value)?,
            "generation.max_delay_ms" => g.max_delay_ms = parse(key, value)?,
            "generation.call_timeout_secs" => g.call_timeout_secs = parse(key, value)?,
            "generation.max_concurrency" => g.max_concurrency = parse(key, value)?,
            "generation.dependency_policy" => g.dependency_policy = parse(key, value)?,
            "generation.auto_qa" => g.auto_qa = parse(key, value)?,
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    /// Every key with its display value; the API key is masked
    #[must_use]
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let g = &self.generation;
        vec![
            (
                "api_key",
                self.api_key
                    .as_ref()
                    .map_or_else(|| "(not set)".to_string(), |k| mask_secret(k.expose_secret())),
            ),
            ("model", self.model.clone()),
            ("max_tokens_per_section", self.max_tokens_per_section.to_string()),
            ("data_dir", self.data_dir.display().to_string()),
            ("output_dir", self.output_dir().display().to_string()),
            ("generation.max_retries", g.max_retries.to_string()),
            ("generation.base_delay_ms", g.base_delay_ms.to_string()),
            ("generation.max_delay_ms", g.max_delay_ms.to_string()),
            ("generation.call_timeout_secs", g.call_timeout_secs.to_string()),
            ("generation.max_concurrency", g.max_concurrency.to_string()),
            ("generation.dependency_policy", policy_name(g.dependency_policy).to_string()),
            ("generation.auto_qa", g.auto_qa.to_string()),
        ]
    }

    /// Where exported reports go
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("output"))
    }

    /// Session settings derived from `[generation]`
    #[must_use]
    pub fn report_config(&self) -> ReportConfig {
        let g = &self.generation;
        ReportConfig::new()
            .with_retry(RetryPolicy {
                max_retries: g.max_retries,
                base_delay: Duration::from_millis(g.base_delay_ms),
                max_delay: Duration::from_millis(g.max_delay_ms),
                ..RetryPolicy::default()
            })
            .with_call_timeout(Duration::from_secs(g.call_timeout_secs))
            .with_max_concurrency(g.max_concurrency)
            .with_dependency_policy(g.dependency_policy)
            .with_auto_qa(g.auto_qa)
    }

    /// Provider settings
    ///
    /// # Errors
    /// [`ProviderError::MissingApiKey`] when no key is configured
    pub fn provider_config(&self) -> Result<ProviderConfig, ProviderError> {
        let key = self.api_key.clone().ok_or(ProviderError::MissingApiKey)?;
        Ok(ProviderConfig::new(key)
            .with_model(self.model.clone())
            .with_max_tokens(self.max_tokens_per_section))
    }
}

/// `--data-dir`, else `IRF_DATA_DIR`, else `<platform data dir>/irf`
#[must_use]
pub fn resolve_data_dir(flag: Option<&Path>) -> PathBuf {
    flag.map(Path::to_path_buf)
        .or_else(|| std::env::var_os("IRF_DATA_DIR").map(PathBuf::from))
        .unwrap_or_else(default_data_dir)
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("irf")
}

/// Store the effective config for the rest of the process
///
/// The first call wins; later calls return the stored value.
pub fn init_global(config: AppConfig) -> &'static AppConfig {
    CONFIG.get_or_init(|| config)
}

/// The stored config, if [`init_global`] has run
#[must_use]
pub fn global() -> Option<&'static AppConfig> {
    CONFIG.get()
}

/// `sk-a...wxyz` form of a secret
#[must_use]
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

fn policy_name(policy: DependencyPolicy) -> &'static str {
    match policy {
        DependencyPolicy::Generated => "generated",
        DependencyPolicy::QaPassed => "qa_passed",
        DependencyPolicy::Approved => "approved",
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

#[allow(clippy::ref_option)]
fn expose_key<S: Serializer>(key: &Option<SecretString>, s: S) -> Result<S::Ok, S::Error> {
    match key {
        Some(k) => s.serialize_some(k.expose_secret()),
        None => s.serialize_none(),
    }
}

fn secret_key<'de, D: Deserializer<'de>>(d: D) -> Result<Option<SecretString>, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    Ok(raw.filter(|k| !k.trim().is_empty()).map(SecretString::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.model, "claude-sonnet-4-20250514");
        assert_eq!(config.max_tokens_per_section, 4096);
        assert_eq!(config.generation, GenerationConfig::default());
        assert_eq!(config.generation.call_timeout_secs, 120);
        assert_eq!(config.generation.max_concurrency, 2);
        assert!(!config.generation.auto_qa);
    }

    #[test]
    fn mask_keeps_ends_only() {
        assert_eq!(mask_secret("sk-ant-api03-abcdefwxyz"), "sk-a...wxyz");
        assert_eq!(mask_secret("short"), "****");
    }

    #[test]
    fn set_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::load_file(dir.path()).unwrap();
        config.set("api_key", "sk-ant-secret-1234").unwrap();
        config.set("generation.max_concurrency", "4").unwrap();
        config.set("generation.dependency_policy", "qa_passed").unwrap();
        config.set("generation.auto_qa", "true").unwrap();
        config.save().unwrap();

        let loaded = AppConfig::load_file(dir.path()).unwrap();
        assert_eq!(
            loaded.api_key.as_ref().map(|k| k.expose_secret().to_string()),
            Some("sk-ant-secret-1234".to_string())
        );
        assert_eq!(loaded.generation.max_concurrency, 4);
        assert_eq!(loaded.generation.dependency_policy, DependencyPolicy::QaPassed);
        assert!(loaded.generation.auto_qa);
        assert_eq!(loaded.data_dir, dir.path());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "model = \"claude-opus\"\n[generation]\nmax_retries = 5\n",
        )
        .unwrap();
        let config = AppConfig::load_file(dir.path()).unwrap();
        assert_eq!(config.model, "claude-opus");
        assert_eq!(config.generation.max_retries, 5);
        assert_eq!(config.generation.base_delay_ms, 1000);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn env_overrides_file() {
        let mut config = AppConfig::default();
        config.apply_env(|key| match key {
            "ANTHROPIC_API_KEY" => Some("sk-from-env-0000".into()),
            "IRF_MODEL" => Some("claude-haiku".into()),
            _ => None,
        });
        assert_eq!(config.model, "claude-haiku");
        assert!(config.api_key.is_some());
    }

    #[test]
    fn bad_keys_and_values_are_rejected() {
        let mut config = AppConfig::default();
        assert!(matches!(config.set("nope", "1"), Err(ConfigError::UnknownKey(_))));
        assert!(matches!(
            config.set("generation.max_retries", "many"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config.set("generation.dependency_policy", "whenever"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn show_masks_api_key() {
        let mut config = AppConfig::default();
        config.set("api_key", "sk-ant-api03-abcdefwxyz").unwrap();
        let shown = config.entries();
        assert_eq!(shown[0], ("api_key", "sk-a...wxyz".to_string()));
    }

    #[test]
    fn report_config_follows_generation_table() {
        let mut config = AppConfig::default();
        config.set("generation.max_concurrency", "0").unwrap();
        config.set("generation.call_timeout_secs", "30").unwrap();
        let rc = config.report_config();
        assert_eq!(rc.max_concurrency, 1);
        assert_eq!(rc.call_timeout, Duration::from_secs(30));
        assert_eq!(rc.retry.max_retries, 3);
    }

    #[test]
    fn missing_key_blocks_provider() {
        assert!(matches!(
            AppConfig::default().provider_config(),
            Err(ProviderError::MissingApiKey)
        ));
    }
}
