use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "batchquery.toml",
    "config/batchquery.toml",
    "crates/config/batchquery.toml",
];

/// Environment variable holding the OpenAI credential. Absence switches the
/// real responder to the simulated one.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Environment variable overriding the vision model identifier.
pub const OPENAI_MODEL_ENV: &str = "OPENAI_VISION_MODEL";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub responder: ResponderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "SessionConfig::default_max_images")]
    pub max_images: usize,
    #[serde(default = "SessionConfig::default_prompt")]
    pub default_prompt: String,
    #[serde(default = "SessionConfig::default_use_real_model")]
    pub use_real_model: bool,
    #[serde(default = "SessionConfig::default_log_capacity")]
    pub log_capacity: usize,
}

impl SessionConfig {
    const fn default_max_images() -> usize {
        4
    }

    fn default_prompt() -> String {
        "How many books are there in this image?".to_string()
    }

    const fn default_use_real_model() -> bool {
        true
    }

    const fn default_log_capacity() -> usize {
        120
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_images: Self::default_max_images(),
            default_prompt: Self::default_prompt(),
            use_real_model: Self::default_use_real_model(),
            log_capacity: Self::default_log_capacity(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponderConfig {
    #[serde(default)]
    pub openai: OpenAiProviderConfig,
    #[serde(default)]
    pub simulated: SimulatedResponderConfig,
}

/// Configuration options for the OpenAI vision endpoint.
///
/// ```
/// use batchquery_config::OpenAiProviderConfig;
///
/// let provider = OpenAiProviderConfig::default();
/// assert_eq!(provider.base_url, "https://api.openai.com/v1");
/// assert_eq!(provider.model, "gpt-4o-mini");
/// assert!(provider.api_key.is_none());
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct OpenAiProviderConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "OpenAiProviderConfig::default_base_url")]
    pub base_url: String,
    #[serde(default = "OpenAiProviderConfig::default_model")]
    pub model: String,
    #[serde(default = "OpenAiProviderConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl OpenAiProviderConfig {
    fn default_base_url() -> String {
        "https://api.openai.com/v1".to_string()
    }

    fn default_model() -> String {
        "gpt-4o-mini".to_string()
    }

    const fn default_request_timeout() -> u64 {
        60
    }

    /// Returns the credential when one is configured and not blank.
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

impl Default for OpenAiProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: Self::default_base_url(),
            model: Self::default_model(),
            request_timeout_seconds: Self::default_request_timeout(),
        }
    }
}

// The key must never end up in debug logs.
impl std::fmt::Debug for OpenAiProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedResponderConfig {
    #[serde(default = "SimulatedResponderConfig::default_min_latency")]
    pub min_latency_ms: u64,
    #[serde(default = "SimulatedResponderConfig::default_max_latency")]
    pub max_latency_ms: u64,
    #[serde(default = "SimulatedResponderConfig::default_failure_rate")]
    pub failure_rate: f64,
}

impl SimulatedResponderConfig {
    const fn default_min_latency() -> u64 {
        400
    }

    const fn default_max_latency() -> u64 {
        1600
    }

    const fn default_failure_rate() -> f64 {
        0.08
    }
}

impl Default for SimulatedResponderConfig {
    fn default() -> Self {
        Self {
            min_latency_ms: Self::default_min_latency(),
            max_latency_ms: Self::default_max_latency(),
            failure_rate: Self::default_failure_rate(),
        }
    }
}

impl AppConfig {
    /// Checks the invariants the rest of the client relies on.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.session.max_images == 0 {
            bail!("session.max_images must be at least 1");
        }
        if self.session.log_capacity == 0 {
            bail!("session.log_capacity must be at least 1");
        }
        let simulated = &self.responder.simulated;
        if simulated.min_latency_ms > simulated.max_latency_ms {
            bail!(
                "responder.simulated.min_latency_ms ({}) exceeds max_latency_ms ({})",
                simulated.min_latency_ms,
                simulated.max_latency_ms
            );
        }
        if !(0.0..=1.0).contains(&simulated.failure_rate) {
            bail!(
                "responder.simulated.failure_rate must be within [0, 1], got {}",
                simulated.failure_rate
            );
        }
        if self.responder.openai.request_timeout_seconds == 0 {
            bail!("responder.openai.request_timeout_seconds must be at least 1");
        }
        if self.responder.openai.model.trim().is_empty() {
            bail!("responder.openai.model cannot be empty");
        }
        Ok(())
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use batchquery_config::load;
///
/// std::env::remove_var("BATCHQUERY_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(config.session.max_images > 0);
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let mut builder = config::Config::builder()
        .set_default("session.max_images", to_i64(defaults.session.max_images as u64))?
        .set_default("session.default_prompt", defaults.session.default_prompt.clone())?
        .set_default("session.use_real_model", defaults.session.use_real_model)?
        .set_default(
            "session.log_capacity",
            to_i64(defaults.session.log_capacity as u64),
        )?
        .set_default(
            "responder.openai.base_url",
            defaults.responder.openai.base_url.clone(),
        )?
        .set_default("responder.openai.model", defaults.responder.openai.model.clone())?
        .set_default(
            "responder.openai.request_timeout_seconds",
            to_i64(defaults.responder.openai.request_timeout_seconds),
        )?
        .set_default(
            "responder.simulated.min_latency_ms",
            to_i64(defaults.responder.simulated.min_latency_ms),
        )?
        .set_default(
            "responder.simulated.max_latency_ms",
            to_i64(defaults.responder.simulated.max_latency_ms),
        )?
        .set_default(
            "responder.simulated.failure_rate",
            defaults.responder.simulated.failure_rate,
        )?;

    let environment_overrides = config::Environment::with_prefix("BATCHQUERY").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("BATCHQUERY_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via BATCHQUERY_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    apply_openai_environment(&mut config);
    config.validate().context("invalid configuration")?;

    debug!(?config, "loaded client configuration");
    Ok(config)
}

fn apply_openai_environment(config: &mut AppConfig) {
    let openai = &mut config.responder.openai;

    if openai.credential().is_none() {
        if let Some(key) = non_empty_env(OPENAI_API_KEY_ENV) {
            debug!(source = "env", "using OpenAI credential from environment");
            openai.api_key = Some(key);
        }
    }

    if let Some(model) = non_empty_env(OPENAI_MODEL_ENV) {
        debug!(%model, "vision model overridden from environment");
        openai.model = model;
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
