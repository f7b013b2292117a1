//! Configuration parsing and validation for modelrouter.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::registry::{known_provider_capabilities, ModelInfo};
use crate::router::{Route, Strategy};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub router: RouterSettings,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub models: Vec<ModelInfo>,
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Router and registry tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct RouterSettings {
    /// Strategy used when neither the request criteria nor the route name one
    #[serde(default)]
    pub default_strategy: Strategy,
    /// Cadence of the health-check driver
    #[serde(default = "default_health_check_interval_ms")]
    pub health_check_interval_ms: u64,
    /// Errors until a provider is unavailable (degraded at half)
    #[serde(default = "default_error_threshold")]
    pub error_threshold: u32,
    /// Whether to seed the built-in model catalog
    #[serde(default = "default_true")]
    pub seed_default_catalog: bool,
}

fn default_health_check_interval_ms() -> u64 {
    60_000
}

fn default_error_threshold() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

fn default_priority() -> f64 {
    1.0
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            default_strategy: Strategy::default(),
            health_check_interval_ms: default_health_check_interval_ms(),
            error_threshold: default_error_threshold(),
            seed_default_catalog: true,
        }
    }
}

impl RouterSettings {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }
}

/// API key wrapper that redacts in Debug/Display/Serialize and zeroizes on drop.
///
/// The raw value is only reachable through `.expose_secret()`.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl Serialize for ApiKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for ApiKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(|s| ApiKey(SecretString::from(s)))
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        ApiKey(SecretString::from(s))
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        ApiKey(SecretString::from(s))
    }
}

/// How a provider's API key was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum KeySource {
    /// Literal string in config
    Literal,
    /// Contained ${VAR} references expanded from environment
    EnvExpanded,
    /// Auto-discovered from the convention env var (holds var name)
    Convention(String),
    None,
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Literal => write!(f, "config-literal"),
            KeySource::EnvExpanded => write!(f, "env-expanded"),
            KeySource::Convention(var) => write!(f, "convention ({})", var),
            KeySource::None => write!(f, "none"),
        }
    }
}

/// Provider registration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider identifier, must be a known provider (e.g., "openai")
    pub id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Weight used by the weighted strategy
    #[serde(default = "default_priority")]
    pub priority: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<ApiKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl ProviderConfig {
    /// Enabled provider with priority 1 and no credentials.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            priority: default_priority(),
            api_key: None,
            base_url: None,
        }
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_api_key(mut self, key: impl Into<ApiKey>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, without env expansion.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = read_config(path.as_ref())?;
        Self::parse_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.router.error_threshold < 2 {
            return Err(ConfigError::Validation(format!(
                "error_threshold must be at least 2, got {}",
                self.router.error_threshold
            )));
        }
        if self.router.health_check_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "health_check_interval_ms must be positive".to_string(),
            ));
        }

        if self.providers.is_empty() {
            tracing::warn!("No providers configured - every request will fail to route");
        }

        let mut provider_ids = HashSet::new();
        for provider in &self.providers {
            if known_provider_capabilities(&provider.id).is_none() {
                return Err(ConfigError::Validation(format!(
                    "Unknown provider '{}'",
                    provider.id
                )));
            }
            if !provider_ids.insert(provider.id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Provider '{}' is configured more than once",
                    provider.id
                )));
            }
            if !provider.priority.is_finite() || provider.priority < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "Provider '{}' has invalid priority {}",
                    provider.id, provider.priority
                )));
            }
        }

        for model in &self.models {
            if model.id.is_empty() || model.provider.is_empty() {
                return Err(ConfigError::Validation(
                    "Model entries need both id and provider".to_string(),
                ));
            }
            let prices = [model.input_price_per_1k, model.output_price_per_1k];
            if prices.iter().any(|p| !p.is_finite() || *p < 0.0) {
                return Err(ConfigError::Validation(format!(
                    "Model '{}' has invalid pricing",
                    model.id
                )));
            }
            if model.context_window == 0 {
                return Err(ConfigError::Validation(format!(
                    "Model '{}' has zero context window",
                    model.id
                )));
            }
            if !provider_ids.contains(model.provider.as_str()) {
                tracing::warn!(
                    model = %model.id,
                    provider = %model.provider,
                    "Model bound to a provider that is not configured - it will never be selected"
                );
            }
        }

        let mut route_ids = HashSet::new();
        for route in &self.routes {
            if !route_ids.insert(route.id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Route '{}' is configured more than once",
                    route.id
                )));
            }
            if route.fallback_chain.iter().any(|m| m.is_empty()) {
                return Err(ConfigError::Validation(format!(
                    "Route '{}' has an empty fallback chain entry",
                    route.id
                )));
            }
        }

        Ok(())
    }
}

fn read_config(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable '{var}' not set for provider '{provider}': {message}")]
    EnvVar {
        var: String,
        provider: String,
        message: String,
    },
}

/// Provider config as written in TOML; `api_key` may still hold `${VAR}` references.
#[derive(Deserialize)]
pub struct RawProviderConfig {
    id: String,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default = "default_priority")]
    priority: f64,
    api_key: Option<String>,
    base_url: Option<String>,
}

/// Configuration as written in TOML, before key expansion.
#[derive(Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    router: RouterSettings,
    #[serde(default)]
    providers: Vec<RawProviderConfig>,
    #[serde(default)]
    models: Vec<ModelInfo>,
    #[serde(default)]
    routes: Vec<Route>,
    #[serde(default)]
    logging: LoggingConfig,
}

/// Expand every `${VAR}` in `input` through `lookup`.
///
/// Text before the first `${` is copied as is; every later piece must be
/// `NAME}rest`. Fails on the first missing variable, an unclosed `${`, or
/// an empty name.
fn expand_env_vars_with<F>(input: &str, provider_id: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let env_error = |var: &str, message: String| ConfigError::EnvVar {
        var: var.to_string(),
        provider: provider_id.to_string(),
        message,
    };

    let mut pieces = input.split("${");
    let mut expanded = pieces.next().unwrap_or_default().to_string();
    for piece in pieces {
        let (var, literal) = piece.split_once('}').ok_or_else(|| {
            env_error("<unclosed>", format!("Unclosed '${{' in value: {}", input))
        })?;
        if var.is_empty() {
            return Err(env_error("", "Empty variable name in '${}'".to_string()));
        }
        let value = lookup(var).ok_or_else(|| {
            env_error(
                var,
                format!("'{}' is referenced by provider '{}' but unset", var, provider_id),
            )
        })?;
        expanded.push_str(&value);
        expanded.push_str(literal);
    }
    Ok(expanded)
}

/// Convention env var consulted when a provider has no `api_key`.
///
/// - "openai" -> "MODELROUTER_OPENAI_API_KEY"
/// - "together-ai" -> "MODELROUTER_TOGETHER_AI_API_KEY"
pub fn convention_env_var_name(provider_id: &str) -> String {
    format!(
        "MODELROUTER_{}_API_KEY",
        provider_id.to_uppercase().replace(['-', ' '], "_")
    )
}

/// Resolve a provider key, reporting where it came from.
fn resolve_api_key<F>(
    provider_id: &str,
    raw_key: Option<&str>,
    lookup: F,
) -> Result<(Option<ApiKey>, KeySource), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match raw_key {
        Some(raw) if raw.contains("${") => {
            let expanded = expand_env_vars_with(raw, provider_id, &lookup)?;
            Ok((Some(ApiKey::from(expanded)), KeySource::EnvExpanded))
        }
        Some(raw) => Ok((Some(ApiKey::from(raw)), KeySource::Literal)),
        None => {
            let var = convention_env_var_name(provider_id);
            Ok(match lookup(&var) {
                Some(value) => (Some(ApiKey::from(value)), KeySource::Convention(var)),
                None => (None, KeySource::None),
            })
        }
    }
}

impl Config {
    /// Convert raw config to final config, resolving keys through `lookup`.
    fn from_raw_with<F>(
        raw: RawConfig,
        lookup: F,
    ) -> Result<(Self, Vec<(String, KeySource)>), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut providers = Vec::with_capacity(raw.providers.len());
        let mut key_sources = Vec::with_capacity(raw.providers.len());

        for rp in raw.providers {
            let (api_key, source) = resolve_api_key(&rp.id, rp.api_key.as_deref(), &lookup)?;
            key_sources.push((rp.id.clone(), source));
            providers.push(ProviderConfig {
                id: rp.id,
                enabled: rp.enabled,
                priority: rp.priority,
                api_key,
                base_url: rp.base_url,
            });
        }

        let config = Config {
            router: raw.router,
            providers,
            models: raw.models,
            routes: raw.routes,
            logging: raw.logging,
        };

        Ok((config, key_sources))
    }

    /// Convert raw config to final config using the process environment.
    pub fn from_raw(raw: RawConfig) -> Result<(Self, Vec<(String, KeySource)>), ConfigError> {
        Self::from_raw_with(raw, |name| std::env::var(name).ok())
    }

    /// Load a TOML file, expand `${VAR}` key references and apply convention lookup.
    ///
    /// Returns the validated config and per-provider key source information.
    pub fn from_file_with_env(
        path: impl AsRef<Path>,
    ) -> Result<(Self, Vec<(String, KeySource)>), ConfigError> {
        let content = read_config(path.as_ref())?;
        let raw: RawConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;
        let (config, key_sources) = Self::from_raw(raw)?;
        config.validate()?;
        Ok((config, key_sources))
    }
}
