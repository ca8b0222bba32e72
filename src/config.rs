//! Configuration management for promptroute
//!
//! Parses TOML configuration files and provides typed access to settings.
//! Every section except `[models]` falls back to defaults when omitted.

use crate::error::{AppError, AppResult};
use crate::generation::{
    DEFAULT_EXTENDED_REASONING_THRESHOLD, DEFAULT_EXTENDED_TIER_THRESHOLD, GenerationPolicy, Tier,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound for `continuation.max_continuations`
pub const MAX_CONTINUATIONS_LIMIT: usize = 10;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub models: ModelsConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub continuation: ContinuationConfig,
    #[serde(default)]
    pub guard: GuardConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// One model per capability tier
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelsConfig {
    pub standard: ModelEndpoint,
    pub extended: ModelEndpoint,
}

/// Individual model endpoint configuration
///
/// Fields are private; a validated endpoint cannot be edited afterwards.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelEndpoint {
    name: String,
    base_url: String,
    /// Hard output ceiling, applied after the per-intent token budget
    max_output_tokens: usize,
}

impl ModelEndpoint {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, max_output_tokens: usize) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            max_output_tokens,
        }
    }

    /// Get the model name sent to the provider
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the endpoint base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the output ceiling (validated to fit in u32)
    pub fn max_output_tokens(&self) -> u32 {
        u32::try_from(self.max_output_tokens).unwrap_or(u32::MAX)
    }
}

/// Escalation thresholds for tier and extended reasoning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoutingConfig {
    #[serde(default = "default_extended_tier_threshold")]
    pub extended_tier_threshold: f64,
    #[serde(default = "default_extended_reasoning_threshold")]
    pub extended_reasoning_threshold: f64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            extended_tier_threshold: default_extended_tier_threshold(),
            extended_reasoning_threshold: default_extended_reasoning_threshold(),
        }
    }
}

impl RoutingConfig {
    pub fn policy(&self) -> GenerationPolicy {
        GenerationPolicy::new(self.extended_reasoning_threshold, self.extended_tier_threshold)
    }
}

fn default_extended_tier_threshold() -> f64 {
    DEFAULT_EXTENDED_TIER_THRESHOLD
}

fn default_extended_reasoning_threshold() -> f64 {
    DEFAULT_EXTENDED_REASONING_THRESHOLD
}

/// Continuation loop ceiling
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContinuationConfig {
    #[serde(default = "default_max_continuations")]
    pub max_continuations: usize,
}

impl Default for ContinuationConfig {
    fn default() -> Self {
        Self {
            max_continuations: default_max_continuations(),
        }
    }
}

fn default_max_continuations() -> usize {
    5
}

/// Retry and burst-smoothing settings for provider calls
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GuardConfig {
    /// How long a request waits when another one is already in flight
    #[serde(default = "default_in_flight_wait_ms")]
    pub in_flight_wait_ms: u64,
    /// Minimum gap between two dispatches
    #[serde(default = "default_min_spacing_ms")]
    pub min_spacing_ms: u64,
    /// Total attempts per pass, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Base backoff in milliseconds (doubles each retry)
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            in_flight_wait_ms: default_in_flight_wait_ms(),
            min_spacing_ms: default_min_spacing_ms(),
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl GuardConfig {
    pub fn in_flight_wait(&self) -> Duration {
        Duration::from_millis(self.in_flight_wait_ms)
    }

    pub fn min_spacing(&self) -> Duration {
        Duration::from_millis(self.min_spacing_ms)
    }
}

fn default_in_flight_wait_ms() -> u64 {
    300
}

fn default_min_spacing_ms() -> u64 {
    100
}

fn default_max_attempts() -> usize {
    3
}

fn default_base_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    8000
}

/// History windowing settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HistoryConfig {
    /// Per-message character cap before the truncation marker is appended
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_message_chars: default_max_message_chars(),
        }
    }
}

fn default_max_message_chars() -> usize {
    2000
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Build a config from two endpoints with every other section defaulted
    pub fn with_models(standard: ModelEndpoint, extended: ModelEndpoint) -> Self {
        Self {
            models: ModelsConfig { standard, extended },
            routing: RoutingConfig::default(),
            continuation: ContinuationConfig::default(),
            guard: GuardConfig::default(),
            history: HistoryConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        // Phase 1: Read file (preserves io::Error context)
        let content = std::fs::read_to_string(path.as_ref()).map_err(|source| {
            AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            }
        })?;

        // Phase 2: Parse TOML (preserves toml::de::Error context)
        let config: Self =
            toml::from_str(&content).map_err(|source| AppError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            })?;

        // Phase 3: Validate parsed config (provides contextual reason)
        config
            .validate()
            .map_err(|e| AppError::ConfigValidationFailed {
                path: path_display,
                reason: match e {
                    AppError::Config(reason) => reason,
                    other => other.to_string(),
                },
            })?;

        Ok(config)
    }

    /// Get the endpoint serving a tier
    pub fn endpoint_for_tier(&self, tier: Tier) -> &ModelEndpoint {
        match tier {
            Tier::Standard => &self.models.standard,
            Tier::Extended => &self.models.extended,
        }
    }

    /// Resolve a manual override name to its tier and endpoint
    pub fn find_model(&self, name: &str) -> Option<(Tier, &ModelEndpoint)> {
        [Tier::Standard, Tier::Extended]
            .into_iter()
            .map(|tier| (tier, self.endpoint_for_tier(tier)))
            .find(|(_, endpoint)| endpoint.name() == name)
    }

    /// Validate configuration after parsing
    ///
    /// Called by `from_file()` and `from_str()`; call it directly when a
    /// config is assembled in code.
    pub fn validate(&self) -> AppResult<()> {
        for (tier, endpoint) in [
            ("standard", &self.models.standard),
            ("extended", &self.models.extended),
        ] {
            if endpoint.name.trim().is_empty() {
                return Err(AppError::Config(format!(
                    "models.{tier}.name must not be empty."
                )));
            }

            if endpoint.max_output_tokens == 0 {
                return Err(AppError::Config(format!(
                    "Model '{}' in models.{tier} has max_output_tokens=0. \
                    max_output_tokens must be greater than 0.",
                    endpoint.name
                )));
            }

            // open-agent-sdk takes max_tokens as u32
            if endpoint.max_output_tokens > u32::MAX as usize {
                return Err(AppError::Config(format!(
                    "Model '{}' in models.{tier} has max_output_tokens={} which exceeds u32::MAX ({}).",
                    endpoint.name,
                    endpoint.max_output_tokens,
                    u32::MAX
                )));
            }

            if !endpoint.base_url.starts_with("http://")
                && !endpoint.base_url.starts_with("https://")
            {
                return Err(AppError::Config(format!(
                    "Model '{}' in models.{tier} has invalid base_url '{}'. \
                    base_url must start with 'http://' or 'https://'.",
                    endpoint.name, endpoint.base_url
                )));
            }
        }

        for (key, value) in [
            (
                "routing.extended_tier_threshold",
                self.routing.extended_tier_threshold,
            ),
            (
                "routing.extended_reasoning_threshold",
                self.routing.extended_reasoning_threshold,
            ),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(AppError::Config(format!(
                    "{key}={value} is invalid. \
                    Thresholds must be finite numbers between 0.0 and 1.0."
                )));
            }
        }

        if self.continuation.max_continuations > MAX_CONTINUATIONS_LIMIT {
            return Err(AppError::Config(format!(
                "continuation.max_continuations={} exceeds the limit of {}.",
                self.continuation.max_continuations, MAX_CONTINUATIONS_LIMIT
            )));
        }

        if self.guard.max_attempts == 0 {
            return Err(AppError::Config(
                "guard.max_attempts must be at least 1.".to_string(),
            ));
        }

        if self.guard.max_backoff_ms < self.guard.base_backoff_ms {
            return Err(AppError::Config(format!(
                "guard.max_backoff_ms={} must be >= guard.base_backoff_ms={}.",
                self.guard.max_backoff_ms, self.guard.base_backoff_ms
            )));
        }

        if self.history.max_message_chars == 0 {
            return Err(AppError::Config(
                "history.max_message_chars must be greater than 0.".to_string(),
            ));
        }

        Ok(())
    }
}

impl FromStr for Config {
    type Err = AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let config: Config =
            toml::from_str(toml_str).map_err(|source| AppError::ConfigParseFailed {
                path: "<string>".to_string(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_CONFIG: &str = r#"
[models.standard]
name = "flash-model"
base_url = "http://localhost:1234/v1"
max_output_tokens = 4096

[models.extended]
name = "pro-model"
base_url = "https://inference.example.com/v1"
max_output_tokens = 16384

[routing]
extended_tier_threshold = 0.65
extended_reasoning_threshold = 0.6

[continuation]
max_continuations = 4

[guard]
in_flight_wait_ms = 250
min_spacing_ms = 50
max_attempts = 4
base_backoff_ms = 500
max_backoff_ms = 4000

[history]
max_message_chars = 1500

[observability]
log_level = "debug"
"#;

    const MINIMAL_CONFIG: &str = r#"
[models.standard]
name = "flash-model"
base_url = "http://localhost:1234/v1"
max_output_tokens = 4096

[models.extended]
name = "pro-model"
base_url = "http://localhost:1234/v1"
max_output_tokens = 8192
"#;

    #[test]
    fn test_config_from_str_parses_successfully() {
        let config = Config::from_str(TEST_CONFIG).expect("should parse config");
        assert_eq!(config.models.standard.name(), "flash-model");
        assert_eq!(config.models.extended.max_output_tokens(), 16384);
        assert_eq!(config.routing.extended_tier_threshold, 0.65);
        assert_eq!(config.continuation.max_continuations, 4);
        assert_eq!(config.guard.max_attempts, 4);
        assert_eq!(config.guard.in_flight_wait(), Duration::from_millis(250));
        assert_eq!(config.history.max_message_chars, 1500);
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn test_config_with_missing_sections_uses_defaults() {
        let config = Config::from_str(MINIMAL_CONFIG).expect("should parse config");
        assert_eq!(config.routing.extended_tier_threshold, 0.6);
        assert_eq!(config.routing.extended_reasoning_threshold, 0.6);
        assert_eq!(config.continuation.max_continuations, 5);
        assert_eq!(config.guard.in_flight_wait_ms, 300);
        assert_eq!(config.guard.min_spacing_ms, 100);
        assert_eq!(config.guard.max_attempts, 3);
        assert_eq!(config.guard.base_backoff_ms, 1000);
        assert_eq!(config.guard.max_backoff_ms, 8000);
        assert_eq!(config.history.max_message_chars, 2000);
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_config_missing_models_fails_to_parse() {
        let result = Config::from_str("[routing]\nextended_tier_threshold = 0.5\n");
        assert!(matches!(result, Err(AppError::ConfigParseFailed { .. })));
    }

    #[test]
    fn test_find_model_resolves_tier() {
        let config = Config::from_str(TEST_CONFIG).unwrap();
        let (tier, endpoint) = config.find_model("pro-model").unwrap();
        assert_eq!(tier, Tier::Extended);
        assert_eq!(endpoint.base_url(), "https://inference.example.com/v1");

        assert_eq!(config.find_model("flash-model").unwrap().0, Tier::Standard);
        assert!(config.find_model("unknown").is_none());
    }

    #[test]
    fn test_same_name_prefers_standard() {
        let config = Config::with_models(
            ModelEndpoint::new("shared", "http://a/v1", 1024),
            ModelEndpoint::new("shared", "http://b/v1", 2048),
        );
        assert_eq!(config.find_model("shared").unwrap().0, Tier::Standard);
    }

    #[test]
    fn test_routing_policy_uses_configured_thresholds() {
        let config = Config::from_str(TEST_CONFIG).unwrap();
        let policy = config.routing.policy();
        assert_eq!(
            policy.select_tier(crate::router::Intent::Coding, 0.62),
            Tier::Standard
        );
        assert_eq!(
            policy.select_tier(crate::router::Intent::Coding, 0.7),
            Tier::Extended
        );
    }

    #[test]
    fn test_config_validation_zero_max_output_tokens_fails() {
        let mut config = Config::from_str(TEST_CONFIG).unwrap();
        config.models.standard.max_output_tokens = 0;

        let err_msg = config.validate().unwrap_err().to_string();
        assert!(err_msg.contains("max_output_tokens"));
        assert!(err_msg.contains("greater than 0"));
    }

    #[test]
    fn test_config_validation_max_output_tokens_exceeding_u32_fails() {
        let mut config = Config::from_str(TEST_CONFIG).unwrap();
        config.models.extended.max_output_tokens = u32::MAX as usize + 1;

        let err_msg = config.validate().unwrap_err().to_string();
        assert!(err_msg.contains("u32::MAX"));
    }

    #[test]
    fn test_config_validation_invalid_base_url_fails() {
        let mut config = Config::from_str(TEST_CONFIG).unwrap();
        config.models.extended.base_url = "ftp://invalid.com".to_string();

        let err_msg = config.validate().unwrap_err().to_string();
        assert!(err_msg.contains("base_url"));
        assert!(err_msg.contains("ftp://invalid.com"));
    }

    #[test]
    fn test_config_validation_empty_model_name_fails() {
        let mut config = Config::from_str(TEST_CONFIG).unwrap();
        config.models.standard.name = "  ".to_string();

        let err_msg = config.validate().unwrap_err().to_string();
        assert!(err_msg.contains("models.standard.name"));
    }

    #[test]
    fn test_config_validation_threshold_out_of_range_fails() {
        let mut config = Config::from_str(TEST_CONFIG).unwrap();
        config.routing.extended_reasoning_threshold = 1.5;
        let err_msg = config.validate().unwrap_err().to_string();
        assert!(err_msg.contains("routing.extended_reasoning_threshold=1.5"));

        let mut config = Config::from_str(TEST_CONFIG).unwrap();
        config.routing.extended_tier_threshold = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_threshold_boundaries_succeed() {
        let mut config = Config::from_str(TEST_CONFIG).unwrap();
        config.routing.extended_tier_threshold = 0.0;
        config.routing.extended_reasoning_threshold = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_max_continuations_limit() {
        let mut config = Config::from_str(TEST_CONFIG).unwrap();
        config.continuation.max_continuations = MAX_CONTINUATIONS_LIMIT;
        assert!(config.validate().is_ok());

        config.continuation.max_continuations = MAX_CONTINUATIONS_LIMIT + 1;
        let err_msg = config.validate().unwrap_err().to_string();
        assert!(err_msg.contains("max_continuations"));

        config.continuation.max_continuations = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_zero_attempts_fails() {
        let mut config = Config::from_str(TEST_CONFIG).unwrap();
        config.guard.max_attempts = 0;
        let err_msg = config.validate().unwrap_err().to_string();
        assert!(err_msg.contains("max_attempts"));
    }

    #[test]
    fn test_config_validation_backoff_cap_below_base_fails() {
        let mut config = Config::from_str(TEST_CONFIG).unwrap();
        config.guard.base_backoff_ms = 5000;
        config.guard.max_backoff_ms = 1000;
        let err_msg = config.validate().unwrap_err().to_string();
        assert!(err_msg.contains("max_backoff_ms=1000"));
    }

    #[test]
    fn test_validation_message_has_single_prefix() {
        let mut config = Config::from_str(TEST_CONFIG).unwrap();
        config.guard.max_attempts = 0;
        let err_msg = config.validate().unwrap_err().to_string();
        assert_eq!(
            err_msg,
            "Configuration error: guard.max_attempts must be at least 1."
        );
        assert_eq!(err_msg.matches("Configuration error").count(), 1);
    }

    #[test]
    fn test_config_validation_zero_history_chars_fails() {
        let mut config = Config::from_str(TEST_CONFIG).unwrap();
        config.history.max_message_chars = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_reports_missing_file() {
        let result = Config::from_file("/nonexistent/promptroute.toml");
        match result {
            Err(AppError::ConfigFileRead { path, .. }) => {
                assert_eq!(path, "/nonexistent/promptroute.toml");
            }
            other => panic!("expected ConfigFileRead, got {other:?}"),
        }
    }
}
