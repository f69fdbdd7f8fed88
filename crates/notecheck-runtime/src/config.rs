//! Configuration for notecheck-runtime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use notecheck_core::PassPolicy;

/// Errors raised while loading or validating configuration.
///
/// All of these are fatal and surface before any request is made.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported provider: {0} (expected one of: anthropic, openai)")]
    UnsupportedProvider(String),

    #[error("Missing required config field: {field}")]
    MissingField { field: String },

    #[error("Invalid config field '{field}': {reason}")]
    InvalidField { field: String, reason: String },
}

/// Runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Text-generation provider
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Pass policy handed to the parser and aggregator
    #[serde(default)]
    pub policy: PassPolicy,

    /// Timeout configuration
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Token limits per request kind
    #[serde(default)]
    pub max_tokens: MaxTokensConfig,

    /// Keep reviewer NOTES in results
    #[serde(default)]
    pub verbose: bool,

    /// Extra instruction appended to every element prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instruction: Option<String>,

    /// Redact PII from notes before assessment
    #[serde(default)]
    pub redact_pii: bool,

    /// Element requests in flight at once; 1 is strictly sequential
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Determinism configuration
    #[serde(default)]
    pub determinism: DeterminismConfig,
}

fn default_concurrency() -> usize {
    1
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            policy: PassPolicy::default(),
            timeouts: TimeoutConfig::default(),
            max_tokens: MaxTokensConfig::default(),
            verbose: false,
            custom_instruction: None,
            redact_pii: false,
            concurrency: default_concurrency(),
            determinism: DeterminismConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a YAML or JSON file, chosen by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            Ok(serde_json::from_str(&contents)?)
        } else {
            Self::from_yaml(&contents)
        }
    }

    /// Parse configuration from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Check the configuration before any request is made.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let kind = self
            .provider
            .kind()
            .ok_or_else(|| ConfigError::UnsupportedProvider(self.provider.provider_type.clone()))?;

        if self.provider.model_id.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "provider.model_id".to_string(),
            });
        }

        if self.provider.resolve_api_key().is_none() {
            return Err(ConfigError::MissingField {
                field: format!(
                    "provider.api_key (or environment variable {})",
                    self.provider.api_key_env_name(kind)
                ),
            });
        }

        self.validate_limits()
    }

    /// Checks that do not involve the provider.
    pub fn validate_limits(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidField {
                field: "concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if self.timeouts.llm_call.is_zero() {
            return Err(ConfigError::InvalidField {
                field: "timeouts.llm_call".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.max_tokens.element == 0 || self.max_tokens.summary == 0 {
            return Err(ConfigError::InvalidField {
                field: "max_tokens".to_string(),
                reason: "limits must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

/// Supported provider families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
}

impl ProviderKind {
    fn default_key_env(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
        }
    }
}

/// Provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider type identifier ("anthropic" or "openai")
    #[serde(rename = "type", default = "default_provider_type")]
    pub provider_type: String,

    /// Model identifier passed through to the provider
    #[serde(default)]
    pub model_id: String,

    /// API key; prefer `api_key_env` in files that are committed
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Environment variable holding the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Override the provider endpoint (OpenAI-compatible gateways, proxies)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Route all provider traffic through this proxy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: f32,
}

fn default_provider_type() -> String {
    "anthropic".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: default_provider_type(),
            model_id: String::new(),
            api_key: None,
            api_key_env: None,
            base_url: None,
            proxy_url: None,
            temperature: 0.0,
        }
    }
}

impl ProviderConfig {
    /// The provider family, or `None` for an unsupported type.
    pub fn kind(&self) -> Option<ProviderKind> {
        match self.provider_type.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Some(ProviderKind::Anthropic),
            "openai" => Some(ProviderKind::OpenAi),
            _ => None,
        }
    }

    fn api_key_env_name(&self, kind: ProviderKind) -> String {
        self.api_key_env
            .clone()
            .unwrap_or_else(|| kind.default_key_env().to_string())
    }

    /// The explicit key, else the key from the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            return Some(key.to_string());
        }
        let kind = self.kind()?;
        env::var(self.api_key_env_name(kind))
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Limit for a single provider call
    #[serde(with = "humantime_serde", default = "default_llm_timeout")]
    pub llm_call: Duration,
}

fn default_llm_timeout() -> Duration {
    Duration::from_secs(60)
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            llm_call: default_llm_timeout(),
        }
    }
}

/// Token limits per request kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MaxTokensConfig {
    #[serde(default = "default_element_tokens")]
    pub element: u32,

    #[serde(default = "default_summary_tokens")]
    pub summary: u32,
}

fn default_element_tokens() -> u32 {
    400
}

fn default_summary_tokens() -> u32 {
    300
}

impl Default for MaxTokensConfig {
    fn default() -> Self {
        Self {
            element: default_element_tokens(),
            summary: default_summary_tokens(),
        }
    }
}

/// Determinism configuration for reproducible reports.
///
/// For golden tests and audit replays, pin the report timestamp:
///
/// ```yaml
/// determinism:
///   evaluated_at: "2025-12-20T10:00:00Z"
/// ```
///
/// When `evaluated_at` is None (default), the current system time is used.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeterminismConfig {
    /// Fixed timestamp for the report (ISO 8601)
    #[serde(default)]
    pub evaluated_at: Option<DateTime<Utc>>,
}

// Duration as humantime text ("15s", "1m 30s")
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> RuntimeConfig {
        RuntimeConfig {
            provider: ProviderConfig {
                provider_type: "openai".to_string(),
                model_id: "gpt-4o-mini".to_string(),
                api_key: Some("sk-test".to_string()),
                ..ProviderConfig::default()
            },
            ..RuntimeConfig::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();
        assert_eq!(config.provider.provider_type, "anthropic");
        assert_eq!(config.max_tokens.element, 400);
        assert_eq!(config.max_tokens.summary, 300);
        assert_eq!(config.timeouts.llm_call, Duration::from_secs(60));
        assert!(!config.verbose);
        assert!(config.determinism.evaluated_at.is_none());
    }

    #[test]
    fn test_yaml_with_humantime_and_policy() {
        let config = RuntimeConfig::from_yaml(
            r#"
provider:
  type: anthropic
  model_id: claude-test
  api_key: key
timeouts:
  llm_call: 1m 30s
policy:
  block_on_high_missing: false
concurrency: 4
verbose: true
determinism:
  evaluated_at: "2025-12-20T10:00:00Z"
"#,
        )
        .unwrap();

        assert_eq!(config.timeouts.llm_call, Duration::from_secs(90));
        assert!(!config.policy.block_on_high_missing);
        assert_eq!(config.policy.critical_partial_threshold, 0.5);
        assert_eq!(config.concurrency, 4);
        assert!(config.verbose);
        assert!(config.determinism.evaluated_at.is_some());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_concurrency_defaults_to_sequential() {
        let config = RuntimeConfig::from_yaml("verbose: false\n").unwrap();
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn test_validate_rejects_unknown_provider() {
        let mut config = valid();
        config.provider.provider_type = "bedrock".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnsupportedProvider(p)) if p == "bedrock"
        ));
    }

    #[test]
    fn test_validate_rejects_empty_model_id() {
        let mut config = valid();
        config.provider.model_id = "  ".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("provider.model_id"));
    }

    #[test]
    fn test_validate_rejects_missing_api_key() {
        let mut config = valid();
        config.provider.api_key = None;
        config.provider.api_key_env = Some("NOTECHECK_TEST_UNSET_KEY".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("NOTECHECK_TEST_UNSET_KEY"));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = valid();
        config.concurrency = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidField { field, .. }) if field == "concurrency"
        ));
    }

    #[test]
    fn test_api_key_never_serialized() {
        let json = serde_json::to_string(&valid()).unwrap();
        assert!(!json.contains("sk-test"));
        assert!(json.contains("\"llm_call\":\"1m\""));
    }

    #[test]
    fn test_from_file_picks_format_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let yaml_path = dir.path().join("notecheck.yaml");
        std::fs::write(&yaml_path, "provider:\n  model_id: m\nredact_pii: true\n").unwrap();
        let config = RuntimeConfig::from_file(&yaml_path).unwrap();
        assert!(config.redact_pii);
        assert_eq!(config.provider.model_id, "m");

        let json_path = dir.path().join("notecheck.json");
        std::fs::write(&json_path, r#"{"provider": {"type": "openai", "model_id": "m"}}"#).unwrap();
        let config = RuntimeConfig::from_file(&json_path).unwrap();
        assert_eq!(config.provider.kind(), Some(ProviderKind::OpenAi));
    }
}
