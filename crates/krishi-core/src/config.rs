//! Model service configuration.
//!
//! Loaded from environment variables (optionally seeded from `.env.local` /
//! `.env`) or from a YAML file:
//!
//! ```yaml
//! provider: gemini
//! api_key: ${GEMINI_API_KEY}
//! model: gemini-2.0-flash
//! timeout_secs: 60
//! max_retries: 2
//! deadline_secs: 150
//! ```
//!
//! `timeout_secs` bounds each HTTP request; `deadline_secs`, when set, bounds
//! a whole flow execution including retries and their delays. Without a
//! deadline an execution can take up to `(max_retries + 1) * timeout_secs`
//! plus retry delays.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::FlowError;

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

static ENV_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env reference regex is valid"));

/// Which wire protocol to speak to the model service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    /// Google Gemini `generateContent`.
    #[default]
    Gemini,
    /// Anthropic-compatible Messages API.
    Anthropic,
    /// OpenAI-compatible chat completions.
    OpenAi,
}

impl ModelProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelProvider::Gemini => "gemini",
            ModelProvider::Anthropic => "anthropic",
            ModelProvider::OpenAi => "openai",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ModelProvider::Gemini => "https://generativelanguage.googleapis.com",
            ModelProvider::Anthropic => "https://api.anthropic.com",
            ModelProvider::OpenAi => "https://api.openai.com/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ModelProvider::Gemini => "gemini-2.0-flash",
            ModelProvider::Anthropic => "claude-sonnet-4-20250514",
            ModelProvider::OpenAi => "gpt-4o-mini",
        }
    }

    /// Conventional API key variables, checked after `KRISHI_API_KEY`.
    pub fn api_key_vars(&self) -> &'static [&'static str] {
        match self {
            ModelProvider::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
            ModelProvider::Anthropic => &["ANTHROPIC_API_KEY"],
            ModelProvider::OpenAi => &["OPENAI_API_KEY"],
        }
    }
}

impl fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelProvider {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" | "googleai" => Ok(ModelProvider::Gemini),
            "anthropic" | "claude" => Ok(ModelProvider::Anthropic),
            "openai" | "openai-compatible" => Ok(ModelProvider::OpenAi),
            other => Err(FlowError::Configuration(format!(
                "Unknown model provider: '{}'",
                other
            ))),
        }
    }
}

/// Settings for the Model Invocation Client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub provider: ModelProvider,
    /// Overrides the provider's public endpoint.
    pub base_url: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_output_tokens: Option<u32>,
    pub timeout_secs: u64,
    /// Retries on transient failures only. 0 sends each request once.
    pub max_retries: u32,
    /// Caller-side limit for one execution, retries included.
    pub deadline_secs: Option<u64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ModelProvider::Gemini,
            base_url: None,
            api_key: String::new(),
            model: None,
            temperature: None,
            max_output_tokens: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: 0,
            deadline_secs: None,
        }
    }
}

impl ModelConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, FlowError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, FlowError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = ModelConfig::default();
        if let Some(provider) = get("KRISHI_MODEL_PROVIDER") {
            config.provider = provider.parse()?;
        }
        config.base_url = get("KRISHI_MODEL_BASE_URL");
        config.model = get("KRISHI_MODEL");
        if let Some(t) = get("KRISHI_MODEL_TEMPERATURE") {
            config.temperature = Some(parse_var("KRISHI_MODEL_TEMPERATURE", &t)?);
        }
        if let Some(n) = get("KRISHI_MODEL_MAX_OUTPUT_TOKENS") {
            config.max_output_tokens = Some(parse_var("KRISHI_MODEL_MAX_OUTPUT_TOKENS", &n)?);
        }
        if let Some(t) = get("KRISHI_MODEL_TIMEOUT_SECS") {
            config.timeout_secs = parse_var("KRISHI_MODEL_TIMEOUT_SECS", &t)?;
        }
        if let Some(r) = get("KRISHI_MODEL_MAX_RETRIES") {
            config.max_retries = parse_var("KRISHI_MODEL_MAX_RETRIES", &r)?;
        }
        if let Some(d) = get("KRISHI_MODEL_DEADLINE_SECS") {
            config.deadline_secs = Some(parse_var("KRISHI_MODEL_DEADLINE_SECS", &d)?);
        }

        config.api_key = lookup_api_key(config.provider, get).unwrap_or_default();

        Ok(config)
    }

    /// Parse YAML, expanding `${VAR}` and `${VAR:-default}` references first.
    /// An empty `api_key` falls back to the environment.
    pub fn from_yaml(yaml: &str) -> Result<Self, FlowError> {
        let resolved = resolve_env_vars(yaml);
        let mut config: ModelConfig = serde_yaml::from_str(&resolved).map_err(|e| {
            FlowError::Configuration(format!("Failed to parse model config: {}", e))
        })?;
        if config.api_key.trim().is_empty() || config.api_key.starts_with("${") {
            config.api_key = lookup_api_key(config.provider, |key| {
                std::env::var(key).ok().filter(|v| !v.trim().is_empty())
            })
            .unwrap_or_default();
        }
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FlowError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            FlowError::Configuration(format!(
                "Failed to read model config '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
            .trim_end_matches('/')
    }

    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }

    /// Startup check. A client is never built without credentials.
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.api_key.trim().is_empty() {
            return Err(FlowError::Configuration(format!(
                "No API key for provider '{}': set KRISHI_API_KEY or {}",
                self.provider,
                self.provider.api_key_vars().join(" / ")
            )));
        }
        if self.timeout_secs == 0 {
            return Err(FlowError::Configuration(
                "timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.deadline_secs == Some(0) {
            return Err(FlowError::Configuration(
                "deadline_secs must be greater than 0".to_string(),
            ));
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(FlowError::Configuration(format!(
                    "temperature {} is out of range 0.0..=2.0",
                    t
                )));
            }
        }
        Ok(())
    }
}

fn lookup_api_key<F>(provider: ModelProvider, get: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    std::iter::once("KRISHI_API_KEY")
        .chain(provider.api_key_vars().iter().copied())
        .find_map(|key| get(key))
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, FlowError> {
    value.trim().parse().map_err(|_| {
        FlowError::Configuration(format!("{} has an invalid value: '{}'", key, value))
    })
}

/// Resolve environment variable references in a string.
/// Supports `${ENV_VAR}` and `${ENV_VAR:-default}`; unset variables without a
/// default are left as written.
pub fn resolve_env_vars(input: &str) -> String {
    ENV_REF_RE
        .replace_all(input, |caps: &regex::Captures| {
            let var_expr = &caps[1];
            if let Some(idx) = var_expr.find(":-") {
                let var_name = &var_expr[..idx];
                let default_val = &var_expr[idx + 2..];
                std::env::var(var_name).unwrap_or_else(|_| default_val.to_string())
            } else {
                std::env::var(var_expr).unwrap_or_else(|_| format!("${{{}}}", var_expr))
            }
        })
        .to_string()
}

/// Load `KEY=VALUE` lines from `.env.local`, then `.env`, in the current
/// directory. Variables already set in the environment win.
pub fn load_dotenv() {
    load_dotenv_from(Path::new("."));
}

pub fn load_dotenv_from(dir: &Path) {
    for filename in [".env.local", ".env"] {
        let path = dir.join(filename);
        let Ok(content) = std::fs::read_to_string(&path) else {
            continue;
        };
        for (key, value) in parse_dotenv(&content) {
            if std::env::var(&key).is_err() {
                std::env::set_var(&key, &value);
            }
        }
        tracing::info!("[Config] Loaded environment from '{}'", path.display());
    }
}

fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let mut value = value.trim();
        if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            value = &value[1..value.len() - 1];
        }
        pairs.push((key.trim().to_string(), value.to_string()));
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_from_empty_env() {
        let config = ModelConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.provider, ModelProvider::Gemini);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.model(), "gemini-2.0-flash");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_provider_specific_key_fallback() {
        let config = ModelConfig::from_lookup(lookup(&[
            ("KRISHI_MODEL_PROVIDER", "anthropic"),
            ("ANTHROPIC_API_KEY", "sk-ant"),
            ("KRISHI_MODEL_BASE_URL", "https://proxy.local/"),
            ("KRISHI_MODEL_MAX_RETRIES", "2"),
        ]))
        .unwrap();
        assert_eq!(config.provider, ModelProvider::Anthropic);
        assert_eq!(config.api_key, "sk-ant");
        assert_eq!(config.base_url(), "https://proxy.local");
        assert_eq!(config.max_retries, 2);
        assert!(config.validate().is_ok());

        let explicit = ModelConfig::from_lookup(lookup(&[
            ("KRISHI_API_KEY", "k1"),
            ("GEMINI_API_KEY", "k2"),
        ]))
        .unwrap();
        assert_eq!(explicit.api_key, "k1");
    }

    #[test]
    fn test_deadline_from_env() {
        let config = ModelConfig::from_lookup(lookup(&[
            ("KRISHI_API_KEY", "k"),
            ("KRISHI_MODEL_DEADLINE_SECS", "90"),
        ]))
        .unwrap();
        assert_eq!(config.deadline(), Some(Duration::from_secs(90)));
        assert!(config.validate().is_ok());

        let zero = ModelConfig {
            deadline_secs: Some(0),
            ..config
        };
        assert!(zero.validate().is_err());
        assert_eq!(ModelConfig::default().deadline(), None);
    }

    #[test]
    fn test_invalid_values_are_configuration_errors() {
        let err = ModelConfig::from_lookup(lookup(&[("KRISHI_MODEL_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, FlowError::Configuration(_)));
        assert!("mistral".parse::<ModelProvider>().is_err());
    }

    #[test]
    fn test_from_yaml_resolves_env() {
        std::env::set_var("KRISHI_TEST_CONFIG_KEY", "yaml-key");
        let config = ModelConfig::from_yaml(
            "provider: openai\napi_key: ${KRISHI_TEST_CONFIG_KEY}\nmodel: ${KRISHI_TEST_UNSET_MODEL:-gpt-4o}\nmax_retries: 1\n",
        )
        .unwrap();
        assert_eq!(config.provider, ModelProvider::OpenAi);
        assert_eq!(config.api_key, "yaml-key");
        assert_eq!(config.model(), "gpt-4o");
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        std::env::remove_var("KRISHI_TEST_CONFIG_KEY");
    }

    #[test]
    fn test_parse_dotenv() {
        let pairs = parse_dotenv("# comment\n\nGEMINI_API_KEY=\"abc\"\nexport KRISHI_MODEL='gemini-pro'\nbroken line\n");
        assert_eq!(
            pairs,
            vec![
                ("GEMINI_API_KEY".to_string(), "abc".to_string()),
                ("KRISHI_MODEL".to_string(), "gemini-pro".to_string()),
            ]
        );
    }

    #[test]
    fn test_dotenv_does_not_override() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".env"),
            "KRISHI_TEST_DOTENV_A=from-file\nKRISHI_TEST_DOTENV_B=from-file\n",
        )
        .unwrap();
        std::env::set_var("KRISHI_TEST_DOTENV_A", "from-env");
        load_dotenv_from(dir.path());
        assert_eq!(std::env::var("KRISHI_TEST_DOTENV_A").unwrap(), "from-env");
        assert_eq!(std::env::var("KRISHI_TEST_DOTENV_B").unwrap(), "from-file");
        std::env::remove_var("KRISHI_TEST_DOTENV_A");
        std::env::remove_var("KRISHI_TEST_DOTENV_B");
    }
}
