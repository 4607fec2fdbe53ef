//! Model server settings.

use serde::{Deserialize, Serialize};

/// Wire protocol spoken by the model server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Local Ollama server
    #[default]
    Ollama,
    /// Any OpenAI-compatible chat completions server
    OpenAI,
}

impl LlmProvider {
    /// Parse a provider name. Hosted OpenAI-compatible services map to `OpenAI`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "openai" | "groq" | "together" | "llamacpp" => Some(Self::OpenAI),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAI => "openai",
        }
    }
}

/// Endpoint for a named hosted service, used when only `LLM_PROVIDER` is set.
fn hosted_endpoint(name: &str) -> Option<&'static str> {
    match name.to_ascii_lowercase().as_str() {
        "openai" => Some("https://api.openai.com"),
        "groq" => Some("https://api.groq.com/openai"),
        "together" => Some("https://api.together.xyz"),
        _ => None,
    }
}

/// Where and how to reach the model that writes SQL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    /// Server base URL, without the API path
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Bearer token for hosted providers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model used for SQL generation, summaries and ambiguity checks
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Low values keep generated SQL stable between runs
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// HTTP timeout for one completion, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3:latest".to_string()
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_temperature() -> f32 {
    0.1
}

fn default_request_timeout() -> u64 {
    300
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self::base_default().with_env_overrides()
    }
}

impl LlmConfig {
    /// Built-in defaults, ignoring the environment.
    pub(crate) fn base_default() -> Self {
        Self {
            provider: LlmProvider::default(),
            endpoint: default_endpoint(),
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout(),
        }
    }

    /// Apply `LLM_PROVIDER`, `LLM_ENDPOINT` (or `OLLAMA_BASE_URL`),
    /// `LLM_API_KEY`, `LLM_MODEL`, `LLM_MAX_TOKENS` and `LLM_TEMPERATURE`.
    ///
    /// Unparseable numbers are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        let provider_name = env_var("LLM_PROVIDER");
        if let Some(provider) = provider_name.as_deref().and_then(LlmProvider::parse) {
            self.provider = provider;
        }

        match env_var("LLM_ENDPOINT").or_else(|| env_var("OLLAMA_BASE_URL")) {
            Some(endpoint) => self.endpoint = endpoint,
            None => {
                if let Some(hosted) = provider_name.as_deref().and_then(hosted_endpoint) {
                    self.endpoint = hosted.to_string();
                }
            }
        }

        if let Some(key) = env_var("LLM_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(model) = env_var("LLM_MODEL") {
            self.model = model;
        }
        if let Some(n) = env_var("LLM_MAX_TOKENS").and_then(|v| v.parse().ok()) {
            self.max_tokens = n;
        }
        if let Some(t) = env_var("LLM_TEMPERATURE").and_then(|v| v.parse().ok()) {
            self.temperature = t;
        }
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// What to tell the user when the server can't be reached.
    pub fn availability_hint(&self) -> String {
        match self.provider {
            LlmProvider::Ollama => format!(
                "Ollama not reachable at {}. Start it with `ollama serve` and pull {}.",
                self.endpoint, self.model
            ),
            LlmProvider::OpenAI => format!(
                "OpenAI-compatible API not reachable at {} (is LLM_API_KEY set?)",
                self.endpoint
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parsing() {
        assert_eq!(LlmProvider::parse("Ollama"), Some(LlmProvider::Ollama));
        assert_eq!(LlmProvider::parse("groq"), Some(LlmProvider::OpenAI));
        assert_eq!(LlmProvider::parse("bogus"), None);
        assert_eq!(hosted_endpoint("GROQ"), Some("https://api.groq.com/openai"));
        assert_eq!(hosted_endpoint("ollama"), None);
    }

    #[test]
    fn test_base_default() {
        let config = LlmConfig::base_default();
        assert_eq!(config.model, "llama3:latest");
        assert_eq!(config.endpoint, "http://localhost:11434");
        assert_eq!(config.clone().with_model("mistral:7b").model, "mistral:7b");
    }

    #[test]
    fn test_deserialize_partial() {
        let config: LlmConfig = toml::from_str(r#"model = "codellama:latest""#).unwrap();
        assert_eq!(config.model, "codellama:latest");
        assert_eq!(config.max_tokens, 2000);
        assert_eq!(config.request_timeout_secs, 300);
        assert_eq!(config.provider, LlmProvider::Ollama);
    }
}
