//! HTTP client for the model server.
//!
//! Speaks the Ollama generate API for local inference and the OpenAI chat
//! completions API for hosted or llama.cpp-style servers.

mod config;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use config::{LlmConfig, LlmProvider};

use super::{LlmError, Oracle};

/// Talks to one model on one server.
pub struct LlmClient {
    config: LlmConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaTags {
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiModels {
    data: Vec<OpenAiModel>,
}

#[derive(Debug, Deserialize)]
struct OpenAiModel {
    id: String,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                warn!(
                    timeout_secs = config.request_timeout_secs,
                    "HTTP client setup failed, using defaults without a timeout: {}", e
                );
                Client::new()
            });

        Self { config, client }
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.config.api_key {
            Some(ref key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Path listing models, which doubles as the health check.
    fn models_path(&self) -> &'static str {
        match self.config.provider {
            LlmProvider::Ollama => "/api/tags",
            LlmProvider::OpenAI => "/v1/models",
        }
    }

    /// True when the server answers the model listing with a success status.
    pub async fn is_available(&self) -> bool {
        let request = self.authorized(self.client.get(self.url(self.models_path())));
        matches!(request.send().await, Ok(resp) if resp.status().is_success())
    }

    /// Names of the models the server offers.
    pub async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let request = self.authorized(self.client.get(self.url(self.models_path())));
        let resp = send(request).await?;
        match self.config.provider {
            LlmProvider::Ollama => {
                let tags: OllamaTags = parse(resp).await?;
                Ok(tags.models.into_iter().map(|m| m.name).collect())
            }
            LlmProvider::OpenAI => {
                let models: OpenAiModels = parse(resp).await?;
                Ok(models.data.into_iter().map(|m| m.id).collect())
            }
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let body = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };
        let request = self.client.post(self.url("/api/generate")).json(&body);
        let resp = match send(request).await {
            Err(LlmError::Api(msg)) if msg.starts_with("HTTP 404") => {
                return Err(LlmError::ModelNotFound(self.config.model.clone()));
            }
            other => other?,
        };
        let reply: GenerateResponse = parse(resp).await?;
        Ok(reply.response)
    }

    async fn chat(&self, prompt: &str) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };
        let request = self.authorized(self.client.post(self.url("/v1/chat/completions")).json(&body));
        let reply: ChatResponse = parse(send(request).await?).await?;
        reply
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Parse("Response contained no choices".to_string()))
    }
}

/// Send a request, turning transport failures and error statuses into [`LlmError`].
async fn send(request: RequestBuilder) -> Result<Response, LlmError> {
    let resp = request
        .send()
        .await
        .map_err(|e| LlmError::Connection(e.to_string()))?;

    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(LlmError::Api(describe_status(status, &body)))
}

fn describe_status(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("HTTP {}: {}", status.as_u16(), body)
    }
}

async fn parse<T: DeserializeOwned>(resp: Response) -> Result<T, LlmError> {
    resp.json().await.map_err(|e| LlmError::Parse(e.to_string()))
}

#[async_trait]
impl Oracle for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        debug!(
            model = %self.config.model,
            prompt_chars = prompt.len(),
            "Requesting completion"
        );
        let response = match self.config.provider {
            LlmProvider::Ollama => self.generate(prompt).await?,
            LlmProvider::OpenAI => self.chat(prompt).await?,
        };
        Ok(response.trim().to_string())
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}
