use std::time::Duration;

use async_trait::async_trait;
use core_config::{ConfigError, FromEnv, env_or_default, env_parse_or_default};
use futures::StreamExt;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::TextGenerator;
use crate::error::{CatalogError, CatalogResult};
use crate::streaming::FragmentStream;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// OpenAI chat completions configuration
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Upper bound for a complete, non-streaming reply
    pub request_timeout_secs: u64,
}

impl OpenAiConfig {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 1024,
            temperature: 0.3,
            request_timeout_secs: 60,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }
}

impl FromEnv for OpenAiConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: env_or_default("OPENAI_API_KEY", ""),
            base_url: env_or_default("OPENAI_BASE_URL", DEFAULT_BASE_URL),
            model: env_or_default("LLM_MODEL", DEFAULT_MODEL),
            max_tokens: env_parse_or_default("LLM_MAX_TOKENS", 1024)?,
            temperature: env_parse_or_default("LLM_TEMPERATURE", 0.3)?,
            request_timeout_secs: env_parse_or_default("LLM_TIMEOUT_SECS", 60)?,
        })
    }
}

/// [`TextGenerator`] over the OpenAI chat completions API
pub struct OpenAiGenerator {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiGenerator {
    pub fn new(config: OpenAiConfig) -> CatalogResult<Self> {
        if config.api_key.is_empty() {
            tracing::warn!("OPENAI_API_KEY is not set, recommendation requests will fail");
        }

        // No overall timeout here: streamed replies are bounded per fragment instead
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| CatalogError::Config(format!("failed to build OpenAI client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn from_env() -> CatalogResult<Self> {
        Self::new(OpenAiConfig::from_env()?)
    }

    fn completion_request(&self, system_prompt: &str, user_message: &str, stream: bool) -> CatalogResult<RequestBuilder> {
        if self.config.api_key.is_empty() {
            return Err(CatalogError::Generation("OpenAI API key is not configured".to_string()));
        }

        let body = ChatRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stream,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_message,
                },
            ],
        };

        Ok(self
            .client
            .post(format!("{}/chat/completions", self.config.base_url.trim_end_matches('/')))
            .bearer_auth(&self.config.api_key)
            .json(&body))
    }

    async fn send(request: RequestBuilder) -> CatalogResult<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|e| CatalogError::Generation(format!("OpenAI request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(CatalogError::Generation(format!(
                "OpenAI API error ({}): {}",
                status, error_text
            )));
        }

        Ok(response)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// A decoded server-sent event line of a streamed completion
#[derive(Debug, PartialEq)]
enum SseLine {
    Fragment(String),
    Done,
}

/// Splits a byte stream into SSE `data:` lines
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn feed(&mut self, chunk: &[u8]) -> CatalogResult<Vec<SseLine>> {
        self.buffer.extend_from_slice(chunk);
        let mut lines = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            if let Some(decoded) = decode_line(line.trim())? {
                lines.push(decoded);
            }
        }

        Ok(lines)
    }
}

fn decode_line(line: &str) -> CatalogResult<Option<SseLine>> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(Some(SseLine::Done));
    }

    let chunk: ChatChunk = serde_json::from_str(data)
        .map_err(|e| CatalogError::Generation(format!("invalid stream chunk: {}", e)))?;

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty())
        .map(SseLine::Fragment))
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    #[instrument(skip_all, fields(model = %self.config.model))]
    async fn generate(&self, system_prompt: &str, user_message: &str) -> CatalogResult<String> {
        let request = self
            .completion_request(system_prompt, user_message, false)?
            .timeout(Duration::from_secs(self.config.request_timeout_secs));
        let response = Self::send(request).await?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| CatalogError::Generation(format!("invalid OpenAI response: {}", e)))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CatalogError::Generation("OpenAI returned no content".to_string()))
    }

    #[instrument(skip_all, fields(model = %self.config.model))]
    async fn generate_stream(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> CatalogResult<FragmentStream> {
        let request = self.completion_request(system_prompt, user_message, true)?;
        let response = Self::send(request).await?;

        let fragments = async_stream::stream! {
            let mut bytes = response.bytes_stream();
            let mut decoder = SseDecoder::default();

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(CatalogError::Generation(format!("OpenAI stream interrupted: {}", e)));
                        return;
                    }
                };

                let lines = match decoder.feed(&chunk) {
                    Ok(lines) => lines,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };

                for line in lines {
                    match line {
                        SseLine::Fragment(text) => yield Ok(text),
                        SseLine::Done => return,
                    }
                }
            }
        };

        Ok(fragments.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_handles_split_chunks() {
        let mut decoder = SseDecoder::default();

        let first = decoder
            .feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\ndata: {\"choi")
            .unwrap();
        assert_eq!(first, vec![SseLine::Fragment("Hel".to_string())]);

        let second = decoder
            .feed(b"ces\":[{\"delta\":{\"content\":\"lo\"}}]}\n\ndata: [DONE]\n\n")
            .unwrap();
        assert_eq!(
            second,
            vec![SseLine::Fragment("lo".to_string()), SseLine::Done]
        );
    }

    #[test]
    fn test_decoder_skips_role_and_empty_deltas() {
        let mut decoder = SseDecoder::default();
        let lines = decoder
            .feed(b"data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n: keep-alive\n\n")
            .unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn test_decoder_rejects_malformed_chunk() {
        let mut decoder = SseDecoder::default();
        let err = decoder.feed(b"data: {not json}\n").unwrap_err();
        assert!(matches!(err, CatalogError::Generation(_)));
    }

    #[test]
    fn test_openai_config_defaults() {
        temp_env::with_vars(
            [
                ("OPENAI_API_KEY", None::<&str>),
                ("LLM_MODEL", None),
                ("LLM_MAX_TOKENS", None),
                ("LLM_TEMPERATURE", None),
            ],
            || {
                let config = OpenAiConfig::from_env().unwrap();
                assert_eq!(config.model, "gpt-4o-mini");
                assert_eq!(config.max_tokens, 1024);
                assert_eq!(config.temperature, 0.3);
            },
        );
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_generation() {
        let generator = OpenAiGenerator::new(OpenAiConfig::new(String::new())).unwrap();
        let err = generator.generate("system", "user").await.unwrap_err();
        assert!(matches!(err, CatalogError::Generation(_)));
    }
}
