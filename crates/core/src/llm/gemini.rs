use crate::config::Settings;
use crate::llm::{InferenceClient, InferenceError};
use anyhow::Context;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

const TEMPERATURE: f32 = 0.0;
const TOP_K: u32 = 32;
const TOP_P: f32 = 1.0;
const MAX_OUTPUT_TOKENS: u32 = 2048;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Everything the client needs, passed in explicitly so tests never touch the env.
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GeminiConfig {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        Ok(Self {
            api_key: settings.require_gemini_api_key()?.to_string(),
            base_url: settings.gemini_base_url.clone(),
            model: settings.gemini_model.clone(),
            timeout: settings.inference_timeout,
        })
    }
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self { http, config })
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn request_body<'a>(prompt: &'a str, image_png: &[u8]) -> GenerateContentRequest<'a> {
        GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::Text { text: prompt },
                    RequestPart::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/png",
                            data: base64::engine::general_purpose::STANDARD.encode(image_png),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                top_k: TOP_K,
                top_p: TOP_P,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        }
    }

    /// `candidates[0].content.parts[0].text`, or `MalformedResponse`.
    fn response_text(body: &str) -> Result<String, InferenceError> {
        let parsed = serde_json::from_str::<GenerateContentResponse>(body).map_err(|e| {
            InferenceError::malformed(format!("response is not JSON: {e}"), Some(body.to_string()))
        })?;

        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| InferenceError::malformed("no candidates returned", Some(body.to_string())))?;

        let part = candidate
            .content
            .and_then(|c| c.parts.into_iter().next())
            .ok_or_else(|| InferenceError::malformed("no parts in content", Some(body.to_string())))?;

        part.text
            .ok_or_else(|| InferenceError::malformed("model returned non-text content", Some(body.to_string())))
    }
}

#[async_trait::async_trait]
impl InferenceClient for GeminiClient {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn infer(&self, prompt: &str, image_png: &[u8]) -> Result<String, InferenceError> {
        tracing::debug!(
            model = %self.config.model,
            prompt_len = prompt.len(),
            image_bytes = image_png.len(),
            "sending Gemini generateContent request"
        );

        let res = self
            .http
            .post(self.url())
            .header(API_KEY_HEADER, self.config.api_key.as_str())
            .json(&Self::request_body(prompt, image_png))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = res.status();
        let text = res.text().await.map_err(|e| self.transport_error(e))?;
        if !status.is_success() {
            tracing::warn!(%status, "Gemini returned an error status");
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Self::response_text(&text)
    }
}

impl GeminiClient {
    /// The URL is dropped so request errors never carry endpoint details into logs.
    fn transport_error(&self, err: reqwest::Error) -> InferenceError {
        if err.is_timeout() {
            InferenceError::Timeout(self.config.timeout)
        } else {
            InferenceError::Transport(err.without_url())
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}
