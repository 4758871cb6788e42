//! Gemini `generateContent` client.
//!
//! A blocking client, one request per call. The API key is read from
//! `GEMINI_API_KEY`; all other settings come from [`GeneratorConfig`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::GeneratorConfig;
use crate::error::{GenerateError, GenerateResult};
use crate::pipeline::TextGenerator;

/// Environment variable holding the API key.
pub const API_KEY_VAR: &str = "GEMINI_API_KEY";

const SERVICE: &str = "Gemini";

/// Safety categories sent with every request, all set to `BLOCK_NONE`.
const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Blocking Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::blocking::Client,
    api_key: String,
    config: GeneratorConfig,
}

impl GeminiClient {
    /// Build a client with an explicit key.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError::Transport`] if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>, config: GeneratorConfig) -> GenerateResult<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|source| GenerateError::Transport {
                service: SERVICE,
                source,
            })?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            config,
        })
    }

    /// Build a client with the key from `GEMINI_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError::MissingApiKey`] if the variable is unset or blank.
    pub fn from_env(config: &GeneratorConfig) -> GenerateResult<Self> {
        let key = std::env::var(API_KEY_VAR)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(GenerateError::MissingApiKey { var: API_KEY_VAR })?;
        Self::new(key, config.clone())
    }

    /// Model name requests go to.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

impl TextGenerator for GeminiClient {
    #[tracing::instrument(name = "gemini_generate", skip_all, fields(model = %self.config.model))]
    fn generate(&self, prompt: &str) -> GenerateResult<String> {
        let body = GenerateRequest::new(prompt, &self.config);
        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .map_err(|source| GenerateError::Transport {
                service: SERVICE,
                source,
            })?;

        let status = response.status();
        let text = response.text().map_err(|source| GenerateError::Transport {
            service: SERVICE,
            source,
        })?;
        if !status.is_success() {
            return Err(GenerateError::Status {
                service: SERVICE,
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&text).map_err(|e| GenerateError::Decode {
                service: SERVICE,
                reason: e.to_string(),
            })?;
        tracing::debug!(bytes = text.len(), "response received");
        parsed.into_text()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

impl<'a> GenerateRequest<'a> {
    fn new(prompt: &'a str, config: &GeneratorConfig) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: config.temperature,
                top_p: config.top_p,
                top_k: config.top_k,
                max_output_tokens: config.max_output_tokens,
            },
            safety_settings: SAFETY_CATEGORIES
                .iter()
                .map(|category| SafetySetting {
                    category,
                    threshold: "BLOCK_NONE",
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    top_p: f64,
    top_k: u32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    /// Text of the first candidate, all parts concatenated.
    fn into_text(self) -> GenerateResult<String> {
        let text: String = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(GenerateError::EmptyResponse {
                feedback: self.prompt_feedback.map(|f| f.to_string()),
            });
        }
        Ok(text)
    }
}
