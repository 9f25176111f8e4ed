//! Completion model adapters.
//!
//! The pipeline calls a language model twice per question: once to rewrite
//! the question into statutory vocabulary and once to write the answer.
//! Both go through [`CompletionModel`], so the retriever and engine can be
//! exercised with in-process fakes.
//!
//! Hosted providers share the retry and backoff policy in [`crate::http`].

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::LlmConfig;
use crate::http::{post_json, JsonPost};

/// A chat-style text completion backend.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Run one system + user exchange and return the model's text reply.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Always fails. Selected by `provider = "disabled"`; the retriever then
/// falls back to the raw query and `ask` reports the error.
pub struct DisabledCompletion;

#[async_trait]
impl CompletionModel for DisabledCompletion {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
        bail!("LLM provider is disabled")
    }
}

// ============ Gemini ============

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Google Gemini via the `generateContent` REST endpoint.
/// Requires `GOOGLE_API_KEY`.
pub struct GeminiCompletion {
    model: String,
    api_key: String,
    temperature: f32,
    timeout_secs: u64,
    max_retries: u32,
}

impl GeminiCompletion {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("GOOGLE_API_KEY")
            .map_err(|_| anyhow::anyhow!("GOOGLE_API_KEY environment variable not set"))?;
        Ok(Self {
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl CompletionModel for GeminiCompletion {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let body = serde_json::json!({
            "systemInstruction": { "parts": [{ "text": system }] },
            "contents": [{ "role": "user", "parts": [{ "text": user }] }],
            "generationConfig": { "temperature": self.temperature },
        });
        let url = format!("{}/{}:generateContent", GEMINI_BASE_URL, self.model);
        let json = post_json(JsonPost {
            label: "Gemini",
            url: &url,
            headers: &[("x-goog-api-key", self.api_key.clone())],
            body: &body,
            timeout_secs: self.timeout_secs,
            max_retries: self.max_retries,
        })
        .await?;
        parse_gemini_response(&json)
    }
}

fn parse_gemini_response(json: &serde_json::Value) -> Result<String> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Gemini response: missing candidate parts"))?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    Ok(text)
}

// ============ OpenAI ============

/// OpenAI chat completions. Requires `OPENAI_API_KEY`.
pub struct OpenAICompletion {
    model: String,
    api_key: String,
    temperature: f32,
    timeout_secs: u64,
    max_retries: u32,
}

impl OpenAICompletion {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self {
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl CompletionModel for OpenAICompletion {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });
        let json = post_json(JsonPost {
            label: "OpenAI",
            url: "https://api.openai.com/v1/chat/completions",
            headers: &[("Authorization", format!("Bearer {}", self.api_key))],
            body: &body,
            timeout_secs: self.timeout_secs,
            max_retries: self.max_retries,
        })
        .await?;
        parse_openai_response(&json)
    }
}

fn parse_openai_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing message content"))
}

/// Create the completion model selected by `[llm] provider`.
///
/// Missing credentials are reported here, at startup, rather than on the
/// first question.
pub fn create_completion_model(config: &LlmConfig) -> Result<Box<dyn CompletionModel>> {
    match config.provider.as_str() {
        "gemini" => Ok(Box::new(GeminiCompletion::new(config)?)),
        "openai" => Ok(Box::new(OpenAICompletion::new(config)?)),
        "disabled" => Ok(Box::new(DisabledCompletion)),
        other => bail!("Unknown LLM provider: {}", other),
    }
}
