//! HTTP answer providers: Gemini, OpenAI-compatible chat completions, Anthropic messages.

use anyhow::{Context, Result, bail};
use billmail_core::{AnswerProvider, BillError, TaskSpec};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::LlmSection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    OpenAI,
    Anthropic,
}

impl Provider {
    pub fn parse(raw: &str) -> Option<Provider> {
        match raw.trim().to_lowercase().as_str() {
            "gemini" | "google" => Some(Provider::Gemini),
            "openai" => Some(Provider::OpenAI),
            "anthropic" | "claude" => Some(Provider::Anthropic),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::OpenAI => "openai",
            Provider::Anthropic => "anthropic",
        }
    }

    pub fn api_key_var(&self) -> &'static str {
        match self {
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Gemini => "https://generativelanguage.googleapis.com",
            Provider::OpenAI => "https://api.openai.com",
            Provider::Anthropic => "https://api.anthropic.com",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: Provider,
    pub model: String,
    pub base_url: String,
    pub api_key: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl LlmConfig {
    /// Resolve the `[llm]` section plus the provider's API key from `env`.
    pub fn resolve(
        section: &LlmSection,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<LlmConfig, BillError> {
        let provider = Provider::parse(&section.provider).ok_or_else(|| {
            BillError::Configuration(format!("unknown llm provider `{}`", section.provider))
        })?;
        let api_key = env(provider.api_key_var())
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| BillError::Configuration(format!("{} is not set", provider.api_key_var())))?;
        if section.model.trim().is_empty() {
            return Err(BillError::Configuration("llm model is empty".to_string()));
        }

        let base_url = section
            .base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(provider.default_base_url())
            .trim_end_matches('/')
            .to_string();

        Ok(LlmConfig {
            provider,
            model: section.model.trim().to_string(),
            base_url,
            api_key,
            temperature: section.temperature,
            max_tokens: section.max_tokens,
            timeout: Duration::from_secs(section.request_timeout_secs.max(1)),
        })
    }
}

/// A model reached over HTTP
pub struct HttpProvider {
    config: LlmConfig,
    client: reqwest::Client,
}

impl HttpProvider {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("build http client")?;
        Ok(Self { config, client })
    }
}

impl AnswerProvider for HttpProvider {
    fn generate(&self, task: &TaskSpec, subject: &str, body: &str) -> Result<String> {
        let user = task.user_prompt(subject, body);
        debug!(provider = self.config.provider.name(), model = %self.config.model, prompt_chars = user.len(), "calling model");
        chat_complete(&self.client, &self.config, task.system_prompt(), &user)
    }

    fn name(&self) -> &str {
        self.config.provider.name()
    }
}

pub fn chat_complete(client: &reqwest::Client, config: &LlmConfig, system: &str, user: &str) -> Result<String> {
    // main runs under #[tokio::main]; a nested block_on would panic.
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        tokio::task::block_in_place(|| handle.block_on(chat_complete_async(client, config, system, user)))
    } else {
        let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
        rt.block_on(chat_complete_async(client, config, system, user))
    }
}

async fn chat_complete_async(client: &reqwest::Client, config: &LlmConfig, system: &str, user: &str) -> Result<String> {
    match config.provider {
        Provider::Gemini => gemini_complete(client, config, system, user).await,
        Provider::OpenAI => openai_complete(client, config, system, user).await,
        Provider::Anthropic => anthropic_complete(client, config, system, user).await,
    }
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiReq {
    system_instruction: GeminiContent,
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Deserialize)]
struct GeminiResp {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContentOut>,
}

#[derive(Deserialize)]
struct GeminiContentOut {
    #[serde(default)]
    parts: Vec<GeminiPartOut>,
}

#[derive(Deserialize)]
struct GeminiPartOut {
    text: Option<String>,
}

fn gemini_request(config: &LlmConfig, system: &str, user: &str) -> GeminiReq {
    GeminiReq {
        system_instruction: GeminiContent {
            role: None,
            parts: vec![Part {
                text: system.to_string(),
            }],
        },
        contents: vec![GeminiContent {
            role: Some("user".to_string()),
            parts: vec![Part {
                text: user.to_string(),
            }],
        }],
        generation_config: GeminiGenerationConfig {
            temperature: config.temperature,
            max_output_tokens: config.max_tokens,
        },
    }
}

fn gemini_text(resp: GeminiResp) -> Result<String> {
    let Some(content) = resp.candidates.into_iter().next().and_then(|c| c.content) else {
        bail!("gemini returned no candidates");
    };
    let s: String = content.parts.into_iter().filter_map(|p| p.text).collect();
    Ok(s.trim().to_string())
}

async fn gemini_complete(client: &reqwest::Client, config: &LlmConfig, system: &str, user: &str) -> Result<String> {
    let url = format!("{}/v1beta/models/{}:generateContent", config.base_url, config.model);
    let resp = client
        .post(url)
        .header("x-goog-api-key", &config.api_key)
        .header(CONTENT_TYPE, "application/json")
        .json(&gemini_request(config, system, user))
        .send()
        .await
        .context("gemini request")?;

    let status = resp.status();
    if !status.is_success() {
        let txt = resp.text().await.unwrap_or_default();
        bail!("gemini error: {status} {txt}");
    }

    let out: GeminiResp = resp.json().await.context("parse gemini response")?;
    gemini_text(out)
}

#[derive(Serialize)]
struct Msg {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OpenAiReq {
    model: String,
    messages: Vec<Msg>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAiResp {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MsgOut,
}

#[derive(Deserialize)]
struct MsgOut {
    content: Option<String>,
}

fn openai_text(resp: OpenAiResp) -> String {
    resp.choices
        .first()
        .and_then(|c| c.message.content.clone())
        .unwrap_or_default()
        .trim()
        .to_string()
}

async fn openai_complete(client: &reqwest::Client, config: &LlmConfig, system: &str, user: &str) -> Result<String> {
    let body = OpenAiReq {
        model: config.model.clone(),
        messages: vec![
            Msg {
                role: "system".to_string(),
                content: system.to_string(),
            },
            Msg {
                role: "user".to_string(),
                content: user.to_string(),
            },
        ],
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    };

    let resp = client
        .post(format!("{}/v1/chat/completions", config.base_url))
        .header(AUTHORIZATION, format!("Bearer {}", config.api_key))
        .json(&body)
        .send()
        .await
        .context("openai request")?;

    let status = resp.status();
    if !status.is_success() {
        let txt = resp.text().await.unwrap_or_default();
        bail!("openai error: {status} {txt}");
    }

    let out: OpenAiResp = resp.json().await.context("parse openai response")?;
    Ok(openai_text(out))
}

#[derive(Serialize)]
struct AnthropicReq {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<Msg>,
}

#[derive(Deserialize)]
struct AnthropicResp {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    t: String,
    text: Option<String>,
}

fn anthropic_text(resp: AnthropicResp) -> String {
    let mut s = String::new();
    for b in resp.content {
        if b.t == "text" {
            if let Some(t) = b.text {
                s.push_str(&t);
            }
        }
    }
    s.trim().to_string()
}

async fn anthropic_complete(client: &reqwest::Client, config: &LlmConfig, system: &str, user: &str) -> Result<String> {
    let body = AnthropicReq {
        model: config.model.clone(),
        max_tokens: config.max_tokens,
        temperature: config.temperature,
        system: system.to_string(),
        messages: vec![Msg {
            role: "user".to_string(),
            content: user.to_string(),
        }],
    };

    let mut headers = HeaderMap::new();
    headers.insert("x-api-key", HeaderValue::from_str(&config.api_key)?);
    headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let resp = client
        .post(format!("{}/v1/messages", config.base_url))
        .headers(headers)
        .json(&body)
        .send()
        .await
        .context("anthropic request")?;

    let status = resp.status();
    if !status.is_success() {
        let txt = resp.text().await.unwrap_or_default();
        bail!("anthropic error: {status} {txt}");
    }

    let out: AnthropicResp = resp.json().await.context("parse anthropic response")?;
    Ok(anthropic_text(out))
}
