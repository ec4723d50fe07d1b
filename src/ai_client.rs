//! LLM-backed element detection
//!
//! Sends a cleaned page snapshot and an element description to a chat model
//! and asks for ranked selectors. Three providers are supported:
//!
//! - OpenAI chat completions (`Authorization: Bearer`)
//! - Azure OpenAI deployments (`api-key` header, `api-version` query)
//! - Anthropic Messages API (`x-api-key` + `anthropic-version`, top-level `system`)

use anyhow::{Context, Result};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::{AiProvider, AiSettings};
use crate::errors::AiError;
use crate::types::Selector;
use crate::xpath;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

const TEMPERATURE: f64 = 0.1;
const MAX_TOKENS: u32 = 1000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Page snapshots are cut to this many characters before prompting
pub const MAX_HTML_CHARS: usize = 8000;

const FALLBACK_CONFIDENCE: f64 = 0.5;

pub const SYSTEM_PROMPT: &str = r#"You are an expert at analyzing HTML DOM and finding element selectors.
Given HTML content and an element description, find the best XPath or CSS selector for that element.

Rules:
1. Prefer XPath selectors over CSS selectors
2. Use text-based selectors when possible (e.g., //button[text()='Submit'])
3. Avoid fragile selectors like absolute paths or index-based selectors
4. Return multiple selector options ranked by reliability
5. Include confidence score (0-1) for each selector

Return JSON format:
{
    "selectors": [
        {
            "selector": "//button[text()='Submit']",
            "type": "xpath",
            "confidence": 0.9,
            "reasoning": "Direct text match for button"
        }
    ],
    "best_selector": "//button[text()='Submit']",
    "success": true,
    "error": null
}"#;

/// A chat model that turns a system + user prompt into text
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn complete(&self, system: &str, user: &str) -> Result<String, AiError>;
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")
}

fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Send a request and decode the JSON body, mapping transport and HTTP failures
async fn send_json(provider: &'static str, request: reqwest::RequestBuilder) -> Result<Value, AiError> {
    let response = request
        .send()
        .await
        .map_err(|source| AiError::Request { provider, source })?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|source| AiError::Request { provider, source })?;

    if !status.is_success() {
        return Err(AiError::Status {
            provider,
            status: status.as_u16(),
            body: body.chars().take(500).collect(),
        });
    }

    serde_json::from_str(&body)
        .map_err(|e| AiError::Parse(format!("{provider} response is not JSON: {e}")))
}

/// `choices[0].message.content` of a chat completion
fn chat_completion_text(body: &Value) -> Option<String> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn chat_messages(system: &str, user: &str) -> Value {
    json!([
        { "role": "system", "content": system },
        { "role": "user", "content": user },
    ])
}

pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, base_url: Option<&str>) -> Result<Self> {
        Ok(OpenAiProvider {
            client: http_client()?,
            base_url: trim_base(base_url.unwrap_or(OPENAI_BASE_URL)),
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "OpenAI"
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, AiError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": chat_messages(system, user),
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
        });
        debug!("POST {} (model {})", url, self.model);

        let request = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body);
        let response = send_json(self.name(), request).await?;
        chat_completion_text(&response).ok_or(AiError::EmptyResponse {
            provider: self.name(),
        })
    }
}

pub struct AzureOpenAiProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    deployment: String,
    api_version: String,
}

impl AzureOpenAiProvider {
    pub fn new(
        endpoint: &str,
        api_key: impl Into<String>,
        deployment: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Result<Self> {
        Ok(AzureOpenAiProvider {
            client: http_client()?,
            endpoint: trim_base(endpoint),
            api_key: api_key.into(),
            deployment: deployment.into(),
            api_version: api_version.into(),
        })
    }
}

#[async_trait]
impl CompletionProvider for AzureOpenAiProvider {
    fn name(&self) -> &'static str {
        "Azure OpenAI"
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, AiError> {
        let url = format!(
            "{}/openai/deployments/{}/chat/completions",
            self.endpoint, self.deployment
        );
        let body = json!({
            "messages": chat_messages(system, user),
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
        });
        debug!("POST {} (api-version {})", url, self.api_version);

        let request = self
            .client
            .post(&url)
            .query(&[("api-version", self.api_version.as_str())])
            .header("api-key", &self.api_key)
            .json(&body);
        let response = send_json(self.name(), request).await?;
        chat_completion_text(&response).ok_or(AiError::EmptyResponse {
            provider: self.name(),
        })
    }
}

pub struct AnthropicProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, base_url: Option<&str>) -> Result<Self> {
        Ok(AnthropicProvider {
            client: http_client()?,
            base_url: trim_base(base_url.unwrap_or(ANTHROPIC_BASE_URL)),
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "Anthropic"
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, AiError> {
        let url = format!("{}/messages", self.base_url);
        let body = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "temperature": TEMPERATURE,
            "system": system,
            "messages": [{ "role": "user", "content": user }],
        });
        debug!("POST {} (model {})", url, self.model);

        let request = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        let response = send_json(self.name(), request).await?;

        let text: String = response["content"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|b| b["type"] == "text")
                    .filter_map(|b| b["text"].as_str())
                    .collect()
            })
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(AiError::EmptyResponse {
                provider: self.name(),
            });
        }
        Ok(text)
    }
}

/// One selector suggested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorCandidate {
    pub selector: String,
    #[serde(rename = "type", default)]
    pub selector_type: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl SelectorCandidate {
    pub fn to_selector(&self) -> Selector {
        let raw = self.selector.trim();
        match self.selector_type.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("xpath") => Selector::xpath(raw.strip_prefix("xpath=").unwrap_or(raw)),
            Some("css") => Selector::css(raw.strip_prefix("css=").unwrap_or(raw)),
            _ => Selector::parse(raw),
        }
    }
}

/// Model answer for one element lookup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectorAnalysis {
    #[serde(default)]
    pub selectors: Vec<SelectorCandidate>,
    #[serde(default)]
    pub best_selector: Option<String>,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl SelectorAnalysis {
    pub fn failed(error: impl Into<String>) -> Self {
        SelectorAnalysis {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Selectors in the order they should be tried.
    ///
    /// `best_selector` first, then the remaining candidates by descending
    /// confidence. Blank and duplicate expressions are dropped.
    pub fn ranked(&self) -> Vec<Selector> {
        let mut candidates: Vec<&SelectorCandidate> = self.selectors.iter().collect();
        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let best = self
            .best_selector
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|best| {
                // Reuse the candidate's declared type when the best selector is one of them
                self.selectors
                    .iter()
                    .find(|c| c.selector.trim() == best.trim())
                    .map(SelectorCandidate::to_selector)
                    .unwrap_or_else(|| Selector::parse(best))
            });

        let mut ranked: Vec<Selector> = Vec::new();
        for selector in best
            .into_iter()
            .chain(candidates.into_iter().map(SelectorCandidate::to_selector))
        {
            if !selector.expression.is_empty() && !ranked.contains(&selector) {
                ranked.push(selector);
            }
        }
        ranked
    }
}

lazy_static! {
    static ref SCRIPT_TAG: Regex = Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("valid regex");
    static ref STYLE_TAG: Regex = Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").expect("valid regex");
    static ref HTML_COMMENT: Regex = Regex::new(r"(?s)<!--.*?-->").expect("valid regex");
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s{2,}").expect("valid regex");
    static ref JSON_FENCE: Regex = Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("valid regex");
}

/// Strip scripts, styles and comments, collapse whitespace and cap the size
pub fn clean_html(html: &str) -> String {
    let html = SCRIPT_TAG.replace_all(html, "");
    let html = STYLE_TAG.replace_all(&html, "");
    let html = HTML_COMMENT.replace_all(&html, "");
    let html = WHITESPACE_RUN.replace_all(html.trim(), " ");

    match html.char_indices().nth(MAX_HTML_CHARS) {
        Some((cut, _)) => html[..cut].to_string(),
        None => html.into_owned(),
    }
}

pub fn build_user_prompt(html: &str, description: &str, url: &str) -> String {
    format!(
        "HTML Content:\n{html}\n\nElement to find: \"{description}\"\nURL: {url}\n\n\
         Find the best selector for this element. Focus on the most reliable approach.\n"
    )
}

/// Decode the model's JSON reply, tolerating code fences and surrounding prose
pub fn parse_analysis(text: &str) -> Result<SelectorAnalysis, AiError> {
    let text = text.trim();
    let body = JSON_FENCE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text);

    let json = match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if end > start => &body[start..=end],
        _ => return Err(AiError::Parse("no JSON object in response".to_string())),
    };

    serde_json::from_str(json).map_err(|e| AiError::Parse(format!("JSON parse error: {e}")))
}

/// Asks the configured model for selectors, with pattern fallbacks
pub struct ElementDetector {
    provider: Box<dyn CompletionProvider>,
}

impl ElementDetector {
    pub fn new(provider: Box<dyn CompletionProvider>) -> Self {
        ElementDetector { provider }
    }

    /// Build the provider selected in `settings`
    pub fn from_settings(settings: &AiSettings) -> Result<Self> {
        settings.validate()?;

        // validate() guarantees the required fields are set
        let required = |value: &Option<String>| value.clone().unwrap_or_default();

        let provider: Box<dyn CompletionProvider> = match settings.ai_provider {
            AiProvider::Openai => Box::new(OpenAiProvider::new(
                required(&settings.openai_api_key),
                &settings.openai_model,
                settings.openai_base_url.as_deref(),
            )?),
            AiProvider::AzureOpenai => Box::new(AzureOpenAiProvider::new(
                &required(&settings.azure_openai_endpoint),
                required(&settings.azure_openai_api_key),
                required(&settings.azure_openai_deployment),
                &settings.azure_openai_api_version,
            )?),
            AiProvider::Anthropic => Box::new(AnthropicProvider::new(
                required(&settings.anthropic_api_key),
                &settings.anthropic_model,
                settings.anthropic_base_url.as_deref(),
            )?),
        };
        info!("AI provider: {}", provider.name());
        Ok(ElementDetector::new(provider))
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Ask the model for selectors. Never fails: provider and parse errors
    /// are logged and recorded in `error`, and pattern-based fallbacks are
    /// appended whenever no usable best selector came back.
    pub async fn find_selector(&self, html: &str, description: &str, url: &str) -> SelectorAnalysis {
        info!("Analyzing element: {}", description);
        let user_prompt = build_user_prompt(&clean_html(html), description, url);

        let mut analysis = match self.provider.complete(SYSTEM_PROMPT, &user_prompt).await {
            Ok(text) => match parse_analysis(&text) {
                Ok(analysis) => {
                    info!("{} analysis completed for: {}", self.provider.name(), description);
                    analysis
                }
                Err(e) => {
                    error!("Failed to parse {} response: {}", self.provider.name(), e);
                    SelectorAnalysis::failed(e.to_string())
                }
            },
            Err(e) => {
                error!("{} API error: {}", self.provider.name(), e);
                SelectorAnalysis::failed(e.to_string())
            }
        };

        let has_best = analysis
            .best_selector
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty());
        if !analysis.success || !has_best {
            add_fallback_selectors(&mut analysis, description);
        }
        analysis
    }
}

fn add_fallback_selectors(analysis: &mut SelectorAnalysis, description: &str) {
    let fallbacks: Vec<SelectorCandidate> = xpath::candidates(description)
        .into_iter()
        .map(|selector| SelectorCandidate {
            selector: selector.expression,
            selector_type: Some(selector.kind.to_string()),
            confidence: FALLBACK_CONFIDENCE,
            reasoning: Some("Fallback pattern-based selector".to_string()),
        })
        .collect();

    if fallbacks.is_empty() {
        warn!("No fallback selectors for: {}", description);
        return;
    }
    debug!("Adding {} fallback selectors for: {}", fallbacks.len(), description);

    let has_best = analysis
        .best_selector
        .as_deref()
        .is_some_and(|s| !s.trim().is_empty());
    if !has_best {
        analysis.best_selector = Some(fallbacks[0].selector.clone());
        analysis.success = true;
    }
    analysis.selectors.extend(fallbacks);
}

#[cfg(test)]
#[path = "ai_client_test.rs"]
mod ai_client_test;
