//! Runtime settings
//!
//! Every setting is a CLI flag backed by an environment variable, and a `.env`
//! file in the working directory is loaded before arguments are parsed.

use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::CukeprobeError;
use crate::types::ViewportSize;
use crate::webdriver::BrowserType;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-sonnet-20240229";
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-02-01";

/// LLM provider used for the AI fallback
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum AiProvider {
    /// OpenAI chat completions
    Openai,
    /// Azure OpenAI deployment
    #[value(alias = "azure_openai")]
    AzureOpenai,
    /// Anthropic Messages API
    Anthropic,
}

/// Console log level
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    #[value(alias = "warn")]
    Warning,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// AI provider credentials and models
#[derive(Args, Debug, Clone)]
pub struct AiSettings {
    /// AI provider to use
    #[arg(long, env = "AI_PROVIDER", default_value = "openai", ignore_case = true)]
    pub ai_provider: AiProvider,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_OPENAI_MODEL)]
    pub openai_model: String,

    /// Override the OpenAI API base URL (e.g. a compatible gateway)
    #[arg(long, env = "OPENAI_BASE_URL")]
    pub openai_base_url: Option<String>,

    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_api_key: Option<String>,

    #[arg(long, env = "ANTHROPIC_MODEL", default_value = DEFAULT_ANTHROPIC_MODEL)]
    pub anthropic_model: String,

    #[arg(long, env = "ANTHROPIC_BASE_URL")]
    pub anthropic_base_url: Option<String>,

    #[arg(long, env = "AZURE_OPENAI_ENDPOINT")]
    pub azure_openai_endpoint: Option<String>,

    #[arg(long, env = "AZURE_OPENAI_API_KEY", hide_env_values = true)]
    pub azure_openai_api_key: Option<String>,

    #[arg(long, env = "AZURE_OPENAI_DEPLOYMENT")]
    pub azure_openai_deployment: Option<String>,

    #[arg(long, env = "AZURE_OPENAI_API_VERSION", default_value = DEFAULT_AZURE_API_VERSION)]
    pub azure_openai_api_version: String,
}

fn missing(what: &str, var: &str) -> CukeprobeError {
    CukeprobeError::InvalidInput(format!(
        "{what} not configured. Set {var} environment variable."
    ))
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

impl AiSettings {
    /// Check the selected provider has everything it needs
    pub fn validate(&self) -> Result<(), CukeprobeError> {
        match self.ai_provider {
            AiProvider::Openai => {
                if !present(&self.openai_api_key) {
                    return Err(missing("OpenAI API key", "OPENAI_API_KEY"));
                }
            }
            AiProvider::AzureOpenai => {
                if !present(&self.azure_openai_api_key) {
                    return Err(missing("Azure OpenAI API key", "AZURE_OPENAI_API_KEY"));
                }
                if !present(&self.azure_openai_endpoint) {
                    return Err(missing("Azure OpenAI endpoint", "AZURE_OPENAI_ENDPOINT"));
                }
                if !present(&self.azure_openai_deployment) {
                    return Err(missing(
                        "Azure OpenAI deployment",
                        "AZURE_OPENAI_DEPLOYMENT",
                    ));
                }
            }
            AiProvider::Anthropic => {
                if !present(&self.anthropic_api_key) {
                    return Err(missing("Anthropic API key", "ANTHROPIC_API_KEY"));
                }
            }
        }
        Ok(())
    }
}

/// Browser session settings
#[derive(Args, Debug, Clone)]
pub struct BrowserSettings {
    /// Browser to use
    #[arg(short, long, env = "BROWSER_TYPE", default_value = "chromium", ignore_case = true)]
    pub browser: BrowserType,

    /// Run without a visible window
    #[arg(long, env = "HEADLESS", default_value_t = true, action = clap::ArgAction::Set)]
    pub headless: bool,

    /// Run browser in visible mode (overrides --headless)
    #[arg(long = "no-headless")]
    pub no_headless: bool,

    /// Default timeout for page loads and element waits, in milliseconds
    #[arg(long, env = "TIMEOUT", default_value_t = 30_000)]
    pub timeout: u64,

    /// Viewport size (WIDTHxHEIGHT, e.g., 1920x1080)
    #[arg(long, env = "VIEWPORT")]
    pub viewport: Option<String>,
}

impl BrowserSettings {
    pub fn is_headless(&self) -> bool {
        self.headless && !self.no_headless
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    pub fn viewport(&self) -> Result<ViewportSize, CukeprobeError> {
        match &self.viewport {
            Some(v) => ViewportSize::parse(v)
                .map_err(|e| CukeprobeError::InvalidInput(e.to_string())),
            None => Ok(ViewportSize::default()),
        }
    }
}

/// Selector cache location
#[derive(Args, Debug, Clone)]
pub struct CacheSettings {
    /// Path of the element selector cache
    #[arg(long, env = "CACHE_FILE", default_value = "element_cache.json")]
    pub cache_file: PathBuf,
}

/// Load `.env` from the working directory if there is one
pub fn load_dotenv() {
    // Missing .env is normal; real environment variables win over the file
    let _ = dotenvy::dotenv();
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
