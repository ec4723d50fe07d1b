//! # cukeprobe
#![allow(clippy::uninlined_format_args)]
//!
//! Runs Cucumber feature files against a real browser without step definitions.
//!
//! Steps are written in plain language (`When I click the "Login" button`). Each
//! element description is turned into a selector by a fallback chain: a
//! persistent selector cache, heuristic XPath templates, and finally an LLM
//! that reads the page source. Successful lookups are cached so later runs
//! skip the expensive strategies.
//!
//! ## Installation
//!
//! ```bash
//! cargo install cukeprobe
//! ```
//!
//! A WebDriver binary must be on `PATH` (`geckodriver`, `chromedriver` or
//! `safaridriver`). It is started automatically when nothing answers on its
//! standard port.
//!
//! ## CLI Usage
//!
//! ```bash
//! # Run a feature with the default browser (Chromium, headless)
//! cukeprobe run features/login.feature
//!
//! # Firefox, visible window, only @smoke scenarios
//! cukeprobe run features/login.feature --browser firefox --no-headless --tags smoke
//!
//! # Relative navigation targets ("the login page") resolve against a base URL
//! cukeprobe run features/login.feature --base-url http://localhost:3000/
//!
//! # Keep going after a failed step and save screenshots of failed scenarios
//! cukeprobe run features/login.feature --continue-on-failure --screenshot-dir shots
//!
//! # Inspect what the parser extracted, no browser needed
//! cukeprobe parse features/login.feature
//!
//! # Resolve a single description on a page
//! cukeprobe resolve https://example.com/login "Email field"
//!
//! # Selector cache maintenance
//! cukeprobe cache stats
//! cukeprobe cache list
//! cukeprobe cache clear
//! ```
//!
//! ## Configuration
//!
//! Every flag has an environment variable, and a `.env` file in the working
//! directory is loaded first:
//!
//! ```bash
//! AI_PROVIDER=openai          # openai | azure_openai | anthropic
//! OPENAI_API_KEY=sk-...
//! OPENAI_MODEL=gpt-4
//! BROWSER_TYPE=chromium       # chromium | firefox | webkit
//! HEADLESS=true
//! TIMEOUT=30000
//! CACHE_FILE=element_cache.json
//! LOG_LEVEL=INFO
//! ```
//!
//! ## Exit Codes
//!
//! - `0`: all scenarios passed
//! - `1`: general error
//! - `2`: one or more scenarios failed
//! - `3`: invalid input (missing feature file, incomplete AI configuration)
//! - `4`: WebDriver connection failed
//! - `5`: operation timed out
//!
//! ## Library Usage
//!
//! ```rust,no_run
//! use cukeprobe::{
//!     Browser, BrowserType, ElementCache, ExecutorOptions, SelectorResolver, TestExecutor,
//!     ViewportSize, parse_feature_file,
//! };
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let feature = parse_feature_file("features/login.feature".as_ref())?;
//! let browser = Browser::new(
//!     BrowserType::Chrome,
//!     ViewportSize::default(),
//!     true, // Headless
//!     Duration::from_secs(30),
//! ).await?;
//!
//! // No AI detector: cache and heuristics only
//! let resolver = SelectorResolver::new(ElementCache::load("element_cache.json"), None);
//! let mut executor = TestExecutor::new(Box::new(browser), resolver, ExecutorOptions::default());
//!
//! let report = executor.run_feature(&feature).await;
//! report.log_summary();
//! # Ok(())
//! # }
//! ```

/// LLM providers and selector analysis
pub mod ai_client;

/// Persistent selector cache
pub mod cache;

/// Settings backed by CLI flags and environment variables
pub mod config;

pub mod errors;

/// Scenario execution and reporting
pub mod executor;

/// Gherkin parsing and step classification
pub mod feature;

pub mod logging;

/// Browser operations used by the resolver and executor
pub mod page;

/// Element resolution pipeline
pub mod resolver;

/// Shared types
pub mod types;

/// WebDriver browser control
pub mod webdriver;

/// Automatic WebDriver process management
pub mod webdriver_manager;

/// Heuristic XPath generation
pub mod xpath;

#[cfg(test)]
mod test_support;

pub use ai_client::{CompletionProvider, ElementDetector, SelectorAnalysis};
pub use cache::{CacheEntry, ElementCache};
pub use errors::{AiError, CukeprobeError};
pub use executor::{ExecutorOptions, RunReport, RunSummary, ScenarioResult, TestExecutor};
pub use feature::{Feature, Scenario, Step, StepAction, parse_feature, parse_feature_file};
pub use page::PageDriver;
pub use resolver::{Resolution, ResolverStats, SelectorResolver};
pub use types::{OutputFormat, ResolutionSource, Selector, SelectorKind, ViewportSize};
pub use webdriver::{Browser, BrowserType};
