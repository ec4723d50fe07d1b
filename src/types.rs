use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Output format for CLI results
#[derive(Clone, Copy, Debug, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON format for programmatic consumption
    Json,
    /// Human-readable simple format
    Simple,
}

/// Browser viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportSize {
    /// Viewport width in pixels
    pub width: u32,
    /// Viewport height in pixels
    pub height: u32,
}

impl Default for ViewportSize {
    fn default() -> Self {
        ViewportSize {
            width: 1920,
            height: 1080,
        }
    }
}

impl ViewportSize {
    /// Parse `WIDTHxHEIGHT`, e.g. `1280x720` (`X` also accepted)
    pub fn parse(s: &str) -> Result<Self> {
        let dimension = |part: &str, name: &str| -> Result<u32> {
            match part.trim().parse::<u32>() {
                Ok(0) => bail!("Viewport {name} must be positive: '{s}'"),
                Ok(n) => Ok(n),
                Err(_) => bail!("Viewport {name} is not a number: '{s}'"),
            }
        };

        match s.trim().split_once(['x', 'X']) {
            Some((w, h)) => Ok(ViewportSize {
                width: dimension(w, "width")?,
                height: dimension(h, "height")?,
            }),
            None => bail!("Viewport '{s}' is not WIDTHxHEIGHT (e.g. 1920x1080)"),
        }
    }
}

/// Selector language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    #[serde(alias = "XPath", alias = "XPATH")]
    Xpath,
    #[serde(alias = "CSS")]
    Css,
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorKind::Xpath => write!(f, "xpath"),
            SelectorKind::Css => write!(f, "css"),
        }
    }
}

/// A CSS or XPath expression identifying DOM elements
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selector {
    pub kind: SelectorKind,
    pub expression: String,
}

impl Selector {
    pub fn xpath(expression: impl Into<String>) -> Self {
        Selector {
            kind: SelectorKind::Xpath,
            expression: expression.into(),
        }
    }

    pub fn css(expression: impl Into<String>) -> Self {
        Selector {
            kind: SelectorKind::Css,
            expression: expression.into(),
        }
    }

    /// Classify a raw selector string as produced by an LLM or stored in the cache.
    ///
    /// `xpath=` and `css=` prefixes are honoured and stripped. Expressions
    /// starting with `/`, `./` or `(` are XPath, everything else is CSS.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(rest) = raw.strip_prefix("xpath=") {
            return Selector::xpath(rest.trim());
        }
        if let Some(rest) = raw.strip_prefix("css=") {
            return Selector::css(rest.trim());
        }
        if raw.starts_with('/') || raw.starts_with("./") || raw.starts_with('(') {
            Selector::xpath(raw)
        } else {
            Selector::css(raw)
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.kind, self.expression)
    }
}

/// Which resolution strategy produced a selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionSource {
    Cache,
    Heuristic,
    Ai,
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionSource::Cache => write!(f, "cache"),
            ResolutionSource::Heuristic => write!(f, "heuristic"),
            ResolutionSource::Ai => write!(f, "ai"),
        }
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
