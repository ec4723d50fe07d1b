// In-memory page and provider doubles shared by unit tests

use anyhow::{Result, bail};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::ai_client::CompletionProvider;
use crate::errors::AiError;
use crate::page::PageDriver;
use crate::types::Selector;

/// Page whose DOM is a table of selector expression -> match count.
///
/// Every action is appended to `log` as `"<action> <expression>[ <arg>]"`.
/// Expressions starting with `!` are treated as malformed.
#[derive(Default)]
pub struct FakePage {
    pub url: Mutex<String>,
    pub source: String,
    pub elements: Mutex<HashMap<String, usize>>,
    pub log: Arc<Mutex<Vec<String>>>,
    pub counts: AtomicUsize,
    pub fail_screenshot: bool,
}

impl FakePage {
    pub fn at(url: &str) -> Self {
        FakePage {
            url: Mutex::new(url.to_string()),
            source: "<html><body><p>fake</p></body></html>".to_string(),
            ..Default::default()
        }
    }

    pub fn with(self, expression: &str) -> Self {
        self.elements
            .lock()
            .unwrap()
            .insert(expression.to_string(), 1);
        self
    }

    pub fn remove(&self, expression: &str) {
        self.elements.lock().unwrap().remove(expression);
    }

    pub fn actions(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }

    fn require(&self, selector: &Selector) -> Result<()> {
        if self.elements.lock().unwrap().get(&selector.expression).copied().unwrap_or(0) == 0 {
            bail!("no such element: {}", selector);
        }
        Ok(())
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.record(format!("navigate {url}"));
        *self.url.lock().unwrap() = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.url.lock().unwrap().clone())
    }

    async fn page_source(&self) -> Result<String> {
        Ok(self.source.clone())
    }

    async fn count(&self, selector: &Selector) -> Result<usize> {
        self.counts.fetch_add(1, Ordering::SeqCst);
        if selector.expression.starts_with('!') {
            bail!("invalid selector: {}", selector.expression);
        }
        Ok(self
            .elements
            .lock()
            .unwrap()
            .get(&selector.expression)
            .copied()
            .unwrap_or(0))
    }

    async fn click(&self, selector: &Selector) -> Result<()> {
        self.require(selector)?;
        self.record(format!("click {}", selector.expression));
        Ok(())
    }

    async fn fill(&self, selector: &Selector, text: &str) -> Result<()> {
        self.require(selector)?;
        self.record(format!("fill {} {}", selector.expression, text));
        Ok(())
    }

    async fn clear(&self, selector: &Selector) -> Result<()> {
        self.require(selector)?;
        self.record(format!("clear {}", selector.expression));
        Ok(())
    }

    async fn select_option(&self, selector: &Selector, label: &str) -> Result<()> {
        self.require(selector)?;
        self.record(format!("select {} {}", selector.expression, label));
        Ok(())
    }

    async fn set_checked(&self, selector: &Selector, checked: bool) -> Result<()> {
        self.require(selector)?;
        self.record(format!("set_checked {} {}", selector.expression, checked));
        Ok(())
    }

    async fn hover(&self, selector: &Selector) -> Result<()> {
        self.require(selector)?;
        self.record(format!("hover {}", selector.expression));
        Ok(())
    }

    async fn scroll_into_view(&self, selector: &Selector) -> Result<()> {
        self.require(selector)?;
        self.record(format!("scroll {}", selector.expression));
        Ok(())
    }

    async fn wait_for(&self, selector: &Selector, _timeout: Duration) -> Result<()> {
        self.require(selector)?;
        self.record(format!("wait_for {}", selector.expression));
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        if self.fail_screenshot {
            bail!("screenshot unavailable");
        }
        Ok(b"\x89PNG\r\n\x1a\nfake".to_vec())
    }

    async fn close(&self) -> Result<()> {
        self.record("close".to_string());
        Ok(())
    }
}

/// Provider that always returns the same reply and counts calls
pub struct StaticProvider {
    pub reply: String,
    pub calls: Arc<AtomicUsize>,
}

impl StaticProvider {
    pub fn new(reply: &str) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            StaticProvider {
                reply: reply.to_string(),
                calls: calls.clone(),
            },
            calls,
        )
    }
}

#[async_trait]
impl CompletionProvider for StaticProvider {
    fn name(&self) -> &'static str {
        "Static"
    }

    async fn complete(&self, _system: &str, _user: &str) -> Result<String, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}
