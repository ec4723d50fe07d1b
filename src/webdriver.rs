use anyhow::{Context, Result};
use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::wd::TimeoutConfiguration;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use std::fmt;
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::page::PageDriver;
use crate::types::{Selector, SelectorKind, ViewportSize};
use crate::webdriver_manager::GLOBAL_DRIVER_MANAGER;

/// Supported browser types
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BrowserType {
    /// Mozilla Firefox
    Firefox,
    /// Google Chrome/Chromium
    #[value(alias = "chromium")]
    Chrome,
    /// Apple Safari (macOS only, never headless)
    #[value(alias = "webkit")]
    Safari,
}

impl BrowserType {
    pub fn driver_name(&self) -> &'static str {
        match self {
            BrowserType::Firefox => "geckodriver",
            BrowserType::Chrome => "chromedriver",
            BrowserType::Safari => "safaridriver",
        }
    }

    /// Port the driver listens on when started by hand with default flags
    pub fn default_port(&self) -> u16 {
        match self {
            BrowserType::Firefox => 4444,
            BrowserType::Chrome => 9515,
            BrowserType::Safari => 4455,
        }
    }

    /// W3C capabilities for a new session
    pub fn capabilities(
        &self,
        headless: bool,
        viewport: ViewportSize,
        profile_dir: Option<&std::path::Path>,
    ) -> serde_json::Map<String, serde_json::Value> {
        let mut caps = serde_json::Map::new();
        match self {
            BrowserType::Firefox => {
                let mut args = vec![
                    format!("--width={}", viewport.width),
                    format!("--height={}", viewport.height),
                ];
                if headless {
                    args.push("--headless".to_string());
                }
                caps.insert("browserName".to_string(), json!("firefox"));
                caps.insert("moz:firefoxOptions".to_string(), json!({ "args": args }));
            }
            BrowserType::Chrome => {
                let mut args = vec![
                    "--no-sandbox".to_string(),
                    format!("--window-size={},{}", viewport.width, viewport.height),
                ];
                if headless {
                    args.push("--headless=new".to_string());
                    args.push("--disable-gpu".to_string());
                    args.push("--disable-dev-shm-usage".to_string());
                }
                if let Some(dir) = profile_dir {
                    args.push(format!("--user-data-dir={}", dir.display()));
                }
                caps.insert("browserName".to_string(), json!("chrome"));
                caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
            }
            BrowserType::Safari => {
                caps.insert("browserName".to_string(), json!("safari"));
            }
        }
        caps
    }
}

impl fmt::Display for BrowserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrowserType::Firefox => write!(f, "firefox"),
            BrowserType::Chrome => write!(f, "chrome"),
            BrowserType::Safari => write!(f, "safari"),
        }
    }
}

fn locator(selector: &Selector) -> Locator<'_> {
    match selector.kind {
        SelectorKind::Xpath => Locator::XPath(&selector.expression),
        SelectorKind::Css => Locator::Css(&selector.expression),
    }
}

const HOVER_SCRIPT: &str = r#"
    const el = arguments[0];
    for (const type of ['mouseover', 'mouseenter', 'mousemove']) {
        el.dispatchEvent(new MouseEvent(type, { bubbles: true, cancelable: true, view: window }));
    }
"#;

const SCROLL_SCRIPT: &str = "arguments[0].scrollIntoView({ block: 'center', inline: 'nearest' });";

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Run `check` until it reports true or `timeout` elapses; it always runs at least once
async fn poll_until<F, Fut>(timeout: Duration, interval: Duration, mut check: F) -> Result<bool>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await? {
            return Ok(true);
        }
        if tokio::time::Instant::now() >= deadline {
            return Ok(false);
        }
        tokio::time::sleep(interval).await;
    }
}

/// A WebDriver browser session
pub struct Browser {
    client: Client,
    browser_type: BrowserType,
    // Chrome profile directory, removed when the session is dropped
    _profile_dir: Option<TempDir>,
}

impl Browser {
    /// Start a session, auto-starting the WebDriver binary when none is running
    pub async fn new(
        browser_type: BrowserType,
        viewport: ViewportSize,
        headless: bool,
        timeout: Duration,
    ) -> Result<Self> {
        info!("Connecting to {} WebDriver", browser_type);
        let webdriver_url = GLOBAL_DRIVER_MANAGER.ensure_driver(&browser_type).await?;

        if browser_type == BrowserType::Safari && headless {
            warn!("Safari has no headless mode, running with a visible window");
        }

        // Chrome refuses to share a profile directory between sessions
        let profile_dir = match browser_type {
            BrowserType::Chrome => Some(
                tempfile::Builder::new()
                    .prefix("cukeprobe-chrome-")
                    .tempdir()?,
            ),
            _ => None,
        };

        let caps = browser_type.capabilities(
            headless,
            viewport,
            profile_dir.as_ref().map(TempDir::path),
        );
        debug!("Connecting to WebDriver at {}", webdriver_url);

        let client = ClientBuilder::rustls()
            .capabilities(caps)
            .connect(&webdriver_url)
            .await
            .with_context(|| {
                format!(
                    "Failed to connect to WebDriver at {webdriver_url}. Is {} working?",
                    browser_type.driver_name()
                )
            })?;

        if let Err(e) = client.set_window_size(viewport.width, viewport.height).await {
            debug!("Could not set window size: {}", e);
        }

        let timeouts = TimeoutConfiguration::new(Some(timeout), Some(timeout), Some(Duration::ZERO));
        if let Err(e) = client.update_timeouts(timeouts).await {
            debug!("Could not set session timeouts: {}", e);
        }

        Ok(Browser {
            client,
            browser_type,
            _profile_dir: profile_dir,
        })
    }

    pub fn browser_type(&self) -> BrowserType {
        self.browser_type
    }

    async fn find(&self, selector: &Selector) -> Result<Element> {
        self.client
            .find(locator(selector))
            .await
            .with_context(|| format!("Element not found: {selector}"))
    }

    async fn run_on(&self, element: &Element, script: &str) -> Result<()> {
        let arg = serde_json::to_value(element).context("Failed to serialize element")?;
        self.client
            .execute(script, vec![arg])
            .await
            .context("Failed to execute script")?;
        Ok(())
    }

    /// Wait until `document.readyState` is `complete`, at most 2 seconds
    async fn wait_for_ready_state(&self) {
        for _ in 0..20 {
            match self
                .client
                .execute("return document.readyState === 'complete';", vec![])
                .await
            {
                Ok(ready) if ready.as_bool().unwrap_or(false) => return,
                _ => tokio::time::sleep(Duration::from_millis(100)).await,
            }
        }
        debug!("Page did not report readyState=complete");
    }
}

#[async_trait]
impl PageDriver for Browser {
    async fn navigate(&self, url: &str) -> Result<()> {
        info!("Navigating to {}", url);
        self.client
            .goto(url)
            .await
            .with_context(|| format!("Failed to navigate to {url}"))?;
        self.wait_for_ready_state().await;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.client.current_url().await?.to_string())
    }

    async fn page_source(&self) -> Result<String> {
        self.client.source().await.context("Failed to read page source")
    }

    async fn count(&self, selector: &Selector) -> Result<usize> {
        let elements = self
            .client
            .find_all(locator(selector))
            .await
            .with_context(|| format!("Invalid selector: {selector}"))?;
        Ok(elements.len())
    }

    async fn click(&self, selector: &Selector) -> Result<()> {
        self.find(selector).await?.click().await?;
        Ok(())
    }

    async fn fill(&self, selector: &Selector, text: &str) -> Result<()> {
        let element = self.find(selector).await?;
        element.clear().await?;
        element.send_keys(text).await?;
        Ok(())
    }

    async fn clear(&self, selector: &Selector) -> Result<()> {
        self.find(selector).await?.clear().await?;
        Ok(())
    }

    async fn select_option(&self, selector: &Selector, label: &str) -> Result<()> {
        self.find(selector)
            .await?
            .select_by_label(label)
            .await
            .with_context(|| format!("No option labelled '{label}' in {selector}"))?;
        Ok(())
    }

    async fn set_checked(&self, selector: &Selector, checked: bool) -> Result<()> {
        let element = self.find(selector).await?;
        if element.is_selected().await? != checked {
            element.click().await?;
        }
        Ok(())
    }

    async fn hover(&self, selector: &Selector) -> Result<()> {
        let element = self.find(selector).await?;
        self.run_on(&element, SCROLL_SCRIPT).await?;
        self.run_on(&element, HOVER_SCRIPT).await
    }

    async fn scroll_into_view(&self, selector: &Selector) -> Result<()> {
        let element = self.find(selector).await?;
        self.run_on(&element, SCROLL_SCRIPT).await
    }

    async fn wait_for(&self, selector: &Selector, timeout: Duration) -> Result<()> {
        let visible = poll_until(timeout, WAIT_POLL_INTERVAL, || async move {
            let elements = self
                .client
                .find_all(locator(selector))
                .await
                .with_context(|| format!("Invalid selector: {selector}"))?;
            for element in elements {
                if element.is_displayed().await.unwrap_or(false) {
                    return Ok(true);
                }
            }
            Ok::<_, anyhow::Error>(false)
        })
        .await?;

        if !visible {
            anyhow::bail!("Timed out waiting for {selector} to become visible");
        }
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.client.screenshot().await.context("Failed to take screenshot")
    }

    async fn close(&self) -> Result<()> {
        self.client.clone().close().await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "webdriver_test.rs"]
mod webdriver_test;
