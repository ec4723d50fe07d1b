use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use crate::types::Selector;

/// Browser page operations the resolver and executor need.
///
/// Implemented over WebDriver by [`crate::webdriver::Browser`]. Actions on a
/// selector act on its first match.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    /// Serialized DOM of the current page
    async fn page_source(&self) -> Result<String>;

    /// Number of elements matching the selector
    async fn count(&self, selector: &Selector) -> Result<usize>;

    async fn click(&self, selector: &Selector) -> Result<()>;

    /// Replace the element's value with `text`
    async fn fill(&self, selector: &Selector, text: &str) -> Result<()>;

    async fn clear(&self, selector: &Selector) -> Result<()>;

    /// Pick a `<select>` option by its visible label
    async fn select_option(&self, selector: &Selector, label: &str) -> Result<()>;

    /// Tick or untick a checkbox/radio, clicking only when the state differs
    async fn set_checked(&self, selector: &Selector, checked: bool) -> Result<()>;

    async fn hover(&self, selector: &Selector) -> Result<()>;

    async fn scroll_into_view(&self, selector: &Selector) -> Result<()>;

    /// Wait until any element matching the selector is displayed
    async fn wait_for(&self, selector: &Selector, timeout: Duration) -> Result<()>;

    /// PNG screenshot of the viewport
    async fn screenshot(&self) -> Result<Vec<u8>>;

    async fn close(&self) -> Result<()>;
}
