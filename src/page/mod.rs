//! Page driver layer
//!
//! DOM-level operations on top of the CDP client: element queries with
//! visibility filtering, bounded waits, clicks, form fills, and session
//! state capture (cookies + local storage). The `PageDriver` trait is the
//! seam the session and booking layers are written against; `CdpPage` is the
//! real implementation and `MockPage` a scripted stand-in for tests.

pub mod driver;
pub mod locator;
pub mod mock;

pub use driver::CdpPage;
pub use mock::MockPage;

use crate::cdp::types::Cookie;
use crate::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Element query strategy
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// CSS selector
    Css(String),
    /// XPath expression
    XPath(String),
    /// CSS selector narrowed to elements whose text contains a needle
    Text {
        /// CSS pre-filter
        css: String,
        /// Substring the element's text content must contain
        contains: String,
    },
}

impl Selector {
    /// CSS selector
    pub fn css<S: Into<String>>(selector: S) -> Self {
        Selector::Css(selector.into())
    }

    /// XPath expression
    pub fn xpath<S: Into<String>>(expression: S) -> Self {
        Selector::XPath(expression.into())
    }

    /// CSS selector narrowed by text content
    pub fn text<C: Into<String>, T: Into<String>>(css: C, contains: T) -> Self {
        Selector::Text {
            css: css.into(),
            contains: contains.into(),
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::Css(css) => write!(f, "css={}", css),
            Selector::XPath(xpath) => write!(f, "xpath={}", xpath),
            Selector::Text { css, contains } => write!(f, "text={}:{}", css, contains),
        }
    }
}

/// Snapshot of one visible element returned by a query
#[derive(Debug, Clone, Deserialize)]
pub struct ElementSnapshot {
    /// Position within the visible match set
    pub index: usize,
    /// Lower-cased tag name
    pub tag_name: String,
    /// Trimmed text content (truncated in-page)
    pub text: String,
}

/// DOM-level page driver
///
/// All waits are bounded; none of these operations blocks indefinitely.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to a URL
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Reload the current page
    async fn reload(&self) -> Result<()>;

    /// Wait for the document to reach a settled state
    async fn wait_for_load(&self) -> Result<()>;

    /// Current document title
    async fn title(&self) -> Result<String>;

    /// Snapshot all currently visible elements matching the selector, in
    /// display order
    async fn query_visible(&self, selector: &Selector) -> Result<Vec<ElementSnapshot>>;

    /// Wait up to `timeout` for a visible match, polling the page
    async fn wait_for(&self, selector: &Selector, timeout: Duration) -> Result<ElementSnapshot>;

    /// Click the first visible match
    async fn click(&self, selector: &Selector) -> Result<()>;

    /// Click the n-th visible match (zero-based)
    async fn click_nth(&self, selector: &Selector, index: usize) -> Result<()>;

    /// Fill the first matching input with a value
    async fn fill(&self, selector: &Selector, value: &str) -> Result<()>;

    /// Set a checkbox to the given state
    async fn set_checked(&self, selector: &Selector, checked: bool) -> Result<()>;

    /// Read all browser cookies
    async fn cookies(&self) -> Result<Vec<Cookie>>;

    /// Install cookies into the browser
    async fn set_cookies(&self, cookies: &[Cookie]) -> Result<()>;

    /// Snapshot local storage as a flat string map
    async fn local_storage(&self) -> Result<HashMap<String, String>>;

    /// Restore a local storage snapshot
    async fn restore_local_storage(&self, entries: &HashMap<String, String>) -> Result<()>;

    /// Click an element that opens a new page and return a driver for it
    async fn click_expect_popup(&self, selector: &Selector) -> Result<Arc<dyn PageDriver>>;

    /// Close the page
    async fn close(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_display() {
        assert_eq!(Selector::css("div.element").to_string(), "css=div.element");
        assert_eq!(
            Selector::text("button", "下一步").to_string(),
            "text=button:下一步"
        );
    }

    #[test]
    fn test_selector_equality_as_mock_key() {
        let a = Selector::text("div.element", "可预约");
        let b = Selector::text("div.element", "可预约");
        assert_eq!(a, b);
        assert_ne!(a, Selector::css("div.element"));
    }
}
