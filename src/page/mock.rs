//! Scripted mock page for testing
//!
//! `MockPage` models the portal DOM as a registry of elements keyed by the
//! exact selector the production code queries with. Elements can be scheduled
//! to appear only after a number of reloads (the slot grid releasing), and all
//! interactions are journaled so tests can assert what was clicked, filled,
//! or never touched.

use super::{ElementSnapshot, PageDriver, Selector};
use crate::cdp::types::Cookie;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted element
#[derive(Debug, Clone)]
pub struct MockElement {
    /// Element text content
    pub text: String,
    /// Whether the element is currently rendered
    pub visible: bool,
}

#[derive(Default)]
struct MockDom {
    elements: HashMap<Selector, Vec<MockElement>>,
    // Selector becomes present only once the reload counter reaches the value
    appear_after: HashMap<Selector, u32>,
    // Selector stays absent until its trigger is clicked
    reveal_on_click: HashMap<Selector, Selector>,
    hidden_until_revealed: std::collections::HashSet<Selector>,
    revealed: std::collections::HashSet<Selector>,
    popups: HashMap<Selector, Arc<MockPage>>,
    cookies: Vec<Cookie>,
    storage: HashMap<String, String>,
    title: String,
    reloads: u32,
    navigations: Vec<String>,
    clicks: Vec<(Selector, usize)>,
    fills: Vec<(Selector, String)>,
    checks: Vec<(Selector, bool)>,
    closed: bool,
    detached: bool,
}

/// Scripted page driver for tests
#[derive(Default)]
pub struct MockPage {
    dom: Mutex<MockDom>,
}

impl MockPage {
    /// Create an empty mock page
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with_dom<T>(&self, f: impl FnOnce(&mut MockDom) -> T) -> T {
        let mut dom = self.dom.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut dom)
    }

    /// Register an element under a selector
    pub fn add_element(&self, selector: Selector, text: &str, visible: bool) {
        self.with_dom(|dom| {
            dom.elements.entry(selector).or_default().push(MockElement {
                text: text.to_string(),
                visible,
            })
        });
    }

    /// Register an element that only becomes present after `reloads` reloads
    pub fn appear_after_reloads(&self, selector: Selector, text: &str, reloads: u32) {
        self.add_element(selector.clone(), text, true);
        self.with_dom(|dom| dom.appear_after.insert(selector, reloads));
    }

    /// Keep `target` absent until `trigger` is clicked (a form submit
    /// revealing the post-login view, for example)
    pub fn reveal_on_click(&self, trigger: Selector, target: Selector) {
        self.with_dom(|dom| {
            dom.hidden_until_revealed.insert(target.clone());
            dom.reveal_on_click.insert(trigger, target);
        });
    }

    /// Register the popup page opened by clicking a selector
    pub fn set_popup(&self, selector: Selector, popup: Arc<MockPage>) {
        self.with_dom(|dom| dom.popups.insert(selector, popup));
    }

    /// Seed the browser cookie jar
    pub fn seed_cookies(&self, cookies: Vec<Cookie>) {
        self.with_dom(|dom| dom.cookies = cookies);
    }

    /// Set the document title
    pub fn set_title(&self, title: &str) {
        self.with_dom(|dom| dom.title = title.to_string());
    }

    /// Simulate the browser going away; `title` starts failing
    pub fn detach(&self) {
        self.with_dom(|dom| dom.detached = true);
    }

    /// All clicks performed so far, as (selector, visible index)
    pub fn clicks(&self) -> Vec<(Selector, usize)> {
        self.with_dom(|dom| dom.clicks.clone())
    }

    /// All fills performed so far
    pub fn fills(&self) -> Vec<(Selector, String)> {
        self.with_dom(|dom| dom.fills.clone())
    }

    /// All checkbox toggles performed so far
    pub fn checks(&self) -> Vec<(Selector, bool)> {
        self.with_dom(|dom| dom.checks.clone())
    }

    /// All navigations performed so far
    pub fn navigations(&self) -> Vec<String> {
        self.with_dom(|dom| dom.navigations.clone())
    }

    /// Number of reloads performed so far
    pub fn reload_count(&self) -> u32 {
        self.with_dom(|dom| dom.reloads)
    }

    /// Whether the page has been closed
    pub fn is_closed(&self) -> bool {
        self.with_dom(|dom| dom.closed)
    }

    /// Stored cookie jar contents
    pub fn cookie_jar(&self) -> Vec<Cookie> {
        self.with_dom(|dom| dom.cookies.clone())
    }

    fn visible_elements(&self, selector: &Selector) -> Vec<MockElement> {
        self.with_dom(|dom| {
            if let Some(required) = dom.appear_after.get(selector) {
                if dom.reloads < *required {
                    return Vec::new();
                }
            }

            if dom.hidden_until_revealed.contains(selector) && !dom.revealed.contains(selector) {
                return Vec::new();
            }

            dom.elements
                .get(selector)
                .map(|elements| {
                    elements
                        .iter()
                        .filter(|el| el.visible)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        })
    }

    fn has_any(&self, selector: &Selector) -> bool {
        self.with_dom(|dom| dom.elements.contains_key(selector))
    }
}

#[async_trait]
impl PageDriver for MockPage {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.with_dom(|dom| dom.navigations.push(url.to_string()));
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.with_dom(|dom| dom.reloads += 1);
        Ok(())
    }

    async fn wait_for_load(&self) -> Result<()> {
        Ok(())
    }

    async fn title(&self) -> Result<String> {
        self.with_dom(|dom| {
            if dom.detached {
                Err(Error::websocket("Connection to mock page is closed"))
            } else {
                Ok(dom.title.clone())
            }
        })
    }

    async fn query_visible(&self, selector: &Selector) -> Result<Vec<ElementSnapshot>> {
        Ok(self
            .visible_elements(selector)
            .into_iter()
            .enumerate()
            .map(|(index, el)| ElementSnapshot {
                index,
                tag_name: "div".to_string(),
                text: el.text,
            })
            .collect())
    }

    async fn wait_for(&self, selector: &Selector, timeout: Duration) -> Result<ElementSnapshot> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let mut visible = self.query_visible(selector).await?;
            if !visible.is_empty() {
                return Ok(visible.remove(0));
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(Error::timeout(format!(
                    "Element not visible within {:?}: {}",
                    timeout, selector
                )));
            }

            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    async fn click(&self, selector: &Selector) -> Result<()> {
        self.click_nth(selector, 0).await
    }

    async fn click_nth(&self, selector: &Selector, index: usize) -> Result<()> {
        let visible = self.visible_elements(selector);
        if index >= visible.len() {
            return Err(Error::element_not_found(selector.to_string()));
        }

        self.with_dom(|dom| {
            dom.clicks.push((selector.clone(), index));
            if let Some(target) = dom.reveal_on_click.get(selector).cloned() {
                dom.revealed.insert(target);
            }
        });
        Ok(())
    }

    async fn fill(&self, selector: &Selector, value: &str) -> Result<()> {
        if !self.has_any(selector) {
            return Err(Error::element_not_found(selector.to_string()));
        }

        self.with_dom(|dom| dom.fills.push((selector.clone(), value.to_string())));
        Ok(())
    }

    async fn set_checked(&self, selector: &Selector, checked: bool) -> Result<()> {
        if !self.has_any(selector) {
            return Err(Error::element_not_found(selector.to_string()));
        }

        self.with_dom(|dom| dom.checks.push((selector.clone(), checked)));
        Ok(())
    }

    async fn cookies(&self) -> Result<Vec<Cookie>> {
        Ok(self.with_dom(|dom| dom.cookies.clone()))
    }

    async fn set_cookies(&self, cookies: &[Cookie]) -> Result<()> {
        self.with_dom(|dom| dom.cookies.extend_from_slice(cookies));
        Ok(())
    }

    async fn local_storage(&self) -> Result<HashMap<String, String>> {
        Ok(self.with_dom(|dom| dom.storage.clone()))
    }

    async fn restore_local_storage(&self, entries: &HashMap<String, String>) -> Result<()> {
        self.with_dom(|dom| dom.storage.extend(entries.clone()));
        Ok(())
    }

    async fn click_expect_popup(&self, selector: &Selector) -> Result<Arc<dyn PageDriver>> {
        self.click(selector).await?;

        self.with_dom(|dom| dom.popups.get(selector).cloned())
            .map(|popup| popup as Arc<dyn PageDriver>)
            .ok_or_else(|| Error::timeout(format!("No popup configured for {}", selector)))
    }

    async fn close(&self) -> Result<()> {
        self.with_dom(|dom| dom.closed = true);
        Ok(())
    }
}
