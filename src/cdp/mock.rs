//! Mock CDP implementation for testing
//!
//! This module provides mock implementations of CDP traits for development and
//! testing. The mock client can be scripted with canned evaluation results so
//! the page driver's generated locator scripts can be exercised without a
//! browser.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::cdp::traits::*;
use crate::cdp::types::Cookie;
use crate::Error;

/// Mock CDP connection
#[derive(Debug)]
pub struct MockCdpConnection {
    is_active: AtomicBool,
    next_id: AtomicU64,
}

impl MockCdpConnection {
    /// Create a new mock CDP connection
    pub fn new() -> Self {
        Self {
            is_active: AtomicBool::new(true),
            next_id: AtomicU64::new(1),
        }
    }
}

impl Default for MockCdpConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CdpConnection for MockCdpConnection {
    async fn send_command(
        &self,
        method: &str,
        _params: serde_json::Value,
    ) -> Result<CdpResponse, Error> {
        if !self.is_active.load(Ordering::Relaxed) {
            return Err(Error::cdp("Connection is closed"));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let result = match method {
            "Page.navigate" => serde_json::json!({
                "frameId": "mock-frame",
                "loaderId": "mock-loader",
            }),
            "Runtime.evaluate" => serde_json::json!({
                "result": { "type": "string", "value": "mock result" }
            }),
            "Network.getCookies" => serde_json::json!({ "cookies": [] }),
            _ => serde_json::json!({}),
        };

        Ok(CdpResponse {
            id,
            result: Some(result),
            error: None,
        })
    }

    async fn close(&self) -> Result<(), Error> {
        self.is_active.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.is_active.load(Ordering::Relaxed)
    }
}

/// Mock CDP client
///
/// Evaluation results can be scripted per script substring; unmatched scripts
/// fall back to sensible defaults (ready state "complete", empty title).
#[derive(Debug)]
pub struct MockCdpClient {
    connection: Arc<MockCdpConnection>,
    url: Mutex<Option<String>>,
    cookies: Mutex<Vec<Cookie>>,
    eval_rules: Mutex<Vec<(String, EvaluationResult)>>,
    eval_log: Mutex<Vec<String>>,
}

impl MockCdpClient {
    /// Create a new mock CDP client
    pub fn new() -> Self {
        Self {
            connection: Arc::new(MockCdpConnection::new()),
            url: Mutex::new(None),
            cookies: Mutex::new(Vec::new()),
            eval_rules: Mutex::new(Vec::new()),
            eval_log: Mutex::new(Vec::new()),
        }
    }

    /// Script an evaluation result for any script containing `needle`.
    /// Later rules take precedence over earlier ones.
    pub async fn on_evaluate<S: Into<String>>(&self, needle: S, result: EvaluationResult) {
        self.eval_rules.lock().await.insert(0, (needle.into(), result));
    }

    /// All scripts evaluated so far
    pub async fn evaluated_scripts(&self) -> Vec<String> {
        self.eval_log.lock().await.clone()
    }
}

impl Default for MockCdpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CdpClient for MockCdpClient {
    fn connection(&self) -> Arc<dyn CdpConnection> {
        self.connection.clone()
    }

    async fn navigate(&self, url: &str) -> Result<NavigationResult, Error> {
        *self.url.lock().await = Some(url.to_string());
        Ok(NavigationResult {
            url: url.to_string(),
            is_loaded: true,
        })
    }

    async fn evaluate(&self, script: &str, _await_promise: bool) -> Result<EvaluationResult, Error> {
        self.eval_log.lock().await.push(script.to_string());

        let rules = self.eval_rules.lock().await;
        for (needle, result) in rules.iter() {
            if script.contains(needle.as_str()) {
                return Ok(result.clone());
            }
        }

        if script.contains("document.readyState") {
            Ok(EvaluationResult::String("complete".to_string()))
        } else if script.contains("document.title") {
            Ok(EvaluationResult::String("Mock Page".to_string()))
        } else if script.contains("window.location.href") {
            let url = self.url.lock().await.clone().unwrap_or_default();
            Ok(EvaluationResult::String(url))
        } else {
            Ok(EvaluationResult::Null)
        }
    }

    async fn reload(&self, _ignore_cache: bool) -> Result<(), Error> {
        Ok(())
    }

    async fn enable_domain(&self, _domain: &str) -> Result<(), Error> {
        Ok(())
    }

    async fn get_cookies(&self) -> Result<Vec<Cookie>, Error> {
        Ok(self.cookies.lock().await.clone())
    }

    async fn set_cookies(&self, cookies: &[Cookie]) -> Result<(), Error> {
        self.cookies.lock().await.extend_from_slice(cookies);
        Ok(())
    }

    async fn call_method(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, Error> {
        let response = self.connection.send_command(method, params).await?;

        if let Some(error) = response.error {
            return Err(Error::cdp(format!("{:?}", error)));
        }

        response
            .result
            .ok_or_else(|| Error::cdp("No result in response"))
    }
}

/// Mock CDP browser
#[derive(Debug)]
pub struct MockCdpBrowser {
    is_active: AtomicBool,
    popup: Mutex<Option<TargetInfo>>,
}

impl MockCdpBrowser {
    /// Create a new mock CDP browser
    pub fn new() -> Self {
        Self {
            is_active: AtomicBool::new(true),
            popup: Mutex::new(None),
        }
    }

    /// Configure the target returned by the next `wait_for_popup`
    pub async fn set_popup(&self, target: TargetInfo) {
        *self.popup.lock().await = Some(target);
    }
}

impl Default for MockCdpBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CdpBrowser for MockCdpBrowser {
    async fn create_client(&self, _ws_url: &str) -> Result<Arc<dyn CdpClient>, Error> {
        if !self.is_active.load(Ordering::Relaxed) {
            return Err(Error::cdp("Browser is closed"));
        }

        Ok(Arc::new(MockCdpClient::new()))
    }

    async fn create_target(&self, _url: &str) -> Result<String, Error> {
        if !self.is_active.load(Ordering::Relaxed) {
            return Err(Error::cdp("Browser is closed"));
        }

        Ok("ws://localhost:9222/devtools/page/mock-target".to_string())
    }

    async fn get_targets(&self) -> Result<Vec<TargetInfo>, Error> {
        Ok(vec![])
    }

    async fn wait_for_popup(
        &self,
        _known_ids: &[String],
        timeout: Duration,
    ) -> Result<TargetInfo, Error> {
        match self.popup.lock().await.take() {
            Some(target) => Ok(target),
            None => Err(Error::timeout(format!(
                "No popup target appeared within {:?}",
                timeout
            ))),
        }
    }

    async fn close(&self) -> Result<(), Error> {
        self.is_active.store(false, Ordering::Relaxed);
        Ok(())
    }
}
