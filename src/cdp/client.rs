//! CDP client implementation
//!
//! This module provides a high-level CDP client with typed methods for the
//! operations the reservation flow needs.

use super::traits::*;
use super::types::*;
use crate::Error;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// CDP client implementation
#[derive(Debug, Clone)]
pub struct CdpClientImpl {
    /// Underlying CDP connection
    connection: Arc<dyn CdpConnection>,
}

impl CdpClientImpl {
    /// Create a new CDP client
    pub fn new(connection: Arc<dyn CdpConnection>) -> Self {
        Self { connection }
    }

    /// Parse remote object value to evaluation result
    fn parse_remote_object(obj: &RemoteObject) -> EvaluationResult {
        match obj.r#type.as_str() {
            "string" => EvaluationResult::String(
                obj.value
                    .as_ref()
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string(),
            ),
            "number" => {
                EvaluationResult::Number(obj.value.as_ref().and_then(|v| v.as_f64()).unwrap_or(0.0))
            }
            "boolean" => EvaluationResult::Bool(
                obj.value
                    .as_ref()
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
            ),
            "undefined" | "null" => EvaluationResult::Null,
            "object" | "function" | "bigint" | "symbol" => {
                EvaluationResult::Object(obj.value.clone().unwrap_or(serde_json::Value::Null))
            }
            _ => EvaluationResult::Null,
        }
    }
}

#[async_trait]
impl CdpClient for CdpClientImpl {
    /// Get the underlying connection
    fn connection(&self) -> Arc<dyn CdpConnection> {
        Arc::clone(&self.connection)
    }

    /// Navigate to a URL and wait for the document to settle
    async fn navigate(&self, url: &str) -> Result<NavigationResult, Error> {
        info!("Navigating to {}", url);

        let params = NavigateParams {
            url: url.to_string(),
            referrer: None,
        };

        let result = self
            .call_method("Page.navigate", serde_json::to_value(params)?)
            .await?;

        if let Some(error_text) = result.get("errorText").and_then(|v| v.as_str()) {
            if !error_text.is_empty() {
                return Err(Error::navigation_failed(format!("{}: {}", url, error_text)));
            }
        }

        // Wait for page load by polling document.readyState; more reliable
        // than the load event, which can fire before we subscribe
        let max_attempts = 50;
        let mut page_loaded = false;

        for attempt in 0..max_attempts {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

            match self.evaluate("document.readyState", false).await {
                Ok(EvaluationResult::String(state)) if state == "complete" => {
                    debug!("Page loaded on attempt {}", attempt + 1);
                    page_loaded = true;
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    // Page might not be ready yet, continue polling
                    debug!("Ready state check failed on attempt {}: {}", attempt + 1, e);
                }
            }
        }

        if !page_loaded {
            info!("Page load polling timed out for {} - continuing anyway", url);
        }

        Ok(NavigationResult {
            url: result
                .get("frame")
                .and_then(|f| f.get("url"))
                .and_then(|u| u.as_str())
                .unwrap_or(url)
                .to_string(),
            is_loaded: page_loaded,
        })
    }

    /// Evaluate JavaScript in the page
    async fn evaluate(&self, script: &str, await_promise: bool) -> Result<EvaluationResult, Error> {
        let params = EvaluateParams {
            expression: script.to_string(),
            await_promise: Some(await_promise),
            return_by_value: Some(true),
        };

        let result = self
            .call_method("Runtime.evaluate", serde_json::to_value(params)?)
            .await?;

        let response: EvaluateResponse = serde_json::from_value(result)
            .map_err(|e| Error::cdp(format!("Failed to parse evaluate response: {}", e)))?;

        if let Some(exception) = response.exception_details {
            return Err(Error::script_execution_failed(
                exception
                    .get("exception")
                    .and_then(|e| e.get("description"))
                    .and_then(|d| d.as_str())
                    .unwrap_or("Unknown error")
                    .to_string(),
            ));
        }

        Ok(Self::parse_remote_object(&response.result))
    }

    /// Reload the page
    async fn reload(&self, ignore_cache: bool) -> Result<(), Error> {
        debug!("Reloading page (ignore_cache: {})", ignore_cache);

        let params = serde_json::json!({
            "ignoreCache": ignore_cache,
        });

        let _ = self.call_method("Page.reload", params).await?;

        Ok(())
    }

    /// Enable a domain
    async fn enable_domain(&self, domain: &str) -> Result<(), Error> {
        debug!("Enabling domain: {}", domain);

        let method = format!("{}.enable", domain);
        let _ = self.call_method(&method, serde_json::json!({})).await?;

        Ok(())
    }

    /// Read all browser cookies via the Network domain
    async fn get_cookies(&self) -> Result<Vec<Cookie>, Error> {
        let result = self
            .call_method("Network.getCookies", serde_json::json!({}))
            .await?;

        let raw = result
            .get("cookies")
            .cloned()
            .ok_or_else(|| Error::cdp("No cookies field in Network.getCookies result"))?;

        let cookies: Vec<Cookie> = serde_json::from_value(raw)
            .map_err(|e| Error::cdp(format!("Failed to parse cookies: {}", e)))?;

        debug!("Collected {} cookies", cookies.len());
        Ok(cookies)
    }

    /// Install cookies via the Network domain
    async fn set_cookies(&self, cookies: &[Cookie]) -> Result<(), Error> {
        if cookies.is_empty() {
            return Ok(());
        }

        let params = serde_json::json!({
            "cookies": cookies.iter().map(Cookie::to_param).collect::<Vec<_>>(),
        });

        let _ = self.call_method("Network.setCookies", params).await?;

        debug!("Installed {} cookies", cookies.len());
        Ok(())
    }

    /// Call a raw CDP method
    async fn call_method(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, Error> {
        let response = self.connection.send_command(method, params).await?;

        if let Some(error) = response.error {
            return Err(Error::cdp(format!(
                "{} failed: {} (code {})",
                method, error.message, error.code
            )));
        }

        response
            .result
            .ok_or_else(|| Error::cdp("No result in response"))
    }
}
