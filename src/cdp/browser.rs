//! CDP browser control implementation
//!
//! This module provides browser-level operations: launching or attaching to a
//! Chromium instance, target discovery via the DevTools HTTP API, and client
//! construction per target.

use super::client::CdpClientImpl;
use super::connection::CdpWebSocketConnection;
use super::traits::*;
use crate::Error;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Chromium executable names probed when no explicit path is configured
const CHROMIUM_CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
];

/// How long to wait for a freshly launched browser to answer /json/version
const LAUNCH_READY_TIMEOUT: Duration = Duration::from_secs(20);

/// Options for launching a local Chromium instance
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Headless mode (no GUI)
    pub headless: bool,
    /// Chromium executable path; candidates are probed when unset
    pub executable_path: Option<String>,
    /// Profile directory; a throwaway directory keeps runs independent of the
    /// user's own browser profile
    pub user_data_dir: Option<PathBuf>,
    /// Remote debugging port
    pub port: u16,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            executable_path: None,
            user_data_dir: None,
            port: 9222,
        }
    }
}

/// CDP browser implementation
#[derive(Debug)]
pub struct CdpBrowserImpl {
    /// Browser WebSocket endpoint (e.g., "ws://localhost:9222")
    endpoint: String,
    /// Active connections (target_id -> connection)
    connections: Arc<Mutex<HashMap<String, Arc<dyn CdpConnection>>>>,
    /// Locally launched browser process, when we own one
    child: Mutex<Option<tokio::process::Child>>,
}

impl CdpBrowserImpl {
    /// Attach to an already-running browser at the given endpoint
    pub fn connect<S: Into<String>>(endpoint: S) -> Self {
        let endpoint = endpoint.into();
        info!("Attaching to browser endpoint: {}", endpoint);
        Self {
            endpoint,
            connections: Arc::new(Mutex::new(HashMap::new())),
            child: Mutex::new(None),
        }
    }

    /// Launch a local Chromium instance and wait until its DevTools endpoint
    /// answers
    pub async fn launch(options: &LaunchOptions) -> Result<Self, Error> {
        let child = Self::spawn_chromium(options)?;
        let endpoint = format!("ws://127.0.0.1:{}", options.port);

        let browser = Self {
            endpoint,
            connections: Arc::new(Mutex::new(HashMap::new())),
            child: Mutex::new(Some(child)),
        };

        browser.wait_until_ready().await?;
        info!("Browser ready at {}", browser.endpoint);

        Ok(browser)
    }

    fn spawn_chromium(options: &LaunchOptions) -> Result<tokio::process::Child, Error> {
        let mut args = vec![
            format!("--remote-debugging-port={}", options.port),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--disable-background-networking".to_string(),
        ];
        if let Some(dir) = &options.user_data_dir {
            args.push(format!("--user-data-dir={}", dir.display()));
        }
        if options.headless {
            args.push("--headless=new".to_string());
        }

        let candidates: Vec<String> = match &options.executable_path {
            Some(path) => vec![path.clone()],
            None => CHROMIUM_CANDIDATES.iter().map(|s| s.to_string()).collect(),
        };

        let mut last_error = None;
        for candidate in &candidates {
            debug!("Trying browser executable: {}", candidate);
            match tokio::process::Command::new(candidate)
                .args(&args)
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null())
                .spawn()
            {
                Ok(child) => {
                    info!("Launched {} (headless: {})", candidate, options.headless);
                    return Ok(child);
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(Error::configuration(format!(
            "No Chromium executable found (tried {:?}): {}",
            candidates,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    /// Poll /json/version until the browser answers or the deadline passes
    async fn wait_until_ready(&self) -> Result<(), Error> {
        let url = format!("{}/json/version", self.http_endpoint());
        let client = Self::http_client()?;
        let deadline = tokio::time::Instant::now() + LAUNCH_READY_TIMEOUT;

        loop {
            match client.get(&url).send().await {
                Ok(response) if response.status().is_success() => return Ok(()),
                _ if tokio::time::Instant::now() >= deadline => {
                    return Err(Error::timeout(format!(
                        "Browser did not answer {} within {:?}",
                        url, LAUNCH_READY_TIMEOUT
                    )));
                }
                _ => tokio::time::sleep(Duration::from_millis(500)).await,
            }
        }
    }

    fn http_endpoint(&self) -> String {
        self.endpoint
            .replace("ws://", "http://")
            .replace("wss://", "https://")
    }

    fn http_client() -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .build()
            .map_err(|e| Error::internal(format!("Failed to create HTTP client: {}", e)))
    }

    /// List all targets from the browser /json endpoint
    async fn fetch_targets(&self) -> Result<Vec<TargetInfo>, Error> {
        let url = format!("{}/json", self.http_endpoint());
        let client = Self::http_client()?;

        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::internal(format!("Failed to fetch targets: {}", e)))?;

        let targets_json: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| Error::internal(format!("Failed to parse targets: {}", e)))?;

        let mut targets = Vec::new();
        for target_json in targets_json {
            if let (Some(target_id), Some(target_type), Some(url)) = (
                target_json.get("id").and_then(|v| v.as_str()),
                target_json.get("type").and_then(|v| v.as_str()),
                target_json.get("url").and_then(|v| v.as_str()),
            ) {
                targets.push(TargetInfo {
                    target_id: target_id.to_string(),
                    target_type: target_type.to_string(),
                    title: target_json
                        .get("title")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string(),
                    url: url.to_string(),
                    ws_url: target_json
                        .get("webSocketDebuggerUrl")
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string()),
                });
            }
        }

        Ok(targets)
    }
}

#[async_trait]
impl CdpBrowser for CdpBrowserImpl {
    /// Create a new CDP client for a target WebSocket URL
    async fn create_client(&self, ws_url: &str) -> Result<Arc<dyn CdpClient>, Error> {
        debug!("Creating CDP client for target: {}", ws_url);

        let connection = CdpWebSocketConnection::new(ws_url).await?;

        let target_id = ws_url.rsplit('/').next().unwrap_or("unknown").to_string();
        self.connections
            .lock()
            .await
            .insert(target_id, Arc::clone(&connection) as Arc<dyn CdpConnection>);

        let client = Arc::new(CdpClientImpl::new(connection));

        // Page and Runtime carry navigation and script evaluation; Network is
        // needed for cookie capture/restore
        client.enable_domain("Page").await?;
        client.enable_domain("Runtime").await?;
        client.enable_domain("Network").await?;

        Ok(client)
    }

    /// Create a new browser target (page) using the /json/new HTTP endpoint
    async fn create_target(&self, url: &str) -> Result<String, Error> {
        info!("Creating new target with URL: {}", url);

        let new_url = format!("{}/json/new?{}", self.http_endpoint(), url);
        let client = Self::http_client()?;

        let response = client.put(&new_url).send().await.map_err(|e| {
            Error::internal(format!(
                r#"Failed to reach the browser DevTools endpoint at {}.
Start a browser with remote debugging enabled, e.g.:
  chromium --remote-debugging-port=9222 --user-data-dir=/tmp/chrome-debug
Original error: {}"#,
                self.endpoint, e
            ))
        })?;

        let target_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::internal(format!("Failed to parse new target response: {}", e)))?;

        let ws_url = target_json
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::internal("No webSocketDebuggerUrl in new target response"))?;

        debug!("Created new target with WebSocket URL: {}", ws_url);

        Ok(ws_url.to_string())
    }

    /// List all targets (pages, workers, etc.)
    async fn get_targets(&self) -> Result<Vec<TargetInfo>, Error> {
        self.fetch_targets().await
    }

    /// Wait for a page target that is not in `known_ids` to appear
    async fn wait_for_popup(
        &self,
        known_ids: &[String],
        timeout: Duration,
    ) -> Result<TargetInfo, Error> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let targets = self.fetch_targets().await?;
            let popup = targets.into_iter().find(|t| {
                t.target_type == "page"
                    && t.ws_url.is_some()
                    && !known_ids.contains(&t.target_id)
            });

            if let Some(target) = popup {
                info!("Popup target appeared: {} ({})", target.target_id, target.url);
                return Ok(target);
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(Error::timeout(format!(
                    "No popup target appeared within {:?}",
                    timeout
                )));
            }

            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }

    /// Close all connections and, when we launched the browser, the process
    async fn close(&self) -> Result<(), Error> {
        let mut connections = self.connections.lock().await;
        debug!("Closing {} CDP connections", connections.len());

        for (target_id, connection) in connections.iter() {
            if let Err(e) = connection.close().await {
                warn!("Failed to close connection to {}: {}", target_id, e);
            }
        }
        connections.clear();
        drop(connections);

        let mut child = self.child.lock().await;
        if let Some(mut process) = child.take() {
            info!("Stopping launched browser process");
            if let Err(e) = process.kill().await {
                warn!("Failed to stop browser process: {}", e);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_conversion() {
        let browser = CdpBrowserImpl::connect("ws://localhost:9222");
        assert_eq!(browser.http_endpoint(), "http://localhost:9222");

        let browser = CdpBrowserImpl::connect("wss://remote.example.com:9222");
        assert_eq!(browser.http_endpoint(), "https://remote.example.com:9222");
    }

    #[test]
    fn test_default_launch_options() {
        let options = LaunchOptions::default();
        assert!(options.headless);
        assert_eq!(options.port, 9222);
        assert!(options.executable_path.is_none());
    }
}
