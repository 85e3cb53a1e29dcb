//! CDP WebSocket connection implementation
//!
//! This module provides WebSocket-based connection to Chrome DevTools Protocol.
//! Commands are correlated with responses by id through a pending-command map;
//! a background reader task routes incoming frames to the waiting senders.

use super::traits::{CdpConnection, CdpError, CdpResponse};
use super::types::{CdpNotification, CdpRequest, CdpRpcResponse};
use crate::Error;
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;
type PendingMap = Arc<Mutex<HashMap<u64, PendingCommand>>>;

/// CDP timeout configuration
#[derive(Debug, Clone)]
struct CdpTimeoutConfig {
    /// Default timeout for most commands (seconds)
    default_timeout_secs: u64,
    /// Timeout for page navigation commands (seconds)
    navigation_timeout_secs: u64,
}

impl Default for CdpTimeoutConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: 30,
            navigation_timeout_secs: 60,
        }
    }
}

impl CdpTimeoutConfig {
    /// Get timeout duration for a specific command method
    fn get_timeout_for_command(&self, method: &str) -> tokio::time::Duration {
        let method_lower = method.to_lowercase();

        if method_lower.contains("navigate") || method_lower.contains("reload") {
            return tokio::time::Duration::from_secs(self.navigation_timeout_secs);
        }

        tokio::time::Duration::from_secs(self.default_timeout_secs)
    }
}

/// Pending command response
#[derive(Debug)]
struct PendingCommand {
    /// Response channel sender
    sender: oneshot::Sender<CdpResponse>,
    /// Command method (for logging)
    method: String,
}

/// CDP WebSocket connection implementation
#[derive(Debug)]
pub struct CdpWebSocketConnection {
    /// WebSocket URL
    url: String,
    /// Write half of the WebSocket stream
    writer: Arc<Mutex<WsSink>>,
    /// Next command ID
    next_id: AtomicU64,
    /// Pending commands (ID -> response sender)
    pending: PendingMap,
    /// Is connection active
    is_active: Arc<AtomicBool>,
    /// Timeout configuration
    timeout_config: CdpTimeoutConfig,
}

impl CdpWebSocketConnection {
    /// Create a new CDP WebSocket connection
    ///
    /// # Arguments
    /// * `url` - WebSocket URL (e.g., "ws://localhost:9222/devtools/page/ABC123")
    pub async fn new<S: Into<String>>(url: S) -> Result<Arc<Self>, Error> {
        let url = url.into();
        info!("Connecting to CDP WebSocket: {}", url);

        let (ws_stream, _) = connect_async(&url)
            .await
            .map_err(|e| Error::websocket(format!("Failed to connect to {}: {}", url, e)))?;

        let (writer, reader) = ws_stream.split();
        let writer = Arc::new(Mutex::new(writer));

        let connection = Arc::new(Self {
            url,
            writer: Arc::clone(&writer),
            next_id: AtomicU64::new(1),
            pending: Arc::new(Mutex::new(HashMap::new())),
            is_active: Arc::new(AtomicBool::new(true)),
            timeout_config: CdpTimeoutConfig::default(),
        });

        let pending = Arc::clone(&connection.pending);
        let is_active = Arc::clone(&connection.is_active);

        tokio::spawn(async move {
            Self::read_loop(reader, writer, pending, Arc::clone(&is_active)).await;
            is_active.store(false, Ordering::SeqCst);
            debug!("CDP read loop exited");
        });

        Ok(connection)
    }

    /// Background frame reader; routes responses to their pending senders
    async fn read_loop(
        mut reader: WsSource,
        writer: Arc<Mutex<WsSink>>,
        pending: PendingMap,
        is_active: Arc<AtomicBool>,
    ) {
        while let Some(frame) = reader.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    Self::handle_frame(&text, &pending).await;
                }
                Ok(Message::Ping(data)) => {
                    let mut writer = writer.lock().await;
                    if let Err(e) = writer.send(Message::Pong(data)).await {
                        warn!("Failed to send pong: {}", e);
                    }
                }
                Ok(Message::Close(_)) => {
                    info!("WebSocket close frame received");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    if is_active.load(Ordering::SeqCst) {
                        error!("WebSocket error: {}", e);
                    }
                    break;
                }
            }
        }

        // Waiters see the dropped senders as a closed-connection error
        pending.lock().await.clear();
    }

    /// Route one incoming text frame
    async fn handle_frame(text: &str, pending: &PendingMap) {
        if let Ok(response) = serde_json::from_str::<CdpRpcResponse>(text) {
            let entry = pending.lock().await.remove(&response.id);
            match entry {
                Some(command) => {
                    trace!("Response for {} (id {})", command.method, response.id);

                    let (result, cdp_error) = match response.error {
                        Some(detail) => (
                            None,
                            Some(CdpError {
                                code: detail.code,
                                message: detail.message,
                            }),
                        ),
                        None => (Some(response.result), None),
                    };

                    let _ = command.sender.send(CdpResponse {
                        id: response.id,
                        result,
                        error: cdp_error,
                    });
                }
                None => {
                    debug!("Response for unknown command id {}", response.id);
                }
            }
            return;
        }

        if let Ok(notification) = serde_json::from_str::<CdpNotification>(text) {
            trace!("CDP event: {}", notification.method);
            return;
        }

        warn!("Unknown CDP message format: {}", text);
    }
}

#[async_trait]
impl CdpConnection for CdpWebSocketConnection {
    async fn send_command(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<CdpResponse, Error> {
        if !self.is_active.load(Ordering::SeqCst) {
            return Err(Error::websocket(format!(
                "Connection to {} is closed",
                self.url
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = CdpRequest {
            id,
            method: method.to_string(),
            params: Some(params),
        };

        let payload = serde_json::to_string(&request)?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(
            id,
            PendingCommand {
                sender: tx,
                method: method.to_string(),
            },
        );

        debug!("Sending CDP command {} (id {})", method, id);

        {
            let mut writer = self.writer.lock().await;
            if let Err(e) = writer.send(Message::Text(payload.into())).await {
                self.pending.lock().await.remove(&id);
                return Err(Error::websocket(format!("Failed to send command: {}", e)));
            }
        }

        let timeout = self.timeout_config.get_timeout_for_command(method);

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(Error::websocket(format!(
                "Connection closed while waiting for {} response",
                method
            ))),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(Error::timeout(format!(
                    "No response for {} within {:?}",
                    method, timeout
                )))
            }
        }
    }

    async fn close(&self) -> Result<(), Error> {
        if !self.is_active.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        info!("Closing CDP connection to {}", self.url);

        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.send(Message::Close(None)).await {
            debug!("Close frame could not be delivered: {}", e);
        }

        Ok(())
    }

    fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_config_for_navigation() {
        let config = CdpTimeoutConfig::default();
        assert_eq!(
            config.get_timeout_for_command("Page.navigate"),
            tokio::time::Duration::from_secs(60)
        );
        assert_eq!(
            config.get_timeout_for_command("Page.reload"),
            tokio::time::Duration::from_secs(60)
        );
        assert_eq!(
            config.get_timeout_for_command("Runtime.evaluate"),
            tokio::time::Duration::from_secs(30)
        );
    }

    #[tokio::test]
    async fn test_connect_to_unreachable_endpoint_fails() {
        let result = CdpWebSocketConnection::new("ws://127.0.0.1:1/devtools/page/nope").await;
        assert!(matches!(result, Err(Error::WebSocket(_))));
    }
}
