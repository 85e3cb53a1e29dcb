//! Chrome DevTools Protocol (CDP) layer
//!
//! WebSocket communication with a Chromium browser: command/response
//! correlation, typed client operations (navigation, script evaluation,
//! cookie capture/restore), and browser-level target management including
//! local launch.
//!
//! Module structure:
//! - `traits`: core trait definitions for the CDP layer
//! - `types`: CDP protocol data types
//! - `connection`: WebSocket connection implementation
//! - `client`: typed CDP client implementation
//! - `browser`: browser-level operations (launch/attach, targets, popups)
//! - `mock`: mock implementations for testing

pub mod browser;
pub mod client;
pub mod connection;
pub mod mock;
pub mod traits;
pub mod types;

pub use traits::{
    CdpBrowser, CdpClient, CdpConnection, CdpError, CdpResponse, EvaluationResult,
    NavigationResult, TargetInfo,
};
pub use types::Cookie;

// Re-export implementation structs
pub use browser::{CdpBrowserImpl, LaunchOptions};
pub use client::CdpClientImpl;
pub use connection::CdpWebSocketConnection;

// Re-export mock for development/testing
pub use mock::{MockCdpBrowser, MockCdpClient, MockCdpConnection};
