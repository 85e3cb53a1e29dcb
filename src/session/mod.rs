//! Session layer
//!
//! Artifact persistence (`store`) and session establishment (`manager`).
//! The manager prefers restored cookies + local storage and only falls back
//! to credential sign-in when the restored session is absent or stale.

pub mod manager;
pub mod store;

pub use manager::{AuthenticatedSession, Credentials, SessionManager};
pub use store::{FsSessionStore, MemorySessionStore, SessionArtifacts, SessionStore};
