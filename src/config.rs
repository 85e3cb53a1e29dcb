//! Configuration management for Slot-Chaser
//!
//! The configuration record is resolved by the surrounding application (GUI,
//! scheduler, shell wrapper) and handed to the entry operations as a file
//! plus environment overrides. Unknown or missing required fields surface as
//! `Error::Configuration` before any browser is launched.

use crate::booking::{BookingRequest, DateSpec, VenueCategory};
use crate::session::Credentials;
use crate::{Error, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

/// Resolved configuration record
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Account identifier (student number)
    pub username: String,

    /// Account secret
    pub password: String,

    /// Payment secret for the funded-account keypad flow
    #[serde(alias = "pay_pass")]
    pub pay_password: String,

    /// Target date: "today", "tomorrow" or an explicit YYYY-MM-DD date
    pub date: String,

    /// Time-slot label, e.g. "20:00-21:00"
    pub time_slot: String,

    /// Venue category: fitness/badminton/basketball (or the legacy A/B/C letters)
    pub venue: String,

    /// Court preference for basketball: "in"/"indoor" or "out"/"outdoor"
    pub court: Option<String>,

    /// Per-attempt visibility wait while polling for the target date, in seconds
    pub wait_timeout_seconds: f64,

    /// Upper bound on reload-and-reselect attempts while polling
    pub max_poll_attempts: u32,

    /// Run the browser without a visible window
    pub headless: bool,

    /// Directory holding session artifacts (cookies.json, storage.json)
    pub state_dir: PathBuf,

    /// WebSocket endpoint of an already-running browser; when unset a local
    /// Chromium is launched instead
    pub cdp_endpoint: Option<String>,

    /// Chromium executable path used when launching locally
    pub chrome_path: Option<String>,

    /// Remote debugging port used when launching locally
    pub debug_port: u16,

    /// Log level
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            pay_password: String::new(),
            date: "tomorrow".to_string(),
            time_slot: "20:00-21:00".to_string(),
            venue: "basketball".to_string(),
            court: None,
            wait_timeout_seconds: 1.0,
            max_poll_attempts: 100,
            headless: true,
            state_dir: PathBuf::from("config"),
            cdp_endpoint: None,
            chrome_path: None,
            debug_port: 9222,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Load configuration from a JSON or TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::configuration(format!("Failed to read config file: {}", e)))?;

        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        if is_toml {
            toml::from_str(&content)
                .map_err(|e| Error::configuration(format!("Failed to parse config: {}", e)))
        } else {
            serde_json::from_str(&content)
                .map_err(|e| Error::configuration(format!("Failed to parse config: {}", e)))
        }
    }

    /// Apply environment variable overrides
    fn apply_env(&mut self) -> Result<()> {
        if let Ok(username) = env::var("SLOT_CHASER_USERNAME") {
            self.username = username;
        }

        if let Ok(password) = env::var("SLOT_CHASER_PASSWORD") {
            self.password = password;
        }

        if let Ok(pay_password) = env::var("SLOT_CHASER_PAY_PASSWORD") {
            self.pay_password = pay_password;
        }

        if let Ok(endpoint) = env::var("SLOT_CHASER_CDP_ENDPOINT") {
            self.cdp_endpoint = Some(endpoint);
        }

        if let Ok(chrome_path) = env::var("SLOT_CHASER_CHROME_PATH") {
            self.chrome_path = Some(chrome_path);
        }

        if let Ok(state_dir) = env::var("SLOT_CHASER_STATE_DIR") {
            self.state_dir = PathBuf::from(state_dir);
        }

        if let Ok(port) = env::var("SLOT_CHASER_DEBUG_PORT") {
            self.debug_port = port
                .parse()
                .map_err(|_| Error::configuration("Invalid SLOT_CHASER_DEBUG_PORT"))?;
        }

        if let Ok(attempts) = env::var("SLOT_CHASER_MAX_POLL_ATTEMPTS") {
            self.max_poll_attempts = attempts
                .parse()
                .map_err(|_| Error::configuration("Invalid SLOT_CHASER_MAX_POLL_ATTEMPTS"))?;
        }

        if let Ok(wait) = env::var("SLOT_CHASER_WAIT_TIMEOUT_SECONDS") {
            self.wait_timeout_seconds = wait
                .parse()
                .map_err(|_| Error::configuration("Invalid SLOT_CHASER_WAIT_TIMEOUT_SECONDS"))?;
        }

        if let Ok(log_level) = env::var("SLOT_CHASER_LOG_LEVEL") {
            self.log_level = log_level;
        }

        Ok(())
    }

    /// Account credentials; identifier and secret must be non-empty
    pub fn credentials(&self) -> Result<Credentials> {
        if self.username.is_empty() {
            return Err(Error::configuration("username is required"));
        }
        if self.password.is_empty() {
            return Err(Error::configuration("password is required"));
        }

        Ok(Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
            pay_password: self.pay_password.clone(),
        })
    }

    /// Validated booking request derived from the raw record
    pub fn booking_request(&self) -> Result<BookingRequest> {
        if self.time_slot.is_empty() {
            return Err(Error::configuration("time_slot is required"));
        }
        if self.wait_timeout_seconds <= 0.0 {
            return Err(Error::configuration(
                "wait_timeout_seconds must be positive",
            ));
        }
        if self.max_poll_attempts == 0 {
            return Err(Error::configuration("max_poll_attempts must be at least 1"));
        }

        Ok(BookingRequest {
            date: DateSpec::parse(&self.date)?,
            time_slot: self.time_slot.clone(),
            venue: VenueCategory::from_config(&self.venue, self.court.as_deref())?,
            wait_timeout_seconds: self.wait_timeout_seconds,
            max_poll_attempts: self.max_poll_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::CourtSide;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.date, "tomorrow");
        assert_eq!(config.max_poll_attempts, 100);
        assert!(config.headless);
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let config = Config::default();
        assert!(matches!(
            config.credentials(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_json_config_with_legacy_field_names() {
        let mut file = tempfile::Builder::new()
            .suffix(".json")
            .tempfile()
            .unwrap();
        write!(
            file,
            r#"{{
                "username": "2023123456",
                "password": "secret",
                "pay_pass": "114514",
                "date": "tomorrow",
                "time_slot": "20:00-21:00",
                "venue": "C",
                "court": "out",
                "wait_timeout_seconds": 0.5
            }}"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.pay_password, "114514");
        assert_eq!(config.wait_timeout_seconds, 0.5);

        let request = config.booking_request().unwrap();
        assert_eq!(request.venue, VenueCategory::Basketball(CourtSide::Outdoor));
        assert_eq!(request.max_poll_attempts, 100);
    }

    #[test]
    fn test_toml_config() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        write!(
            file,
            r#"
            username = "2023123456"
            password = "secret"
            venue = "badminton"
            time_slot = "14:00-15:00"
            "#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        let request = config.booking_request().unwrap();
        assert_eq!(request.venue, VenueCategory::Badminton);
        assert_eq!(request.time_slot, "14:00-15:00");
    }

    #[test]
    fn test_unknown_venue_rejected() {
        let config = Config {
            username: "u".into(),
            password: "p".into(),
            venue: "swimming".into(),
            ..Config::default()
        };
        assert!(matches!(
            config.booking_request(),
            Err(Error::Configuration(_))
        ));
    }
}
