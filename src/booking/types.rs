//! Booking domain types

use crate::{Error, Result};
use chrono::{Duration as ChronoDuration, Local, NaiveDate};

/// Target date, resolved to a concrete calendar date at call time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSpec {
    /// The current date at resolution time
    Today,
    /// The next-day release most bookings race for
    Tomorrow,
    /// An explicit calendar date
    On(NaiveDate),
}

impl DateSpec {
    /// Parse a date spec: "today", "tomorrow" or YYYY-MM-DD
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(DateSpec::Today),
            "tomorrow" => Ok(DateSpec::Tomorrow),
            other => NaiveDate::parse_from_str(other, "%Y-%m-%d")
                .map(DateSpec::On)
                .map_err(|_| {
                    Error::configuration(format!(
                        "Invalid date '{}': expected today, tomorrow or YYYY-MM-DD",
                        value
                    ))
                }),
        }
    }

    /// Resolve to the grid's date label, evaluated now
    pub fn resolve(&self) -> String {
        let date = match self {
            DateSpec::Today => Local::now().date_naive(),
            DateSpec::Tomorrow => Local::now().date_naive() + ChronoDuration::days(1),
            DateSpec::On(date) => *date,
        };
        date.format("%Y-%m-%d").to_string()
    }
}

/// Basketball court preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CourtSide {
    /// East-hall indoor court
    #[default]
    Indoor,
    /// Rooftop outdoor court
    Outdoor,
}

/// Venue category with its per-variant selection strategy
///
/// Fitness has a single resource, badminton pools interchangeable courts
/// filtered by availability, basketball has fixed named courts chosen by
/// preference. New categories extend by adding a variant and a strategy arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VenueCategory {
    /// Single-instance gym (健身房)
    Fitness,
    /// Pooled badminton courts (羽毛球)
    Badminton,
    /// Fixed basketball courts (篮球), indoor or outdoor
    Basketball(CourtSide),
}

impl VenueCategory {
    /// Parse the configured category, accepting the legacy A/B/C letters.
    /// The court preference only applies to basketball and is ignored for
    /// the other categories.
    pub fn from_config(venue: &str, court: Option<&str>) -> Result<Self> {
        match venue.trim().to_ascii_lowercase().as_str() {
            "a" | "fitness" | "gym" => Ok(VenueCategory::Fitness),
            "b" | "badminton" => Ok(VenueCategory::Badminton),
            "c" | "basketball" => Ok(VenueCategory::Basketball(CourtSide::parse(court))),
            other => Err(Error::configuration(format!(
                "Unsupported venue category '{}': expected fitness, badminton or basketball",
                other
            ))),
        }
    }

    /// Fixed portal image asset id of this category's venue tile
    pub fn tile_image_id(&self) -> &'static str {
        match self {
            VenueCategory::Fitness => "6cf6b63b970a4f4b87193d799d8092c7",
            VenueCategory::Badminton => "317a6df934914473b49996840b305987",
            VenueCategory::Basketball(_) => "eaaf3fd0bf624a328966f987fcd0ac52",
        }
    }

    /// Human-readable label for logs and outcome messages
    pub fn label(&self) -> &'static str {
        match self {
            VenueCategory::Fitness => "fitness",
            VenueCategory::Badminton => "badminton",
            VenueCategory::Basketball(CourtSide::Indoor) => "basketball (indoor)",
            VenueCategory::Basketball(CourtSide::Outdoor) => "basketball (outdoor)",
        }
    }
}

impl CourtSide {
    /// Parse a court preference; unset or unrecognized values mean indoor
    fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("out") | Some("outdoor") => CourtSide::Outdoor,
            _ => CourtSide::Indoor,
        }
    }
}

/// One booking attempt's parameters
#[derive(Debug, Clone)]
pub struct BookingRequest {
    /// Target date
    pub date: DateSpec,
    /// Time-slot label, e.g. "20:00-21:00"
    pub time_slot: String,
    /// Venue category and its selection strategy
    pub venue: VenueCategory,
    /// Per-attempt visibility wait while polling for the date, in seconds
    pub wait_timeout_seconds: f64,
    /// Upper bound on reload-and-reselect attempts
    pub max_poll_attempts: u32,
}

impl BookingRequest {
    /// Per-attempt wait as a duration
    pub fn per_attempt_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.wait_timeout_seconds)
    }
}

/// Terminal status of one full-booking invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// Booking and payment completed
    Success,
    /// Date, slot or resource was not obtainable
    NoAvailability,
    /// Session could not be established
    AuthFailed,
    /// Payment did not confirm
    PaymentFailed,
    /// Anything unanticipated
    Unknown,
}

impl OutcomeStatus {
    /// Process exit code for this status
    pub fn exit_code(&self) -> u8 {
        match self {
            OutcomeStatus::Success => 0,
            _ => 1,
        }
    }
}

/// Result of one full-booking invocation; produced exactly once
#[derive(Debug, Clone)]
pub struct BookingOutcome {
    /// Terminal status
    pub status: OutcomeStatus,
    /// Diagnostic message with enough context to reproduce
    pub message: String,
}

impl BookingOutcome {
    /// Successful outcome
    pub fn success<S: Into<String>>(message: S) -> Self {
        Self {
            status: OutcomeStatus::Success,
            message: message.into(),
        }
    }

    /// Classify a stage error into a terminal outcome
    pub fn from_error(context: &str, error: &Error) -> Self {
        let status = match error {
            Error::NotAvailable(_) | Error::SlotNotFound(_) | Error::NoResourceAvailable(_) => {
                OutcomeStatus::NoAvailability
            }
            Error::Auth(_) => OutcomeStatus::AuthFailed,
            Error::Payment(_) => OutcomeStatus::PaymentFailed,
            _ => OutcomeStatus::Unknown,
        };

        Self {
            status,
            message: format!("{}: {}", context, error),
        }
    }
}
