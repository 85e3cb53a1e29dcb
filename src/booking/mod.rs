//! Booking layer
//!
//! The date-availability poller, the staged booking pipeline, the
//! per-category resource selection strategies, and the payment resolver.

pub mod orchestrator;
pub mod payment;
pub mod poller;
pub mod selection;
pub mod types;

pub use orchestrator::{BookingOrchestrator, Stage};
pub use payment::PaymentResolver;
pub use poller::AvailabilityPoller;
pub use types::{
    BookingOutcome, BookingRequest, CourtSide, DateSpec, OutcomeStatus, VenueCategory,
};
