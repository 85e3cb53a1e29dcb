//! Booking orchestrator
//!
//! Runs the booking pipeline as an explicit ordered list of stages, each of
//! which requires the prior stage's success. Any stage failure aborts the
//! pipeline; there is no whole-pipeline retry (only stage 3's date poller
//! retries internally). A half-submitted order is surfaced, never retried,
//! to avoid double-booking or duplicate charges.

use super::payment::PaymentResolver;
use super::poller::AvailabilityPoller;
use super::selection;
use super::types::{BookingOutcome, BookingRequest};
use crate::session::AuthenticatedSession;
use crate::Result;
use tracing::{error, info};

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Campus/location context selection
    Campus,
    /// Venue category tile selection
    Venue,
    /// Date acquisition via the availability poller
    Date,
    /// Time-slot selection
    TimeSlot,
    /// Physical resource selection
    Resource,
    /// Booking submission
    Submit,
    /// Payment resolution
    Payment,
}

impl Stage {
    /// The pipeline order
    pub const ORDER: [Stage; 7] = [
        Stage::Campus,
        Stage::Venue,
        Stage::Date,
        Stage::TimeSlot,
        Stage::Resource,
        Stage::Submit,
        Stage::Payment,
    ];

    /// Stage name for logging and outcome messages
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Campus => "campus selection",
            Stage::Venue => "venue selection",
            Stage::Date => "date acquisition",
            Stage::TimeSlot => "time-slot selection",
            Stage::Resource => "resource selection",
            Stage::Submit => "booking submission",
            Stage::Payment => "payment",
        }
    }
}

/// Sequences the booking pipeline against an authenticated session
pub struct BookingOrchestrator {
    poller: AvailabilityPoller,
    payment: PaymentResolver,
}

impl BookingOrchestrator {
    /// Create an orchestrator for one request's polling bounds
    pub fn new(request: &BookingRequest) -> Self {
        Self {
            poller: AvailabilityPoller::new(
                request.per_attempt_timeout(),
                request.max_poll_attempts,
            ),
            payment: PaymentResolver::new(),
        }
    }

    /// Replace the payment resolver (tests shorten its waits)
    pub fn with_payment(mut self, payment: PaymentResolver) -> Self {
        self.payment = payment;
        self
    }

    /// Run the full pipeline and classify the result.
    ///
    /// Produces exactly one outcome; every stage error is caught here,
    /// logged with its stage context, and converted.
    pub async fn book(
        &self,
        session: &AuthenticatedSession,
        request: &BookingRequest,
    ) -> BookingOutcome {
        for stage in Stage::ORDER {
            info!("Stage: {}", stage.name());

            if let Err(e) = self.run_stage(stage, session, request).await {
                error!(
                    "Booking failed at {} (venue {}, slot {}): {}",
                    stage.name(),
                    request.venue.label(),
                    request.time_slot,
                    e
                );
                return BookingOutcome::from_error(stage.name(), &e);
            }
        }

        BookingOutcome::success(format!(
            "Booked {} {} for {}",
            request.venue.label(),
            request.time_slot,
            request.date.resolve()
        ))
    }

    async fn run_stage(
        &self,
        stage: Stage,
        session: &AuthenticatedSession,
        request: &BookingRequest,
    ) -> Result<()> {
        let page = session.page().as_ref();

        match stage {
            Stage::Campus => selection::select_campus(page).await,
            Stage::Venue => selection::select_venue(page, request.venue).await,
            Stage::Date => self
                .poller
                .acquire_date(page, &request.date, request.venue)
                .await
                .map(|_| ()),
            Stage::TimeSlot => selection::select_time_slot(page, &request.time_slot).await,
            Stage::Resource => selection::select_resource(page, request.venue).await,
            Stage::Submit => selection::submit_booking(page).await,
            Stage::Payment => self.payment.pay(session).await,
        }
    }

    /// Read-only leftover scan: campus, venue and date selection followed by
    /// a visibility scan of the slot grid. Never mutates booking state.
    pub async fn query_leftovers(
        &self,
        session: &AuthenticatedSession,
        request: &BookingRequest,
    ) -> Result<Vec<String>> {
        let page = session.page().as_ref();

        selection::select_campus(page).await?;
        selection::select_venue(page, request.venue).await?;
        self.poller
            .acquire_date(page, &request.date, request.venue)
            .await?;

        selection::leftover_time_slots(page).await
    }
}
