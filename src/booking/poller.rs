//! Availability poller
//!
//! The portal releases next-day inventory at an unannounced moment and the
//! grid is regenerated server-side, so the only way to catch the transition
//! from "not yet listed" to "listed" is to reload, re-run the venue
//! selection, and look again. The loop is strictly bounded: it terminates
//! within `max_attempts` x the per-attempt timeout.

use super::selection;
use super::types::{DateSpec, VenueCategory};
use crate::page::PageDriver;
use crate::portal;
use crate::{Error, Result};
use std::time::Duration;
use tracing::{debug, info};

/// Bounded reload-and-reselect poller for the target date cell
#[derive(Debug, Clone)]
pub struct AvailabilityPoller {
    per_attempt_timeout: Duration,
    max_attempts: u32,
}

impl AvailabilityPoller {
    /// Create a poller with the configured bounds
    pub fn new(per_attempt_timeout: Duration, max_attempts: u32) -> Self {
        Self {
            per_attempt_timeout,
            max_attempts,
        }
    }

    /// Wait for the target date's grid cell and click it.
    ///
    /// Attempt 0 operates on the current page state (the venue has just been
    /// selected); attempts after that reload and re-run the idempotent
    /// campus/venue setup before looking again. Returns the resolved date
    /// label on success, fails with `NotAvailable` once the budget is spent.
    pub async fn acquire_date(
        &self,
        page: &dyn PageDriver,
        date: &DateSpec,
        venue: VenueCategory,
    ) -> Result<String> {
        let date_label = date.resolve();
        let cell = portal::date_cell(&date_label);

        info!(
            "Polling for date {} ({} attempts, {:?} each)",
            date_label, self.max_attempts, self.per_attempt_timeout
        );

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                page.reload().await?;
                page.wait_for_load().await?;
                selection::select_campus(page).await?;
                selection::select_venue(page, venue).await?;
            }

            match page.wait_for(&cell, self.per_attempt_timeout).await {
                Ok(_) => {
                    page.click(&cell).await?;
                    info!(
                        "Date {} selected on attempt {} of {}",
                        date_label,
                        attempt + 1,
                        self.max_attempts
                    );
                    return Ok(date_label);
                }
                Err(Error::Timeout(_)) | Err(Error::ElementNotFound(_)) => {
                    debug!(
                        "Date {} not listed yet (attempt {} of {})",
                        date_label,
                        attempt + 1,
                        self.max_attempts
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::not_available(format!(
            "Date {} did not appear within {} attempts",
            date_label, self.max_attempts
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{MockPage, Selector};
    use chrono::NaiveDate;

    fn explicit_date() -> DateSpec {
        DateSpec::On(NaiveDate::from_ymd_opt(2026, 8, 9).unwrap())
    }

    fn date_cell() -> Selector {
        portal::date_cell("2026-08-09")
    }

    fn venue_setup(page: &MockPage) {
        page.add_element(portal::campus_button(), "粤海校区", true);
        page.add_element(
            portal::venue_tile(VenueCategory::Badminton.tile_image_id()),
            "",
            true,
        );
    }

    #[tokio::test]
    async fn test_immediate_hit_does_not_reload() {
        let page = MockPage::new();
        venue_setup(&page);
        page.add_element(date_cell(), "2026-08-09", true);

        let poller = AvailabilityPoller::new(Duration::from_millis(10), 100);
        let label = poller
            .acquire_date(page.as_ref(), &explicit_date(), VenueCategory::Badminton)
            .await
            .unwrap();

        assert_eq!(label, "2026-08-09");
        assert_eq!(page.reload_count(), 0);
        assert_eq!(page.clicks(), vec![(date_cell(), 0)]);
    }

    #[tokio::test]
    async fn test_late_release_is_found_after_reloads() {
        let page = MockPage::new();
        venue_setup(&page);
        page.appear_after_reloads(date_cell(), "2026-08-09", 3);

        let poller = AvailabilityPoller::new(Duration::from_millis(10), 100);
        poller
            .acquire_date(page.as_ref(), &explicit_date(), VenueCategory::Badminton)
            .await
            .unwrap();

        assert_eq!(page.reload_count(), 3);
        // Each retry re-ran the idempotent campus/venue setup
        let campus_clicks = page
            .clicks()
            .into_iter()
            .filter(|(sel, _)| *sel == portal::campus_button())
            .count();
        assert_eq!(campus_clicks, 3);
    }

    #[tokio::test]
    async fn test_exhausted_budget_is_not_available() {
        let page = MockPage::new();
        venue_setup(&page);

        let poller = AvailabilityPoller::new(Duration::from_millis(5), 4);
        let result = poller
            .acquire_date(page.as_ref(), &explicit_date(), VenueCategory::Badminton)
            .await;

        match result {
            Err(Error::NotAvailable(message)) => {
                assert!(message.contains("2026-08-09"));
                assert!(message.contains("4 attempts"));
            }
            other => panic!("Expected NotAvailable, got {:?}", other.map(|_| ())),
        }

        // Attempt 0 plus three retries
        assert_eq!(page.reload_count(), 3);
        assert!(!page.clicks().iter().any(|(sel, _)| *sel == date_cell()));
    }

    #[tokio::test]
    async fn test_termination_within_budget() {
        let page = MockPage::new();
        venue_setup(&page);

        let poller = AvailabilityPoller::new(Duration::from_millis(5), 10);
        let started = std::time::Instant::now();
        let result = poller
            .acquire_date(page.as_ref(), &explicit_date(), VenueCategory::Badminton)
            .await;

        assert!(result.is_err());
        // Generous envelope over max_attempts x per-attempt timeout
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
