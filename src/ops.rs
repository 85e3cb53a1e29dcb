//! Entry operations
//!
//! The three orchestration modes: full booking, login-only session warm-up,
//! and the read-only leftover-slot query. Each opens one browser session,
//! runs its flow, and tears the session down on every exit path.

use crate::booking::{BookingOrchestrator, BookingOutcome};
use crate::cdp::{CdpBrowser, CdpBrowserImpl, LaunchOptions};
use crate::config::Config;
use crate::page::{CdpPage, PageDriver};
use crate::session::{FsSessionStore, SessionManager, SessionStore};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Launch or attach to a browser and open a fresh page
async fn open_portal_page(config: &Config) -> Result<(Arc<CdpBrowserImpl>, Arc<CdpPage>)> {
    let browser = match &config.cdp_endpoint {
        Some(endpoint) => CdpBrowserImpl::connect(endpoint.clone()),
        None => {
            let options = LaunchOptions {
                headless: config.headless,
                executable_path: config.chrome_path.clone(),
                user_data_dir: Some(config.state_dir.join("browser-profile")),
                port: config.debug_port,
            };
            CdpBrowserImpl::launch(&options).await?
        }
    };

    let browser = Arc::new(browser);
    let page = CdpPage::open(Arc::clone(&browser) as Arc<dyn CdpBrowser>, "about:blank").await?;

    Ok((browser, page))
}

/// Close the page and browser; best effort on every exit path
async fn teardown(browser: &CdpBrowserImpl, page: &CdpPage) {
    if let Err(e) = page.close().await {
        warn!("Failed to close page: {}", e);
    }
    if let Err(e) = browser.close().await {
        warn!("Failed to close browser: {}", e);
    }
}

fn session_manager(config: &Config) -> SessionManager {
    let store: Arc<dyn SessionStore> = Arc::new(FsSessionStore::new(&config.state_dir));
    SessionManager::new(store)
}

/// Full booking: authenticate, race the pipeline, pay.
///
/// Always produces exactly one outcome; errors before the pipeline (missing
/// configuration, browser startup) are the only ones surfaced as `Err`.
pub async fn run_booking(config: &Config) -> Result<BookingOutcome> {
    let credentials = config.credentials()?;
    let request = config.booking_request()?;

    info!(
        "Booking {} {} on {}",
        request.venue.label(),
        request.time_slot,
        request.date.resolve()
    );

    let (browser, page) = open_portal_page(config).await?;

    let outcome = match session_manager(config)
        .establish(Arc::clone(&page) as Arc<dyn PageDriver>, &credentials)
        .await
    {
        Ok(session) => {
            BookingOrchestrator::new(&request)
                .book(&session, &request)
                .await
        }
        Err(e) => BookingOutcome::from_error("session establishment", &e),
    };

    teardown(&browser, &page).await;
    Ok(outcome)
}

/// Login-only: establish the session, then hold it open until the browser
/// goes away or the process is interrupted. On failure it reports and exits
/// without holding anything open.
pub async fn run_login(config: &Config) -> Result<()> {
    let credentials = config.credentials()?;
    let (browser, page) = open_portal_page(config).await?;

    let result = session_manager(config)
        .establish(Arc::clone(&page) as Arc<dyn PageDriver>, &credentials)
        .await;

    match result {
        Ok(session) => {
            info!("Session established; holding it open (Ctrl-C to exit)");
            hold_open(session.page().as_ref()).await;
            teardown(&browser, &page).await;
            Ok(())
        }
        Err(e) => {
            teardown(&browser, &page).await;
            Err(e)
        }
    }
}

/// Keep the session warm until the browser disappears or Ctrl-C arrives
async fn hold_open(page: &dyn PageDriver) {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, closing session");
                break;
            }
            _ = tokio::time::sleep(Duration::from_secs(1)) => {
                if page.title().await.is_err() {
                    info!("Browser went away, exiting");
                    break;
                }
            }
        }
    }
}

/// Leftover query: authenticate and scan the bookable slots for the
/// configured date and venue. A date that never appears is reported as an
/// empty list with a logged reason; connectivity and auth failures still
/// error.
pub async fn run_query(config: &Config) -> Result<Vec<String>> {
    let credentials = config.credentials()?;
    let request = config.booking_request()?;

    let (browser, page) = open_portal_page(config).await?;

    let result = match session_manager(config)
        .establish(Arc::clone(&page) as Arc<dyn PageDriver>, &credentials)
        .await
    {
        Ok(session) => {
            BookingOrchestrator::new(&request)
                .query_leftovers(&session, &request)
                .await
        }
        Err(e) => Err(e),
    };

    teardown(&browser, &page).await;

    match result {
        Ok(slots) => {
            info!("Found {} bookable slots", slots.len());
            Ok(slots)
        }
        Err(Error::NotAvailable(reason)) => {
            warn!("Nothing to query: {}", reason);
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::MockPage;

    #[tokio::test(start_paused = true)]
    async fn test_hold_open_ends_when_browser_goes_away() {
        let page = MockPage::new();
        page.set_title("体育馆预约");
        assert_eq!(page.title().await.unwrap(), "体育馆预约");

        page.detach();
        // The watchdog notices the dead page on its next tick
        hold_open(page.as_ref()).await;
    }

    #[tokio::test]
    async fn test_booking_requires_credentials_before_browser_work() {
        let config = Config::default();
        let result = run_booking(&config).await;
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn test_query_rejects_invalid_venue_before_browser_work() {
        let config = Config {
            username: "u".into(),
            password: "p".into(),
            venue: "curling".into(),
            ..Config::default()
        };
        let result = run_query(&config).await;
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
