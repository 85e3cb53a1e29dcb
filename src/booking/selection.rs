//! Grid selection steps
//!
//! The individual page interactions the booking pipeline is composed of:
//! campus and venue-tile selection, time-slot selection, per-category
//! resource selection, submission, and the read-only leftover scan.

use crate::booking::types::{CourtSide, VenueCategory};
use crate::page::PageDriver;
use crate::portal;
use crate::{Error, Result};
use rand::Rng;
use std::time::Duration;
use tracing::{debug, info};

/// Bounded wait for the venue tiles and resource grid to render
const GRID_WAIT: Duration = Duration::from_secs(10);

/// Settling delay before scanning the slot grid
const GRID_SETTLE: Duration = Duration::from_millis(300);

/// Select the campus context (fixed for this deployment)
pub async fn select_campus(page: &dyn PageDriver) -> Result<()> {
    page.click(&portal::campus_button()).await
}

/// Select the venue-category tile
pub async fn select_venue(page: &dyn PageDriver, venue: VenueCategory) -> Result<()> {
    let tile = portal::venue_tile(venue.tile_image_id());
    page.wait_for(&tile, GRID_WAIT).await?;
    page.click(&tile).await?;
    debug!("Selected venue tile for {}", venue.label());
    Ok(())
}

/// Select the requested time slot; its absence is terminal
pub async fn select_time_slot(page: &dyn PageDriver, label: &str) -> Result<()> {
    page.click(&portal::time_slot(label)).await.map_err(|_| {
        Error::slot_not_found(format!(
            "Time slot '{}' is not offered for this venue and date",
            label
        ))
    })?;
    info!("Selected time slot {}", label);
    Ok(())
}

/// Select a physical resource according to the category's strategy
pub async fn select_resource(page: &dyn PageDriver, venue: VenueCategory) -> Result<()> {
    match venue {
        VenueCategory::Fitness => select_sole_resource(page).await,
        VenueCategory::Badminton => select_pooled_resource(page).await,
        VenueCategory::Basketball(side) => select_fixed_court(page, side).await,
    }
}

/// Fitness: a single resource, fail when it is not offered
async fn select_sole_resource(page: &dyn PageDriver) -> Result<()> {
    let resource = portal::fitness_resource();
    page.wait_for(&resource, GRID_WAIT)
        .await
        .map_err(|_| Error::no_resource("The gym resource is not available"))?;
    page.click(&resource).await?;
    info!("Selected gym resource 一楼健身房");
    Ok(())
}

/// Badminton: choose uniformly at random among the visible bookable courts.
///
/// The random tie-break spreads concurrent bookers across the pool instead
/// of having everyone race for the first-listed court.
async fn select_pooled_resource(page: &dyn PageDriver) -> Result<()> {
    let candidates = portal::badminton_candidates();
    let visible = page.query_visible(&candidates).await?;

    if visible.is_empty() {
        return Err(Error::no_resource(
            "No badminton court is bookable in this time slot",
        ));
    }

    let choice = rand::thread_rng().gen_range(0..visible.len());
    info!(
        "Randomly selected badminton court {} of {}: '{}'",
        choice + 1,
        visible.len(),
        visible[choice].text
    );

    page.click_nth(&candidates, choice).await
}

/// Basketball: deterministic court by configured preference
async fn select_fixed_court(page: &dyn PageDriver, side: CourtSide) -> Result<()> {
    page.wait_for(&portal::court_grid_ready(), GRID_WAIT)
        .await
        .map_err(|_| Error::no_resource("The basketball court grid did not render"))?;

    let court = match side {
        CourtSide::Outdoor => portal::basketball_outdoor(),
        CourtSide::Indoor => portal::basketball_indoor(),
    };

    page.click(&court)
        .await
        .map_err(|_| Error::no_resource(format!("Basketball court not selectable: {}", court)))?;

    info!(
        "Selected basketball court: {}",
        match side {
            CourtSide::Outdoor => "天台篮球4号场",
            CourtSide::Indoor => "东馆篮球3号场",
        }
    );
    Ok(())
}

/// Submit the booking
pub async fn submit_booking(page: &dyn PageDriver) -> Result<()> {
    page.click(&portal::submit_booking()).await?;
    info!("Submitted booking");
    Ok(())
}

/// Scan the currently bookable time-slot labels in display order.
///
/// Zero offered slots is an empty list, not an error.
pub async fn leftover_time_slots(page: &dyn PageDriver) -> Result<Vec<String>> {
    tokio::time::sleep(GRID_SETTLE).await;

    let slots = page
        .query_visible(&portal::bookable_slot())
        .await?
        .into_iter()
        .map(|snapshot| snapshot.text)
        .collect();

    Ok(slots)
}
