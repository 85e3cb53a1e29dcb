//! End-to-end booking flow tests against the scripted mock page
//!
//! These exercise the public API the way the entry operations wire it
//! together: session establishment through the session manager, then the
//! staged pipeline or the leftover query, with every interaction journaled
//! by the mock.

use slot_chaser::booking::{
    BookingOrchestrator, BookingRequest, CourtSide, DateSpec, OutcomeStatus, PaymentResolver,
    VenueCategory,
};
use slot_chaser::page::MockPage;
use slot_chaser::portal;
use slot_chaser::session::{
    AuthenticatedSession, Credentials, MemorySessionStore, SessionArtifacts, SessionManager,
    SessionStore,
};
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;

fn credentials() -> Credentials {
    Credentials {
        username: "2023123456".into(),
        password: "hunter2".into(),
        pay_password: "114514".into(),
    }
}

fn request(venue: VenueCategory) -> BookingRequest {
    BookingRequest {
        date: DateSpec::On(NaiveDate::from_ymd_opt(2026, 8, 9).unwrap()),
        time_slot: "20:00-21:00".into(),
        venue,
        wait_timeout_seconds: 0.01,
        max_poll_attempts: 5,
    }
}

fn fast_manager(store: Arc<dyn SessionStore>) -> SessionManager {
    SessionManager::new(store).with_waits(Duration::from_millis(20), Duration::from_millis(20))
}

fn orchestrator(request: &BookingRequest) -> BookingOrchestrator {
    BookingOrchestrator::new(request)
        .with_payment(PaymentResolver::new().with_wait(Duration::from_millis(30)))
}

fn live_artifacts() -> SessionArtifacts {
    SessionArtifacts {
        cookies: vec![slot_chaser::cdp::Cookie {
            name: "JSESSIONID".into(),
            value: "abc".into(),
            domain: "ehall.szu.edu.cn".into(),
            path: "/".into(),
            expires: -1.0,
            http_only: true,
            secure: false,
        }],
        storage: Default::default(),
    }
}

async fn establish(page: Arc<MockPage>) -> AuthenticatedSession {
    // Saved artifacts plus a visible marker: the fast path applies
    let store = Arc::new(MemorySessionStore::with_artifacts(live_artifacts()));
    fast_manager(store)
        .establish(page, &credentials())
        .await
        .expect("session establishment")
}

/// A portal where a basketball booking can run to a paid completion
fn basketball_portal() -> Arc<MockPage> {
    let page = MockPage::new();
    page.add_element(portal::campus_button(), "粤海校区", true);
    page.add_element(
        portal::venue_tile(VenueCategory::Basketball(CourtSide::Outdoor).tile_image_id()),
        "",
        true,
    );
    page.add_element(portal::time_slot("20:00-21:00"), "20:00-21:00 可预约", true);
    page.add_element(portal::court_grid_ready(), "号场(", true);
    page.add_element(portal::basketball_outdoor(), "天台篮球4号场", true);
    page.add_element(portal::basketball_indoor(), "东馆篮球3号场", true);
    page.add_element(portal::submit_booking(), "提交预约", true);
    page.add_element(portal::unpaid_order(), "未支付", true);
    page.add_element(portal::pay_action(), "(剩余金额)支付", true);
    page.add_element(portal::balance_pay(), "(剩余金额)支付", true);
    page.add_element(portal::payment_success(), "支付成功", true);
    page
}

#[tokio::test]
async fn late_release_booking_succeeds_end_to_end() {
    let page = basketball_portal();
    // The next-day grid only materializes after two reloads
    page.appear_after_reloads(portal::date_cell("2026-08-09"), "2026-08-09", 2);

    let session = establish(page.clone()).await;
    let request = request(VenueCategory::Basketball(CourtSide::Outdoor));

    let outcome = orchestrator(&request).book(&session, &request).await;

    assert_eq!(outcome.status, OutcomeStatus::Success);
    assert_eq!(page.reload_count(), 2);

    // The pipeline ran in order: date, slot, court, submit, payment
    let clicks = page.clicks();
    let position = |sel: &slot_chaser::page::Selector| {
        clicks
            .iter()
            .position(|(s, _)| s == sel)
            .unwrap_or_else(|| panic!("never clicked: {}", sel))
    };
    assert!(position(&portal::date_cell("2026-08-09")) < position(&portal::time_slot("20:00-21:00")));
    assert!(position(&portal::time_slot("20:00-21:00")) < position(&portal::basketball_outdoor()));
    assert!(position(&portal::basketball_outdoor()) < position(&portal::submit_booking()));
    assert!(position(&portal::submit_booking()) < position(&portal::balance_pay()));
}

#[tokio::test]
async fn sold_out_date_terminates_with_no_availability() {
    let page = MockPage::new();
    page.add_element(portal::campus_button(), "粤海校区", true);
    page.add_element(
        portal::venue_tile(VenueCategory::Fitness.tile_image_id()),
        "",
        true,
    );

    let session = establish(page.clone()).await;
    let request = request(VenueCategory::Fitness);

    let started = std::time::Instant::now();
    let outcome = orchestrator(&request).book(&session, &request).await;

    assert_eq!(outcome.status, OutcomeStatus::NoAvailability);
    // Bounded by max_poll_attempts x per-attempt timeout, with margin
    assert!(started.elapsed() < Duration::from_secs(2));
    // Nothing downstream of the date stage was touched
    assert!(!page
        .clicks()
        .iter()
        .any(|(sel, _)| *sel == portal::submit_booking()));
}

#[tokio::test]
async fn session_reuse_skips_credentials_on_second_run() {
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());

    // First run: no artifacts, credential login required
    let first_page = MockPage::new();
    first_page.add_element(portal::username_input(), "", true);
    first_page.add_element(portal::password_input(), "", true);
    first_page.add_element(portal::remember_me_checkbox(), "", true);
    first_page.add_element(portal::login_submit(), "登录", true);
    first_page.add_element(portal::campus_button(), "粤海校区", true);
    first_page.reveal_on_click(portal::login_submit(), portal::campus_button());
    first_page.seed_cookies(vec![slot_chaser::cdp::Cookie {
        name: "JSESSIONID".into(),
        value: "fresh".into(),
        domain: "ehall.szu.edu.cn".into(),
        path: "/".into(),
        expires: -1.0,
        http_only: true,
        secure: false,
    }]);

    fast_manager(Arc::clone(&store))
        .establish(first_page.clone(), &credentials())
        .await
        .expect("credential login");
    assert!(!first_page.fills().is_empty());

    // Second run: artifacts restore a live session, no credential fill
    let second_page = MockPage::new();
    second_page.add_element(portal::campus_button(), "粤海校区", true);

    fast_manager(store)
        .establish(second_page.clone(), &credentials())
        .await
        .expect("artifact fast path");

    assert!(second_page.fills().is_empty());
    assert_eq!(second_page.cookie_jar().len(), 1);
    assert_eq!(second_page.cookie_jar()[0].value, "fresh");
}

#[tokio::test]
async fn leftover_query_roundtrip() {
    let page = MockPage::new();
    page.add_element(portal::campus_button(), "粤海校区", true);
    page.add_element(
        portal::venue_tile(VenueCategory::Badminton.tile_image_id()),
        "",
        true,
    );
    page.add_element(portal::date_cell("2026-08-09"), "2026-08-09", true);
    page.add_element(portal::bookable_slot(), "14:00-15:00 可预约", true);
    page.add_element(portal::bookable_slot(), "15:00-16:00 可预约", true);

    let session = establish(page.clone()).await;
    let request = request(VenueCategory::Badminton);

    let slots = orchestrator(&request)
        .query_leftovers(&session, &request)
        .await
        .expect("query");

    assert_eq!(slots.len(), 2);
    assert!(slots[0].starts_with("14:00-15:00"));
    assert!(slots[1].starts_with("15:00-16:00"));
}

#[tokio::test]
async fn leftover_query_with_nothing_bookable_is_empty_not_error() {
    let page = MockPage::new();
    page.add_element(portal::campus_button(), "粤海校区", true);
    page.add_element(
        portal::venue_tile(VenueCategory::Badminton.tile_image_id()),
        "",
        true,
    );
    page.add_element(portal::date_cell("2026-08-09"), "2026-08-09", true);

    let session = establish(page.clone()).await;
    let request = request(VenueCategory::Badminton);

    let slots = orchestrator(&request)
        .query_leftovers(&session, &request)
        .await
        .expect("query");

    assert!(slots.is_empty());
}

#[tokio::test]
async fn funded_payment_path_completes_booking() {
    let page = basketball_portal();
    page.add_element(portal::date_cell("2026-08-09"), "2026-08-09", true);
    // A second visible pay action switches the resolver to the funded flow
    page.add_element(portal::pay_action(), "(体育经费)支付", true);
    page.add_element(portal::fund_pay(), "(体育经费)支付", true);

    let popup = MockPage::new();
    popup.add_element(portal::payment_next_step(), "下一步", true);
    popup.add_element(portal::keypad_input(), "", true);
    for digit in "114514".chars() {
        popup.add_element(portal::keypad_digit(digit), "", true);
    }
    popup.add_element(portal::keypad_confirm(), "确认", true);
    popup.add_element(portal::payment_success(), "支付成功", true);
    page.set_popup(portal::fund_pay(), popup.clone());

    let session = establish(page.clone()).await;
    let request = request(VenueCategory::Basketball(CourtSide::Outdoor));

    let outcome = orchestrator(&request).book(&session, &request).await;

    assert_eq!(outcome.status, OutcomeStatus::Success);
    // The keypad was driven in the popup, not the order page
    assert!(popup
        .clicks()
        .iter()
        .any(|(sel, _)| *sel == portal::keypad_confirm()));
    assert!(!page
        .clicks()
        .iter()
        .any(|(sel, _)| *sel == portal::balance_pay()));
}
