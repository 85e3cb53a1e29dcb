//! Payment resolver
//!
//! The portal exposes two materially different payment UIs depending on the
//! account's balance state, which is not known in advance: an order fully
//! covered by the standing balance shows a single pay action, while a
//! partially funded order needs the funded-account flow with its virtual
//! keypad. The resolver branches on live page state.

use crate::page::PageDriver;
use crate::portal;
use crate::session::AuthenticatedSession;
use crate::{Error, Result};
use std::time::Duration;
use tracing::info;

/// Bounded wait for payment views and the success indicator
const PAYMENT_WAIT: Duration = Duration::from_secs(10);

/// Detects the required payment method and drives the matching flow
#[derive(Debug, Clone)]
pub struct PaymentResolver {
    wait: Duration,
}

impl Default for PaymentResolver {
    fn default() -> Self {
        Self { wait: PAYMENT_WAIT }
    }
}

impl PaymentResolver {
    /// Create a resolver with the default bounded waits
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the bounded wait (tests use short ones)
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Complete payment for the freshly submitted order
    pub async fn pay(&self, session: &AuthenticatedSession) -> Result<()> {
        let page = session.page().as_ref();

        page.click(&portal::unpaid_order())
            .await
            .map_err(|e| Error::payment(format!("Could not open the order payment view: {}", e)))?;

        page.wait_for(&portal::pay_action(), self.wait)
            .await
            .map_err(|e| Error::payment(format!("No pay action appeared: {}", e)))?;

        let pay_actions = page.query_visible(&portal::pay_action()).await?;

        if pay_actions.len() == 1 {
            // The order is fully covered by the standing balance
            info!("Order covered by account balance, paying directly");
            page.click(&portal::balance_pay())
                .await
                .map_err(|e| Error::payment(format!("Balance payment not clickable: {}", e)))?;
            self.confirm(page).await
        } else {
            info!(
                "Order requires funded-account payment ({} pay actions visible)",
                pay_actions.len()
            );
            self.pay_with_fund(page, session.pay_password()).await
        }
    }

    /// Funded-account flow: secondary payment view, confirmation step, then
    /// the payment secret entered digit by digit on the virtual keypad
    async fn pay_with_fund(&self, page: &dyn PageDriver, secret: &str) -> Result<()> {
        if secret.is_empty() {
            return Err(Error::payment(
                "The order requires the funded-account flow but no payment secret is configured",
            ));
        }

        let popup = page
            .click_expect_popup(&portal::fund_pay())
            .await
            .map_err(|e| Error::payment(format!("Funded payment view did not open: {}", e)))?;

        popup
            .wait_for(&portal::payment_next_step(), self.wait)
            .await
            .map_err(|e| Error::payment(format!("Confirmation step did not appear: {}", e)))?;
        popup.click(&portal::payment_next_step()).await?;

        popup
            .wait_for(&portal::keypad_input(), self.wait)
            .await
            .map_err(|e| Error::payment(format!("Keypad input did not appear: {}", e)))?;
        popup.click(&portal::keypad_input()).await?;

        // The keypad takes one digit at a time; there is no text field
        for digit in secret.chars() {
            popup
                .click(&portal::keypad_digit(digit))
                .await
                .map_err(|e| Error::payment(format!("Keypad digit not clickable: {}", e)))?;
        }

        popup.click(&portal::keypad_confirm()).await?;

        self.confirm(popup.as_ref()).await
    }

    /// Require the success indicator within the bounded wait
    async fn confirm(&self, page: &dyn PageDriver) -> Result<()> {
        page.wait_for(&portal::payment_success(), self.wait)
            .await
            .map_err(|_| {
                Error::payment(format!(
                    "Payment success indicator did not appear within {:?}",
                    self.wait
                ))
            })?;

        info!("Payment confirmed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{MockPage, Selector};
    use crate::session::{Credentials, MemorySessionStore, SessionArtifacts, SessionManager};
    use std::sync::Arc;

    async fn session_for(page: Arc<MockPage>, pay_password: &str) -> AuthenticatedSession {
        // A live saved session lets establishment take the artifact fast path
        page.add_element(portal::campus_button(), "粤海校区", true);
        let artifacts = SessionArtifacts {
            cookies: vec![crate::cdp::Cookie {
                name: "JSESSIONID".into(),
                value: "abc".into(),
                domain: "ehall.szu.edu.cn".into(),
                path: "/".into(),
                expires: -1.0,
                http_only: true,
                secure: false,
            }],
            storage: Default::default(),
        };
        let manager = SessionManager::new(Arc::new(MemorySessionStore::with_artifacts(artifacts)))
            .with_waits(Duration::from_millis(20), Duration::from_millis(20));
        manager
            .establish(
                page,
                &Credentials {
                    username: "u".into(),
                    password: "p".into(),
                    pay_password: pay_password.into(),
                },
            )
            .await
            .unwrap()
    }

    fn resolver() -> PaymentResolver {
        PaymentResolver::new().with_wait(Duration::from_millis(30))
    }

    fn order_page() -> Arc<MockPage> {
        let page = MockPage::new();
        page.add_element(portal::unpaid_order(), "未支付", true);
        page
    }

    fn keypad_popup(secret: &str) -> Arc<MockPage> {
        let popup = MockPage::new();
        popup.add_element(portal::payment_next_step(), "下一步", true);
        popup.add_element(portal::keypad_input(), "", true);
        for digit in secret.chars() {
            popup.add_element(portal::keypad_digit(digit), "", true);
        }
        popup.add_element(portal::keypad_confirm(), "确认", true);
        popup.add_element(portal::payment_success(), "支付成功", true);
        popup
    }

    #[tokio::test]
    async fn test_balance_covered_order_skips_keypad() {
        let page = order_page();
        page.add_element(portal::pay_action(), "(剩余金额)支付", true);
        page.add_element(portal::balance_pay(), "(剩余金额)支付", true);
        page.add_element(portal::payment_success(), "支付成功", true);

        let session = session_for(page.clone(), "114514").await;
        resolver().pay(&session).await.unwrap();

        let clicks = page.clicks();
        assert!(clicks.iter().any(|(sel, _)| *sel == portal::balance_pay()));
        assert!(!clicks.iter().any(|(sel, _)| *sel == portal::fund_pay()));
        assert!(!clicks
            .iter()
            .any(|(sel, _)| matches!(sel, Selector::Css(css) if css.starts_with(".key-"))));
    }

    #[tokio::test]
    async fn test_partially_funded_order_drives_keypad() {
        let page = order_page();
        page.add_element(portal::pay_action(), "(剩余金额)支付", true);
        page.add_element(portal::pay_action(), "(体育经费)支付", true);
        page.add_element(portal::balance_pay(), "(剩余金额)支付", true);
        page.add_element(portal::fund_pay(), "(体育经费)支付", true);

        let popup = keypad_popup("114514");
        page.set_popup(portal::fund_pay(), popup.clone());

        let session = session_for(page.clone(), "114514").await;
        resolver().pay(&session).await.unwrap();

        // The bare pay action was never clicked directly
        assert!(!page
            .clicks()
            .iter()
            .any(|(sel, _)| *sel == portal::balance_pay()));

        // Every digit of the secret was keyed in order, then confirmed
        let popup_clicks = popup.clicks();
        let digit_clicks: Vec<_> = popup_clicks
            .iter()
            .filter_map(|(sel, _)| match sel {
                Selector::Css(css) if css.starts_with(".key-") => Some(css.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            digit_clicks,
            vec![".key-1", ".key-1", ".key-4", ".key-5", ".key-1", ".key-4"]
        );
        assert!(popup_clicks
            .iter()
            .any(|(sel, _)| *sel == portal::keypad_confirm()));
    }

    #[tokio::test]
    async fn test_missing_success_indicator_is_payment_error() {
        let page = order_page();
        page.add_element(portal::pay_action(), "(剩余金额)支付", true);
        page.add_element(portal::balance_pay(), "(剩余金额)支付", true);

        let session = session_for(page, "114514").await;
        let result = resolver().pay(&session).await;

        assert!(matches!(result, Err(Error::Payment(_))));
    }

    #[tokio::test]
    async fn test_funded_flow_without_secret_fails_before_clicking() {
        let page = order_page();
        page.add_element(portal::pay_action(), "(剩余金额)支付", true);
        page.add_element(portal::pay_action(), "(体育经费)支付", true);
        page.add_element(portal::fund_pay(), "(体育经费)支付", true);

        let session = session_for(page.clone(), "").await;
        let result = resolver().pay(&session).await;

        assert!(matches!(result, Err(Error::Payment(_))));
        assert!(!page
            .clicks()
            .iter()
            .any(|(sel, _)| *sel == portal::fund_pay()));
    }
}
