//! Session establishment
//!
//! Produces an authenticated portal session, preferring restored session
//! artifacts and falling back to credential sign-in. Freshly established
//! sessions are persisted for later fast-path reuse.

use super::store::{SessionArtifacts, SessionStore};
use crate::page::PageDriver;
use crate::portal;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default bounded wait for the login-confirmed marker
const MARKER_WAIT: Duration = Duration::from_secs(5);

/// Default bounded wait for the login form to become interactable
const FORM_WAIT: Duration = Duration::from_secs(10);

/// Account credentials
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// Account identifier (student number)
    pub username: String,
    /// Account secret
    pub password: String,
    /// Payment secret for the funded-account keypad flow
    pub pay_password: String,
}

/// A live page bound to one authenticated identity
///
/// Owned by the caller for the duration of one operation and torn down at
/// operation end.
pub struct AuthenticatedSession {
    page: Arc<dyn PageDriver>,
    credentials: Credentials,
}

impl AuthenticatedSession {
    /// The authenticated page
    pub fn page(&self) -> &Arc<dyn PageDriver> {
        &self.page
    }

    /// Payment secret for this identity
    pub fn pay_password(&self) -> &str {
        &self.credentials.pay_password
    }
}

/// Session manager: artifact fast path with credential fallback
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    marker_wait: Duration,
    form_wait: Duration,
}

impl SessionManager {
    /// Create a manager over the given artifact store
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            marker_wait: MARKER_WAIT,
            form_wait: FORM_WAIT,
        }
    }

    /// Override the bounded waits (tests use short ones)
    pub fn with_waits(mut self, marker_wait: Duration, form_wait: Duration) -> Self {
        self.marker_wait = marker_wait;
        self.form_wait = form_wait;
        self
    }

    /// Establish an authenticated session on the given page.
    ///
    /// Restored artifacts are tried first; when they still carry a valid
    /// session no credentials are submitted at all. Failure is surfaced once
    /// and not retried internally.
    pub async fn establish(
        &self,
        page: Arc<dyn PageDriver>,
        credentials: &Credentials,
    ) -> Result<AuthenticatedSession> {
        if self.try_restore(page.as_ref()).await? {
            info!("Session restored from saved artifacts");
            return Ok(AuthenticatedSession {
                page,
                credentials: credentials.clone(),
            });
        }

        info!("Saved session unavailable or stale, signing in with credentials");
        self.credential_login(page.as_ref(), credentials).await?;

        match self.capture_artifacts(page.as_ref()).await {
            Ok(artifacts) => self.store.save(&artifacts)?,
            // A failed capture costs the next run its fast path but does not
            // invalidate the session we just established
            Err(e) => warn!("Could not capture session artifacts: {}", e),
        }

        Ok(AuthenticatedSession {
            page,
            credentials: credentials.clone(),
        })
    }

    /// Try the artifact fast path; Ok(true) means the session is live
    async fn try_restore(&self, page: &dyn PageDriver) -> Result<bool> {
        let artifacts = match self.store.load()? {
            Some(artifacts) if !artifacts.cookies.is_empty() => artifacts,
            _ => {
                debug!("No saved session artifacts");
                return Ok(false);
            }
        };

        page.set_cookies(&artifacts.cookies).await?;
        page.navigate(portal::PORTAL_URL).await?;
        page.wait_for_load().await?;

        if !artifacts.storage.is_empty() {
            page.restore_local_storage(&artifacts.storage).await?;
        }

        Ok(self.is_logged_in(page).await)
    }

    /// Sign in with identifier and secret
    async fn credential_login(&self, page: &dyn PageDriver, credentials: &Credentials) -> Result<()> {
        page.navigate(portal::PORTAL_URL).await?;
        page.wait_for_load().await?;

        for selector in [
            portal::username_input(),
            portal::password_input(),
            portal::login_submit(),
        ] {
            page.wait_for(&selector, self.form_wait)
                .await
                .map_err(|e| Error::auth(format!("Login form did not appear: {}", e)))?;
        }

        page.fill(&portal::username_input(), &credentials.username)
            .await?;
        page.fill(&portal::password_input(), &credentials.password)
            .await?;
        page.set_checked(&portal::remember_me_checkbox(), true)
            .await?;
        page.click(&portal::login_submit()).await?;
        page.wait_for_load().await?;

        if self.is_logged_in(page).await {
            info!("Credential sign-in succeeded");
            Ok(())
        } else {
            Err(Error::auth(
                "Login marker did not appear after credential sign-in; check identifier and secret",
            ))
        }
    }

    /// Check the login-confirmed marker within the bounded wait
    async fn is_logged_in(&self, page: &dyn PageDriver) -> bool {
        page.wait_for(&portal::campus_button(), self.marker_wait)
            .await
            .is_ok()
    }

    /// Capture cookies and local storage for future fast-path reuse
    async fn capture_artifacts(&self, page: &dyn PageDriver) -> Result<SessionArtifacts> {
        Ok(SessionArtifacts {
            cookies: page.cookies().await?,
            storage: page.local_storage().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdp::types::Cookie;
    use crate::page::MockPage;
    use crate::session::store::MemorySessionStore;

    fn fast_manager(store: Arc<dyn SessionStore>) -> SessionManager {
        SessionManager::new(store)
            .with_waits(Duration::from_millis(20), Duration::from_millis(20))
    }

    fn credentials() -> Credentials {
        Credentials {
            username: "2023123456".into(),
            password: "hunter2".into(),
            pay_password: "114514".into(),
        }
    }

    fn saved_artifacts() -> SessionArtifacts {
        SessionArtifacts {
            cookies: vec![Cookie {
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

    fn page_with_login_form() -> Arc<MockPage> {
        let page = MockPage::new();
        page.add_element(portal::username_input(), "", true);
        page.add_element(portal::password_input(), "", true);
        page.add_element(portal::remember_me_checkbox(), "", true);
        page.add_element(portal::login_submit(), "登录", true);
        page
    }

    #[tokio::test]
    async fn test_fast_path_never_submits_credentials() {
        let page = MockPage::new();
        page.add_element(portal::campus_button(), "粤海校区", true);

        let store = Arc::new(MemorySessionStore::with_artifacts(saved_artifacts()));
        let manager = fast_manager(store);

        let session = manager
            .establish(page.clone(), &credentials())
            .await
            .unwrap();

        // Cookies were applied and the landing view visited
        assert_eq!(page.navigations(), vec![portal::PORTAL_URL.to_string()]);
        assert_eq!(page.cookie_jar().len(), 1);
        // No credential fill and no form interaction happened
        assert!(page.fills().is_empty());
        assert!(page.clicks().is_empty());
        assert_eq!(session.pay_password(), "114514");
    }

    #[tokio::test]
    async fn test_fallback_logs_in_and_persists_artifacts() {
        let page = page_with_login_form();
        // The marker only appears once the login form is submitted
        page.add_element(portal::campus_button(), "粤海校区", true);
        page.reveal_on_click(portal::login_submit(), portal::campus_button());
        page.seed_cookies(saved_artifacts().cookies);

        let store = Arc::new(MemorySessionStore::new());
        let manager = fast_manager(Arc::clone(&store) as Arc<dyn SessionStore>);

        manager
            .establish(page.clone(), &credentials())
            .await
            .unwrap();

        let fills = page.fills();
        assert!(fills.contains(&(portal::username_input(), "2023123456".to_string())));
        assert!(fills.contains(&(portal::password_input(), "hunter2".to_string())));
        assert_eq!(page.checks(), vec![(portal::remember_me_checkbox(), true)]);
        assert_eq!(page.clicks(), vec![(portal::login_submit(), 0)]);

        // Fresh artifacts were persisted for the next run
        let saved = store.load().unwrap().unwrap();
        assert_eq!(saved.cookies.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_artifacts_fall_back_to_credentials() {
        let page = page_with_login_form();
        // Saved cookies are applied but the marker stays hidden until the
        // form is submitted: the restored session is stale
        page.add_element(portal::campus_button(), "粤海校区", true);
        page.reveal_on_click(portal::login_submit(), portal::campus_button());

        let store = Arc::new(MemorySessionStore::with_artifacts(saved_artifacts()));
        let manager = fast_manager(store);

        manager
            .establish(page.clone(), &credentials())
            .await
            .unwrap();

        // The stale restore applied its cookies, then credentials were used
        assert_eq!(page.cookie_jar().len(), 1);
        assert_eq!(page.clicks(), vec![(portal::login_submit(), 0)]);
        assert_eq!(page.fills().len(), 2);
    }

    #[tokio::test]
    async fn test_login_failure_surfaces_auth_error() {
        // No campus button ever appears: both paths fail
        let page = page_with_login_form();

        let store = Arc::new(MemorySessionStore::new());
        let manager = fast_manager(Arc::clone(&store) as Arc<dyn SessionStore>);

        let result = manager.establish(page.clone(), &credentials()).await;
        assert!(matches!(result, Err(Error::Auth(_))));

        // Nothing was persisted on the failure path
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_login_form_is_auth_error() {
        let page = MockPage::new();

        let store = Arc::new(MemorySessionStore::new());
        let manager = fast_manager(store);

        let result = manager.establish(page, &credentials()).await;
        assert!(matches!(result, Err(Error::Auth(_))));
    }
}
