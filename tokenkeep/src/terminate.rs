use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use serde_json::json;
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::models::CredentialPair;
use crate::navigator::{navigate_once, Navigator};
use crate::store::CredentialStore;
use crate::transport::{HttpRequest, Transport};

type InFlight = Shared<BoxFuture<'static, ()>>;

/// Ends the session: clear local credentials, send the user to the login
/// route, tell the server in the background. Concurrent calls share one
/// termination, and `terminate` never waits on the logout call.
pub struct SessionTerminator<T: Transport> {
    store: CredentialStore,
    transport: Arc<T>,
    navigator: Arc<dyn Navigator>,
    logout_path: String,
    login_route: String,
    timeout: Duration,
    in_flight: Arc<Mutex<Option<InFlight>>>,
    logout_task: Arc<std::sync::Mutex<Option<JoinHandle<()>>>>,
}

impl<T: Transport> Clone for SessionTerminator<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            transport: self.transport.clone(),
            navigator: self.navigator.clone(),
            logout_path: self.logout_path.clone(),
            login_route: self.login_route.clone(),
            timeout: self.timeout,
            in_flight: self.in_flight.clone(),
            logout_task: self.logout_task.clone(),
        }
    }
}

impl<T: Transport> SessionTerminator<T> {
    pub fn new(
        store: CredentialStore,
        transport: Arc<T>,
        navigator: Arc<dyn Navigator>,
        logout_path: impl Into<String>,
        login_route: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            transport,
            navigator,
            logout_path: logout_path.into(),
            login_route: login_route.into(),
            timeout,
            in_flight: Arc::new(Mutex::new(None)),
            logout_task: Arc::new(std::sync::Mutex::new(None)),
        }
    }

    pub async fn terminate(&self) {
        let termination = {
            let mut slot = self.in_flight.lock().await;
            match slot.as_ref() {
                Some(termination) => {
                    tracing::debug!("Joining in-flight session termination");
                    termination.clone()
                }
                None => {
                    let termination = self.clone().run().boxed().shared();
                    *slot = Some(termination.clone());
                    termination
                }
            }
        };
        termination.await
    }

    /// Wait for the background logout notification, if one is pending.
    pub async fn logout_settled(&self) {
        let task = self
            .logout_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Logout notification task failed");
            }
        }
    }

    async fn run(self) {
        let previous = self.store.read();

        // Local state goes first so nothing observes a dying session as live
        if let Err(e) = self.store.clear() {
            tracing::error!(error = %e, "Failed to clear credentials during termination");
        }

        navigate_once(self.navigator.as_ref(), &self.login_route);

        match previous {
            Some(pair) => {
                tracing::info!("Session terminated");
                match tokio::runtime::Handle::try_current() {
                    Ok(handle) => {
                        let logout_task = self.logout_task.clone();
                        // The slot is released once the notification settles;
                        // overlapping calls join this termination until then
                        let task = handle.spawn(async move {
                            self.notify_logout(&pair).await;
                            self.in_flight.lock().await.take();
                        });
                        *logout_task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
                        return;
                    }
                    Err(_) => tracing::warn!("No async runtime, skipping logout notification"),
                }
            }
            None => tracing::debug!("No stored session, skipping logout notification"),
        }

        self.in_flight.lock().await.take();
    }

    async fn notify_logout(&self, pair: &CredentialPair) {
        let mut request = HttpRequest::post(self.logout_path.as_str())
            .json(json!({ "refreshToken": pair.refresh_token }));
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", pair.access_token)) {
            request.headers.insert(AUTHORIZATION, value);
        }

        match tokio::time::timeout(self.timeout, self.transport.send(request)).await {
            Ok(Ok(response)) if response.is_success() => {
                tracing::debug!("Logout notification accepted");
            }
            Ok(Ok(response)) => {
                tracing::warn!(status = %response.status, "Logout notification rejected");
            }
            Ok(Err(e)) => tracing::warn!(error = %e, "Logout notification failed"),
            Err(_) => tracing::warn!("Logout notification timed out"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingStorage, FakeTransport, RecordingNavigator};
    use futures::future::join_all;
    use reqwest::StatusCode;

    struct Fixture {
        storage: Arc<CountingStorage>,
        store: CredentialStore,
        transport: FakeTransport,
        navigator: Arc<RecordingNavigator>,
        terminator: SessionTerminator<FakeTransport>,
    }

    fn fixture(transport: FakeTransport, route: &str) -> Fixture {
        let storage = Arc::new(CountingStorage::new());
        let store = CredentialStore::new(storage.clone(), "test");
        let navigator = Arc::new(RecordingNavigator::new(route));
        let terminator = SessionTerminator::new(
            store.clone(),
            Arc::new(transport.clone()),
            navigator.clone(),
            "/auth/logout",
            "/login",
            Duration::from_secs(5),
        );
        Fixture {
            storage,
            store,
            transport,
            navigator,
            terminator,
        }
    }

    #[tokio::test]
    async fn clears_notifies_and_redirects() {
        let transport = FakeTransport::new();
        transport.respond("/auth/logout", StatusCode::NO_CONTENT, json!({}));
        let f = fixture(transport, "/dashboard");
        f.store.write(CredentialPair::new("a", "r")).unwrap();

        f.terminator.terminate().await;
        f.terminator.logout_settled().await;

        assert_eq!(f.store.read(), None);
        let requests = f.transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].path, "/auth/logout");
        assert_eq!(requests[0].bearer_token(), Some("a"));
        assert_eq!(requests[0].body, Some(json!({ "refreshToken": "r" })));
        assert_eq!(f.navigator.navigations(), vec!["/login".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_terminations_collapse_into_one() {
        let transport = FakeTransport::new().with_delay(Duration::from_millis(20));
        transport.respond("/auth/logout", StatusCode::OK, json!({}));
        let f = fixture(transport, "/dashboard");
        f.store.write(CredentialPair::new("a", "r")).unwrap();

        join_all((0..6).map(|_| f.terminator.terminate())).await;
        f.terminator.logout_settled().await;

        assert_eq!(f.transport.calls("/auth/logout"), 1);
        assert_eq!(f.storage.removals(), 1);
        assert_eq!(f.navigator.navigations().len(), 1);
    }

    #[tokio::test]
    async fn logout_failure_is_swallowed() {
        let transport = FakeTransport::new();
        transport.fail("/auth/logout");
        let f = fixture(transport, "/dashboard");
        f.store.write(CredentialPair::new("a", "r")).unwrap();

        f.terminator.terminate().await;
        f.terminator.logout_settled().await;

        assert_eq!(f.store.read(), None);
        assert_eq!(f.transport.calls("/auth/logout"), 1);
        assert_eq!(f.navigator.current_route(), "/login");
    }

    #[tokio::test(start_paused = true)]
    async fn hung_logout_does_not_delay_settlement_or_redirect() {
        let transport = FakeTransport::new().with_delay(Duration::from_secs(3600));
        transport.respond("/auth/logout", StatusCode::OK, json!({}));
        let f = fixture(transport, "/dashboard");
        f.store.write(CredentialPair::new("a", "r")).unwrap();

        let settled = tokio::time::timeout(Duration::from_millis(100), f.terminator.terminate()).await;

        assert!(settled.is_ok());
        assert_eq!(f.store.read(), None);
        assert_eq!(f.navigator.navigations(), vec!["/login".to_string()]);

        f.terminator.logout_settled().await;
        assert_eq!(f.transport.calls("/auth/logout"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_call_joins_termination_with_pending_logout() {
        let transport = FakeTransport::new().with_delay(Duration::from_secs(1));
        transport.respond("/auth/logout", StatusCode::OK, json!({}));
        let f = fixture(transport, "/dashboard");
        f.store.write(CredentialPair::new("a", "r")).unwrap();

        f.terminator.terminate().await;
        f.terminator.terminate().await;
        f.terminator.logout_settled().await;

        assert_eq!(f.storage.removals(), 1);
        assert_eq!(f.transport.calls("/auth/logout"), 1);
        assert_eq!(f.navigator.navigations().len(), 1);
    }

    #[tokio::test]
    async fn no_redirect_when_already_on_login_route() {
        let f = fixture(FakeTransport::new(), "/login");

        f.terminator.terminate().await;
        f.terminator.terminate().await;

        assert!(f.navigator.navigations().is_empty());
        // Nothing was stored, so there is nothing to revoke
        assert_eq!(f.transport.calls("/auth/logout"), 0);
    }

    #[tokio::test]
    async fn repeated_termination_redirects_once() {
        let transport = FakeTransport::new();
        transport.respond("/auth/logout", StatusCode::OK, json!({}));
        let f = fixture(transport, "/settings");
        f.store.write(CredentialPair::new("a", "r")).unwrap();

        f.terminator.terminate().await;
        f.terminator.logout_settled().await;
        f.terminator.terminate().await;
        f.terminator.logout_settled().await;

        assert_eq!(f.navigator.navigations(), vec!["/login".to_string()]);
        assert_eq!(f.transport.calls("/auth/logout"), 1);
    }
}
