//! In-process fakes for the manager's collaborators.
//!
//! Used by the unit tests and by `tests/`; nothing here touches the network
//! or the filesystem.

use dashmap::DashMap;
use reqwest::StatusCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::{AuthError, TransportError};
use crate::navigator::Navigator;
use crate::storage::{CredentialStorage, MemoryStorage};
use crate::transport::{HttpRequest, HttpResponse, Transport};

type Handler = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Transport with scripted per-path responses.
///
/// Every request is recorded when it is sent, before any configured delay.
/// Paths without a handler answer 404.
#[derive(Clone, Default)]
pub struct FakeTransport {
    inner: Arc<FakeInner>,
}

#[derive(Default)]
struct FakeInner {
    routes: DashMap<String, Handler>,
    requests: Mutex<Vec<HttpRequest>>,
    delay: Mutex<Option<Duration>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response by `delay`.
    pub fn with_delay(self, delay: Duration) -> Self {
        *lock(&self.inner.delay) = Some(delay);
        self
    }

    pub fn on<F>(&self, path: &str, handler: F)
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
    {
        self.inner.routes.insert(path.to_string(), Box::new(handler));
    }

    pub fn respond(&self, path: &str, status: StatusCode, body: serde_json::Value) {
        self.on(path, move |_| Ok(HttpResponse::with_json(status, &body)));
    }

    pub fn respond_text(&self, path: &str, status: StatusCode, body: &str) {
        let body = body.to_string();
        self.on(path, move |_| Ok(HttpResponse::new(status, body.clone())));
    }

    /// Answer requests to `path` with a transport error.
    pub fn fail(&self, path: &str) {
        self.on(path, |_| Err(TransportError::Other("connection refused".to_string())));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.inner.requests).clone()
    }

    pub fn calls(&self, path: &str) -> usize {
        lock(&self.inner.requests)
            .iter()
            .filter(|r| r.path == path)
            .count()
    }
}

impl Transport for FakeTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let outcome = match self.inner.routes.get(&request.path) {
            Some(handler) => (handler.value())(&request),
            None => Ok(HttpResponse::new(StatusCode::NOT_FOUND, "")),
        };
        lock(&self.inner.requests).push(request);

        let delay = *lock(&self.inner.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        outcome
    }
}

/// Navigator that remembers where it was sent.
pub struct RecordingNavigator {
    current: Mutex<String>,
    history: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new(start: &str) -> Self {
        Self {
            current: Mutex::new(start.to_string()),
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn navigations(&self) -> Vec<String> {
        lock(&self.history).clone()
    }
}

impl Navigator for RecordingNavigator {
    fn current_route(&self) -> String {
        lock(&self.current).clone()
    }

    fn navigate(&self, route: &str) {
        *lock(&self.current) = route.to_string();
        lock(&self.history).push(route.to_string());
    }
}

/// Memory storage that counts writes and removals.
#[derive(Default)]
pub struct CountingStorage {
    inner: MemoryStorage,
    writes: AtomicUsize,
    removals: AtomicUsize,
}

impl CountingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn removals(&self) -> usize {
        self.removals.load(Ordering::SeqCst)
    }
}

impl CredentialStorage for CountingStorage {
    fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), AuthError> {
        self.removals.fetch_add(1, Ordering::SeqCst);
        self.inner.remove(key)
    }
}
