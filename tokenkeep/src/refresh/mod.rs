//! Single-flight refresh of an expired credential pair.
//!
//! At most one refresh exchange is outstanding at a time. Callers that find
//! the pair expired while an exchange is running await that same exchange
//! and receive its outcome.

mod extract;

pub use extract::extract_pair;

use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::StatusCode;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::error::{AuthError, TransportError};
use crate::expiry;
use crate::models::CredentialPair;
use crate::store::CredentialStore;
use crate::transport::{HttpRequest, Transport};

type InFlight = Shared<BoxFuture<'static, Option<CredentialPair>>>;

#[derive(Debug, Error)]
enum RefreshError {
    #[error("network error: {0}")]
    Network(#[from] TransportError),

    #[error("refresh endpoint returned {0}")]
    Status(StatusCode),

    #[error("malformed response body: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("response did not contain a token pair")]
    MissingTokens,

    #[error("failed to store refreshed pair: {0}")]
    Storage(#[from] AuthError),
}

pub struct RefreshCoordinator<T: Transport> {
    store: CredentialStore,
    transport: Arc<T>,
    refresh_path: String,
    timeout: Duration,
    in_flight: Arc<Mutex<Option<InFlight>>>,
}

impl<T: Transport> Clone for RefreshCoordinator<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            transport: self.transport.clone(),
            refresh_path: self.refresh_path.clone(),
            timeout: self.timeout,
            in_flight: self.in_flight.clone(),
        }
    }
}

impl<T: Transport> RefreshCoordinator<T> {
    pub fn new(
        store: CredentialStore,
        transport: Arc<T>,
        refresh_path: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            transport,
            refresh_path: refresh_path.into(),
            timeout,
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// A live pair, refreshing first if the stored one has expired.
    ///
    /// Returns `None` when there is no pair or the refresh failed; ending
    /// the session is left to the caller.
    pub async fn ensure_fresh(&self) -> Option<CredentialPair> {
        let pair = self.store.read()?;
        if !expiry::is_expired(&pair) {
            return Some(pair);
        }
        self.join_or_start().await
    }

    async fn join_or_start(&self) -> Option<CredentialPair> {
        let exchange = {
            let mut slot = self.in_flight.lock().await;
            match slot.as_ref() {
                Some(exchange) => {
                    tracing::debug!("Joining in-flight token refresh");
                    exchange.clone()
                }
                None => {
                    let exchange = self.clone().run().boxed().shared();
                    *slot = Some(exchange.clone());
                    exchange
                }
            }
        };
        exchange.await
    }

    async fn run(self) -> Option<CredentialPair> {
        let outcome = match self.store.read() {
            None => None,
            // Replaced while we were waiting to start
            Some(pair) if !expiry::is_expired(&pair) => Some(pair),
            Some(pair) => match self.exchange(&pair.refresh_token).await {
                Ok(fresh) => {
                    tracing::info!("Token refresh successful");
                    Some(fresh)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Token refresh failed");
                    None
                }
            },
        };

        self.in_flight.lock().await.take();
        outcome
    }

    async fn exchange(&self, refresh_token: &str) -> Result<CredentialPair, RefreshError> {
        tracing::debug!(path = %self.refresh_path, "Exchanging refresh token");
        let request = HttpRequest::post(self.refresh_path.as_str())
            .json(json!({ "refreshToken": refresh_token }));

        let response = tokio::time::timeout(self.timeout, self.transport.send(request))
            .await
            .map_err(|_| TransportError::Timeout)??;

        if !response.is_success() {
            return Err(RefreshError::Status(response.status));
        }

        let body: serde_json::Value = serde_json::from_str(&response.body)?;
        let pair = extract_pair(&body).ok_or(RefreshError::MissingTokens)?;

        Ok(self.store.write(pair)?)
    }
}
