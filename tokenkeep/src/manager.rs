use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::{AuthError, RequestError};
use crate::expiry;
use crate::models::CredentialPair;
use crate::navigator::Navigator;
use crate::pipeline::RequestPipeline;
use crate::refresh::{extract_pair, RefreshCoordinator};
use crate::settings::Settings;
use crate::storage::{CredentialStorage, FileStorage};
use crate::store::CredentialStore;
use crate::terminate::SessionTerminator;
use crate::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};

/// Owns the credential lifecycle for one application instance.
///
/// Construct once and share clones; clones refer to the same store and the
/// same in-flight refresh/termination. Separately constructed managers are
/// fully independent.
pub struct SessionManager<T: Transport> {
    store: CredentialStore,
    refresher: RefreshCoordinator<T>,
    terminator: SessionTerminator<T>,
    pipeline: RequestPipeline<T>,
}

impl<T: Transport> Clone for SessionManager<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            refresher: self.refresher.clone(),
            terminator: self.terminator.clone(),
            pipeline: self.pipeline.clone(),
        }
    }
}

impl SessionManager<ReqwestTransport> {
    /// Manager backed by reqwest and file storage, as configured.
    pub fn from_settings(
        settings: &Settings,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, AuthError> {
        settings.validate().map_err(AuthError::Configuration)?;

        let storage = match &settings.storage_dir {
            Some(dir) => FileStorage::new(dir)?,
            None => FileStorage::in_data_dir()?,
        };
        tracing::debug!(dir = %storage.dir().display(), "Using file credential storage");

        let transport = ReqwestTransport::from_settings(settings)?;
        Ok(Self::new(settings, transport, Arc::new(storage), navigator))
    }
}

impl<T: Transport> SessionManager<T> {
    pub fn new(
        settings: &Settings,
        transport: T,
        storage: Arc<dyn CredentialStorage>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let transport = Arc::new(transport);
        let store = CredentialStore::new(storage, &settings.storage_namespace);

        let refresher = RefreshCoordinator::new(
            store.clone(),
            transport.clone(),
            settings.refresh_path.clone(),
            settings.auth_timeout(),
        );
        let terminator = SessionTerminator::new(
            store.clone(),
            transport.clone(),
            navigator.clone(),
            settings.logout_path.clone(),
            settings.login_route.clone(),
            settings.auth_timeout(),
        );
        let pipeline = RequestPipeline::new(
            store.clone(),
            transport,
            refresher.clone(),
            terminator.clone(),
            navigator,
            settings.refresh_path.clone(),
            settings.logout_path.clone(),
            settings.fault_route.clone(),
        );

        Self {
            store,
            refresher,
            terminator,
            pipeline,
        }
    }

    /// Send a request through the session pipeline.
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, RequestError> {
        self.pipeline.execute(request).await
    }

    pub async fn ensure_fresh(&self) -> Option<CredentialPair> {
        self.refresher.ensure_fresh().await
    }

    pub async fn terminate(&self) {
        self.terminator.terminate().await
    }

    /// Wait for the logout notification started by the last termination.
    /// Short-lived processes call this before exiting.
    pub async fn logout_settled(&self) {
        self.terminator.logout_settled().await
    }

    /// Store the pair obtained from a successful login.
    pub fn sign_in(&self, pair: CredentialPair) -> Result<CredentialPair, AuthError> {
        let stored = self.store.write(pair)?;
        tracing::info!("Signed in");
        Ok(stored)
    }

    /// Store the pair found in a login response body, in any of the shapes
    /// accepted from the refresh endpoint.
    pub fn sign_in_from_response(
        &self,
        body: &serde_json::Value,
    ) -> Result<CredentialPair, AuthError> {
        let pair = extract_pair(body).ok_or(AuthError::IncompletePair)?;
        self.sign_in(pair)
    }

    /// User-initiated logout.
    pub async fn sign_out(&self) {
        self.terminate().await
    }

    pub fn current(&self) -> Option<CredentialPair> {
        self.store.read()
    }

    /// A pair is stored and not known to be expired.
    pub fn is_authenticated(&self) -> bool {
        self.current()
            .map(|pair| !expiry::is_expired(&pair))
            .unwrap_or(false)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let pair = self.current()?;
        DateTime::from_timestamp_millis(expiry::resolve(&pair)?)
    }
}
