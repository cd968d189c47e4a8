//! The authorized request path.
//!
//! Every request goes through [`RequestPipeline::execute`]: pre-flight
//! refresh, bearer injection, the transport call, and classification of the
//! response. Unrecoverable auth failures end the session here, centrally,
//! before the error is handed back to the caller.

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use std::sync::Arc;

use crate::error::RequestError;
use crate::navigator::{navigate_once, Navigator};
use crate::refresh::RefreshCoordinator;
use crate::store::CredentialStore;
use crate::terminate::SessionTerminator;
use crate::transport::{HttpRequest, HttpResponse, Transport};

/// Maximum length for error messages taken from response bodies
const MAX_ERROR_BODY_LENGTH: usize = 500;

pub struct RequestPipeline<T: Transport> {
    store: CredentialStore,
    transport: Arc<T>,
    refresher: RefreshCoordinator<T>,
    terminator: SessionTerminator<T>,
    navigator: Arc<dyn Navigator>,
    refresh_path: String,
    logout_path: String,
    fault_route: String,
}

impl<T: Transport> Clone for RequestPipeline<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            transport: self.transport.clone(),
            refresher: self.refresher.clone(),
            terminator: self.terminator.clone(),
            navigator: self.navigator.clone(),
            refresh_path: self.refresh_path.clone(),
            logout_path: self.logout_path.clone(),
            fault_route: self.fault_route.clone(),
        }
    }
}

impl<T: Transport> RequestPipeline<T> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: CredentialStore,
        transport: Arc<T>,
        refresher: RefreshCoordinator<T>,
        terminator: SessionTerminator<T>,
        navigator: Arc<dyn Navigator>,
        refresh_path: impl Into<String>,
        logout_path: impl Into<String>,
        fault_route: impl Into<String>,
    ) -> Self {
        Self {
            store,
            transport,
            refresher,
            terminator,
            navigator,
            refresh_path: refresh_path.into(),
            logout_path: logout_path.into(),
            fault_route: fault_route.into(),
        }
    }

    pub async fn execute(&self, mut request: HttpRequest) -> Result<HttpResponse, RequestError> {
        let skip_auth = request.take_skip_auth();
        let auth_flow = self.is_auth_flow(&request.path);

        if !skip_auth {
            let had_pair = self.store.read().is_some();
            match self.refresher.ensure_fresh().await {
                Some(pair) => {
                    let value = HeaderValue::from_str(&format!("Bearer {}", pair.access_token))
                        .map_err(|e| RequestError::InvalidRequest(e.to_string()))?;
                    request.headers.insert(AUTHORIZATION, value);
                }
                None if had_pair => {
                    tracing::warn!(path = %request.path, "Session could not be refreshed");
                    self.terminator.terminate().await;
                    return Err(RequestError::AuthenticationRequired);
                }
                None => {
                    tracing::debug!(path = %request.path, "No session, sending without credentials");
                }
            }
        }

        let method = request.method.clone();
        let path = request.path.clone();
        let response = self.transport.send(request).await.map_err(|e| {
            tracing::warn!(%method, %path, error = %e, "Request failed without a response");
            RequestError::Network(e)
        })?;
        tracing::debug!(%method, %path, status = %response.status, "Response received");

        self.classify(response, &path, skip_auth || auth_flow).await
    }

    async fn classify(
        &self,
        response: HttpResponse,
        path: &str,
        exempt_from_termination: bool,
    ) -> Result<HttpResponse, RequestError> {
        let status = response.status;

        if status.is_success() {
            return Ok(response);
        }

        if status.is_server_error() {
            let message = extract_message(&response);
            tracing::error!(%path, %status, %message, "Server fault");
            navigate_once(self.navigator.as_ref(), &self.fault_route);
            return Err(RequestError::ServerFault { status, message });
        }

        if status == StatusCode::UNAUTHORIZED && !exempt_from_termination {
            tracing::warn!(%path, "Unauthorized response, ending session");
            self.terminator.terminate().await;
            return Err(RequestError::AuthenticationRequired);
        }

        let message = extract_message(&response);
        tracing::debug!(%path, %status, %message, "Request rejected");
        Err(RequestError::Failed { status, message })
    }

    fn is_auth_flow(&self, path: &str) -> bool {
        path == self.refresh_path || path == self.logout_path
    }
}

/// Human-readable message for a failed response: the JSON `message` field,
/// else the raw body, else the status line.
pub fn extract_message(response: &HttpResponse) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(&response.body)
        .ok()
        .and_then(|body| body.get("message")?.as_str().map(str::to_string))
        .filter(|message| !message.trim().is_empty());

    let message = from_json.unwrap_or_else(|| {
        let text = response.body.trim();
        if text.is_empty() {
            status_line(response.status)
        } else {
            text.to_string()
        }
    });

    truncate(message)
}

fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

/// Truncate a message to avoid surfacing excessive data
fn truncate(message: String) -> String {
    if message.len() <= MAX_ERROR_BODY_LENGTH {
        return message;
    }
    let mut end = MAX_ERROR_BODY_LENGTH;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}... (truncated, {} total bytes)",
        &message[..end],
        message.len()
    )
}
