use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Token storage error: {0}")]
    TokenStorage(String),

    #[error("Credential pair is missing an access or refresh token")]
    IncompletePair,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure to obtain any response at all.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    #[error("{0}")]
    Other(String),
}

/// Errors surfaced to callers of the request pipeline.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Network error: {0}")]
    Network(#[from] TransportError),

    #[error("Server fault ({status}): {message}")]
    ServerFault { status: StatusCode, message: String },

    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("{message}")]
    Failed { status: StatusCode, message: String },

    #[error("Malformed response body: {0}")]
    MalformedBody(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl RequestError {
    pub fn is_auth_required(&self) -> bool {
        matches!(self, RequestError::AuthenticationRequired)
    }

    pub fn is_server_fault(&self) -> bool {
        matches!(self, RequestError::ServerFault { .. })
    }

    /// HTTP status of the response that caused this error, if there was one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RequestError::ServerFault { status, .. } | RequestError::Failed { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}
