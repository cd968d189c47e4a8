//! Session and token lifecycle for an HTTP client.
//!
//! A [`SessionManager`] keeps an access/refresh pair valid across many
//! concurrent requests: it refreshes at most once at a time, injects bearer
//! credentials, and ends the session cleanly when credentials can no longer
//! be renewed.

mod error;
pub mod expiry;
mod manager;
mod models;
mod navigator;
mod pipeline;
mod refresh;
mod settings;
mod storage;
mod store;
mod terminate;
pub mod transport;

pub use error::{AuthError, RequestError, TransportError};
pub use manager::SessionManager;
pub use models::CredentialPair;
pub use navigator::Navigator;
pub use pipeline::{extract_message, RequestPipeline};
pub use refresh::{extract_pair, RefreshCoordinator};
pub use settings::Settings;
pub use storage::{CredentialStorage, FileStorage, MemoryStorage};
pub use store::CredentialStore;
pub use terminate::SessionTerminator;
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport, SKIP_AUTH_HEADER};

// Always expose testing module (integration tests need it)
pub mod testing;
