use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,

    #[serde(default = "default_logout_path")]
    pub logout_path: String,

    /// Unauthenticated entry point the navigator is sent to on termination.
    #[serde(default = "default_login_route")]
    pub login_route: String,

    #[serde(default = "default_fault_route")]
    pub fault_route: String,

    #[serde(default = "default_storage_namespace")]
    pub storage_namespace: String,

    #[serde(default)]
    pub storage_dir: Option<PathBuf>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Bound on the refresh and logout exchanges.
    #[serde(default = "default_auth_timeout")]
    pub auth_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_refresh_path() -> String {
    "/auth/refresh".to_string()
}

fn default_logout_path() -> String {
    "/auth/logout".to_string()
}

fn default_login_route() -> String {
    "/login".to_string()
}

fn default_fault_route() -> String {
    "/error".to_string()
}

fn default_storage_namespace() -> String {
    "tokenkeep".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_auth_timeout() -> u64 {
    10
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            refresh_path: default_refresh_path(),
            logout_path: default_logout_path(),
            login_route: default_login_route(),
            fault_route: default_fault_route(),
            storage_namespace: default_storage_namespace(),
            storage_dir: None,
            request_timeout_secs: default_request_timeout(),
            auth_timeout_secs: default_auth_timeout(),
        }
    }
}

impl Settings {
    /// Load from `$TOKENKEEP_CONFIG` (default `tokenkeep.toml`, optional),
    /// then `TOKENKEEP__*` environment variables.
    pub fn new() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("TOKENKEEP_CONFIG").unwrap_or_else(|_| "tokenkeep.toml".to_string());

        let settings = Config::builder()
            .add_source(File::with_name(&config_path).required(false))
            .add_source(config::Environment::with_prefix("TOKENKEEP").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.is_empty() {
            return Err("base_url is required".to_string());
        }
        if !self.base_url.starts_with("http") {
            return Err("base_url must be a valid HTTP(S) URL".to_string());
        }
        for (name, path) in [
            ("refresh_path", &self.refresh_path),
            ("logout_path", &self.logout_path),
            ("login_route", &self.login_route),
            ("fault_route", &self.fault_route),
        ] {
            if !path.starts_with('/') {
                return Err(format!("{} must start with '/'", name));
            }
        }
        if self.storage_namespace.is_empty()
            || !self
                .storage_namespace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            || self.storage_namespace.starts_with('.')
        {
            return Err("storage_namespace must be a non-empty [A-Za-z0-9._-] name".to_string());
        }
        if self.request_timeout_secs == 0 || self.auth_timeout_secs == 0 {
            return Err("timeouts must be greater than zero".to_string());
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }
}
