use chrono::Utc;
use std::sync::Arc;

use crate::error::AuthError;
use crate::expiry::normalize_epoch_ms;
use crate::models::CredentialPair;
use crate::storage::CredentialStorage;

/// Written in place of the pair when the key cannot be removed.
const CLEARED: &str = "null";

/// The only reader and writer of the persisted credential pair.
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn CredentialStorage>,
    key: String,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn CredentialStorage>, namespace: &str) -> Self {
        Self {
            storage,
            key: format!("{}.credentials", namespace),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current pair, or `None` if nothing usable is persisted.
    pub fn read(&self) -> Option<CredentialPair> {
        let raw = match self.storage.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Failed to read credentials");
                return None;
            }
        };

        match serde_json::from_str::<Option<CredentialPair>>(&raw) {
            Ok(None) => None,
            Ok(Some(pair)) if pair.is_complete() => Some(pair),
            Ok(Some(_)) => {
                tracing::warn!(key = %self.key, "Stored credentials are incomplete, ignoring");
                None
            }
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Stored credentials are malformed, ignoring");
                None
            }
        }
    }

    /// Persist `pair`, stamping `issued_at` with the current time and
    /// normalizing `expires_at` to milliseconds. Returns the pair as stored.
    pub fn write(&self, pair: CredentialPair) -> Result<CredentialPair, AuthError> {
        self.write_at(pair, Utc::now().timestamp_millis())
    }

    pub(crate) fn write_at(
        &self,
        mut pair: CredentialPair,
        now_ms: i64,
    ) -> Result<CredentialPair, AuthError> {
        if !pair.is_complete() {
            return Err(AuthError::IncompletePair);
        }

        pair.issued_at = Some(now_ms);
        pair.expires_at = pair.expires_at.map(normalize_epoch_ms);

        let json = serde_json::to_string(&pair)?;
        self.storage.set(&self.key, &json)?;
        tracing::debug!(key = %self.key, "Stored credentials");

        Ok(pair)
    }

    /// Remove the pair. If the key cannot be removed it is overwritten with
    /// a value `read` treats as empty; only if both fail is the pair left.
    pub fn clear(&self) -> Result<(), AuthError> {
        if let Err(e) = self.storage.remove(&self.key) {
            tracing::warn!(key = %self.key, error = %e, "Failed to remove credentials, overwriting");
            self.storage.set(&self.key, CLEARED).map_err(|_| e)?;
        }
        tracing::debug!(key = %self.key, "Cleared credentials");
        Ok(())
    }
}
