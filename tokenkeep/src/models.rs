use serde::{Deserialize, Serialize};

/// Access/refresh token pair as persisted by the credential store.
///
/// Timestamps are epoch milliseconds. `issued_at` is only optional on input;
/// every pair read back from the store carries it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<i64>,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_in: None,
            expires_at: None,
            issued_at: None,
        }
    }

    pub fn with_expires_in(mut self, seconds: i64) -> Self {
        self.expires_in = Some(seconds);
        self
    }

    pub fn with_expires_at(mut self, epoch: i64) -> Self {
        self.expires_at = Some(epoch);
        self
    }

    pub fn with_issued_at(mut self, epoch_ms: i64) -> Self {
        self.issued_at = Some(epoch_ms);
        self
    }

    /// Both tokens present and non-empty.
    pub fn is_complete(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_camel_case_keys() {
        let pair = CredentialPair::new("a", "r")
            .with_expires_in(60)
            .with_issued_at(1_000);
        let json = serde_json::to_value(&pair).unwrap();

        assert_eq!(json["accessToken"], "a");
        assert_eq!(json["refreshToken"], "r");
        assert_eq!(json["expiresIn"], 60);
        assert_eq!(json["issuedAt"], 1_000);
        assert!(json.get("expiresAt").is_none());
    }

    #[test]
    fn incomplete_when_a_token_is_empty() {
        assert!(CredentialPair::new("a", "r").is_complete());
        assert!(!CredentialPair::new("", "r").is_complete());
        assert!(!CredentialPair::new("a", "").is_complete());
    }
}
