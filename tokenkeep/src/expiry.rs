//! Expiry resolution for credential pairs.
//!
//! Sources are consulted in order of authority: an explicit `expires_at`,
//! then the `exp` claim of a JWT-shaped access token, then
//! `issued_at + expires_in`. A pair whose expiry cannot be determined is
//! treated as live.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;

use crate::models::CredentialPair;

/// Epoch values below this are taken to be seconds.
const MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

/// Normalize an epoch timestamp to milliseconds.
pub fn normalize_epoch_ms(value: i64) -> i64 {
    if value < MILLIS_THRESHOLD {
        value.saturating_mul(1000)
    } else {
        value
    }
}

/// Instant (epoch ms) at which the pair stops being valid, if known.
pub fn resolve(pair: &CredentialPair) -> Option<i64> {
    if let Some(expires_at) = pair.expires_at.filter(|v| *v > 0) {
        return Some(normalize_epoch_ms(expires_at));
    }

    if let Some(exp) = token_exp_claim(&pair.access_token) {
        return Some(exp.saturating_mul(1000));
    }

    match (pair.expires_in, pair.issued_at) {
        (Some(expires_in), Some(issued_at)) => {
            Some(issued_at.saturating_add(expires_in.saturating_mul(1000)))
        }
        _ => None,
    }
}

pub fn is_expired(pair: &CredentialPair) -> bool {
    is_expired_at(pair, Utc::now().timestamp_millis())
}

pub fn is_expired_at(pair: &CredentialPair, now_ms: i64) -> bool {
    resolve(pair).is_some_and(|expires_at| expires_at <= now_ms)
}

/// Read the numeric `exp` claim (seconds) from a three-segment token.
fn token_exp_claim(token: &str) -> Option<i64> {
    let mut segments = token.split('.');
    let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?;

    exp.as_i64().or_else(|| exp.as_f64().map(|f| f as i64))
}
