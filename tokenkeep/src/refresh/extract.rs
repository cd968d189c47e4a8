//! Pull a credential pair out of a token endpoint response.
//!
//! Servers wrap the pair differently; each strategy locates one candidate
//! object and the first candidate holding both tokens wins.

use serde_json::{Map, Value};

use crate::models::CredentialPair;

struct Strategy {
    name: &'static str,
    locate: fn(&Value) -> Option<&Value>,
}

const STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "flat",
        locate: flat,
    },
    Strategy {
        name: "data",
        locate: data_envelope,
    },
    Strategy {
        name: "tokens",
        locate: tokens_envelope,
    },
    Strategy {
        name: "data.tokens",
        locate: data_tokens_envelope,
    },
];

const ACCESS_TOKEN_KEYS: &[&str] = &["accessToken", "access_token"];
const REFRESH_TOKEN_KEYS: &[&str] = &["refreshToken", "refresh_token"];
const EXPIRES_AT_KEYS: &[&str] = &["expiresAt", "expires_at"];
const EXPIRES_IN_KEYS: &[&str] = &["expiresIn", "expires_in"];

fn flat(body: &Value) -> Option<&Value> {
    Some(body)
}

fn data_envelope(body: &Value) -> Option<&Value> {
    body.get("data")
}

fn tokens_envelope(body: &Value) -> Option<&Value> {
    body.get("tokens")
}

fn data_tokens_envelope(body: &Value) -> Option<&Value> {
    body.get("data")?.get("tokens")
}

pub fn extract_pair(body: &Value) -> Option<CredentialPair> {
    STRATEGIES.iter().find_map(|strategy| {
        let pair = (strategy.locate)(body)
            .and_then(Value::as_object)
            .and_then(pair_from_object)?;
        tracing::trace!(strategy = strategy.name, "Extracted credential pair");
        Some(pair)
    })
}

fn pair_from_object(object: &Map<String, Value>) -> Option<CredentialPair> {
    let access_token = string_field(object, ACCESS_TOKEN_KEYS)?;
    let refresh_token = string_field(object, REFRESH_TOKEN_KEYS)?;

    Some(CredentialPair {
        access_token,
        refresh_token,
        expires_in: number_field(object, EXPIRES_IN_KEYS),
        expires_at: number_field(object, EXPIRES_AT_KEYS),
        issued_at: None,
    })
}

fn string_field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| object.get(*key)?.as_str())
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn number_field(object: &Map<String, Value>, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|key| match object.get(*key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}
