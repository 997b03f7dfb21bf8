use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

/// Data message sent to a topic or to a list of device tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct PushMessage {
    /// Key/value payload delivered to the app untouched.
    pub data: BTreeMap<String, String>,
    /// How long the provider keeps the message for offline devices.
    pub time_to_live: Duration,
}

impl PushMessage {
    pub fn new(data: BTreeMap<String, String>, time_to_live: Duration) -> Self {
        Self {
            data,
            time_to_live,
        }
    }
}

/// Why the provider did not deliver to one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The app was uninstalled or the token expired.
    NotRegistered,
    /// The token is not a valid registration.
    InvalidRegistration,
    /// The request carried an empty token.
    MissingRegistration,
    Other(String),
}

impl TokenError {
    pub fn from_code(code: &str) -> Self {
        match code {
            "NotRegistered" => TokenError::NotRegistered,
            "InvalidRegistration" => TokenError::InvalidRegistration,
            "MissingRegistration" => TokenError::MissingRegistration,
            other => TokenError::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::NotRegistered => write!(f, "NotRegistered"),
            TokenError::InvalidRegistration => write!(f, "InvalidRegistration"),
            TokenError::MissingRegistration => write!(f, "MissingRegistration"),
            TokenError::Other(code) => write!(f, "{}", code),
        }
    }
}

/// Outcome for one token, at the same index as the token in the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenResult {
    pub message_id: Option<String>,
    /// Replacement the provider wants used for this device from now on.
    pub canonical_id: Option<String>,
    pub error: Option<TokenError>,
}

impl TokenResult {
    pub fn success(message_id: impl Into<String>) -> Self {
        Self {
            message_id: Some(message_id.into()),
            ..Default::default()
        }
    }

    pub fn failure(error: TokenError) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }

    pub fn with_canonical_id(mut self, canonical_id: impl Into<String>) -> Self {
        self.canonical_id = Some(canonical_id.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregated multicast outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MulticastResponse {
    pub success_count: usize,
    pub failure_count: usize,
    pub canonical_count: usize,
    pub results: Vec<TokenResult>,
}

impl MulticastResponse {
    /// Build a response, deriving the counters from the results.
    pub fn from_results(results: Vec<TokenResult>) -> Self {
        let failure_count = results.iter().filter(|r| !r.is_success()).count();
        let canonical_count = results.iter().filter(|r| r.canonical_id.is_some()).count();
        Self {
            success_count: results.len() - failure_count,
            failure_count,
            canonical_count,
            results,
        }
    }
}

/// Provider JSON for a multicast send.
#[derive(Debug, Deserialize)]
pub(crate) struct WireMulticastResponse {
    #[serde(default)]
    pub success: usize,
    #[serde(default)]
    pub failure: usize,
    #[serde(default)]
    pub canonical_ids: usize,
    #[serde(default)]
    pub results: Vec<WireResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireResult {
    pub message_id: Option<serde_json::Value>,
    pub registration_id: Option<String>,
    pub error: Option<String>,
}

impl From<WireResult> for TokenResult {
    fn from(wire: WireResult) -> Self {
        TokenResult {
            message_id: wire.message_id.map(|id| match id {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            }),
            canonical_id: wire.registration_id.filter(|id| !id.is_empty()),
            error: wire.error.as_deref().map(TokenError::from_code),
        }
    }
}

/// Provider JSON for a topic send.
#[derive(Debug, Deserialize)]
pub(crate) struct WireTopicResponse {
    pub message_id: Option<serde_json::Value>,
    pub error: Option<String>,
}
