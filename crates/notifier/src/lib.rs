//! Push provider boundary.
//!
//! [`PushSender`] is everything the dispatcher needs from the provider: a
//! topic broadcast and a multicast to an explicit list of device tokens.
//! [`fcm::FcmSender`] implements it over the FCM HTTP API.

pub mod fcm;
pub mod message;

use async_trait::async_trait;
use thiserror::Error;

pub use message::{MulticastResponse, PushMessage, TokenError, TokenResult};

/// Why a send attempt produced no usable response.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Provider rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Malformed provider response: {0}")]
    Malformed(String),

    #[error("Send timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl SendError {
    /// Only server-side failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SendError::Rejected { status, .. } if *status >= 500)
    }
}

#[async_trait]
pub trait PushSender: Send + Sync {
    /// Broadcast to every device subscribed to `topic`. Returns the message id.
    async fn send_topic(&self, topic: &str, message: &PushMessage) -> Result<String, SendError>;

    /// Send to each token. Results are indexed like `tokens`.
    async fn send_multicast(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> Result<MulticastResponse, SendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_server_errors_are_retryable() {
        let server = SendError::Rejected {
            status: 503,
            body: String::new(),
        };
        let client = SendError::Rejected {
            status: 400,
            body: String::new(),
        };
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
        assert!(!SendError::Transport("reset".into()).is_retryable());
        assert!(!SendError::Malformed("eof".into()).is_retryable());
    }
}
