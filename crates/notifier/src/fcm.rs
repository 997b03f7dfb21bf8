use async_trait::async_trait;
use serde::Serialize;

use crate::message::{WireMulticastResponse, WireTopicResponse};
use crate::{MulticastResponse, PushMessage, PushSender, SendError, TokenResult};

/// Request body for the FCM HTTP send endpoint.
#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    registration_ids: Option<&'a [String]>,
    data: &'a std::collections::BTreeMap<String, String>,
    time_to_live: u64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    dry_run: bool,
}

/// FCM sender using the server-key authenticated HTTP endpoint.
pub struct FcmSender {
    client: reqwest::Client,
    endpoint: String,
    server_key: String,
    dry_run: bool,
}

impl FcmSender {
    pub fn new(client: reqwest::Client, endpoint: String, server_key: String) -> Self {
        Self {
            client,
            endpoint,
            server_key,
            dry_run: false,
        }
    }

    /// Validate requests without delivering anything to devices.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        if dry_run {
            tracing::info!("FCM dry-run enabled, messages will not reach devices");
        }
        self.dry_run = dry_run;
        self
    }

    /// POST the request; any non-2xx status is a rejection.
    async fn post(&self, body: &SendRequest<'_>) -> Result<Vec<u8>, SendError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::AUTHORIZATION, format!("key={}", self.server_key))
            .json(body)
            .send()
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(SendError::Rejected {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl PushSender for FcmSender {
    async fn send_topic(&self, topic: &str, message: &PushMessage) -> Result<String, SendError> {
        let request = SendRequest {
            to: Some(format!("/topics/{}", topic)),
            registration_ids: None,
            data: &message.data,
            time_to_live: message.time_to_live.as_secs(),
            dry_run: self.dry_run,
        };

        let body = self.post(&request).await?;
        let parsed: WireTopicResponse = serde_json::from_slice(&body)
            .map_err(|e| SendError::Malformed(e.to_string()))?;

        if let Some(error) = parsed.error {
            return Err(SendError::Provider(error));
        }

        match parsed.message_id {
            Some(serde_json::Value::String(id)) => Ok(id),
            Some(id) => Ok(id.to_string()),
            None => Err(SendError::Malformed("topic response without message_id".to_string())),
        }
    }

    async fn send_multicast(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> Result<MulticastResponse, SendError> {
        let request = SendRequest {
            to: None,
            registration_ids: Some(tokens),
            data: &message.data,
            time_to_live: message.time_to_live.as_secs(),
            dry_run: self.dry_run,
        };

        let body = self.post(&request).await?;
        let parsed: WireMulticastResponse = serde_json::from_slice(&body)
            .map_err(|e| SendError::Malformed(e.to_string()))?;

        if parsed.results.len() != tokens.len() {
            return Err(SendError::Malformed(format!(
                "{} results for {} tokens",
                parsed.results.len(),
                tokens.len()
            )));
        }

        Ok(MulticastResponse {
            success_count: parsed.success,
            failure_count: parsed.failure,
            canonical_count: parsed.canonical_ids,
            results: parsed.results.into_iter().map(TokenResult::from).collect(),
        })
    }
}
