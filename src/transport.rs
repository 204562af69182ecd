//! RPC facade to the conversational backend.
//!
//! The wire envelope pairs `responses[i]` with `messageIds[i]`; it is decoded
//! exactly once here into [`ServerReply`] values so nothing downstream
//! re-scans the raw shape. Failures become [`TransportError`] and are always
//! handled by the caller; nothing in this module panics or retries.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::errors::TransportError;
use crate::message::ServerReply;

/// Backend operations consumed by the conversation.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Submit user text. The backend may answer with zero, one, or many
    /// reply fragments.
    async fn send(&self, text: &str) -> Result<Vec<ServerReply>, TransportError>;

    /// Request a fresh reply in place of a previous bot message.
    async fn regenerate(&self, message_id: &str) -> Result<Vec<ServerReply>, TransportError>;

    /// Fetch the backend's greeting line for the informational dialog.
    async fn introduction(&self) -> Result<String, TransportError>;
}

// ---------------------------------------------------------------------------
// Wire envelopes
// ---------------------------------------------------------------------------

/// Reply envelope for send/regenerate.
///
/// `messageIds` parallels `responses`; either array may be empty, and
/// `messageIds` may be missing entirely or shorter than `responses`.
#[derive(Debug, Deserialize)]
struct ReplyEnvelope {
    #[serde(default)]
    responses: Vec<String>,
    #[serde(default, rename = "messageIds")]
    message_ids: Vec<Option<String>>,
}

impl ReplyEnvelope {
    fn into_replies(self) -> Vec<ServerReply> {
        self.responses
            .into_iter()
            .enumerate()
            .map(|(i, text)| ServerReply {
                text,
                reply_to: self.message_ids.get(i).cloned().flatten(),
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct IntroductionEnvelope {
    introduction: String,
}

// ---------------------------------------------------------------------------
// HTTP transport
// ---------------------------------------------------------------------------

/// HTTP implementation of [`Transport`] over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport for the backend at `base_url` with a per-request
    /// timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn post_for_replies(
        &self,
        path: &str,
        body: Value,
    ) -> Result<Vec<ServerReply>, TransportError> {
        let url = self.url(path);
        tracing::debug!("POST {}", url);

        let resp = self.client.post(&url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(TransportError::Status {
                status: resp.status().as_u16(),
            });
        }

        let envelope: ReplyEnvelope = resp.json().await.map_err(|err| TransportError::Decode {
            message: err.to_string(),
        })?;
        Ok(envelope.into_replies())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, text: &str) -> Result<Vec<ServerReply>, TransportError> {
        self.post_for_replies("send_message", serde_json::json!({ "message": text }))
            .await
    }

    async fn regenerate(&self, message_id: &str) -> Result<Vec<ServerReply>, TransportError> {
        self.post_for_replies("regenerate", serde_json::json!({ "messageId": message_id }))
            .await
    }

    async fn introduction(&self) -> Result<String, TransportError> {
        let url = self.url("get_introduction");
        tracing::debug!("GET {}", url);

        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(TransportError::Status {
                status: resp.status().as_u16(),
            });
        }

        let envelope: IntroductionEnvelope =
            resp.json().await.map_err(|err| TransportError::Decode {
                message: err.to_string(),
            })?;
        Ok(envelope.introduction)
    }
}
