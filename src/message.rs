//! Chat message data model.

use serde::{Deserialize, Serialize};

/// Who authored a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Bot => write!(f, "bot"),
        }
    }
}

/// A single transcript entry.
///
/// The transcript is an append-only ordered sequence; insertion order equals
/// display order. Only bot messages carry an `id`, which identifies the
/// backend message for regeneration. Ids are session-scoped and deliberately
/// excluded from the persisted form: the backend thread they point into does
/// not survive a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Backend message identifier, present on regenerable bot messages.
    #[serde(skip)]
    pub id: Option<String>,
    /// The displayed text.
    pub text: String,
    /// Message author.
    pub sender: Sender,
}

impl ChatMessage {
    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: None,
            text: text.into(),
            sender: Sender::User,
        }
    }

    /// Create a bot message, optionally tagged with its backend id.
    pub fn bot(text: impl Into<String>, id: Option<String>) -> Self {
        Self {
            id,
            text: text.into(),
            sender: Sender::Bot,
        }
    }
}

/// One reply fragment, decoded once at the transport boundary.
///
/// The wire envelope carries parallel `responses`/`messageIds` arrays; this
/// pairs them up so nothing downstream re-scans the raw shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerReply {
    /// Raw reply text, possibly containing an embedded directive.
    pub text: String,
    /// Backend id of this reply, usable for later regeneration.
    pub reply_to: Option<String>,
}
