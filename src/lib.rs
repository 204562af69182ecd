//! # morphchat
//!
//! Client runtime for a chat interface whose backend can restyle the client
//! over the wire. Bot replies may embed a `UI_CHANGE:` directive carrying
//! CSS mutations; the runtime extracts those, applies them to a live
//! append-only stylesheet, and persists both the transcript and the latest
//! style state so a restarted session reproduces conversation and styling
//! identically.
//!
//! The pieces compose explicitly: a [`Transport`] reaches the backend, the
//! [`protocol`] module splits replies into text and [`StyleCommand`]s, a
//! [`StyleEngine`] owns the stylesheet, a [`PersistenceStore`] provides the
//! two durable slots, and [`Conversation`] orchestrates the lot against a
//! [`ChatSurface`] for presentation.

pub mod config;
pub mod conversation;
pub mod errors;
pub mod message;
pub mod protocol;
pub mod store;
pub mod style;
pub mod surface;
pub mod transport;

pub use config::ClientConfig;
pub use conversation::{
    Conversation, RegenerationMode, ResetNotice, CONNECTION_ERROR_TEXT, FALLBACK_INTRODUCTION,
    RESET_NOTICE_TEXT,
};
pub use errors::{StoreError, TransportError};
pub use message::{ChatMessage, Sender, ServerReply};
pub use protocol::{parse, ParsedReply, DIRECTIVE_MARKER};
pub use store::{FileStore, MemoryStore, PersistenceStore, Slot};
pub use style::{StyleCommand, StyleEngine, StyleTable};
pub use surface::{ChatSurface, NullSurface};
pub use transport::{HttpTransport, Transport};
