//! Conversation orchestrator.
//!
//! Ties the pieces together: user input goes out through the transport, raw
//! replies come back, the protocol parser splits them into text and style
//! commands, text lands in the transcript and commands in the style engine,
//! and both are persisted as they change.
//!
//! Per round-trip the flow is `Idle → Sending → AwaitingReply → {Settled |
//! Failed} → Idle`. Transport failures never escape: they become a single
//! fallback bot bubble. Within one send or regenerate, reply fragments are
//! processed strictly in array order, each fully applied before the next.

use std::sync::Arc;

use crate::message::{ChatMessage, ServerReply};
use crate::protocol;
use crate::store::{PersistenceStore, Slot};
use crate::style::StyleEngine;
use crate::surface::ChatSurface;
use crate::transport::Transport;

/// Fixed text of the synthetic bot message shown on transport failure.
pub const CONNECTION_ERROR_TEXT: &str = "Error connecting to the server";

/// Synthetic system message sent to the backend on a notifying reset.
pub const RESET_NOTICE_TEXT: &str = "The user has cleared the chat and reset all styles.";

/// Local greeting used when the backend introduction cannot be fetched.
pub const FALLBACK_INTRODUCTION: &str =
    "Hello! I'm your AI assistant. How can I help you customize your chat interface today?";

/// How regeneration places its replies in the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegenerationMode {
    /// Regenerated replies append new bot bubbles.
    #[default]
    Append,
    /// The first regenerated reply replaces the targeted bubble in place;
    /// any further fragments append.
    Replace,
}

/// Whether reset announces itself to the backend before clearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResetNotice {
    /// Clear locally without telling the backend.
    #[default]
    Silent,
    /// Send [`RESET_NOTICE_TEXT`] and await the acknowledgment (its content
    /// and any failure are ignored) before clearing.
    Notify,
}

/// Orchestrates one chat session over a transport, a store, and a surface.
pub struct Conversation {
    transport: Arc<dyn Transport>,
    store: Arc<dyn PersistenceStore>,
    styles: StyleEngine,
    surface: Box<dyn ChatSurface>,
    transcript: Vec<ChatMessage>,
    regeneration: RegenerationMode,
    reset_notice: ResetNotice,
}

impl Conversation {
    /// Build a conversation and hydrate it from the store.
    ///
    /// Persisted styles are replayed into the stylesheet and the persisted
    /// transcript into the surface before this returns, so restored state is
    /// in effect before the first interaction.
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn PersistenceStore>,
        mut surface: Box<dyn ChatSurface>,
    ) -> Self {
        let mut styles = StyleEngine::new(store.clone());
        styles.rehydrate();
        if !styles.css().is_empty() {
            surface.stylesheet_changed(&styles.css());
        }

        let transcript: Vec<ChatMessage> = store
            .load(Slot::Transcript)
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default();
        for message in &transcript {
            surface.message_appended(message);
        }

        Self {
            transport,
            store,
            styles,
            surface,
            transcript,
            regeneration: RegenerationMode::default(),
            reset_notice: ResetNotice::default(),
        }
    }

    /// Set the regeneration bubble policy.
    pub fn with_regeneration_mode(mut self, mode: RegenerationMode) -> Self {
        self.regeneration = mode;
        self
    }

    /// Set the reset notification policy.
    pub fn with_reset_notice(mut self, notice: ResetNotice) -> Self {
        self.reset_notice = notice;
        self
    }

    /// Submit user input.
    ///
    /// Empty or whitespace-only input is rejected before any side effect.
    /// The user message is appended optimistically before the round-trip;
    /// a transport failure yields one fallback bot bubble and never an error.
    pub async fn send(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        self.append(ChatMessage::user(text));
        self.surface.set_loading(true);
        let result = self.transport.send(text).await;
        self.surface.set_loading(false);

        match result {
            Ok(replies) => self.handle_replies(replies, None),
            Err(err) => {
                tracing::warn!("send failed: {}", err);
                self.append(ChatMessage::bot(CONNECTION_ERROR_TEXT, None));
            }
        }
    }

    /// Request a replacement reply for the bot message carrying
    /// `message_id`.
    ///
    /// Uses the same reply pipeline as [`send`](Self::send) but drives no
    /// loading state and appends no user message.
    pub async fn regenerate(&mut self, message_id: &str) {
        match self.transport.regenerate(message_id).await {
            Ok(replies) => {
                let target = match self.regeneration {
                    RegenerationMode::Replace => Some(message_id),
                    RegenerationMode::Append => None,
                };
                self.handle_replies(replies, target);
            }
            Err(err) => {
                tracing::warn!("regenerate failed: {}", err);
                self.append(ChatMessage::bot(CONNECTION_ERROR_TEXT, None));
            }
        }
    }

    /// Clear the session: both store slots, the transcript, and the
    /// stylesheet.
    ///
    /// With [`ResetNotice::Notify`] the backend is told first; its answer is
    /// discarded and a notification failure does not prevent the clear. A
    /// conversation constructed over the same store afterwards starts blank.
    pub async fn reset(&mut self) {
        if self.reset_notice == ResetNotice::Notify {
            if let Err(err) = self.transport.send(RESET_NOTICE_TEXT).await {
                tracing::warn!("reset notice failed: {}", err);
            }
        }

        if let Err(err) = self.store.remove(Slot::Transcript) {
            tracing::warn!("failed to clear transcript slot: {}", err);
        }
        if let Err(err) = self.store.remove(Slot::Styles) {
            tracing::warn!("failed to clear styles slot: {}", err);
        }

        self.transcript.clear();
        self.styles.clear();
        self.surface.stylesheet_changed("");
    }

    /// Fetch the backend greeting for the informational dialog.
    ///
    /// Falls back to a fixed local greeting when the backend cannot be
    /// reached. Never persisted.
    pub async fn introduction(&self) -> String {
        match self.transport.introduction().await {
            Ok(text) => text,
            Err(err) => {
                tracing::debug!("introduction fetch failed: {}", err);
                FALLBACK_INTRODUCTION.to_string()
            }
        }
    }

    /// The ordered transcript.
    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    /// The style engine owning the live stylesheet.
    pub fn styles(&self) -> &StyleEngine {
        &self.styles
    }

    /// Current rule text of the live stylesheet.
    pub fn css(&self) -> String {
        self.styles.css()
    }

    fn handle_replies(&mut self, replies: Vec<ServerReply>, mut replace_target: Option<&str>) {
        for reply in replies {
            let parsed = protocol::parse(&reply.text);

            for command in &parsed.commands {
                self.styles.apply(command);
            }
            if !parsed.commands.is_empty() {
                self.surface.stylesheet_changed(&self.styles.css());
            }

            // An all-directive reply produces no bubble at all.
            if parsed.text.is_empty() {
                continue;
            }

            if let Some(target) = replace_target.take() {
                if let Some(index) = self
                    .transcript
                    .iter()
                    .position(|m| m.id.as_deref() == Some(target))
                {
                    let message = ChatMessage::bot(parsed.text, reply.reply_to);
                    self.transcript[index] = message.clone();
                    self.persist_transcript();
                    self.surface.message_replaced(index, &message);
                    continue;
                }
                // Target bubble is gone (e.g. pre-restart id); fall through
                // and append instead.
            }

            self.append(ChatMessage::bot(parsed.text, reply.reply_to));
        }
    }

    fn append(&mut self, message: ChatMessage) {
        self.surface.message_appended(&message);
        self.transcript.push(message);
        self.persist_transcript();
    }

    fn persist_transcript(&self) {
        match serde_json::to_value(&self.transcript) {
            Ok(value) => {
                if let Err(err) = self.store.save(Slot::Transcript, &value) {
                    tracing::warn!("failed to persist transcript: {}", err);
                }
            }
            Err(err) => tracing::warn!("failed to serialize transcript: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    use crate::errors::TransportError;
    use crate::message::Sender;
    use crate::store::MemoryStore;
    use crate::surface::NullSurface;

    // -- test doubles -------------------------------------------------------

    #[derive(Default)]
    struct MockTransport {
        replies: Mutex<VecDeque<Result<Vec<ServerReply>, TransportError>>>,
        sent: Mutex<Vec<String>>,
        regenerated: Mutex<Vec<String>>,
        introduction: Mutex<Option<String>>,
    }

    impl MockTransport {
        fn reply_with(self, replies: Vec<ServerReply>) -> Self {
            self.replies.lock().push_back(Ok(replies));
            self
        }

        fn reply_texts(self, texts: &[(&str, Option<&str>)]) -> Self {
            let replies = texts
                .iter()
                .map(|(text, id)| ServerReply {
                    text: text.to_string(),
                    reply_to: id.map(String::from),
                })
                .collect();
            self.reply_with(replies)
        }

        fn fail_next(self) -> Self {
            self.replies
                .lock()
                .push_back(Err(TransportError::Status { status: 500 }));
            self
        }

        fn next_reply(&self) -> Result<Vec<ServerReply>, TransportError> {
            self.replies.lock().pop_front().unwrap_or_else(|| Ok(vec![]))
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, text: &str) -> Result<Vec<ServerReply>, TransportError> {
            self.sent.lock().push(text.to_string());
            self.next_reply()
        }

        async fn regenerate(&self, message_id: &str) -> Result<Vec<ServerReply>, TransportError> {
            self.regenerated.lock().push(message_id.to_string());
            self.next_reply()
        }

        async fn introduction(&self) -> Result<String, TransportError> {
            match self.introduction.lock().clone() {
                Some(text) => Ok(text),
                None => Err(TransportError::Status { status: 500 }),
            }
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSurface {
        events: std::sync::Arc<Mutex<Vec<String>>>,
    }

    impl RecordingSurface {
        fn events(&self) -> Vec<String> {
            self.events.lock().clone()
        }
    }

    impl ChatSurface for RecordingSurface {
        fn message_appended(&mut self, message: &ChatMessage) {
            self.events
                .lock()
                .push(format!("append {} {}", message.sender, message.text));
        }

        fn message_replaced(&mut self, index: usize, message: &ChatMessage) {
            self.events
                .lock()
                .push(format!("replace {} {}", index, message.text));
        }

        fn set_loading(&mut self, active: bool) {
            self.events
                .lock()
                .push(format!("loading {}", if active { "on" } else { "off" }));
        }

        fn stylesheet_changed(&mut self, css: &str) {
            self.events.lock().push(format!("css {}", css.len()));
        }
    }

    fn conversation(transport: MockTransport) -> Conversation {
        Conversation::new(
            Arc::new(transport),
            Arc::new(MemoryStore::new()),
            Box::new(NullSurface),
        )
    }

    fn texts(conversation: &Conversation) -> Vec<(String, Sender)> {
        conversation
            .transcript()
            .iter()
            .map(|m| (m.text.clone(), m.sender))
            .collect()
    }

    // -- send ---------------------------------------------------------------

    #[tokio::test]
    async fn plain_round_trip_appends_user_then_bot() {
        let transport = MockTransport::default().reply_texts(&[("hello", None)]);
        let mut conv = conversation(transport);

        conv.send("hi").await;

        assert_eq!(
            texts(&conv),
            vec![
                ("hi".to_string(), Sender::User),
                ("hello".to_string(), Sender::Bot)
            ]
        );
    }

    #[tokio::test]
    async fn empty_and_whitespace_input_are_rejected_without_side_effects() {
        let transport = MockTransport::default();
        let mut conv = conversation(transport);

        conv.send("").await;
        conv.send("   \n\t").await;

        assert!(conv.transcript().is_empty());
    }

    #[tokio::test]
    async fn input_whitespace_is_trimmed_before_sending() {
        let transport = Arc::new(MockTransport::default());
        let mut conv = Conversation::new(
            transport.clone(),
            Arc::new(MemoryStore::new()),
            Box::new(NullSurface),
        );

        conv.send("  hi  ").await;

        assert_eq!(transport.sent.lock().clone(), vec!["hi".to_string()]);
        assert_eq!(conv.transcript()[0].text, "hi");
    }

    #[tokio::test]
    async fn directive_reply_updates_styles_and_trims_text() {
        let raw = r#"Nice! UI_CHANGE:[{"action":"changeCSS","selector":".x","properties":{"color":"red"}}]"#;
        let transport = MockTransport::default().reply_texts(&[(raw, None)]);
        let store = Arc::new(MemoryStore::new());
        let mut conv =
            Conversation::new(Arc::new(transport), store.clone(), Box::new(NullSurface));

        conv.send("make .x red").await;

        assert_eq!(conv.transcript().last().unwrap().text, "Nice!");
        assert_eq!(
            store.load(Slot::Styles),
            Some(json!({".x": {"color": "red"}}))
        );
        assert!(conv.css().contains(".x {\n  color: red;\n}"));
    }

    #[tokio::test]
    async fn malformed_directive_shows_raw_text_and_leaves_styles_alone() {
        let raw = "UI_CHANGE:[bad json";
        let transport = MockTransport::default().reply_texts(&[(raw, None)]);
        let store = Arc::new(MemoryStore::new());
        let mut conv =
            Conversation::new(Arc::new(transport), store.clone(), Box::new(NullSurface));

        conv.send("hi").await;

        assert_eq!(conv.transcript().last().unwrap().text, raw);
        assert_eq!(store.load(Slot::Styles), None);
    }

    #[tokio::test]
    async fn all_directive_reply_appends_no_bubble() {
        let raw = r#"UI_CHANGE:[{"action":"changeCSS","selector":"body","properties":{"margin":"0"}}]"#;
        let transport = MockTransport::default().reply_texts(&[(raw, None)]);
        let mut conv = conversation(transport);

        conv.send("tighten it up").await;

        // Only the user message; the mutation happened silently.
        assert_eq!(texts(&conv), vec![("tighten it up".to_string(), Sender::User)]);
        assert_eq!(conv.styles().rule_count(), 1);
    }

    #[tokio::test]
    async fn transport_failure_yields_exactly_one_fallback_bubble() {
        let transport = MockTransport::default().fail_next();
        let mut conv = conversation(transport);

        conv.send("hi").await;

        assert_eq!(
            texts(&conv),
            vec![
                ("hi".to_string(), Sender::User),
                (CONNECTION_ERROR_TEXT.to_string(), Sender::Bot)
            ]
        );
    }

    #[tokio::test]
    async fn reply_fragments_are_processed_in_array_order() {
        let first = r#"UI_CHANGE:[{"action":"changeCSS","selector":".x","properties":{"color":"red"}}] one"#;
        let second = r#"UI_CHANGE:[{"action":"changeCSS","selector":".x","properties":{"color":"blue"}}] two"#;
        let transport =
            MockTransport::default().reply_texts(&[(first, Some("a")), (second, Some("b"))]);
        let store = Arc::new(MemoryStore::new());
        let mut conv =
            Conversation::new(Arc::new(transport), store.clone(), Box::new(NullSurface));

        conv.send("hi").await;

        let bot_texts: Vec<&str> = conv.transcript()[1..].iter().map(|m| m.text.as_str()).collect();
        assert_eq!(bot_texts, vec!["one", "two"]);
        // Later fragment wins the table.
        assert_eq!(
            store.load(Slot::Styles),
            Some(json!({".x": {"color": "blue"}}))
        );
        assert_eq!(conv.styles().rule_count(), 2);
    }

    #[tokio::test]
    async fn loading_indicator_wraps_the_round_trip() {
        let transport = MockTransport::default().reply_texts(&[("hello", None)]);
        let surface = RecordingSurface::default();
        let mut conv = Conversation::new(
            Arc::new(transport),
            Arc::new(MemoryStore::new()),
            Box::new(surface.clone()),
        );

        conv.send("hi").await;

        assert_eq!(
            surface.events(),
            vec![
                "append user hi".to_string(),
                "loading on".to_string(),
                "loading off".to_string(),
                "append bot hello".to_string(),
            ]
        );
    }

    // -- regeneration -------------------------------------------------------

    #[tokio::test]
    async fn regenerate_appends_without_user_message_or_loading() {
        let transport = Arc::new(MockTransport::default().reply_texts(&[("take two", Some("msg-1"))]));
        let surface = RecordingSurface::default();
        let mut conv = Conversation::new(
            transport.clone(),
            Arc::new(MemoryStore::new()),
            Box::new(surface.clone()),
        );

        conv.regenerate("msg-1").await;

        assert_eq!(transport.regenerated.lock().clone(), vec!["msg-1".to_string()]);
        assert_eq!(texts(&conv), vec![("take two".to_string(), Sender::Bot)]);
        assert!(surface.events().iter().all(|e| !e.starts_with("loading")));
    }

    #[tokio::test]
    async fn regenerate_replace_rewrites_the_bubble_in_place() {
        let transport = MockTransport::default()
            .reply_texts(&[("first answer", Some("msg-1"))])
            .reply_texts(&[("better answer", Some("msg-2"))]);
        let surface = RecordingSurface::default();
        let mut conv = Conversation::new(
            Arc::new(transport),
            Arc::new(MemoryStore::new()),
            Box::new(surface.clone()),
        )
        .with_regeneration_mode(RegenerationMode::Replace);

        conv.send("hi").await;
        assert_eq!(conv.transcript().len(), 2);

        conv.regenerate("msg-1").await;

        assert_eq!(conv.transcript().len(), 2);
        assert_eq!(conv.transcript()[1].text, "better answer");
        assert_eq!(conv.transcript()[1].id.as_deref(), Some("msg-2"));
        assert!(surface.events().contains(&"replace 1 better answer".to_string()));
    }

    #[tokio::test]
    async fn regenerate_replace_falls_back_to_append_when_target_is_gone() {
        let transport = MockTransport::default().reply_texts(&[("fresh", Some("msg-9"))]);
        let mut conv = conversation(transport).with_regeneration_mode(RegenerationMode::Replace);

        conv.regenerate("no-such-id").await;

        assert_eq!(texts(&conv), vec![("fresh".to_string(), Sender::Bot)]);
    }

    #[tokio::test]
    async fn regenerate_failure_yields_fallback_bubble() {
        let transport = MockTransport::default().fail_next();
        let mut conv = conversation(transport);

        conv.regenerate("msg-1").await;

        assert_eq!(
            texts(&conv),
            vec![(CONNECTION_ERROR_TEXT.to_string(), Sender::Bot)]
        );
    }

    // -- hydration ----------------------------------------------------------

    #[tokio::test]
    async fn transcript_survives_a_restart() {
        let store = Arc::new(MemoryStore::new());
        let transport = MockTransport::default().reply_texts(&[("hello", Some("msg-1"))]);
        let mut conv =
            Conversation::new(Arc::new(transport), store.clone(), Box::new(NullSurface));
        conv.send("hi").await;
        let before = texts(&conv);
        drop(conv);

        let revived = Conversation::new(
            Arc::new(MockTransport::default()),
            store,
            Box::new(NullSurface),
        );

        assert_eq!(texts(&revived), before);
        // Ids are session-scoped and do not survive the restart.
        assert!(revived.transcript().iter().all(|m| m.id.is_none()));
    }

    #[tokio::test]
    async fn styles_are_in_effect_before_first_interaction() {
        let store = Arc::new(MemoryStore::new());
        store
            .save(Slot::Styles, &json!({"body": {"color": "red"}}))
            .unwrap();
        let surface = RecordingSurface::default();

        let conv = Conversation::new(
            Arc::new(MockTransport::default()),
            store,
            Box::new(surface.clone()),
        );

        assert!(conv.css().contains("color: red"));
        assert!(surface.events().first().unwrap().starts_with("css"));
    }

    #[tokio::test]
    async fn hydration_replays_restored_messages_to_the_surface() {
        let store = Arc::new(MemoryStore::new());
        store
            .save(
                Slot::Transcript,
                &json!([
                    {"text": "hi", "sender": "user"},
                    {"text": "hello", "sender": "bot"}
                ]),
            )
            .unwrap();
        let surface = RecordingSurface::default();

        let _conv = Conversation::new(
            Arc::new(MockTransport::default()),
            store,
            Box::new(surface.clone()),
        );

        assert_eq!(
            surface.events(),
            vec!["append user hi".to_string(), "append bot hello".to_string()]
        );
    }

    #[tokio::test]
    async fn corrupt_transcript_slot_hydrates_empty() {
        let store = Arc::new(MemoryStore::new());
        store.save(Slot::Transcript, &json!("garbage")).unwrap();

        let conv = Conversation::new(
            Arc::new(MockTransport::default()),
            store,
            Box::new(NullSurface),
        );

        assert!(conv.transcript().is_empty());
    }

    // -- reset --------------------------------------------------------------

    #[tokio::test]
    async fn reset_clears_both_slots_and_the_next_session_is_blank() {
        let raw = r#"ok UI_CHANGE:[{"action":"changeCSS","selector":".x","properties":{"color":"red"}}]"#;
        let store = Arc::new(MemoryStore::new());
        let transport = MockTransport::default().reply_texts(&[(raw, None)]);
        let mut conv =
            Conversation::new(Arc::new(transport), store.clone(), Box::new(NullSurface));
        conv.send("hi").await;

        conv.reset().await;

        assert_eq!(store.load(Slot::Transcript), None);
        assert_eq!(store.load(Slot::Styles), None);
        assert!(conv.transcript().is_empty());
        assert!(conv.css().is_empty());

        let blank = Conversation::new(
            Arc::new(MockTransport::default()),
            store,
            Box::new(NullSurface),
        );
        assert!(blank.transcript().is_empty());
        assert!(blank.css().is_empty());
    }

    #[tokio::test]
    async fn silent_reset_does_not_contact_the_backend() {
        let transport = Arc::new(MockTransport::default());
        let mut conv = Conversation::new(
            transport.clone(),
            Arc::new(MemoryStore::new()),
            Box::new(NullSurface),
        );

        conv.reset().await;

        assert!(transport.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn notifying_reset_sends_the_notice_first() {
        let transport = Arc::new(MockTransport::default());
        let mut conv = Conversation::new(
            transport.clone(),
            Arc::new(MemoryStore::new()),
            Box::new(NullSurface),
        )
        .with_reset_notice(ResetNotice::Notify);

        conv.reset().await;

        assert_eq!(
            transport.sent.lock().clone(),
            vec![RESET_NOTICE_TEXT.to_string()]
        );
    }

    #[tokio::test]
    async fn notice_failure_does_not_prevent_the_clear() {
        let store = Arc::new(MemoryStore::new());
        store.save(Slot::Transcript, &json!([])).unwrap();
        let transport = Arc::new(MockTransport::default().fail_next());
        let mut conv = Conversation::new(transport, store.clone(), Box::new(NullSurface))
            .with_reset_notice(ResetNotice::Notify);

        conv.reset().await;

        assert_eq!(store.load(Slot::Transcript), None);
        assert!(conv.transcript().is_empty());
    }

    // -- introduction -------------------------------------------------------

    #[tokio::test]
    async fn introduction_prefers_the_backend_greeting() {
        let transport = MockTransport::default();
        *transport.introduction.lock() = Some("Welcome back!".to_string());
        let conv = conversation(transport);

        assert_eq!(conv.introduction().await, "Welcome back!");
    }

    #[tokio::test]
    async fn introduction_falls_back_locally_on_failure() {
        let conv = conversation(MockTransport::default());
        assert_eq!(conv.introduction().await, FALLBACK_INTRODUCTION);
    }
}
