//! Presentation surface callbacks.
//!
//! The runtime is headless; whatever renders it (terminal, GUI, web view)
//! implements [`ChatSurface`] and gets told when the transcript or the
//! stylesheet changes. All callbacks default to no-ops so a surface only
//! implements what it renders.

use crate::message::ChatMessage;

/// Callbacks a presentation layer receives from the conversation.
pub trait ChatSurface: Send {
    /// A message was appended to the transcript (also fired once per
    /// restored message during hydration).
    fn message_appended(&mut self, _message: &ChatMessage) {}

    /// The message at `index` was replaced in place (regeneration with
    /// replace policy).
    fn message_replaced(&mut self, _index: usize, _message: &ChatMessage) {}

    /// Show or hide the loading indicator for an in-flight send.
    fn set_loading(&mut self, _active: bool) {}

    /// The live stylesheet changed; `css` is the full current rule text.
    fn stylesheet_changed(&mut self, _css: &str) {}
}

/// Surface that ignores every callback. For headless use and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSurface;

impl ChatSurface for NullSurface {}
