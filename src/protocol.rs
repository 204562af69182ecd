//! Reply directive parsing.
//!
//! Bot replies are free text that may carry an embedded UI-mutation
//! directive anywhere in the string:
//!
//! ```text
//! Nice! UI_CHANGE:[{"action":"changeCSS","selector":".x","properties":{"color":"red"}}]
//! ```
//!
//! [`parse`] splits such a reply into the human-visible text and the command
//! list. A malformed payload degrades to showing the raw reply unmodified
//! rather than hiding what the backend said; it is never an error.

use crate::style::StyleCommand;

/// Marker token that introduces an embedded command payload.
pub const DIRECTIVE_MARKER: &str = "UI_CHANGE:";

/// Outcome of parsing one raw reply fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    /// Displayable text, directive excised and whitespace trimmed. May be
    /// empty when the whole reply was a directive.
    pub text: String,
    /// Extracted commands in source array order. Order matters: it decides
    /// final cascade precedence for colliding selector/property pairs.
    pub commands: Vec<StyleCommand>,
}

impl ParsedReply {
    fn plain(raw: &str) -> Self {
        Self {
            text: raw.to_string(),
            commands: Vec::new(),
        }
    }
}

/// Split a raw bot reply into displayable text and embedded commands.
pub fn parse(raw: &str) -> ParsedReply {
    let Some(marker) = raw.find(DIRECTIVE_MARKER) else {
        return ParsedReply::plain(raw);
    };

    let after = &raw[marker + DIRECTIVE_MARKER.len()..];
    let Some((start, end)) = balanced_array(after) else {
        tracing::debug!("directive marker without a balanced JSON array; showing raw text");
        return ParsedReply::plain(raw);
    };

    match serde_json::from_str::<Vec<StyleCommand>>(&after[start..end]) {
        Ok(commands) => {
            let mut text = String::with_capacity(raw.len());
            text.push_str(&raw[..marker]);
            text.push_str(&after[end..]);
            ParsedReply {
                text: text.trim().to_string(),
                commands,
            }
        }
        Err(err) => {
            tracing::debug!("malformed directive payload ({}); showing raw text", err);
            ParsedReply::plain(raw)
        }
    }
}

/// Locate the first `[` and its balanced closing `]`.
///
/// Tracks JSON string state so brackets inside property values (e.g.
/// `"content": "[hi]"`) do not close the payload early. Returns byte
/// offsets into `s`, end exclusive.
fn balanced_array(s: &str) -> Option<(usize, usize)> {
    let start = s.find('[')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some((start, start + i + 1));
                }
            }
            _ => {}
        }
    }
    None
}
