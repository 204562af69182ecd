//! Runtime configuration from environment variables.

use std::path::PathBuf;

use crate::conversation::{RegenerationMode, ResetNotice};

/// Configuration for the client runtime.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the conversational backend.
    pub backend_url: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Directory the file store writes its slots into.
    pub storage_dir: PathBuf,
    /// Regeneration bubble policy.
    pub regeneration: RegenerationMode,
    /// Reset notification policy.
    pub reset_notice: ResetNotice,
}

impl ClientConfig {
    /// Load from environment variables.
    ///
    /// - `MORPHCHAT_BACKEND_URL` — backend base URL (default `http://127.0.0.1:5000`)
    /// - `MORPHCHAT_TIMEOUT_SECS` — request timeout (default 30)
    /// - `MORPHCHAT_STORAGE_DIR` — storage directory (default `.morphchat`)
    /// - `MORPHCHAT_REGENERATION` — `append` (default) or `replace`
    /// - `MORPHCHAT_RESET_NOTICE` — `silent` (default) or `notify`
    pub fn from_env() -> Self {
        Self {
            backend_url: std::env::var("MORPHCHAT_BACKEND_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:5000".into()),
            request_timeout_secs: std::env::var("MORPHCHAT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            storage_dir: std::env::var("MORPHCHAT_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".morphchat")),
            regeneration: std::env::var("MORPHCHAT_REGENERATION")
                .map(|v| parse_regeneration(&v))
                .unwrap_or_default(),
            reset_notice: std::env::var("MORPHCHAT_RESET_NOTICE")
                .map(|v| parse_reset_notice(&v))
                .unwrap_or_default(),
        }
    }
}

fn parse_regeneration(value: &str) -> RegenerationMode {
    match value.trim().to_ascii_lowercase().as_str() {
        "replace" => RegenerationMode::Replace,
        _ => RegenerationMode::Append,
    }
}

fn parse_reset_notice(value: &str) -> ResetNotice {
    match value.trim().to_ascii_lowercase().as_str() {
        "notify" => ResetNotice::Notify,
        _ => ResetNotice::Silent,
    }
}
