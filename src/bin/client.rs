//! morphchat terminal client.
//!
//! A minimal REPL over the chat runtime. Plain lines are sent as messages;
//! slash commands drive the remaining operations:
//!
//! - `/regen <id>` — regenerate the bot message with that id
//! - `/reset` — clear transcript and styles
//! - `/intro` — show the backend greeting
//! - `/css` — print the live stylesheet
//! - `/quit` — exit
//!
//! # Environment Variables
//!
//! - `MORPHCHAT_BACKEND_URL` — backend base URL (default: http://127.0.0.1:5000)
//! - `MORPHCHAT_TIMEOUT_SECS` — request timeout (default: 30)
//! - `MORPHCHAT_STORAGE_DIR` — storage directory (default: .morphchat)
//! - `MORPHCHAT_REGENERATION` — "append" (default) or "replace"
//! - `MORPHCHAT_RESET_NOTICE` — "silent" (default) or "notify"
//! - `RUST_LOG` — tracing filter (default: "warn")

use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use morphchat::{
    ChatMessage, ChatSurface, ClientConfig, Conversation, FileStore, HttpTransport, Sender,
};

/// Renders the conversation as chat bubbles on stdout.
struct TerminalSurface;

impl ChatSurface for TerminalSurface {
    fn message_appended(&mut self, message: &ChatMessage) {
        match message.sender {
            Sender::User => println!("you > {}", message.text),
            Sender::Bot => match &message.id {
                Some(id) => println!("bot [{}] > {}", id, message.text),
                None => println!("bot > {}", message.text),
            },
        }
    }

    fn message_replaced(&mut self, _index: usize, message: &ChatMessage) {
        match &message.id {
            Some(id) => println!("bot [{}] (regenerated) > {}", id, message.text),
            None => println!("bot (regenerated) > {}", message.text),
        }
    }

    fn set_loading(&mut self, active: bool) {
        if active {
            println!("...");
        }
    }

    fn stylesheet_changed(&mut self, css: &str) {
        tracing::info!("stylesheet now holds {} bytes of rule text", css.len());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let config = ClientConfig::from_env();
    tracing::debug!("backend: {}", config.backend_url);

    let store = Arc::new(FileStore::new(&config.storage_dir));
    let transport = Arc::new(HttpTransport::new(
        &config.backend_url,
        Duration::from_secs(config.request_timeout_secs),
    )?);

    let mut conversation = Conversation::new(transport, store, Box::new(TerminalSurface))
        .with_regeneration_mode(config.regeneration)
        .with_reset_notice(config.reset_notice);

    println!("{}", conversation.introduction().await);
    println!("(/regen <id>, /reset, /intro, /css, /quit)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        match line.split_once(' ') {
            Some(("/regen", id)) => conversation.regenerate(id.trim()).await,
            _ => match line {
                "/quit" => break,
                "/reset" => {
                    conversation.reset().await;
                    println!("(cleared)");
                }
                "/intro" => println!("{}", conversation.introduction().await),
                "/css" => println!("{}", conversation.css()),
                _ => conversation.send(line).await,
            },
        }
    }

    Ok(())
}
