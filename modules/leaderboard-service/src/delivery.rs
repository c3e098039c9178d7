//! Report delivery to the chat channel.

use async_trait::async_trait;
use serenity::all::{ChannelId, Http};
use std::sync::Arc;

/// Discord rejects messages longer than this
const DISCORD_MAX_MESSAGE_LEN: usize = 2000;

/// Best-effort sink for rendered report text
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(&self, text: &str) -> Result<(), String>;

    fn name(&self) -> &'static str;
}

/// Posts to one Discord channel through the REST API
pub struct DiscordDelivery {
    http: Arc<Http>,
    channel_id: ChannelId,
}

impl DiscordDelivery {
    pub fn new(token: &str, channel_id: u64) -> Self {
        Self {
            http: Arc::new(Http::new(token)),
            channel_id: ChannelId::new(channel_id),
        }
    }
}

#[async_trait]
impl Delivery for DiscordDelivery {
    async fn deliver(&self, text: &str) -> Result<(), String> {
        for chunk in split_message(text, DISCORD_MAX_MESSAGE_LEN) {
            self.channel_id
                .say(&self.http, chunk)
                .await
                .map_err(|e| format!("Discord send to {} failed: {}", self.channel_id, e))?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}

/// Used when no chat channel is configured
pub struct LogDelivery;

#[async_trait]
impl Delivery for LogDelivery {
    async fn deliver(&self, text: &str) -> Result<(), String> {
        log::info!("[LEADERBOARD] Report:\n{}", text);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Split text into chunks of at most `max_chars` characters, breaking on
/// line boundaries where possible
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in text.lines() {
        let line_len = line.chars().count();
        let needed = if current.is_empty() { line_len } else { line_len + 1 };

        if current_len + needed <= max_chars {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
            current_len += needed;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len <= max_chars {
            current.push_str(line);
            current_len = line_len;
        } else {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
