//! Title generation for new chats.
//!
//! A one-shot, handler-free consumption of the same generation stream:
//! the collected completion is sanitized down to a single usable line.

use anyhow::{Result, anyhow};

use crate::client::{ChatMessage, OllamaClient};
use crate::prompts::TITLE_PROMPT;

/// Generates a short chat title for a user prompt.
///
/// # Errors
/// Returns an error if the request fails or the model produced an
/// empty/invalid title.
pub async fn generate_title(client: &OllamaClient, prompt: &str) -> Result<String> {
    let messages = [ChatMessage::system(TITLE_PROMPT), ChatMessage::user(prompt)];
    let raw = client.chat(&messages).await?.collect().await?;
    sanitize_title(&raw)
}

fn sanitize_title(raw: &str) -> Result<String> {
    let mut line = raw
        .lines()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| anyhow!("Empty title generated"))?
        .trim()
        .to_string();

    for prefix in ["title:", "Title:"] {
        if let Some(rest) = line.strip_prefix(prefix) {
            line = rest.trim().to_string();
            break;
        }
    }

    let trimmed = line
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
        .trim()
        .to_string();

    if trimmed.is_empty() {
        Err(anyhow!("Title is empty after sanitization"))
    } else {
        Ok(trimmed)
    }
}
