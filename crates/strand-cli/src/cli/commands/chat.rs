//! Chat command handler.

use std::path::Path;

use anyhow::Result;
use strand_core::client::{ChatMessage, OllamaClient};
use strand_core::config::Config;

use super::{stream_to_stdout, write_extracted_code};

pub async fn run(
    config: &Config,
    prompt: &str,
    system: Option<&str>,
    out: Option<&Path>,
) -> Result<()> {
    let mut messages = Vec::new();
    if let Some(system) = system.or(config.system_prompt.as_deref()) {
        messages.push(ChatMessage::system(system));
    }
    messages.push(ChatMessage::user(prompt));

    let client = OllamaClient::new(&config.base_url, &config.model);
    let stream = client.chat(&messages).await?;

    let final_text = stream_to_stdout(stream).await?;

    if let Some(path) = out {
        write_extracted_code(&final_text, path)?;
    }
    Ok(())
}
