//! Generate command handler.

use std::path::Path;

use anyhow::Result;
use strand_core::client::OllamaClient;
use strand_core::config::Config;

use super::{stream_to_stdout, write_extracted_code};

pub async fn run(config: &Config, prompt: &str, out: Option<&Path>) -> Result<()> {
    let client = OllamaClient::new(&config.base_url, &config.model);
    let stream = client.generate(prompt).await?;

    let final_text = stream_to_stdout(stream).await?;

    if let Some(path) = out {
        write_extracted_code(&final_text, path)?;
    }
    Ok(())
}
