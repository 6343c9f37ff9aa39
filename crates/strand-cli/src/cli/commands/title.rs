//! Title command handler.

use anyhow::Result;
use strand_core::client::OllamaClient;
use strand_core::config::Config;
use strand_core::title::generate_title;

pub async fn run(config: &Config, prompt: &str) -> Result<()> {
    let client = OllamaClient::new(&config.base_url, &config.model);
    let title = generate_title(&client, prompt).await?;
    println!("{title}");
    Ok(())
}
