//! Command handlers.

pub mod chat;
pub mod config;
pub mod generate;
pub mod title;

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use strand_core::client::ByteStream;
use strand_core::fences::{self, FenceSignal, FenceTracker};
use strand_core::stream::GenerationStream;

/// Streams deltas to stdout as they arrive, reporting fence signals on
/// stderr the moment they fire, and returns the final text.
pub(crate) async fn stream_to_stdout(stream: GenerationStream<ByteStream>) -> Result<String> {
    let mut tracker = FenceTracker::new();
    let final_text = stream
        .on_content(move |delta, content| {
            print!("{delta}");
            let _ = std::io::stdout().flush();
            for signal in tracker.observe(content) {
                match signal {
                    FenceSignal::FirstFenceStarted => eprintln!("[strand] code block started"),
                    FenceSignal::FirstFenceCompleted => eprintln!("[strand] code block complete"),
                }
            }
        })
        .on_final_content(|content| {
            // keep the shell prompt off the last generated line
            if !content.ends_with('\n') {
                println!();
            }
        })
        .read()
        .await?;
    Ok(final_text)
}

/// Writes the first fenced code block of a completed response to `path`.
pub(crate) fn write_extracted_code(final_text: &str, path: &Path) -> Result<()> {
    let code = fences::first_fence_code(final_text)
        .context("response contains no fenced code block")?;
    std::fs::write(path, code).with_context(|| format!("write code to {}", path.display()))?;
    eprintln!("[strand] wrote code to {}", path.display());
    Ok(())
}
