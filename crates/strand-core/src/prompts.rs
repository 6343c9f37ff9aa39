//! Prompt templates bundled with the library.

pub const TITLE_PROMPT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/title_prompt.md"
));
