//! Record decoding for newline-delimited JSON generation streams.
//!
//! One decoder covers both record shapes the backend emits:
//! `{"response": "...", "done": bool}` from `/api/generate` and
//! `{"message": {"content": "..."}, "done": bool}` from `/api/chat`.
//! Dispatch is on whichever content field is present.

use serde::Deserialize;

use crate::stream::shared::{StreamError, StreamResult};

/// A decoded stream record. Transient: decoded, consumed, discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamRecord {
    /// A content fragment (possibly empty).
    Content(String),
    /// Termination marker, possibly carrying a final fragment.
    Done { fragment: Option<String> },
}

#[derive(Deserialize)]
struct RawRecord {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    message: Option<RawMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Deserialize)]
struct RawMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Decodes one reassembled line.
///
/// Returns `Ok(None)` for lines that are blank after trimming: ignored,
/// not an error. Decode failures are returned as errors for the caller to
/// record; they must never abort the stream.
pub fn decode_line(line: &[u8]) -> StreamResult<Option<StreamRecord>> {
    let text = std::str::from_utf8(line)
        .map_err(|err| StreamError::decode(format!("invalid UTF-8 in line: {err}")))?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let raw: RawRecord = serde_json::from_str(trimmed)
        .map_err(|err| StreamError::decode(format!("failed to parse record: {err}")))?;

    let fragment = raw.response.or(raw.message.and_then(|m| m.content));
    if raw.done {
        Ok(Some(StreamRecord::Done { fragment }))
    } else {
        match fragment {
            Some(fragment) => Ok(Some(StreamRecord::Content(fragment))),
            None => Err(StreamError::decode(
                "record carries neither response nor message.content",
            )),
        }
    }
}
