//! Error types shared across the generation stream engine.

use std::fmt;

use serde_json::Value;

/// Categories of stream failures for consistent error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamErrorKind {
    /// Upstream returned a non-success HTTP status before streaming began
    HttpStatus,
    /// The upstream response never produced a readable body
    NoBody,
    /// The underlying byte source failed mid-stream
    Transport,
    /// A line could not be decoded as a record
    Decode,
}

impl fmt::Display for StreamErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamErrorKind::HttpStatus => write!(f, "http_status"),
            StreamErrorKind::NoBody => write!(f, "no_body"),
            StreamErrorKind::Transport => write!(f, "transport"),
            StreamErrorKind::Decode => write!(f, "decode"),
        }
    }
}

/// Structured stream failure with kind and details.
#[derive(Debug, Clone)]
pub struct StreamError {
    /// Error category
    pub kind: StreamErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Optional additional details (e.g., raw error body, skipped lines)
    pub details: Option<String>,
}

impl StreamError {
    /// Creates a new stream error.
    pub fn new(kind: StreamErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates an HTTP status error from the upstream response.
    ///
    /// The backend reports failures as `{"error": "..."}` (or, behind some
    /// proxies, `{"error": {"message": "..."}}`); either form is folded into
    /// the summary when present.
    pub fn http_status(status: u16, body: &str) -> Self {
        let message = format!("HTTP {status}");
        let details = if body.is_empty() {
            None
        } else {
            if let Ok(json) = serde_json::from_str::<Value>(body)
                && let Some(error) = json.get("error")
                && let Some(msg) = error
                    .as_str()
                    .or_else(|| error.get("message").and_then(|v| v.as_str()))
            {
                return Self {
                    kind: StreamErrorKind::HttpStatus,
                    message: format!("HTTP {status}: {msg}"),
                    details: Some(body.to_string()),
                };
            }
            Some(body.to_string())
        };
        Self {
            kind: StreamErrorKind::HttpStatus,
            message,
            details,
        }
    }

    /// Creates a "no body" error (source never produced a readable stream).
    pub fn no_body() -> Self {
        Self::new(StreamErrorKind::NoBody, "response has no body")
    }

    /// Creates a transport error (the read loop broke mid-stream).
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(StreamErrorKind::Transport, message)
    }

    /// Creates a decode error for a single undecodable line.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(StreamErrorKind::Decode, message)
    }

    /// Aggregates the decode errors observed over one stream.
    pub fn aggregate_decode(errors: &[StreamError]) -> Self {
        let details = errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            kind: StreamErrorKind::Decode,
            message: format!("{} undecodable line(s) in stream", errors.len()),
            details: Some(details),
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StreamError {}

/// Result type for stream operations.
pub type StreamResult<T> = std::result::Result<T, StreamError>;
