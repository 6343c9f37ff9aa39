//! Incremental generation-stream processing.
//!
//! Raw bytes from a streaming generation endpoint flow through line
//! reassembly, record decoding, and accumulation into ordered delta
//! events and one final text value, tolerant of arbitrary chunk
//! fragmentation and malformed lines.

mod engine;
mod lines;
mod ndjson;
mod shared;

pub use engine::{ContentEvent, GenerationStream, StreamState};
pub use lines::LineReassembler;
pub use ndjson::{StreamRecord, decode_line};
pub use shared::{StreamError, StreamErrorKind, StreamResult};
