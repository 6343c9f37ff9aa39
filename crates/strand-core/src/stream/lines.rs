//! Byte-chunk to line reassembly.

/// Reassembles complete lines from an unbounded sequence of byte chunks.
///
/// Chunks arrive with no alignment to line boundaries; the trailing
/// fragment of each chunk is held back until its terminator arrives.
/// Lines are kept as raw bytes: a multi-byte UTF-8 sequence may split
/// across chunks, and `\n` never occurs inside one, so decoding is
/// deferred until a line is complete. Content is never inspected.
#[derive(Debug, Default)]
pub struct LineReassembler {
    pending: Vec<u8>,
}

impl LineReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk, returning every line it completes.
    ///
    /// A chunk may complete zero or many lines; a terminator landing
    /// exactly on the chunk boundary leaves an empty pending fragment.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' {
                if self.pending.last() == Some(&b'\r') {
                    self.pending.pop();
                }
                lines.push(std::mem::take(&mut self.pending));
            } else {
                self.pending.push(byte);
            }
        }
        lines
    }

    /// Flushes the retained partial line at end-of-source.
    ///
    /// Returns `None` when the source ended exactly on a terminator.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            None
        } else {
            if self.pending.last() == Some(&b'\r') {
                self.pending.pop();
            }
            Some(std::mem::take(&mut self.pending))
        }
    }
}
