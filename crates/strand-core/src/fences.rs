//! First-code-fence classification over accumulated generation text.
//!
//! Classification is recomputed from the full accumulated text on every
//! call. Nothing is threaded incrementally, so a fence marker split
//! across deltas is detected as soon as the text contains it whole, and
//! the classifier can never drift from the text it describes. The
//! re-scan cost is accepted: total generation length is bounded by
//! completion length, thousands of characters, not millions.

const FENCE_DELIMITER: &str = "```";

/// A classified span of accumulated text.
///
/// Segments are derived values, recomputed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FenceSegment {
    /// Prose outside any code fence.
    Text { text: String },
    /// The first fence's opening marker line, still being streamed
    /// (no terminator yet).
    FirstFenceOpening { language: Option<String> },
    /// The first fence is open; its closing marker has not appeared.
    FirstFenceGenerating { language: Option<String>, code: String },
    /// The first fence, both markers present.
    FirstFenceComplete { language: Option<String>, code: String },
    /// A fence after the first.
    LaterFence {
        language: Option<String>,
        code: String,
        closed: bool,
    },
}

struct OpenFence {
    language: Option<String>,
    code: String,
    first: bool,
}

/// Splits accumulated text into alternating prose and fence segments.
///
/// A fence marker is a line consisting solely of the delimiter,
/// optionally followed by a language tag. A closing marker is the bare
/// delimiter. An unterminated fence at end of text classifies as
/// generating and is never promoted to complete.
pub fn split_by_first_fence(content: &str) -> Vec<FenceSegment> {
    let mut segments = Vec::new();
    let mut prose = String::new();
    let mut open: Option<OpenFence> = None;
    let mut seen_fences = 0usize;

    for piece in content.split_inclusive('\n') {
        let (line, terminated) = match piece.strip_suffix('\n') {
            Some(line) => (line.strip_suffix('\r').unwrap_or(line), true),
            None => (piece, false),
        };

        if open.is_some() {
            if terminated && is_closing_marker(line) {
                let fence = open.take().expect("fence is open");
                segments.push(if fence.first {
                    FenceSegment::FirstFenceComplete {
                        language: fence.language,
                        code: fence.code,
                    }
                } else {
                    FenceSegment::LaterFence {
                        language: fence.language,
                        code: fence.code,
                        closed: true,
                    }
                });
            } else if let Some(fence) = open.as_mut() {
                fence.code.push_str(piece);
            }
        } else if terminated && let Some(language) = parse_fence_marker(line) {
            flush_prose(&mut segments, &mut prose);
            seen_fences += 1;
            open = Some(OpenFence {
                language,
                code: String::new(),
                first: seen_fences == 1,
            });
        } else if !terminated && seen_fences == 0 && let Some(language) = parse_fence_marker(line) {
            flush_prose(&mut segments, &mut prose);
            segments.push(FenceSegment::FirstFenceOpening { language });
        } else {
            prose.push_str(piece);
        }
    }

    if let Some(fence) = open {
        segments.push(if fence.first {
            FenceSegment::FirstFenceGenerating {
                language: fence.language,
                code: fence.code,
            }
        } else {
            FenceSegment::LaterFence {
                language: fence.language,
                code: fence.code,
                closed: false,
            }
        });
    } else {
        flush_prose(&mut segments, &mut prose);
    }

    segments
}

fn flush_prose(segments: &mut Vec<FenceSegment>, prose: &mut String) {
    if !prose.is_empty() {
        segments.push(FenceSegment::Text {
            text: std::mem::take(prose),
        });
    }
}

/// Parses a fence marker line: the delimiter plus an optional language
/// tag (a single token, no whitespace, no backticks). Returns the tag.
fn parse_fence_marker(line: &str) -> Option<Option<String>> {
    let tag = line.strip_prefix(FENCE_DELIMITER)?.trim_end();
    if tag.is_empty() {
        Some(None)
    } else if tag.contains(char::is_whitespace) || tag.contains('`') {
        None
    } else {
        Some(Some(tag.to_string()))
    }
}

fn is_closing_marker(line: &str) -> bool {
    line.trim_end() == FENCE_DELIMITER
}

/// Whether the first fence has opened (its marker line is complete).
pub fn first_fence_started(segments: &[FenceSegment]) -> bool {
    segments.iter().any(|s| {
        matches!(
            s,
            FenceSegment::FirstFenceGenerating { .. } | FenceSegment::FirstFenceComplete { .. }
        )
    })
}

/// Whether the first fence's closing marker has appeared.
pub fn first_fence_completed(segments: &[FenceSegment]) -> bool {
    segments
        .iter()
        .any(|s| matches!(s, FenceSegment::FirstFenceComplete { .. }))
}

/// The first fence's code text, if the first fence has opened.
pub fn first_fence_code(content: &str) -> Option<String> {
    split_by_first_fence(content)
        .into_iter()
        .find_map(|segment| match segment {
            FenceSegment::FirstFenceGenerating { code, .. }
            | FenceSegment::FirstFenceComplete { code, .. } => Some(code),
            _ => None,
        })
}

/// Strips fence markers from a completed response: the first fence's
/// code body when one exists, the trimmed text otherwise.
pub fn strip_fences(content: &str) -> String {
    match first_fence_code(content) {
        Some(code) => code.trim().to_string(),
        None => content.trim().to_string(),
    }
}

/// Fence lifecycle signals derived from successive classifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceSignal {
    /// The first fence's opening marker has been seen; its closing
    /// marker has not. At most once per stream.
    FirstFenceStarted,
    /// The first fence's closing marker has appeared. At most once.
    FirstFenceCompleted,
}

/// Edge detector turning idempotent classifications into at-most-once
/// signals, observed against the latest accumulated text on each delta.
#[derive(Debug, Default)]
pub struct FenceTracker {
    started: bool,
    completed: bool,
}

impl FenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observes the latest accumulated text, returning signals that
    /// became true on this delta. Both signals can fire from a single
    /// observation when marker pairs arrive in one fragment.
    pub fn observe(&mut self, content: &str) -> Vec<FenceSignal> {
        let segments = split_by_first_fence(content);
        let mut fired = Vec::new();
        if !self.started && first_fence_started(&segments) {
            self.started = true;
            fired.push(FenceSignal::FirstFenceStarted);
        }
        if !self.completed && first_fence_completed(&segments) {
            self.completed = true;
            fired.push(FenceSignal::FirstFenceCompleted);
        }
        fired
    }
}
