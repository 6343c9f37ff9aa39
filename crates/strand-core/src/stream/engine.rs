//! Generation stream engine: explicit state machine plus driver loop.
//!
//! `StreamState` is threaded by value through pure transition functions
//! (`apply_chunk`, `apply_record`, `flush`); `GenerationStream` is the
//! thin imperative driver that pumps the byte source and dispatches
//! subscriber callbacks.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::stream::lines::LineReassembler;
use crate::stream::ndjson::{self, StreamRecord};
use crate::stream::shared::{StreamError, StreamResult};

/// One content notification: the fragment just applied and the full
/// accumulated text after applying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentEvent {
    pub delta: String,
    pub content: String,
}

/// State for one in-flight generation.
///
/// Owned by exactly one engine instance for the lifetime of one request.
/// `content` is append-only: previously emitted characters never change.
#[derive(Debug, Default)]
pub struct StreamState {
    lines: LineReassembler,
    content: String,
    terminated: bool,
    decode_errors: Vec<StreamError>,
}

impl StreamState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The accumulated text so far.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Whether an explicit termination marker has been seen.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Decode errors collected so far (skipped lines).
    pub fn decode_errors(&self) -> &[StreamError] {
        &self.decode_errors
    }

    pub fn into_content(self) -> String {
        self.content
    }

    /// Applies one raw chunk, returning the content events it completes.
    ///
    /// Lines that fail to decode are collected as decode errors, never
    /// fatal. Lines after a termination marker are ignored.
    pub fn apply_chunk(mut self, chunk: &[u8]) -> (Self, Vec<ContentEvent>) {
        let mut events = Vec::new();
        let complete = self.lines.push(chunk);
        for line in complete {
            if self.terminated {
                break;
            }
            if let Some(event) = self.apply_line(&line) {
                events.push(event);
            }
        }
        (self, events)
    }

    /// Applies one decoded record.
    ///
    /// A termination record's own fragment, when present and non-empty,
    /// is applied as a final content delta before the state is marked
    /// terminated.
    pub fn apply_record(mut self, record: StreamRecord) -> (Self, Option<ContentEvent>) {
        let event = match record {
            StreamRecord::Content(fragment) => Some(self.append(fragment)),
            StreamRecord::Done { fragment } => {
                let event = fragment.filter(|f| !f.is_empty()).map(|f| self.append(f));
                self.terminated = true;
                event
            }
        };
        (self, event)
    }

    /// Flushes the retained partial line at end-of-source, parsing it as
    /// if it had been terminated.
    pub fn flush(mut self) -> (Self, Option<ContentEvent>) {
        let event = match self.lines.finish() {
            Some(line) if !self.terminated => self.apply_line(&line),
            _ => None,
        };
        (self, event)
    }

    fn apply_line(&mut self, line: &[u8]) -> Option<ContentEvent> {
        match ndjson::decode_line(line) {
            Ok(Some(record)) => {
                let (state, event) = std::mem::take(self).apply_record(record);
                *self = state;
                event
            }
            Ok(None) => None,
            Err(err) => {
                warn!(error = %err, "skipping undecodable stream line");
                self.decode_errors.push(err);
                None
            }
        }
    }

    fn append(&mut self, fragment: String) -> ContentEvent {
        self.content.push_str(&fragment);
        ContentEvent {
            delta: fragment,
            content: self.content.clone(),
        }
    }
}

type ContentHandler = Box<dyn FnMut(&str, &str) + Send>;
type FinalContentHandler = Box<dyn FnMut(&str) + Send>;

/// Drives one generation stream, dispatching deltas to subscribers.
///
/// One instance owns one upstream byte source for one in-flight
/// generation; the calling layer enforces one engine per generation.
/// Cancellation is dropping the instance: best-effort early exit, no
/// retry. The engine imposes no timeout of its own; callers may wrap
/// `read()` and treat expiry as forced termination.
pub struct GenerationStream<S> {
    source: S,
    state: StreamState,
    on_content: Option<ContentHandler>,
    on_final_content: Option<FinalContentHandler>,
}

impl<S> std::fmt::Debug for GenerationStream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationStream")
            .field("state", &self.state)
            .field("on_content", &self.on_content.is_some())
            .field("on_final_content", &self.on_final_content.is_some())
            .finish_non_exhaustive()
    }
}

impl<S, E> GenerationStream<S>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    pub fn new(source: S) -> Self {
        Self {
            source,
            state: StreamState::new(),
            on_content: None,
            on_final_content: None,
        }
    }

    /// Wraps a source that may be absent.
    ///
    /// # Errors
    /// Fails with a "no body" error when the transport never produced a
    /// readable stream, before any event can fire.
    pub fn from_body(body: Option<S>) -> StreamResult<Self> {
        body.map(Self::new).ok_or_else(StreamError::no_body)
    }

    /// Registers the `content` handler, invoked once per decoded content
    /// record with `(delta, content_so_far)`. One handler per event;
    /// re-registration silently replaces.
    pub fn on_content(mut self, handler: impl FnMut(&str, &str) + Send + 'static) -> Self {
        self.on_content = Some(Box::new(handler));
        self
    }

    /// Registers the `final_content` handler, invoked exactly once at
    /// stream end with the final accumulated text. Re-registration
    /// silently replaces.
    pub fn on_final_content(mut self, handler: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_final_content = Some(Box::new(handler));
        self
    }

    /// Pumps the source to completion and returns the final text.
    ///
    /// Content handlers run synchronously in strict arrival order; each
    /// runs to completion before the next delta is processed. The
    /// `final_content` handler fires exactly once, after the last
    /// `content` notification, regardless of whether the stream ended
    /// with an explicit termination marker, ran out of source bytes, or
    /// hit a transport failure; only then is a failure returned.
    ///
    /// # Errors
    /// Returns a transport error if the underlying read failed, or an
    /// aggregate decode error if undecodable lines were observed and the
    /// stream ended without a termination marker.
    pub async fn read(mut self) -> StreamResult<String> {
        let result = self.pump().await;

        if let Some(handler) = self.on_final_content.as_mut() {
            handler(self.state.content());
        }

        result?;

        if !self.state.is_terminated() && !self.state.decode_errors().is_empty() {
            return Err(StreamError::aggregate_decode(self.state.decode_errors()));
        }
        debug!(len = self.state.content().len(), "generation stream complete");
        Ok(self.state.into_content())
    }

    /// Handler-free consumption: pumps the stream and returns only the
    /// final text. Identical semantics to `read()` minus callbacks.
    pub async fn collect(mut self) -> StreamResult<String> {
        self.on_content = None;
        self.on_final_content = None;
        self.read().await
    }

    async fn pump(&mut self) -> StreamResult<()> {
        while !self.state.is_terminated() {
            match self.source.next().await {
                Some(Ok(chunk)) => {
                    let (state, events) = std::mem::take(&mut self.state).apply_chunk(&chunk);
                    self.state = state;
                    self.dispatch(events);
                }
                Some(Err(err)) => {
                    return Err(StreamError::transport(format!("stream read failed: {err}")));
                }
                None => {
                    let (state, event) = std::mem::take(&mut self.state).flush();
                    self.state = state;
                    self.dispatch(event);
                    break;
                }
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, events: impl IntoIterator<Item = ContentEvent>) {
        if let Some(handler) = self.on_content.as_mut() {
            for event in events {
                handler(&event.delta, &event.content);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::stream::shared::StreamErrorKind;

    type MockStream = futures_util::stream::Iter<std::vec::IntoIter<Result<Bytes, std::io::Error>>>;

    /// Chunks `data` into pieces of `size` bytes to simulate fragmented
    /// delivery with no alignment to line boundaries.
    fn mock_byte_stream(data: &str, size: usize) -> MockStream {
        let chunks: Vec<Result<Bytes, std::io::Error>> = data
            .as_bytes()
            .chunks(size)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        futures_util::stream::iter(chunks)
    }

    fn failing_stream(prefix: &str) -> MockStream {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::copy_from_slice(prefix.as_bytes())),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            )),
        ];
        futures_util::stream::iter(chunks)
    }

    /// Event log shared with handlers: "content:<delta>|<content>" and
    /// "final:<content>" entries in dispatch order.
    fn event_log() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn logging_stream(source: MockStream, log: &Arc<Mutex<Vec<String>>>) -> GenerationStream<MockStream> {
        let content_log = Arc::clone(log);
        let final_log = Arc::clone(log);
        GenerationStream::new(source)
            .on_content(move |delta, content| {
                content_log
                    .lock()
                    .unwrap()
                    .push(format!("content:{delta}|{content}"));
            })
            .on_final_content(move |content| {
                final_log.lock().unwrap().push(format!("final:{content}"));
            })
    }

    const HELLO_WORLD: &str = concat!(
        "{\"message\":{\"content\":\"Hello\"}}\n",
        "{\"message\":{\"content\":\" world\"}}\n",
        "{\"done\":true}\n",
    );

    #[tokio::test]
    async fn emits_exact_event_sequence() {
        let log = event_log();
        let stream = logging_stream(mock_byte_stream(HELLO_WORLD, 4096), &log);

        let final_text = stream.read().await.unwrap();

        assert_eq!(final_text, "Hello world");
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "content:Hello|Hello",
                "content: world|Hello world",
                "final:Hello world",
            ]
        );
    }

    #[tokio::test]
    async fn final_content_is_chunk_boundary_invariant() {
        let mut results = Vec::new();
        for size in [1, 2, 3, 5, 7, 16, 64, 4096] {
            let stream = GenerationStream::new(mock_byte_stream(HELLO_WORLD, size));
            results.push(stream.read().await.unwrap());
        }
        assert!(results.iter().all(|r| r == "Hello world"));
    }

    #[tokio::test]
    async fn content_is_monotonically_non_decreasing() {
        let lengths = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&lengths);
        let stream = GenerationStream::new(mock_byte_stream(HELLO_WORLD, 3))
            .on_content(move |_, content| recorded.lock().unwrap().push(content.len()));

        stream.read().await.unwrap();

        let lengths = lengths.lock().unwrap();
        assert!(lengths.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn exactly_one_final_after_last_content() {
        let log = event_log();
        let stream = logging_stream(mock_byte_stream(HELLO_WORLD, 2), &log);

        stream.read().await.unwrap();

        let log = log.lock().unwrap();
        let finals: Vec<_> = log.iter().filter(|e| e.starts_with("final:")).collect();
        assert_eq!(finals.len(), 1);
        assert!(log.last().unwrap().starts_with("final:"));
    }

    #[tokio::test]
    async fn unterminated_trailing_line_is_flushed() {
        // source exhausts mid-line, no done marker
        let data = "{\"response\":\"partial\"}\n{\"response\":\" tail\"}";
        let log = event_log();
        let stream = logging_stream(mock_byte_stream(data, 9), &log);

        let final_text = stream.read().await.unwrap();

        assert_eq!(final_text, "partial tail");
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "content:partial|partial",
                "content: tail|partial tail",
                "final:partial tail",
            ]
        );
    }

    #[tokio::test]
    async fn empty_fragment_still_fires_delta() {
        let data = "{\"response\":\"\"}\n{\"done\":true}\n";
        let log = event_log();
        let stream = logging_stream(mock_byte_stream(data, 4096), &log);

        let final_text = stream.read().await.unwrap();

        assert_eq!(final_text, "");
        assert_eq!(*log.lock().unwrap(), vec!["content:|", "final:"]);
    }

    #[tokio::test]
    async fn done_record_fragment_applies_before_final() {
        let data = "{\"response\":\"ab\"}\n{\"response\":\"c\",\"done\":true}\n";
        let log = event_log();
        let stream = logging_stream(mock_byte_stream(data, 4096), &log);

        let final_text = stream.read().await.unwrap();

        assert_eq!(final_text, "abc");
        assert_eq!(
            *log.lock().unwrap(),
            vec!["content:ab|ab", "content:c|abc", "final:abc"]
        );
    }

    #[tokio::test]
    async fn records_after_done_are_ignored() {
        let data = "{\"done\":true}\n{\"response\":\"ghost\"}\n";
        let log = event_log();
        let stream = logging_stream(mock_byte_stream(data, 4096), &log);

        let final_text = stream.read().await.unwrap();

        assert_eq!(final_text, "");
        assert_eq!(*log.lock().unwrap(), vec!["final:"]);
    }

    #[tokio::test]
    async fn transport_failure_delivers_partial_text_first() {
        let log = event_log();
        let stream = logging_stream(failing_stream("{\"response\":\"kept\"}\n"), &log);

        let err = stream.read().await.unwrap_err();

        assert_eq!(err.kind, StreamErrorKind::Transport);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["content:kept|kept", "final:kept"]
        );
    }

    #[tokio::test]
    async fn decode_errors_are_skipped_then_aggregated_without_done() {
        let data = "{\"response\":\"a\"}\nnot json\n{\"response\":\"b\"}\n";
        let log = event_log();
        let stream = logging_stream(mock_byte_stream(data, 4096), &log);

        let err = stream.read().await.unwrap_err();

        assert_eq!(err.kind, StreamErrorKind::Decode);
        assert_eq!(err.message, "1 undecodable line(s) in stream");
        // partial text was still delivered before the failure surfaced
        assert_eq!(
            *log.lock().unwrap(),
            vec!["content:a|a", "content:b|ab", "final:ab"]
        );
    }

    #[tokio::test]
    async fn done_marker_forgives_earlier_decode_errors() {
        let data = "garbage\n{\"response\":\"ok\"}\n{\"done\":true}\n";
        let stream = GenerationStream::new(mock_byte_stream(data, 4096));

        let final_text = stream.read().await.unwrap();

        assert_eq!(final_text, "ok");
    }

    #[tokio::test]
    async fn missing_body_fails_before_any_event() {
        let body: Option<MockStream> = None;
        let err = GenerationStream::from_body(body).unwrap_err();
        assert_eq!(err.kind, StreamErrorKind::NoBody);
    }

    #[tokio::test]
    async fn handler_re_registration_replaces() {
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));
        let first_log = Arc::clone(&first);
        let second_log = Arc::clone(&second);

        let stream = GenerationStream::new(mock_byte_stream(HELLO_WORLD, 4096))
            .on_content(move |delta, _| first_log.lock().unwrap().push(delta.to_string()))
            .on_content(move |delta, _| second_log.lock().unwrap().push(delta.to_string()));

        stream.read().await.unwrap();

        assert!(first.lock().unwrap().is_empty());
        assert_eq!(*second.lock().unwrap(), vec!["Hello", " world"]);
    }

    #[tokio::test]
    async fn collect_returns_final_text_without_handlers() {
        let stream = GenerationStream::new(mock_byte_stream(HELLO_WORLD, 8));
        assert_eq!(stream.collect().await.unwrap(), "Hello world");
    }

    #[tokio::test]
    async fn blank_keepalive_lines_are_ignored() {
        let data = "\n{\"response\":\"x\"}\n\n{\"done\":true}\n";
        let log = event_log();
        let stream = logging_stream(mock_byte_stream(data, 4096), &log);

        let final_text = stream.read().await.unwrap();

        assert_eq!(final_text, "x");
        assert_eq!(*log.lock().unwrap(), vec!["content:x|x", "final:x"]);
    }

    #[test]
    fn apply_record_transitions_are_pure_and_inspectable() {
        let state = StreamState::new();
        let (state, event) = state.apply_record(StreamRecord::Content("hi".to_string()));
        assert_eq!(
            event,
            Some(ContentEvent {
                delta: "hi".to_string(),
                content: "hi".to_string(),
            })
        );
        assert!(!state.is_terminated());

        let (state, event) = state.apply_record(StreamRecord::Done { fragment: None });
        assert_eq!(event, None);
        assert!(state.is_terminated());
        assert_eq!(state.content(), "hi");
    }

    #[test]
    fn done_record_empty_fragment_fires_no_delta() {
        let state = StreamState::new();
        let (state, event) = state.apply_record(StreamRecord::Done {
            fragment: Some(String::new()),
        });
        assert_eq!(event, None);
        assert!(state.is_terminated());
    }
}
