//! Stream consumer: one streaming request per prompt.
//!
//! The bridge answers `GET /api/stream` with an incrementally flushed
//! plain-text body terminated by connection close. The consumer decodes the
//! byte fragments (multi-byte UTF-8 scalars may split across fragments and
//! are buffered until decodable), appends them to the accumulated response,
//! and emits a full re-render of the buffer per fragment.
//!
//! There is no cancel primitive. Starting a new stream for a session bumps
//! that session's generation counter; an older consumer notices its captured
//! generation is stale at the next fragment, drops it, and resolves
//! `Superseded`. Stray late fragments from an abandoned stream are discarded
//! the same way.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Result, bail};
use futures_util::{Stream, StreamExt};
use tracing::debug;

use crate::config::Config;
use crate::events::ClientEvent;

/// Rendered in place of the partial response when a stream fails.
pub const ERROR_INDICATOR: &str = "[Error: Backend unreachable]";

/// Pass-through generation options for one send.
///
/// Everything except the model identifier is forwarded to the bridge
/// unvalidated.
#[derive(Debug, Clone)]
pub struct SendOptions {
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub system_prompt: Option<String>,
    pub enable_search: bool,
}

impl SendOptions {
    /// Builds options from persisted preferences.
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            top_p: config.top_p,
            system_prompt: config.effective_system_prompt(),
            enable_search: config.enable_search,
        }
    }
}

/// Lifecycle of one streaming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// Request issued, no fragment received yet.
    Pending,
    /// At least one fragment received.
    Streaming,
    /// Bridge closed the connection without error.
    Complete,
    /// Connection error, non-success response, or undecodable payload.
    Failed,
    /// A newer stream for the same session took over.
    Superseded,
}

impl StreamStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StreamStatus::Complete | StreamStatus::Failed | StreamStatus::Superseded
        )
    }
}

/// Transient state for one outstanding request. Never persisted.
#[derive(Debug, Clone)]
pub struct StreamState {
    pub session_id: String,
    /// Identity tag: the session's generation counter value captured when
    /// this stream began.
    pub generation: u64,
    pub accumulated_text: String,
    pub status: StreamStatus,
    /// Failure message, set only in the `Failed` state.
    pub error: Option<String>,
}

impl StreamState {
    fn pending(session_id: impl Into<String>, generation: u64) -> Self {
        Self {
            session_id: session_id.into(),
            generation,
            accumulated_text: String::new(),
            status: StreamStatus::Pending,
            error: None,
        }
    }

    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        self.status = StreamStatus::Failed;
        self.error = Some(message.into());
    }
}

/// Per-session stream generation counters.
///
/// The counter is the supersession mechanism: `begin` bumps it and captures
/// the new value into the returned state; `is_current` tells a running
/// consumer whether it still owns the session's output.
#[derive(Debug, Default)]
pub struct StreamTracker {
    generations: Mutex<HashMap<String, u64>>,
}

impl StreamTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new stream for a session, superseding any prior one.
    pub fn begin(&self, session_id: &str) -> StreamState {
        let mut generations = self.generations.lock().unwrap();
        let generation = generations
            .entry(session_id.to_string())
            .and_modify(|g| *g += 1)
            .or_insert(1);
        debug!(session_id, generation = *generation, "stream begin");
        StreamState::pending(session_id, *generation)
    }

    /// Whether the given stream is still the newest one for its session.
    pub fn is_current(&self, state: &StreamState) -> bool {
        self.generations
            .lock()
            .unwrap()
            .get(&state.session_id)
            .is_some_and(|g| *g == state.generation)
    }
}

/// Incremental UTF-8 decoder for the fragment stream.
///
/// Keeps undecodable trailing bytes until the rest of the scalar arrives.
#[derive(Debug, Default)]
struct FragmentDecoder {
    carry: Vec<u8>,
}

impl FragmentDecoder {
    /// Feeds raw bytes, returning the maximal decodable prefix.
    fn push(&mut self, chunk: &[u8]) -> Result<String> {
        self.carry.extend_from_slice(chunk);

        match std::str::from_utf8(&self.carry) {
            Ok(text) => {
                let text = text.to_string();
                self.carry.clear();
                Ok(text)
            }
            Err(e) => {
                // error_len is Some for an invalid sequence, None for a
                // scalar still waiting on more bytes.
                if e.error_len().is_some() {
                    bail!("Invalid UTF-8 in stream");
                }
                let valid = e.valid_up_to();
                let text = String::from_utf8_lossy(&self.carry[..valid]).into_owned();
                self.carry.drain(..valid);
                Ok(text)
            }
        }
    }

    /// End-of-stream check: a leftover partial scalar means the bridge
    /// truncated mid-character.
    fn finish(&self) -> Result<()> {
        if self.carry.is_empty() {
            Ok(())
        } else {
            bail!("Stream ended mid-character");
        }
    }
}

/// Drives a fragment stream to a terminal state.
///
/// Emits a `Render` event with the full accumulated text per decoded
/// fragment, and a final `Render` on completion. On failure the partial text
/// is replaced with [`ERROR_INDICATOR`]. Fragments arriving after the stream
/// was superseded are discarded without rendering.
pub async fn consume<S, E>(
    mut state: StreamState,
    tracker: &StreamTracker,
    mut fragments: S,
    sink: &mut dyn FnMut(ClientEvent),
) -> StreamState
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    let mut decoder = FragmentDecoder::default();

    loop {
        match fragments.next().await {
            Some(Ok(chunk)) => {
                if !tracker.is_current(&state) {
                    debug!(
                        session_id = %state.session_id,
                        generation = state.generation,
                        "discarding fragment from superseded stream"
                    );
                    state.status = StreamStatus::Superseded;
                    return state;
                }

                state.status = StreamStatus::Streaming;
                match decoder.push(&chunk) {
                    Ok(text) if !text.is_empty() => {
                        state.accumulated_text.push_str(&text);
                        sink(ClientEvent::render(state.accumulated_text.clone()));
                    }
                    Ok(_) => {
                        // Fragment did not complete a scalar yet; keep buffering.
                    }
                    Err(e) => {
                        state.fail(e.to_string());
                        sink(ClientEvent::render_final(ERROR_INDICATOR));
                        return state;
                    }
                }
            }
            Some(Err(e)) => {
                state.fail(format!("Stream error: {}", e));
                sink(ClientEvent::render_final(ERROR_INDICATOR));
                return state;
            }
            None => {
                if decoder.finish().is_err() {
                    state.fail("Stream ended mid-character");
                    sink(ClientEvent::render_final(ERROR_INDICATOR));
                    return state;
                }
                if !tracker.is_current(&state) {
                    state.status = StreamStatus::Superseded;
                    return state;
                }
                state.status = StreamStatus::Complete;
                sink(ClientEvent::render_final(state.accumulated_text.clone()));
                return state;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::stream;

    use super::*;

    /// Helper to create a mock byte stream from string chunks.
    fn mock_byte_stream(
        chunks: &[&str],
    ) -> impl Stream<Item = std::result::Result<bytes::Bytes, std::io::Error>> + Unpin {
        let chunks: Vec<_> = chunks
            .iter()
            .map(|c| Ok(bytes::Bytes::copy_from_slice(c.as_bytes())))
            .collect();
        stream::iter(chunks)
    }

    async fn drive(
        tracker: &StreamTracker,
        state: StreamState,
        chunks: &[&str],
    ) -> (StreamState, Vec<ClientEvent>) {
        let mut events = Vec::new();
        let state = consume(state, tracker, mock_byte_stream(chunks), &mut |e| {
            events.push(e);
        })
        .await;
        (state, events)
    }

    #[tokio::test]
    async fn test_fragments_accumulate_and_rerender() {
        let tracker = StreamTracker::new();
        let state = tracker.begin("s1");

        let (state, events) = drive(&tracker, state, &["Hi", " there"]).await;

        assert_eq!(state.status, StreamStatus::Complete);
        assert_eq!(state.accumulated_text, "Hi there");
        // Each fragment re-renders the whole buffer, then a final render.
        assert_eq!(
            events,
            vec![
                ClientEvent::render("Hi"),
                ClientEvent::render("Hi there"),
                ClientEvent::render_final("Hi there"),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_body_completes_with_empty_text() {
        let tracker = StreamTracker::new();
        let state = tracker.begin("s1");

        let (state, events) = drive(&tracker, state, &[]).await;

        assert_eq!(state.status, StreamStatus::Complete);
        assert_eq!(events, vec![ClientEvent::render_final("")]);
    }

    #[tokio::test]
    async fn test_multibyte_scalar_split_across_fragments() {
        let tracker = StreamTracker::new();
        let state = tracker.begin("s1");

        // 👋 = F0 9F 91 8B; split it down the middle
        let wave = "Hello 👋".as_bytes();
        let split = wave.len() - 2;
        let chunks: Vec<std::result::Result<bytes::Bytes, std::io::Error>> = vec![
            Ok(bytes::Bytes::copy_from_slice(&wave[..split])),
            Ok(bytes::Bytes::copy_from_slice(&wave[split..])),
        ];

        let mut events = Vec::new();
        let state = consume(state, &tracker, stream::iter(chunks), &mut |e| {
            events.push(e);
        })
        .await;

        assert_eq!(state.status, StreamStatus::Complete);
        // No replacement characters: the emoji arrives intact
        assert_eq!(state.accumulated_text, "Hello 👋");
        assert_eq!(events.last(), Some(&ClientEvent::render_final("Hello 👋")));
    }

    #[tokio::test]
    async fn test_superseded_stream_discards_fragments() {
        let tracker = StreamTracker::new();
        let first = tracker.begin("s1");
        let second = tracker.begin("s1");

        // The older stream notices supersession at its first fragment and
        // renders nothing.
        let (first, first_events) = drive(&tracker, first, &["stale", " data"]).await;
        assert_eq!(first.status, StreamStatus::Superseded);
        assert!(first_events.is_empty());
        assert_eq!(first.accumulated_text, "");

        // The newer stream is unaffected.
        let (second, second_events) = drive(&tracker, second, &["fresh"]).await;
        assert_eq!(second.status, StreamStatus::Complete);
        assert_eq!(second.accumulated_text, "fresh");
        assert_eq!(second_events.len(), 2);
    }

    #[tokio::test]
    async fn test_supersession_while_awaiting_close() {
        let tracker = StreamTracker::new();
        let state = tracker.begin("s1");
        // Supersede after begin but before any fragment; the empty stream
        // closes immediately and must not report Complete.
        let _newer = tracker.begin("s1");

        let (state, events) = drive(&tracker, state, &[]).await;
        assert_eq!(state.status, StreamStatus::Superseded);
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_mid_stream_error_replaces_partial_text() {
        let tracker = StreamTracker::new();
        let state = tracker.begin("s1");

        let chunks: Vec<std::result::Result<bytes::Bytes, std::io::Error>> = vec![
            Ok(bytes::Bytes::copy_from_slice(b"Partial ans")),
            Err(std::io::Error::other("connection reset")),
        ];

        let mut events = Vec::new();
        let state = consume(state, &tracker, stream::iter(chunks), &mut |e| {
            events.push(e);
        })
        .await;

        assert_eq!(state.status, StreamStatus::Failed);
        assert_eq!(state.accumulated_text, "Partial ans");
        assert!(state.error.as_deref().unwrap().contains("connection reset"));
        // The displayed message is the explicit error indicator, not the
        // partial text.
        assert_eq!(
            events.last(),
            Some(&ClientEvent::render_final(ERROR_INDICATOR))
        );
    }

    #[tokio::test]
    async fn test_truncated_tail_fails() {
        let tracker = StreamTracker::new();
        let state = tracker.begin("s1");

        // Stream closes with half an emoji buffered
        let wave = "👋".as_bytes();
        let chunks: Vec<std::result::Result<bytes::Bytes, std::io::Error>> =
            vec![Ok(bytes::Bytes::copy_from_slice(&wave[..2]))];

        let mut events = Vec::new();
        let state = consume(state, &tracker, stream::iter(chunks), &mut |e| {
            events.push(e);
        })
        .await;

        assert_eq!(state.status, StreamStatus::Failed);
        assert_eq!(
            events.last(),
            Some(&ClientEvent::render_final(ERROR_INDICATOR))
        );
    }

    #[tokio::test]
    async fn test_invalid_utf8_fails() {
        let tracker = StreamTracker::new();
        let state = tracker.begin("s1");

        let chunks: Vec<std::result::Result<bytes::Bytes, std::io::Error>> =
            vec![Ok(bytes::Bytes::copy_from_slice(&[0xFF, 0xFE]))];

        let mut events = Vec::new();
        let state = consume(state, &tracker, stream::iter(chunks), &mut |e| {
            events.push(e);
        })
        .await;

        assert_eq!(state.status, StreamStatus::Failed);
        assert!(events.len() == 1);
    }

    #[test]
    fn test_tracker_generations_are_per_session() {
        let tracker = StreamTracker::new();
        let a1 = tracker.begin("a");
        let b1 = tracker.begin("b");
        let a2 = tracker.begin("a");

        assert!(!tracker.is_current(&a1));
        assert!(tracker.is_current(&a2));
        // Independent session untouched by a's supersession
        assert!(tracker.is_current(&b1));
    }

    #[test]
    fn test_decoder_passthrough_ascii() {
        let mut decoder = FragmentDecoder::default();
        assert_eq!(decoder.push(b"plain").unwrap(), "plain");
        assert!(decoder.finish().is_ok());
    }
}
