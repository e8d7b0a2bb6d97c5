//! CLI renderer for client events.
//!
//! The renderer is responsible for all output formatting. It consumes
//! `ClientEvent`s and writes them to stdout/stderr following the contract:
//! - Assistant output (renders) → stdout only
//! - Notices, diagnostics, errors → stderr only
//!
//! Render events carry the full accumulated response each time. The renderer
//! keeps the previously printed buffer and emits only the new tail, so the
//! terminal shows a smooth stream even though the protocol re-sends the
//! whole text.

use std::io::{Stderr, Stdout, Write, stderr, stdout};

use crate::events::{ClientEvent, EventSink};

/// CLI renderer that writes client events to stdout/stderr.
pub struct CliRenderer {
    stdout: Stdout,
    stderr: Stderr,
    /// The accumulated text already written for the in-progress response.
    printed: String,
}

impl Default for CliRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl CliRenderer {
    /// Creates a new CLI renderer.
    pub fn new() -> Self {
        Self {
            stdout: stdout(),
            stderr: stderr(),
            printed: String::new(),
        }
    }

    /// Handles a single client event by writing to the appropriate stream.
    pub fn handle_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::Render { text, is_final } => {
                if let Some(tail) = text.strip_prefix(self.printed.as_str()) {
                    let _ = write!(self.stdout, "{}", tail);
                } else {
                    // The buffer was replaced rather than extended (e.g. the
                    // error indicator); start a fresh line.
                    if !self.printed.is_empty() {
                        let _ = writeln!(self.stdout);
                    }
                    let _ = write!(self.stdout, "{}", text);
                }
                let _ = self.stdout.flush();

                if is_final {
                    if !text.is_empty() {
                        let _ = writeln!(self.stdout);
                    }
                    self.printed.clear();
                } else {
                    self.printed = text;
                }
            }
            ClientEvent::Notice { message } => {
                let _ = writeln!(self.stderr, "• {}", message);
            }
        }
    }

    /// Creates an `EventSink` that delegates to this renderer.
    pub fn into_sink(self) -> EventSink {
        use std::sync::{Arc, Mutex};

        let renderer = Arc::new(Mutex::new(self));
        Box::new(move |event| {
            let mut r = renderer.lock().unwrap();
            r.handle_event(event);
        })
    }
}
