//! Client event types for rendering and notifications.
//!
//! This module defines the contract for events emitted by the controller and
//! stream consumer. Events are serializable for future JSON output mode
//! support.

use serde::{Deserialize, Serialize};

/// Events emitted toward the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Full re-render of the in-progress assistant reply.
    ///
    /// `text` is the entire accumulated response so far, not a delta; the
    /// bridge streams cumulative plain text and fragments are not guaranteed
    /// to end on markup boundaries, so renderers re-process the whole buffer
    /// each time. `is_final` is set once the stream has reached a terminal
    /// state.
    Render { text: String, is_final: bool },

    /// Transient user-visible status message (toast).
    Notice { message: String },
}

/// Event sink type for receiving client events.
pub type EventSink = Box<dyn FnMut(ClientEvent) + Send>;

impl ClientEvent {
    /// Creates a non-final render event.
    pub fn render(text: impl Into<String>) -> Self {
        ClientEvent::Render {
            text: text.into(),
            is_final: false,
        }
    }

    /// Creates a final render event.
    pub fn render_final(text: impl Into<String>) -> Self {
        ClientEvent::Render {
            text: text.into(),
            is_final: true,
        }
    }

    /// Creates a notice event.
    pub fn notice(message: impl Into<String>) -> Self {
        ClientEvent::Notice {
            message: message.into(),
        }
    }
}
