//! Per-session message log cache.
//!
//! The cache mirrors `GET /api/sessions/{id}/messages` and is authoritative
//! only immediately after a reload. Messages produced locally (the user's
//! just-submitted prompt, the finished assistant reply) are appended as
//! *provisional* entries and are superseded wholesale by the next reload.

use serde::{Deserialize, Serialize};

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single exchanged message.
///
/// Immutable once confirmed by the bridge; timestamps are RFC3339 strings as
/// produced by the bridge (or locally for provisional entries).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: String,
}

impl Message {
    /// Creates a user message stamped with the current time.
    pub fn user_now(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: chrono_timestamp(),
        }
    }

    /// Creates an assistant message stamped with the current time.
    pub fn assistant_now(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: chrono_timestamp(),
        }
    }
}

/// Returns an RFC3339 UTC timestamp string.
fn chrono_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Load state of the cache.
///
/// `Empty` is an explicit marker distinct from `NotLoaded` so a renderer can
/// show a placeholder instead of nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogState {
    /// No reload has happened for the selected session yet.
    NotLoaded,
    /// The bridge reported zero messages.
    Empty,
    /// At least one entry is cached.
    Loaded,
}

/// A cached message plus its confirmation status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub message: Message,
    /// True until a reload confirms the message from the bridge.
    pub provisional: bool,
}

/// In-memory message cache for the currently viewed session.
#[derive(Debug, Default)]
pub struct MessageLog {
    entries: Vec<LogEntry>,
    loaded: bool,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LogState {
        match (self.loaded, self.entries.is_empty()) {
            (false, _) => LogState::NotLoaded,
            (true, true) => LogState::Empty,
            (true, false) => LogState::Loaded,
        }
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Replaces the cache with a reload result. Provisional entries are
    /// always superseded, even when the bridge reports zero messages.
    pub fn replace(&mut self, messages: Vec<Message>) {
        self.entries = messages
            .into_iter()
            .map(|message| LogEntry {
                message,
                provisional: false,
            })
            .collect();
        self.loaded = true;
    }

    /// Appends a not-yet-confirmed message to the tail.
    pub fn append_provisional(&mut self, message: Message) {
        self.entries.push(LogEntry {
            message,
            provisional: true,
        });
        self.loaded = true;
    }

    /// Removes an entry by index (used when an assistant reply is discarded
    /// for regeneration). Out-of-range indexes are ignored.
    pub fn discard(&mut self, index: usize) {
        if index < self.entries.len() {
            self.entries.remove(index);
        }
    }

    /// Forgets everything, returning to `NotLoaded`.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.loaded = false;
    }
}
