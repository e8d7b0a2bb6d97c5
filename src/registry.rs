//! Session registry: the known session list and the current-session pointer.
//!
//! The bridge is authoritative for session naming and ordering; the registry
//! only mirrors the last fetched list. The current-session pointer is the one
//! piece of state shared by the whole client, so every mutation goes through
//! the accessors here and nowhere else.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// A session as reported by `GET /api/sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntry {
    #[serde(rename = "session_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Local mirror of the bridge's session list plus the current pointer.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Vec<SessionEntry>,
    current: Option<String>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the known sessions in bridge order.
    pub fn list(&self) -> &[SessionEntry] {
        &self.sessions
    }

    /// Returns the current session, if one is selected.
    pub fn current(&self) -> Option<&SessionEntry> {
        let id = self.current.as_deref()?;
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Returns the current session id, if one is selected.
    pub fn current_id(&self) -> Option<String> {
        self.current.clone()
    }

    /// Selects a session by id.
    ///
    /// Fails with `NotFound` when the id is absent from the last-known list.
    pub fn set_current(&mut self, id: &str) -> Result<()> {
        if !self.sessions.iter().any(|s| s.id == id) {
            return Err(ClientError::not_found(format!("Unknown session: {}", id)).into());
        }
        self.current = Some(id.to_string());
        Ok(())
    }

    /// Replaces the session list with a freshly fetched one.
    ///
    /// The current pointer survives when its session is still listed;
    /// otherwise it falls back to the first entry, or to none when the list
    /// is empty. Also picks the first entry when nothing was selected yet.
    pub fn apply(&mut self, sessions: Vec<SessionEntry>) {
        self.sessions = sessions;

        let still_present = self
            .current
            .as_deref()
            .is_some_and(|id| self.sessions.iter().any(|s| s.id == id));

        if !still_present {
            self.current = self.sessions.first().map(|s| s.id.clone());
        }
    }
}
