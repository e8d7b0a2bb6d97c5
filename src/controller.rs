//! Session action coordinator.
//!
//! The controller owns the registry, the message log cache, and the stream
//! generation counters, and orchestrates every operation against the bridge.
//! The bridge is authoritative: every mutating operation refreshes the
//! session list before reporting success, and the log cache is reconciled
//! from the bridge after each completed stream.
//!
//! Mutating operations for the same session id are serialized through
//! per-id async locks; operations on distinct sessions never contend.
//! Methods take `&self` with interior mutability so concurrent sends can
//! interleave; no internal lock is held across an await point except the
//! per-session op lock itself.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tracing::debug;

use crate::backend::BackendClient;
use crate::error::ClientError;
use crate::events::{ClientEvent, EventSink};
use crate::log::{LogEntry, LogState, Message, MessageLog, Role};
use crate::models::ModelInfo;
use crate::registry::{SessionEntry, SessionRegistry};
use crate::stream::{self, SendOptions, StreamState, StreamStatus, StreamTracker};

/// Per-session-id operation locks.
///
/// Keyed, not global: a rename on one session never waits on a delete of
/// another.
#[derive(Default)]
struct OpLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl OpLocks {
    async fn acquire(&self, session_id: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = self
            .locks
            .lock()
            .unwrap()
            .entry(session_id.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }
}

/// Drives conversational sessions against the bridge.
pub struct Controller {
    client: BackendClient,
    registry: Mutex<SessionRegistry>,
    log: Mutex<MessageLog>,
    streams: StreamTracker,
    ops: OpLocks,
    sink: Mutex<EventSink>,
    /// System prompt override scoped to the current session; cleared when a
    /// new session is created.
    session_system_prompt: Mutex<Option<String>>,
}

impl Controller {
    pub fn new(client: BackendClient, sink: EventSink) -> Self {
        Self {
            client,
            registry: Mutex::new(SessionRegistry::new()),
            log: Mutex::new(MessageLog::new()),
            streams: StreamTracker::new(),
            ops: OpLocks::default(),
            sink: Mutex::new(sink),
            session_system_prompt: Mutex::new(None),
        }
    }

    fn emit(&self, event: ClientEvent) {
        let mut guard = self.sink.lock().unwrap();
        let sink: &mut EventSink = &mut guard;
        sink(event);
    }

    fn notify(&self, message: impl Into<String>) {
        self.emit(ClientEvent::notice(message));
    }

    // === Registry views ===

    pub fn sessions(&self) -> Vec<SessionEntry> {
        self.registry.lock().unwrap().list().to_vec()
    }

    pub fn current_session(&self) -> Option<SessionEntry> {
        self.registry.lock().unwrap().current().cloned()
    }

    pub fn current_session_id(&self) -> Option<String> {
        self.registry.lock().unwrap().current_id()
    }

    fn require_current(&self) -> Result<String> {
        self.current_session_id()
            .ok_or_else(|| ClientError::not_found("No session selected").into())
    }

    // === Log views ===

    pub fn log_state(&self) -> LogState {
        self.log.lock().unwrap().state()
    }

    pub fn log_entries(&self) -> Vec<LogEntry> {
        self.log.lock().unwrap().entries().to_vec()
    }

    /// Index of the most recent assistant entry, if any.
    pub fn last_assistant_index(&self) -> Option<usize> {
        self.log
            .lock()
            .unwrap()
            .entries()
            .iter()
            .rposition(|e| e.message.role == Role::Assistant)
    }

    // === Session-scoped preference state ===

    /// Overrides the system prompt for the current session only.
    pub fn set_session_system_prompt(&self, prompt: Option<String>) {
        *self.session_system_prompt.lock().unwrap() = prompt;
    }

    // === Registry synchronization ===

    /// Fetches the authoritative session list and replaces local state.
    ///
    /// When the current pointer changes (first selection, or fallback after
    /// an external delete), the log view follows it.
    pub async fn refresh_sessions(&self) -> Result<Vec<SessionEntry>> {
        let sessions = self.client.list_sessions().await?;
        let (before, after) = {
            let mut registry = self.registry.lock().unwrap();
            let before = registry.current_id();
            registry.apply(sessions.clone());
            (before, registry.current_id())
        };
        if before != after {
            debug!(?before, ?after, "current session moved on refresh");
            self.reload_log().await?;
        }
        Ok(sessions)
    }

    /// Reloads the message log for the current session, or clears the view
    /// when nothing is selected.
    pub async fn reload_log(&self) -> Result<()> {
        let Some(session_id) = self.current_session_id() else {
            self.log.lock().unwrap().clear();
            return Ok(());
        };
        let messages = self.client.messages(&session_id).await?;
        self.log.lock().unwrap().replace(messages);
        Ok(())
    }

    /// Selects a session and loads its log.
    pub async fn switch_session(&self, id: &str) -> Result<()> {
        self.registry.lock().unwrap().set_current(id)?;
        self.reload_log().await?;
        self.notify(format!("Switched to session: {}", id));
        Ok(())
    }

    // === Mutating operations ===

    /// Creates a session, makes it current, and resets session-scoped state.
    ///
    /// On bridge error nothing changes locally: the prior current session
    /// and its log stay untouched.
    pub async fn create_session(&self) -> Result<SessionEntry> {
        let entry = self.client.create_session().await?;
        let sessions = self.client.list_sessions().await?;
        {
            let mut registry = self.registry.lock().unwrap();
            registry.apply(sessions);
            registry.set_current(&entry.id)?;
        }
        *self.session_system_prompt.lock().unwrap() = None;
        self.reload_log().await?;
        self.notify("New session created.");
        Ok(entry)
    }

    /// Renames the current session. An empty name is a no-op (the user
    /// declined to supply one).
    pub async fn rename_session(&self, new_name: &str) -> Result<()> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Ok(());
        }
        let session_id = self.require_current()?;
        let _guard = self.ops.acquire(&session_id).await;

        self.client.rename_session(&session_id, new_name).await?;
        let sessions = self.client.list_sessions().await?;
        self.registry.lock().unwrap().apply(sessions);
        self.notify("Session renamed.");
        Ok(())
    }

    /// Deletes the current session.
    ///
    /// Confirmation is the caller's responsibility. Afterwards the first
    /// remaining session (if any) becomes current and its log is loaded;
    /// with no sessions left the log view is cleared.
    pub async fn delete_session(&self) -> Result<()> {
        let session_id = self.require_current()?;
        let _guard = self.ops.acquire(&session_id).await;

        self.client.delete_session(&session_id).await?;
        let sessions = self.client.list_sessions().await?;
        self.registry.lock().unwrap().apply(sessions);
        self.reload_log().await?;
        self.notify("Session deleted.");
        Ok(())
    }

    /// Clears the bridge-side conversational memory of the current session.
    ///
    /// Does not reload the log; callers re-fetch if they want to observe the
    /// now-empty history.
    pub async fn reset_session(&self) -> Result<()> {
        let session_id = self.require_current()?;
        let _guard = self.ops.acquire(&session_id).await;

        self.client.reset_session(&session_id).await?;
        let sessions = self.client.list_sessions().await?;
        self.registry.lock().unwrap().apply(sessions);
        self.notify("Session memory cleared.");
        Ok(())
    }

    // === Streaming ===

    /// Submits a prompt on the current session and drives the stream to a
    /// terminal state.
    ///
    /// Returns `Ok(None)` for an empty prompt (nothing sent). Fails with
    /// `NoModelSelected` before any network call when the model is empty,
    /// and with `NotFound` when no session is selected. Any already-running
    /// stream for the session is superseded.
    pub async fn send(&self, prompt: &str, options: &SendOptions) -> Result<Option<StreamState>> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Ok(None);
        }
        if options.model.trim().is_empty() {
            return Err(ClientError::no_model().into());
        }
        let session_id = self.require_current()?;

        let mut options = options.clone();
        if let Some(session_prompt) = self.session_system_prompt.lock().unwrap().clone() {
            options.system_prompt = Some(session_prompt);
        }

        // Optimistic append; reconciled on completion or the next reload.
        self.log
            .lock()
            .unwrap()
            .append_provisional(Message::user_now(prompt));

        let mut state = self.streams.begin(&session_id);

        let fragments = match self.client.open_stream(&session_id, prompt, &options).await {
            Ok(fragments) => fragments,
            Err(e) => {
                // Connect-level failure gets the same surface as a
                // mid-transfer one: the explicit error indicator.
                state.fail(e.to_string());
                self.emit(ClientEvent::render_final(stream::ERROR_INDICATOR));
                self.notify(format!("Send failed: {}", e));
                return Ok(Some(state));
            }
        };

        let state = stream::consume(state, &self.streams, fragments, &mut |event| {
            self.emit(event);
        })
        .await;
        debug_assert!(state.status.is_terminal());

        match state.status {
            StreamStatus::Complete => {
                self.log
                    .lock()
                    .unwrap()
                    .append_provisional(Message::assistant_now(&state.accumulated_text));
                // The bridge has persisted both sides of the exchange by now;
                // reload to swap provisionals for confirmed entries.
                if let Err(e) = self.reload_log().await {
                    self.notify(format!("History reload failed: {}", e));
                }
            }
            StreamStatus::Failed => {
                let detail = state.error.as_deref().unwrap_or("stream failed");
                self.notify(format!("Stream failed: {}", detail));
            }
            StreamStatus::Superseded => {
                debug!(
                    session_id = %state.session_id,
                    generation = state.generation,
                    "stream superseded"
                );
            }
            StreamStatus::Pending | StreamStatus::Streaming => {}
        }

        Ok(Some(state))
    }

    /// Replays the prompt that produced an assistant reply.
    ///
    /// `index` must name an assistant entry in the cached log; the most
    /// recent user entry preceding it supplies the literal prompt text. The
    /// assistant entry is discarded locally before resending.
    pub async fn regenerate(
        &self,
        index: usize,
        options: &SendOptions,
    ) -> Result<Option<StreamState>> {
        let prompt = {
            let mut log = self.log.lock().unwrap();
            let prompt = {
                let entries = log.entries();
                let entry = entries.get(index).ok_or_else(|| {
                    ClientError::not_found(format!("No message at index {}", index))
                })?;
                if entry.message.role != Role::Assistant {
                    return Err(
                        ClientError::not_found("Message is not an assistant reply").into(),
                    );
                }
                entries[..index]
                    .iter()
                    .rev()
                    .find(|e| e.message.role == Role::User)
                    .map(|e| e.message.content.clone())
                    .ok_or_else(|| {
                        ClientError::not_found("No user message precedes the reply")
                    })?
            };
            log.discard(index);
            prompt
        };

        self.send(&prompt, options).await
    }

    // === Import / export ===

    /// Replaces the current session's history on the bridge, then reloads.
    pub async fn import_messages(&self, messages: Vec<Message>) -> Result<()> {
        let session_id = self.require_current()?;
        let _guard = self.ops.acquire(&session_id).await;

        self.client.import_messages(&session_id, &messages).await?;
        let sessions = self.client.list_sessions().await?;
        self.registry.lock().unwrap().apply(sessions);
        self.reload_log().await?;
        self.notify(format!("Imported {} messages.", messages.len()));
        Ok(())
    }

    /// Returns the confirmed history of the current session, freshly
    /// reloaded from the bridge.
    pub async fn export_messages(&self) -> Result<Vec<Message>> {
        self.require_current()?;
        self.reload_log().await?;
        Ok(self
            .log
            .lock()
            .unwrap()
            .entries()
            .iter()
            .filter(|e| !e.provisional)
            .map(|e| e.message.clone())
            .collect())
    }

    // === Models ===

    pub async fn models(&self) -> Result<Vec<ModelInfo>> {
        self.client.list_models().await
    }

    pub async fn model_info(&self, name: &str) -> Result<ModelInfo> {
        self.client.model_info(name).await
    }
}
