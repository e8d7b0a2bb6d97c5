//! Structured client errors.
//!
//! Every failure surfaced by the controller or the backend client carries a
//! kind from the taxonomy below plus a one-line message. Errors travel
//! through `anyhow::Result` and are recovered by downcast where a caller
//! needs to branch on the kind.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Categories of client errors for consistent error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientErrorKind {
    /// Operation referenced a session (or message) absent from the registry.
    NotFound,
    /// A send was attempted with an empty model field.
    NoModelSelected,
    /// Network-level failure talking to the bridge.
    BackendUnreachable,
    /// Imported file lacks a valid messages sequence.
    InvalidImportPayload,
    /// Non-success HTTP status other than 404.
    HttpStatus,
}

impl fmt::Display for ClientErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientErrorKind::NotFound => write!(f, "not_found"),
            ClientErrorKind::NoModelSelected => write!(f, "no_model_selected"),
            ClientErrorKind::BackendUnreachable => write!(f, "backend_unreachable"),
            ClientErrorKind::InvalidImportPayload => write!(f, "invalid_import_payload"),
            ClientErrorKind::HttpStatus => write!(f, "http_status"),
        }
    }
}

/// Structured error with kind and details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientError {
    /// Error category
    pub kind: ClientErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Optional additional details (e.g., raw error body)
    pub details: Option<String>,
}

impl ClientError {
    /// Creates a new client error.
    pub fn new(kind: ClientErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates a `NotFound` error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::NotFound, message)
    }

    /// Creates a `NoModelSelected` error.
    pub fn no_model() -> Self {
        Self::new(ClientErrorKind::NoModelSelected, "No model selected")
    }

    /// Creates a `BackendUnreachable` error.
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::BackendUnreachable, message)
    }

    /// Creates an `InvalidImportPayload` error.
    pub fn invalid_import(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::InvalidImportPayload, message)
    }

    /// Creates an error from a non-success HTTP response.
    ///
    /// The bridge reports missing sessions/models as 404 with a JSON
    /// `{"detail": "..."}` body, which maps onto `NotFound`; anything else
    /// becomes `HttpStatus` with the body preserved as details.
    pub fn http_status(status: u16, body: &str) -> Self {
        let kind = if status == 404 {
            ClientErrorKind::NotFound
        } else {
            ClientErrorKind::HttpStatus
        };

        let message = if let Ok(json) = serde_json::from_str::<Value>(body)
            && let Some(detail) = json.get("detail").and_then(|v| v.as_str())
        {
            format!("HTTP {}: {}", status, detail)
        } else {
            format!("HTTP {}", status)
        };

        Self {
            kind,
            message,
            details: (!body.is_empty()).then(|| body.to_string()),
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ClientError {}

/// Returns the `ClientErrorKind` buried in an `anyhow::Error`, if any.
pub fn kind_of(err: &anyhow::Error) -> Option<ClientErrorKind> {
    err.downcast_ref::<ClientError>().map(|e| e.kind)
}
