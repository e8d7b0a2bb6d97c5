//! Transcript file payloads for import/export.
//!
//! The on-disk shape matches the bridge's import endpoint: a JSON object with
//! a `messages` array. Validation happens before any network use so a bad
//! file never reaches the bridge.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ClientError;
use crate::log::Message;

/// `{ "messages": [...] }`
#[derive(Debug, Serialize, Deserialize)]
pub struct Transcript {
    pub messages: Vec<Message>,
}

/// Parses an import payload, validating its shape.
///
/// Fails with `InvalidImportPayload` when the document is not JSON, lacks a
/// `messages` array, or contains malformed message objects.
pub fn parse_import(raw: &str) -> Result<Vec<Message>> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| ClientError::invalid_import(format!("Not valid JSON: {}", e)))?;

    let Some(messages) = value.get("messages") else {
        return Err(ClientError::invalid_import("Missing \"messages\" field").into());
    };
    if !messages.is_array() {
        return Err(ClientError::invalid_import("\"messages\" is not an array").into());
    }

    let transcript: Transcript = serde_json::from_value(value)
        .map_err(|e| ClientError::invalid_import(format!("Malformed message entry: {}", e)))?;

    Ok(transcript.messages)
}

/// Reads and validates a transcript file.
pub fn read_transcript(path: &Path) -> Result<Vec<Message>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read transcript from {}", path.display()))?;
    parse_import(&raw)
}

/// Writes messages as a pretty-printed transcript file.
pub fn write_transcript(path: &Path, messages: &[Message]) -> Result<()> {
    let transcript = Transcript {
        messages: messages.to_vec(),
    };
    let json =
        serde_json::to_string_pretty(&transcript).context("Failed to serialize transcript")?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write transcript to {}", path.display()))?;
    Ok(())
}
