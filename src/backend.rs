//! Bridge server HTTP client.
//!
//! The bridge owns sessions and message history and fronts the model runner;
//! this client is the only place that knows the wire surface. All calls are
//! request/response JSON except `open_stream`, which returns the raw byte
//! stream of an incrementally flushed plain-text body.

use std::pin::Pin;

use anyhow::Result;
use bytes::Bytes;
use futures_util::Stream;
use serde::Serialize;
use tracing::debug;

use crate::error::ClientError;
use crate::log::Message;
use crate::models::ModelInfo;
use crate::registry::SessionEntry;
use crate::stream::SendOptions;

const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Configuration for the bridge client.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
}

impl BackendConfig {
    /// Resolves the base URL with precedence: env > config > default.
    ///
    /// `CONFAB_BACKEND_URL` wins over the config file value; both are
    /// validated as well-formed URLs.
    pub fn resolve(config_base_url: Option<&str>) -> Result<Self> {
        if let Ok(env_url) = std::env::var("CONFAB_BACKEND_URL") {
            let trimmed = env_url.trim();
            if !trimmed.is_empty() {
                Self::validate_url(trimmed)?;
                return Ok(Self {
                    base_url: trimmed.to_string(),
                });
            }
        }

        if let Some(config_url) = config_base_url {
            let trimmed = config_url.trim();
            if !trimmed.is_empty() {
                Self::validate_url(trimmed)?;
                return Ok(Self {
                    base_url: trimmed.to_string(),
                });
            }
        }

        Ok(Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Validates that a URL is well-formed.
    fn validate_url(url: &str) -> Result<()> {
        url::Url::parse(url)
            .map_err(|e| ClientError::unreachable(format!("Invalid bridge URL {}: {}", url, e)))?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct RenameRequest<'a> {
    session_id: &'a str,
    new_name: &'a str,
}

#[derive(Debug, Serialize)]
struct SessionIdRequest<'a> {
    session_id: &'a str,
}

#[derive(Debug, Serialize)]
struct ImportRequest<'a> {
    messages: &'a [Message],
}

/// Bridge API client.
pub struct BackendClient {
    config: BackendConfig,
    http: reqwest::Client,
}

impl BackendClient {
    /// Creates a new client with the given configuration.
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// `GET /api/sessions`
    pub async fn list_sessions(&self) -> Result<Vec<SessionEntry>> {
        let url = format!("{}/api/sessions", self.config.base_url);
        debug!(%url, "list sessions");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(Self::classify_reqwest_error)?;
        let response = Self::check_status(response).await?;
        Ok(response.json().await.map_err(Self::classify_reqwest_error)?)
    }

    /// `POST /api/sessions/new`
    pub async fn create_session(&self) -> Result<SessionEntry> {
        let url = format!("{}/api/sessions/new", self.config.base_url);
        debug!(%url, "create session");
        let response = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(Self::classify_reqwest_error)?;
        let response = Self::check_status(response).await?;
        Ok(response.json().await.map_err(Self::classify_reqwest_error)?)
    }

    /// `POST /api/sessions/rename`
    pub async fn rename_session(&self, session_id: &str, new_name: &str) -> Result<()> {
        let url = format!("{}/api/sessions/rename", self.config.base_url);
        debug!(%url, session_id, "rename session");
        let response = self
            .http
            .post(&url)
            .json(&RenameRequest {
                session_id,
                new_name,
            })
            .send()
            .await
            .map_err(Self::classify_reqwest_error)?;
        Self::check_status(response).await?;
        Ok(())
    }

    /// `POST /api/sessions/delete`
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        let url = format!("{}/api/sessions/delete", self.config.base_url);
        debug!(%url, session_id, "delete session");
        let response = self
            .http
            .post(&url)
            .json(&SessionIdRequest { session_id })
            .send()
            .await
            .map_err(Self::classify_reqwest_error)?;
        Self::check_status(response).await?;
        Ok(())
    }

    /// `POST /api/sessions/reset`
    pub async fn reset_session(&self, session_id: &str) -> Result<()> {
        let url = format!("{}/api/sessions/reset", self.config.base_url);
        debug!(%url, session_id, "reset session");
        let response = self
            .http
            .post(&url)
            .json(&SessionIdRequest { session_id })
            .send()
            .await
            .map_err(Self::classify_reqwest_error)?;
        Self::check_status(response).await?;
        Ok(())
    }

    /// `GET /api/sessions/{id}/messages`
    pub async fn messages(&self, session_id: &str) -> Result<Vec<Message>> {
        let url = format!("{}/api/sessions/{}/messages", self.config.base_url, session_id);
        debug!(%url, "fetch messages");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(Self::classify_reqwest_error)?;
        let response = Self::check_status(response).await?;
        Ok(response.json().await.map_err(Self::classify_reqwest_error)?)
    }

    /// `POST /api/sessions/{id}/import`
    pub async fn import_messages(&self, session_id: &str, messages: &[Message]) -> Result<()> {
        let url = format!("{}/api/sessions/{}/import", self.config.base_url, session_id);
        debug!(%url, count = messages.len(), "import messages");
        let response = self
            .http
            .post(&url)
            .json(&ImportRequest { messages })
            .send()
            .await
            .map_err(Self::classify_reqwest_error)?;
        Self::check_status(response).await?;
        Ok(())
    }

    /// `GET /api/models`
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/api/models", self.config.base_url);
        debug!(%url, "list models");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(Self::classify_reqwest_error)?;
        let response = Self::check_status(response).await?;
        Ok(response.json().await.map_err(Self::classify_reqwest_error)?)
    }

    /// `GET /api/models/{name}`; 404 when the model is unknown.
    pub async fn model_info(&self, name: &str) -> Result<ModelInfo> {
        let url = format!("{}/api/models/{}", self.config.base_url, name);
        debug!(%url, "model info");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(Self::classify_reqwest_error)?;
        let response = Self::check_status(response).await?;
        Ok(response.json().await.map_err(Self::classify_reqwest_error)?)
    }

    /// `GET /api/stream`: opens the streaming exchange for one prompt.
    ///
    /// Returns the raw byte stream; decoding and accumulation happen in the
    /// stream consumer. A non-success status is reported before any fragment
    /// is surfaced.
    pub async fn open_stream(
        &self,
        session_id: &str,
        prompt: &str,
        options: &SendOptions,
    ) -> Result<Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>> {
        let url = format!("{}/api/stream", self.config.base_url);
        debug!(%url, session_id, model = %options.model, "open stream");

        let mut query: Vec<(&str, String)> = vec![
            ("model", options.model.clone()),
            ("prompt", prompt.to_string()),
            ("session_id", session_id.to_string()),
            ("temperature", options.temperature.to_string()),
            ("top_p", options.top_p.to_string()),
            ("enable_search", options.enable_search.to_string()),
        ];
        if let Some(system_prompt) = &options.system_prompt {
            query.push(("system_prompt", system_prompt.clone()));
        }

        let response = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(Self::classify_reqwest_error)?;
        let response = Self::check_status(response).await?;

        Ok(Box::pin(response.bytes_stream()))
    }

    /// Maps a non-success response to a structured error, keeping the body.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::http_status(status.as_u16(), &body).into())
    }

    /// Classifies a reqwest error as a network-level failure.
    fn classify_reqwest_error(e: reqwest::Error) -> ClientError {
        if e.is_timeout() {
            ClientError::unreachable(format!("Request timed out: {}", e))
        } else if e.is_connect() {
            ClientError::unreachable(format!("Connection failed: {}", e))
        } else {
            ClientError::unreachable(format!("Network error: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_defaults_without_overrides() {
        // CONFAB_BACKEND_URL is not set in the test environment
        let config = BackendConfig::resolve(None).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_resolve_prefers_config_value() {
        let config = BackendConfig::resolve(Some("http://bridge.local:9000")).unwrap();
        assert_eq!(config.base_url, "http://bridge.local:9000");
    }

    #[test]
    fn test_resolve_rejects_malformed_url() {
        let result = BackendConfig::resolve(Some("not a url"));
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_ignores_blank_config_value() {
        let config = BackendConfig::resolve(Some("   ")).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }
}
