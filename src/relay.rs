//! Relay endpoints: the service-side bridge that forwards filled commands
//! to the device over its TCP link.
//!
//! Separate from the palette API on purpose — palettes are durable state,
//! the relay is a live pipe. Responses here are plain text, not JSON.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::AppError;
use crate::service::REQUEST_TIMEOUT;

/// Severity of a message-log entry, mirrored in the log rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEventKind {
    Sent,
    Received,
    SystemInfo,
    SystemWarn,
    SystemError,
}

/// One entry for the message log.
#[derive(Debug, Clone)]
pub struct RelayEvent {
    pub kind: RelayEventKind,
    pub message: String,
}

impl RelayEvent {
    pub fn new(kind: RelayEventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Connection control and command forwarding.
pub trait ConnectionService {
    /// `POST /connect` — open (or replace) the device TCP link.
    fn connect(
        &self,
        socket_path: &str,
    ) -> impl std::future::Future<Output = Result<String, AppError>> + Send;
    /// `POST /disconnect`.
    fn disconnect(&self) -> impl std::future::Future<Output = Result<String, AppError>> + Send;
    /// `POST /send-command` — forward a filled JSON command, optionally
    /// followed by a delimiter string.
    fn send_command(
        &self,
        command: &Value,
        delimiter: Option<&str>,
    ) -> impl std::future::Future<Output = Result<String, AppError>> + Send;
    /// `POST /send-text-command` — raw text passthrough.
    fn send_text(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<String, AppError>> + Send;
}

#[derive(Serialize)]
struct ConnectPayload<'a> {
    socket_path: &'a str,
}

#[derive(Serialize)]
struct CommandPayload<'a> {
    json_command: &'a Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    delimiter: Option<&'a str>,
}

#[derive(Serialize)]
struct TextCommandPayload<'a> {
    text_command: &'a str,
}

pub struct HttpRelay {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRelay {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(AppError::from)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<String, AppError> {
        debug!(path, "relay request");
        let url = format!("{}{path}", self.base_url);
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if status.is_success() {
            Ok(text)
        } else {
            Err(AppError::Service {
                status: status.as_u16(),
                message: text,
            })
        }
    }
}

impl ConnectionService for HttpRelay {
    async fn connect(&self, socket_path: &str) -> Result<String, AppError> {
        self.post("/connect", &ConnectPayload { socket_path }).await
    }

    async fn disconnect(&self) -> Result<String, AppError> {
        self.post("/disconnect", &serde_json::json!({})).await
    }

    async fn send_command(
        &self,
        command: &Value,
        delimiter: Option<&str>,
    ) -> Result<String, AppError> {
        self.post(
            "/send-command",
            &CommandPayload {
                json_command: command,
                delimiter,
            },
        )
        .await
    }

    async fn send_text(&self, text: &str) -> Result<String, AppError> {
        self.post("/send-text-command", &TextCommandPayload { text_command: text })
            .await
    }
}
