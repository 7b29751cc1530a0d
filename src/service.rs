//! Remote Palette Service contract and its HTTP implementation.
//!
//! The store never talks to the network directly; everything goes through
//! [`PaletteService`] so tests (and a future offline mode) can swap in a
//! different backend without touching the callers.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::model::Palette;

/// Bounded wait for any single palette-service call. After this the call
/// fails with `AppError::Timeout` instead of hanging, so the caller can
/// offer a retry.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Remote palette store, HTTP+JSON under `/api/palettes`.
pub trait PaletteService {
    /// `GET /api/palettes` — palette names in server order.
    fn list(&self) -> impl std::future::Future<Output = Result<Vec<String>, AppError>> + Send;
    /// `GET /api/palettes/{name}`.
    fn fetch(&self, name: &str) -> impl std::future::Future<Output = Result<Palette, AppError>> + Send;
    /// `POST /api/palettes` — name collision handling is server-defined.
    fn create(&self, palette: &Palette) -> impl std::future::Future<Output = Result<(), AppError>> + Send;
    /// `PUT /api/palettes/{name}` — full overwrite of the command tree.
    fn replace(&self, palette: &Palette) -> impl std::future::Future<Output = Result<(), AppError>> + Send;
    /// `DELETE /api/palettes/{name}`.
    fn delete(&self, name: &str) -> impl std::future::Future<Output = Result<(), AppError>> + Send;
    /// `POST /api/palettes/{name}/commands` — files the command under the
    /// default `Saved Commands` bucket; 409 on name collision.
    fn add_command(
        &self,
        palette: &str,
        command_name: &str,
        command_data: &Value,
    ) -> impl std::future::Future<Output = Result<(), AppError>> + Send;
}

// ── HTTP implementation ──────────────────────────────────────────

pub struct HttpPaletteService {
    client: reqwest::Client,
    base_url: reqwest::Url,
}

impl HttpPaletteService {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(AppError::from)?;
        let base_url = reqwest::Url::parse(base_url)
            .map_err(|e| AppError::validation(format!("Invalid server URL \"{base_url}\": {e}")))?;
        Ok(Self { client, base_url })
    }

    /// Build a URL under the base, percent-encoding each segment so a
    /// palette name containing `/`, `?` or `#` stays one path segment
    /// instead of rerouting the request.
    fn url(&self, segments: &[&str]) -> Result<reqwest::Url, AppError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| AppError::validation("Server URL cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Turn a non-success response into the matching error class: 409 becomes
/// `Conflict` (with the server's `{message}` body when present), anything
/// else `Service` with the body verbatim.
async fn check(response: reqwest::Response) -> Result<reqwest::Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::CONFLICT {
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
            .unwrap_or(body);
        warn!(%message, "palette service reported a conflict");
        return Err(AppError::Conflict { message });
    }
    warn!(status = status.as_u16(), "palette service returned an error");
    Err(AppError::Service {
        status: status.as_u16(),
        message: body,
    })
}

impl PaletteService for HttpPaletteService {
    async fn list(&self) -> Result<Vec<String>, AppError> {
        debug!("listing palettes");
        let url = self.url(&["api", "palettes"])?;
        let response = check(self.client.get(url).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn fetch(&self, name: &str) -> Result<Palette, AppError> {
        debug!(palette = name, "fetching palette");
        let url = self.url(&["api", "palettes", name])?;
        let response = check(self.client.get(url).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn create(&self, palette: &Palette) -> Result<(), AppError> {
        debug!(palette = palette.name, "creating palette");
        let url = self.url(&["api", "palettes"])?;
        check(self.client.post(url).json(palette).send().await?).await?;
        Ok(())
    }

    async fn replace(&self, palette: &Palette) -> Result<(), AppError> {
        debug!(palette = palette.name, "replacing palette");
        let url = self.url(&["api", "palettes", &palette.name])?;
        check(self.client.put(url).json(palette).send().await?).await?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), AppError> {
        debug!(palette = name, "deleting palette");
        let url = self.url(&["api", "palettes", name])?;
        check(self.client.delete(url).send().await?).await?;
        Ok(())
    }

    async fn add_command(
        &self,
        palette: &str,
        command_name: &str,
        command_data: &Value,
    ) -> Result<(), AppError> {
        debug!(palette, command = command_name, "adding command");
        let url = self.url(&["api", "palettes", palette, "commands"])?;
        let body = serde_json::json!({
            "command_name": command_name,
            "command_data": command_data,
        });
        check(self.client.post(url).json(&body).send().await?).await?;
        Ok(())
    }
}


// ── In-memory fake for tests ─────────────────────────────────────
