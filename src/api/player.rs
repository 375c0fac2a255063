use crate::api::client::SpotifyClient;
use crate::api::models::{Device, DevicesResponse, PlayRequest, PlaybackStatusResponse, RepeatState};
use crate::error::AppResult;
use async_trait::async_trait;
use reqwest::Method;

/// Remote playback endpoints, one call per method.
#[async_trait]
pub trait RemotePlayer: Send + Sync {
    /// `None` when the service reports no active playback.
    async fn playback_status(&self) -> AppResult<Option<PlaybackStatusResponse>>;
    async fn devices(&self) -> AppResult<Vec<Device>>;
    async fn play(&self, device_id: &str, request: &PlayRequest) -> AppResult<()>;
    async fn pause(&self, device_id: &str) -> AppResult<()>;
    async fn skip_next(&self, device_id: &str) -> AppResult<()>;
    async fn skip_previous(&self, device_id: &str) -> AppResult<()>;
    async fn seek(&self, device_id: &str, position_ms: u64) -> AppResult<()>;
    async fn set_repeat(&self, device_id: &str, state: RepeatState) -> AppResult<()>;
    async fn set_shuffle(&self, device_id: &str, enabled: bool) -> AppResult<()>;
}

#[async_trait]
impl RemotePlayer for SpotifyClient {
    async fn playback_status(&self) -> AppResult<Option<PlaybackStatusResponse>> {
        let response = self.get("/me/player").await?;
        if response.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&body)?))
    }

    async fn devices(&self) -> AppResult<Vec<Device>> {
        let response = self.get("/me/player/devices").await?;
        let body: DevicesResponse = response.json().await?;
        Ok(body.devices)
    }

    async fn play(&self, device_id: &str, request: &PlayRequest) -> AppResult<()> {
        let body = serde_json::to_value(request)?;
        self.command(
            Method::PUT,
            "/me/player/play",
            &[("device_id", device_id)],
            Some(&body),
        )
        .await
    }

    async fn pause(&self, device_id: &str) -> AppResult<()> {
        self.command(
            Method::PUT,
            "/me/player/pause",
            &[("device_id", device_id)],
            None,
        )
        .await
    }

    async fn skip_next(&self, device_id: &str) -> AppResult<()> {
        self.command(
            Method::POST,
            "/me/player/next",
            &[("device_id", device_id)],
            None,
        )
        .await
    }

    async fn skip_previous(&self, device_id: &str) -> AppResult<()> {
        self.command(
            Method::POST,
            "/me/player/previous",
            &[("device_id", device_id)],
            None,
        )
        .await
    }

    async fn seek(&self, device_id: &str, position_ms: u64) -> AppResult<()> {
        let position = position_ms.to_string();
        self.command(
            Method::PUT,
            "/me/player/seek",
            &[("position_ms", position.as_str()), ("device_id", device_id)],
            None,
        )
        .await
    }

    async fn set_repeat(&self, device_id: &str, state: RepeatState) -> AppResult<()> {
        self.command(
            Method::PUT,
            "/me/player/repeat",
            &[("state", state.as_str()), ("device_id", device_id)],
            None,
        )
        .await
    }

    async fn set_shuffle(&self, device_id: &str, enabled: bool) -> AppResult<()> {
        let state = if enabled { "true" } else { "false" };
        self.command(
            Method::PUT,
            "/me/player/shuffle",
            &[("state", state), ("device_id", device_id)],
            None,
        )
        .await
    }
}
