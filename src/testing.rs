//! In-memory fakes for the remote service and the tab renderer.

use crate::api::models::{
    playlist_uri, Album, Artist, Device, PlayRequest, PlaybackStatusResponse, PlayingItem,
    Playlist, RepeatState, Track,
};
use crate::api::player::RemotePlayer;
use crate::api::playlists::{CatalogSource, PlaylistEditor};
use crate::error::{AppError, AppResult};
use crate::tabs::TabRenderer;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Status,
    Devices,
    Play { device_id: String, request: PlayRequest },
    Pause { device_id: String },
    Next,
    Previous,
    Seek { position_ms: u64 },
    Repeat(RepeatState),
    Shuffle(bool),
    FetchTrack(String),
    FetchPlaylistTracks(String),
    FetchUserPlaylists,
    CreatePlaylist { name: String },
    AddTracks { playlist_id: String, uris: Vec<String> },
    RemoveTracks { playlist_id: String, uris: Vec<String> },
    Unfollow(String),
}

#[derive(Default)]
pub struct FakeSpotify {
    calls: Mutex<Vec<Call>>,
    status: Mutex<Option<PlaybackStatusResponse>>,
    devices: Mutex<Vec<Device>>,
    tracks: Mutex<HashMap<String, Track>>,
    playlist_tracks: Mutex<HashMap<String, Vec<Track>>>,
    user_playlists: Mutex<Vec<Playlist>>,
    failing: Mutex<HashSet<&'static str>>,
    held: Mutex<HashMap<&'static str, Arc<Notify>>>,
}

pub fn track(id: &str, name: &str, artist: &str) -> Track {
    Track {
        id: id.to_string(),
        name: name.to_string(),
        duration_ms: 200_000,
        artists: vec![Artist {
            name: artist.to_string(),
        }],
        album: Album {
            name: "Album".to_string(),
            images: Vec::new(),
        },
        uri: format!("spotify:track:{}", id),
    }
}

pub fn playlist(id: &str, name: &str) -> Playlist {
    Playlist {
        id: id.to_string(),
        name: name.to_string(),
        description: None,
        images: Vec::new(),
        tracks: Vec::new(),
        uri: playlist_uri(id),
    }
}

pub fn device(id: &str, name: &str) -> Device {
    Device {
        id: Some(id.to_string()),
        is_active: false,
        is_restricted: false,
        name: name.to_string(),
        device_type: "tv".to_string(),
        volume_percent: None,
    }
}

impl FakeSpotify {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, uri: Option<&str>, progress_ms: u64, is_playing: bool) {
        *self.status.lock().unwrap() = Some(PlaybackStatusResponse {
            item: uri.map(|u| PlayingItem {
                uri: Some(u.to_string()),
            }),
            progress_ms: Some(progress_ms),
            is_playing: Some(is_playing),
            repeat_state: None,
            shuffle_state: None,
        });
    }

    pub fn set_raw_status(&self, status: Option<PlaybackStatusResponse>) {
        *self.status.lock().unwrap() = status;
    }

    pub fn set_devices(&self, devices: Vec<Device>) {
        *self.devices.lock().unwrap() = devices;
    }

    pub fn add_track(&self, track: Track) {
        self.tracks.lock().unwrap().insert(track.uri.clone(), track);
    }

    pub fn set_playlist_tracks(&self, playlist_id: &str, tracks: Vec<Track>) {
        self.playlist_tracks
            .lock()
            .unwrap()
            .insert(playlist_id.to_string(), tracks);
    }

    pub fn set_user_playlists(&self, playlists: Vec<Playlist>) {
        *self.user_playlists.lock().unwrap() = playlists;
    }

    /// Make every call to `op` fail with a 502.
    pub fn fail(&self, op: &'static str) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn recover(&self, op: &'static str) {
        self.failing.lock().unwrap().remove(op);
    }

    /// Calls to `op` are recorded, then wait for the returned notify before
    /// answering.
    pub fn hold(&self, op: &'static str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.held.lock().unwrap().insert(op, Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn status_calls(&self) -> usize {
        self.count(|c| *c == Call::Status)
    }

    fn record(&self, op: &'static str, call: Call) -> AppResult<()> {
        self.calls.lock().unwrap().push(call);
        if self.failing.lock().unwrap().contains(op) {
            return Err(AppError::RemoteCommandFailed { code: 502 });
        }
        Ok(())
    }

    async fn answer(&self, op: &'static str, call: Call) -> AppResult<()> {
        let result = self.record(op, call);
        let gate = self.held.lock().unwrap().get(op).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        result
    }
}

#[async_trait]
impl RemotePlayer for FakeSpotify {
    async fn playback_status(&self) -> AppResult<Option<PlaybackStatusResponse>> {
        self.answer("status", Call::Status).await?;
        Ok(self.status.lock().unwrap().clone())
    }

    async fn devices(&self) -> AppResult<Vec<Device>> {
        self.record("devices", Call::Devices)?;
        Ok(self.devices.lock().unwrap().clone())
    }

    async fn play(&self, device_id: &str, request: &PlayRequest) -> AppResult<()> {
        self.answer(
            "play",
            Call::Play {
                device_id: device_id.to_string(),
                request: request.clone(),
            },
        )
        .await
    }

    async fn pause(&self, device_id: &str) -> AppResult<()> {
        self.record(
            "pause",
            Call::Pause {
                device_id: device_id.to_string(),
            },
        )
    }

    async fn skip_next(&self, _device_id: &str) -> AppResult<()> {
        self.record("next", Call::Next)
    }

    async fn skip_previous(&self, _device_id: &str) -> AppResult<()> {
        self.record("previous", Call::Previous)
    }

    async fn seek(&self, _device_id: &str, position_ms: u64) -> AppResult<()> {
        self.record("seek", Call::Seek { position_ms })
    }

    async fn set_repeat(&self, _device_id: &str, state: RepeatState) -> AppResult<()> {
        self.record("repeat", Call::Repeat(state))
    }

    async fn set_shuffle(&self, _device_id: &str, enabled: bool) -> AppResult<()> {
        self.record("shuffle", Call::Shuffle(enabled))
    }
}

#[async_trait]
impl CatalogSource for FakeSpotify {
    async fn fetch_track(&self, track_uri: &str) -> AppResult<Track> {
        self.record("track", Call::FetchTrack(track_uri.to_string()))?;
        self.tracks
            .lock()
            .unwrap()
            .get(track_uri)
            .cloned()
            .ok_or_else(|| AppError::NotFound(track_uri.to_string()))
    }

    async fn fetch_playlist_tracks(&self, playlist_id: &str) -> AppResult<Vec<Track>> {
        self.record(
            "playlist_tracks",
            Call::FetchPlaylistTracks(playlist_id.to_string()),
        )?;
        Ok(self
            .playlist_tracks
            .lock()
            .unwrap()
            .get(playlist_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_user_playlists(&self) -> AppResult<Vec<Playlist>> {
        self.record("user_playlists", Call::FetchUserPlaylists)?;
        Ok(self.user_playlists.lock().unwrap().clone())
    }
}

#[async_trait]
impl PlaylistEditor for FakeSpotify {
    async fn create_playlist(
        &self,
        _user_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> AppResult<Playlist> {
        self.record(
            "create_playlist",
            Call::CreatePlaylist {
                name: name.to_string(),
            },
        )?;
        let id = format!("new-{}", name.to_lowercase().replace(' ', "-"));
        Ok(Playlist {
            description: description.map(str::to_string),
            ..playlist(&id, name)
        })
    }

    async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> AppResult<()> {
        self.record(
            "add_tracks",
            Call::AddTracks {
                playlist_id: playlist_id.to_string(),
                uris: uris.to_vec(),
            },
        )
    }

    async fn remove_tracks(&self, playlist_id: &str, uris: &[String]) -> AppResult<()> {
        self.record(
            "remove_tracks",
            Call::RemoveTracks {
                playlist_id: playlist_id.to_string(),
                uris: uris.to_vec(),
            },
        )
    }

    async fn unfollow_playlist(&self, playlist_id: &str) -> AppResult<()> {
        self.record("unfollow", Call::Unfollow(playlist_id.to_string()))
    }
}

/// Records every play/pause instruction it receives.
#[derive(Default)]
pub struct RecordingRenderer {
    delivered: Mutex<Vec<bool>>,
}

impl RecordingRenderer {
    pub fn delivered(&self) -> Vec<bool> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl TabRenderer for RecordingRenderer {
    async fn set_playing(&self, playing: bool) {
        self.delivered.lock().unwrap().push(playing);
    }
}
