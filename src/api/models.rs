use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

// Per-field tolerant decoding. A malformed field becomes `None` (or is
// dropped from a list) instead of failing the whole payload.

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    match serde_json::from_value(value) {
        Ok(v) => Ok(Some(v)),
        Err(e) => {
            log::warn!("Ignoring unparseable field: {}", e);
            Ok(None)
        }
    }
}

fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Null => return Ok(Vec::new()),
        other => {
            log::warn!("Expected a list, got {}", other);
            return Ok(Vec::new());
        }
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(v) => Some(v),
            Err(e) => {
                log::warn!("Skipping unparseable list entry: {}", e);
                None
            }
        })
        .collect())
}

// Wire types

/// `GET /me/player`. Every field is optional; the service omits `item`
/// when nothing is queued.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaybackStatusResponse {
    #[serde(default, deserialize_with = "lenient")]
    pub item: Option<PlayingItem>,
    #[serde(default, deserialize_with = "lenient")]
    pub progress_ms: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub is_playing: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub repeat_state: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub shuffle_state: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayingItem {
    #[serde(default, deserialize_with = "lenient")]
    pub uri: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DevicesResponse {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub devices: Vec<Device>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct Paging<T> {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub items: Vec<T>,
    #[serde(default, deserialize_with = "lenient")]
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistTrackItem {
    #[serde(default, deserialize_with = "lenient")]
    pub track: Option<TrackObject>,
}

#[derive(Debug, Deserialize)]
pub struct ImageObject {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ArtistObject {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AlbumObject {
    pub name: String,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub images: Vec<ImageObject>,
}

#[derive(Debug, Deserialize)]
pub struct TrackObject {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,
    pub name: String,
    pub duration_ms: u64,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub artists: Vec<ArtistObject>,
    pub album: AlbumObject,
    pub uri: String,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistObject {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "lenient")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub images: Vec<ImageObject>,
    pub uri: String,
}

#[derive(Debug, Deserialize)]
pub struct UserProfile {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,
}

/// A row from the session-id keyed token table.
#[derive(Debug, Deserialize)]
pub struct TokenRow {
    #[serde(default, deserialize_with = "lenient")]
    pub access_token: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub refresh_token: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub expires_at: Option<String>,
}

/// Body of `PUT /me/player/play`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayRequest {
    pub context_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<PlayOffset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayOffset {
    pub uri: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatState {
    Off,
    Track,
}

impl RepeatState {
    pub fn as_str(self) -> &'static str {
        match self {
            RepeatState::Off => "off",
            RepeatState::Track => "track",
        }
    }
}

// Domain types

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,
    #[serde(alias = "is_active")]
    pub is_active: bool,
    #[serde(alias = "is_restricted")]
    pub is_restricted: bool,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    #[serde(default, alias = "volume_percent", deserialize_with = "lenient")]
    pub volume_percent: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artist {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub name: String,
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub name: String,
    pub duration_ms: u64,
    pub artists: Vec<Artist>,
    pub album: Album,
    pub uri: String,
}

/// Tracks are the same track when their URIs match.
impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
    }
}

impl Eq for Track {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub images: Vec<String>,
    pub tracks: Vec<Track>,
    pub uri: String,
}

impl Track {
    pub fn first_artist_name(&self) -> &str {
        self.artists.first().map(|a| a.name.as_str()).unwrap_or("")
    }
}

impl Playlist {
    pub fn with_tracks(&self, tracks: Vec<Track>) -> Self {
        Self {
            tracks,
            ..self.clone()
        }
    }

    pub fn contains_uri(&self, uri: &str) -> bool {
        self.tracks.iter().any(|t| t.uri == uri)
    }
}

/// `spotify:track:abc` -> `abc`. A bare id is returned unchanged.
pub fn id_from_uri(uri: &str) -> &str {
    uri.rsplit(':').next().unwrap_or(uri)
}

pub fn playlist_uri(playlist_id: &str) -> String {
    format!("spotify:playlist:{}", playlist_id)
}

impl TrackObject {
    /// Local files have no id and cannot be played remotely.
    pub fn into_track(self) -> Option<Track> {
        let id = self.id?;
        Some(Track {
            id,
            name: self.name,
            duration_ms: self.duration_ms,
            artists: self
                .artists
                .into_iter()
                .map(|a| Artist { name: a.name })
                .collect(),
            album: Album {
                name: self.album.name,
                images: self.album.images.into_iter().map(|i| i.url).collect(),
            },
            uri: self.uri,
        })
    }
}

impl PlaylistObject {
    pub fn into_playlist(self) -> Playlist {
        Playlist {
            id: self.id,
            name: self.name,
            description: self.description,
            images: self.images.into_iter().map(|i| i.url).collect(),
            tracks: Vec::new(),
            uri: self.uri,
        }
    }
}
