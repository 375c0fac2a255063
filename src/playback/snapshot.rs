use serde::Serialize;

/// What is playing right now, as last confirmed. Replaced whole on every
/// observed change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub track_uri: Option<String>,
    pub progress_ms: u64,
    pub is_paused: bool,
}
