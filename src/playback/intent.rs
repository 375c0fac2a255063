use crate::api::models::{PlayOffset, PlayRequest};

/// The last state this client asked for or observed. Used to decide between
/// resuming and restarting, and as the fallback for fields the status
/// endpoint omits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalIntent {
    pub last_track_uri: Option<String>,
    pub last_position_ms: u64,
    pub is_paused_locally: bool,
}

impl LocalIntent {
    /// Same track, paused: playing it again should pick up where it stopped.
    pub fn should_resume(&self, track_uri: &str) -> bool {
        self.is_paused_locally && self.last_track_uri.as_deref() == Some(track_uri)
    }
}

/// Build the play request for `context_uri`, optionally starting at
/// `track_uri`.
///
/// Resuming uses `resume_position_ms`, or the last known position when the
/// caller does not supply one. Any other track starts at 0.
pub fn plan_play(
    intent: &LocalIntent,
    context_uri: &str,
    track_uri: Option<&str>,
    resume_position_ms: Option<u64>,
) -> PlayRequest {
    let Some(track_uri) = track_uri else {
        return PlayRequest {
            context_uri: context_uri.to_string(),
            offset: None,
            position_ms: None,
        };
    };

    let position_ms = if intent.should_resume(track_uri) {
        resume_position_ms.unwrap_or(intent.last_position_ms)
    } else {
        0
    };

    PlayRequest {
        context_uri: context_uri.to_string(),
        offset: Some(PlayOffset {
            uri: track_uri.to_string(),
        }),
        position_ms: Some(position_ms),
    }
}
