use crate::api::models::PlaybackStatusResponse;
use crate::playback::intent::LocalIntent;
use crate::playback::snapshot::PlaybackSnapshot;

/// Result of folding one status poll into the local state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Present only when the snapshot differs from the last published one.
    pub snapshot: Option<PlaybackSnapshot>,
    pub repeat_track: bool,
    pub shuffle: bool,
}

/// Owns the local intent and the last published snapshot.
///
/// Field defaults when the status omits or garbles a value:
/// - track uri: last known track (the service drops `item` when idle)
/// - progress: last known position
/// - paused: `true`
/// - repeat: off unless `repeat_state == "track"`
/// - shuffle: off
#[derive(Debug, Default)]
pub struct Reconciler {
    intent: LocalIntent,
    published: Option<PlaybackSnapshot>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intent(&self) -> &LocalIntent {
        &self.intent
    }

    pub fn intent_mut(&mut self) -> &mut LocalIntent {
        &mut self.intent
    }

    pub fn published(&self) -> Option<&PlaybackSnapshot> {
        self.published.as_ref()
    }

    pub fn decode(&self, status: &PlaybackStatusResponse) -> PlaybackSnapshot {
        let track_uri = status
            .item
            .as_ref()
            .and_then(|item| item.uri.clone())
            .or_else(|| self.intent.last_track_uri.clone());
        let progress_ms = status.progress_ms.unwrap_or(self.intent.last_position_ms);
        let is_paused = status.is_playing.map(|playing| !playing).unwrap_or(true);

        PlaybackSnapshot {
            track_uri,
            progress_ms,
            is_paused,
        }
    }

    pub fn observe(&mut self, status: &PlaybackStatusResponse) -> Observation {
        let snapshot = self.decode(status);
        Observation {
            snapshot: self.accept(snapshot),
            repeat_track: status.repeat_state.as_deref() == Some("track"),
            shuffle: status.shuffle_state.unwrap_or(false),
        }
    }

    /// Adopt `snapshot` if any of its fields changed. Returns it when it
    /// should be published.
    pub fn accept(&mut self, snapshot: PlaybackSnapshot) -> Option<PlaybackSnapshot> {
        if self.published.as_ref() == Some(&snapshot) {
            return None;
        }
        self.intent.last_track_uri = snapshot.track_uri.clone();
        self.intent.last_position_ms = snapshot.progress_ms;
        self.intent.is_paused_locally = snapshot.is_paused;
        self.published = Some(snapshot.clone());
        Some(snapshot)
    }

    /// Roll back an optimistic intent edit. `previous` is restored only if
    /// nothing was published since `published_before` was read; otherwise the
    /// intent follows the newer published snapshot.
    pub fn revert(&mut self, previous: LocalIntent, published_before: Option<&PlaybackSnapshot>) {
        match &self.published {
            Some(current) if Some(current) != published_before => {
                self.intent.last_track_uri = current.track_uri.clone();
                self.intent.last_position_ms = current.progress_ms;
                self.intent.is_paused_locally = current.is_paused;
            }
            _ => self.intent = previous,
        }
    }
}
