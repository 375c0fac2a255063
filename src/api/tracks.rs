use crate::api::client::SpotifyClient;
use crate::api::models::{id_from_uri, Paging, PlaylistTrackItem, Track, TrackObject};
use crate::error::{AppError, AppResult};

impl SpotifyClient {
    /// Accepts either a bare track id or a `spotify:track:<id>` URI.
    pub async fn get_track(&self, track_uri: &str) -> AppResult<Track> {
        let track_id = id_from_uri(track_uri);
        let path = format!("/tracks/{}", track_id);
        let response = self.get(&path).await?;
        let body: TrackObject = response.json().await?;

        body.into_track()
            .ok_or_else(|| AppError::NotFound(format!("Track {} has no id", track_id)))
    }

    /// All tracks of a playlist, following pagination. Entries without a
    /// playable track (removed or local files) are skipped.
    pub async fn get_playlist_tracks(&self, playlist_id: &str) -> AppResult<Vec<Track>> {
        let mut tracks = Vec::new();
        let mut next = Some(format!("/playlists/{}/tracks?limit=100", playlist_id));

        while let Some(path) = next.take() {
            let response = self.get(&path).await?;
            let page: Paging<PlaylistTrackItem> = response.json().await?;
            tracks.extend(
                page.items
                    .into_iter()
                    .filter_map(|item| item.track)
                    .filter_map(TrackObject::into_track),
            );
            next = page.next;
        }

        log::debug!(
            "[playlist_tracks] {} tracks in playlist {}",
            tracks.len(),
            playlist_id
        );
        Ok(tracks)
    }
}
