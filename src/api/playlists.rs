use crate::api::client::SpotifyClient;
use crate::api::models::{Paging, Playlist, PlaylistObject, Track};
use crate::error::AppResult;
use async_trait::async_trait;

/// Read side used by the catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_track(&self, track_uri: &str) -> AppResult<Track>;
    async fn fetch_playlist_tracks(&self, playlist_id: &str) -> AppResult<Vec<Track>>;
    async fn fetch_user_playlists(&self) -> AppResult<Vec<Playlist>>;
}

/// Write side used by playlist management.
#[async_trait]
pub trait PlaylistEditor: Send + Sync {
    async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> AppResult<Playlist>;
    async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> AppResult<()>;
    async fn remove_tracks(&self, playlist_id: &str, uris: &[String]) -> AppResult<()>;
    async fn unfollow_playlist(&self, playlist_id: &str) -> AppResult<()>;
}

impl SpotifyClient {
    pub async fn get_user_playlists(&self) -> AppResult<Vec<Playlist>> {
        let mut playlists = Vec::new();
        let mut next = Some("/me/playlists?limit=50".to_string());

        while let Some(path) = next.take() {
            let response = self.get(&path).await?;
            let page: Paging<PlaylistObject> = response.json().await?;
            if page.items.is_empty() {
                log::debug!("[user_playlists] page without playlists");
            }
            playlists.extend(page.items.into_iter().map(PlaylistObject::into_playlist));
            next = page.next;
        }

        Ok(playlists)
    }
}

#[async_trait]
impl CatalogSource for SpotifyClient {
    async fn fetch_track(&self, track_uri: &str) -> AppResult<Track> {
        self.get_track(track_uri).await
    }

    async fn fetch_playlist_tracks(&self, playlist_id: &str) -> AppResult<Vec<Track>> {
        self.get_playlist_tracks(playlist_id).await
    }

    async fn fetch_user_playlists(&self) -> AppResult<Vec<Playlist>> {
        self.get_user_playlists().await
    }
}

#[async_trait]
impl PlaylistEditor for SpotifyClient {
    async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> AppResult<Playlist> {
        let mut body = serde_json::json!({
            "name": name,
            "public": false
        });
        if let Some(description) = description.filter(|d| !d.trim().is_empty()) {
            body["description"] = serde_json::Value::from(description);
        }

        let path = format!("/users/{}/playlists", user_id);
        let response = self.post(&path, &body).await?;
        let created: PlaylistObject = response.json().await?;
        Ok(created.into_playlist())
    }

    async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> AppResult<()> {
        let body = serde_json::json!({ "uris": uris });
        let path = format!("/playlists/{}/tracks", playlist_id);
        self.post(&path, &body).await?;
        Ok(())
    }

    async fn remove_tracks(&self, playlist_id: &str, uris: &[String]) -> AppResult<()> {
        let tracks: Vec<serde_json::Value> = uris
            .iter()
            .map(|uri| serde_json::json!({ "uri": uri }))
            .collect();
        let body = serde_json::json!({ "tracks": tracks });
        let path = format!("/playlists/{}/tracks", playlist_id);
        self.delete_with_body(&path, &body).await?;
        Ok(())
    }

    async fn unfollow_playlist(&self, playlist_id: &str) -> AppResult<()> {
        let path = format!("/playlists/{}/followers", playlist_id);
        self.delete(&path).await?;
        Ok(())
    }
}
