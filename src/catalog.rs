use crate::api::models::{playlist_uri, Playlist, Track};
use crate::api::playlists::CatalogSource;
use crate::config::GenreSeed;
use crate::error::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct PlaylistIndex {
    by_id: HashMap<String, Playlist>,
    // Display order only.
    order: Vec<String>,
}

impl PlaylistIndex {
    fn upsert(&mut self, playlist: Playlist) {
        if !self.by_id.contains_key(&playlist.id) {
            self.order.push(playlist.id.clone());
        }
        self.by_id.insert(playlist.id.clone(), playlist);
    }

    fn remove(&mut self, playlist_id: &str) -> Option<Playlist> {
        self.order.retain(|id| id != playlist_id);
        self.by_id.remove(playlist_id)
    }

    fn ordered(&self) -> Vec<Playlist> {
        self.order
            .iter()
            .filter_map(|id| self.by_id.get(id).cloned())
            .collect()
    }
}

/// Process-lifetime cache of playlists, genre seed playlists and tracks.
///
/// Lookups consult the cache first and fetch on a miss. Nothing is evicted.
/// Concurrent misses on the same key may each fetch; the last write wins.
pub struct Catalog<S: CatalogSource> {
    source: Arc<S>,
    genre_seeds: Vec<GenreSeed>,
    playlists: RwLock<PlaylistIndex>,
    genres: RwLock<HashMap<String, Playlist>>,
    tracks: RwLock<HashMap<String, Track>>,
}

fn genre_key(genre: &str) -> String {
    genre.trim().to_lowercase()
}

impl<S: CatalogSource> Catalog<S> {
    pub fn new(source: Arc<S>, genre_seeds: Vec<GenreSeed>) -> Self {
        Self {
            source,
            genre_seeds,
            playlists: RwLock::new(PlaylistIndex::default()),
            genres: RwLock::new(HashMap::new()),
            tracks: RwLock::new(HashMap::new()),
        }
    }

    pub fn genres(&self) -> impl Iterator<Item = &str> {
        self.genre_seeds.iter().map(|seed| seed.genre.as_str())
    }

    fn seed_for(&self, genre: &str) -> Option<&GenreSeed> {
        let key = genre_key(genre);
        self.genre_seeds
            .iter()
            .find(|seed| genre_key(&seed.genre) == key)
    }

    pub async fn cached_genre(&self, genre: &str) -> Option<Playlist> {
        self.genres.read().await.get(&genre_key(genre)).cloned()
    }

    /// The seed playlist for `genre`, with its tracks.
    pub async fn genre_playlist(&self, genre: &str) -> AppResult<Playlist> {
        if let Some(playlist) = self.cached_genre(genre).await {
            return Ok(playlist);
        }

        let seed = self
            .seed_for(genre)
            .ok_or_else(|| AppError::NotFound(format!("genre {}", genre)))?;
        log::info!("[catalog] fetching {} seed playlist {}", seed.genre, seed.playlist_id);
        let tracks = self.source.fetch_playlist_tracks(&seed.playlist_id).await?;
        let playlist = Playlist {
            id: seed.playlist_id.clone(),
            name: seed.genre.clone(),
            description: None,
            images: Vec::new(),
            tracks,
            uri: playlist_uri(&seed.playlist_id),
        };

        self.remember_tracks(&playlist.tracks).await;
        self.genres
            .write()
            .await
            .insert(genre_key(&seed.genre), playlist.clone());
        Ok(playlist)
    }

    /// Fetch every seed playlist not cached yet. One failing genre does not
    /// stop the rest. Returns how many are cached afterwards.
    pub async fn preload_genres(&self) -> usize {
        let genres: Vec<String> = self.genres().map(str::to_string).collect();
        let mut loaded = 0;
        for genre in genres {
            match self.genre_playlist(&genre).await {
                Ok(_) => loaded += 1,
                Err(e) => log::warn!("[catalog] preload {} failed ({}): {}", genre, e.kind(), e),
            }
        }
        loaded
    }

    /// Replace the cached user playlists with a fresh listing.
    pub async fn load_user_playlists(&self) -> AppResult<Vec<Playlist>> {
        let fetched = self.source.fetch_user_playlists().await?;
        let mut index = PlaylistIndex::default();
        for playlist in fetched {
            index.upsert(playlist);
        }
        let ordered = index.ordered();
        log::info!("[catalog] {} user playlists", ordered.len());
        *self.playlists.write().await = index;
        Ok(ordered)
    }

    pub async fn playlists(&self) -> Vec<Playlist> {
        self.playlists.read().await.ordered()
    }

    pub async fn playlist(&self, playlist_id: &str) -> Option<Playlist> {
        self.playlists.read().await.by_id.get(playlist_id).cloned()
    }

    pub async fn find_playlist_by_name(&self, name: &str) -> Option<Playlist> {
        let index = self.playlists.read().await;
        index
            .order
            .iter()
            .filter_map(|id| index.by_id.get(id))
            .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
            .cloned()
    }

    pub async fn upsert_playlist(&self, playlist: Playlist) {
        self.remember_tracks(&playlist.tracks).await;
        self.playlists.write().await.upsert(playlist);
    }

    pub async fn remove_playlist(&self, playlist_id: &str) -> Option<Playlist> {
        self.playlists.write().await.remove(playlist_id)
    }

    /// Fetch the playlist's tracks and store them on the cached entry.
    pub async fn playlist_with_tracks(&self, playlist: &Playlist) -> AppResult<Playlist> {
        let tracks = self.source.fetch_playlist_tracks(&playlist.id).await?;
        let updated = playlist.with_tracks(tracks);
        self.remember_tracks(&updated.tracks).await;

        let mut index = self.playlists.write().await;
        if index.by_id.contains_key(&updated.id) {
            index.upsert(updated.clone());
        }
        drop(index);

        let mut genres = self.genres.write().await;
        if let Some(entry) = genres.values_mut().find(|p| p.id == updated.id) {
            *entry = updated.clone();
        }
        Ok(updated)
    }

    /// Lookup-or-fetch by track URI.
    pub async fn track(&self, track_uri: &str) -> AppResult<Track> {
        if let Some(track) = self.tracks.read().await.get(track_uri) {
            return Ok(track.clone());
        }
        let track = self.source.fetch_track(track_uri).await?;
        self.tracks
            .write()
            .await
            .insert(track_uri.to_string(), track.clone());
        Ok(track)
    }

    /// Prefer the copy in `within`, then the cache, then the service.
    pub async fn resolve_track(&self, track_uri: &str, within: &[Track]) -> AppResult<Track> {
        match within.iter().find(|t| t.uri == track_uri) {
            Some(track) => Ok(track.clone()),
            None => self.track(track_uri).await,
        }
    }

    async fn remember_tracks(&self, tracks: &[Track]) {
        if tracks.is_empty() {
            return;
        }
        let mut cache = self.tracks.write().await;
        for track in tracks {
            cache.insert(track.uri.clone(), track.clone());
        }
    }
}
