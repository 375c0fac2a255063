use crate::api::models::{Playlist, Track};
use crate::api::playlists::{CatalogSource, PlaylistEditor};
use crate::catalog::Catalog;
use crate::error::{AppError, AppResult};
use crate::observable::Observable;
use crate::session::SessionStore;
use crate::tabs::TabSyncCoordinator;
use rand::seq::SliceRandom;
use std::sync::Arc;

const CREATED_DESCRIPTION: &str = "Created by ToneSeer";

#[derive(Debug)]
pub struct LibrarySurfaces {
    pub selected_playlist: Observable<Option<Playlist>>,
    pub tracks: Observable<Vec<Track>>,
    pub selected_track: Observable<Option<Track>>,
    pub loading: Observable<bool>,
    /// Set once a playlist opened by name has its tracks loaded.
    pub ready_to_navigate: Observable<bool>,
}

impl Default for LibrarySurfaces {
    fn default() -> Self {
        Self {
            selected_playlist: Observable::new(None),
            tracks: Observable::new(Vec::new()),
            selected_track: Observable::new(None),
            loading: Observable::new(false),
            ready_to_navigate: Observable::new(false),
        }
    }
}

/// Selection state plus playlist management on top of the catalog.
pub struct Library<S: CatalogSource + PlaylistEditor> {
    editor: Arc<S>,
    catalog: Arc<Catalog<S>>,
    tabs: Arc<TabSyncCoordinator>,
    session: SessionStore,
    surfaces: LibrarySurfaces,
}

impl<S: CatalogSource + PlaylistEditor> Library<S> {
    pub fn new(
        editor: Arc<S>,
        catalog: Arc<Catalog<S>>,
        tabs: Arc<TabSyncCoordinator>,
        session: SessionStore,
    ) -> Self {
        Self {
            editor,
            catalog,
            tabs,
            session,
            surfaces: LibrarySurfaces::default(),
        }
    }

    pub fn surfaces(&self) -> &LibrarySurfaces {
        &self.surfaces
    }

    pub fn selected_track(&self) -> Option<Track> {
        self.surfaces.selected_track.get()
    }

    pub fn selected_playlist(&self) -> Option<Playlist> {
        self.surfaces.selected_playlist.get()
    }

    fn require_token(&self) -> AppResult<()> {
        self.session
            .access_token()
            .map(|_| ())
            .ok_or(AppError::NotReady("no session token"))
    }

    fn require_user(&self) -> AppResult<String> {
        self.require_token()?;
        self.session
            .user_id()
            .ok_or(AppError::NotReady("no user id"))
    }

    /// Select `track` and point the tab view at it.
    pub fn select_track(&self, track: Track) {
        log::info!("[library] selected {} - {}", track.first_artist_name(), track.name);
        self.tabs.show_track(&track);
        self.surfaces.selected_track.set(Some(track));
    }

    /// Select `playlist`, loading its tracks when it has none.
    pub async fn select_playlist(&self, playlist: Playlist) -> AppResult<Playlist> {
        self.surfaces.selected_playlist.set(Some(playlist.clone()));
        let playlist = if playlist.tracks.is_empty() {
            let loaded = self.catalog.playlist_with_tracks(&playlist).await?;
            self.surfaces.selected_playlist.set(Some(loaded.clone()));
            loaded
        } else {
            playlist
        };
        self.surfaces.tracks.set(playlist.tracks.clone());
        Ok(playlist)
    }

    /// Catalog entry with this name (any case), or a new private playlist.
    pub async fn get_or_create_playlist(&self, name: &str) -> AppResult<Playlist> {
        let user_id = self.require_user()?;
        if let Some(existing) = self.catalog.find_playlist_by_name(name).await {
            return Ok(existing);
        }
        log::info!("[library] creating playlist {}", name);
        let created = self
            .editor
            .create_playlist(&user_id, name, Some(CREATED_DESCRIPTION))
            .await?;
        self.catalog.upsert_playlist(created.clone()).await;
        Ok(created)
    }

    /// Get or create `name`, select it and load a fresh track list.
    pub async fn open_playlist_by_name(&self, name: &str) -> AppResult<Playlist> {
        self.require_user()?;
        self.surfaces.loading.set(true);
        self.surfaces.ready_to_navigate.set(false);

        let result = async {
            let playlist = self.get_or_create_playlist(name).await?;
            let loaded = self.catalog.playlist_with_tracks(&playlist).await?;
            self.select_playlist(loaded).await
        }
        .await;

        self.surfaces.loading.set(false);
        match result {
            Ok(playlist) => {
                self.surfaces.ready_to_navigate.set(true);
                Ok(playlist)
            }
            Err(e) => {
                log::warn!("[library] open {} failed ({}): {}", name, e.kind(), e);
                Err(e)
            }
        }
    }

    pub fn reset_ready_to_navigate(&self) {
        self.surfaces.ready_to_navigate.set_if_changed(false);
    }

    pub async fn create_playlist(&self, name: &str, description: Option<&str>) -> AppResult<Playlist> {
        let user_id = self.require_user()?;
        let created = self.editor.create_playlist(&user_id, name, description).await?;
        log::info!("[library] created playlist {} ({})", created.name, created.id);
        self.catalog.upsert_playlist(created.clone()).await;
        Ok(created)
    }

    pub async fn delete_playlist(&self, playlist: &Playlist) -> AppResult<()> {
        self.require_token()?;
        self.editor.unfollow_playlist(&playlist.id).await?;
        self.catalog.remove_playlist(&playlist.id).await;
        log::info!("[library] deleted playlist {}", playlist.id);

        let was_selected = self
            .surfaces
            .selected_playlist
            .get()
            .is_some_and(|p| p.id == playlist.id);
        if was_selected {
            self.surfaces.selected_playlist.set(None);
            self.surfaces.tracks.set(Vec::new());
        }
        Ok(())
    }

    /// Returns `false` when the track was already in the playlist.
    pub async fn add_track_to_playlist(&self, track: &Track, target: &Playlist) -> AppResult<bool> {
        self.require_token()?;
        let existing = self.catalog.playlist_with_tracks(target).await?;
        if existing.contains_uri(&track.uri) {
            log::debug!("[library] {} already in {}", track.name, target.name);
            return Ok(false);
        }
        self.editor
            .add_tracks(&target.id, std::slice::from_ref(&track.uri))
            .await?;
        log::info!("[library] added {} to {}", track.name, target.name);
        Ok(true)
    }

    /// Remove the selected track from the selected playlist. No-op when
    /// either is missing.
    pub async fn remove_selected_track(&self) -> AppResult<()> {
        let (Some(track), Some(playlist)) = (self.selected_track(), self.selected_playlist()) else {
            log::debug!("[library] nothing selected to remove");
            return Ok(());
        };
        self.require_token()?;
        self.editor
            .remove_tracks(&playlist.id, std::slice::from_ref(&track.uri))
            .await?;

        let remaining: Vec<Track> = self
            .surfaces
            .tracks
            .get()
            .into_iter()
            .filter(|t| t.uri != track.uri)
            .collect();
        self.surfaces.tracks.set(remaining.clone());

        let updated = playlist.with_tracks(remaining);
        self.surfaces.selected_playlist.set(Some(updated.clone()));
        if self.catalog.playlist(&updated.id).await.is_some() {
            self.catalog.upsert_playlist(updated).await;
        }

        let still_selected = self
            .surfaces
            .selected_track
            .get()
            .is_some_and(|t| t.uri == track.uri);
        if still_selected {
            self.surfaces.selected_track.set(None);
        }
        Ok(())
    }

    /// Pick a random track from the genre's seed playlist, or from the
    /// selected playlist when no genre is given. The source playlist becomes
    /// the selection.
    pub async fn suggest_random_song(&self, genre: Option<&str>) -> AppResult<Option<Track>> {
        let source = match genre {
            Some(genre) => Some(self.catalog.genre_playlist(genre).await?),
            None => self.selected_playlist(),
        };
        let Some(source) = source else {
            log::warn!("[suggest] no playlist to suggest from");
            return Ok(None);
        };
        self.suggest_from(source).await
    }

    pub async fn suggest_another(&self, playlist: Playlist) -> AppResult<Option<Track>> {
        self.surfaces.tracks.set(playlist.tracks.clone());
        self.suggest_from(playlist).await
    }

    async fn suggest_from(&self, playlist: Playlist) -> AppResult<Option<Track>> {
        let playlist = self.select_playlist(playlist).await?;
        let picked = playlist.tracks.choose(&mut rand::thread_rng()).cloned();
        match &picked {
            Some(track) => {
                log::info!("[suggest] {} - {}", track.first_artist_name(), track.name);
                self.surfaces.selected_track.set(Some(track.clone()));
            }
            None => log::warn!("[suggest] {} has no tracks", playlist.name),
        }
        Ok(picked)
    }

    /// Follow the remote player onto `track_uri` when it differs from the
    /// selection.
    pub async fn follow_now_playing(&self, track_uri: &str) -> AppResult<()> {
        let current = self.selected_track();
        if current.as_ref().is_some_and(|t| t.uri == track_uri) {
            return Ok(());
        }
        let track = self
            .catalog
            .resolve_track(track_uri, &self.surfaces.tracks.get())
            .await?;
        self.select_track(track);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_genre_playlists;
    use crate::session::Session;
    use crate::testing::{playlist, track, Call, FakeSpotify};
    use std::time::Duration;

    struct Fixture {
        fake: Arc<FakeSpotify>,
        tabs: Arc<TabSyncCoordinator>,
        library: Library<FakeSpotify>,
    }

    fn fixture(session: SessionStore) -> Fixture {
        let fake = Arc::new(FakeSpotify::new());
        let catalog = Arc::new(Catalog::new(Arc::clone(&fake), default_genre_playlists()));
        let tabs = Arc::new(TabSyncCoordinator::new(
            "https://www.songsterr.com/a/wa/",
            "https://www.songsterr.com/",
            Duration::from_millis(200),
        ));
        let library = Library::new(Arc::clone(&fake), catalog, Arc::clone(&tabs), session);
        Fixture { fake, tabs, library }
    }

    fn signed_in() -> SessionStore {
        SessionStore::with_session(Session::new("tok").with_user_id(Some("me".into())))
    }

    #[tokio::test]
    async fn selecting_a_track_updates_tab_url() {
        let f = fixture(signed_in());
        f.library.select_track(track("1", "Enter Sandman", "Metallica"));
        assert_eq!(
            f.tabs.tab_url().as_deref(),
            Some("https://www.songsterr.com/a/wa/search?pattern=Metallica%20Enter%20Sandman")
        );
        assert_eq!(f.library.selected_track().map(|t| t.id), Some("1".into()));
    }

    #[tokio::test]
    async fn open_by_name_creates_once_and_loads_tracks() {
        let f = fixture(signed_in());
        let mut ready = f.library.surfaces().ready_to_navigate.subscribe();

        let opened = f.library.open_playlist_by_name("Learning").await.unwrap();
        assert_eq!(opened.name, "Learning");
        assert!(*ready.borrow_and_update());
        assert!(!f.library.surfaces().loading.get());
        assert_eq!(f.library.selected_playlist().map(|p| p.id), Some(opened.id.clone()));

        f.library.reset_ready_to_navigate();
        f.library.open_playlist_by_name("learning").await.unwrap();
        assert_eq!(
            f.fake.count(|c| matches!(c, Call::CreatePlaylist { .. })),
            1
        );
    }

    #[tokio::test]
    async fn open_by_name_needs_user() {
        let f = fixture(SessionStore::with_session(Session::new("tok")));
        let err = f.library.open_playlist_by_name("Learning").await.unwrap_err();
        assert!(err.is_precondition());
        assert!(f.fake.calls().is_empty());
        assert!(!f.library.surfaces().loading.get());
    }

    #[tokio::test]
    async fn adding_a_present_track_is_skipped() {
        let f = fixture(signed_in());
        let song = track("1", "Song", "Band");
        f.fake.set_playlist_tracks("p", vec![song.clone()]);
        let target = playlist("p", "Practice");

        assert!(!f.library.add_track_to_playlist(&song, &target).await.unwrap());
        let other = track("2", "Other", "Band");
        assert!(f.library.add_track_to_playlist(&other, &target).await.unwrap());
        assert_eq!(
            f.fake.count(|c| matches!(c, Call::AddTracks { .. })),
            1
        );
    }

    #[tokio::test]
    async fn removing_selected_track_updates_selection() {
        let f = fixture(signed_in());
        let keep = track("1", "Keep", "Band");
        let drop_me = track("2", "Drop", "Band");
        f.fake.set_playlist_tracks("p", vec![keep.clone(), drop_me.clone()]);

        f.library.select_playlist(playlist("p", "Practice")).await.unwrap();
        f.library.select_track(drop_me.clone());
        f.library.remove_selected_track().await.unwrap();

        assert_eq!(f.library.surfaces().tracks.get(), vec![keep]);
        assert!(f.library.selected_track().is_none());
        assert!(f.fake.calls().contains(&Call::RemoveTracks {
            playlist_id: "p".into(),
            uris: vec![drop_me.uri],
        }));
    }

    #[tokio::test]
    async fn deleting_selected_playlist_clears_it() {
        let f = fixture(signed_in());
        let created = f.library.create_playlist("Temp", None).await.unwrap();
        f.library.select_playlist(created.clone()).await.unwrap();

        f.library.delete_playlist(&created).await.unwrap();
        assert!(f.library.selected_playlist().is_none());
        assert!(f.library.surfaces().tracks.get().is_empty());
    }

    #[tokio::test]
    async fn suggestion_comes_from_genre_playlist() {
        let f = fixture(signed_in());
        let tracks = vec![track("1", "A", "X"), track("2", "B", "Y")];
        f.fake.set_playlist_tracks("5rdgRwdMskt1IJKjNf0VWQ", tracks.clone());

        let picked = f.library.suggest_random_song(Some("Jazz")).await.unwrap().unwrap();
        assert!(tracks.contains(&picked));
        assert_eq!(f.library.selected_playlist().map(|p| p.name), Some("Jazz".into()));
        assert_eq!(f.library.surfaces().tracks.get().len(), 2);

        f.library.suggest_random_song(Some("jazz")).await.unwrap();
        assert_eq!(
            f.fake.count(|c| matches!(c, Call::FetchPlaylistTracks(_))),
            1
        );
    }

    #[tokio::test]
    async fn suggestion_without_playlist_is_empty() {
        let f = fixture(signed_in());
        assert_eq!(f.library.suggest_random_song(None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn follows_now_playing_track() {
        let f = fixture(signed_in());
        let listed = track("1", "Listed", "Band");
        f.fake.set_playlist_tracks("p", vec![listed.clone()]);
        f.fake.add_track(track("9", "Elsewhere", "Other"));
        f.library.select_playlist(playlist("p", "Practice")).await.unwrap();

        f.library.follow_now_playing("spotify:track:1").await.unwrap();
        assert_eq!(f.library.selected_track(), Some(listed));
        assert_eq!(f.fake.count(|c| matches!(c, Call::FetchTrack(_))), 0);

        f.library.follow_now_playing("spotify:track:9").await.unwrap();
        assert_eq!(f.library.selected_track().map(|t| t.name), Some("Elsewhere".into()));
        assert!(f.tabs.tab_url().unwrap().ends_with("Other%20Elsewhere"));
    }
}
