pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod library;
pub mod observable;
pub mod playback;
pub mod session;
pub mod tabs;

#[cfg(test)]
mod testing;

use api::auth::{self, LoginRequest, RetryPolicy};
use api::client::SpotifyClient;
use api::models::Device;
use api::SpotifyApi;
use catalog::Catalog;
use config::AppConfig;
use error::{AppError, AppResult};
use library::Library;
use playback::PlaybackController;
use session::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tabs::{LoggingRenderer, TabSyncCoordinator};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// The wired-up application: one session, one remote service, and the
/// playback, tab and library state built on them.
pub struct ToneSeer<C: SpotifyApi = SpotifyClient> {
    pub config: AppConfig,
    pub session: SessionStore,
    pub client: Arc<C>,
    pub catalog: Arc<Catalog<C>>,
    pub playback: PlaybackController<C>,
    pub tabs: Arc<TabSyncCoordinator>,
    pub library: Arc<Library<C>>,
    follower: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ToneSeer<SpotifyClient> {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let session = SessionStore::new();
        let client = SpotifyClient::new(&config.api_base_url, &config.user_agent, session.clone())?;
        Ok(Self::with_client(config, session, Arc::new(client)))
    }

    pub fn start_login(&self) -> LoginRequest {
        auth::start_login(&self.config.login_page_url)
    }

    /// Wait for the token behind `login`, store it, then resolve the user id.
    /// A failed user lookup keeps the session without one.
    pub async fn complete_login(
        &self,
        login: &LoginRequest,
        cancel: watch::Receiver<bool>,
    ) -> AppResult<()> {
        let policy = RetryPolicy {
            interval: Duration::from_millis(self.config.token_retry_interval_ms),
            max_interval: Duration::from_millis(self.config.token_retry_max_interval_ms),
            backoff: self.config.token_retry_backoff,
        };
        let http = self.client.http_client();
        let lookup_url = self.config.token_lookup_url.as_str();
        let api_key = self.config.token_lookup_api_key.as_str();
        let session_id = login.session_id.as_str();
        let session = auth::wait_for_session(
            move || auth::lookup_session(http, lookup_url, api_key, session_id),
            policy,
            self.config.token_wait_timeout(),
            cancel,
        )
        .await?;

        self.session.replace(session.clone());
        match self.client.current_user_id().await {
            Ok(user_id) => self.session.replace(session.with_user_id(user_id)),
            Err(e) => log::warn!("[login] user lookup failed ({}): {}", e.kind(), e),
        }
        log::info!("[login] signed in");
        Ok(())
    }
}

impl<C: SpotifyApi> ToneSeer<C> {
    pub fn with_client(config: AppConfig, session: SessionStore, client: Arc<C>) -> Self {
        let catalog = Arc::new(Catalog::new(
            Arc::clone(&client),
            config.genre_playlists.clone(),
        ));
        let playback =
            PlaybackController::new(Arc::clone(&client), session.clone(), config.poll_interval());
        let tabs = Arc::new(TabSyncCoordinator::new(
            &config.tab_search_base_url,
            &config.tab_home_url,
            config.tab_settle_delay(),
        ));
        let library = Arc::new(Library::new(
            Arc::clone(&client),
            Arc::clone(&catalog),
            Arc::clone(&tabs),
            session.clone(),
        ));

        Self {
            config,
            session,
            client,
            catalog,
            playback,
            tabs,
            library,
            follower: std::sync::Mutex::new(None),
        }
    }

    /// Play or pause the selected track. A track other than the one playing
    /// always starts playing within the selected playlist.
    pub async fn toggle_play_pause(&self) -> AppResult<()> {
        let (Some(track), Some(playlist)) =
            (self.library.selected_track(), self.library.selected_playlist())
        else {
            log::warn!("[toggle] no track or playlist selected");
            return Ok(());
        };

        let snapshot = self.playback.snapshot();
        let playing_uri = snapshot.as_ref().and_then(|s| s.track_uri.as_deref());
        if playing_uri != Some(track.uri.as_str()) {
            return self.playback.play(&playlist.uri, Some(&track.uri), None).await;
        }

        if snapshot.as_ref().map_or(true, |s| s.is_paused) {
            self.playback.play(&playlist.uri, Some(&track.uri), None).await
        } else {
            self.playback.pause().await
        }
    }

    /// Back to the top, paused, with the tab view reloaded.
    pub async fn restart(&self) -> AppResult<()> {
        self.playback.restart().await?;
        self.tabs.refresh();
        Ok(())
    }

    /// Keep the selected track in step with whatever the remote player moves
    /// on to.
    pub fn start_now_playing_follower(&self) {
        let library = Arc::clone(&self.library);
        let mut snapshots = self.playback.surfaces().snapshot.subscribe();
        let handle = tokio::spawn(async move {
            let mut last_uri: Option<String> = None;
            while snapshots.changed().await.is_ok() {
                let uri = snapshots
                    .borrow_and_update()
                    .as_ref()
                    .and_then(|s| s.track_uri.clone());
                let Some(uri) = uri else { continue };
                if last_uri.as_deref() == Some(uri.as_str()) {
                    continue;
                }
                last_uri = Some(uri.clone());
                if let Err(e) = library.follow_now_playing(&uri).await {
                    log::warn!("[follow] {} ({}): {}", uri, e.kind(), e);
                }
            }
        });

        let mut follower = self
            .follower
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(old) = follower.replace(handle) {
            old.abort();
        }
    }

    pub fn shutdown(&self) {
        self.playback.stop_polling();
        self.tabs.detach();
        let mut follower = self
            .follower
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(handle) = follower.take() {
            handle.abort();
        }
        log::info!("Shut down");
    }
}

/// Preferred name first, then the active device, then the first usable one.
pub fn choose_device(devices: &[Device], preferred_name: Option<&str>) -> Option<String> {
    let usable = || devices.iter().filter(|d| d.id.is_some() && !d.is_restricted);
    preferred_name
        .and_then(|name| usable().find(|d| d.name.eq_ignore_ascii_case(name)))
        .or_else(|| usable().find(|d| d.is_active))
        .or_else(|| usable().next())
        .and_then(|d| d.id.clone())
}

pub async fn run() -> AppResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("toneseer=info"))
        .init();

    let config = AppConfig::load_or_init()?;
    if config.token_lookup_api_key.is_empty() {
        return Err(AppError::Config(
            "tokenLookupApiKey is not set in the config file".into(),
        ));
    }

    let app = ToneSeer::new(config)?;

    let (cancel_tx, mut cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Interrupted");
            let _ = cancel_tx.send(true);
        }
    });

    let login = app.start_login();
    app.complete_login(&login, cancel_rx.clone()).await?;

    let genres = app.catalog.preload_genres().await;
    log::info!("{} genre playlists ready", genres);
    if let Err(e) = app.catalog.load_user_playlists().await {
        log::warn!("Failed to load playlists: {}", e);
    }

    let devices = app.playback.list_devices().await;
    match choose_device(&devices, app.config.preferred_device_name.as_deref()) {
        Some(device_id) => app.playback.select_device(&device_id),
        None => log::warn!("No playback device available"),
    }

    app.tabs.attach(
        Arc::new(LoggingRenderer),
        app.playback.surfaces().snapshot.subscribe(),
    );
    app.tabs.set_renderer_ready(true);
    app.start_now_playing_follower();

    while !*cancel_rx.borrow_and_update() {
        if cancel_rx.changed().await.is_err() {
            break;
        }
    }

    app.shutdown();
    Ok(())
}
