use crate::api::models::Track;
use crate::observable::Observable;
use crate::playback::PlaybackSnapshot;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// The embedded tablature view. Implementations diff against their own
/// transport state, so repeated instructions must be harmless.
#[async_trait]
pub trait TabRenderer: Send + Sync {
    async fn set_playing(&self, playing: bool);
}

/// Renderer for headless runs: only logs what it would do.
pub struct LoggingRenderer;

#[async_trait]
impl TabRenderer for LoggingRenderer {
    async fn set_playing(&self, playing: bool) {
        log::info!("[tabs] renderer -> {}", if playing { "play" } else { "pause" });
    }
}

/// `<base>search?pattern=<artist title>`, percent-encoded.
pub fn compute_search_url(search_base: &str, artist: &str, title: &str) -> String {
    let separator = if search_base.ends_with('/') { "" } else { "/" };
    let pattern = format!("{} {}", artist, title);
    format!(
        "{}{}search?pattern={}",
        search_base,
        separator,
        urlencoding::encode(&pattern)
    )
}

#[derive(Debug)]
pub struct TabSurfaces {
    /// Where the renderer should be. `None` until a track is chosen.
    pub tab_url: Observable<Option<String>>,
    /// Bumped to reload the current URL without changing it.
    pub refresh: Observable<u64>,
    pub renderer_ready: Observable<bool>,
}

pub struct TabSyncCoordinator {
    search_base: String,
    home_url: String,
    settle_delay: Duration,
    surfaces: Arc<TabSurfaces>,
    sync_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl TabSyncCoordinator {
    pub fn new(search_base: &str, home_url: &str, settle_delay: Duration) -> Self {
        Self {
            search_base: search_base.to_string(),
            home_url: home_url.to_string(),
            settle_delay,
            surfaces: Arc::new(TabSurfaces {
                tab_url: Observable::new(None),
                refresh: Observable::new(0),
                renderer_ready: Observable::new(false),
            }),
            sync_task: std::sync::Mutex::new(None),
        }
    }

    pub fn surfaces(&self) -> &TabSurfaces {
        &self.surfaces
    }

    pub fn tab_url(&self) -> Option<String> {
        self.surfaces.tab_url.get()
    }

    pub fn show_track(&self, track: &Track) {
        let url = compute_search_url(&self.search_base, track.first_artist_name(), &track.name);
        if self.surfaces.tab_url.set_if_changed(Some(url.clone())) {
            log::info!("[tabs] {}", url);
        }
    }

    pub fn refresh(&self) {
        self.surfaces.refresh.modify(|counter| {
            *counter = counter.wrapping_add(1);
            true
        });
    }

    pub fn set_renderer_ready(&self, ready: bool) {
        self.surfaces.renderer_ready.set_if_changed(ready);
    }

    /// Sub-resource failures are ignored; a failed page load falls back to
    /// the home page.
    pub fn on_load_failed(&self, is_main_frame: bool, description: &str) {
        if !is_main_frame {
            log::debug!("[tabs] sub-resource failed: {}", description);
            return;
        }
        log::warn!("[tabs] page load failed ({}), going home", description);
        self.surfaces.tab_url.set(Some(self.home_url.clone()));
    }

    /// Start mirroring the snapshot's pause state onto `renderer`. Replaces
    /// any previous attachment.
    pub fn attach(
        &self,
        renderer: Arc<dyn TabRenderer>,
        snapshots: watch::Receiver<Option<PlaybackSnapshot>>,
    ) {
        let ready = self.surfaces.renderer_ready.subscribe();
        let handle = tokio::spawn(sync_renderer(renderer, ready, snapshots, self.settle_delay));
        let mut task = self
            .sync_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(old) = task.replace(handle) {
            old.abort();
        }
    }

    pub fn detach(&self) {
        let mut task = self
            .sync_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(old) = task.take() {
            old.abort();
            log::debug!("[tabs] renderer detached");
        }
    }
}

impl Drop for TabSyncCoordinator {
    fn drop(&mut self) {
        self.detach();
    }
}

fn sync_key(
    ready: &mut watch::Receiver<bool>,
    snapshots: &mut watch::Receiver<Option<PlaybackSnapshot>>,
) -> (bool, bool) {
    let ready = *ready.borrow_and_update();
    let paused = snapshots
        .borrow_and_update()
        .as_ref()
        .map_or(true, |s| s.is_paused);
    (ready, paused)
}

async fn next_change(
    ready: &mut watch::Receiver<bool>,
    snapshots: &mut watch::Receiver<Option<PlaybackSnapshot>>,
) -> Result<(), watch::error::RecvError> {
    tokio::select! {
        changed = ready.changed() => changed,
        changed = snapshots.changed() => changed,
    }
}

async fn sync_renderer(
    renderer: Arc<dyn TabRenderer>,
    mut ready: watch::Receiver<bool>,
    mut snapshots: watch::Receiver<Option<PlaybackSnapshot>>,
    settle_delay: Duration,
) {
    let mut target = sync_key(&mut ready, &mut snapshots);
    let mut deadline = Some(Instant::now() + settle_delay);

    loop {
        let changed = match deadline {
            Some(at) => tokio::select! {
                _ = tokio::time::sleep_until(at) => {
                    deadline = None;
                    let (is_ready, paused) = target;
                    if is_ready {
                        renderer.set_playing(!paused).await;
                    }
                    continue;
                }
                changed = next_change(&mut ready, &mut snapshots) => changed,
            },
            None => next_change(&mut ready, &mut snapshots).await,
        };
        if changed.is_err() {
            log::debug!("[tabs] sync source closed");
            return;
        }

        // Progress-only updates keep the key and do not restart the wait.
        let key = sync_key(&mut ready, &mut snapshots);
        if key != target {
            target = key;
            deadline = Some(Instant::now() + settle_delay);
        }
    }
}
