use crate::api::models::{Device, RepeatState};
use crate::api::player::RemotePlayer;
use crate::error::{AppError, AppResult};
use crate::observable::Observable;
use crate::playback::intent::{plan_play, LocalIntent};
use crate::playback::reconcile::Reconciler;
use crate::playback::snapshot::PlaybackSnapshot;
use crate::session::SessionStore;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Idle,
    Polling,
}

/// Everything the playback side publishes to the UI.
#[derive(Debug)]
pub struct PlaybackSurfaces {
    pub snapshot: Observable<Option<PlaybackSnapshot>>,
    pub devices: Observable<Vec<Device>>,
    pub selected_device: Observable<Option<String>>,
    pub loop_state: Observable<LoopState>,
    pub repeat_track: Observable<bool>,
    pub shuffle: Observable<bool>,
}

impl Default for PlaybackSurfaces {
    fn default() -> Self {
        Self {
            snapshot: Observable::new(None),
            devices: Observable::new(Vec::new()),
            selected_device: Observable::new(None),
            loop_state: Observable::new(LoopState::Idle),
            repeat_track: Observable::new(false),
            shuffle: Observable::new(false),
        }
    }
}

struct Shared<P> {
    player: Arc<P>,
    session: SessionStore,
    surfaces: PlaybackSurfaces,
    reconciler: Mutex<Reconciler>,
    // Held for the whole of a status poll: at most one in flight.
    poll_gate: Mutex<()>,
    // Bumped whenever a loop is started or stopped; a loop whose number no
    // longer matches is stale and must not publish.
    generation: AtomicU64,
    poll_interval: Duration,
}

impl<P: RemotePlayer> Shared<P> {
    fn is_current(&self, generation: Option<u64>) -> bool {
        generation.map_or(true, |g| self.generation.load(Ordering::SeqCst) == g)
    }

    async fn tick(&self, generation: Option<u64>) {
        let _gate = self.poll_gate.lock().await;
        if !self.is_current(generation) {
            return;
        }
        if self.surfaces.selected_device.get().is_none() {
            log::debug!("[poll] no device selected, skipping");
            return;
        }
        if self.session.access_token().is_none() {
            log::debug!("[poll] no session token, skipping");
            return;
        }

        let status = match self.player.playback_status().await {
            Ok(Some(status)) => status,
            Ok(None) => {
                log::debug!("[poll] nothing playing");
                return;
            }
            Err(e) => {
                log::warn!("[poll] status failed ({}): {}", e.kind(), e);
                return;
            }
        };

        let mut reconciler = self.reconciler.lock().await;
        let mut observation = None;
        // Checked under the snapshot's write lock, the same lock `retire_loops`
        // bumps the generation under.
        self.surfaces.snapshot.modify(|published| {
            if !self.is_current(generation) {
                return false;
            }
            let seen = reconciler.observe(&status);
            let changed = match &seen.snapshot {
                Some(snapshot) => {
                    log::debug!(
                        "[poll] {} @ {}ms paused={}",
                        snapshot.track_uri.as_deref().unwrap_or("-"),
                        snapshot.progress_ms,
                        snapshot.is_paused
                    );
                    *published = Some(snapshot.clone());
                    true
                }
                None => false,
            };
            observation = Some(seen);
            changed
        });
        let Some(observation) = observation else {
            log::debug!("[poll] dropping result from a stopped loop");
            return;
        };
        self.surfaces
            .repeat_track
            .set_if_changed(observation.repeat_track);
        self.surfaces.shuffle.set_if_changed(observation.shuffle);
    }

    /// Invalidate every running loop and return the new generation.
    fn retire_loops(&self) -> u64 {
        let mut next = 0;
        self.surfaces.snapshot.modify(|_| {
            next = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            false
        });
        next
    }

    async fn publish_local(&self, edit: impl FnOnce(&mut PlaybackSnapshot)) {
        let mut reconciler = self.reconciler.lock().await;
        let Some(mut snapshot) = reconciler.published().cloned() else {
            return;
        };
        edit(&mut snapshot);
        if let Some(snapshot) = reconciler.accept(snapshot) {
            self.surfaces.snapshot.set(Some(snapshot));
        }
    }

    /// Undo an optimistic intent change after a failed command and ask the
    /// service for the real state right away.
    async fn correct(
        &self,
        op: &str,
        previous: LocalIntent,
        published_before: Option<PlaybackSnapshot>,
        error: &AppError,
    ) {
        log::warn!("[{}] failed ({}): {}, reverting", op, error.kind(), error);
        self.reconciler
            .lock()
            .await
            .revert(previous, published_before.as_ref());
        self.tick(None).await;
    }
}

/// Remote player commands plus ownership of the status poll loop.
///
/// The loop is `Idle` until a device is selected. Selecting a device (again)
/// always replaces the running loop. Each tick waits `poll_interval` after the
/// previous one finished, so the cadence stretches under latency.
pub struct PlaybackController<P: RemotePlayer + 'static> {
    shared: Arc<Shared<P>>,
    poll_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl<P: RemotePlayer + 'static> PlaybackController<P> {
    pub fn new(player: Arc<P>, session: SessionStore, poll_interval: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                player,
                session,
                surfaces: PlaybackSurfaces::default(),
                reconciler: Mutex::new(Reconciler::new()),
                poll_gate: Mutex::new(()),
                generation: AtomicU64::new(0),
                poll_interval,
            }),
            poll_task: std::sync::Mutex::new(None),
        }
    }

    pub fn surfaces(&self) -> &PlaybackSurfaces {
        &self.shared.surfaces
    }

    pub fn snapshot(&self) -> Option<PlaybackSnapshot> {
        self.shared.surfaces.snapshot.get()
    }

    pub async fn intent(&self) -> LocalIntent {
        self.shared.reconciler.lock().await.intent().clone()
    }

    fn ready(&self) -> AppResult<String> {
        if self.shared.session.access_token().is_none() {
            return Err(AppError::NotReady("no session token"));
        }
        self.shared
            .surfaces
            .selected_device
            .get()
            .ok_or(AppError::NotReady("no device selected"))
    }

    /// Fetch the device list and replace the published one. Failures publish
    /// and return an empty list.
    pub async fn list_devices(&self) -> Vec<Device> {
        if self.shared.session.access_token().is_none() {
            log::debug!("[devices] no session token");
            return Vec::new();
        }
        let devices = match self.shared.player.devices().await {
            Ok(devices) => devices,
            Err(e) => {
                log::warn!("[devices] failed ({}): {}", e.kind(), e);
                Vec::new()
            }
        };
        log::info!("[devices] {} available", devices.len());
        self.shared.surfaces.devices.set(devices.clone());
        devices
    }

    pub fn select_device(&self, device_id: &str) {
        log::info!("[device] selected {}", device_id);
        self.shared
            .surfaces
            .selected_device
            .set(Some(device_id.to_string()));
        self.start_polling();
    }

    pub fn deselect_device(&self) {
        log::info!("[device] deselected");
        self.shared.surfaces.selected_device.set(None);
        self.stop_polling();
    }

    /// Replace any running loop with a fresh one.
    pub fn start_polling(&self) {
        let mut task = self
            .poll_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(old) = task.take() {
            old.abort();
        }
        let generation = self.shared.retire_loops();
        let shared = Arc::clone(&self.shared);
        *task = Some(tokio::spawn(async move {
            log::info!("[poll] loop {} started", generation);
            while shared.is_current(Some(generation)) {
                shared.tick(Some(generation)).await;
                tokio::time::sleep(shared.poll_interval).await;
            }
            log::debug!("[poll] loop {} finished", generation);
        }));
        self.shared.surfaces.loop_state.set_if_changed(LoopState::Polling);
    }

    pub fn stop_polling(&self) {
        let mut task = self
            .poll_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.shared.retire_loops();
        if let Some(old) = task.take() {
            old.abort();
            log::info!("[poll] loop stopped");
        }
        self.shared.surfaces.loop_state.set_if_changed(LoopState::Idle);
    }

    /// Out-of-band status poll. Waits for any in-flight poll first.
    pub async fn poll_now(&self) {
        self.shared.tick(None).await;
    }

    /// Play `context_uri`, starting at `track_uri` when given. The same track
    /// while paused resumes; anything else starts from 0.
    pub async fn play(
        &self,
        context_uri: &str,
        track_uri: Option<&str>,
        resume_position_ms: Option<u64>,
    ) -> AppResult<()> {
        let device_id = self.ready()?;

        let (request, previous, published_before) = {
            let mut reconciler = self.shared.reconciler.lock().await;
            let previous = reconciler.intent().clone();
            let published_before = reconciler.published().cloned();
            let request = plan_play(&previous, context_uri, track_uri, resume_position_ms);
            let intent = reconciler.intent_mut();
            intent.is_paused_locally = false;
            if let Some(uri) = track_uri {
                intent.last_track_uri = Some(uri.to_string());
                intent.last_position_ms = request.position_ms.unwrap_or(0);
            }
            (request, previous, published_before)
        };

        log::info!(
            "[play] {} offset={:?} position={:?}",
            request.context_uri,
            request.offset.as_ref().map(|o| o.uri.as_str()),
            request.position_ms
        );

        if let Err(e) = self.shared.player.play(&device_id, &request).await {
            self.shared
                .correct("play", previous, published_before, &e)
                .await;
            return Err(e);
        }

        if let Some(uri) = track_uri {
            let position = request.position_ms.unwrap_or(0);
            let mut reconciler = self.shared.reconciler.lock().await;
            let optimistic = PlaybackSnapshot {
                track_uri: Some(uri.to_string()),
                progress_ms: position,
                is_paused: false,
            };
            if let Some(snapshot) = reconciler.accept(optimistic) {
                self.shared.surfaces.snapshot.set(Some(snapshot));
            }
        }
        Ok(())
    }

    pub async fn pause(&self) -> AppResult<()> {
        let device_id = self.ready()?;

        let (previous, published_before) = {
            let mut reconciler = self.shared.reconciler.lock().await;
            let previous = reconciler.intent().clone();
            reconciler.intent_mut().is_paused_locally = true;
            (previous, reconciler.published().cloned())
        };

        log::info!("[pause] at {}ms", previous.last_position_ms);
        if let Err(e) = self.shared.player.pause(&device_id).await {
            self.shared
                .correct("pause", previous, published_before, &e)
                .await;
            return Err(e);
        }

        self.shared
            .publish_local(|snapshot| snapshot.is_paused = true)
            .await;
        Ok(())
    }

    /// The next scheduled poll picks up the new track.
    pub async fn skip_next(&self) -> AppResult<()> {
        let device_id = self.ready()?;
        log::info!("[skip] next");
        self.shared
            .player
            .skip_next(&device_id)
            .await
            .inspect_err(|e| log::warn!("[skip] next failed ({}): {}", e.kind(), e))
    }

    pub async fn skip_previous(&self) -> AppResult<()> {
        let device_id = self.ready()?;
        log::info!("[skip] previous");
        self.shared
            .player
            .skip_previous(&device_id)
            .await
            .inspect_err(|e| log::warn!("[skip] previous failed ({}): {}", e.kind(), e))
    }

    /// Seek, then pause. A failed seek leaves playback untouched.
    pub async fn seek_and_pause(&self, position_ms: u64) -> AppResult<()> {
        let device_id = self.ready()?;
        if let Err(e) = self.shared.player.seek(&device_id, position_ms).await {
            log::warn!("[seek] failed ({}): {}, not pausing", e.kind(), e);
            return Err(e);
        }

        self.shared.reconciler.lock().await.intent_mut().last_position_ms = position_ms;
        self.shared
            .publish_local(|snapshot| snapshot.progress_ms = position_ms)
            .await;
        self.pause().await
    }

    pub async fn restart(&self) -> AppResult<()> {
        self.seek_and_pause(0).await
    }

    pub async fn set_repeat(&self, track_scoped: bool) -> AppResult<()> {
        let device_id = self.ready()?;
        let state = if track_scoped {
            RepeatState::Track
        } else {
            RepeatState::Off
        };
        self.shared
            .player
            .set_repeat(&device_id, state)
            .await
            .inspect_err(|e| log::warn!("[repeat] failed ({}): {}", e.kind(), e))?;
        log::info!("[repeat] {}", state.as_str());
        self.shared.surfaces.repeat_track.set_if_changed(track_scoped);
        Ok(())
    }

    pub async fn toggle_repeat(&self) -> AppResult<()> {
        let current = self.shared.surfaces.repeat_track.get();
        self.set_repeat(!current).await
    }

    pub async fn set_shuffle(&self, enabled: bool) -> AppResult<()> {
        let device_id = self.ready()?;
        self.shared
            .player
            .set_shuffle(&device_id, enabled)
            .await
            .inspect_err(|e| log::warn!("[shuffle] failed ({}): {}", e.kind(), e))?;
        log::info!("[shuffle] {}", enabled);
        self.shared.surfaces.shuffle.set_if_changed(enabled);
        Ok(())
    }

    pub async fn toggle_shuffle(&self) -> AppResult<()> {
        let current = self.shared.surfaces.shuffle.get();
        self.set_shuffle(!current).await
    }
}

impl<P: RemotePlayer + 'static> Drop for PlaybackController<P> {
    fn drop(&mut self) {
        self.shared.retire_loops();
        if let Ok(mut task) = self.poll_task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
    }
}
