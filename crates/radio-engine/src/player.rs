//! Player: single owner of the canonical `PlaybackInfo`.
//!
//! Every mutation (user command, mpv event, retry, fade step) takes the one
//! async lock, mutates, and publishes a snapshot on a `broadcast` channel
//! before releasing it, so subscribers see changes in the order they
//! happened.  Commands that must be ordered (stop, then load) are sent while
//! the lock is held.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use radio_proto::config::Config;
use radio_proto::favorites::Favorites;
use radio_proto::protocol::{snap_volume, PlaybackInfo, Station, MAX_VOLUME, VOLUME_STEP};
use tokio::sync::{broadcast, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::MpvEvent;
use crate::fade::{self, FadeOutcome, FadeSession, FADE_STEPS};
use crate::ipc::{Control, MpvCommand};
use crate::reducer::{self, Reaction};
use crate::retry::RetrySession;

// ── play tracking ─────────────────────────────────────────────────────────────

/// Told about every switch to a different station, after the player lock
/// is released.
#[async_trait]
pub trait PlayTracker: Send + Sync {
    async fn track(&self, station: &Station);
}

pub struct NoTracking;

#[async_trait]
impl PlayTracker for NoTracking {
    async fn track(&self, _station: &Station) {}
}

#[async_trait]
impl PlayTracker for Favorites {
    async fn track(&self, station: &Station) {
        Favorites::track(self, station).await;
    }
}

// ── settings ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PlayerSettings {
    pub initial_volume: u8,
    pub retry_cap: Duration,
    pub snapshot_capacity: usize,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            initial_volume: 80,
            retry_cap: Duration::from_secs(60),
            snapshot_capacity: 64,
        }
    }
}

impl From<&Config> for PlayerSettings {
    fn from(config: &Config) -> Self {
        Self {
            initial_volume: config.mpv.initial_volume(),
            retry_cap: config.playback.retry_cap(),
            snapshot_capacity: config.playback.snapshot_capacity.max(1),
        }
    }
}

// ── player ────────────────────────────────────────────────────────────────────

struct ActiveFade {
    id: u64,
    token: CancellationToken,
}

struct PlayerState {
    info: PlaybackInfo,
    retry: RetrySession,
    fade: Option<ActiveFade>,
    next_session_id: u64,
}

impl PlayerState {
    fn next_id(&mut self) -> u64 {
        self.next_session_id += 1;
        self.next_session_id
    }
}

struct Shared {
    state: Mutex<PlayerState>,
    control: Arc<dyn Control>,
    tracker: Arc<dyn PlayTracker>,
    snapshots: broadcast::Sender<PlaybackInfo>,
    retry_cap: Duration,
}

/// Cheaply cloneable handle; all clones drive the same state.
#[derive(Clone)]
pub struct Player {
    shared: Arc<Shared>,
}

impl Player {
    pub fn new(
        control: Arc<dyn Control>,
        tracker: Arc<dyn PlayTracker>,
        settings: PlayerSettings,
    ) -> Self {
        let (snapshots, _) = broadcast::channel(settings.snapshot_capacity.max(1));
        let retry = RetrySession::new(0);
        retry.cancel();
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(PlayerState {
                    info: PlaybackInfo::new(settings.initial_volume),
                    retry,
                    fade: None,
                    next_session_id: 0,
                }),
                control,
                tracker,
                snapshots,
                retry_cap: settings.retry_cap,
            }),
        }
    }

    /// Stream of snapshots, one per state change from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackInfo> {
        self.shared.snapshots.subscribe()
    }

    pub async fn snapshot(&self) -> PlaybackInfo {
        self.shared.state.lock().await.info.clone()
    }

    fn publish(&self, info: &PlaybackInfo) {
        // No subscribers is fine.
        let _ = self.shared.snapshots.send(info.clone());
    }

    /// Send and log; callers decide what a failure means for the state.
    async fn command(&self, command: MpvCommand) -> bool {
        match self.shared.control.send(&command).await {
            Ok(()) => true,
            Err(e) => {
                warn!("mpv: {:?} failed: {:#}", command, e);
                false
            }
        }
    }

    // ── station switching ─────────────────────────────────────────────────────

    /// Stop when `station` is the one loaded, otherwise switch to it.
    pub async fn toggle(&self, station: &Station) {
        let mut state = self.shared.state.lock().await;
        if !state.info.url.is_empty() {
            let same = state.info.url == station.url;
            self.stop_locked(&mut state).await;
            if same {
                return;
            }
        }
        let switched = self.load_locked(&mut state, station).await;
        drop(state);
        if switched {
            self.shared.tracker.track(station).await;
        }
    }

    /// Switch to `station`, reloading it if it is already the current one.
    pub async fn play(&self, station: &Station) {
        let mut state = self.shared.state.lock().await;
        let previous = state.info.url.clone();
        if !previous.is_empty() {
            self.stop_locked(&mut state).await;
        }
        let switched = self.load_locked(&mut state, station).await;
        drop(state);
        if switched && previous != station.url {
            self.shared.tracker.track(station).await;
        }
    }

    pub async fn stop(&self) {
        let mut state = self.shared.state.lock().await;
        if state.info.url.is_empty() && state.info.status.is_idle() {
            state.retry.cancel();
            return;
        }
        self.stop_locked(&mut state).await;
    }

    async fn stop_locked(&self, state: &mut MutexGuard<'_, PlayerState>) {
        state.retry.cancel();
        info!("stopping {}", state.info.url);
        // An unreachable mpv is not playing anything either.
        self.command(MpvCommand::Stop).await;
        reducer::mark_stopped(&mut state.info);
        self.publish(&state.info);
    }

    /// Returns true when mpv accepted the load.
    async fn load_locked(&self, state: &mut MutexGuard<'_, PlayerState>, station: &Station) -> bool {
        if station.url.is_empty() {
            if !state.info.url.is_empty() {
                self.stop_locked(state).await;
            }
            return false;
        }

        state.retry.cancel();
        let id = state.next_id();
        state.retry = RetrySession::new(id);

        info!("loading {} ({})", station.url, station.title);
        let loaded = self
            .command(MpvCommand::LoadFile(station.url.clone()))
            .await;
        if loaded {
            reducer::begin_load(&mut state.info, station);
        } else {
            reducer::load_failed(&mut state.info, station);
        }
        self.publish(&state.info);
        loaded
    }

    // ── events & retry ────────────────────────────────────────────────────────

    /// Fold one decoded mpv event into the state.
    pub async fn handle_event(&self, event: MpvEvent) {
        let mut state = self.shared.state.lock().await;
        match reducer::apply_event(&mut state.info, &event) {
            Reaction::Unchanged => {}
            Reaction::Publish => self.publish(&state.info),
            Reaction::PublishAndRetry => {
                warn!("mpv: {} on {}", state.info.status, state.info.url);
                self.publish(&state.info);
                self.schedule_retry_locked(&mut state);
            }
        }
    }

    fn schedule_retry_locked(&self, state: &mut MutexGuard<'_, PlayerState>) {
        let Some(delay) = state.retry.schedule(self.shared.retry_cap) else {
            debug!("retry: already pending or session over");
            return;
        };
        let session = state.retry.id();
        let token = state.retry.token();
        let url = state.info.url.clone();
        info!(
            "retry: reloading {} in {}s (attempt {})",
            url,
            delay.as_secs(),
            state.retry.attempts() + 1
        );
        let player = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("retry: session {} cancelled", session);
                }
                _ = tokio::time::sleep(delay) => {
                    player.retry_now(session, url).await;
                }
            }
        });
    }

    async fn retry_now(&self, session: u64, url: String) {
        let mut state = self.shared.state.lock().await;
        if state.retry.id() != session || state.retry.is_cancelled() || state.info.url != url {
            debug!("retry: session {} abandoned", session);
            return;
        }
        state.retry.complete();
        reducer::mark_retrying(&mut state.info);
        self.publish(&state.info);
        if !self.command(MpvCommand::LoadFile(url)).await {
            // No end-file will arrive for a load that never reached mpv.
            state.info.status = reducer::unreachable_status();
            self.publish(&state.info);
            self.schedule_retry_locked(&mut state);
        }
    }

    /// Reloads issued so far for the current stream.
    pub async fn retry_attempts(&self) -> u32 {
        self.shared.state.lock().await.retry.attempts()
    }

    // ── volume ────────────────────────────────────────────────────────────────

    pub async fn volume_up(&self) {
        self.step_volume(VOLUME_STEP as i32).await;
    }

    pub async fn volume_dn(&self) {
        self.step_volume(-(VOLUME_STEP as i32)).await;
    }

    async fn step_volume(&self, delta: i32) {
        let mut state = self.shared.state.lock().await;
        let current = state.info.volume;
        let target = snap_volume(current as i32 + delta);
        if target == current {
            // Already at the edge.
            return;
        }
        debug!("setting volume {}", target);
        self.apply_volume_locked(&mut state, target).await;
    }

    /// Set an absolute volume (snapped to the grid).  Returns false when mpv
    /// did not accept it, in which case the published volume is unchanged.
    pub async fn set_volume(&self, volume: u8) -> bool {
        let mut state = self.shared.state.lock().await;
        self.apply_volume_locked(&mut state, volume.min(MAX_VOLUME)).await
    }

    async fn apply_volume_locked(&self, state: &mut MutexGuard<'_, PlayerState>, volume: u8) -> bool {
        let volume = snap_volume(volume as i32);
        if !self.command(MpvCommand::SetVolume(volume)).await {
            return false;
        }
        state.info.volume = volume;
        self.publish(&state.info);
        true
    }

    // ── fades ─────────────────────────────────────────────────────────────────

    /// Start a fade episode scoped under `parent`.  Any fade still running is
    /// cancelled first; its owner restores its own saved volume.
    pub async fn begin_fade(&self, parent: &CancellationToken) -> FadeSession {
        let mut state = self.shared.state.lock().await;
        if let Some(prev) = state.fade.take() {
            debug!("fade: cancelling fade {}", prev.id);
            prev.token.cancel();
        }
        let id = state.next_id();
        let token = parent.child_token();
        state.fade = Some(ActiveFade {
            id,
            token: token.clone(),
        });
        FadeSession::new(id, token, state.info.volume)
    }

    /// Ramp from the current volume down to 0.
    pub async fn fade_out(&self, fade: &FadeSession, duration: Duration) -> FadeOutcome {
        self.ramp_to(fade, 0, duration).await
    }

    /// Ramp from the current volume back up to the saved one.
    pub async fn fade_in(&self, fade: &FadeSession, duration: Duration) -> FadeOutcome {
        self.ramp_to(fade, fade.saved_volume(), duration).await
    }

    async fn ramp_to(&self, fade: &FadeSession, target: u8, duration: Duration) -> FadeOutcome {
        let from = self.snapshot().await.volume;
        let step = duration / FADE_STEPS;
        debug!("fade {}: {} → {} over {:?}", fade.id(), from, target, duration);

        for level in fade::ramp(from, target, FADE_STEPS) {
            tokio::select! {
                biased;
                _ = fade.token().cancelled() => return FadeOutcome::Cancelled,
                _ = tokio::time::sleep(step) => {}
            }
            let mut state = self.shared.state.lock().await;
            if fade.is_cancelled() {
                return FadeOutcome::Cancelled;
            }
            if state.info.volume != level {
                self.apply_volume_locked(&mut state, level).await;
            }
        }
        FadeOutcome::Completed
    }

    /// Put the pre-fade volume back after an interrupted episode.
    pub async fn restore_volume(&self, fade: &FadeSession) {
        let mut state = self.shared.state.lock().await;
        if state.info.volume != fade.saved_volume() {
            info!("fade {}: restoring volume {}", fade.id(), fade.saved_volume());
            self.apply_volume_locked(&mut state, fade.saved_volume()).await;
        }
        Self::release_fade_locked(&mut state, fade);
    }

    /// Close a finished episode.
    pub async fn end_fade(&self, fade: &FadeSession) {
        let mut state = self.shared.state.lock().await;
        Self::release_fade_locked(&mut state, fade);
    }

    fn release_fade_locked(state: &mut MutexGuard<'_, PlayerState>, fade: &FadeSession) {
        if state.fade.as_ref().map(|f| f.id) == Some(fade.id()) {
            state.fade = None;
        }
        fade.cancel();
    }

    /// Cancel the in-flight fade, if any.
    pub async fn cancel_fade(&self) {
        if let Some(prev) = self.shared.state.lock().await.fade.take() {
            prev.token.cancel();
        }
    }

    /// Cancel every background activity before shutdown.
    pub async fn shutdown(&self) {
        let mut state = self.shared.state.lock().await;
        state.retry.cancel();
        if let Some(prev) = state.fade.take() {
            prev.token.cancel();
        }
    }
}
