//! Timed shuffle: every interval fade out, switch to a random station from
//! the current view, wait for it to start, fade back in.
//!
//! Each activation owns a `CancellationToken` scope.  Fades run under child
//! tokens of that scope, so turning shuffle off (or re-arming it with a new
//! interval) interrupts any in-flight fade and the interrupted loop restores
//! the saved volume on its way out.
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use radio_proto::config::ShuffleConfig;
use radio_proto::protocol::{PlaybackInfo, PlaybackStatus, Station};
use rand::seq::SliceRandom;
use rand::Rng;
use tokio::sync::{broadcast, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::fade::FadeOutcome;
use crate::player::Player;

pub const MIN_INTERVAL_MINUTES: u8 = 1;
pub const MAX_INTERVAL_MINUTES: u8 = 9;

// ── station view ──────────────────────────────────────────────────────────────

/// The list random picks are drawn from; read fresh on every pick.
pub trait StationView: Send + Sync {
    fn stations(&self) -> Vec<Station>;
}

impl StationView for Vec<Station> {
    fn stations(&self) -> Vec<Station> {
        self.clone()
    }
}

impl StationView for RwLock<Vec<Station>> {
    fn stations(&self) -> Vec<Station> {
        match self.read() {
            Ok(list) => list.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Uniform pick that avoids `current_url` whenever another station exists.
pub fn pick_random<R: Rng + ?Sized>(
    stations: &[Station],
    current_url: &str,
    rng: &mut R,
) -> Option<Station> {
    let others: Vec<&Station> = stations.iter().filter(|s| s.url != current_url).collect();
    if others.is_empty() {
        return stations.choose(rng).cloned();
    }
    others.choose(rng).map(|s| (*s).clone())
}

// ── settings & status ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ShuffleSettings {
    pub interval: Duration,
    pub fade: Duration,
    /// How long to wait for the new station before fading in anyway.
    pub confirm_timeout: Duration,
}

impl Default for ShuffleSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5 * 60),
            fade: Duration::from_secs(2),
            confirm_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&ShuffleConfig> for ShuffleSettings {
    fn from(config: &ShuffleConfig) -> Self {
        Self {
            interval: config.interval(),
            fade: config.fade_duration(),
            confirm_timeout: config.confirm_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShuffleStatus {
    pub active: bool,
    pub interval: Duration,
    /// Time until the next switch; zero while inactive.
    pub remaining: Duration,
}

impl ShuffleStatus {
    /// "mm:ss" countdown.
    pub fn countdown(&self) -> String {
        let secs = self.remaining.as_secs();
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }
}

// ── confirmation ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    TimedOut,
    Cancelled,
}

/// Wait until a snapshot shows `url` playing (or carrying a song title).
pub async fn wait_for_playback(
    rx: &mut broadcast::Receiver<PlaybackInfo>,
    url: &str,
    cancel: &CancellationToken,
    timeout: Duration,
) -> Confirmation {
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Confirmation::Cancelled,
            _ = &mut deadline => return Confirmation::TimedOut,
            msg = rx.recv() => match msg {
                Ok(info) => {
                    if info.url == url
                        && (info.status == PlaybackStatus::Playing || !info.song.is_empty())
                    {
                        return Confirmation::Confirmed;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!("shuffle: skipped {} snapshots", n);
                }
                Err(broadcast::error::RecvError::Closed) => return Confirmation::TimedOut,
            }
        }
    }
}

// ── scheduler ─────────────────────────────────────────────────────────────────

struct ActiveShuffle {
    id: u64,
    scope: CancellationToken,
    iteration_started: Instant,
}

struct ShuffleState {
    interval: Duration,
    active: Option<ActiveShuffle>,
    next_id: u64,
}

struct Shared {
    player: Player,
    view: Arc<dyn StationView>,
    settings: ShuffleSettings,
    state: Mutex<ShuffleState>,
    status_tx: watch::Sender<ShuffleStatus>,
}

#[derive(Clone)]
pub struct Shuffler {
    shared: Arc<Shared>,
}

impl Shuffler {
    pub fn new(player: Player, view: Arc<dyn StationView>, settings: ShuffleSettings) -> Self {
        let interval = settings.interval;
        let (status_tx, _) = watch::channel(ShuffleStatus {
            active: false,
            interval,
            remaining: Duration::ZERO,
        });
        Self {
            shared: Arc::new(Shared {
                player,
                view,
                settings,
                state: Mutex::new(ShuffleState {
                    interval,
                    active: None,
                    next_id: 0,
                }),
                status_tx,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ShuffleState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn watch(&self) -> watch::Receiver<ShuffleStatus> {
        self.shared.status_tx.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.lock().active.is_some()
    }

    pub fn status(&self) -> ShuffleStatus {
        let state = self.lock();
        match &state.active {
            Some(active) => ShuffleStatus {
                active: true,
                interval: state.interval,
                remaining: state
                    .interval
                    .saturating_sub(active.iteration_started.elapsed()),
            },
            None => ShuffleStatus {
                active: false,
                interval: state.interval,
                remaining: Duration::ZERO,
            },
        }
    }

    fn publish_status(&self) {
        let status = self.status();
        self.shared.status_tx.send_replace(status);
    }

    /// Random station from the current view, avoiding `current_url`.
    pub fn pick(&self, current_url: &str) -> Option<Station> {
        let stations = self.shared.view.stations();
        pick_random(&stations, current_url, &mut rand::thread_rng())
    }

    /// Flip shuffle; returns the new state.
    pub async fn toggle(&self) -> bool {
        if self.turn_off() {
            return false;
        }
        self.turn_on().await;
        true
    }

    /// Returns whether shuffle was on.
    pub fn turn_off(&self) -> bool {
        let Some(active) = self.lock().active.take() else {
            return false;
        };
        active.scope.cancel();
        info!("shuffle: off");
        self.publish_status();
        true
    }

    async fn turn_on(&self) {
        let (id, scope, interval) = self.arm();
        info!("shuffle: on, every {}s", interval.as_secs());
        self.publish_status();

        let current = self.shared.player.snapshot().await.url;
        match self.pick(&current) {
            Some(station) if !scope.is_cancelled() => self.shared.player.play(&station).await,
            Some(_) => {}
            None => warn!("shuffle: no stations in view"),
        }
        self.spawn(id, scope, interval);
    }

    /// Replace any active scope with a fresh one and restart the countdown.
    fn arm(&self) -> (u64, CancellationToken, Duration) {
        let mut state = self.lock();
        if let Some(previous) = state.active.take() {
            previous.scope.cancel();
        }
        state.next_id += 1;
        let id = state.next_id;
        let scope = CancellationToken::new();
        state.active = Some(ActiveShuffle {
            id,
            scope: scope.clone(),
            iteration_started: Instant::now(),
        });
        (id, scope, state.interval)
    }

    /// Change the interval (1-9 minutes).  An active shuffle restarts its
    /// countdown with the new interval and stays on.
    pub fn set_interval(&self, minutes: u8) -> Result<(), EngineError> {
        if !(MIN_INTERVAL_MINUTES..=MAX_INTERVAL_MINUTES).contains(&minutes) {
            return Err(EngineError::InvalidInterval(minutes));
        }
        let active = {
            let mut state = self.lock();
            state.interval = Duration::from_secs(u64::from(minutes) * 60);
            state.active.is_some()
        };
        info!("shuffle: interval {} min", minutes);
        if active {
            let (id, scope, interval) = self.arm();
            self.spawn(id, scope, interval);
        }
        self.publish_status();
        Ok(())
    }

    fn spawn(&self, id: u64, scope: CancellationToken, interval: Duration) {
        let this = self.clone();
        let countdown_scope = scope.clone();
        tokio::spawn(async move { this.schedule_loop(id, scope, interval).await });
        let this = self.clone();
        tokio::spawn(async move { this.countdown_loop(countdown_scope).await });
    }

    async fn countdown_loop(self, scope: CancellationToken) {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                biased;
                _ = scope.cancelled() => break,
                _ = ticker.tick() => self.publish_status(),
            }
        }
    }

    async fn schedule_loop(self, id: u64, scope: CancellationToken, interval: Duration) {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = scope.cancelled() => break,
                _ = ticker.tick() => {}
            }
            debug!("shuffle {}: interval elapsed", id);
            if self.shuffle_once(&scope).await.is_cancelled() {
                if !scope.is_cancelled() {
                    // A fade from elsewhere took over.
                    info!("shuffle {}: interrupted, turning off", id);
                    self.deactivate(id);
                }
                break;
            }
            self.iteration_done(id);
            ticker.reset();
        }
        debug!("shuffle {}: loop ended", id);
    }

    async fn shuffle_once(&self, scope: &CancellationToken) -> FadeOutcome {
        let player = &self.shared.player;
        let settings = &self.shared.settings;

        let fade = player.begin_fade(scope).await;
        if player.fade_out(&fade, settings.fade).await.is_cancelled() {
            player.restore_volume(&fade).await;
            return FadeOutcome::Cancelled;
        }

        let current = player.snapshot().await.url;
        match self.pick(&current) {
            Some(station) => {
                let mut rx = player.subscribe();
                info!("shuffle: switching to {}", station.title);
                player.play(&station).await;
                match wait_for_playback(&mut rx, &station.url, fade.token(), settings.confirm_timeout)
                    .await
                {
                    Confirmation::Confirmed => debug!("shuffle: {} started", station.url),
                    Confirmation::TimedOut => {
                        warn!("shuffle: {} did not start in time", station.url)
                    }
                    Confirmation::Cancelled => {
                        player.restore_volume(&fade).await;
                        return FadeOutcome::Cancelled;
                    }
                }
            }
            None => warn!("shuffle: no stations in view"),
        }

        if player.fade_in(&fade, settings.fade).await.is_cancelled() {
            player.restore_volume(&fade).await;
            return FadeOutcome::Cancelled;
        }
        player.end_fade(&fade).await;
        FadeOutcome::Completed
    }

    fn iteration_done(&self, id: u64) {
        {
            let mut state = self.lock();
            match state.active.as_mut() {
                Some(active) if active.id == id => active.iteration_started = Instant::now(),
                _ => return,
            }
        }
        self.publish_status();
    }

    fn deactivate(&self, id: u64) {
        let taken = {
            let mut state = self.lock();
            if state.active.as_ref().map(|a| a.id) == Some(id) {
                state.active.take()
            } else {
                None
            }
        };
        if let Some(active) = taken {
            active.scope.cancel();
            self.publish_status();
        }
    }
}
