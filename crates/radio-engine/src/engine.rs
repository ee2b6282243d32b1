//! Consumer-facing facade: owns the mpv process, the player and the shuffle
//! scheduler, and exposes the commands a front end binds keys to.
use std::sync::Arc;

use radio_proto::config::Config;
use radio_proto::protocol::{PlaybackInfo, Station};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::EngineError;
use crate::ipc::{Control, Endpoint, IpcControl};
use crate::player::{PlayTracker, Player, PlayerSettings};
use crate::reader;
use crate::shuffle::{ShuffleSettings, ShuffleStatus, Shuffler, StationView};
use crate::supervisor::{LaunchOptions, Supervisor};

pub struct Engine {
    player: Player,
    shuffler: Shuffler,
    control: Arc<dyn Control>,
    supervisor: Option<Supervisor>,
    reader: Option<JoinHandle<()>>,
}

impl Engine {
    /// Engine over an arbitrary control channel, with no process to manage.
    pub fn new(
        control: Arc<dyn Control>,
        view: Arc<dyn StationView>,
        tracker: Arc<dyn PlayTracker>,
        player_settings: PlayerSettings,
        shuffle_settings: ShuffleSettings,
    ) -> Self {
        let player = Player::new(control.clone(), tracker, player_settings);
        let shuffler = Shuffler::new(player.clone(), view, shuffle_settings);
        Self {
            player,
            shuffler,
            control,
            supervisor: None,
            reader: None,
        }
    }

    /// Spawn mpv, wait for it to listen and attach the event reader.
    pub async fn launch(
        config: &Config,
        view: Arc<dyn StationView>,
        tracker: Arc<dyn PlayTracker>,
    ) -> Result<Self, EngineError> {
        let endpoint = Endpoint::for_this_process();
        let supervisor = Supervisor::start(&LaunchOptions::from(&config.mpv), endpoint).await?;
        let control: Arc<dyn Control> = Arc::new(IpcControl::new(supervisor.endpoint().clone()));

        let mut engine = Self::new(
            control,
            view,
            tracker,
            PlayerSettings::from(config),
            ShuffleSettings::from(&config.shuffle),
        );
        engine.reader = Some(reader::spawn(
            supervisor.endpoint().clone(),
            engine.player.clone(),
        ));
        engine.supervisor = Some(supervisor);
        Ok(engine)
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn shuffler(&self) -> &Shuffler {
        &self.shuffler
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackInfo> {
        self.player.subscribe()
    }

    pub fn shuffle_status(&self) -> watch::Receiver<ShuffleStatus> {
        self.shuffler.watch()
    }

    pub async fn snapshot(&self) -> PlaybackInfo {
        self.player.snapshot().await
    }

    // ── commands ──────────────────────────────────────────────────────────────

    /// Manual selection; turns shuffle off first.
    pub async fn toggle(&self, station: &Station) {
        self.shuffler.turn_off();
        self.player.toggle(station).await;
    }

    pub async fn play(&self, station: &Station) {
        self.shuffler.turn_off();
        self.player.play(station).await;
    }

    pub async fn stop(&self) {
        self.shuffler.turn_off();
        self.player.stop().await;
    }

    /// Play a random station from the current view other than the current one.
    pub async fn random(&self) -> Option<Station> {
        self.shuffler.turn_off();
        let current = self.player.snapshot().await.url;
        let station = self.shuffler.pick(&current)?;
        self.player.play(&station).await;
        Some(station)
    }

    pub async fn volume_up(&self) {
        self.player.volume_up().await;
    }

    pub async fn volume_dn(&self) {
        self.player.volume_dn().await;
    }

    /// Returns whether shuffle is now on.
    pub async fn toggle_shuffle(&self) -> bool {
        self.shuffler.toggle().await
    }

    pub fn set_shuffle_interval(&self, minutes: u8) -> Result<(), EngineError> {
        self.shuffler.set_interval(minutes)
    }

    /// Stop everything and shut mpv down.
    pub async fn quit(mut self) {
        info!("engine: shutting down");
        self.shuffler.turn_off();
        self.player.shutdown().await;
        if let Some(mut supervisor) = self.supervisor.take() {
            supervisor.quit(self.control.as_ref()).await;
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}
