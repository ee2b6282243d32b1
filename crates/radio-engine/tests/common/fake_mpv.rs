#![allow(dead_code)]

use async_trait::async_trait;
use radio_engine::events::{EndReason, MpvEvent};
use radio_engine::ipc::{Control, MpvCommand};
use radio_engine::{
    Engine, NoTracking, PlaybackStatus, Player, PlayerSettings, ShuffleSettings, Station,
    StationView,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// In-memory control channel that records every accepted command with the
/// (tokio) time it was sent.
#[derive(Default)]
pub struct Recorder {
    log: Mutex<Vec<(Instant, MpvCommand)>>,
    offline: AtomicBool,
}

impl Recorder {
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn commands(&self) -> Vec<MpvCommand> {
        self.log.lock().unwrap().iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn loads(&self) -> Vec<(Instant, String)> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(at, c)| match c {
                MpvCommand::LoadFile(url) => Some((*at, url.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn volumes(&self) -> Vec<u8> {
        self.commands()
            .into_iter()
            .filter_map(|c| match c {
                MpvCommand::SetVolume(v) => Some(v),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Control for Recorder {
    async fn send(&self, command: &MpvCommand) -> anyhow::Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            anyhow::bail!("connection refused");
        }
        self.log
            .lock()
            .unwrap()
            .push((Instant::now(), command.clone()));
        Ok(())
    }
}

pub fn catalog() -> Vec<Station> {
    vec![
        Station::new("Alpha FM", "http://alpha.example/stream"),
        Station::new("Beta Radio", "http://beta.example/stream"),
        Station::new("Gamma", "http://gamma.example/live"),
        Station::new("Delta", "http://delta.example/live"),
    ]
}

pub fn engine(stations: Vec<Station>) -> (Engine, Arc<Recorder>) {
    let control = Arc::new(Recorder::default());
    let view: Arc<dyn StationView> = Arc::new(stations);
    let engine = Engine::new(
        control.clone(),
        view,
        Arc::new(NoTracking),
        PlayerSettings::default(),
        ShuffleSettings::default(),
    );
    (engine, control)
}

/// Behaves like a healthy stream: every load starts playing right away.
pub fn auto_start(player: Player) -> JoinHandle<()> {
    let mut rx = player.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(info) if info.status == PlaybackStatus::Buffering => {
                    player.handle_event(MpvEvent::PlaybackRestart).await;
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Behaves like a dead stream: every load ends with an error.
pub async fn fail_stream(player: &Player) {
    player.handle_event(MpvEvent::EndFile(EndReason::Error)).await;
}

/// Poll `cond` on the (paused) clock until it holds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(600);
    while !cond() {
        assert!(Instant::now() < deadline, "condition never became true");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
