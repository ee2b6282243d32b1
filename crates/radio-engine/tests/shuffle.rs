mod common;

use common::fake_mpv::{auto_start, catalog, engine};
use radio_engine::ipc::MpvCommand;
use radio_engine::{EngineError, PlaybackStatus, Station};
use std::time::Duration;
use tokio::time::sleep;

const INTERVAL: Duration = Duration::from_secs(5 * 60);

#[tokio::test(start_paused = true)]
async fn shuffle_switches_station_with_fade_out_and_in() {
    let (engine, control) = engine(catalog());
    let _mpv = auto_start(engine.player().clone());

    assert!(engine.toggle_shuffle().await);
    let first = engine.snapshot().await.url;
    assert!(!first.is_empty());
    sleep(Duration::from_secs(1)).await;
    assert_eq!(engine.snapshot().await.status, PlaybackStatus::Playing);
    assert!(control.volumes().is_empty());

    sleep(INTERVAL + Duration::from_secs(10)).await;

    let info = engine.snapshot().await;
    assert_ne!(info.url, first);
    assert_eq!(info.status, PlaybackStatus::Playing);
    assert_eq!(info.volume, 80);
    assert!(engine.shuffler().is_active());

    let volumes = control.volumes();
    let bottom = volumes
        .iter()
        .position(|v| *v == 0)
        .expect("faded all the way out");
    assert!(volumes[..bottom].windows(2).all(|w| w[0] >= w[1]));
    assert!(volumes[bottom..].windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(volumes.last(), Some(&80));

    // The switch itself happened while silent.
    let commands = control.commands();
    let silent = commands
        .iter()
        .position(|c| *c == MpvCommand::SetVolume(0))
        .expect("silence");
    let reload = commands
        .iter()
        .rposition(|c| matches!(c, MpvCommand::LoadFile(_)))
        .expect("a switch");
    assert!(reload > silent);
}

#[tokio::test(start_paused = true)]
async fn turning_shuffle_off_mid_fade_restores_volume() {
    let (engine, control) = engine(catalog());
    let _mpv = auto_start(engine.player().clone());

    engine.toggle_shuffle().await;
    let first = engine.snapshot().await.url;

    sleep(INTERVAL + Duration::from_millis(900)).await;
    let faded = engine.snapshot().await.volume;
    assert!(faded < 80, "volume {} should be fading", faded);

    assert!(!engine.toggle_shuffle().await);
    sleep(Duration::from_secs(5)).await;

    let info = engine.snapshot().await;
    assert_eq!(info.volume, 80);
    assert_eq!(info.url, first);
    assert!(!engine.shuffler().is_active());
    assert_eq!(control.volumes().last(), Some(&80));
}

#[tokio::test(start_paused = true)]
async fn shuffle_with_one_station_replays_it() {
    let only = Station::new("Only", "http://only.example/stream");
    let (engine, control) = engine(vec![only.clone()]);
    let _mpv = auto_start(engine.player().clone());

    engine.toggle(&only).await;
    engine.toggle_shuffle().await;
    sleep(INTERVAL + Duration::from_secs(10)).await;

    let loads: Vec<String> = control.loads().into_iter().map(|(_, url)| url).collect();
    assert_eq!(loads, vec![only.url.clone(); 3]);
    let info = engine.snapshot().await;
    assert_eq!(info.url, only.url);
    assert_eq!(info.status, PlaybackStatus::Playing);
}

#[tokio::test(start_paused = true)]
async fn shuffle_never_picks_the_playing_station() {
    let (engine, control) = engine(catalog());
    let _mpv = auto_start(engine.player().clone());

    engine.toggle_shuffle().await;
    sleep(INTERVAL * 6 + Duration::from_secs(30)).await;

    let loads: Vec<String> = control.loads().into_iter().map(|(_, url)| url).collect();
    assert!(loads.len() >= 7, "only {} switches", loads.len());
    assert!(loads.windows(2).all(|w| w[0] != w[1]));
}

#[tokio::test(start_paused = true)]
async fn unconfirmed_switch_fades_in_after_timeout() {
    let (engine, control) = engine(catalog());
    // No fake mpv: nothing ever starts playing.
    engine.toggle_shuffle().await;

    sleep(INTERVAL + Duration::from_secs(10)).await;
    assert_eq!(engine.snapshot().await.volume, 0);

    sleep(Duration::from_secs(30)).await;
    assert_eq!(engine.snapshot().await.volume, 80);
    assert_eq!(engine.snapshot().await.status, PlaybackStatus::Buffering);
    assert!(engine.shuffler().is_active());
    assert_eq!(control.loads().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn manual_toggle_turns_shuffle_off() {
    let (engine, _control) = engine(catalog());
    let status = engine.shuffle_status();

    engine.toggle_shuffle().await;
    assert!(status.borrow().active);

    engine.toggle(&catalog()[2]).await;
    assert!(!engine.shuffler().is_active());
    assert!(!status.borrow().active);
    assert_eq!(engine.snapshot().await.url, catalog()[2].url);
}

#[tokio::test(start_paused = true)]
async fn countdown_tracks_the_interval() {
    let (engine, _control) = engine(catalog());
    let status = engine.shuffle_status();

    engine.toggle_shuffle().await;
    sleep(Duration::from_secs(61)).await;

    let current = status.borrow().clone();
    assert!(current.active);
    assert_eq!(current.interval, INTERVAL);
    assert!(current.remaining <= Duration::from_secs(240));
    assert!(current.remaining >= Duration::from_secs(238));
}

#[tokio::test(start_paused = true)]
async fn interval_change_rearms_without_turning_off() {
    let (engine, control) = engine(catalog());
    let _mpv = auto_start(engine.player().clone());

    assert!(matches!(
        engine.set_shuffle_interval(0),
        Err(EngineError::InvalidInterval(0))
    ));
    assert!(engine.set_shuffle_interval(10).is_err());

    engine.toggle_shuffle().await;
    sleep(Duration::from_secs(90)).await;
    engine.set_shuffle_interval(2).expect("valid interval");

    let status = engine.shuffler().status();
    assert!(status.active);
    assert_eq!(status.interval, Duration::from_secs(120));
    assert!(status.remaining > Duration::from_secs(119));

    sleep(Duration::from_secs(110)).await;
    assert_eq!(control.loads().len(), 1);
    sleep(Duration::from_secs(20)).await;
    assert_eq!(control.loads().len(), 2);
    assert!(engine.shuffler().is_active());
}

#[tokio::test(start_paused = true)]
async fn interval_change_mid_fade_restores_volume_and_stays_on() {
    let (engine, control) = engine(catalog());
    let _mpv = auto_start(engine.player().clone());

    engine.toggle_shuffle().await;
    let first = engine.snapshot().await.url;

    sleep(INTERVAL + Duration::from_millis(900)).await;
    let faded = engine.snapshot().await.volume;
    assert!(faded > 0 && faded < 80, "volume {} should be mid fade", faded);

    engine.set_shuffle_interval(1).expect("valid interval");
    sleep(Duration::from_secs(5)).await;

    let info = engine.snapshot().await;
    assert_eq!(info.volume, 80);
    assert_eq!(info.url, first);
    assert_eq!(control.volumes().last(), Some(&80));
    assert!(engine.shuffler().is_active());
    assert_eq!(engine.shuffler().status().interval, Duration::from_secs(60));

    // The next switch follows the new interval, counted from the change.
    sleep(Duration::from_secs(45)).await;
    assert_eq!(control.loads().len(), 1);
    sleep(Duration::from_secs(20)).await;
    assert_eq!(control.loads().len(), 2);
    assert_ne!(engine.snapshot().await.url, first);
    assert_eq!(engine.snapshot().await.volume, 80);
    assert!(engine.shuffler().is_active());
}

#[tokio::test(start_paused = true)]
async fn interval_change_while_awaiting_playback_restores_volume() {
    let (engine, control) = engine(catalog());
    // Nothing ever starts playing, so the switch sits in the confirmation wait.
    engine.toggle_shuffle().await;

    sleep(INTERVAL + Duration::from_secs(10)).await;
    assert_eq!(engine.snapshot().await.volume, 0);
    assert_eq!(control.loads().len(), 2);

    engine.set_shuffle_interval(1).expect("valid interval");
    sleep(Duration::from_secs(1)).await;

    assert_eq!(engine.snapshot().await.volume, 80);
    assert_eq!(control.volumes().last(), Some(&80));
    assert!(engine.shuffler().is_active());

    // The abandoned wait must not fade anything in later.
    sleep(Duration::from_secs(40)).await;
    assert_eq!(engine.snapshot().await.volume, 80);
    assert_eq!(control.loads().len(), 2);

    sleep(Duration::from_secs(25)).await;
    assert_eq!(control.loads().len(), 3);
    assert!(engine.shuffler().is_active());
}
