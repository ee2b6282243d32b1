//! Pure state transitions on `PlaybackInfo`.
//!
//! The player calls these while holding its lock and publishes a snapshot
//! whenever a transition reports a change.
use radio_proto::protocol::{PlaybackInfo, PlaybackStatus, Station};

use crate::events::{EndReason, MpvEvent};

/// What the player has to do after an event was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    Unchanged,
    Publish,
    /// Publish, then schedule a reload of the current URL.
    PublishAndRetry,
}

pub fn unexpected_end_status(reason: &EndReason) -> PlaybackStatus {
    PlaybackStatus::Error(format!("Network or stream issues: {}", reason))
}

pub fn unreachable_status() -> PlaybackStatus {
    PlaybackStatus::Error("Player unreachable".to_string())
}

/// Fold one decoded event into the snapshot.
pub fn apply_event(info: &mut PlaybackInfo, event: &MpvEvent) -> Reaction {
    // Late events for a stream we already left must not resurrect it.
    if info.url.is_empty() {
        return Reaction::Unchanged;
    }

    match event {
        MpvEvent::Bitrate(Some(kbps)) => {
            if info.bitrate == *kbps {
                return Reaction::Unchanged;
            }
            info.bitrate = *kbps;
            Reaction::Publish
        }
        MpvEvent::PlaybackRestart if info.status == PlaybackStatus::Buffering => {
            info.status = PlaybackStatus::Playing;
            info.song.clear();
            Reaction::Publish
        }
        MpvEvent::Metadata(meta) => {
            let Some(song) = meta.display_title() else {
                return Reaction::Unchanged;
            };
            if song == info.prev_song {
                return Reaction::Unchanged;
            }
            info.prev_song = song.clone();
            info.song = song;
            info.status = PlaybackStatus::Playing;
            Reaction::Publish
        }
        MpvEvent::EndFile(reason) if reason.is_unexpected() => {
            info.status = unexpected_end_status(reason);
            info.song.clear();
            Reaction::PublishAndRetry
        }
        _ => Reaction::Unchanged,
    }
}

/// A load of `station` was accepted by mpv.
pub fn begin_load(info: &mut PlaybackInfo, station: &Station) {
    info.station = station.title.clone();
    info.url = station.url.clone();
    info.status = PlaybackStatus::Buffering;
    info.song.clear();
    info.prev_song.clear();
    info.bitrate = 0;
}

/// mpv could not be reached to load `station`.
pub fn load_failed(info: &mut PlaybackInfo, station: &Station) {
    info.station = station.title.clone();
    info.url = station.url.clone();
    info.status = unreachable_status();
    info.song.clear();
    info.prev_song.clear();
    info.bitrate = 0;
}

pub fn mark_stopped(info: &mut PlaybackInfo) {
    info.status = PlaybackStatus::Stopped;
    info.url.clear();
    info.song.clear();
    info.prev_song.clear();
    info.bitrate = 0;
}

/// About to reload the same URL after a backoff.
pub fn mark_retrying(info: &mut PlaybackInfo) {
    info.status = PlaybackStatus::Buffering;
    info.song.clear();
    info.prev_song.clear();
}
