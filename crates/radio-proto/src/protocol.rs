use serde::{Deserialize, Serialize};
use std::fmt;

/// Volume changes always move in steps of this many percentage points.
pub const VOLUME_STEP: u8 = 5;
pub const MAX_VOLUME: u8 = 100;

/// Round an arbitrary percentage onto the 0..=100 grid of `VOLUME_STEP`s.
pub fn snap_volume(value: i32) -> u8 {
    let step = VOLUME_STEP as i32;
    let clamped = value.clamp(0, MAX_VOLUME as i32);
    (((clamped + step / 2) / step) * step) as u8
}

/// Playback status as shown to the consumer.
///
/// Transitions:
///   Idle -> Buffering -> Playing
///   Buffering | Playing -> Error(reason) -> Buffering (retry)
///   * -> Stopped
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    /// Nothing has been played since startup.
    #[default]
    Idle,
    /// Explicitly stopped by the user.
    Stopped,
    /// loadfile sent, waiting for mpv to restart playback.
    Buffering,
    Playing,
    /// Human-readable description of what went wrong.
    Error(String),
}

impl PlaybackStatus {
    /// True for the two states in which nothing is loaded.
    pub fn is_idle(&self) -> bool {
        matches!(self, PlaybackStatus::Idle | PlaybackStatus::Stopped)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, PlaybackStatus::Error(_))
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackStatus::Idle => Ok(()),
            PlaybackStatus::Stopped => f.write_str("Stopped"),
            PlaybackStatus::Buffering => f.write_str("Buffering..."),
            PlaybackStatus::Playing => f.write_str("Playing"),
            PlaybackStatus::Error(reason) => f.write_str(reason),
        }
    }
}

/// Canonical "now playing" snapshot.  Every state change publishes a copy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaybackInfo {
    pub status: PlaybackStatus,
    /// Display name of the current station.
    pub station: String,
    /// Current song / stream metadata.  Empty when unknown.
    pub song: String,
    /// Last song announced, used to drop repeated metadata pushes.
    #[serde(default)]
    pub prev_song: String,
    /// Stream URL, empty when nothing is loaded.
    pub url: String,
    /// 0..=100 in steps of `VOLUME_STEP`.
    pub volume: u8,
    /// kbit/s, 0 when unknown.
    pub bitrate: u32,
}

impl PlaybackInfo {
    pub fn new(volume: u8) -> Self {
        Self {
            status: PlaybackStatus::Idle,
            station: String::new(),
            song: String::new(),
            prev_song: String::new(),
            url: String::new(),
            volume: snap_volume(volume as i32),
            bitrate: 0,
        }
    }

    /// One-line summary: the song wins over the status text.
    pub fn headline(&self) -> String {
        let detail = if self.song.is_empty() {
            self.status.to_string()
        } else {
            self.song.clone()
        };
        match (self.station.is_empty(), detail.is_empty()) {
            (_, true) => self.station.clone(),
            (true, false) => detail,
            (false, false) => format!("{} | {}", self.station, detail),
        }
    }
}

impl Default for PlaybackInfo {
    fn default() -> Self {
        Self::new(80)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Station {
    pub title: String,
    pub url: String,
    /// Ordered tags (genre, network, language...)
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Station {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            tags: Vec::new(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Stations are the same when they point at the same stream.
    pub fn same_stream(&self, other: &Station) -> bool {
        self.url == other.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snap_volume() {
        assert_eq!(snap_volume(-10), 0);
        assert_eq!(snap_volume(0), 0);
        assert_eq!(snap_volume(42), 40);
        assert_eq!(snap_volume(43), 45);
        assert_eq!(snap_volume(80), 80);
        assert_eq!(snap_volume(140), 100);
    }

    #[test]
    fn test_new_info_is_idle() {
        let info = PlaybackInfo::new(77);
        assert_eq!(info.status, PlaybackStatus::Idle);
        assert!(info.url.is_empty());
        assert_eq!(info.volume, 75);
        assert!(info.status.is_idle());
    }

    #[test]
    fn test_headline_prefers_song() {
        let mut info = PlaybackInfo::new(80);
        info.station = "Groove Salad".into();
        info.status = PlaybackStatus::Buffering;
        assert_eq!(info.headline(), "Groove Salad | Buffering...");
        info.status = PlaybackStatus::Playing;
        info.song = "Air - La femme d'argent".into();
        assert_eq!(info.headline(), "Groove Salad | Air - La femme d'argent");
        info.song.clear();
        info.status = PlaybackStatus::Idle;
        assert_eq!(info.headline(), "Groove Salad");
    }

    #[test]
    fn test_info_json_roundtrip_keeps_error_text() {
        let mut info = PlaybackInfo::new(50);
        info.status = PlaybackStatus::Error("Network or stream issues: eof".into());
        let json = serde_json::to_string(&info).unwrap();
        let back: PlaybackInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info);
    }
}
