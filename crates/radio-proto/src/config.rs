use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::platform;
use super::protocol::snap_volume;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub mpv: MpvConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub shuffle: ShuffleConfig,
    #[serde(default)]
    pub stations: StationsConfig,
    #[serde(default)]
    pub favorites: FavoritesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MpvConfig {
    /// Start-up volume, 0..=100.  Snapped to a multiple of 5.
    #[serde(default = "default_volume")]
    pub default_volume: u8,
    #[serde(default = "default_network_timeout_secs")]
    pub network_timeout_secs: u64,
    /// Explicit mpv executable.  When unset, the bundled copy beside the
    /// executable and then PATH are searched.
    #[serde(default)]
    pub binary: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Upper bound for the exponential reload backoff.
    #[serde(default = "default_retry_cap_secs")]
    pub retry_cap_secs: u64,
    /// Buffered snapshots per subscriber before it starts lagging.
    #[serde(default = "default_snapshot_capacity")]
    pub snapshot_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShuffleConfig {
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u8,
    #[serde(default = "default_fade_millis")]
    pub fade_millis: u64,
    /// How long to wait for the next station to start before fading in anyway.
    #[serde(default = "default_confirm_timeout_secs")]
    pub confirm_timeout_secs: u64,
}

/// Station list source.  The TOML file wins over the CSV one; when neither
/// exists the built-in list is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationsConfig {
    #[serde(default = "default_stations_toml")]
    pub stations_toml: PathBuf,
    /// `title, url[, tag;tag]` lines.  Either a local path or an http(s) URL.
    #[serde(default)]
    pub stations_csv: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoritesConfig {
    #[serde(default = "default_favorites_enabled")]
    pub enabled: bool,
    #[serde(default = "default_favorites_file")]
    pub favorites_file: PathBuf,
}

impl Default for MpvConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
            network_timeout_secs: default_network_timeout_secs(),
            binary: None,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            retry_cap_secs: default_retry_cap_secs(),
            snapshot_capacity: default_snapshot_capacity(),
        }
    }
}

impl Default for ShuffleConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            fade_millis: default_fade_millis(),
            confirm_timeout_secs: default_confirm_timeout_secs(),
        }
    }
}

impl Default for StationsConfig {
    fn default() -> Self {
        Self {
            stations_toml: default_stations_toml(),
            stations_csv: None,
        }
    }
}

impl Default for FavoritesConfig {
    fn default() -> Self {
        Self {
            enabled: default_favorites_enabled(),
            favorites_file: default_favorites_file(),
        }
    }
}

impl MpvConfig {
    pub fn initial_volume(&self) -> u8 {
        snap_volume(self.default_volume as i32)
    }
}

impl PlaybackConfig {
    pub fn retry_cap(&self) -> Duration {
        Duration::from_secs(self.retry_cap_secs.max(1))
    }
}

impl ShuffleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.interval_minutes.clamp(1, 9)) * 60)
    }

    pub fn fade_duration(&self) -> Duration {
        Duration::from_millis(self.fade_millis)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }
}

fn default_volume() -> u8 {
    80
}

fn default_network_timeout_secs() -> u64 {
    10
}

fn default_retry_cap_secs() -> u64 {
    60
}

fn default_snapshot_capacity() -> usize {
    64
}

fn default_interval_minutes() -> u8 {
    5
}

fn default_fade_millis() -> u64 {
    2000
}

fn default_confirm_timeout_secs() -> u64 {
    30
}

fn default_stations_toml() -> PathBuf {
    platform::config_dir().join("stations.toml")
}

fn default_favorites_enabled() -> bool {
    true
}

fn default_favorites_file() -> PathBuf {
    platform::data_dir().join("favorites.json")
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Read `path`, writing the defaults there first if it does not exist.
    pub fn load_from(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &std::path::Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
