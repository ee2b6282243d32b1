use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

use crate::protocol::Station;

/// A station must have been played this many times to count as a favorite.
const MIN_PLAYS: u32 = 1;
/// One favorite per letter a-z.
const MAX_FAVORITES: usize = 26;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FavoriteStation {
    pub url: String,
    pub title: String,
    pub play_count: u32,
    pub last_played: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FavoritesFile {
    #[serde(default)]
    stations: HashMap<String, FavoriteStation>,
}

/// Play counts per stream URL, persisted as JSON after every play.
pub struct Favorites {
    path: PathBuf,
    data: Mutex<FavoritesFile>,
    /// Held across a save so files land in the order plays were counted.
    write_lock: tokio::sync::Mutex<()>,
}

impl Favorites {
    /// Load from `path`.  A missing or unreadable file starts empty.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("favorites: failed to parse {:?}: {}", path, e);
                FavoritesFile::default()
            }),
            Err(_) => FavoritesFile::default(),
        };
        Self {
            path,
            data: Mutex::new(data),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record one play of `station` and persist.
    pub async fn track(&self, station: &Station) {
        if station.url.is_empty() {
            return;
        }

        let _writing = self.write_lock.lock().await;
        let json = match self.count_play(station) {
            Some(Ok(json)) => json,
            Some(Err(e)) => {
                warn!("favorites: failed to encode: {}", e);
                return;
            }
            None => return,
        };
        if let Err(e) = save(&self.path, json).await {
            warn!("favorites: failed to save {:?}: {}", self.path, e);
        }
    }

    /// Bump the counter and serialize the whole file.
    fn count_play(&self, station: &Station) -> Option<serde_json::Result<String>> {
        let mut data = self.data.lock().ok()?;
        let entry = data
            .stations
            .entry(station.url.clone())
            .or_insert_with(|| FavoriteStation {
                url: station.url.clone(),
                title: station.title.clone(),
                play_count: 0,
                last_played: Utc::now(),
            });
        entry.title = station.title.clone();
        entry.play_count += 1;
        entry.last_played = Utc::now();
        Some(serde_json::to_string_pretty(&*data))
    }

    pub fn play_count(&self, url: &str) -> u32 {
        self.data
            .lock()
            .ok()
            .and_then(|d| d.stations.get(url).map(|f| f.play_count))
            .unwrap_or(0)
    }

    /// Most played first, ties broken by recency.  Only stations still in
    /// `catalog` are returned, titled as the catalog titles them.
    pub fn favorite_stations(&self, catalog: &[Station]) -> Vec<Station> {
        let Ok(data) = self.data.lock() else {
            return Vec::new();
        };

        let mut favs: Vec<(&FavoriteStation, &Station)> = data
            .stations
            .values()
            .filter(|f| f.play_count >= MIN_PLAYS)
            .filter_map(|f| catalog.iter().find(|s| s.url == f.url).map(|s| (f, s)))
            .collect();

        favs.sort_by(|(a, _), (b, _)| {
            b.play_count
                .cmp(&a.play_count)
                .then(b.last_played.cmp(&a.last_played))
        });

        favs.into_iter()
            .take(MAX_FAVORITES)
            .map(|(_, s)| s.clone())
            .collect()
    }
}

async fn save(path: &Path, json: String) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, json).await?;
    Ok(())
}
