use std::collections::HashSet;

use tracing::{info, warn};

use crate::config::StationsConfig;
use crate::protocol::Station;

/// Used when no station file is configured.
const BUILTIN_STATIONS_CSV: &str = "\
SomaFM: Secret Agent, https://somafm.com/secretagent130.pls, SomaFM;Lounge
SomaFM: Beat Blender, https://somafm.com/beatblender.pls, SomaFM;Electronic
SomaFM: Groove Salad Classic, https://somafm.com/gsclassic130.pls, SomaFM;Ambient
SomaFM: DEF CON Radio, http://somafm.com/defcon.pls, SomaFM;Electronic
SomaFM: Drone Zone, http://somafm.com/dronezone.pls, SomaFM;Ambient
Nightride, https://stream.nightride.fm/nightride.ogg, Synthwave
Jungletrain.net, http://stream1.jungletrain.net:8000, Drum and Bass
Jazz24, https://prod-52-201-196-36.amperwave.net/ppm-jazz24aac256-ibc1, Jazz
Radio Paradise, https://stream.radioparadise.com/flacm, HiRes;Eclectic
Radio Paradise Mellow, https://stream.radioparadise.com/mellow-flacm, HiRes;Eclectic
";

/// Parse `title, url[, tag;tag]` lines.  Blank lines and `#` comments are
/// skipped; lines without a URL are dropped with a warning.
pub fn parse_stations_csv(content: &str) -> Vec<Station> {
    let mut stations = Vec::new();

    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.splitn(3, ',').map(str::trim);
        let title = fields.next().unwrap_or_default();
        let url = fields.next().unwrap_or_default();
        if url.is_empty() {
            warn!("stations: line {} has no url, skipping", lineno + 1);
            continue;
        }
        let tags = fields
            .next()
            .map(|t| {
                t.split(';')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        stations.push(Station {
            title: if title.is_empty() { url.to_string() } else { title.to_string() },
            url: url.to_string(),
            tags,
        });
    }

    stations
}

// ── TOML station loader ───────────────────────────────────────────────────────

#[derive(Debug, serde::Deserialize)]
struct TomlStationFile {
    station: Vec<TomlStation>,
}

#[derive(Debug, serde::Deserialize)]
struct TomlStation {
    #[serde(alias = "name")]
    title: String,
    url: String,
    #[serde(default)]
    tags: Vec<String>,
}

pub fn parse_stations_from_toml_str(content: &str) -> anyhow::Result<Vec<Station>> {
    let file: TomlStationFile = toml::from_str(content)?;
    Ok(file
        .station
        .into_iter()
        .map(|s| Station {
            title: s.title,
            url: s.url,
            tags: s.tags,
        })
        .collect())
}

pub fn load_stations_from_toml(path: &std::path::Path) -> anyhow::Result<Vec<Station>> {
    let content = std::fs::read_to_string(path)?;
    parse_stations_from_toml_str(&content)
}

/// Keep the first station for every URL.
pub fn dedup_by_url(stations: Vec<Station>) -> Vec<Station> {
    let mut seen = HashSet::new();
    stations
        .into_iter()
        .filter(|s| seen.insert(s.url.clone()))
        .collect()
}

/// Sorted, de-duplicated tag names across the catalog.
pub fn tags(stations: &[Station]) -> Vec<String> {
    let mut tags: Vec<String> = stations
        .iter()
        .flat_map(|s| s.tags.iter().cloned())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    tags.sort_by_key(|t| t.to_lowercase());
    tags
}

pub fn stations_with_tag(stations: &[Station], tag: &str) -> Vec<Station> {
    stations
        .iter()
        .filter(|s| s.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)))
        .cloned()
        .collect()
}

async fn read_csv_source(source: &str) -> anyhow::Result<String> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let body = reqwest::get(source)
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    } else {
        Ok(tokio::fs::read_to_string(source).await?)
    }
}

/// Resolve the configured station list: TOML file, then CSV source, then the
/// built-in list.  A broken source falls through to the next one.
pub async fn load_stations(config: &StationsConfig) -> Vec<Station> {
    if config.stations_toml.exists() {
        match load_stations_from_toml(&config.stations_toml) {
            Ok(stations) if !stations.is_empty() => {
                info!(
                    "stations: {} loaded from {:?}",
                    stations.len(),
                    config.stations_toml
                );
                return dedup_by_url(stations);
            }
            Ok(_) => warn!("stations: {:?} is empty", config.stations_toml),
            Err(e) => warn!("stations: failed to parse {:?}: {}", config.stations_toml, e),
        }
    }

    if let Some(source) = &config.stations_csv {
        match read_csv_source(source).await {
            Ok(content) => {
                let stations = parse_stations_csv(&content);
                if !stations.is_empty() {
                    info!("stations: {} loaded from {}", stations.len(), source);
                    return dedup_by_url(stations);
                }
                warn!("stations: {} has no stations", source);
            }
            Err(e) => warn!("stations: failed to read {}: {}", source, e),
        }
    }

    info!("stations: using built-in list");
    dedup_by_url(parse_stations_csv(BUILTIN_STATIONS_CSV))
}
