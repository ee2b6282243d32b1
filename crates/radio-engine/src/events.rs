//! Classification of records read from the subscription connection.
//!
//! Every line is decoded once into a closed `MpvEvent`; nothing downstream
//! looks at raw JSON.
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

use crate::ipc::{PROP_AUDIO_BITRATE, PROP_FILTERED_METADATA};

#[derive(Debug, Clone, PartialEq)]
pub enum MpvEvent {
    /// `audio-bitrate` changed.  kbit/s, `None` when mpv reports no value.
    Bitrate(Option<u32>),
    /// `filtered-metadata` changed.
    Metadata(TrackMetadata),
    /// Playback (re)started after a load or seek.
    PlaybackRestart,
    EndFile(EndReason),
    /// Reply to a command we sent on the subscription connection.
    Reply { error: String },
    /// A well-formed event we do not act on.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    Eof,
    Error,
    Unknown,
    Stop,
    Quit,
    Redirect,
    /// The record carried no `reason` field.
    Missing,
    Other(String),
}

impl EndReason {
    fn parse(reason: &str) -> Self {
        match reason {
            "eof" => EndReason::Eof,
            "error" => EndReason::Error,
            "unknown" => EndReason::Unknown,
            "stop" => EndReason::Stop,
            "quit" => EndReason::Quit,
            "redirect" => EndReason::Redirect,
            other => EndReason::Other(other.to_string()),
        }
    }

    /// Reasons that mean the stream died on its own and should be reloaded.
    pub fn is_unexpected(&self) -> bool {
        matches!(self, EndReason::Eof | EndReason::Error | EndReason::Unknown)
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EndReason::Eof => "eof",
            EndReason::Error => "error",
            EndReason::Unknown => "unknown",
            EndReason::Stop => "stop",
            EndReason::Quit => "quit",
            EndReason::Redirect => "redirect",
            EndReason::Missing => "none",
            EndReason::Other(s) => s,
        };
        f.write_str(s)
    }
}

/// Tags from `filtered-metadata`, in the order mpv sent them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackMetadata {
    tags: Vec<(String, String)>,
}

impl TrackMetadata {
    pub fn new<I, K, V>(tags: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            tags: tags
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    fn from_value(data: &Value) -> Self {
        let tags = data
            .as_object()
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();
        Self { tags }
    }

    /// Case-insensitive tag lookup; blank values count as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// "Artist - Title" when both exist, otherwise the ICY title.
    pub fn display_title(&self) -> Option<String> {
        match (self.get("artist"), self.get("title")) {
            (Some(artist), Some(title)) => Some(format!("{} - {}", artist, title)),
            _ => self.get("icy-title").map(str::to_string),
        }
    }
}

// ── wire shapes ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
enum RawEvent {
    PropertyChange {
        name: String,
        #[serde(default)]
        data: Value,
    },
    PlaybackRestart,
    EndFile {
        #[serde(default)]
        reason: Option<String>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Record {
    Event(RawEvent),
    Reply { error: String },
}

/// Decode one line from the subscription connection.
pub fn decode(line: &str) -> Result<MpvEvent, serde_json::Error> {
    let record: Record = serde_json::from_str(line)?;
    Ok(match record {
        Record::Reply { error } => MpvEvent::Reply { error },
        Record::Event(RawEvent::PlaybackRestart) => MpvEvent::PlaybackRestart,
        Record::Event(RawEvent::EndFile { reason }) => {
            MpvEvent::EndFile(reason.as_deref().map_or(EndReason::Missing, EndReason::parse))
        }
        Record::Event(RawEvent::PropertyChange { name, data }) => match name.as_str() {
            PROP_AUDIO_BITRATE => {
                MpvEvent::Bitrate(data.as_f64().map(|bps| (bps / 1000.0).round() as u32))
            }
            PROP_FILTERED_METADATA => MpvEvent::Metadata(TrackMetadata::from_value(&data)),
            _ => MpvEvent::Ignored,
        },
        Record::Event(RawEvent::Other) => MpvEvent::Ignored,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_bitrate() {
        let evt = decode(r#"{"event":"property-change","id":2,"name":"audio-bitrate","data":128456.0}"#)
            .unwrap();
        assert_eq!(evt, MpvEvent::Bitrate(Some(128)));

        let evt =
            decode(r#"{"event":"property-change","id":2,"name":"audio-bitrate"}"#).unwrap();
        assert_eq!(evt, MpvEvent::Bitrate(None));
    }

    #[test]
    fn test_decode_metadata_prefers_artist_title() {
        let evt = decode(
            r#"{"event":"property-change","id":1,"name":"filtered-metadata",
                "data":{"Artist":"Boards of Canada","Title":"Roygbiv","icy-title":"BoC - Roygbiv"}}"#,
        )
        .unwrap();
        let MpvEvent::Metadata(meta) = evt else {
            panic!("expected metadata, got {:?}", evt);
        };
        assert_eq!(meta.display_title().as_deref(), Some("Boards of Canada - Roygbiv"));
    }

    #[test]
    fn test_metadata_falls_back_to_icy_title() {
        let meta = TrackMetadata::new([("ARTIST", "Solo"), ("icy-title", " Stream Title ")]);
        assert_eq!(meta.display_title().as_deref(), Some("Stream Title"));

        let meta = TrackMetadata::new([("Title", "  ")]);
        assert_eq!(meta.display_title(), None);
    }

    #[test]
    fn test_decode_null_metadata_is_empty() {
        let evt =
            decode(r#"{"event":"property-change","id":1,"name":"filtered-metadata","data":null}"#)
                .unwrap();
        assert_eq!(evt, MpvEvent::Metadata(TrackMetadata::default()));
    }

    #[test]
    fn test_decode_end_file_reasons() {
        let evt = decode(r#"{"event":"end-file","reason":"error","playlist_entry_id":1}"#).unwrap();
        assert_eq!(evt, MpvEvent::EndFile(EndReason::Error));
        assert!(EndReason::Error.is_unexpected());

        let evt = decode(r#"{"event":"end-file","reason":"stop"}"#).unwrap();
        assert_eq!(evt, MpvEvent::EndFile(EndReason::Stop));
        assert!(!EndReason::Stop.is_unexpected());

        let evt = decode(r#"{"event":"end-file","reason":"unknown"}"#).unwrap();
        assert_eq!(evt, MpvEvent::EndFile(EndReason::Unknown));
        assert!(EndReason::Unknown.is_unexpected());

        let evt = decode(r#"{"event":"end-file"}"#).unwrap();
        assert_eq!(evt, MpvEvent::EndFile(EndReason::Missing));
        assert!(!EndReason::Missing.is_unexpected());
    }

    #[test]
    fn test_decode_other_shapes() {
        assert_eq!(
            decode(r#"{"event":"playback-restart"}"#).unwrap(),
            MpvEvent::PlaybackRestart
        );
        assert_eq!(
            decode(r#"{"event":"file-loaded"}"#).unwrap(),
            MpvEvent::Ignored
        );
        assert_eq!(
            decode(r#"{"event":"property-change","id":9,"name":"pause","data":false}"#).unwrap(),
            MpvEvent::Ignored
        );
        assert_eq!(
            decode(r#"{"data":null,"request_id":0,"error":"success"}"#).unwrap(),
            MpvEvent::Reply {
                error: "success".into()
            }
        );
    }

    #[test]
    fn test_decode_garbage_is_an_error() {
        assert!(decode("not json").is_err());
        assert!(decode(r#"{"foo":1}"#).is_err());
    }
}
