//! Playback control engine for an external mpv process.
//!
//! ```text
//!   Supervisor ── spawns mpv, owns the endpoint
//!        │
//!        ├── IpcControl   connect-per-call command sender
//!        └── reader       one subscription connection → events::decode → Player
//!
//!   Player    single owner of PlaybackInfo, publishes snapshots
//!   Shuffler  interval loop: fade out → switch → confirm → fade in
//!   Engine    facade tying the above together for a consumer
//! ```

pub mod engine;
pub mod error;
pub mod events;
pub mod fade;
pub mod ipc;
pub mod player;
pub mod reader;
pub mod reducer;
pub mod retry;
pub mod shuffle;
pub mod supervisor;

pub use engine::Engine;
pub use error::EngineError;
pub use player::{NoTracking, PlayTracker, Player, PlayerSettings};
pub use radio_proto::protocol::{PlaybackInfo, PlaybackStatus, Station};
pub use shuffle::{ShuffleSettings, ShuffleStatus, Shuffler, StationView};
