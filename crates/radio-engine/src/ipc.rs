//! mpv JSON IPC plumbing: endpoint addressing, command encoding and the
//! connect-per-call control channel.
//!
//! Platform notes:
//! - Unix:    Unix domain sockets
//! - Windows: Named pipes  \\.\pipe\<name>
use anyhow::Context;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[cfg(unix)]
pub type IpcStream = tokio::net::UnixStream;

#[cfg(windows)]
pub type IpcStream = tokio::net::windows::named_pipe::NamedPipeClient;

// ── observation property IDs ──────────────────────────────────────────────────

/// Fixed observe_property IDs for the subscription connection.
pub const OBS_METADATA: u64 = 1;
pub const OBS_BITRATE: u64 = 2;

pub const PROP_FILTERED_METADATA: &str = "filtered-metadata";
pub const PROP_AUDIO_BITRATE: &str = "audio-bitrate";

/// Exit code handed to mpv's `quit`.
pub const QUIT_EXIT_CODE: i32 = 9;

// ── commands ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MpvCommand {
    SetVolume(u8),
    Stop,
    LoadFile(String),
    Quit(i32),
    ObserveProperty { id: u64, name: &'static str },
}

impl MpvCommand {
    /// The `command` array mpv expects.
    pub fn args(&self) -> Value {
        match self {
            MpvCommand::SetVolume(v) => json!(["set_property", "volume", v]),
            MpvCommand::Stop => json!(["stop"]),
            MpvCommand::LoadFile(url) => json!(["loadfile", url]),
            MpvCommand::Quit(code) => json!(["quit", code]),
            MpvCommand::ObserveProperty { id, name } => json!(["observe_property", id, name]),
        }
    }

    /// One newline-terminated JSON record.
    pub fn encode(&self) -> String {
        let mut raw = json!({ "command": self.args() }).to_string();
        raw.push('\n');
        raw
    }
}

/// The two observations the event reader registers.
pub fn subscriptions() -> [MpvCommand; 2] {
    [
        MpvCommand::ObserveProperty {
            id: OBS_METADATA,
            name: PROP_FILTERED_METADATA,
        },
        MpvCommand::ObserveProperty {
            id: OBS_BITRATE,
            name: PROP_AUDIO_BITRATE,
        },
    ]
}

// ── endpoint ──────────────────────────────────────────────────────────────────

/// Address of mpv's `--input-ipc-server`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    address: String,
}

impl Endpoint {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    /// Endpoint unique to the running process.
    pub fn for_this_process() -> Self {
        let name = radio_proto::platform::mpv_socket_name();
        Self::new(radio_proto::platform::mpv_socket_address(&name))
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    #[cfg(unix)]
    pub async fn connect(&self) -> std::io::Result<IpcStream> {
        tokio::net::UnixStream::connect(&self.address).await
    }

    #[cfg(windows)]
    pub async fn connect(&self) -> std::io::Result<IpcStream> {
        tokio::net::windows::named_pipe::ClientOptions::new().open(&self.address)
    }

    /// Remove a stale socket file.  Named pipes vanish with their server.
    pub fn cleanup(&self) {
        #[cfg(unix)]
        {
            let _ = std::fs::remove_file(&self.address);
        }
    }
}

// ── control channel ───────────────────────────────────────────────────────────

/// Imperative command sink.  Every call is independent; no ordering is
/// guaranteed between two calls unless the caller awaits the first.
#[async_trait]
pub trait Control: Send + Sync {
    async fn send(&self, command: &MpvCommand) -> anyhow::Result<()>;
}

/// Opens a fresh connection per command, writes it and closes.
#[derive(Debug, Clone)]
pub struct IpcControl {
    endpoint: Endpoint,
}

impl IpcControl {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

#[async_trait]
impl Control for IpcControl {
    async fn send(&self, command: &MpvCommand) -> anyhow::Result<()> {
        let payload = command.encode();
        debug!("mpv control: send {}", payload.trim_end());

        let mut stream = self
            .endpoint
            .connect()
            .await
            .with_context(|| format!("connect to {}", self.endpoint.address()))?;
        stream
            .write_all(payload.as_bytes())
            .await
            .with_context(|| format!("write {}", payload.trim_end()))?;
        let _ = stream.shutdown().await;
        Ok(())
    }
}
