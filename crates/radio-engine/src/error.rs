use std::path::PathBuf;

/// Errors the engine reports to its owner.  Everything else (send failures,
/// broken streams, garbage on the socket) degrades to a status string.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(
        "mpv is not available. Install it using your package manager or visit https://mpv.io for more info"
    )]
    MpvNotFound,

    #[error("failed to launch {binary:?}: {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("mpv exited during startup ({0})")]
    ExitedEarly(std::process::ExitStatus),

    #[error("mpv failed to start: control endpoint {address} not reachable after {attempts} attempts")]
    NotListening { address: String, attempts: u32 },

    #[error("shuffle interval must be 1-9 minutes, got {0}")]
    InvalidInterval(u8),
}

impl EngineError {
    /// Startup errors end the process; nothing else should.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, EngineError::InvalidInterval(_))
    }
}
