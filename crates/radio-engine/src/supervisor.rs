//! mpv process lifecycle: spawn idle, wait for the IPC endpoint, quit.
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use radio_proto::config::MpvConfig;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::ipc::{Control, Endpoint, MpvCommand, QUIT_EXIT_CODE};

const LISTEN_ATTEMPTS: u32 = 10;
const FIRST_LISTEN_DELAY: Duration = Duration::from_millis(16);
const QUIT_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Explicit mpv path; looked up beside the executable and on PATH if unset.
    pub binary: Option<PathBuf>,
    pub initial_volume: u8,
    pub network_timeout_secs: u64,
}

impl From<&MpvConfig> for LaunchOptions {
    fn from(config: &MpvConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            initial_volume: config.initial_volume(),
            network_timeout_secs: config.network_timeout_secs,
        }
    }
}

/// Command line for an idle, audio-only mpv listening on `endpoint`.
pub fn launch_args(opts: &LaunchOptions, endpoint: &Endpoint) -> Vec<String> {
    vec![
        "--no-video".to_string(),
        "--idle=yes".to_string(),
        "--quiet".to_string(),
        "--display-tags=Artist,Title,icy-title".to_string(),
        format!("--network-timeout={}", opts.network_timeout_secs),
        format!("--volume={}", opts.initial_volume),
        format!("--input-ipc-server={}", endpoint.address()),
    ]
}

fn resolve_binary(opts: &LaunchOptions) -> Result<PathBuf, EngineError> {
    match &opts.binary {
        Some(path) => Ok(path.clone()),
        None => radio_proto::platform::find_mpv_binary().ok_or(EngineError::MpvNotFound),
    }
}

pub struct Supervisor {
    endpoint: Endpoint,
    process: Option<Child>,
}

impl Supervisor {
    /// Spawn mpv and return once its control endpoint accepts connections.
    pub async fn start(opts: &LaunchOptions, endpoint: Endpoint) -> Result<Self, EngineError> {
        let binary = resolve_binary(opts)?;
        endpoint.cleanup();

        info!("mpv: spawning {:?} on {}", binary, endpoint.address());
        let child = Command::new(&binary)
            .args(launch_args(opts, &endpoint))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::NotFound {
                    EngineError::MpvNotFound
                } else {
                    EngineError::Spawn { binary, source }
                }
            })?;

        let mut supervisor = Self {
            endpoint,
            process: Some(child),
        };
        if let Err(e) = supervisor.wait_until_listening().await {
            supervisor.kill().await;
            return Err(e);
        }
        info!("mpv: listening on {}", supervisor.endpoint.address());
        Ok(supervisor)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn process_alive(&mut self) -> bool {
        match self.process.as_mut() {
            Some(child) => child.try_wait().ok().flatten().is_none(),
            None => false,
        }
    }

    async fn wait_until_listening(&mut self) -> Result<(), EngineError> {
        let mut delay = FIRST_LISTEN_DELAY;
        for attempt in 1..=LISTEN_ATTEMPTS {
            tokio::time::sleep(delay).await;
            if let Some(child) = self.process.as_mut() {
                if let Ok(Some(status)) = child.try_wait() {
                    return Err(EngineError::ExitedEarly(status));
                }
            }
            match self.endpoint.connect().await {
                Ok(_) => return Ok(()),
                Err(e) => debug!("mpv: endpoint not ready (attempt {}): {}", attempt, e),
            }
            delay *= 2;
        }
        Err(EngineError::NotListening {
            address: self.endpoint.address().to_string(),
            attempts: LISTEN_ATTEMPTS,
        })
    }

    /// Ask mpv to quit, falling back to a kill, then remove the endpoint.
    pub async fn quit(&mut self, control: &dyn Control) {
        match control.send(&MpvCommand::Quit(QUIT_EXIT_CODE)).await {
            Ok(()) => {
                if let Some(child) = self.process.as_mut() {
                    match tokio::time::timeout(QUIT_GRACE, child.wait()).await {
                        Ok(Ok(status)) => {
                            debug!("mpv: exited with {}", status);
                            self.process = None;
                        }
                        Ok(Err(e)) => warn!("mpv: wait failed: {}", e),
                        Err(_) => warn!("mpv: did not quit within {:?}", QUIT_GRACE),
                    }
                }
            }
            Err(e) => warn!("mpv: quit failed: {:#}", e),
        }
        self.kill().await;
        self.endpoint.cleanup();
    }

    async fn kill(&mut self) {
        if let Some(mut child) = self.process.take() {
            let _ = child.kill().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> LaunchOptions {
        LaunchOptions {
            binary: None,
            initial_volume: 80,
            network_timeout_secs: 10,
        }
    }

    #[test]
    fn test_launch_args() {
        let args = launch_args(&opts(), &Endpoint::new("/tmp/radio-mpv42.sock"));
        assert!(args.contains(&"--no-video".to_string()));
        assert!(args.contains(&"--idle=yes".to_string()));
        assert!(args.contains(&"--volume=80".to_string()));
        assert!(args.contains(&"--network-timeout=10".to_string()));
        assert_eq!(
            args.last().map(String::as_str),
            Some("--input-ipc-server=/tmp/radio-mpv42.sock")
        );
    }

    #[test]
    fn test_options_from_config_snap_volume() {
        let config = MpvConfig {
            default_volume: 83,
            ..MpvConfig::default()
        };
        assert_eq!(LaunchOptions::from(&config).initial_volume, 85);
    }

    #[tokio::test]
    async fn test_missing_binary_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let opts = LaunchOptions {
            binary: Some(dir.path().join("no-such-mpv")),
            ..opts()
        };
        let endpoint = Endpoint::new(dir.path().join("mpv.sock").display().to_string());
        let err = Supervisor::start(&opts, endpoint).await.err().unwrap();
        assert!(matches!(err, EngineError::MpvNotFound));
        assert!(err.is_fatal());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_that_exits_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let opts = LaunchOptions {
            binary: Some(PathBuf::from("/bin/false")),
            ..opts()
        };
        if !opts.binary.as_ref().unwrap().exists() {
            return;
        }
        let endpoint = Endpoint::new(dir.path().join("mpv.sock").display().to_string());
        let err = Supervisor::start(&opts, endpoint).await.err().unwrap();
        assert!(matches!(
            err,
            EngineError::ExitedEarly(_) | EngineError::NotListening { .. }
        ));
    }
}
