//! Event reader: the one long-lived subscription connection.
//!
//! Registers the two property observations, then decodes every line and
//! hands it to the player.  Ends on EOF or a read error; the player's state
//! stays whatever it was.
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::events::{self, MpvEvent};
use crate::ipc::{self, Endpoint};
use crate::player::Player;

pub async fn run<S>(stream: S, player: Player)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, mut write_half) = tokio::io::split(stream);

    for command in ipc::subscriptions() {
        if let Err(e) = write_half.write_all(command.encode().as_bytes()).await {
            warn!("mpv reader: failed to register {:?}: {}", command, e);
        }
    }

    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                info!("mpv reader: connection closed");
                break;
            }
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match events::decode(trimmed) {
                    Ok(MpvEvent::Ignored) => {}
                    Ok(MpvEvent::Reply { error }) => {
                        if error != "success" {
                            warn!("mpv reader: command rejected: {}", error);
                        }
                    }
                    Ok(event) => {
                        debug!("mpv reader: {:?}", event);
                        player.handle_event(event).await;
                    }
                    Err(e) => {
                        warn!("mpv reader: undecodable line '{}': {}", trimmed, e);
                    }
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                break;
            }
        }
    }
}

/// Connect to `endpoint` and run the reader in the background.
pub fn spawn(endpoint: Endpoint, player: Player) -> JoinHandle<()> {
    tokio::spawn(async move {
        match endpoint.connect().await {
            Ok(stream) => run(stream, player).await,
            Err(e) => warn!("mpv reader: connect to {} failed: {}", endpoint.address(), e),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::{Control, MpvCommand};
    use crate::player::{NoTracking, PlayerSettings};
    use async_trait::async_trait;
    use radio_proto::protocol::{PlaybackStatus, Station};
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;

    struct Accepting;

    #[async_trait]
    impl Control for Accepting {
        async fn send(&self, _command: &MpvCommand) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn player() -> Player {
        Player::new(Arc::new(Accepting), Arc::new(NoTracking), PlayerSettings::default())
    }

    #[tokio::test]
    async fn test_reader_registers_and_applies_events() {
        let player = player();
        player.toggle(&Station::new("A", "urlA")).await;

        let (client, mut server) = tokio::io::duplex(4096);
        let task = tokio::spawn(run(client, player.clone()));

        let mut registered = vec![0u8; 128];
        let mut got = String::new();
        while got.matches('\n').count() < 2 {
            let n = server.read(&mut registered).await.unwrap();
            got.push_str(std::str::from_utf8(&registered[..n]).unwrap());
        }
        assert!(got.contains("\"observe_property\",1,\"filtered-metadata\""));
        assert!(got.contains("\"observe_property\",2,\"audio-bitrate\""));

        let lines = concat!(
            "{\"data\":null,\"request_id\":0,\"error\":\"success\"}\n",
            "garbage\n",
            "\n",
            "{\"event\":\"playback-restart\"}\n",
            "{\"event\":\"property-change\",\"id\":2,\"name\":\"audio-bitrate\",\"data\":192000}\n",
            "{\"event\":\"property-change\",\"id\":1,\"name\":\"filtered-metadata\",\"data\":{\"icy-title\":\"Song\"}}\n",
        );
        server.write_all(lines.as_bytes()).await.unwrap();
        drop(server);
        task.await.unwrap();

        let info = player.snapshot().await;
        assert_eq!(info.status, PlaybackStatus::Playing);
        assert_eq!(info.bitrate, 192);
        assert_eq!(info.song, "Song");
    }

    #[tokio::test]
    async fn test_reader_survives_invalid_utf8() {
        let player = player();
        player.toggle(&Station::new("A", "urlA")).await;

        let (client, mut server) = tokio::io::duplex(4096);
        let task = tokio::spawn(run(client, player.clone()));
        server.write_all(b"\xff\xfe\n").await.unwrap();
        server
            .write_all(b"{\"event\":\"playback-restart\"}\n")
            .await
            .unwrap();
        drop(server);
        task.await.unwrap();

        assert_eq!(player.snapshot().await.status, PlaybackStatus::Playing);
    }
}
