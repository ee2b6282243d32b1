mod console;

use std::sync::{Arc, RwLock};

use radio_engine::{Engine, NoTracking, PlayTracker, PlaybackInfo};
use radio_proto::config::Config;
use radio_proto::favorites::Favorites;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Clone)]
pub enum ConsoleMessage {
    Log(String),
}

/// Hands warnings and errors to the printer task so they interleave with
/// the status lines on the terminal.
struct ConsoleLayer {
    sender: broadcast::Sender<ConsoleMessage>,
}

impl ConsoleLayer {
    fn new(sender: broadcast::Sender<ConsoleMessage>) -> Self {
        Self { sender }
    }
}

impl<S> tracing_subscriber::Layer<S> for ConsoleLayer
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let level = *event.metadata().level();
        if level > tracing::Level::WARN {
            return;
        }

        let mut line = format!("{} [{}] ", chrono::Local::now().format("%H:%M:%S"), level);
        event.record(&mut LineVisitor(&mut line));

        // Before the printer starts there is nobody to tell.
        let _ = self.sender.send(ConsoleMessage::Log(line));
    }
}

/// Message first, then `key=value` for every other field.
struct LineVisitor<'a>(&'a mut String);

impl tracing::field::Visit for LineVisitor<'_> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        match field.name() {
            "message" => self.0.push_str(&format!("{:?}", value)),
            name => self.0.push_str(&format!(" {}={:?}", name, value)),
        }
    }
}

/// Print snapshots and forwarded warnings until both channels close.
async fn print_updates(
    mut snapshots: broadcast::Receiver<PlaybackInfo>,
    mut logs: broadcast::Receiver<ConsoleMessage>,
) {
    let mut last = String::new();
    loop {
        tokio::select! {
            snapshot = snapshots.recv() => match snapshot {
                Ok(info) => {
                    let line = console::render(&info);
                    if line != last {
                        println!("{}", line);
                        last = line;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
            log = logs.recv() => match log {
                Ok(ConsoleMessage::Log(line)) => eprintln!("{}", line),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (console_tx, console_rx) = broadcast::channel::<ConsoleMessage>(100);

    // File logging + console layer
    let data_dir = radio_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("daemon.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(ConsoleLayer::new(console_tx.clone()))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,radio_engine=debug,radiod=debug")
            }),
        )
        .init();

    info!("Log file: {:?}", log_path);

    let config = Config::load()?;
    info!("Config loaded from: {:?}", Config::config_path());

    let catalog = radio_proto::stations::load_stations(&config.stations).await;
    info!("{} stations", catalog.len());
    let view = Arc::new(RwLock::new(catalog.clone()));

    let favorites = if config.favorites.enabled {
        Some(Arc::new(Favorites::load(&config.favorites.favorites_file).await))
    } else {
        None
    };
    let tracker: Arc<dyn PlayTracker> = match &favorites {
        Some(favs) => favs.clone(),
        None => Arc::new(NoTracking),
    };

    let engine = match Engine::launch(&config, view.clone(), tracker).await {
        Ok(engine) => engine,
        Err(e) => {
            error!("startup failed: {}", e);
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let printer = tokio::spawn(print_updates(engine.subscribe(), console_rx));

    let session = console::Session::new(catalog, view, favorites);
    println!("{}", console::HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match console::parse(&line) {
            Ok(command) => {
                if !session.execute(&engine, command).await {
                    break;
                }
            }
            Err(msg) if msg.is_empty() => {}
            Err(msg) => println!("{}", msg),
        }
    }

    engine.quit().await;
    printer.abort();
    info!("bye");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_layer_forwards_warnings_only() {
        let (tx, mut rx) = broadcast::channel(8);
        let subscriber = tracing_subscriber::registry().with(ConsoleLayer::new(tx));
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("quiet");
            tracing::warn!(url = "urlA", "stream died");
        });

        let ConsoleMessage::Log(line) = rx.try_recv().unwrap();
        assert!(line.contains("[WARN] stream died"), "{}", line);
        assert!(line.contains(" url=\"urlA\""), "{}", line);
        assert!(rx.try_recv().is_err());
    }
}
