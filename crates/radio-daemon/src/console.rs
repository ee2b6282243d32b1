//! Line-oriented front end: parses stdin commands and drives the engine.
use std::sync::{Arc, Mutex, RwLock};

use radio_engine::{Engine, PlaybackInfo, Station};
use radio_proto::favorites::Favorites;
use radio_proto::stations;

pub const FAVORITES_TAG: &str = "favorites";

pub const HELP: &str = "\
commands:
  list                 stations in the current view
  play N | toggle N    toggle station N of the view (same station stops)
  random | r           random station from the view
  stop | s             stop playback
  up | +               volume up
  down | -             volume down
  shuffle | x          toggle timed shuffle
  interval N           shuffle interval, 1-9 minutes
  tag [NAME]           restrict the view to a tag (no name: all stations)
  tags                 list tags
  favorites            view most played stations
  status               current playback
  help | ?             this text
  quit | q             stop mpv and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Toggle(usize),
    Random,
    Stop,
    VolumeUp,
    VolumeDown,
    Shuffle,
    Interval(u8),
    Tag(Option<String>),
    Tags,
    Favorites,
    Status,
    Help,
    Quit,
}

pub fn parse(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err(String::new());
    };
    let arg = words.next();

    let number = |what: &str| -> Result<usize, String> {
        arg.ok_or_else(|| format!("{} needs a number", what))?
            .parse::<usize>()
            .map_err(|_| format!("not a number: {}", arg.unwrap_or_default()))
    };

    match verb.to_ascii_lowercase().as_str() {
        "list" | "ls" | "l" => Ok(Command::List),
        "play" | "toggle" | "p" => Ok(Command::Toggle(number("play")?)),
        "random" | "r" => Ok(Command::Random),
        "stop" | "s" => Ok(Command::Stop),
        "up" | "+" => Ok(Command::VolumeUp),
        "down" | "dn" | "-" => Ok(Command::VolumeDown),
        "shuffle" | "x" => Ok(Command::Shuffle),
        "interval" | "i" => {
            let minutes = number("interval")?;
            u8::try_from(minutes)
                .map(Command::Interval)
                .map_err(|_| format!("interval out of range: {}", minutes))
        }
        "tag" | "t" => Ok(Command::Tag(arg.map(str::to_string))),
        "tags" => Ok(Command::Tags),
        "favorites" | "fav" | "f" => Ok(Command::Favorites),
        "status" | "st" => Ok(Command::Status),
        "help" | "?" | "h" => Ok(Command::Help),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        // A bare number toggles that station.
        other => other
            .parse::<usize>()
            .map(Command::Toggle)
            .map_err(|_| format!("unknown command: {} (try help)", other)),
    }
}

/// One-line rendering of a snapshot.
pub fn render(info: &PlaybackInfo) -> String {
    let mut line = info.headline();
    if line.is_empty() {
        line = "Idle".to_string();
    }
    line.push_str(&format!(" | vol {}%", info.volume));
    if info.bitrate > 0 {
        line.push_str(&format!(" | {} kbps", info.bitrate));
    }
    line
}

pub fn render_list(view: &[Station], playing_url: &str) -> String {
    view.iter()
        .enumerate()
        .map(|(i, s)| {
            let marker = if !playing_url.is_empty() && s.url == playing_url {
                '>'
            } else {
                ' '
            };
            format!("{} {:>3}. {}", marker, i + 1, s.title)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ── session ───────────────────────────────────────────────────────────────────

/// Front-end state: the full catalog and the view random picks draw from.
pub struct Session {
    catalog: Vec<Station>,
    view: Arc<RwLock<Vec<Station>>>,
    favorites: Option<Arc<Favorites>>,
    /// Tag behind the current view; `None` is the whole catalog.
    selected: Mutex<Option<String>>,
}

impl Session {
    pub fn new(
        catalog: Vec<Station>,
        view: Arc<RwLock<Vec<Station>>>,
        favorites: Option<Arc<Favorites>>,
    ) -> Self {
        Self {
            catalog,
            view,
            favorites,
            selected: Mutex::new(None),
        }
    }

    pub fn view(&self) -> Vec<Station> {
        match self.view.read() {
            Ok(list) => list.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set_view(&self, stations: Vec<Station>) {
        match self.view.write() {
            Ok(mut list) => *list = stations,
            Err(poisoned) => *poisoned.into_inner() = stations,
        }
    }

    /// Narrow the view to `tag` (or the favorites list); `None` resets it.
    /// Returns the new view size, or an error when nothing matches.
    pub fn select_tag(&self, tag: Option<&str>) -> Result<usize, String> {
        let stations = match tag {
            None => self.catalog.clone(),
            Some(t) if t.eq_ignore_ascii_case(FAVORITES_TAG) => match &self.favorites {
                Some(favs) => favs.favorite_stations(&self.catalog),
                None => return Err("favorites are disabled".to_string()),
            },
            Some(t) => stations::stations_with_tag(&self.catalog, t),
        };
        if stations.is_empty() {
            return Err(format!("no stations tagged {}", tag.unwrap_or_default()));
        }
        let n = stations.len();
        self.set_view(stations);
        *self.selected.lock().unwrap_or_else(|p| p.into_inner()) = tag.map(str::to_string);
        Ok(n)
    }

    fn favorites_selected(&self) -> bool {
        self.selected
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case(FAVORITES_TAG))
    }

    /// Re-rank the favorites view after a play changed the counts.
    pub fn refresh_favorites(&self) {
        if !self.favorites_selected() {
            return;
        }
        if let Some(favs) = &self.favorites {
            let stations = favs.favorite_stations(&self.catalog);
            if !stations.is_empty() {
                self.set_view(stations);
            }
        }
    }

    pub fn tags(&self) -> Vec<String> {
        stations::tags(&self.catalog)
    }

    /// Run one command.  Returns false when the session should end.
    pub async fn execute(&self, engine: &Engine, command: Command) -> bool {
        match command {
            Command::List => {
                let playing = engine.snapshot().await.url;
                println!("{}", render_list(&self.view(), &playing));
            }
            Command::Toggle(n) => match n.checked_sub(1).and_then(|i| self.view().get(i).cloned()) {
                Some(station) => {
                    engine.toggle(&station).await;
                    self.refresh_favorites();
                }
                None => println!("no station {}", n),
            },
            Command::Random => {
                if engine.random().await.is_none() {
                    println!("no stations in view");
                }
                self.refresh_favorites();
            }
            Command::Stop => engine.stop().await,
            Command::VolumeUp => engine.volume_up().await,
            Command::VolumeDown => engine.volume_dn().await,
            Command::Shuffle => {
                let on = engine.toggle_shuffle().await;
                println!("shuffle {}", if on { "on" } else { "off" });
            }
            Command::Interval(minutes) => match engine.set_shuffle_interval(minutes) {
                Ok(()) => println!("shuffle interval {} min", minutes),
                Err(e) => println!("{}", e),
            },
            Command::Tag(tag) => match self.select_tag(tag.as_deref()) {
                Ok(n) => println!("{} stations in view", n),
                Err(e) => println!("{}", e),
            },
            Command::Tags => println!("{}", self.tags().join(", ")),
            Command::Favorites => match self.select_tag(Some(FAVORITES_TAG)) {
                Ok(_) => {
                    let playing = engine.snapshot().await.url;
                    println!("{}", render_list(&self.view(), &playing));
                }
                Err(e) => println!("{}", e),
            },
            Command::Status => {
                println!("{}", render(&engine.snapshot().await));
                let shuffle = engine.shuffler().status();
                if shuffle.active {
                    println!("shuffle {}", shuffle.countdown());
                }
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => return false,
        }
        true
    }
}
