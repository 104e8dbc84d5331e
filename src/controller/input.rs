//! Line command handling

use std::time::Duration;

use crate::model::Mode;

use super::AppController;

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Open(String),
    Next,
    Previous,
    Toggle,
    Stop,
    CycleMode,
    SetMode(Mode),
    VolumeUp,
    VolumeDown,
    Mute,
    SeekForward,
    SeekBackward,
    SeekTo(Duration),
    Select(usize),
    List,
    Status,
    Quit,
}

impl Command {
    /// Parses one input line. A line of only spaces toggles playback.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if !line.is_empty() && line.trim().is_empty() {
            return Some(Command::Toggle);
        }

        let mut words = line.split_whitespace();
        let head = words.next()?;
        let arg = words.next();

        let command = match (head.to_ascii_lowercase().as_str(), arg) {
            ("open" | "o", Some(locator)) => Command::Open(locator.to_string()),
            ("n" | "next", None) => Command::Next,
            ("p" | "prev", None) => Command::Previous,
            ("space" | "play" | "pause", None) => Command::Toggle,
            ("s" | "stop", None) => Command::Stop,
            ("mode", None) => Command::CycleMode,
            ("mode", Some(name)) => Command::SetMode(Mode::from_name(name)),
            ("+", None) => Command::VolumeUp,
            ("-", None) => Command::VolumeDown,
            ("m" | "mute", None) => Command::Mute,
            (">", None) => Command::SeekForward,
            ("<", None) => Command::SeekBackward,
            ("seek", Some(secs)) => Command::SeekTo(Duration::from_secs(secs.parse().ok()?)),
            ("select" | "go", Some(n)) => Command::Select(n.parse::<usize>().ok()?.checked_sub(1)?),
            ("l" | "list", None) => Command::List,
            ("status", None) => Command::Status,
            ("q" | "quit", None) => Command::Quit,
            _ => return None,
        };
        Some(command)
    }
}

impl AppController {
    /// Runs a command and returns text to show, if any. `Quit` is left to
    /// the caller.
    pub fn handle_command(&self, command: Command) -> Option<String> {
        tracing::debug!(?command, "Handling command");
        match command {
            Command::Open(locator) => self.open(&locator),
            Command::Next => self.next_track(),
            Command::Previous => self.previous_track(),
            Command::Toggle => self.toggle_playback(),
            Command::Stop => self.stop(),
            Command::CycleMode => return Some(format!("mode {}", self.cycle_mode())),
            Command::SetMode(mode) => {
                self.set_mode(mode);
                return Some(format!("mode {mode}"));
            }
            Command::VolumeUp => self.volume_up(),
            Command::VolumeDown => self.volume_down(),
            Command::Mute => self.toggle_mute(),
            Command::SeekForward => self.seek_forward(),
            Command::SeekBackward => self.seek_backward(),
            Command::SeekTo(position) => self.seek_to(position),
            Command::Select(index) => self.select_track(index),
            Command::List => return Some(self.list()),
            Command::Status => return Some(self.now_playing()),
            Command::Quit => {}
        }
        None
    }

    fn list(&self) -> String {
        let items = self.playlist.items();
        if items.is_empty() {
            return "playlist is empty".to_string();
        }
        let current = self.playlist.current_index();
        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let marker = if Some(i) == current { '>' } else { ' ' };
                if item.artist.is_empty() {
                    format!("{marker} {:>3}. {}", i + 1, item.title)
                } else {
                    format!("{marker} {:>3}. {} - {}", i + 1, item.artist, item.title)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
