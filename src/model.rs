use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Idle,
    Playing,
    Paused,
    Stopped,
}

impl Status {
    /// Legal edges of the playback state machine. `Stopped` is reachable
    /// from everywhere since `stop()` is the universal reset.
    pub fn can_become(self, next: Status) -> bool {
        match (self, next) {
            (_, Self::Stopped) => true,
            (Self::Idle, Self::Playing) => true,
            (Self::Playing, Self::Paused) => true,
            (Self::Paused, Self::Playing) => true,
            (Self::Stopped, Self::Playing) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Mode {
    #[default]
    Stream,
    Preload,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gain {
    Active(f32),
    Muted { cached: f32 },
}

impl Gain {
    pub fn is_muted(self) -> bool {
        matches!(self, Self::Muted { .. })
    }

    /// Level the user dialed in, whether or not it is currently audible.
    pub fn level(self) -> f32 {
        match self {
            Self::Active(value) | Self::Muted { cached: value } => value,
        }
    }
}

impl Default for Gain {
    fn default() -> Self {
        Self::Active(1.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedState {
    #[serde(default = "default_volume")]
    pub volume: u8,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default = "default_playlist_path")]
    pub playlist_path: PathBuf,
}

fn default_volume() -> u8 {
    100
}

fn default_playlist_path() -> PathBuf {
    PathBuf::from("jukebox_playlist.txt")
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            mode: Mode::default(),
            playlist_path: default_playlist_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_is_always_reachable() {
        for from in [Status::Idle, Status::Playing, Status::Paused, Status::Stopped] {
            assert!(from.can_become(Status::Stopped), "{from:?} -> Stopped");
        }
    }

    #[test]
    fn idle_cannot_pause() {
        assert!(!Status::Idle.can_become(Status::Paused));
        assert!(!Status::Stopped.can_become(Status::Paused));
        assert!(!Status::Playing.can_become(Status::Playing));
    }

    #[test]
    fn muted_gain_reports_cached_level() {
        let gain = Gain::Muted { cached: 0.4 };
        assert!(gain.is_muted());
        assert_eq!(gain.level(), 0.4);
        assert!(!Gain::default().is_muted());
    }

    #[test]
    fn older_state_files_fill_defaults() {
        let state: PersistedState = serde_json::from_str(r#"{"volume":35}"#).expect("parse");
        assert_eq!(state.volume, 35);
        assert_eq!(state.mode, Mode::Stream);
        assert_eq!(state.playlist_path, PathBuf::from("jukebox_playlist.txt"));
    }
}
