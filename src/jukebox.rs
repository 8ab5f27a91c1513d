use crate::audio::AudioBackend;
use crate::controller::{Action, Controller, Response};
use crate::model::{Mode, PersistedState};
use crate::player::Player;
use crate::playlist::DEFAULT_PREFIX;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How far into a track `prev` restarts it instead of going back.
const RESTART_THRESHOLD: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Run,
    Quit,
}

/// The caller-side policies that sit between input and the player.
pub struct Jukebox<B> {
    player: Player<B>,
    controller: Controller,
    playlist_path: PathBuf,
}

impl<B: AudioBackend> Jukebox<B> {
    pub fn new(backend: B) -> Self {
        Self {
            player: Player::new(backend),
            controller: Controller::new(),
            playlist_path: PersistedState::default().playlist_path,
        }
    }

    pub fn player(&self) -> &Player<B> {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut Player<B> {
        &mut self.player
    }

    pub fn on_command(&mut self, raw: &str) -> bool {
        self.controller.on_command(raw)
    }

    /// Drives autoplay, then applies queued responses in order. Anything
    /// queued after a quit is discarded.
    pub fn tick(&mut self) -> RunState {
        self.player.update();
        for response in self.controller.responses() {
            if self.apply(response) == RunState::Quit {
                return RunState::Quit;
            }
        }
        RunState::Run
    }

    pub fn apply(&mut self, response: Response) -> RunState {
        match response.action {
            Action::PlayPause => self.play_pause(),
            Action::Stop => self.player.stop(),
            Action::Mute => self.toggle_mute(),
            Action::Next => self.next(),
            Action::Prev => self.prev(),
            Action::Seek => self.seek_by(response.value),
            Action::Volume => self.change_volume(response.value),
            Action::Select => {
                let index = response.value.max(0.0) as usize;
                if !self.select(index) {
                    tracing::warn!(track = index.saturating_add(1), "no such track");
                }
            }
            Action::Remove => {
                let removed = match &response.path {
                    Some(path) => self.player.pop(path),
                    None => self.player.pop_current(),
                };
                if !removed {
                    tracing::warn!(path = ?response.path, "nothing to remove");
                }
            }
            Action::MoveUp => {
                self.player.swap_behind();
            }
            Action::MoveDown => {
                self.player.swap_ahead();
            }
            Action::Clear => self.player.clear(),
            Action::Add => {
                if let Some(path) = &response.path
                    && !self.player.push(path, false)
                {
                    tracing::warn!(path = %path.display(), "nothing playable to add");
                }
            }
            Action::Save => {
                let path = response.path.as_deref().unwrap_or(&self.playlist_path);
                if let Err(err) = self.save_playlist(path) {
                    tracing::error!("failed to save playlist: {err:#}");
                }
            }
            Action::Preload => {
                let mode = if response.value != 0.0 {
                    Mode::Preload
                } else {
                    Mode::Stream
                };
                self.player.set_mode(mode);
            }
            Action::Quit => return RunState::Quit,
        }
        RunState::Run
    }

    pub fn play_pause(&mut self) {
        if self.player.playing() {
            self.player.pause();
        } else {
            self.player.play();
        }
    }

    /// Advances, wrapping to the first track from the last.
    pub fn next(&mut self) {
        if self.player.is_last_track() {
            self.player.nav_first();
        } else {
            self.player.nav_next();
        }
    }

    pub fn prev(&mut self) {
        if self.player.is_first_track() || self.player.position() > RESTART_THRESHOLD {
            self.player.seek(Duration::ZERO);
        } else {
            self.player.nav_prev();
        }
    }

    /// Seeks relative to the current position. Running past the end carries
    /// the leftover offset onto the next track, or stops on the last one.
    pub fn seek_by(&mut self, seconds: f32) {
        if !seconds.is_finite() || self.player.is_empty() {
            return;
        }

        let length = self.player.length();
        let mut target = self.player.position().as_secs_f64() + f64::from(seconds);

        if !length.is_zero() && target >= length.as_secs_f64() {
            if self.player.is_last_track() {
                self.player.stop();
                return;
            }
            self.next();
            target -= length.as_secs_f64();
        }

        self.player.seek(self.clamp_to_track(target));
    }

    /// Converts a seek target to a position within the loaded track. Targets
    /// too large for a `Duration` saturate; unknown lengths do not clamp.
    fn clamp_to_track(&self, seconds: f64) -> Duration {
        let position = Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or(Duration::MAX);
        let length = self.player.length();
        if length.is_zero() {
            position
        } else {
            position.min(length)
        }
    }

    pub fn toggle_mute(&mut self) {
        if self.player.muted() {
            self.player.unmute();
        } else {
            self.player.mute();
        }
    }

    pub fn change_volume(&mut self, delta: f32) {
        let gain = (self.player.gain() + delta).clamp(0.0, 1.0);
        self.player.set_gain(gain);
        tracing::info!(volume = volume_percent(gain), "volume changed");
    }

    /// Jumps to `index` and makes sure it is playing.
    pub fn select(&mut self, index: usize) -> bool {
        if !self.player.nav_index(index) {
            return false;
        }
        if !self.player.playing() {
            self.player.play();
        }
        true
    }

    /// Adds dropped paths, starting playback if the list was empty.
    pub fn drop_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> bool {
        let was_empty = self.player.is_empty();
        let added = self.player.add(paths);
        if added && was_empty {
            self.player.play();
        }
        added
    }

    pub fn save_playlist(&self, path: &Path) -> Result<()> {
        self.player.playlist().save(path, DEFAULT_PREFIX)
    }

    pub fn playlist_path(&self) -> &Path {
        &self.playlist_path
    }

    pub fn apply_state(&mut self, state: &PersistedState) {
        self.player.set_gain(f32::from(state.volume.min(100)) / 100.0);
        self.player.set_mode(state.mode);
        self.playlist_path = state.playlist_path.clone();
    }

    pub fn export_state(&self, state: &mut PersistedState) {
        state.volume = volume_percent(self.player.gain());
        state.mode = self.player.mode();
        state.playlist_path = self.playlist_path.clone();
    }
}

fn volume_percent(gain: f32) -> u8 {
    (gain * 100.0).round().clamp(0.0, 100.0) as u8
}
