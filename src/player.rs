use crate::audio::{AudioBackend, BackendState};
use crate::model::{Gain, Mode, Status};
use crate::playlist::{self, DEFAULT_PREFIX, Entry, Playlist};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Nesting limit for playlists that list other playlists.
const MAX_PLAYLIST_DEPTH: usize = 8;

/// Track list, head, and playback state on top of an [`AudioBackend`].
///
/// Every track-list mutation reports its outcome as a `bool`; backend
/// failures are logged and simply leave the status where it was.
pub struct Player<B> {
    backend: B,
    tracks: Vec<PathBuf>,
    head: usize,
    status: Status,
    gain: Gain,
    mode: Mode,
}

impl<B: AudioBackend> Player<B> {
    pub fn new(backend: B) -> Self {
        let gain = Gain::Active(backend.gain());
        Self {
            backend,
            tracks: Vec::new(),
            head: 0,
            status: Status::Idle,
            gain,
            mode: Mode::Stream,
        }
    }

    /// Appends every playable track reachable from `paths`. Playlist files
    /// and folders are flattened in place.
    pub fn add<P: AsRef<Path>>(&mut self, paths: &[P]) -> bool {
        let mut visiting = HashSet::new();
        let mut added = 0;
        for path in paths {
            added += self.ingest(path.as_ref(), &mut visiting, 0);
        }
        added > 0
    }

    pub fn push(&mut self, path: impl AsRef<Path>, autoplay: bool) -> bool {
        let added = self.ingest(path.as_ref(), &mut HashSet::new(), 0);
        if added > 0 && autoplay {
            self.head = self.tracks.len() - 1;
            self.open(true);
        }
        added > 0
    }

    /// Removes the first entry equal to `path`.
    pub fn pop(&mut self, path: &Path) -> bool {
        match self.tracks.iter().position(|track| track == path) {
            Some(index) => self.remove_at(index),
            None => false,
        }
    }

    pub fn pop_current(&mut self) -> bool {
        if self.tracks.is_empty() {
            return false;
        }
        self.remove_at(self.head)
    }

    /// Stops and reloads the head track, starting it if `autoplay`.
    pub fn open(&mut self, autoplay: bool) -> bool {
        if self.tracks.is_empty() {
            return false;
        }
        self.stop();
        if autoplay {
            self.play();
            self.playing()
        } else {
            self.open_current()
        }
    }

    pub fn clear(&mut self) {
        self.stop();
        self.tracks.clear();
        self.head = 0;
        tracing::info!("track list cleared");
    }

    pub fn play(&mut self) {
        if self.tracks.is_empty() || self.playing() {
            return;
        }

        if self.status != Status::Paused {
            let ready = match self.mode {
                Mode::Stream => self.open_current(),
                Mode::Preload => self.preload_current(),
            };
            if !ready {
                return;
            }
        }

        self.start_output();
    }

    pub fn pause(&mut self) {
        if !self.playing() {
            return;
        }
        match self.backend.pause() {
            Ok(()) => self.transition(Status::Paused),
            Err(err) => tracing::warn!("backend refused to pause: {err:#}"),
        }
    }

    pub fn stop(&mut self) {
        self.backend.stop();
        self.transition(Status::Stopped);
    }

    pub fn seek(&mut self, position: Duration) {
        if let Err(err) = self.backend.seek(position) {
            tracing::debug!(?position, "seek ignored: {err:#}");
        }
    }

    /// Sets the output gain, clamped to `0..=1`. Negative and NaN values are
    /// ignored. Leaves the muted state.
    pub fn set_gain(&mut self, value: f32) {
        if !(value >= 0.0) {
            return;
        }
        let value = value.min(1.0);
        self.backend.set_gain(value);
        self.gain = Gain::Active(value);
    }

    pub fn gain(&self) -> f32 {
        if self.gain.is_muted() {
            self.gain.level()
        } else {
            self.backend.gain()
        }
    }

    pub fn mute(&mut self) {
        if let Gain::Active(_) = self.gain {
            let cached = self.backend.gain();
            self.backend.set_gain(0.0);
            self.gain = Gain::Muted { cached };
            tracing::info!("muted");
        }
    }

    pub fn unmute(&mut self) {
        if let Gain::Muted { cached } = self.gain {
            self.backend.set_gain(cached);
            self.gain = Gain::Active(cached);
            tracing::info!("unmuted");
        }
    }

    pub fn muted(&self) -> bool {
        self.gain.is_muted()
    }

    /// Switches between streaming and preloading. A loaded track is reopened
    /// in the new mode at the same position and play/pause state.
    pub fn set_mode(&mut self, mode: Mode) {
        if self.mode == mode {
            return;
        }
        self.mode = mode;
        tracing::info!(?mode, "playback mode changed");

        if self.tracks.is_empty() || !matches!(self.status, Status::Playing | Status::Paused) {
            return;
        }

        let position = self.backend.position();
        let was_paused = self.status == Status::Paused;
        self.stop();
        self.play();
        if self.playing() {
            self.seek(position);
            if was_paused {
                self.pause();
            }
        }
    }

    /// Per-frame autoplay driver: advances when the backend ran out of track.
    pub fn update(&mut self) {
        if !self.playing() || self.backend.state() != BackendState::Stopped {
            return;
        }

        if self.is_last_track() {
            tracing::info!("reached end of track list");
            self.transition(Status::Stopped);
            return;
        }

        if let Some(next) = self.tracks.get(self.head + 1) {
            tracing::info!(path = %next.display(), "autoplaying next track");
        }
        self.nav_next();
    }

    pub fn nav_first(&mut self) -> bool {
        self.nav_index(0)
    }

    pub fn nav_last(&mut self) -> bool {
        match self.tracks.len().checked_sub(1) {
            Some(last) => self.nav_index(last),
            None => {
                self.head = 0;
                false
            }
        }
    }

    pub fn nav_next(&mut self) -> bool {
        if self.is_last_track() {
            return false;
        }
        self.nav_index(self.head + 1)
    }

    pub fn nav_prev(&mut self) -> bool {
        match self.head.checked_sub(1) {
            Some(prev) => self.nav_index(prev),
            None => false,
        }
    }

    /// Moves head to `index` and reloads, playing only if we were playing.
    pub fn nav_index(&mut self, index: usize) -> bool {
        if index >= self.tracks.len() {
            return false;
        }
        let replay = self.playing();
        self.head = index;
        self.open(replay);
        true
    }

    /// Exchanges two entries. Head keeps pointing at the same track.
    pub fn swap_tracks(&mut self, lhs: usize, rhs: usize) -> bool {
        let len = self.tracks.len();
        if lhs >= len || rhs >= len {
            return false;
        }

        if self.head == lhs {
            self.head = rhs;
        } else if self.head == rhs {
            self.head = lhs;
        }
        self.tracks.swap(lhs, rhs);
        tracing::debug!(lhs, rhs, "swapped tracks");
        true
    }

    pub fn swap_head(&mut self, target: usize) -> bool {
        self.swap_tracks(self.head, target)
    }

    pub fn swap_ahead(&mut self) -> bool {
        self.swap_head(self.head + 1)
    }

    pub fn swap_behind(&mut self) -> bool {
        match self.head.checked_sub(1) {
            Some(target) => self.swap_head(target),
            None => false,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn tracks(&self) -> &[PathBuf] {
        &self.tracks
    }

    pub fn playlist(&self) -> Playlist {
        Playlist::new(self.tracks.clone())
    }

    pub fn head(&self) -> usize {
        self.head
    }

    pub fn path(&self) -> Option<&Path> {
        self.tracks.get(self.head).map(PathBuf::as_path)
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_first_track(&self) -> bool {
        !self.tracks.is_empty() && self.head == 0
    }

    /// True on the final entry, and vacuously true for an empty list.
    pub fn is_last_track(&self) -> bool {
        self.head + 1 >= self.tracks.len()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn playing(&self) -> bool {
        self.status == Status::Playing
    }

    pub fn position(&self) -> Duration {
        self.backend.position()
    }

    pub fn length(&self) -> Duration {
        self.backend.length()
    }

    fn remove_at(&mut self, index: usize) -> bool {
        let replay = self.playing();
        let removed = if index == self.head {
            self.stop();
            let removed = self.tracks.remove(index);
            self.head = self.head.min(self.tracks.len().saturating_sub(1));
            if !self.tracks.is_empty() {
                self.open(replay);
            }
            removed
        } else {
            let removed = self.tracks.remove(index);
            if index < self.head {
                self.head -= 1;
            }
            removed
        };
        tracing::info!(path = %removed.display(), "removed track");
        true
    }

    fn ingest(&mut self, path: &Path, visiting: &mut HashSet<PathBuf>, depth: usize) -> usize {
        let Some(entry) = Entry::classify(path) else {
            tracing::debug!(path = %path.display(), "skipped unrecognised path");
            return 0;
        };

        match entry {
            Entry::Track(track) => self.append_track(track),
            Entry::Folder(root) => playlist::folder_tracks(&root)
                .into_iter()
                .map(|track| self.append_track(track))
                .sum::<usize>(),
            Entry::Playlist(file) => self.ingest_playlist(&file, visiting, depth),
        }
    }

    fn ingest_playlist(
        &mut self,
        file: &Path,
        visiting: &mut HashSet<PathBuf>,
        depth: usize,
    ) -> usize {
        if depth >= MAX_PLAYLIST_DEPTH {
            tracing::warn!(path = %file.display(), "playlist nesting too deep, skipped");
            return 0;
        }
        let key = file.canonicalize().unwrap_or_else(|_| file.to_path_buf());
        if !visiting.insert(key.clone()) {
            tracing::warn!(path = %file.display(), "playlist includes itself, skipped");
            return 0;
        }

        let mut list = Playlist::default();
        let loaded = list.load(file, DEFAULT_PREFIX);
        if loaded > 0 {
            tracing::debug!(path = %file.display(), loaded, "loaded tracks from playlist");
        }
        let added = list
            .tracks
            .iter()
            .map(|track| self.ingest(track, visiting, depth + 1))
            .sum();

        visiting.remove(&key);
        added
    }

    fn append_track(&mut self, path: PathBuf) -> usize {
        match self.backend.probe(&path) {
            Ok(length) => {
                tracing::info!(path = %path.display(), ?length, "added track");
                self.tracks.push(path);
                1
            }
            Err(err) => {
                tracing::info!(path = %path.display(), "skipped: {err:#}");
                0
            }
        }
    }

    fn open_current(&mut self) -> bool {
        let Some(path) = self.tracks.get(self.head).cloned() else {
            return false;
        };
        match self.backend.open(&path) {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(path = %path.display(), "failed to open: {err:#}");
                false
            }
        }
    }

    /// Decodes the head track into memory. On failure falls back to
    /// streaming and starts output itself, so callers must not.
    fn preload_current(&mut self) -> bool {
        let Some(path) = self.tracks.get(self.head).cloned() else {
            return false;
        };

        let loaded = self
            .backend
            .decode(&path)
            .and_then(|pcm| self.backend.preload(pcm));
        match loaded {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "preloaded track");
                true
            }
            Err(err) => {
                tracing::error!(
                    path = %path.display(),
                    "failed to preload, falling back to streaming: {err:#}"
                );
                self.mode = Mode::Stream;
                if self.open_current() {
                    self.start_output();
                }
                false
            }
        }
    }

    fn start_output(&mut self) {
        match self.backend.play() {
            Ok(()) => self.transition(Status::Playing),
            Err(err) => tracing::warn!("backend refused to play: {err:#}"),
        }
    }

    fn transition(&mut self, next: Status) {
        debug_assert!(
            self.status.can_become(next),
            "illegal playback transition {:?} -> {next:?}",
            self.status
        );
        tracing::trace!(from = ?self.status, to = ?next, "status");
        self.status = next;
    }
}
