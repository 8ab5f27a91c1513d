mod pcm;
pub mod probe;

pub use pcm::Pcm;

use anyhow::{Context, Result, anyhow, bail};
use rodio::Source;
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
#[cfg(unix)]
use std::ffi::CString;
use std::fs::File;
use std::path::Path;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendState {
    Playing,
    Paused,
    /// Nothing loaded, stopped by request, or the track ran out.
    Stopped,
}

/// Output side of the player. One track is loaded at a time; `open` and
/// `preload` replace it and leave it paused at the start.
pub trait AudioBackend {
    /// Content-level check that `path` is playable, without touching the
    /// loaded track.
    fn probe(&self, path: &Path) -> Result<Duration> {
        probe::track_length(path)
    }

    fn decode(&self, path: &Path) -> Result<Pcm> {
        Pcm::from_file(path)
    }

    fn open(&mut self, path: &Path) -> Result<()>;
    fn preload(&mut self, pcm: Pcm) -> Result<()>;
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self) -> Result<()>;
    fn stop(&mut self);
    fn seek(&mut self, position: Duration) -> Result<()>;
    fn gain(&self) -> f32;
    fn set_gain(&mut self, gain: f32);
    fn state(&self) -> BackendState;
    fn position(&self) -> Duration;
    fn length(&self) -> Duration;
    fn output_name(&self) -> String;
}

impl<B: AudioBackend + ?Sized> AudioBackend for Box<B> {
    fn probe(&self, path: &Path) -> Result<Duration> {
        (**self).probe(path)
    }

    fn decode(&self, path: &Path) -> Result<Pcm> {
        (**self).decode(path)
    }

    fn open(&mut self, path: &Path) -> Result<()> {
        (**self).open(path)
    }

    fn preload(&mut self, pcm: Pcm) -> Result<()> {
        (**self).preload(pcm)
    }

    fn play(&mut self) -> Result<()> {
        (**self).play()
    }

    fn pause(&mut self) -> Result<()> {
        (**self).pause()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        (**self).seek(position)
    }

    fn gain(&self) -> f32 {
        (**self).gain()
    }

    fn set_gain(&mut self, gain: f32) {
        (**self).set_gain(gain)
    }

    fn state(&self) -> BackendState {
        (**self).state()
    }

    fn position(&self) -> Duration {
        (**self).position()
    }

    fn length(&self) -> Duration {
        (**self).length()
    }

    fn output_name(&self) -> String {
        (**self).output_name()
    }
}

pub struct RodioBackend {
    stream: OutputStream,
    sink: Sink,
    loaded: bool,
    length: Duration,
    gain: f32,
}

impl RodioBackend {
    pub fn new() -> Result<Self> {
        let stream = Self::open_output_stream()?;
        let sink = Sink::connect_new(stream.mixer());
        sink.pause();

        Ok(Self {
            stream,
            sink,
            loaded: false,
            length: Duration::ZERO,
            gain: 1.0,
        })
    }

    fn replace_sink(&mut self) {
        self.sink.stop();
        self.sink = Sink::connect_new(self.stream.mixer());
        self.sink.pause();
        self.sink.set_volume(self.gain);
    }

    fn open_output_stream() -> Result<OutputStream> {
        let mut stream = with_silenced_stderr(|| {
            let default_err = match OutputStreamBuilder::from_default_device()
                .context("failed to open default system output stream")
                .and_then(|builder| {
                    builder
                        .with_error_callback(|_| {})
                        .open_stream_or_fallback()
                        .context("failed to start default output stream")
                }) {
                Ok(stream) => return Ok(stream),
                Err(err) => err,
            };

            let host = rodio::cpal::default_host();
            let mut candidates: Vec<String> = host
                .output_devices()
                .ok()
                .into_iter()
                .flatten()
                .filter_map(|device| device.name().ok())
                .collect();
            candidates.sort_by_cached_key(|name| {
                let lower = name.to_ascii_lowercase();
                let rank = if lower.contains("pulse") {
                    0_u8
                } else if lower.contains("pipewire") {
                    1_u8
                } else {
                    2_u8
                };
                (rank, lower)
            });
            candidates.dedup();

            for candidate in candidates {
                let Some(device) = host
                    .output_devices()
                    .ok()
                    .into_iter()
                    .flatten()
                    .find(|entry| entry.name().ok().as_deref() == Some(candidate.as_str()))
                else {
                    continue;
                };
                let opened = OutputStreamBuilder::from_device(device)
                    .context("failed to open fallback output device")
                    .and_then(|builder| {
                        builder
                            .with_error_callback(|_| {})
                            .open_stream_or_fallback()
                            .context("failed to start fallback output stream")
                    });
                if let Ok(stream) = opened {
                    tracing::debug!(device = %candidate, "using fallback output device");
                    return Ok(stream);
                }
            }

            Err(anyhow!(
                "unable to start any audio output stream after default failed: {default_err:#}"
            ))
        })?;
        stream.log_on_drop(false);
        Ok(stream)
    }
}

impl AudioBackend for RodioBackend {
    fn open(&mut self, path: &Path) -> Result<()> {
        let file =
            File::open(path).with_context(|| format!("failed to open track {}", path.display()))?;
        let source = Decoder::try_from(file)
            .with_context(|| format!("failed to decode {}", path.display()))?;
        let length = source
            .total_duration()
            .or_else(|| probe::track_length(path).ok())
            .unwrap_or_default();

        self.replace_sink();
        self.sink.append(source);
        self.length = length;
        self.loaded = true;
        Ok(())
    }

    fn preload(&mut self, pcm: Pcm) -> Result<()> {
        self.length = pcm.length();
        self.replace_sink();
        self.sink.append(pcm.into_source());
        self.loaded = true;
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        if !self.loaded {
            bail!("no track loaded");
        }
        self.sink.play();
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        if !self.loaded {
            bail!("no track loaded");
        }
        self.sink.pause();
        Ok(())
    }

    fn stop(&mut self) {
        self.sink.stop();
        self.loaded = false;
        self.length = Duration::ZERO;
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        if !self.loaded {
            bail!("no track loaded");
        }
        self.sink
            .try_seek(position)
            .map_err(|err| anyhow!("failed to seek current track: {err:?}"))
    }

    fn gain(&self) -> f32 {
        self.gain
    }

    fn set_gain(&mut self, gain: f32) {
        self.gain = gain.clamp(0.0, 1.0);
        self.sink.set_volume(self.gain);
    }

    fn state(&self) -> BackendState {
        if !self.loaded || self.sink.empty() {
            BackendState::Stopped
        } else if self.sink.is_paused() {
            BackendState::Paused
        } else {
            BackendState::Playing
        }
    }

    fn position(&self) -> Duration {
        if self.loaded {
            self.sink.get_pos()
        } else {
            Duration::ZERO
        }
    }

    fn length(&self) -> Duration {
        self.length
    }

    fn output_name(&self) -> String {
        String::from("System default output (CPAL)")
    }
}

#[cfg(unix)]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    let saved = unsafe { libc::dup(libc::STDERR_FILENO) };
    if saved < 0 {
        return operation();
    }

    let devnull = CString::new("/dev/null")
        .ok()
        .map(|path| unsafe { libc::open(path.as_ptr(), libc::O_WRONLY) })
        .unwrap_or(-1);

    if devnull >= 0 {
        unsafe {
            libc::dup2(devnull, libc::STDERR_FILENO);
            libc::close(devnull);
        }
    }

    let result = operation();

    unsafe {
        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);
    }

    result
}

#[cfg(not(unix))]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    operation()
}

/// Wall-clock stand-in for an output device. Tracks with a known length
/// "finish" once that much unpaused time has passed.
pub struct NullBackend {
    loaded: bool,
    paused: bool,
    gain: f32,
    started_at: Option<Instant>,
    position_offset: Duration,
    track_length: Option<Duration>,
}

impl NullBackend {
    pub fn new() -> Self {
        Self {
            loaded: false,
            paused: false,
            gain: 1.0,
            started_at: None,
            position_offset: Duration::ZERO,
            track_length: None,
        }
    }

    fn load(&mut self, length: Option<Duration>) {
        self.loaded = true;
        self.paused = true;
        self.started_at = None;
        self.position_offset = Duration::ZERO;
        self.track_length = length.filter(|length| !length.is_zero());
    }

    fn current_position(&self) -> Duration {
        let mut position = self.position_offset;
        if !self.paused
            && self.loaded
            && let Some(started_at) = self.started_at
        {
            position = position.saturating_add(started_at.elapsed());
        }
        if let Some(length) = self.track_length {
            return position.min(length);
        }
        position
    }

    fn finished(&self) -> bool {
        let Some(length) = self.track_length else {
            return false;
        };
        self.loaded && !self.paused && self.current_position() >= length
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for NullBackend {
    fn open(&mut self, path: &Path) -> Result<()> {
        self.load(probe::track_length(path).ok());
        Ok(())
    }

    fn preload(&mut self, pcm: Pcm) -> Result<()> {
        self.load(Some(pcm.length()));
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        if !self.loaded {
            bail!("no track loaded");
        }
        if self.paused {
            self.started_at = Some(Instant::now());
            self.paused = false;
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        if !self.loaded {
            bail!("no track loaded");
        }
        self.position_offset = self.current_position();
        self.started_at = None;
        self.paused = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.loaded = false;
        self.paused = false;
        self.started_at = None;
        self.position_offset = Duration::ZERO;
        self.track_length = None;
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        if !self.loaded {
            bail!("no track loaded");
        }

        self.position_offset = self
            .track_length
            .map_or(position, |length| position.min(length));
        self.started_at = if self.paused {
            None
        } else {
            Some(Instant::now())
        };
        Ok(())
    }

    fn gain(&self) -> f32 {
        self.gain
    }

    fn set_gain(&mut self, gain: f32) {
        self.gain = gain.clamp(0.0, 1.0);
    }

    fn state(&self) -> BackendState {
        if !self.loaded || self.finished() {
            BackendState::Stopped
        } else if self.paused {
            BackendState::Paused
        } else {
            BackendState::Playing
        }
    }

    fn position(&self) -> Duration {
        if self.loaded {
            self.current_position()
        } else {
            Duration::ZERO
        }
    }

    fn length(&self) -> Duration {
        self.track_length.unwrap_or_default()
    }

    fn output_name(&self) -> String {
        String::from("Null audio output")
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::write_test_wav;
    use super::{AudioBackend, BackendState, NullBackend};
    use std::path::Path;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn null_backend_starts_paused_after_open() {
        let mut backend = NullBackend::new();
        assert_eq!(backend.state(), BackendState::Stopped);

        backend
            .open(Path::new("nonexistent-track.flac"))
            .expect("open should still work in null mode");
        assert_eq!(backend.state(), BackendState::Paused);
        assert_eq!(backend.position(), Duration::ZERO);
    }

    #[test]
    fn null_backend_pause_and_resume_control_position_progression() {
        let mut backend = NullBackend::new();
        backend
            .open(Path::new("nonexistent-track.flac"))
            .expect("open should still work in null mode");
        backend.play().expect("play");
        thread::sleep(Duration::from_millis(20));

        backend.pause().expect("pause");
        let paused = backend.position();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(backend.position(), paused, "position should freeze while paused");

        backend.play().expect("resume");
        thread::sleep(Duration::from_millis(20));
        assert!(backend.position() > paused, "position should continue after resume");
    }

    #[test]
    fn null_backend_seek_updates_position() {
        let mut backend = NullBackend::new();
        backend
            .open(Path::new("nonexistent-track.flac"))
            .expect("open should still work in null mode");

        let target = Duration::from_secs(12);
        backend.seek(target).expect("seek should succeed");
        assert!(backend.position() >= target, "seek should move logical position");
    }

    #[test]
    fn null_backend_reports_natural_stop_when_length_elapses() {
        let dir = tempdir().expect("tempdir");
        let track = dir.path().join("fixture.wav");
        write_test_wav(&track, 80);

        let mut backend = NullBackend::new();
        backend.open(&track).expect("open");
        assert!(backend.length() >= Duration::from_millis(70));
        backend.play().expect("play");

        thread::sleep(Duration::from_millis(120));
        assert_eq!(backend.state(), BackendState::Stopped);
    }

    #[test]
    fn null_backend_unknown_length_keeps_playing() {
        let mut backend = NullBackend::new();
        backend
            .open(Path::new("nonexistent-track.flac"))
            .expect("open should still work in null mode");
        backend.play().expect("play");
        assert_eq!(backend.length(), Duration::ZERO);

        thread::sleep(Duration::from_millis(40));
        assert_eq!(backend.state(), BackendState::Playing);
    }

    #[test]
    fn null_backend_refuses_transport_without_track() {
        let mut backend = NullBackend::new();
        assert!(backend.play().is_err());
        assert!(backend.pause().is_err());
        assert!(backend.seek(Duration::from_secs(1)).is_err());
    }

    #[test]
    fn boxed_backend_forwards_gain() {
        let mut backend: Box<dyn AudioBackend> = Box::new(NullBackend::new());
        backend.set_gain(1.7);
        assert_eq!(backend.gain(), 1.0);
        backend.set_gain(0.25);
        assert_eq!(backend.gain(), 0.25);
    }
}
