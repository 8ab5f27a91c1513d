#![no_main]

use anyhow::{Result, bail};
use jukebox::audio::{AudioBackend, BackendState, Pcm};
use jukebox::jukebox::Jukebox;
use jukebox::model::Mode;
use libfuzzer_sys::fuzz_target;
use std::path::Path;
use std::time::Duration;

const LENGTH: Duration = Duration::from_secs(10);

/// Accepts every path and never decodes. A track ends once it is sought
/// to its full length.
#[derive(Default)]
struct FuzzBackend {
    loaded: bool,
    state: Option<BackendState>,
    gain: f32,
    position: Duration,
}

impl AudioBackend for FuzzBackend {
    fn probe(&self, _path: &Path) -> Result<Duration> {
        Ok(LENGTH)
    }

    fn decode(&self, _path: &Path) -> Result<Pcm> {
        bail!("fuzz backend does not decode")
    }

    fn open(&mut self, _path: &Path) -> Result<()> {
        self.loaded = true;
        self.state = Some(BackendState::Paused);
        self.position = Duration::ZERO;
        Ok(())
    }

    fn preload(&mut self, _pcm: Pcm) -> Result<()> {
        bail!("fuzz backend does not preload")
    }

    fn play(&mut self) -> Result<()> {
        if !self.loaded {
            bail!("nothing loaded");
        }
        self.state = Some(BackendState::Playing);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        if !self.loaded {
            bail!("nothing loaded");
        }
        self.state = Some(BackendState::Paused);
        Ok(())
    }

    fn stop(&mut self) {
        self.loaded = false;
        self.state = None;
        self.position = Duration::ZERO;
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        self.position = position.min(LENGTH);
        Ok(())
    }

    fn gain(&self) -> f32 {
        self.gain
    }

    fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }

    fn state(&self) -> BackendState {
        if self.position >= LENGTH {
            return BackendState::Stopped;
        }
        self.state.unwrap_or(BackendState::Stopped)
    }

    fn position(&self) -> Duration {
        self.position
    }

    fn length(&self) -> Duration {
        LENGTH
    }

    fn output_name(&self) -> String {
        String::from("fuzz")
    }
}

const COMMANDS: &[&str] = &[
    "", "p", "s", "m", "n", "b", "f", "r", "+", "-", "seek 7", "seek -30", "seek 1e30",
    "vol 0.3", "goto 2", "goto 40", "up", "down", "rm", "rm track_1.mp3", "clear",
    "add track_3.mp3", "preload on", "preload off",
];

fuzz_target!(|data: &[u8]| {
    let mut jukebox = Jukebox::new(FuzzBackend::default());
    let len = (data.len() % 16).max(1);
    let paths: Vec<String> = (0..len).map(|idx| format!("track_{idx}.mp3")).collect();
    jukebox.drop_files(&paths);

    for chunk in data.chunks(2) {
        let op = chunk[0];
        let arg = usize::from(chunk.get(1).copied().unwrap_or_default());
        match op % 12 {
            0..=3 => {
                jukebox.on_command(COMMANDS[arg % COMMANDS.len()]);
            }
            4 => {
                jukebox.tick();
            }
            5 => {
                let path = format!("track_{}.mp3", arg % 20);
                jukebox.player_mut().pop(Path::new(&path));
            }
            6 => {
                jukebox
                    .player_mut()
                    .push(format!("track_{}.mp3", arg % 20), arg % 2 == 0);
            }
            7 => {
                jukebox.player_mut().swap_tracks(arg % 20, (arg / 3) % 20);
            }
            8 => {
                jukebox.select(arg % 20);
            }
            9 => {
                let mode = if arg % 2 == 0 { Mode::Preload } else { Mode::Stream };
                jukebox.player_mut().set_mode(mode);
            }
            10 => {
                let position = Duration::from_secs((arg % 12) as u64);
                jukebox.player_mut().seek(position);
            }
            _ => {
                let text = String::from_utf8_lossy(chunk);
                jukebox.on_command(&text);
            }
        }

        let player = jukebox.player();
        assert!(player.is_empty() || player.head() < player.len());
        assert!(player.gain() >= 0.0 && player.gain() <= 1.0);
    }
});
