use crate::audio::{AudioBackend, NullBackend, RodioBackend};
use crate::config;
use crate::jukebox::{Jukebox, RunState};
use crate::model::{Mode, PersistedState};
use anyhow::Result;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

const FRAME: Duration = Duration::from_millis(33);

#[derive(Debug, Default)]
pub struct AppOptions {
    pub preload: bool,
    pub volume: Option<u8>,
    pub save_path: Option<PathBuf>,
    pub paths: Vec<PathBuf>,
}

pub fn run(options: AppOptions) -> Result<()> {
    let mut state = config::load_state().unwrap_or_else(|err| {
        tracing::warn!("ignoring saved config: {err:#}");
        PersistedState::default()
    });
    if let Some(volume) = options.volume {
        state.volume = volume;
    }
    if options.preload {
        state.mode = Mode::Preload;
    }
    if let Some(path) = &options.save_path {
        state.playlist_path = path.clone();
    }

    let backend: Box<dyn AudioBackend> = match RodioBackend::new() {
        Ok(backend) => Box::new(backend),
        Err(err) => {
            tracing::warn!("no audio output, continuing silently: {err:#}");
            Box::new(NullBackend::new())
        }
    };
    tracing::info!(output = %backend.output_name(), "audio output ready");

    let mut jukebox = Jukebox::new(backend);
    jukebox.apply_state(&state);
    if !options.paths.is_empty() && !jukebox.drop_files(&options.paths) {
        tracing::warn!("none of the given paths held playable tracks");
    }

    let commands = spawn_stdin_reader();
    run_loop(&mut jukebox, &commands);

    let playlist_result = match &options.save_path {
        Some(_) => jukebox.save_playlist(jukebox.playlist_path()),
        None => Ok(()),
    };
    jukebox.export_state(&mut state);
    let save_result = config::save_state(&state);
    playlist_result?;
    save_result?;
    Ok(())
}

/// Ticks once per frame, feeding in stdin lines as they arrive. Returns on
/// quit, or once stdin is closed and nothing is playing anymore.
pub fn run_loop<B: AudioBackend>(
    jukebox: &mut Jukebox<B>,
    commands: &Receiver<String>,
) {
    let mut stdin_open = true;
    let mut now_playing: Option<PathBuf> = None;

    loop {
        if jukebox.tick() == RunState::Quit {
            tracing::info!("quit requested");
            return;
        }
        report_track_change(jukebox, &mut now_playing);

        if !stdin_open {
            if !jukebox.player().playing() {
                return;
            }
            thread::sleep(FRAME);
            continue;
        }

        match commands.recv_timeout(FRAME) {
            Ok(line) => {
                jukebox.on_command(&line);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                tracing::debug!("stdin closed, playing out the track list");
                stdin_open = false;
            }
        }
    }
}

fn report_track_change<B: AudioBackend>(
    jukebox: &Jukebox<B>,
    now_playing: &mut Option<PathBuf>,
) {
    let player = jukebox.player();
    let current = player.playing().then(|| player.path()).flatten();
    if current == now_playing.as_deref() {
        return;
    }

    if let Some(path) = current {
        tracing::info!(
            path = %path.display(),
            track = player.head() + 1,
            of = player.len(),
            length = ?player.length(),
            "now playing"
        );
    }
    *now_playing = current.map(|path| path.to_path_buf());
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if sender.send(line).is_err() {
                break;
            }
        }
    });
    receiver
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::test_support::ScriptedBackend;
    use crate::model::Status;

    fn jukebox_with(paths: &[&str]) -> (Jukebox<ScriptedBackend>, ScriptedBackend) {
        let backend = ScriptedBackend::default();
        let mut jukebox = Jukebox::new(backend.clone());
        jukebox.player_mut().add(paths);
        (jukebox, backend)
    }

    #[test]
    fn loop_runs_commands_until_quit() {
        let (mut jukebox, _) = jukebox_with(&["a.mp3", "b.mp3"]);
        let (sender, receiver) = mpsc::channel();
        for line in ["play", "next", "quit"] {
            sender.send(String::from(line)).expect("send");
        }

        run_loop(&mut jukebox, &receiver);
        assert_eq!(jukebox.player().head(), 1);
        assert_eq!(jukebox.player().status(), Status::Playing);
    }

    #[test]
    fn loop_ends_when_stdin_closes_and_playback_is_over() {
        let (mut jukebox, backend) = jukebox_with(&["a.mp3"]);
        jukebox.play_pause();
        backend.finish_track();
        let (sender, receiver) = mpsc::channel::<String>();
        drop(sender);

        run_loop(&mut jukebox, &receiver);
        assert_eq!(jukebox.player().status(), Status::Stopped);
    }

    #[test]
    fn unknown_commands_are_ignored() {
        let (mut jukebox, _) = jukebox_with(&["a.mp3"]);
        let (sender, receiver) = mpsc::channel();
        for line in ["shuffle please", "vol -0.5", "q"] {
            sender.send(String::from(line)).expect("send");
        }

        run_loop(&mut jukebox, &receiver);
        assert_eq!(jukebox.player().status(), Status::Idle);
        assert_eq!(jukebox.player().gain(), 0.5);
    }
}
