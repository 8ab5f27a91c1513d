use std::collections::VecDeque;
use std::path::PathBuf;

/// Responses beyond this many per tick are dropped.
pub const QUEUE_CAPACITY: usize = 4;

const SEEK_STEP: f32 = 5.0;
const VOLUME_STEP: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    PlayPause,
    Stop,
    Mute,
    Next,
    Prev,
    Seek,
    Volume,
    /// Jump to the zero-based index in `value` and play it.
    Select,
    /// Remove `path`, or the head track when there is none.
    Remove,
    MoveUp,
    MoveDown,
    Clear,
    Add,
    /// Write the track list to `path`, or to the configured playlist file.
    Save,
    /// Preload when `value` is non-zero, stream otherwise.
    Preload,
    Quit,
}

/// A high-level request for the jukebox. `value` carries the seek offset in
/// seconds, the volume delta, or a track index; `path` carries the file for
/// track-list edits. Other actions ignore both.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub action: Action,
    pub value: f32,
    pub path: Option<PathBuf>,
}

impl Response {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            value: 0.0,
            path: None,
        }
    }

    pub fn with_value(action: Action, value: f32) -> Self {
        Self {
            value,
            ..Self::new(action)
        }
    }

    pub fn with_path(action: Action, path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::new(action)
        }
    }
}

#[derive(Debug, Default)]
pub struct Controller {
    queue: VecDeque<Response>,
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `response` unless the queue is already full.
    pub fn push(&mut self, response: Response) -> bool {
        if self.queue.len() >= QUEUE_CAPACITY {
            tracing::debug!(?response, "controller queue full, dropped");
            return false;
        }
        self.queue.push_back(response);
        true
    }

    /// Parses one line of the command language and queues the result.
    pub fn on_command(&mut self, raw: &str) -> bool {
        match parse_command(raw) {
            Some(response) => self.push(response),
            None => {
                tracing::warn!(command = raw.trim(), "unknown command");
                false
            }
        }
    }

    /// Drains everything queued since the last call, oldest first.
    pub fn responses(&mut self) -> Vec<Response> {
        self.queue.drain(..).collect()
    }
}

pub fn parse_command(raw: &str) -> Option<Response> {
    let input = raw.trim();
    let mut split = input.splitn(2, char::is_whitespace);
    let command = split.next().unwrap_or_default();
    let rest = split.next().unwrap_or("").trim();

    let response = match command {
        "" | "p" | "play" => Response::new(Action::PlayPause),
        "s" | "stop" => Response::new(Action::Stop),
        "m" | "mute" => Response::new(Action::Mute),
        "n" | "next" => Response::new(Action::Next),
        "b" | "prev" => Response::new(Action::Prev),
        "q" | "quit" => Response::new(Action::Quit),
        "f" => Response::with_value(Action::Seek, SEEK_STEP),
        "r" => Response::with_value(Action::Seek, -SEEK_STEP),
        "+" => Response::with_value(Action::Volume, VOLUME_STEP),
        "-" => Response::with_value(Action::Volume, -VOLUME_STEP),
        "seek" => Response::with_value(Action::Seek, parse_value(rest)?),
        "vol" => Response::with_value(Action::Volume, parse_value(rest)?),
        "goto" => Response::with_value(Action::Select, parse_track_number(rest)?),
        "up" => Response::new(Action::MoveUp),
        "down" => Response::new(Action::MoveDown),
        "clear" => Response::new(Action::Clear),
        "rm" if rest.is_empty() => Response::new(Action::Remove),
        "rm" => Response::with_path(Action::Remove, rest),
        "add" if rest.is_empty() => return None,
        "add" => Response::with_path(Action::Add, rest),
        "save" if rest.is_empty() => Response::new(Action::Save),
        "save" => Response::with_path(Action::Save, rest),
        "preload" => match rest {
            "on" => Response::with_value(Action::Preload, 1.0),
            "off" => Response::with_value(Action::Preload, 0.0),
            _ => return None,
        },
        _ => return None,
    };
    Some(response)
}

fn parse_value(raw: &str) -> Option<f32> {
    raw.parse::<f32>().ok().filter(|value| value.is_finite())
}

/// One-based track numbers as shown in "now playing", stored zero-based.
fn parse_track_number(raw: &str) -> Option<f32> {
    let number = raw.parse::<u32>().ok()?.checked_sub(1)?;
    Some(number as f32)
}
