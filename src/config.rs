use crate::model::PersistedState;
use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "jukebox";
const STATE_FILE: &str = "state.json";

pub fn config_root() -> Result<PathBuf> {
    if let Ok(override_dir) = env::var("JUKEBOX_CONFIG_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .context("neither HOME nor USERPROFILE is set")?;
    Ok(PathBuf::from(home).join(".config").join(APP_DIR))
}

pub fn state_path() -> Result<PathBuf> {
    Ok(config_root()?.join(STATE_FILE))
}

pub fn load_state() -> Result<PersistedState> {
    load_state_from(&state_path()?)
}

pub fn save_state(state: &PersistedState) -> Result<()> {
    save_state_to(&state_path()?, state)
}

/// Missing files load as defaults; malformed ones are an error.
pub fn load_state_from(path: &Path) -> Result<PersistedState> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no saved state, using defaults");
        return Ok(PersistedState::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read state file {}", path.display()))?;
    let state: PersistedState = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse state file {}", path.display()))?;
    tracing::info!(path = %path.display(), "loaded config");
    Ok(state)
}

pub fn save_state_to(path: &Path, state: &PersistedState) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(state)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "saved config");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Mode;
    use tempfile::tempdir;

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(STATE_FILE);

        let state = PersistedState {
            volume: 35,
            mode: Mode::Preload,
            playlist_path: PathBuf::from("/tmp/party.txt"),
        };
        save_state_to(&path, &state).expect("save");
        assert_eq!(load_state_from(&path).expect("load"), state);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempdir().expect("tempdir");
        let loaded = load_state_from(&dir.path().join(STATE_FILE)).expect("load");
        assert_eq!(loaded, PersistedState::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(STATE_FILE);
        fs::write(&path, r#"{ "volume": 70 }"#).expect("write");

        let loaded = load_state_from(&path).expect("load");
        assert_eq!(loaded.volume, 70);
        assert_eq!(loaded.mode, Mode::Stream);
        assert_eq!(loaded.playlist_path, PersistedState::default().playlist_path);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(STATE_FILE);
        fs::write(&path, "volume = 70").expect("write");

        assert!(load_state_from(&path).is_err());
    }
}
