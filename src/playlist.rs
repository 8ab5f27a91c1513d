use crate::version::Version;
use anyhow::{Context, Result, bail};
use std::ffi::OsStr;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const DEFAULT_PREFIX: &str = "jukebox playlist";
pub const PLAYLIST_EXTENSION: &str = "txt";

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "ogg", "m4a", "aac", "opus"];

/// Something dropped onto the track list, classified once on the way in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Track(PathBuf),
    Playlist(PathBuf),
    Folder(PathBuf),
}

impl Entry {
    pub fn classify(path: &Path) -> Option<Self> {
        if path.as_os_str().is_empty() {
            return None;
        }
        if path.is_dir() {
            return Some(Self::Folder(path.to_path_buf()));
        }
        let extension = path.extension().and_then(OsStr::to_str)?;
        if extension.eq_ignore_ascii_case(PLAYLIST_EXTENSION) {
            Some(Self::Playlist(path.to_path_buf()))
        } else {
            Some(Self::Track(path.to_path_buf()))
        }
    }
}

/// Audio files under `root`, depth first, in file name order.
pub fn folder_tracks(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && is_audio(entry.path()))
        .map(|entry| entry.into_path())
        .collect()
}

fn is_audio(path: &Path) -> bool {
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
    AUDIO_EXTENSIONS
        .iter()
        .any(|supported| ext.eq_ignore_ascii_case(supported))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Playlist {
    pub tracks: Vec<PathBuf>,
}

impl Playlist {
    pub fn new(tracks: Vec<PathBuf>) -> Self {
        Self { tracks }
    }

    /// Reads only the header of `path` and returns the version it declares.
    pub fn check(path: &Path, prefix: &str) -> Result<Version> {
        let file = fs::File::open(path)
            .with_context(|| format!("failed to open playlist {}", path.display()))?;
        let mut header = String::new();
        BufReader::new(file)
            .read_line(&mut header)
            .with_context(|| format!("failed to read playlist {}", path.display()))?;
        let version = header_version(&header, prefix)
            .with_context(|| format!("invalid playlist header in {}", path.display()))?;
        ensure_compatible(version, Version::app())?;
        Ok(version)
    }

    pub fn valid(path: &Path, prefix: &str) -> bool {
        match Self::check(path, prefix) {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!(path = %path.display(), "not a playlist: {err:#}");
                false
            }
        }
    }

    /// Appends the tracks listed in `path`, returning how many were added.
    /// Unreadable or incompatible files add nothing.
    pub fn load(&mut self, path: &Path, prefix: &str) -> usize {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(path = %path.display(), "failed to read playlist: {err}");
                return 0;
            }
        };

        match parse(&raw, prefix) {
            Ok(tracks) => {
                let count = tracks.len();
                self.tracks.extend(tracks);
                count
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), "rejected playlist: {err:#}");
                0
            }
        }
    }

    pub fn save(&self, path: &Path, prefix: &str) -> Result<()> {
        fs::write(path, self.render(prefix, Version::app()))
            .with_context(|| format!("failed to write playlist {}", path.display()))?;
        tracing::info!(path = %path.display(), tracks = self.tracks.len(), "playlist saved");
        Ok(())
    }

    pub fn render(&self, prefix: &str, version: Version) -> String {
        let mut out = format!("# {prefix} {}\n\n", version.short());
        out.push_str("#\n");
        out.push_str("# Lines starting with # are ignored, except the first line (header)\n");
        out.push_str(&format!(
            "# Header must be in the above format ({prefix} <version>)\n"
        ));
        out.push_str("# Tracks should be absolute paths\n");
        out.push_str("#\n\n");
        for track in &self.tracks {
            out.push_str(&track.to_string_lossy());
            out.push('\n');
        }
        out
    }
}

/// Parses a whole playlist file body against the running app version.
pub fn parse(raw: &str, prefix: &str) -> Result<Vec<PathBuf>> {
    parse_for(raw, prefix, Version::app())
}

fn parse_for(raw: &str, prefix: &str, app: Version) -> Result<Vec<PathBuf>> {
    let mut lines = raw.lines();
    let header = lines.next().context("playlist is empty")?;
    ensure_compatible(header_version(header, prefix)?, app)?;

    Ok(lines
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .map(PathBuf::from)
        .collect())
}

fn ensure_compatible(version: Version, app: Version) -> Result<()> {
    if version.is_zero() || !app.compatible(&version) {
        bail!("incompatible playlist version {version} (app is {app})");
    }
    Ok(())
}

fn header_version(header: &str, prefix: &str) -> Result<Version> {
    let Some(body) = header.strip_prefix('#') else {
        bail!("header does not start with '#'");
    };
    let Some(at) = body.find(prefix) else {
        bail!("header is missing '{prefix}'");
    };
    Ok(Version::parse(&body[at + prefix.len()..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_then_load_keeps_order() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("mix.txt");
        let playlist = Playlist::new(vec![
            PathBuf::from("/music/b.flac"),
            PathBuf::from("/music/a.mp3"),
            PathBuf::from("/music/b.flac"),
        ]);
        playlist.save(&file, DEFAULT_PREFIX).expect("save");

        assert!(Playlist::valid(&file, DEFAULT_PREFIX));
        let mut loaded = Playlist::default();
        assert_eq!(loaded.load(&file, DEFAULT_PREFIX), 3);
        assert_eq!(loaded, playlist);
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let app = Version::new(1, 0, 0, 0);
        let raw = "# jukebox playlist v1.0\n\n# a comment\n/x/one.wav\n   \n/x/two.wav\n";
        let tracks = parse_for(raw, DEFAULT_PREFIX, app).expect("parse");
        assert_eq!(
            tracks,
            vec![PathBuf::from("/x/one.wav"), PathBuf::from("/x/two.wav")]
        );
    }

    #[test]
    fn newer_playlist_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("future.txt");
        fs::write(&file, "# jukebox playlist v999.0\n/x/one.wav\n").expect("write");

        assert!(!Playlist::valid(&file, DEFAULT_PREFIX));
        let mut loaded = Playlist::default();
        assert_eq!(loaded.load(&file, DEFAULT_PREFIX), 0);
        assert!(loaded.tracks.is_empty());
    }

    #[test]
    fn zero_version_and_missing_prefix_are_rejected() {
        let app = Version::new(1, 0, 0, 0);
        assert!(parse_for("# jukebox playlist v0.0\n/a.wav\n", DEFAULT_PREFIX, app).is_err());
        assert!(parse_for("# some other list v1.0\n/a.wav\n", DEFAULT_PREFIX, app).is_err());
        assert!(parse_for("jukebox playlist v1.0\n/a.wav\n", DEFAULT_PREFIX, app).is_err());
        assert!(parse_for("", DEFAULT_PREFIX, app).is_err());
    }

    #[test]
    fn custom_prefix_round_trips() {
        let app = Version::app();
        let playlist = Playlist::new(vec![PathBuf::from("/m/a.ogg")]);
        let raw = playlist.render("party set", app);
        assert!(raw.starts_with("# party set v"));
        assert_eq!(
            parse_for(&raw, "party set", app).expect("parse"),
            playlist.tracks
        );
        assert!(parse_for(&raw, DEFAULT_PREFIX, app).is_err());
    }

    #[test]
    fn classify_separates_tracks_playlists_and_folders() {
        let dir = tempdir().expect("tempdir");
        assert_eq!(
            Entry::classify(dir.path()),
            Some(Entry::Folder(dir.path().to_path_buf()))
        );
        assert_eq!(
            Entry::classify(Path::new("set.TXT")),
            Some(Entry::Playlist(PathBuf::from("set.TXT")))
        );
        assert_eq!(
            Entry::classify(Path::new("song.mp3")),
            Some(Entry::Track(PathBuf::from("song.mp3")))
        );
        assert_eq!(Entry::classify(Path::new("")), None);
        assert_eq!(Entry::classify(Path::new("README")), None);
    }

    #[test]
    fn folder_tracks_filters_and_sorts() {
        let dir = tempdir().expect("tempdir");
        let nested = dir.path().join("disc2");
        fs::create_dir_all(&nested).expect("mkdir");
        fs::write(dir.path().join("b.flac"), b"").expect("write");
        fs::write(dir.path().join("a.mp3"), b"").expect("write");
        fs::write(dir.path().join("cover.jpg"), b"").expect("write");
        fs::write(nested.join("c.wav"), b"").expect("write");

        let found = folder_tracks(dir.path());
        assert_eq!(
            found,
            vec![
                dir.path().join("a.mp3"),
                dir.path().join("b.flac"),
                nested.join("c.wav"),
            ]
        );
    }
}
