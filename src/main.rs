use jukebox::app::AppOptions;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct CliArgs {
    verbose: bool,
    options: AppOptions,
}

fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1).collect())?;
    init_tracing(args.verbose);
    jukebox::app::run(args.options)
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--preload" => out.options.preload = true,
            "-v" | "--verbose" => out.verbose = true,
            "--volume" => {
                index += 1;
                let Some(value) = args.get(index) else {
                    anyhow::bail!("--volume requires a value from 0 to 100");
                };
                let volume: u8 = value
                    .trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("--volume must be 0-100, got {value}"))?;
                if volume > 100 {
                    anyhow::bail!("--volume must be 0-100, got {volume}");
                }
                out.options.volume = Some(volume);
            }
            "--save" => {
                index += 1;
                let Some(value) = args.get(index) else {
                    anyhow::bail!("--save requires a playlist path");
                };
                if value.trim().is_empty() {
                    anyhow::bail!("--save cannot be empty");
                }
                out.options.save_path = Some(PathBuf::from(value.trim()));
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other if other.starts_with("--") => anyhow::bail!("unknown argument {other}"),
            path => out.options.paths.push(PathBuf::from(path)),
        }
        index += 1;
    }
    Ok(out)
}

fn print_help() {
    println!("Jukebox {}", jukebox::version::Version::app());
    println!("usage: jukebox [OPTIONS] [PATH...]");
    println!("  PATH              Track, playlist (.txt), or folder to queue");
    println!("  --preload         Decode whole tracks into memory before playing");
    println!("  --volume 0-100    Starting volume");
    println!("  --save PATH       Playlist file for `save`, also written on exit");
    println!("  -v, --verbose     Debug logging (RUST_LOG overrides)");
    println!();
    println!("commands on stdin: play|p  stop|s  mute|m  next|n  prev|b");
    println!("                   seek <secs>  f  r  vol <delta>  +  -  quit|q");
    println!("                   goto <n>  up  down  rm [path]  add <path>  clear");
    println!("                   save [path]  preload on|off");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn parses_flags_and_paths() {
        let parsed = parse_args(args(&[
            "--preload",
            "--volume",
            "35",
            "song.mp3",
            "--save",
            "out.txt",
            "-v",
            "mix.txt",
        ]))
        .expect("parse");

        assert!(parsed.verbose);
        assert!(parsed.options.preload);
        assert_eq!(parsed.options.volume, Some(35));
        assert_eq!(parsed.options.save_path, Some(PathBuf::from("out.txt")));
        assert_eq!(
            parsed.options.paths,
            vec![PathBuf::from("song.mp3"), PathBuf::from("mix.txt")]
        );
    }

    #[test]
    fn rejects_bad_volume_and_unknown_flags() {
        assert!(parse_args(args(&["--volume", "101"])).is_err());
        assert!(parse_args(args(&["--volume", "loud"])).is_err());
        assert!(parse_args(args(&["--volume"])).is_err());
        assert!(parse_args(args(&["--shuffle"])).is_err());
        assert!(parse_args(args(&["--save", " "])).is_err());
    }
}
