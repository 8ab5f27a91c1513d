use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::fs::File;
use std::path::Path;
use std::time::Duration;
use symphonia::core::codecs::{CodecParameters, DecoderOptions};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

/// Checks that `path` holds a decodable audio track and returns its length.
///
/// Nothing is played or buffered; this only reads enough of the container
/// to pick a codec. A length of zero means the container does not say.
pub fn track_length(path: &Path) -> Result<Duration> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let source = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(OsStr::to_str) {
        hint.with_extension(extension);
    }

    let probed = get_probe()
        .format(
            &hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .with_context(|| format!("unrecognised audio format {}", path.display()))?;

    let track = probed
        .format
        .default_track()
        .with_context(|| format!("no audio track in {}", path.display()))?;

    get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .with_context(|| format!("unsupported codec in {}", path.display()))?;

    Ok(codec_length(&track.codec_params).unwrap_or_default())
}

fn codec_length(codec_params: &CodecParameters) -> Option<Duration> {
    if let (Some(time_base), Some(frame_count)) = (codec_params.time_base, codec_params.n_frames) {
        let time = time_base.calc_time(frame_count);
        return Some(Duration::from_secs(time.seconds) + Duration::from_secs_f64(time.frac));
    }

    let (frame_count, sample_rate) = codec_params.n_frames.zip(codec_params.sample_rate)?;
    if sample_rate == 0 {
        return None;
    }
    Some(Duration::from_secs_f64(
        frame_count as f64 / f64::from(sample_rate),
    ))
}
