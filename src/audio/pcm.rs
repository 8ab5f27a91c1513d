use anyhow::{Context, Result, bail};
use rodio::buffer::SamplesBuffer;
use rodio::{Decoder, Source};
use std::fs::File;
use std::path::Path;
use std::time::Duration;

/// A track decoded entirely into memory, ready to hand to a backend.
pub struct Pcm {
    samples: SamplesBuffer,
    length: Duration,
}

impl Pcm {
    pub fn from_file(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("failed to open track {}", path.display()))?;
        let source = Decoder::try_from(file)
            .with_context(|| format!("failed to decode {}", path.display()))?;

        let channels = source.channels();
        let sample_rate = source.sample_rate();
        let data: Vec<_> = source.collect();
        if data.is_empty() {
            bail!("no samples decoded from {}", path.display());
        }

        let samples = SamplesBuffer::new(channels, sample_rate, data);
        let length = samples.total_duration().unwrap_or_default();
        Ok(Self { samples, length })
    }

    pub fn length(&self) -> Duration {
        self.length
    }

    pub fn into_source(self) -> SamplesBuffer {
        self.samples
    }
}
