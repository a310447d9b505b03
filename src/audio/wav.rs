use std::io::Read;
use std::path::Path;

use anyhow::Context;

use crate::{
    composition::model::AudioSource,
    foundation::error::{ChartreelError, ChartreelResult},
};

/// Decode a WAV file into interleaved `f32` PCM.
#[tracing::instrument(fields(path = %path.display()))]
pub fn load_wav(path: &Path) -> ChartreelResult<AudioSource> {
    let reader = hound::WavReader::open(path)
        .with_context(|| format!("failed to open wav file: {}", path.display()))?;
    decode(reader)
}

/// Decode WAV bytes from any reader.
pub fn load_wav_reader<R: Read>(r: R) -> ChartreelResult<AudioSource> {
    let reader = hound::WavReader::new(r).context("failed to read wav header")?;
    decode(reader)
}

fn decode<R: Read>(mut reader: hound::WavReader<R>) -> ChartreelResult<AudioSource> {
    let spec = reader.spec();
    if spec.channels == 0 || spec.sample_rate == 0 {
        return Err(ChartreelError::validation(format!(
            "wav declares {} channel(s) at {} Hz",
            spec.channels, spec.sample_rate
        )));
    }
    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .context("failed to decode float wav samples")?,
        hound::SampleFormat::Int => {
            if !(1..=32).contains(&spec.bits_per_sample) {
                return Err(ChartreelError::validation(format!(
                    "unsupported wav bit depth {}",
                    spec.bits_per_sample
                )));
            }
            let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()
                .context("failed to decode integer wav samples")?
        }
    };
    tracing::debug!(
        channels = spec.channels,
        sample_rate = spec.sample_rate,
        samples = samples.len(),
        "wav decoded"
    );
    Ok(AudioSource::new(spec.sample_rate, spec.channels, samples))
}

#[cfg(test)]
#[path = "../../tests/unit/audio/wav.rs"]
mod tests;
