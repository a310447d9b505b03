use image::imageops::FilterType;

use crate::{
    audio::{mix::remap_channels, resample::resample_interleaved},
    composition::model::OutputSpec,
    foundation::core::{Canvas, Fps, FrameIndex},
    foundation::error::{ChartreelError, ChartreelResult},
    render::frame::FrameRGBA,
};

/// Resample a frame to `canvas` with a bicubic (Catmull-Rom) filter.
///
/// Frames already at the target size are returned untouched.
pub fn fit_to_canvas(frame: FrameRGBA, canvas: Canvas) -> ChartreelResult<FrameRGBA> {
    frame.validate()?;
    if frame.width == canvas.width && frame.height == canvas.height {
        return Ok(frame);
    }
    if frame.width == 0 || frame.height == 0 || canvas.width == 0 || canvas.height == 0 {
        return Err(ChartreelError::evaluation(format!(
            "cannot resample a {}x{} frame to {}x{}",
            frame.width, frame.height, canvas.width, canvas.height
        )));
    }

    let premultiplied = frame.premultiplied;
    let src = image::RgbaImage::from_raw(frame.width, frame.height, frame.data)
        .ok_or_else(|| ChartreelError::evaluation("frame buffer does not match its dimensions"))?;
    let resized = image::imageops::resize(&src, canvas.width, canvas.height, FilterType::CatmullRom);
    let mut data = resized.into_raw();
    if premultiplied {
        // Bicubic overshoot can push colour above alpha.
        for px in data.chunks_exact_mut(4) {
            let a = px[3];
            px[0] = px[0].min(a);
            px[1] = px[1].min(a);
            px[2] = px[2].min(a);
        }
    }
    Ok(FrameRGBA {
        width: canvas.width,
        height: canvas.height,
        data,
        premultiplied,
    })
}

/// Maps output frames onto a generation frame rate by duplicating or dropping frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameRetimer {
    output: Fps,
    generation: Fps,
}

impl FrameRetimer {
    /// Retimer from `generation` (defaults to `output`) to `output`.
    pub fn new(output: Fps, generation: Option<Fps>) -> Self {
        Self {
            output,
            generation: generation.unwrap_or(output),
        }
    }

    /// Return `true` when content is generated at the output rate.
    pub fn is_identity(&self) -> bool {
        u64::from(self.output.num) * u64::from(self.generation.den)
            == u64::from(self.generation.num) * u64::from(self.output.den)
    }

    /// Generation frame shown at output frame `out`: the latest generated frame at or before the
    /// output timestamp.
    pub fn generation_frame(&self, out: FrameIndex) -> u64 {
        if self.is_identity() {
            return out.0;
        }
        let num = u128::from(out.0) * u128::from(self.output.den) * u128::from(self.generation.num);
        let den = u128::from(self.output.num) * u128::from(self.generation.den);
        (num / den) as u64
    }

    /// Timestamp, in seconds, at which content for output frame `out` is generated.
    pub fn generation_time(&self, out: FrameIndex) -> f64 {
        if self.is_identity() {
            return self.output.frames_to_secs(out.0);
        }
        self.generation.frames_to_secs(self.generation_frame(out))
    }
}

/// Bring mixed audio to the output format and its exact length:
/// `round(duration * sample_rate) * channels` interleaved samples.
pub fn conform_audio(
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
    output: &OutputSpec,
    duration_secs: f64,
) -> ChartreelResult<Vec<f32>> {
    if sample_rate == 0 || channels == 0 {
        return Err(ChartreelError::composition(
            "mixed audio has no sample rate or channels",
        ));
    }
    let mut samples = if channels != output.channels {
        remap_channels(&samples, channels, output.channels)
    } else {
        samples
    };
    if sample_rate != output.sample_rate {
        samples = resample_interleaved(&samples, output.channels, sample_rate, output.sample_rate);
    }
    let expected = output.sample_count(duration_secs) as usize;
    if samples.len() != expected {
        tracing::debug!(
            have = samples.len(),
            expected,
            "conforming audio length to output spec"
        );
        samples.resize(expected, 0.0);
    }
    Ok(samples)
}

#[cfg(test)]
#[path = "../../tests/unit/export/normalize.rs"]
mod tests;
