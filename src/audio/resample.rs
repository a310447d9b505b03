//! Band-limited sample-rate conversion.
//!
//! Windowed-sinc interpolation with a Blackman window. When downsampling the kernel cutoff drops
//! to the target Nyquist so content above it is attenuated instead of aliased.

/// Zero crossings of the sinc kernel on each side of the centre tap.
const HALF_TAPS: usize = 16;

/// Resample interleaved PCM from `from_rate` to `to_rate`.
///
/// The output holds `round(frames * to_rate / from_rate)` sample frames.
pub fn resample_interleaved(samples: &[f32], channels: u16, from_rate: u32, to_rate: u32) -> Vec<f32> {
    let channels = usize::from(channels.max(1));
    if from_rate == to_rate || from_rate == 0 || to_rate == 0 || samples.is_empty() {
        return samples.to_vec();
    }

    let in_frames = samples.len() / channels;
    let out_frames = output_frames(in_frames as u64, from_rate, to_rate) as usize;
    let step = f64::from(from_rate) / f64::from(to_rate);
    let cutoff = (f64::from(to_rate) / f64::from(from_rate)).min(1.0);
    let half_width = HALF_TAPS as f64 / cutoff;

    let mut out = Vec::with_capacity(out_frames * channels);
    let mut weights = Vec::with_capacity(2 * half_width.ceil() as usize + 2);
    for n in 0..out_frames {
        let pos = n as f64 * step;
        let first = (pos - half_width).ceil().max(0.0) as usize;
        let last = ((pos + half_width).floor() as usize).min(in_frames - 1);

        weights.clear();
        let mut sum = 0.0f64;
        for k in first..=last {
            let d = pos - k as f64;
            let w = cutoff * sinc(cutoff * d) * blackman(d / half_width);
            weights.push(w);
            sum += w;
        }
        let norm = if sum.abs() > 1e-12 { 1.0 / sum } else { 0.0 };

        for c in 0..channels {
            let mut acc = 0.0f64;
            for (j, w) in weights.iter().enumerate() {
                acc += f64::from(samples[(first + j) * channels + c]) * w;
            }
            out.push((acc * norm) as f32);
        }
    }
    out
}

/// Sample frame count after converting `frames` from `from_rate` to `to_rate`.
pub fn output_frames(frames: u64, from_rate: u32, to_rate: u32) -> u64 {
    let num = u128::from(frames) * u128::from(to_rate);
    let den = u128::from(from_rate.max(1));
    ((num + den / 2) / den) as u64
}

fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-12 {
        return 1.0;
    }
    let px = std::f64::consts::PI * x;
    px.sin() / px
}

/// Blackman window over `x` in `[-1, 1]`, zero outside.
fn blackman(x: f64) -> f64 {
    if x.abs() >= 1.0 {
        return 0.0;
    }
    let t = std::f64::consts::PI * (x + 1.0);
    0.42 - 0.5 * t.cos() + 0.08 * (2.0 * t).cos()
}

#[cfg(test)]
#[path = "../../tests/unit/audio/resample.rs"]
mod tests;
