use crate::foundation::{
    error::{ChartreelError, ChartreelResult},
    math::{db_to_gain, gain_to_db},
};

/// One stage of a track's effects chain.
///
/// Stages are pure functions over an interleaved buffer and run in declared order.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectStage {
    /// Downward expander: attenuates passages whose level stays under `threshold_db`.
    NoiseReduction {
        /// Level under which the signal counts as noise.
        #[serde(default = "default_noise_threshold_db")]
        threshold_db: f32,
        /// Attenuation applied to noise, in dB (positive).
        #[serde(default = "default_noise_reduction_db")]
        reduction_db: f32,
    },
    /// Feed-forward peak compressor.
    Compression {
        /// Level above which gain reduction starts.
        #[serde(default = "default_comp_threshold_db")]
        threshold_db: f32,
        /// Input/output slope above threshold, `>= 1`.
        #[serde(default = "default_comp_ratio")]
        ratio: f32,
        /// Envelope attack in milliseconds.
        #[serde(default = "default_comp_attack_ms")]
        attack_ms: f32,
        /// Envelope release in milliseconds.
        #[serde(default = "default_comp_release_ms")]
        release_ms: f32,
        /// Gain added after compression.
        #[serde(default)]
        makeup_db: f32,
    },
    /// Scales the whole buffer so its peak lands on `target_peak_db`.
    Normalization {
        /// Target peak level, `<= 0` dBFS.
        #[serde(default = "default_target_peak_db")]
        target_peak_db: f32,
    },
}

fn default_noise_threshold_db() -> f32 {
    -50.0
}

fn default_noise_reduction_db() -> f32 {
    12.0
}

fn default_comp_threshold_db() -> f32 {
    -18.0
}

fn default_comp_ratio() -> f32 {
    4.0
}

fn default_comp_attack_ms() -> f32 {
    10.0
}

fn default_comp_release_ms() -> f32 {
    100.0
}

fn default_target_peak_db() -> f32 {
    -1.0
}

impl EffectStage {
    /// Stable lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NoiseReduction { .. } => "noise_reduction",
            Self::Compression { .. } => "compression",
            Self::Normalization { .. } => "normalization",
        }
    }

    /// Validate stage parameters.
    pub fn validate(&self) -> ChartreelResult<()> {
        let finite = |name: &str, v: f32| -> ChartreelResult<()> {
            if v.is_finite() {
                Ok(())
            } else {
                Err(ChartreelError::validation(format!(
                    "{}.{name} must be finite",
                    self.name()
                )))
            }
        };
        match *self {
            Self::NoiseReduction {
                threshold_db,
                reduction_db,
            } => {
                finite("threshold_db", threshold_db)?;
                finite("reduction_db", reduction_db)?;
                if reduction_db < 0.0 {
                    return Err(ChartreelError::validation(
                        "noise_reduction.reduction_db must be >= 0",
                    ));
                }
            }
            Self::Compression {
                threshold_db,
                ratio,
                attack_ms,
                release_ms,
                makeup_db,
            } => {
                finite("threshold_db", threshold_db)?;
                finite("ratio", ratio)?;
                finite("attack_ms", attack_ms)?;
                finite("release_ms", release_ms)?;
                finite("makeup_db", makeup_db)?;
                if ratio < 1.0 {
                    return Err(ChartreelError::validation("compression.ratio must be >= 1"));
                }
                if attack_ms <= 0.0 || release_ms <= 0.0 {
                    return Err(ChartreelError::validation(
                        "compression attack_ms/release_ms must be > 0",
                    ));
                }
            }
            Self::Normalization { target_peak_db } => {
                finite("target_peak_db", target_peak_db)?;
                if target_peak_db > 0.0 {
                    return Err(ChartreelError::validation(
                        "normalization.target_peak_db must be <= 0",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Apply the stage to an interleaved buffer, returning the processed copy.
    pub fn apply(&self, samples: &[f32], channels: u16, sample_rate: u32) -> Vec<f32> {
        let channels = usize::from(channels.max(1));
        match *self {
            Self::NoiseReduction {
                threshold_db,
                reduction_db,
            } => expand(samples, channels, sample_rate, threshold_db, reduction_db),
            Self::Compression {
                threshold_db,
                ratio,
                attack_ms,
                release_ms,
                makeup_db,
            } => compress(
                samples,
                channels,
                sample_rate,
                CompressorParams {
                    threshold_db,
                    ratio,
                    attack_ms,
                    release_ms,
                    makeup_db,
                },
            ),
            Self::Normalization { target_peak_db } => normalize_peak(samples, target_peak_db),
        }
    }
}

/// Run a whole chain in declared order.
pub fn apply_chain(chain: &[EffectStage], samples: &[f32], channels: u16, sample_rate: u32) -> Vec<f32> {
    let mut buf = samples.to_vec();
    for stage in chain {
        buf = stage.apply(&buf, channels, sample_rate);
    }
    buf
}

fn smoothing_coeff(ms: f32, sample_rate: u32) -> f32 {
    let samples = (ms / 1000.0) * sample_rate as f32;
    if samples <= 1.0 {
        return 0.0;
    }
    (-1.0 / samples).exp()
}

/// One-pole peak follower over the loudest channel of each sample frame.
fn peak_envelope(samples: &[f32], channels: usize, attack: f32, release: f32) -> Vec<f32> {
    let mut env = 0.0f32;
    samples
        .chunks_exact(channels)
        .map(|frame| {
            let level = frame.iter().fold(0.0f32, |m, s| m.max(s.abs()));
            let coeff = if level > env { attack } else { release };
            env = coeff * env + (1.0 - coeff) * level;
            env
        })
        .collect()
}

fn expand(
    samples: &[f32],
    channels: usize,
    sample_rate: u32,
    threshold_db: f32,
    reduction_db: f32,
) -> Vec<f32> {
    let env = peak_envelope(
        samples,
        channels,
        smoothing_coeff(5.0, sample_rate),
        smoothing_coeff(50.0, sample_rate),
    );
    let floor = db_to_gain(-reduction_db);
    let gain_smooth = smoothing_coeff(10.0, sample_rate);
    let mut gain = 1.0f32;
    let mut out = Vec::with_capacity(samples.len());
    for (frame, level) in samples.chunks_exact(channels).zip(env) {
        let target = if gain_to_db(level) < threshold_db {
            floor
        } else {
            1.0
        };
        gain = gain_smooth * gain + (1.0 - gain_smooth) * target;
        out.extend(frame.iter().map(|s| s * gain));
    }
    out
}

struct CompressorParams {
    threshold_db: f32,
    ratio: f32,
    attack_ms: f32,
    release_ms: f32,
    makeup_db: f32,
}

fn compress(samples: &[f32], channels: usize, sample_rate: u32, p: CompressorParams) -> Vec<f32> {
    let env = peak_envelope(
        samples,
        channels,
        smoothing_coeff(p.attack_ms, sample_rate),
        smoothing_coeff(p.release_ms, sample_rate),
    );
    let makeup = db_to_gain(p.makeup_db);
    let slope = 1.0 - 1.0 / p.ratio;
    let mut out = Vec::with_capacity(samples.len());
    for (frame, level) in samples.chunks_exact(channels).zip(env) {
        let over = gain_to_db(level) - p.threshold_db;
        let reduction_db = if over > 0.0 { over * slope } else { 0.0 };
        let gain = db_to_gain(-reduction_db) * makeup;
        out.extend(frame.iter().map(|s| s * gain));
    }
    out
}

fn normalize_peak(samples: &[f32], target_peak_db: f32) -> Vec<f32> {
    let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    if peak <= 1e-9 {
        return samples.to_vec();
    }
    let scale = db_to_gain(target_peak_db) / peak;
    samples.iter().map(|s| s * scale).collect()
}

#[cfg(test)]
#[path = "../../tests/unit/audio/effects.rs"]
mod tests;
