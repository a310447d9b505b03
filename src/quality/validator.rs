use std::borrow::Borrow;
use std::fmt;

use crate::{
    composition::model::OutputSpec,
    foundation::{
        core::{Fps, FrameIndex, FrameRange},
        error::{ChartreelError, ChartreelResult},
        math::Fnv1a64,
    },
    render::frame::FrameRGBA,
};

/// Thresholds for the post-composition quality gate.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Longest tolerated run of black frames, in seconds.
    pub max_black_run_secs: f64,
    /// Longest tolerated run of identical frames, in seconds. Static providers and content that
    /// has settled are exempt.
    pub max_identical_run_secs: f64,
    /// Absolute sample level counted as clipped.
    pub clip_level: f32,
    /// Longest tolerated run of clipped sample frames, in seconds.
    pub max_clip_run_secs: f64,
    /// Targeted repair rounds before the render fails.
    pub max_retries: u32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            max_black_run_secs: 1.0,
            max_identical_run_secs: 10.0,
            clip_level: 0.999,
            max_clip_run_secs: 0.005,
            max_retries: 2,
        }
    }
}

impl QualityConfig {
    /// Validate the thresholds.
    pub fn validate(&self) -> ChartreelResult<()> {
        for (name, v) in [
            ("max_black_run_secs", self.max_black_run_secs),
            ("max_identical_run_secs", self.max_identical_run_secs),
            ("max_clip_run_secs", self.max_clip_run_secs),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(ChartreelError::validation(format!(
                    "quality.{name} must be finite and >= 0"
                )));
            }
        }
        if !(self.clip_level > 0.0 && self.clip_level <= 1.0) {
            return Err(ChartreelError::validation(
                "quality.clip_level must be in (0, 1]",
            ));
        }
        Ok(())
    }
}

/// 128-bit content hash of a frame, used to find identical runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameFingerprint {
    /// High half.
    pub hi: u64,
    /// Low half.
    pub lo: u64,
}

impl FrameFingerprint {
    /// Hash dimensions and pixels of `frame`.
    pub fn of(frame: &FrameRGBA) -> Self {
        let mut a = Fnv1a64::new_default();
        let mut b = Fnv1a64::new(0x9ae1_6a3b_2f90_404f);
        for h in [&mut a, &mut b] {
            h.write_u64(u64::from(frame.width));
            h.write_u64(u64::from(frame.height));
            h.write_bytes(&frame.data);
        }
        Self {
            hi: a.finish(),
            lo: b.finish(),
        }
    }
}

/// Which scenes produced an output frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameOrigin {
    /// Scene shown, or the outgoing scene during a transition.
    pub primary: usize,
    /// Incoming scene during a transition.
    pub secondary: Option<usize>,
    /// Every contributing provider is static; run-length checks skip the frame.
    pub exempt: bool,
    /// Every contributing scene has settled and is expected to repeat; only the identical-run
    /// check skips the frame.
    pub held: bool,
}

impl FrameOrigin {
    fn scenes(self) -> impl Iterator<Item = usize> {
        std::iter::once(self.primary).chain(self.secondary)
    }
}

/// A quality defect with the range it implicates.
#[derive(Clone, Debug, PartialEq)]
pub enum Defect {
    /// Black frames for longer than the threshold.
    BlackRun {
        /// Scenes contributing to the run.
        scenes: Vec<usize>,
        /// Output frames of the run.
        frames: FrameRange,
    },
    /// Identical frames for longer than the threshold.
    IdenticalRun {
        /// Scenes contributing to the run.
        scenes: Vec<usize>,
        /// Output frames of the run.
        frames: FrameRange,
    },
    /// A provider kept failing for these frames.
    ProviderFailure {
        /// Failing scene.
        scene: usize,
        /// Output frames left without content.
        frames: FrameRange,
        /// Last provider error.
        reason: String,
    },
    /// Clipped audio for longer than the threshold.
    Clipping {
        /// First clipped sample frame.
        start_frame: u64,
        /// Exclusive end sample frame.
        end_frame: u64,
        /// Peak magnitude in the run.
        peak: f32,
    },
    /// The frame stream length deviates from the output format.
    FrameCount {
        /// `round(duration * frame_rate)`.
        expected: u64,
        /// Composed frames.
        actual: u64,
    },
    /// The sample stream length deviates from the output format.
    SampleCount {
        /// `round(duration * sample_rate) * channels`.
        expected: u64,
        /// Mixed interleaved samples.
        actual: u64,
    },
}

impl Defect {
    /// Whether a targeted re-render or re-mix can fix the defect. Count deviations cannot.
    pub fn is_repairable(&self) -> bool {
        !matches!(self, Self::FrameCount { .. } | Self::SampleCount { .. })
    }

    /// Implicated output frames, for visual defects.
    pub fn frame_range(&self) -> Option<FrameRange> {
        match self {
            Self::BlackRun { frames, .. }
            | Self::IdenticalRun { frames, .. }
            | Self::ProviderFailure { frames, .. } => Some(*frames),
            _ => None,
        }
    }
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlackRun { scenes, frames } => write!(
                f,
                "black frames {}..{} (scenes {scenes:?})",
                frames.start.0, frames.end.0
            ),
            Self::IdenticalRun { scenes, frames } => write!(
                f,
                "identical frames {}..{} (scenes {scenes:?})",
                frames.start.0, frames.end.0
            ),
            Self::ProviderFailure {
                scene,
                frames,
                reason,
            } => write!(
                f,
                "scene {scene} failed for frames {}..{}: {reason}",
                frames.start.0, frames.end.0
            ),
            Self::Clipping {
                start_frame,
                end_frame,
                peak,
            } => write!(
                f,
                "audio clipped at sample frames {start_frame}..{end_frame} (peak {peak:.3})"
            ),
            Self::FrameCount { expected, actual } => {
                write!(f, "expected {expected} frames, composed {actual}")
            }
            Self::SampleCount { expected, actual } => {
                write!(f, "expected {expected} samples, mixed {actual}")
            }
        }
    }
}

/// Checks composed output against the output format and the configured thresholds.
#[derive(Clone, Copy, Debug)]
pub struct QualityValidator {
    cfg: QualityConfig,
    output: OutputSpec,
}

impl QualityValidator {
    /// Validator for `output`.
    pub fn new(cfg: QualityConfig, output: OutputSpec) -> Self {
        Self { cfg, output }
    }

    /// The configured thresholds.
    pub fn config(&self) -> &QualityConfig {
        &self.cfg
    }

    /// Frame and sample counts against `duration_secs`.
    pub fn check_counts(&self, frames: usize, samples: usize, duration_secs: f64) -> Vec<Defect> {
        let mut defects = Vec::new();
        let expected = self.output.frame_count(duration_secs);
        if frames as u64 != expected {
            defects.push(Defect::FrameCount {
                expected,
                actual: frames as u64,
            });
        }
        let expected = self.output.sample_count(duration_secs);
        if samples as u64 != expected {
            defects.push(Defect::SampleCount {
                expected,
                actual: samples as u64,
            });
        }
        defects
    }

    /// Black and identical runs. `origins[i]` describes `frames[i]`.
    pub fn inspect_frames<F: Borrow<FrameRGBA>>(
        &self,
        frames: &[F],
        origins: &[FrameOrigin],
    ) -> Vec<Defect> {
        let fps = self.output.frame_rate;
        let max_black = run_limit(self.cfg.max_black_run_secs, fps);
        let max_same = run_limit(self.cfg.max_identical_run_secs, fps);

        let mut defects = Vec::new();
        let n = frames.len().min(origins.len());

        let black: Vec<bool> = frames[..n]
            .iter()
            .zip(origins)
            .map(|(f, o)| !o.exempt && f.borrow().is_black())
            .collect();
        for (s, e) in runs(n, |i| black[i], |_, _| true) {
            if (e - s) as u64 > max_black {
                defects.push(Defect::BlackRun {
                    scenes: scenes_in(&origins[s..e]),
                    frames: frame_range(s, e),
                });
            }
        }

        let prints: Vec<FrameFingerprint> = frames[..n]
            .iter()
            .map(|f| FrameFingerprint::of(f.borrow()))
            .collect();
        for (s, e) in runs(
            n,
            |i| !origins[i].exempt && !origins[i].held && !black[i],
            |a, b| prints[a] == prints[b],
        ) {
            if (e - s) as u64 > max_same {
                defects.push(Defect::IdenticalRun {
                    scenes: scenes_in(&origins[s..e]),
                    frames: frame_range(s, e),
                });
            }
        }
        defects
    }

    /// Runs of clipped sample frames in interleaved `samples`.
    pub fn inspect_audio(&self, samples: &[f32]) -> Vec<Defect> {
        let ch = usize::from(self.output.channels.max(1));
        let limit = (self.cfg.max_clip_run_secs * f64::from(self.output.sample_rate)).round() as u64;
        let level = self.cfg.clip_level;

        let peaks: Vec<f32> = samples
            .chunks_exact(ch)
            .map(|frame| frame.iter().fold(0.0f32, |m, s| m.max(s.abs())))
            .collect();
        runs(peaks.len(), |i| peaks[i] >= level, |_, _| true)
            .into_iter()
            .filter(|(s, e)| (e - s) as u64 > limit)
            .map(|(s, e)| Defect::Clipping {
                start_frame: s as u64,
                end_frame: e as u64,
                peak: peaks[s..e].iter().fold(0.0f32, |m, &p| m.max(p)),
            })
            .collect()
    }
}

fn run_limit(secs: f64, fps: Fps) -> u64 {
    fps.secs_to_frames_round(secs).max(1)
}

fn frame_range(start: usize, end: usize) -> FrameRange {
    FrameRange {
        start: FrameIndex(start as u64),
        end: FrameIndex(end as u64),
    }
}

fn scenes_in(origins: &[FrameOrigin]) -> Vec<usize> {
    let mut out: Vec<usize> = origins.iter().flat_map(|o| o.scenes()).collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// Maximal `[start, end)` runs of eligible indices where each element matches its predecessor.
fn runs(
    n: usize,
    eligible: impl Fn(usize) -> bool,
    same: impl Fn(usize, usize) -> bool,
) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    for i in 0..n {
        let keep = eligible(i) && start.is_none_or(|_| same(i - 1, i));
        match (start, keep) {
            (Some(s), false) => {
                out.push((s, i));
                start = eligible(i).then_some(i);
            }
            (None, true) => start = Some(i),
            (None, false) => start = eligible(i).then_some(i),
            (Some(_), true) => {}
        }
    }
    if let Some(s) = start {
        out.push((s, n));
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/quality/validator.rs"]
mod tests;
