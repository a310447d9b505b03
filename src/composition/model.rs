use std::collections::BTreeSet;
use std::sync::Arc;

use crate::{
    animation::ease::Ease,
    audio::{effects::EffectStage, envelope::GainEnvelope},
    composition::timeline::Timeline,
    foundation::core::{Canvas, Fps, Resolution},
    foundation::error::{ChartreelError, ChartreelResult},
};

/// What kind of visual content a scene carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneKind {
    /// Title card.
    Title,
    /// Animated data chart.
    Chart,
    /// Visuals synchronized with a voice track.
    Voiceover,
    /// Any other provider-backed content.
    Custom,
}

/// Opaque handle naming the frame provider that renders a scene.
#[derive(
    Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct ContentRef(pub String);

impl ContentRef {
    /// Create a content handle from any string-like key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the handle key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A timed unit of visual content with a single content source.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Scene {
    /// Unique scene id.
    pub id: String,
    /// Scene kind.
    pub kind: SceneKind,
    /// Timeline start in seconds.
    pub start_time: f64,
    /// Duration in seconds, `> 0`.
    pub duration: f64,
    /// Provider handle.
    pub content_ref: ContentRef,
}

impl Scene {
    /// Exclusive end time in seconds.
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

/// Declarative transition between two adjacent scenes.
///
/// `kind` is resolved into a closed [`crate::TransitionKind`] when the [`Timeline`] is built.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TransitionSpec {
    /// Transition type name (`fade`, `slide`, `zoom`, `cut`).
    pub kind: String,
    /// Overlap duration in seconds.
    pub duration: f64,
    /// Progress easing.
    #[serde(default)]
    pub ease: Ease,
    /// Kind-specific parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

impl TransitionSpec {
    /// Convenience constructor without parameters.
    pub fn new(kind: impl Into<String>, duration: f64, ease: Ease) -> Self {
        Self {
            kind: kind.into(),
            duration,
            ease,
            params: serde_json::Value::Null,
        }
    }

    /// Zero-length hard cut.
    pub fn cut() -> Self {
        Self::new("cut", 0.0, Ease::Linear)
    }
}

/// Audio track role, which drives ducking behaviour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioRole {
    /// Foreground speech; triggers ducking.
    Voice,
    /// Background music; ducked while voice is active.
    Music,
    /// Sound effects; never ducked.
    Fx,
}

/// Raw PCM supplied by an audio collaborator (TTS, music loader).
#[derive(Clone, Debug)]
pub struct AudioSource {
    /// Source sample rate in Hz.
    pub sample_rate: u32,
    /// Source channel count (1 or 2).
    pub channels: u16,
    /// Interleaved `f32` samples in `[-1, 1]`.
    pub interleaved: Arc<Vec<f32>>,
}

impl AudioSource {
    /// Wrap interleaved samples.
    pub fn new(sample_rate: u32, channels: u16, interleaved: Vec<f32>) -> Self {
        Self {
            sample_rate,
            channels,
            interleaved: Arc::new(interleaved),
        }
    }

    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.interleaved.len() / usize::from(self.channels)
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / f64::from(self.sample_rate)
    }
}

/// One audio track of the project.
#[derive(Clone, Debug)]
pub struct AudioTrack {
    /// Unique track id.
    pub id: String,
    /// Mixing role.
    pub role: AudioRole,
    /// Source PCM.
    pub source: AudioSource,
    /// Track-local gain automation.
    pub gain_envelope: GainEnvelope,
    /// Effects applied in declared order before the gain envelope.
    pub effects: Vec<EffectStage>,
    /// Timeline start in seconds.
    pub start_time: f64,
}

impl AudioTrack {
    /// Create a track with unity gain and no effects.
    pub fn new(
        id: impl Into<String>,
        role: AudioRole,
        source: AudioSource,
        start_time: f64,
    ) -> Self {
        Self {
            id: id.into(),
            role,
            source,
            gain_envelope: GainEnvelope::constant(1.0),
            effects: Vec::new(),
            start_time,
        }
    }

    /// Exclusive timeline end of the track in seconds.
    pub fn end_time(&self) -> f64 {
        self.start_time + self.source.duration_secs()
    }

    /// Return `true` when `[start, end)` seconds overlaps the track's active window.
    pub fn overlaps(&self, start: f64, end: f64) -> bool {
        self.start_time < end && start < self.end_time()
    }
}

/// Declared output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OutputSpec {
    /// Output resolution.
    pub resolution: Resolution,
    /// Output frame rate.
    pub frame_rate: Fps,
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Output channel count (1 or 2).
    pub channels: u16,
}

impl Default for OutputSpec {
    fn default() -> Self {
        Self {
            resolution: Resolution::Hd720,
            frame_rate: Fps { num: 24, den: 1 },
            sample_rate: 48_000,
            channels: 2,
        }
    }
}

impl OutputSpec {
    /// Output canvas dimensions.
    pub fn canvas(&self) -> Canvas {
        self.resolution.canvas()
    }

    /// Exact output frame count for a duration: `round(duration * frame_rate)`.
    pub fn frame_count(&self, duration_secs: f64) -> u64 {
        self.frame_rate.secs_to_frames_round(duration_secs)
    }

    /// Exact output sample frame count for a duration: `round(duration * sample_rate)`.
    pub fn sample_frames(&self, duration_secs: f64) -> u64 {
        (duration_secs * f64::from(self.sample_rate)).round().max(0.0) as u64
    }

    /// Exact interleaved sample count: `round(duration * sample_rate) * channels`.
    pub fn sample_count(&self, duration_secs: f64) -> u64 {
        self.sample_frames(duration_secs) * u64::from(self.channels)
    }

    /// Validate the output declaration.
    pub fn validate(&self) -> ChartreelResult<()> {
        Fps::new(self.frame_rate.num, self.frame_rate.den)?;
        let canvas = self.canvas();
        if canvas.width == 0 || canvas.height == 0 {
            return Err(ChartreelError::validation(
                "output resolution must be non-zero",
            ));
        }
        if self.sample_rate == 0 {
            return Err(ChartreelError::validation("output sample_rate must be > 0"));
        }
        if !(1..=2).contains(&self.channels) {
            return Err(ChartreelError::validation(
                "output channels must be 1 (mono) or 2 (stereo)",
            ));
        }
        Ok(())
    }
}

/// Immutable composition input: one timeline, its audio tracks and the output spec.
///
/// Mutation requires building a new `Project`.
#[derive(Clone, Debug)]
pub struct Project {
    timeline: Timeline,
    tracks: Vec<AudioTrack>,
    output: OutputSpec,
}

impl Project {
    /// Validate and assemble a project.
    pub fn new(
        timeline: Timeline,
        tracks: Vec<AudioTrack>,
        output: OutputSpec,
    ) -> ChartreelResult<Self> {
        output.validate()?;
        let mut ids = BTreeSet::new();
        for track in &tracks {
            if track.id.trim().is_empty() {
                return Err(ChartreelError::validation("audio track id must be non-empty"));
            }
            if !ids.insert(track.id.as_str()) {
                return Err(ChartreelError::validation(format!(
                    "duplicate audio track id '{}'",
                    track.id
                )));
            }
            if !track.start_time.is_finite() || track.start_time < 0.0 {
                return Err(ChartreelError::validation(format!(
                    "audio track '{}' start_time must be finite and >= 0",
                    track.id
                )));
            }
            if track.source.sample_rate == 0 {
                return Err(ChartreelError::validation(format!(
                    "audio track '{}' source sample_rate must be > 0",
                    track.id
                )));
            }
            if !(1..=2).contains(&track.source.channels) {
                return Err(ChartreelError::validation(format!(
                    "audio track '{}' source must be mono or stereo",
                    track.id
                )));
            }
            if !track
                .source
                .interleaved
                .len()
                .is_multiple_of(usize::from(track.source.channels))
            {
                return Err(ChartreelError::validation(format!(
                    "audio track '{}' sample count is not a multiple of its channel count",
                    track.id
                )));
            }
            track.gain_envelope.validate()?;
            for stage in &track.effects {
                stage.validate()?;
            }
        }
        Ok(Self {
            timeline,
            tracks,
            output,
        })
    }

    /// The scene timeline.
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Audio tracks in declaration order.
    pub fn tracks(&self) -> &[AudioTrack] {
        &self.tracks
    }

    /// Declared output format.
    pub fn output(&self) -> &OutputSpec {
        &self.output
    }

    /// Timeline duration in seconds.
    pub fn total_duration(&self) -> f64 {
        self.timeline.total_duration()
    }

    /// Exact output frame count.
    pub fn frame_count(&self) -> u64 {
        self.output.frame_count(self.total_duration())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/composition/model.rs"]
mod tests;
