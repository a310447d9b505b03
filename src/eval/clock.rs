use crate::{
    composition::{
        model::Project,
        timeline::{TIME_EPSILON, Timeline},
    },
    foundation::core::{Fps, FrameIndex, FrameRange},
    foundation::error::{ChartreelError, ChartreelResult},
};

/// Mapping from output frame index to project timestamp.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameClock {
    fps: Fps,
    total_frames: u64,
}

impl FrameClock {
    /// Clock covering `round(total_duration * fps)` frames.
    pub fn new(fps: Fps, total_duration: f64) -> Self {
        Self {
            fps,
            total_frames: fps.secs_to_frames_round(total_duration),
        }
    }

    /// Clock for a project's timeline and output frame rate.
    pub fn for_project(project: &Project) -> Self {
        Self::new(project.output().frame_rate, project.total_duration())
    }

    /// Frame rate.
    pub fn fps(&self) -> Fps {
        self.fps
    }

    /// Number of output frames.
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Full frame range `[0, total_frames)`.
    pub fn range(&self) -> FrameRange {
        FrameRange {
            start: FrameIndex(0),
            end: FrameIndex(self.total_frames),
        }
    }

    /// Timestamp of frame `i`: `i / frame_rate`.
    pub fn timestamp(&self, i: FrameIndex) -> f64 {
        self.fps.frames_to_secs(i.0)
    }

    /// Frames whose timestamps fall inside scene `idx`'s active window.
    pub fn scene_frames(&self, timeline: &Timeline, idx: usize) -> Option<FrameRange> {
        let (start, end) = timeline.scene_window(idx)?;
        let fps = self.fps.as_f64();
        let first = ((start * fps) - TIME_EPSILON).ceil().max(0.0) as u64;
        let last = ((end * fps) - TIME_EPSILON).ceil().max(0.0) as u64;
        Some(FrameRange {
            start: FrameIndex(first.min(self.total_frames)),
            end: FrameIndex(last.min(self.total_frames)),
        })
    }
}

/// Nearest sample index for a frame delta at `sample_rate`, using the rational frame rate.
pub fn frame_to_sample(frame_delta: u64, fps: Fps, sample_rate: u32) -> u64 {
    let num = u128::from(frame_delta) * u128::from(sample_rate) * u128::from(fps.den);
    let den = u128::from(fps.num);
    ((num + (den / 2)) / den) as u64
}

/// One scene contributing to a frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActiveScene {
    /// Index into [`Timeline::scenes`].
    pub index: usize,
    /// Seconds since the scene's start.
    pub local_time: f64,
}

/// Scenes active at one instant: one in steady state, two (outgoing first) inside a transition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ActiveSet {
    /// Steady state.
    Single(ActiveScene),
    /// Transition window.
    Transition {
        /// Outgoing scene.
        outgoing: ActiveScene,
        /// Incoming scene.
        incoming: ActiveScene,
        /// Index into [`Timeline::transitions`].
        transition: usize,
        /// Eased progress in `[0, 1]`.
        progress: f64,
    },
}

/// Scenes active at output frame `i`.
///
/// Stateless: the answer depends only on `(timeline, fps, i)`.
pub fn active_at(timeline: &Timeline, fps: Fps, i: FrameIndex) -> ChartreelResult<ActiveSet> {
    active_at_time(timeline, fps.frames_to_secs(i.0))
}

/// Scenes active at timestamp `t` seconds. A gap is fatal.
pub fn active_at_time(timeline: &Timeline, t: f64) -> ChartreelResult<ActiveSet> {
    if !t.is_finite() || t < 0.0 || t >= timeline.total_duration() {
        return Err(ChartreelError::invalid_timeline(format!(
            "time {t}s is outside the timeline [0, {})",
            timeline.total_duration()
        )));
    }

    let scenes = timeline.scenes();
    let after = scenes.partition_point(|s| s.start_time <= t + TIME_EPSILON);
    let Some(j) = after.checked_sub(1) else {
        return Err(gap_at(t));
    };

    let local = |idx: usize| ActiveScene {
        index: idx,
        local_time: (t - scenes[idx].start_time).max(0.0),
    };

    if j > 0 {
        let out = &scenes[j - 1];
        let tr = &timeline.transitions()[j - 1];
        if tr.duration > 0.0 && t < out.end_time() - TIME_EPSILON {
            let raw = ((t - scenes[j].start_time) / tr.duration).clamp(0.0, 1.0);
            return Ok(ActiveSet::Transition {
                outgoing: local(j - 1),
                incoming: local(j),
                transition: j - 1,
                progress: tr.ease.apply(raw),
            });
        }
    }

    if t < scenes[j].end_time() - TIME_EPSILON {
        return Ok(ActiveSet::Single(local(j)));
    }
    Err(gap_at(t))
}

fn gap_at(t: f64) -> ChartreelError {
    ChartreelError::invalid_timeline(format!("no scene covers t={t}s"))
}

#[cfg(test)]
#[path = "../../tests/unit/eval/clock.rs"]
mod tests;
