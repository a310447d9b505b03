use std::collections::BTreeSet;

use crate::{
    animation::ease::Ease,
    composition::model::{ContentRef, Scene, SceneKind, TransitionSpec},
    effects::transitions::{TransitionKind, parse_transition},
    foundation::error::{ChartreelError, ChartreelResult},
};

/// Tolerance used when comparing timeline instants, in seconds.
pub const TIME_EPSILON: f64 = 1e-6;

/// A transition resolved into its closed kind.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    /// Resolved transition algorithm.
    pub kind: TransitionKind,
    /// Overlap duration in seconds (`0` for cuts).
    pub duration: f64,
    /// Progress easing.
    pub ease: Ease,
}

/// Ordered scenes interleaved with transitions.
///
/// `transitions[k]` joins `scenes[k]` (outgoing) and `scenes[k + 1]` (incoming). The timeline owns
/// the clock range `[0, total_duration)` with
/// `total_duration = sum(scene durations) - sum(transition durations)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Timeline {
    scenes: Vec<Scene>,
    transitions: Vec<Transition>,
    total_duration: f64,
}

impl Timeline {
    /// Validate explicitly placed scenes and their joining transitions.
    ///
    /// Fails with [`ChartreelError::InvalidTimeline`] on gaps, overlaps not consumed by a
    /// transition, and transitions longer than a bounding scene can spare.
    pub fn new(scenes: Vec<Scene>, transitions: Vec<TransitionSpec>) -> ChartreelResult<Self> {
        if scenes.is_empty() {
            return Err(ChartreelError::invalid_timeline(
                "timeline must contain at least one scene",
            ));
        }
        if transitions.len() + 1 != scenes.len() {
            return Err(ChartreelError::invalid_timeline(format!(
                "timeline with {} scenes needs {} transitions (use 'cut' for hard joins), got {}",
                scenes.len(),
                scenes.len() - 1,
                transitions.len()
            )));
        }

        let mut ids = BTreeSet::new();
        for scene in &scenes {
            if scene.id.trim().is_empty() {
                return Err(ChartreelError::validation("scene id must be non-empty"));
            }
            if !ids.insert(scene.id.as_str()) {
                return Err(ChartreelError::validation(format!(
                    "duplicate scene id '{}'",
                    scene.id
                )));
            }
            if !scene.duration.is_finite() || scene.duration <= 0.0 {
                return Err(ChartreelError::invalid_timeline(format!(
                    "scene '{}' duration must be finite and > 0",
                    scene.id
                )));
            }
            if !scene.start_time.is_finite() || scene.start_time < 0.0 {
                return Err(ChartreelError::invalid_timeline(format!(
                    "scene '{}' start_time must be finite and >= 0",
                    scene.id
                )));
            }
        }

        let resolved = transitions
            .iter()
            .map(resolve_transition)
            .collect::<ChartreelResult<Vec<_>>>()?;

        if scenes[0].start_time.abs() > TIME_EPSILON {
            return Err(ChartreelError::invalid_timeline(format!(
                "gap before first scene '{}': timeline starts at 0 but the scene starts at {}s",
                scenes[0].id, scenes[0].start_time
            )));
        }

        for (k, tr) in resolved.iter().enumerate() {
            let out = &scenes[k];
            let inc = &scenes[k + 1];
            let out_in = if k > 0 { resolved[k - 1].duration } else { 0.0 };
            let inc_out = resolved.get(k + 1).map_or(0.0, |t| t.duration);
            let tail_margin = out.duration - out_in;
            let head_margin = inc.duration - inc_out;
            if tr.duration > tail_margin + TIME_EPSILON {
                return Err(ChartreelError::invalid_timeline(format!(
                    "transition '{}' -> '{}' lasts {}s but outgoing scene can spare only {}s",
                    out.id, inc.id, tr.duration, tail_margin
                )));
            }
            if tr.duration > head_margin + TIME_EPSILON {
                return Err(ChartreelError::invalid_timeline(format!(
                    "transition '{}' -> '{}' lasts {}s but incoming scene can spare only {}s",
                    out.id, inc.id, tr.duration, head_margin
                )));
            }

            let expected_start = out.end_time() - tr.duration;
            if inc.start_time > expected_start + TIME_EPSILON {
                return Err(ChartreelError::invalid_timeline(format!(
                    "gap of {}s between scenes '{}' and '{}'",
                    inc.start_time - expected_start,
                    out.id,
                    inc.id
                )));
            }
            if inc.start_time < expected_start - TIME_EPSILON {
                return Err(ChartreelError::invalid_timeline(format!(
                    "scenes '{}' and '{}' overlap by {}s more than their transition consumes",
                    out.id,
                    inc.id,
                    expected_start - inc.start_time
                )));
            }
        }

        let scene_sum: f64 = scenes.iter().map(|s| s.duration).sum();
        let transition_sum: f64 = resolved.iter().map(|t| t.duration).sum();
        let total_duration = scene_sum - transition_sum;

        Ok(Self {
            scenes,
            transitions: resolved,
            total_duration,
        })
    }

    /// Scenes ordered by start time.
    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    /// Transitions; `transitions()[k]` joins scene `k` and `k + 1`.
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Clock range length in seconds.
    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    /// Look up a scene index by id.
    pub fn scene_index(&self, id: &str) -> Option<usize> {
        self.scenes.iter().position(|s| s.id == id)
    }

    /// Time range `[start, end)` during which scene `idx` contributes pixels.
    pub fn scene_window(&self, idx: usize) -> Option<(f64, f64)> {
        let s = self.scenes.get(idx)?;
        Some((s.start_time, s.end_time().min(self.total_duration)))
    }
}

fn resolve_transition(spec: &TransitionSpec) -> ChartreelResult<Transition> {
    if !spec.duration.is_finite() || spec.duration < 0.0 {
        return Err(ChartreelError::invalid_timeline(format!(
            "transition '{}' duration must be finite and >= 0",
            spec.kind
        )));
    }
    let kind = parse_transition(spec)?;
    let is_cut = matches!(kind, TransitionKind::Cut);
    if is_cut && spec.duration > TIME_EPSILON {
        return Err(ChartreelError::invalid_timeline(
            "cut transitions must have duration 0",
        ));
    }
    Ok(Transition {
        kind,
        duration: if is_cut {
            0.0
        } else {
            spec.duration
        },
        ease: spec.ease,
    })
}

/// Builder that places scenes back-to-back, deriving each start time from the previous scene's
/// end minus the joining transition.
#[derive(Debug, Default)]
pub struct TimelineBuilder {
    scenes: Vec<Scene>,
    transitions: Vec<TransitionSpec>,
    pending: Option<TransitionSpec>,
}

impl TimelineBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a scene. Joined to the previous scene with the pending transition, or a cut.
    pub fn scene(
        mut self,
        id: impl Into<String>,
        kind: SceneKind,
        duration: f64,
        content: impl Into<String>,
    ) -> Self {
        let join = self.pending.take().unwrap_or_else(TransitionSpec::cut);
        let start_time = match self.scenes.last() {
            None => 0.0,
            Some(prev) => {
                self.transitions.push(join.clone());
                let overlap = if join.kind.trim().eq_ignore_ascii_case("cut") {
                    0.0
                } else {
                    join.duration
                };
                (prev.end_time() - overlap).max(0.0)
            }
        };
        self.scenes.push(Scene {
            id: id.into(),
            kind,
            start_time,
            duration,
            content_ref: ContentRef::new(content),
        });
        self
    }

    /// Set the transition joining the last scene and the next one.
    pub fn transition(mut self, spec: TransitionSpec) -> Self {
        self.pending = Some(spec);
        self
    }

    /// Validate and build the timeline.
    pub fn build(self) -> ChartreelResult<Timeline> {
        if self.pending.is_some() {
            return Err(ChartreelError::invalid_timeline(
                "trailing transition without an incoming scene",
            ));
        }
        Timeline::new(self.scenes, self.transitions)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/composition/timeline.rs"]
mod tests;
