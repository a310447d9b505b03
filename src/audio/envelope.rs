use crate::foundation::error::{ChartreelError, ChartreelResult};

/// One gain keyframe at a track-local time.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GainPoint {
    /// Seconds from the track start.
    pub time: f64,
    /// Linear amplitude gain, `>= 0`.
    pub gain: f32,
}

/// Piecewise-linear gain automation over track-local time.
///
/// Before the first point the first gain holds, after the last point the last gain holds. An
/// empty envelope is unity gain.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct GainEnvelope {
    points: Vec<GainPoint>,
}

impl GainEnvelope {
    /// Constant gain for the whole track.
    pub fn constant(gain: f32) -> Self {
        Self {
            points: vec![GainPoint { time: 0.0, gain }],
        }
    }

    /// Build and validate an envelope from keyframes.
    pub fn from_points(points: Vec<GainPoint>) -> ChartreelResult<Self> {
        let env = Self { points };
        env.validate()?;
        Ok(env)
    }

    /// Keyframes in time order.
    pub fn points(&self) -> &[GainPoint] {
        &self.points
    }

    /// Check that keyframes are finite, non-negative and strictly increasing in time.
    pub fn validate(&self) -> ChartreelResult<()> {
        let mut prev: Option<f64> = None;
        for p in &self.points {
            if !p.time.is_finite() || p.time < 0.0 {
                return Err(ChartreelError::validation(
                    "gain envelope time must be finite and >= 0",
                ));
            }
            if !p.gain.is_finite() || p.gain < 0.0 {
                return Err(ChartreelError::validation(
                    "gain envelope gain must be finite and >= 0",
                ));
            }
            if let Some(prev) = prev
                && p.time <= prev
            {
                return Err(ChartreelError::validation(
                    "gain envelope times must be strictly increasing",
                ));
            }
            prev = Some(p.time);
        }
        Ok(())
    }

    /// Gain at track-local time `t` seconds.
    pub fn gain_at(&self, t: f64) -> f32 {
        let Some(first) = self.points.first() else {
            return 1.0;
        };
        if t <= first.time {
            return first.gain;
        }
        let idx = self.points.partition_point(|p| p.time <= t);
        let Some(b) = self.points.get(idx) else {
            return self.points[self.points.len() - 1].gain;
        };
        let a = self.points[idx - 1];
        let u = ((t - a.time) / (b.time - a.time)) as f32;
        a.gain + (b.gain - a.gain) * u
    }
}

#[cfg(test)]
#[path = "../../tests/unit/audio/envelope.rs"]
mod tests;
