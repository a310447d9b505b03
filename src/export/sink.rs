use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{ChartreelError, ChartreelResult};
use crate::render::frame::FrameRGBA;

/// Format of the finalized buffers, handed to a [`FrameSink`] before any data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frames-per-second.
    pub fps: Fps,
    /// Audio sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved audio channel count.
    pub channels: u16,
    /// Exact number of frames that will be pushed.
    pub frame_count: u64,
}

/// Encoder handoff contract.
///
/// Call order: `begin`, `push_audio` once with the whole mixed track, `push_frame` in strictly
/// increasing `FrameIndex` order, then `end`. A sink only ever sees validated output.
pub trait FrameSink: Send {
    /// Called once before any data is pushed.
    fn begin(&mut self, cfg: SinkConfig) -> ChartreelResult<()>;
    /// Push the complete interleaved audio track.
    fn push_audio(&mut self, samples: &[f32]) -> ChartreelResult<()>;
    /// Push one frame in strictly increasing timeline order.
    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> ChartreelResult<()>;
    /// Called once after the last frame is pushed.
    fn end(&mut self) -> ChartreelResult<()>;
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<(FrameIndex, FrameRGBA)>,
    audio: Vec<f32>,
    finished: bool,
}

impl InMemorySink {
    /// Create a new in-memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the sink configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<SinkConfig> {
        self.cfg
    }

    /// Borrow the captured frames.
    pub fn frames(&self) -> &[(FrameIndex, FrameRGBA)] {
        &self.frames
    }

    /// Borrow the captured interleaved audio.
    pub fn audio(&self) -> &[f32] {
        &self.audio
    }

    /// Return `true` once `end` has been called.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> ChartreelResult<()> {
        self.cfg = Some(cfg);
        self.frames.clear();
        self.audio.clear();
        self.finished = false;
        Ok(())
    }

    fn push_audio(&mut self, samples: &[f32]) -> ChartreelResult<()> {
        if self.cfg.is_none() {
            return Err(ChartreelError::evaluation("in-memory sink not started"));
        }
        self.audio.extend_from_slice(samples);
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> ChartreelResult<()> {
        if let Some((last, _)) = self.frames.last()
            && idx.0 <= last.0
        {
            return Err(ChartreelError::evaluation(
                "in-memory sink received out-of-order frame index",
            ));
        }
        self.frames.push((idx, frame.clone()));
        Ok(())
    }

    fn end(&mut self) -> ChartreelResult<()> {
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/export/sink.rs"]
mod tests;
