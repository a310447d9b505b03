use crate::foundation::error::{ChartreelError, ChartreelResult};

pub use kurbo::{Point, Vec2};

/// Absolute 0-based frame index on the output frame clock.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

/// Half-open frame range `[start, end)` on the output frame clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameRange {
    /// Inclusive range start.
    pub start: FrameIndex,
    /// Exclusive range end.
    pub end: FrameIndex, // exclusive
}

impl FrameRange {
    /// Create a validated range with `start <= end`.
    pub fn new(start: FrameIndex, end: FrameIndex) -> ChartreelResult<Self> {
        if start.0 > end.0 {
            return Err(ChartreelError::validation("FrameRange start must be <= end"));
        }
        Ok(Self { start, end })
    }

    /// Number of frames contained in the range.
    pub fn len_frames(self) -> u64 {
        self.end.0.saturating_sub(self.start.0)
    }

    /// Return `true` when the range has no frames.
    pub fn is_empty(self) -> bool {
        self.start.0 == self.end.0
    }

    /// Return `true` when `f` is inside `[start, end)`.
    pub fn contains(self, f: FrameIndex) -> bool {
        self.start.0 <= f.0 && f.0 < self.end.0
    }

    /// Intersection of two ranges, `None` when they do not overlap.
    pub fn intersect(self, other: FrameRange) -> Option<FrameRange> {
        let start = self.start.0.max(other.start.0);
        let end = self.end.0.min(other.end.0);
        if start >= end {
            return None;
        }
        Some(FrameRange {
            start: FrameIndex(start),
            end: FrameIndex(end),
        })
    }

    /// Split the range into consecutive chunks of at most `chunk` frames.
    pub fn chunks(self, chunk: u64) -> Vec<FrameRange> {
        let chunk = chunk.max(1);
        let mut out = Vec::with_capacity(self.len_frames().div_ceil(chunk) as usize);
        let mut s = self.start.0;
        while s < self.end.0 {
            let e = (s + chunk).min(self.end.0);
            out.push(FrameRange {
                start: FrameIndex(s),
                end: FrameIndex(e),
            });
            s = e;
        }
        out
    }
}

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32, // must be > 0
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> ChartreelResult<Self> {
        if den == 0 {
            return Err(ChartreelError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(ChartreelError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Duration of one frame in seconds.
    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }

    /// Timestamp of frame `i` in seconds (`i / fps`).
    ///
    /// Computed as `i * den / num` so integer timestamps stay exact.
    pub fn frames_to_secs(self, frames: u64) -> f64 {
        (frames as f64) * f64::from(self.den) / f64::from(self.num)
    }

    /// Convert seconds to frame count using floor semantics.
    pub fn secs_to_frames_floor(self, secs: f64) -> u64 {
        (secs * self.as_f64()).floor().max(0.0) as u64
    }

    /// Convert seconds to frame count using round-half-up semantics.
    pub fn secs_to_frames_round(self, secs: f64) -> u64 {
        (secs * self.as_f64()).round().max(0.0) as u64
    }
}

/// Pixel dimensions of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    /// Number of bytes in a tightly packed RGBA8 frame of this size.
    pub fn rgba8_len(self) -> usize {
        (self.width as usize) * (self.height as usize) * 4
    }
}

/// Declared output resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// 1280x720.
    Hd720,
    /// 1920x1080.
    Hd1080,
    /// 3840x2160.
    Uhd2160,
    /// Arbitrary `[width, height]`.
    Custom([u32; 2]),
}

impl Resolution {
    /// Pixel dimensions for this resolution.
    pub fn canvas(self) -> Canvas {
        let (width, height) = match self {
            Self::Hd720 => (1280, 720),
            Self::Hd1080 => (1920, 1080),
            Self::Uhd2160 => (3840, 2160),
            Self::Custom([w, h]) => (w, h),
        };
        Canvas { width, height }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::Hd720
    }
}

/// Premultiplied RGBA8 (r,g,b already multiplied by a).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8Premul {
    /// Red channel premultiplied by alpha.
    pub r: u8,
    /// Green channel premultiplied by alpha.
    pub g: u8,
    /// Blue channel premultiplied by alpha.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8Premul {
    /// Fully transparent black.
    pub fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }

    /// Convert straight-alpha RGBA8 into premultiplied RGBA8.
    pub fn from_straight_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        fn premul(c: u8, a: u8) -> u8 {
            let c = u16::from(c);
            let a = u16::from(a);
            (((c * a) + 127) / 255) as u8
        }

        Self {
            r: premul(r, a),
            g: premul(g, a),
            b: premul(b, a),
            a,
        }
    }

    /// Parse `#rrggbb` or `#rrggbbaa` into premultiplied RGBA8.
    pub fn from_hex(s: &str) -> ChartreelResult<Self> {
        let hex = s.trim().trim_start_matches('#');
        let byte = |i: usize| -> ChartreelResult<u8> {
            hex.get(i..i + 2)
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| ChartreelError::validation(format!("invalid hex colour '{s}'")))
        };
        match hex.len() {
            6 => Ok(Self::from_straight_rgba(byte(0)?, byte(2)?, byte(4)?, 255)),
            8 => Ok(Self::from_straight_rgba(
                byte(0)?,
                byte(2)?,
                byte(4)?,
                byte(6)?,
            )),
            _ => Err(ChartreelError::validation(format!(
                "invalid hex colour '{s}' (expected #rrggbb or #rrggbbaa)"
            ))),
        }
    }

    /// Channels as an `[r, g, b, a]` array.
    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
