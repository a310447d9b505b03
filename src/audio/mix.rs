use std::collections::BTreeMap;
use std::path::Path;

use crate::{
    animation::ease::Ease,
    audio::{effects::apply_chain, envelope::GainEnvelope, resample::resample_interleaved},
    composition::model::{AudioRole, AudioTrack, Project},
    foundation::error::{ChartreelError, ChartreelResult},
    foundation::math::{db_to_gain, gain_to_db},
};

/// Peak level a window is pulled down to when an overflow is recovered.
const RENORMALIZE_TARGET: f32 = 0.98;

/// Ducking behaviour for `music` tracks while a `voice` track is audible.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DuckingConfig {
    /// Attenuation applied to music, in dB (negative).
    pub attenuation_db: f32,
    /// Ramp length into the ducked level, in seconds.
    pub attack_secs: f64,
    /// Ramp length back to unity, in seconds.
    pub release_secs: f64,
    /// Voice RMS level in a window above which the voice counts as active.
    pub voice_threshold_db: f32,
    /// Ramp shape.
    pub ramp: Ease,
}

impl Default for DuckingConfig {
    fn default() -> Self {
        Self {
            attenuation_db: -12.0,
            attack_secs: 0.05,
            release_secs: 0.25,
            voice_threshold_db: -45.0,
            ramp: Ease::Linear,
        }
    }
}

impl DuckingConfig {
    /// Linear gain applied to music while ducked.
    pub fn duck_factor(&self) -> f32 {
        db_to_gain(self.attenuation_db)
    }

    fn validate(&self) -> ChartreelResult<()> {
        if !self.attenuation_db.is_finite() || self.attenuation_db > 0.0 {
            return Err(ChartreelError::validation(
                "ducking.attenuation_db must be finite and <= 0",
            ));
        }
        for (name, v) in [("attack_secs", self.attack_secs), ("release_secs", self.release_secs)] {
            if !v.is_finite() || v < 0.0 {
                return Err(ChartreelError::validation(format!(
                    "ducking.{name} must be finite and >= 0"
                )));
            }
        }
        if !self.voice_threshold_db.is_finite() {
            return Err(ChartreelError::validation(
                "ducking.voice_threshold_db must be finite",
            ));
        }
        Ok(())
    }
}

/// Mixer settings.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MixConfig {
    /// Mixing window length in seconds. Ducking and overflow recovery work per window.
    pub window_secs: f64,
    /// Ducking behaviour.
    pub ducking: DuckingConfig,
    /// Re-normalization passes per window before falling back to hard clipping.
    pub max_renormalize_passes: u32,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            window_secs: 0.02,
            ducking: DuckingConfig::default(),
            max_renormalize_passes: 4,
        }
    }
}

impl MixConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> ChartreelResult<()> {
        if !self.window_secs.is_finite() || self.window_secs <= 0.0 {
            return Err(ChartreelError::validation(
                "mix.window_secs must be finite and > 0",
            ));
        }
        self.ducking.validate()
    }
}

/// Clipping detected in one mixing window and recovered by trimming one track.
#[derive(Clone, Debug, PartialEq)]
pub struct MixOverflowWarning {
    /// Track whose gain was re-normalized.
    pub track_id: String,
    /// First sample frame of the window.
    pub start_frame: u64,
    /// Exclusive end sample frame of the window.
    pub end_frame: u64,
    /// Peak magnitude of the summed window before recovery.
    pub peak: f32,
    /// Gain multiplier applied to the track for this window.
    pub trim: f32,
}

/// Output of a full mix.
#[derive(Clone, Debug, Default)]
pub struct MixReport {
    /// Interleaved master samples, `frames * channels` long.
    pub samples: Vec<f32>,
    /// Output channel count.
    pub channels: u16,
    /// Output sample rate.
    pub sample_rate: u32,
    /// Overflow recoveries, in window order.
    pub warnings: Vec<MixOverflowWarning>,
    /// Number of windows in which music was ducked.
    pub ducked_windows: u64,
}

impl MixReport {
    /// Number of sample frames.
    pub fn frames(&self) -> u64 {
        if self.channels == 0 {
            return 0;
        }
        (self.samples.len() / usize::from(self.channels)) as u64
    }
}

#[derive(Clone, Debug)]
struct PreparedTrack {
    id: String,
    role: AudioRole,
    start_frame: u64,
    frames: u64,
    samples: Vec<f32>,
    envelope: GainEnvelope,
}

impl PreparedTrack {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.frames
    }
}

#[derive(Clone, Copy, Debug)]
struct Overflow {
    track: usize,
    peak: f32,
    contribution: f32,
}

#[derive(Clone, Copy, Debug)]
struct Ramp {
    from: f32,
    to: f32,
    start: u64,
    len: u64,
    ease: Ease,
}

impl Ramp {
    fn gain_at(&self, frame: u64) -> f32 {
        if self.len == 0 || frame >= self.start + self.len {
            return self.to;
        }
        if frame <= self.start {
            return self.from;
        }
        let u = (frame - self.start) as f64 / self.len as f64;
        self.from + (self.to - self.from) * self.ease.apply(u) as f32
    }
}

/// Multi-track mixer with per-window voice ducking.
///
/// Tracks are converted to the output format once (channel layout, sample rate, effects chain).
/// Each window is then a pure function of the prepared tracks, so windows can be re-mixed in
/// isolation.
#[derive(Clone, Debug)]
pub struct Mixer {
    sample_rate: u32,
    channels: u16,
    total_frames: u64,
    window_frames: u64,
    max_passes: u32,
    tracks: Vec<PreparedTrack>,
    duck: Vec<Ramp>,
    ducked_windows: u64,
}

impl Mixer {
    /// Prepare every project track and plan ducking.
    #[tracing::instrument(skip_all, fields(tracks = project.tracks().len()))]
    pub fn new(project: &Project, config: MixConfig) -> ChartreelResult<Self> {
        config.validate()?;
        let out = project.output();
        let sample_rate = out.sample_rate;
        let channels = out.channels;
        let total_frames = out.sample_frames(project.total_duration());
        let window_frames = ((config.window_secs * f64::from(sample_rate)).round() as u64).max(1);

        let tracks = project
            .tracks()
            .iter()
            .map(|t| prepare_track(t, sample_rate, channels))
            .collect::<Vec<_>>();

        let mut mixer = Self {
            sample_rate,
            channels,
            total_frames,
            window_frames,
            max_passes: config.max_renormalize_passes,
            tracks,
            duck: Vec::new(),
            ducked_windows: 0,
        };
        mixer.plan_ducking(&config.ducking);
        tracing::debug!(
            total_frames,
            window_frames,
            ducked_windows = mixer.ducked_windows,
            "audio mix planned"
        );
        Ok(mixer)
    }

    /// Exact output frame count.
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Window length in sample frames.
    pub fn window_frames(&self) -> u64 {
        self.window_frames
    }

    /// Ducking gain applied to music tracks at output sample frame `frame`.
    pub fn duck_gain_at(&self, frame: u64) -> f32 {
        if self.duck.is_empty() {
            return 1.0;
        }
        let w = ((frame / self.window_frames) as usize).min(self.duck.len() - 1);
        self.duck[w].gain_at(frame)
    }

    fn window_count(&self) -> u64 {
        self.total_frames.div_ceil(self.window_frames)
    }

    fn window_bounds(&self, w: u64) -> (u64, u64) {
        let s = w * self.window_frames;
        (s, (s + self.window_frames).min(self.total_frames))
    }

    fn plan_ducking(&mut self, cfg: &DuckingConfig) {
        let factor = cfg.duck_factor();
        let attack = (cfg.attack_secs * f64::from(self.sample_rate)).round() as u64;
        let release = (cfg.release_secs * f64::from(self.sample_rate)).round() as u64;
        let mut ramp = Ramp {
            from: 1.0,
            to: 1.0,
            start: 0,
            len: 0,
            ease: cfg.ramp,
        };
        let mut plan = Vec::with_capacity(self.window_count() as usize);
        let mut ducked = 0;
        for w in 0..self.window_count() {
            let (s, e) = self.window_bounds(w);
            let target = if self.voice_active(s, e, cfg.voice_threshold_db) {
                ducked += 1;
                factor
            } else {
                1.0
            };
            if target != ramp.to {
                let current = ramp.gain_at(s);
                ramp = Ramp {
                    from: current,
                    to: target,
                    start: s,
                    len: if target < current { attack } else { release },
                    ease: cfg.ramp,
                };
            }
            plan.push(ramp);
        }
        self.duck = plan;
        self.ducked_windows = ducked;
    }

    fn voice_active(&self, s: u64, e: u64, threshold_db: f32) -> bool {
        let ch = usize::from(self.channels);
        self.tracks
            .iter()
            .filter(|t| t.role == AudioRole::Voice)
            .any(|t| {
                let lo = s.max(t.start_frame);
                let hi = e.min(t.end_frame());
                if lo >= hi {
                    return false;
                }
                let mut sum = 0.0f64;
                for f in lo..hi {
                    let local = f - t.start_frame;
                    let g = t.envelope.gain_at(local as f64 / f64::from(self.sample_rate));
                    for c in 0..ch {
                        let v = f64::from(t.samples[local as usize * ch + c] * g);
                        sum += v * v;
                    }
                }
                let rms = (sum / ((hi - lo) as f64 * ch as f64)).sqrt() as f32;
                gain_to_db(rms) > threshold_db
            })
    }

    fn track_gain(&self, t: &PreparedTrack, frame: u64, trim: f32) -> f32 {
        let local = frame - t.start_frame;
        let mut g = t.envelope.gain_at(local as f64 / f64::from(self.sample_rate)) * trim;
        if t.role == AudioRole::Music {
            g *= self.duck_gain_at(frame);
        }
        g
    }

    /// Sum one window into `out` (the window's own slice). Reports the overflow, if any, with the
    /// track contributing most at the peak sample.
    fn sum_window(
        &self,
        out: &mut [f32],
        s: u64,
        e: u64,
        trims: &BTreeMap<usize, f32>,
    ) -> Option<Overflow> {
        let ch = usize::from(self.channels);
        out.fill(0.0);
        for (ti, t) in self.tracks.iter().enumerate() {
            let lo = s.max(t.start_frame);
            let hi = e.min(t.end_frame());
            if lo >= hi {
                continue;
            }
            let trim = trims.get(&ti).copied().unwrap_or(1.0);
            for f in lo..hi {
                let g = self.track_gain(t, f, trim);
                let src = (f - t.start_frame) as usize * ch;
                let dst = (f - s) as usize * ch;
                for c in 0..ch {
                    out[dst + c] += t.samples[src + c] * g;
                }
            }
        }

        let (peak_idx, peak) = out
            .iter()
            .enumerate()
            .fold((0usize, 0.0f32), |(bi, bv), (i, v)| {
                if v.abs() > bv { (i, v.abs()) } else { (bi, bv) }
            });
        if peak <= 1.0 {
            return None;
        }

        let frame = s + (peak_idx / ch) as u64;
        let c = peak_idx % ch;
        let mut implicated: Option<(usize, f32)> = None;
        for (ti, t) in self.tracks.iter().enumerate() {
            if frame < t.start_frame || frame >= t.end_frame() {
                continue;
            }
            let trim = trims.get(&ti).copied().unwrap_or(1.0);
            let v = (t.samples[(frame - t.start_frame) as usize * ch + c]
                * self.track_gain(t, frame, trim))
            .abs();
            if implicated.is_none_or(|(_, best)| v > best) {
                implicated = Some((ti, v));
            }
        }
        implicated.map(|(track, contribution)| Overflow {
            track,
            peak,
            contribution,
        })
    }

    /// Mix one window with overflow recovery, then clamp it.
    fn mix_window(
        &self,
        out: &mut [f32],
        s: u64,
        e: u64,
        base_trims: &BTreeMap<usize, f32>,
        warnings: &mut Vec<MixOverflowWarning>,
    ) {
        let ch = usize::from(self.channels);
        let slice = &mut out[s as usize * ch..e as usize * ch];
        let mut trims = base_trims.clone();
        let mut settled = false;
        for _ in 0..self.max_passes {
            let Some(overflow) = self.sum_window(slice, s, e, &trims) else {
                settled = true;
                break;
            };
            let prev = trims.get(&overflow.track).copied().unwrap_or(1.0);
            let others = (overflow.peak - overflow.contribution).max(0.0);
            let scale = if overflow.contribution > 0.0 {
                ((RENORMALIZE_TARGET - others) / overflow.contribution).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let trim = prev * scale;
            let track_id = self.tracks[overflow.track].id.clone();
            tracing::warn!(
                track = %track_id,
                start_frame = s,
                end_frame = e,
                peak = overflow.peak,
                trim,
                "mix overflow, re-normalizing track gain for window"
            );
            warnings.push(MixOverflowWarning {
                track_id,
                start_frame: s,
                end_frame: e,
                peak: overflow.peak,
                trim,
            });
            trims.insert(overflow.track, trim);
        }
        if !settled {
            self.sum_window(slice, s, e, &trims);
        }
        for v in slice.iter_mut() {
            *v = v.clamp(-1.0, 1.0);
        }
    }

    /// Mix the whole project. Silence produces zeros.
    #[tracing::instrument(skip_all, fields(frames = self.total_frames))]
    pub fn mix(&self) -> MixReport {
        let ch = usize::from(self.channels);
        let mut samples = vec![0.0f32; self.total_frames as usize * ch];
        let mut warnings = Vec::new();
        let none = BTreeMap::new();
        for w in 0..self.window_count() {
            let (s, e) = self.window_bounds(w);
            self.mix_window(&mut samples, s, e, &none, &mut warnings);
        }
        if !warnings.is_empty() {
            tracing::info!(warnings = warnings.len(), "mix finished with overflow recoveries");
        }
        MixReport {
            samples,
            channels: self.channels,
            sample_rate: self.sample_rate,
            warnings,
            ducked_windows: self.ducked_windows,
        }
    }

    /// Re-mix the windows covering `[start_frame, end_frame)` in place with extra per-track gain
    /// trims keyed by track id.
    pub fn remix_range(
        &self,
        samples: &mut [f32],
        start_frame: u64,
        end_frame: u64,
        trims: &BTreeMap<String, f32>,
    ) -> ChartreelResult<Vec<MixOverflowWarning>> {
        let ch = usize::from(self.channels);
        if samples.len() != self.total_frames as usize * ch {
            return Err(ChartreelError::composition(format!(
                "re-mix buffer has {} samples, expected {}",
                samples.len(),
                self.total_frames as usize * ch
            )));
        }
        let mut by_index = BTreeMap::new();
        for (id, trim) in trims {
            let idx = self
                .tracks
                .iter()
                .position(|t| &t.id == id)
                .ok_or_else(|| ChartreelError::composition(format!("unknown audio track '{id}'")))?;
            by_index.insert(idx, *trim);
        }
        let end_frame = end_frame.min(self.total_frames);
        let mut warnings = Vec::new();
        if start_frame >= end_frame {
            return Ok(warnings);
        }
        let first = start_frame / self.window_frames;
        let last = (end_frame - 1) / self.window_frames;
        for w in first..=last {
            let (s, e) = self.window_bounds(w);
            self.mix_window(samples, s, e, &by_index, &mut warnings);
        }
        Ok(warnings)
    }

    /// Track with the loudest contribution over `[start_frame, end_frame)`.
    pub fn loudest_track(&self, start_frame: u64, end_frame: u64) -> Option<&str> {
        let ch = usize::from(self.channels);
        let mut best: Option<(usize, f32)> = None;
        for (ti, t) in self.tracks.iter().enumerate() {
            let lo = start_frame.max(t.start_frame);
            let hi = end_frame.min(t.end_frame());
            if lo >= hi {
                continue;
            }
            let mut peak = 0.0f32;
            for f in lo..hi {
                let g = self.track_gain(t, f, 1.0);
                let base = (f - t.start_frame) as usize * ch;
                for c in 0..ch {
                    peak = peak.max((t.samples[base + c] * g).abs());
                }
            }
            if best.is_none_or(|(_, b)| peak > b) {
                best = Some((ti, peak));
            }
        }
        best.map(|(ti, _)| self.tracks[ti].id.as_str())
    }
}

fn prepare_track(track: &AudioTrack, sample_rate: u32, channels: u16) -> PreparedTrack {
    let remapped = remap_channels(&track.source.interleaved, track.source.channels, channels);
    let resampled =
        resample_interleaved(&remapped, channels, track.source.sample_rate, sample_rate);
    let samples = apply_chain(&track.effects, &resampled, channels, sample_rate);
    let frames = (samples.len() / usize::from(channels)) as u64;
    PreparedTrack {
        id: track.id.clone(),
        role: track.role,
        start_frame: (track.start_time * f64::from(sample_rate)).round() as u64,
        frames,
        samples,
        envelope: track.gain_envelope.clone(),
    }
}

/// Convert interleaved PCM between mono and stereo.
pub fn remap_channels(samples: &[f32], from: u16, to: u16) -> Vec<f32> {
    match (from, to) {
        (a, b) if a == b => samples.to_vec(),
        (1, 2) => samples.iter().flat_map(|&s| [s, s]).collect(),
        (2, 1) => samples
            .chunks_exact(2)
            .map(|lr| 0.5 * (lr[0] + lr[1]))
            .collect(),
        (from, to) => {
            let from = usize::from(from.max(1));
            let to = usize::from(to.max(1));
            samples
                .chunks_exact(from)
                .flat_map(|frame| (0..to).map(move |c| frame[c.min(from - 1)]))
                .collect()
        }
    }
}

/// Write interleaved `f32` PCM samples to a raw little-endian `.f32le` file.
pub fn write_mix_to_f32le_file(samples_interleaved: &[f32], out_path: &Path) -> ChartreelResult<()> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ChartreelError::evaluation(format!(
                "failed to create audio mix output directory '{}': {e}",
                parent.display()
            ))
        })?;
    }

    let mut bytes = Vec::<u8>::with_capacity(samples_interleaved.len() * 4);
    for &sample in samples_interleaved {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    std::fs::write(out_path, bytes).map_err(|e| {
        ChartreelError::evaluation(format!(
            "failed to write mixed audio file '{}': {e}",
            out_path.display()
        ))
    })
}

#[cfg(test)]
#[path = "../../tests/unit/audio/mix.rs"]
mod tests;
