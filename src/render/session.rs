use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, mpsc};

use rayon::prelude::*;

use crate::{
    audio::mix::{MixConfig, Mixer},
    composition::model::Project,
    eval::clock::{ActiveSet, FrameClock, active_at_time},
    export::{
        normalize::{FrameRetimer, conform_audio},
        sink::{FrameSink, SinkConfig},
    },
    effects::composite::composite_transition,
    foundation::{
        core::{Canvas, Fps, FrameIndex, FrameRange, Rgba8Premul},
        error::{ChartreelError, ChartreelResult},
    },
    provider::{adapter::SceneFrames, registry::ProviderRegistry},
    quality::validator::{Defect, FrameOrigin, QualityConfig, QualityValidator},
    render::{
        frame::FrameRGBA,
        progress::{ProgressEvent, RenderControl},
    },
};

const MAX_REORDER_BUFFER_BYTES: u64 = 128 * 1024 * 1024;

/// Options controlling one render.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RenderOpts {
    /// Compute frames of a range in parallel on a dedicated rayon pool.
    pub parallel: bool,
    /// Frames per range. Ranges are the unit of parallelism, progress and cancellation.
    pub chunk_size: usize,
    /// Override the number of rayon worker threads. `None` uses rayon defaults.
    pub threads: Option<usize>,
    /// Bounded channel capacity between frame workers and the collector.
    pub channel_capacity: usize,
    /// Rate at which providers are sampled; frames are duplicated or dropped to reach the output
    /// rate. `None` samples at the output rate.
    pub generation_fps: Option<Fps>,
    /// Audio mixing and ducking.
    pub mix: MixConfig,
    /// Quality gate thresholds and repair budget.
    pub quality: QualityConfig,
}

impl Default for RenderOpts {
    fn default() -> Self {
        Self {
            parallel: true,
            chunk_size: 64,
            threads: None,
            channel_capacity: 4,
            generation_fps: None,
            mix: MixConfig::default(),
            quality: QualityConfig::default(),
        }
    }
}

impl RenderOpts {
    /// Validate the options.
    pub fn validate(&self) -> ChartreelResult<()> {
        if let Some(fps) = self.generation_fps {
            Fps::new(fps.num, fps.den)?;
        }
        self.mix.validate()?;
        self.quality.validate()
    }
}

/// Render statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Output frames.
    pub frames_total: u64,
    /// Frames composed from provider output.
    pub frames_rendered: u64,
    /// Output frames duplicated from a neighbour by frame-rate normalization.
    pub frames_elided: u64,
    /// Provider requests that succeeded on the retry.
    pub provider_retries: u64,
    /// Quality repair rounds performed.
    pub repairs: u64,
    /// Mix overflow recoveries, including those during repairs.
    pub overflow_warnings: u64,
    /// Mixing windows in which music was ducked.
    pub ducked_windows: u64,
}

/// Validated output, held in memory until handoff.
#[derive(Clone, Debug)]
pub struct ComposedOutput {
    /// Frames in timeline order. Consecutive identical frames share one buffer.
    pub frames: Vec<Arc<FrameRGBA>>,
    /// Interleaved master audio.
    pub audio: Vec<f32>,
    /// Statistics of the composition.
    pub stats: RenderStats,
}

#[derive(Debug)]
struct Composed {
    frame: Arc<FrameRGBA>,
    origin: FrameOrigin,
    retries: u64,
}

#[derive(Debug)]
enum Slot {
    Ready(Composed),
    Failed { scene: usize, reason: String },
}

#[derive(Debug)]
struct FrameMsg {
    idx: FrameIndex,
    slot: Arc<Slot>,
}

/// Output frames in timeline order, appended as slots arrive.
#[derive(Debug, Default)]
struct Collected {
    frames: Vec<Arc<FrameRGBA>>,
    origins: Vec<FrameOrigin>,
    failures: BTreeMap<u64, (usize, String)>,
}

impl Collected {
    fn with_capacity(n: usize) -> Self {
        Self {
            frames: Vec::with_capacity(n),
            origins: Vec::with_capacity(n),
            failures: BTreeMap::new(),
        }
    }

    fn len(&self) -> u64 {
        self.frames.len() as u64
    }

    /// Append the next output frame. A frame equal to its predecessor reuses the predecessor's
    /// buffer, so held and static content costs one frame of memory per run.
    fn push(&mut self, slot: &Slot, canvas: Canvas) {
        match slot {
            Slot::Ready(c) => {
                let frame = match self.frames.last() {
                    Some(prev) if Arc::ptr_eq(prev, &c.frame) || **prev == *c.frame => {
                        Arc::clone(prev)
                    }
                    _ => Arc::clone(&c.frame),
                };
                self.frames.push(frame);
                self.origins.push(c.origin);
            }
            Slot::Failed { scene, reason } => {
                self.failures.insert(self.len(), (*scene, reason.clone()));
                self.frames.push(Arc::new(FrameRGBA::solid(
                    canvas,
                    Rgba8Premul::transparent(),
                )));
                self.origins.push(FrameOrigin {
                    primary: *scene,
                    secondary: None,
                    exempt: false,
                    held: false,
                });
            }
        }
    }
}

/// Renders one immutable [`Project`] against its providers.
///
/// Construction resolves every provider and transition up front, so rendering performs no name
/// lookups.
pub struct RenderSession {
    project: Project,
    scenes: SceneFrames,
    clock: FrameClock,
    retimer: FrameRetimer,
    opts: RenderOpts,
}

impl std::fmt::Debug for RenderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderSession")
            .field("clock", &self.clock)
            .field("scenes", &self.scenes)
            .field("opts", &self.opts)
            .finish()
    }
}

impl RenderSession {
    /// Build a session. Fails when a scene's content has no provider.
    pub fn new(
        project: Project,
        providers: &ProviderRegistry,
        opts: RenderOpts,
    ) -> ChartreelResult<Self> {
        opts.validate()?;
        let scenes = SceneFrames::new(project.timeline(), providers, project.output().canvas())?;
        let clock = FrameClock::for_project(&project);
        let retimer = FrameRetimer::new(project.output().frame_rate, opts.generation_fps);
        Ok(Self {
            project,
            scenes,
            clock,
            retimer,
            opts,
        })
    }

    /// The project being rendered.
    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Output frame clock.
    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// Compose a single output frame, without quality checks.
    pub fn render_frame(&self, idx: FrameIndex) -> ChartreelResult<FrameRGBA> {
        if idx.0 >= self.clock.total_frames() {
            return Err(ChartreelError::validation(format!(
                "frame {} is outside the {}-frame output",
                idx.0,
                self.clock.total_frames()
            )));
        }
        Ok(Arc::unwrap_or_clone(self.compose_frame(idx.0)?.frame))
    }

    /// Render, validate and hand the output to `sink`.
    ///
    /// The sink sees `begin`, the audio, every frame in order, then `end`, and nothing at all when
    /// the render fails or is cancelled.
    #[tracing::instrument(skip_all, fields(frames = self.clock.total_frames()))]
    pub fn render(
        &self,
        sink: &mut dyn FrameSink,
        control: &RenderControl,
    ) -> ChartreelResult<RenderStats> {
        let out = self.compose(control)?;
        if control.cancel.is_cancelled() {
            tracing::info!("render cancelled before handoff");
            return Err(ChartreelError::Cancelled);
        }
        self.handoff(&out, sink)?;
        tracing::info!(
            frames = out.stats.frames_total,
            retries = out.stats.provider_retries,
            repairs = out.stats.repairs,
            overflow_warnings = out.stats.overflow_warnings,
            "render finished"
        );
        Ok(out.stats)
    }

    /// Compose and validate the whole output in memory.
    ///
    /// Memory grows with the number of distinct consecutive frames: every change of picture keeps
    /// one canvas-sized buffer (about 3.7 MB at 720p) until handoff. Runs of identical frames
    /// share a single buffer.
    #[tracing::instrument(skip_all, fields(frames = self.clock.total_frames()))]
    pub fn compose(&self, control: &RenderControl) -> ChartreelResult<ComposedOutput> {
        if control.cancel.is_cancelled() {
            return Err(ChartreelError::Cancelled);
        }

        let canvas = self.project.output().canvas();
        let range = self.clock.range();
        let total = range.len_frames();
        let bytes_per_frame = (canvas.rgba8_len() as u64).max(1);
        let max_chunk_by_mem = (MAX_REORDER_BUFFER_BYTES / bytes_per_frame).max(1);
        let chunk_size = normalized_chunk_size(self.opts.chunk_size).min(max_chunk_by_mem);
        let chunks = range.chunks(chunk_size);
        let chunk_ends: Vec<u64> = chunks.iter().map(|c| c.end.0).collect();
        let total_ranges = chunks.len() as u64;
        let cap = self.opts.channel_capacity.max(1);

        let pool = if self.opts.parallel {
            Some(build_thread_pool(self.opts.threads)?)
        } else {
            None
        };

        let mut stats = RenderStats {
            frames_total: total,
            ..RenderStats::default()
        };

        let (produced, collected, mixed) = std::thread::scope(|scope| {
            let audio = scope.spawn(|| -> ChartreelResult<(Mixer, Vec<f32>, RenderStats)> {
                let mixer = Mixer::new(&self.project, self.opts.mix)?;
                let report = mixer.mix();
                let audio_stats = RenderStats {
                    overflow_warnings: report.warnings.len() as u64,
                    ducked_windows: report.ducked_windows,
                    ..RenderStats::default()
                };
                let samples = conform_audio(
                    report.samples,
                    report.sample_rate,
                    report.channels,
                    self.project.output(),
                    self.project.total_duration(),
                )?;
                Ok((mixer, samples, audio_stats))
            });

            let (tx, rx) = mpsc::sync_channel::<FrameMsg>(cap);
            let collector = scope.spawn(move || {
                let mut out = Collected::with_capacity(total as usize);
                let mut pending = HashMap::<u64, Arc<Slot>>::new();
                let mut ends = chunk_ends.into_iter().peekable();
                let mut completed = 0u64;
                while out.len() < total {
                    let next = out.len();
                    if let Some(slot) = pending.remove(&next) {
                        out.push(&slot, canvas);
                        while ends.peek().is_some_and(|&e| out.len() >= e) {
                            ends.next();
                            completed += 1;
                            control.report(ProgressEvent {
                                completed_ranges: completed,
                                total_ranges,
                            });
                        }
                        continue;
                    }
                    match rx.recv() {
                        Ok(msg) => {
                            pending.insert(msg.idx.0, msg.slot);
                        }
                        Err(_) => break,
                    }
                }
                out
            });

            let produced = self.produce(&chunks, pool.as_ref(), &tx, control, &mut stats);
            drop(tx);

            let collected = collector
                .join()
                .map_err(|_| ChartreelError::evaluation("frame collector thread panicked"));
            let mixed = audio
                .join()
                .map_err(|_| ChartreelError::evaluation("audio mix thread panicked"));
            (produced, collected, mixed)
        });
        produced?;
        let collected = collected?;
        if control.cancel.is_cancelled() {
            tracing::info!(
                composed = collected.len(),
                total,
                "render cancelled, partial output discarded"
            );
            return Err(ChartreelError::Cancelled);
        }
        if collected.len() != total {
            return Err(ChartreelError::evaluation(format!(
                "collected {} of {total} frames",
                collected.len()
            )));
        }
        let (mixer, mut audio, audio_stats) = mixed??;
        stats.overflow_warnings = audio_stats.overflow_warnings;
        stats.ducked_windows = audio_stats.ducked_windows;

        let Collected {
            mut frames,
            mut origins,
            mut failures,
        } = collected;

        self.validate_and_repair(
            &mut frames,
            &mut origins,
            &mut failures,
            &mut audio,
            &mixer,
            &mut stats,
        )?;

        Ok(ComposedOutput {
            frames,
            audio,
            stats,
        })
    }

    fn produce(
        &self,
        chunks: &[FrameRange],
        pool: Option<&rayon::ThreadPool>,
        tx: &mpsc::SyncSender<FrameMsg>,
        control: &RenderControl,
        stats: &mut RenderStats,
    ) -> ChartreelResult<()> {
        for chunk in chunks {
            if control.cancel.is_cancelled() {
                tracing::info!(at = chunk.start.0, "cancellation requested, no further ranges");
                return Ok(());
            }
            let (slots, chunk_stats) = self.render_chunk(pool, *chunk)?;
            stats.frames_rendered += chunk_stats.frames_rendered;
            stats.frames_elided += chunk_stats.frames_elided;
            stats.provider_retries += chunk_stats.provider_retries;
            for (f, slot) in (chunk.start.0..chunk.end.0).zip(slots) {
                tx.send(FrameMsg {
                    idx: FrameIndex(f),
                    slot,
                })
                .map_err(|_| ChartreelError::evaluation("frame collector is not accepting frames"))?;
            }
        }
        Ok(())
    }

    /// Compose each distinct generation frame of `chunk` once and map it onto the output frames.
    fn render_chunk(
        &self,
        pool: Option<&rayon::ThreadPool>,
        chunk: FrameRange,
    ) -> ChartreelResult<(Vec<Arc<Slot>>, RenderStats)> {
        let mut uniq = Vec::<u64>::new();
        let mut map = Vec::<usize>::with_capacity(chunk.len_frames() as usize);
        let mut last_gen = None;
        for f in chunk.start.0..chunk.end.0 {
            let g = self.retimer.generation_frame(FrameIndex(f));
            if last_gen != Some(g) {
                uniq.push(f);
                last_gen = Some(g);
            }
            map.push(uniq.len() - 1);
        }

        let rendered: Vec<Slot> = match pool {
            Some(pool) => pool.install(|| {
                uniq.par_iter()
                    .map(|&f| self.compose_slot(f))
                    .collect::<ChartreelResult<Vec<_>>>()
            })?,
            None => uniq
                .iter()
                .map(|&f| self.compose_slot(f))
                .collect::<ChartreelResult<Vec<_>>>()?,
        };

        let provider_retries = rendered
            .iter()
            .map(|s| match s {
                Slot::Ready(c) => c.retries,
                Slot::Failed { .. } => 0,
            })
            .sum();
        let unique: Vec<Arc<Slot>> = rendered.into_iter().map(Arc::new).collect();
        let slots = map.into_iter().map(|u| unique[u].clone()).collect();
        let total = chunk.len_frames();
        let rendered_count = unique.len() as u64;
        Ok((
            slots,
            RenderStats {
                frames_total: total,
                frames_rendered: rendered_count,
                frames_elided: total.saturating_sub(rendered_count),
                provider_retries,
                ..RenderStats::default()
            },
        ))
    }

    fn compose_slot(&self, f: u64) -> ChartreelResult<Slot> {
        match self.compose_frame(f) {
            Ok(c) => Ok(Slot::Ready(c)),
            Err(ChartreelError::ProviderFailure { scene, reason, .. }) => {
                let idx = self.project.timeline().scene_index(&scene).ok_or_else(|| {
                    ChartreelError::evaluation(format!("provider failure names unknown scene '{scene}'"))
                })?;
                tracing::warn!(frame = f, scene = %scene, %reason, "provider failed after retry, deferring to repair");
                Ok(Slot::Failed { scene: idx, reason })
            }
            Err(e) => Err(e),
        }
    }

    fn compose_frame(&self, f: u64) -> ChartreelResult<Composed> {
        let t = self.retimer.generation_time(FrameIndex(f));
        match active_at_time(self.project.timeline(), t)? {
            ActiveSet::Single(s) => {
                let got = self.scenes.fetch(s.index, s.local_time)?;
                Ok(Composed {
                    frame: got.frame,
                    origin: FrameOrigin {
                        primary: s.index,
                        secondary: None,
                        exempt: self.scenes.is_static(s.index),
                        held: self.scenes.is_held(s.index, s.local_time),
                    },
                    retries: u64::from(got.retried),
                })
            }
            ActiveSet::Transition {
                outgoing,
                incoming,
                transition,
                progress,
            } => {
                let a = self.scenes.fetch(outgoing.index, outgoing.local_time)?;
                let b = self.scenes.fetch(incoming.index, incoming.local_time)?;
                let kind = self.project.timeline().transitions()[transition].kind;
                let frame = composite_transition(kind, &a.frame, &b.frame, progress)?;
                Ok(Composed {
                    frame: Arc::new(frame),
                    origin: FrameOrigin {
                        primary: outgoing.index,
                        secondary: Some(incoming.index),
                        exempt: self.scenes.is_static(outgoing.index)
                            && self.scenes.is_static(incoming.index),
                        held: self.scenes.is_held(outgoing.index, outgoing.local_time)
                            && self.scenes.is_held(incoming.index, incoming.local_time),
                    },
                    retries: u64::from(a.retried) + u64::from(b.retried),
                })
            }
        }
    }

    fn validate_and_repair(
        &self,
        frames: &mut [Arc<FrameRGBA>],
        origins: &mut [FrameOrigin],
        failures: &mut BTreeMap<u64, (usize, String)>,
        audio: &mut [f32],
        mixer: &Mixer,
        stats: &mut RenderStats,
    ) -> ChartreelResult<()> {
        let validator = QualityValidator::new(self.opts.quality, *self.project.output());
        let duration = self.project.total_duration();
        let mut round = 0u32;
        loop {
            if let Some(d) = validator
                .check_counts(frames.len(), audio.len(), duration)
                .first()
            {
                return Err(ChartreelError::composition(d.to_string()));
            }
            let mut defects = failure_defects(failures);
            defects.extend(validator.inspect_frames(frames, origins));
            defects.extend(validator.inspect_audio(audio));
            if defects.is_empty() {
                return Ok(());
            }
            if round >= validator.config().max_retries {
                return Err(ChartreelError::composition(format!(
                    "{} quality defect(s) remain after {round} repair round(s), first: {}",
                    defects.len(),
                    defects[0]
                )));
            }
            round += 1;
            stats.repairs += 1;

            for defect in &defects {
                tracing::warn!(round, %defect, "repairing quality defect");
                if let Some(range) = defect.frame_range() {
                    for f in range.start.0..range.end.0 {
                        let i = f as usize;
                        match self.compose_slot(f)? {
                            Slot::Ready(c) => {
                                frames[i] = c.frame;
                                origins[i] = c.origin;
                                stats.provider_retries += c.retries;
                                failures.remove(&f);
                            }
                            Slot::Failed { scene, reason } => {
                                failures.insert(f, (scene, reason));
                            }
                        }
                    }
                } else if let Defect::Clipping {
                    start_frame,
                    end_frame,
                    ..
                } = defect
                {
                    let Some(track) = mixer.loudest_track(*start_frame, *end_frame) else {
                        continue;
                    };
                    let mut trims = BTreeMap::new();
                    trims.insert(track.to_owned(), 0.5f32.powi(round as i32));
                    let warnings = mixer.remix_range(audio, *start_frame, *end_frame, &trims)?;
                    stats.overflow_warnings += warnings.len() as u64;
                }
            }
        }
    }

    fn handoff(&self, out: &ComposedOutput, sink: &mut dyn FrameSink) -> ChartreelResult<()> {
        let output = self.project.output();
        let canvas = output.canvas();
        let cfg = SinkConfig {
            width: canvas.width,
            height: canvas.height,
            fps: output.frame_rate,
            sample_rate: output.sample_rate,
            channels: output.channels,
            frame_count: out.frames.len() as u64,
        };
        let mut last: Option<u64> = None;
        let rejected = |last: Option<u64>, e: ChartreelError| {
            tracing::error!(last_frame = ?last, error = %e, "encoder rejected output");
            ChartreelError::encode_handoff(last, e.to_string())
        };

        sink.begin(cfg).map_err(|e| rejected(last, e))?;
        sink.push_audio(&out.audio).map_err(|e| rejected(last, e))?;
        for (i, frame) in out.frames.iter().enumerate() {
            let idx = i as u64;
            sink.push_frame(FrameIndex(idx), frame)
                .map_err(|e| rejected(last, e))?;
            last = Some(idx);
        }
        sink.end().map_err(|e| rejected(last, e))
    }
}

fn failure_defects(failures: &BTreeMap<u64, (usize, String)>) -> Vec<Defect> {
    let mut out: Vec<Defect> = Vec::new();
    for (&f, (scene, reason)) in failures {
        if let Some(Defect::ProviderFailure {
            scene: s, frames, ..
        }) = out.last_mut()
            && *s == *scene
            && frames.end.0 == f
        {
            frames.end = FrameIndex(f + 1);
            continue;
        }
        out.push(Defect::ProviderFailure {
            scene: *scene,
            frames: FrameRange {
                start: FrameIndex(f),
                end: FrameIndex(f + 1),
            },
            reason: reason.clone(),
        });
    }
    out
}

fn normalized_chunk_size(chunk_size: usize) -> u64 {
    if chunk_size == 0 {
        1
    } else {
        chunk_size as u64
    }
}

fn build_thread_pool(threads: Option<usize>) -> ChartreelResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(ChartreelError::validation(
            "render 'threads' must be >= 1 when set",
        ));
    }
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| ChartreelError::evaluation(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/render/session.rs"]
mod tests;
