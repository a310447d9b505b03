//! chartreel composes data-driven explainer videos.
//!
//! A video is an ordered timeline of scenes (title cards, animated charts, voiceover segments)
//! joined by transitions, plus audio tracks mixed with voice-over ducking. The public API is
//! session-oriented:
//!
//! - Load a [`ProjectConfig`] or assemble a [`Project`] directly
//! - Register a [`FrameProvider`] per scene content in a [`ProviderRegistry`]
//! - Create a [`RenderSession`] and render into a [`FrameSink`]
//!
//! Every render is checked by a quality gate (black or frozen runs, provider failures, clipping,
//! exact frame and sample counts) with bounded targeted repair before anything reaches the sink.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

pub(crate) mod animation;
pub(crate) mod audio;
pub(crate) mod composition;
pub(crate) mod effects;
pub(crate) mod eval;
pub(crate) mod export;
pub(crate) mod provider;
pub(crate) mod quality;
pub(crate) mod render;

pub use crate::foundation::core::{Canvas, Fps, FrameIndex, FrameRange, Resolution, Rgba8Premul};
pub use crate::foundation::error::{ChartreelError, ChartreelResult};

pub use crate::animation::ease::Ease;
pub use crate::audio::effects::{EffectStage, apply_chain};
pub use crate::audio::envelope::{GainEnvelope, GainPoint};
pub use crate::audio::mix::{DuckingConfig, MixConfig, MixOverflowWarning, MixReport, Mixer};
pub use crate::audio::resample::resample_interleaved;
pub use crate::audio::wav::{load_wav, load_wav_reader};
pub use crate::composition::config::{
    ContentConfig, DEFAULT_MUSIC_GAIN, DEFAULT_TITLE_SECS, LoadedProject, MusicConfig,
    OutputConfig, ProjectConfig, SceneConfig, ThemeConfig, TrackConfig, VoiceConfig,
};
pub use crate::composition::model::{
    AudioRole, AudioSource, AudioTrack, ContentRef, OutputSpec, Project, Scene, SceneKind,
    TransitionSpec,
};
pub use crate::composition::timeline::{Timeline, TimelineBuilder, Transition};
pub use crate::effects::composite::composite_transition;
pub use crate::effects::transitions::{SlideDir, TransitionKind};
pub use crate::eval::clock::{
    ActiveScene, ActiveSet, FrameClock, active_at, active_at_time, frame_to_sample,
};
pub use crate::export::ffmpeg::{FfmpegSink, FfmpegSinkOpts, is_ffmpeg_on_path};
pub use crate::export::normalize::{FrameRetimer, conform_audio, fit_to_canvas};
pub use crate::export::sink::{FrameSink, InMemorySink, SinkConfig};
pub use crate::provider::builtin::{
    ChartData, ChartKind, ChartProvider, ImageProvider, SolidProvider, Theme, TitleCardProvider,
};
pub use crate::provider::registry::{FrameProvider, ProviderRegistry};
pub use crate::provider::svg::SvgRasterizer;
pub use crate::quality::validator::{Defect, FrameOrigin, QualityConfig, QualityValidator};
pub use crate::render::frame::FrameRGBA;
pub use crate::render::progress::{
    CancelToken, ProgressEvent, ProgressSender, RenderControl, progress_channel,
};
pub use crate::render::session::{ComposedOutput, RenderOpts, RenderSession, RenderStats};
