//! JSON project configuration.
//!
//! A [`ProjectConfig`] is the human-edited description of a video: output format, theme, scenes
//! with their content, audio and render options. [`ProjectConfig::build`] validates it and produces
//! the immutable [`Project`], the [`ProviderRegistry`] that renders its scenes and the
//! [`RenderOpts`] to render with.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{
    audio::{
        effects::EffectStage,
        envelope::{GainEnvelope, GainPoint},
        wav::load_wav,
    },
    composition::{
        model::{AudioRole, AudioTrack, OutputSpec, Project, SceneKind, TransitionSpec},
        timeline::TimelineBuilder,
    },
    foundation::{
        core::{Fps, Resolution, Rgba8Premul},
        error::{ChartreelError, ChartreelResult},
    },
    provider::{
        builtin::{
            ChartData, ChartKind, ChartProvider, ImageProvider, SolidProvider, Theme,
            TitleCardProvider,
        },
        registry::ProviderRegistry,
        svg::SvgRasterizer,
    },
    render::session::RenderOpts,
};

/// Duration of a title scene that does not declare one.
pub const DEFAULT_TITLE_SECS: f64 = 3.0;
/// Gain of background music that does not declare one.
pub const DEFAULT_MUSIC_GAIN: f32 = 0.3;

/// Output format section. Missing fields take the 720p/24fps/48kHz stereo defaults.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Output resolution.
    pub resolution: Resolution,
    /// Output frame rate.
    pub frame_rate: Fps,
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Output channel count.
    pub channels: u16,
}

impl Default for OutputConfig {
    fn default() -> Self {
        let spec = OutputSpec::default();
        Self {
            resolution: spec.resolution,
            frame_rate: spec.frame_rate,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
        }
    }
}

impl OutputConfig {
    fn spec(self) -> OutputSpec {
        OutputSpec {
            resolution: self.resolution,
            frame_rate: self.frame_rate,
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }
}

/// Theme colours as `#rrggbb` strings.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThemeConfig {
    /// Title card background.
    pub title_bg: String,
    /// Chart background.
    pub chart_bg: String,
    /// Title card text.
    pub text: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            title_bg: "#2c3e50".to_owned(),
            chart_bg: "#ecf0f1".to_owned(),
            text: "#ffffff".to_owned(),
        }
    }
}

impl ThemeConfig {
    /// Parse the colours.
    pub fn theme(&self) -> ChartreelResult<Theme> {
        let rgb = |field: &str, s: &str| -> ChartreelResult<[u8; 3]> {
            let c = Rgba8Premul::from_hex(s)
                .map_err(|e| ChartreelError::validation(format!("theme.{field}: {e}")))?;
            Ok([c.r, c.g, c.b])
        };
        Ok(Theme {
            title_bg: rgb("title_bg", &self.title_bg)?,
            chart_bg: rgb("chart_bg", &self.chart_bg)?,
            text: rgb("text", &self.text)?,
        })
    }
}

/// What a scene shows.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum ContentConfig {
    /// Title card with a typed-out title and a fading description.
    Title {
        /// Title text.
        title: String,
        /// Description under the title.
        #[serde(default)]
        description: String,
    },
    /// Animated chart over a `(year, value)` series.
    Chart {
        /// `line`, `bar` or `scatter`.
        #[serde(default = "default_chart_type")]
        chart_type: String,
        /// X values.
        years: Vec<f64>,
        /// Y values, one per year.
        values: Vec<f64>,
        /// Chart heading.
        #[serde(default)]
        title: Option<String>,
        /// Time to reveal the full series. Defaults to the scene duration.
        #[serde(default)]
        reveal_secs: Option<f64>,
    },
    /// Constant colour.
    Solid {
        /// `#rrggbb` or `#rrggbbaa`.
        color: String,
    },
    /// Still image file.
    Image {
        /// Image path, relative to the configuration file.
        path: PathBuf,
    },
}

fn default_chart_type() -> String {
    "line".to_owned()
}

impl ContentConfig {
    fn default_kind(&self) -> SceneKind {
        match self {
            Self::Title { .. } => SceneKind::Title,
            Self::Chart { .. } => SceneKind::Chart,
            Self::Solid { .. } | Self::Image { .. } => SceneKind::Custom,
        }
    }
}

/// Narration attached to a voiceover scene.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VoiceConfig {
    /// WAV file, relative to the configuration file.
    pub path: PathBuf,
    /// Delay after the scene start, in seconds.
    #[serde(default)]
    pub offset: f64,
    /// Constant gain.
    #[serde(default = "unity")]
    pub gain: f32,
    /// Effects chain.
    #[serde(default)]
    pub effects: Vec<EffectStage>,
}

fn unity() -> f32 {
    1.0
}

/// One scene.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneConfig {
    /// Unique scene id.
    pub id: String,
    /// Scene kind; derived from the content and voice when omitted.
    #[serde(default)]
    pub kind: Option<SceneKind>,
    /// Duration in seconds. Title scenes default to three seconds and voiceover scenes to the
    /// length of their narration.
    #[serde(default)]
    pub duration: Option<f64>,
    /// Visual content.
    pub content: ContentConfig,
    /// Transition from the previous scene. A cut when omitted.
    #[serde(default)]
    pub transition_in: Option<TransitionSpec>,
    /// Narration, only on voiceover scenes.
    #[serde(default)]
    pub voice: Option<VoiceConfig>,
}

impl SceneConfig {
    fn resolved_kind(&self) -> ChartreelResult<SceneKind> {
        match (self.kind, &self.voice) {
            (Some(kind), Some(_)) if kind != SceneKind::Voiceover => {
                Err(ChartreelError::validation(format!(
                    "scene '{}' carries a voice but is not a voiceover scene",
                    self.id
                )))
            }
            (Some(kind), _) => Ok(kind),
            (None, Some(_)) => Ok(SceneKind::Voiceover),
            (None, None) => Ok(self.content.default_kind()),
        }
    }
}

/// Background music.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MusicConfig {
    /// WAV file, relative to the configuration file.
    pub path: PathBuf,
    /// Constant gain, `0.3` by default.
    #[serde(default = "default_music_gain")]
    pub gain: f32,
    /// Timeline start in seconds.
    #[serde(default)]
    pub start_time: f64,
    /// Effects chain.
    #[serde(default)]
    pub effects: Vec<EffectStage>,
}

fn default_music_gain() -> f32 {
    DEFAULT_MUSIC_GAIN
}

/// Any other audio track.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackConfig {
    /// Unique track id.
    pub id: String,
    /// Mixing role.
    pub role: AudioRole,
    /// WAV file, relative to the configuration file.
    pub path: PathBuf,
    /// Timeline start in seconds.
    #[serde(default)]
    pub start_time: f64,
    /// Gain automation; unity when omitted.
    #[serde(default)]
    pub gain_envelope: Option<GainEnvelope>,
    /// Effects chain.
    #[serde(default)]
    pub effects: Vec<EffectStage>,
}

/// Whole project configuration.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Output format.
    #[serde(default)]
    pub output: OutputConfig,
    /// Colours of the built-in providers.
    #[serde(default)]
    pub theme: ThemeConfig,
    /// Extra font directories for title and chart text.
    #[serde(default)]
    pub fonts: Vec<PathBuf>,
    /// Scenes in playback order.
    pub scenes: Vec<SceneConfig>,
    /// Background music.
    #[serde(default)]
    pub music: Option<MusicConfig>,
    /// Additional audio tracks.
    #[serde(default)]
    pub tracks: Vec<TrackConfig>,
    /// Render options.
    #[serde(default)]
    pub render: RenderOpts,
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

/// A validated project ready to render.
#[derive(Debug)]
pub struct LoadedProject {
    /// The composition input.
    pub project: Project,
    /// One provider per scene, keyed by scene id.
    pub providers: ProviderRegistry,
    /// Render options from the configuration.
    pub opts: RenderOpts,
}

impl ProjectConfig {
    /// Parse a configuration from a JSON reader. Relative paths resolve against the working
    /// directory.
    pub fn from_reader<R: std::io::Read>(r: R) -> ChartreelResult<Self> {
        serde_json::from_reader(r)
            .map_err(|e| ChartreelError::serde(format!("parse project JSON: {e}")))
    }

    /// Parse a configuration from a JSON string.
    pub fn from_json_str(s: &str) -> ChartreelResult<Self> {
        serde_json::from_str(s)
            .map_err(|e| ChartreelError::serde(format!("parse project JSON: {e}")))
    }

    /// Parse a configuration file. Relative paths inside it resolve against its directory.
    pub fn from_path(path: impl AsRef<Path>) -> ChartreelResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            ChartreelError::validation(format!("open project JSON '{}': {e}", path.display()))
        })?;
        let mut cfg = Self::from_reader(BufReader::new(f))?;
        cfg.base_dir = path.parent().map(Path::to_path_buf);
        Ok(cfg)
    }

    /// Resolve relative paths against `dir` instead of the working directory.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    fn resolve(&self, p: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if p.is_relative() => base.join(p),
            _ => p.to_path_buf(),
        }
    }

    /// Check everything that can be checked without touching the filesystem.
    pub fn validate(&self) -> ChartreelResult<()> {
        if self.scenes.is_empty() {
            return Err(ChartreelError::validation(
                "project must declare at least one scene",
            ));
        }
        self.output.spec().validate()?;
        self.theme.theme()?;
        for (i, scene) in self.scenes.iter().enumerate() {
            if i == 0 && scene.transition_in.is_some() {
                return Err(ChartreelError::validation(format!(
                    "first scene '{}' cannot have an incoming transition",
                    scene.id
                )));
            }
            scene.resolved_kind()?;
            if scene.duration.is_none()
                && scene.voice.is_none()
                && !matches!(scene.content, ContentConfig::Title { .. })
            {
                return Err(ChartreelError::validation(format!(
                    "scene '{}' needs a duration",
                    scene.id
                )));
            }
            match &scene.content {
                ContentConfig::Chart {
                    chart_type,
                    years,
                    values,
                    ..
                } => {
                    ChartKind::parse(chart_type).map_err(|e| {
                        ChartreelError::validation(format!("scene '{}': {e}", scene.id))
                    })?;
                    ChartData::new(years.clone(), values.clone()).map_err(|e| {
                        ChartreelError::validation(format!("scene '{}': {e}", scene.id))
                    })?;
                }
                ContentConfig::Solid { color } => {
                    Rgba8Premul::from_hex(color)?;
                }
                ContentConfig::Title { .. } | ContentConfig::Image { .. } => {}
            }
        }
        self.render.validate()
    }

    /// Validate and build with system fonts plus the configured font directories.
    pub fn build(&self) -> ChartreelResult<LoadedProject> {
        let dirs: Vec<PathBuf> = self.fonts.iter().map(|d| self.resolve(d)).collect();
        let dirs: Vec<&Path> = dirs.iter().map(PathBuf::as_path).collect();
        self.build_with(SvgRasterizer::with_system_fonts(&dirs))
    }

    /// Validate and build, rasterizing text with `raster`.
    #[tracing::instrument(skip_all, fields(scenes = self.scenes.len()))]
    pub fn build_with(&self, raster: SvgRasterizer) -> ChartreelResult<LoadedProject> {
        self.validate()?;
        let output = self.output.spec();
        let canvas = output.canvas();
        let theme = self.theme.theme()?;

        // Voices are decoded first: they can set their scene's duration.
        let mut voices = Vec::with_capacity(self.scenes.len());
        for scene in &self.scenes {
            let voice = match &scene.voice {
                Some(v) => Some((v, load_wav(&self.resolve(&v.path))?)),
                None => None,
            };
            voices.push(voice);
        }

        let mut builder = TimelineBuilder::new();
        let mut providers = ProviderRegistry::new();
        for (scene, voice) in self.scenes.iter().zip(&voices) {
            let duration = match (scene.duration, voice, &scene.content) {
                (Some(d), _, _) => d,
                (None, Some((v, src)), _) => v.offset.max(0.0) + src.duration_secs(),
                (None, None, ContentConfig::Title { .. }) => DEFAULT_TITLE_SECS,
                (None, None, _) => {
                    return Err(ChartreelError::validation(format!(
                        "scene '{}' needs a duration",
                        scene.id
                    )));
                }
            };
            if let Some(t) = &scene.transition_in {
                builder = builder.transition(t.clone());
            }
            builder = builder.scene(
                scene.id.as_str(),
                scene.resolved_kind()?,
                duration,
                scene.id.as_str(),
            );

            match &scene.content {
                ContentConfig::Title { title, description } => {
                    providers.register(
                        scene.id.as_str(),
                        Arc::new(TitleCardProvider::new(
                            raster.clone(),
                            canvas,
                            theme,
                            title.as_str(),
                            description.as_str(),
                        )),
                    );
                }
                ContentConfig::Chart {
                    chart_type,
                    years,
                    values,
                    title,
                    reveal_secs,
                } => {
                    let mut chart = ChartProvider::new(
                        raster.clone(),
                        canvas,
                        theme,
                        ChartKind::parse(chart_type)?,
                        ChartData::new(years.clone(), values.clone())?,
                        reveal_secs.unwrap_or(duration),
                    )?;
                    if let Some(t) = title {
                        chart = chart.with_title(t.as_str());
                    }
                    providers.register(scene.id.as_str(), Arc::new(chart));
                }
                ContentConfig::Solid { color } => {
                    providers.register(
                        scene.id.as_str(),
                        Arc::new(SolidProvider::new(canvas, Rgba8Premul::from_hex(color)?)),
                    );
                }
                ContentConfig::Image { path } => {
                    providers.register(
                        scene.id.as_str(),
                        Arc::new(ImageProvider::from_path(&self.resolve(path), canvas)?),
                    );
                }
            }
        }
        let timeline = builder.build()?;

        let mut tracks = Vec::new();
        for (i, voice) in voices.into_iter().enumerate() {
            let Some((v, source)) = voice else {
                continue;
            };
            let scene = &timeline.scenes()[i];
            let mut track = AudioTrack::new(
                format!("voice:{}", scene.id),
                AudioRole::Voice,
                source,
                scene.start_time + v.offset,
            );
            track.gain_envelope = constant_gain(v.gain)?;
            track.effects = v.effects.clone();
            tracks.push(track);
        }
        if let Some(m) = &self.music {
            let mut track = AudioTrack::new(
                "music",
                AudioRole::Music,
                load_wav(&self.resolve(&m.path))?,
                m.start_time,
            );
            track.gain_envelope = constant_gain(m.gain)?;
            track.effects = m.effects.clone();
            tracks.push(track);
        }
        for t in &self.tracks {
            let mut track = AudioTrack::new(
                t.id.as_str(),
                t.role,
                load_wav(&self.resolve(&t.path))?,
                t.start_time,
            );
            if let Some(env) = &t.gain_envelope {
                env.validate()?;
                track.gain_envelope = env.clone();
            }
            track.effects = t.effects.clone();
            tracks.push(track);
        }

        let project = Project::new(timeline, tracks, output)?;
        tracing::info!(
            scenes = project.timeline().scenes().len(),
            tracks = project.tracks().len(),
            duration = project.total_duration(),
            "project loaded"
        );
        Ok(LoadedProject {
            project,
            providers,
            opts: self.render.clone(),
        })
    }
}

fn constant_gain(gain: f32) -> ChartreelResult<GainEnvelope> {
    GainEnvelope::from_points(vec![GainPoint { time: 0.0, gain }])
}

#[cfg(test)]
#[path = "../../tests/unit/composition/config.rs"]
mod tests;
