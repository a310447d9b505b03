use std::ffi::OsString;
use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use anyhow::Context as _;

use crate::audio::mix::write_mix_to_f32le_file;
use crate::export::sink::{FrameSink, SinkConfig};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{ChartreelError, ChartreelResult};
use crate::foundation::math::mul_div255_u16;
use crate::render::frame::FrameRGBA;

/// Options for [`FfmpegSink`].
#[derive(Clone, Debug)]
pub struct FfmpegSinkOpts {
    /// Output MP4 path.
    pub out_path: PathBuf,
    /// Replace an existing file at `out_path`.
    pub overwrite: bool,
}

impl FfmpegSinkOpts {
    /// Write to `out_path`, overwriting.
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
        }
    }
}

/// Encodes to H.264/AAC MP4 through the system `ffmpeg`.
///
/// The mixed track is staged as raw `f32le` next to an encoder log in the temp directory. The
/// encoder starts on the first frame, reading opaque RGBA rows from stdin. Staged files are
/// removed when the sink is finished or dropped.
pub struct FfmpegSink {
    opts: FfmpegSinkOpts,
    cfg: Option<SinkConfig>,
    staging: Staging,
    encoder: Option<(Child, ChildStdin)>,
    rgba: Vec<u8>,
    last_idx: Option<FrameIndex>,
}

impl std::fmt::Debug for FfmpegSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegSink")
            .field("opts", &self.opts)
            .field("encoding", &self.encoder.is_some())
            .field("last_idx", &self.last_idx)
            .finish()
    }
}

impl FfmpegSink {
    /// Sink writing to `opts.out_path`.
    pub fn new(opts: FfmpegSinkOpts) -> Self {
        Self {
            opts,
            cfg: None,
            staging: Staging::default(),
            encoder: None,
            rgba: Vec::new(),
            last_idx: None,
        }
    }

    fn started(&self) -> ChartreelResult<SinkConfig> {
        self.cfg
            .ok_or_else(|| ChartreelError::evaluation("ffmpeg sink not started"))
    }

    fn spawn(&mut self, cfg: SinkConfig) -> ChartreelResult<()> {
        let log_path = Staging::temp_path("log");
        let log = File::create(&log_path)
            .with_context(|| format!("create encoder log '{}'", log_path.display()))?;
        self.staging.log = Some(log_path);

        let args = encoder_args(
            &cfg,
            self.staging.audio.as_deref(),
            &self.opts.out_path,
            self.opts.overwrite,
        );
        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::from(log))
            .spawn()
            .map_err(|e| ChartreelError::evaluation(format!("cannot start ffmpeg: {e}")))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ChartreelError::evaluation("ffmpeg stdin unavailable"))?;
        tracing::debug!(
            out = %self.opts.out_path.display(),
            with_audio = self.staging.audio.is_some(),
            "spawned ffmpeg"
        );
        self.encoder = Some((child, stdin));
        Ok(())
    }
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, cfg: SinkConfig) -> ChartreelResult<()> {
        // yuv420p subsamples chroma 2x2.
        if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
            return Err(ChartreelError::validation(format!(
                "MP4 output needs even dimensions, got {}x{}",
                cfg.width, cfg.height
            )));
        }
        if !self.opts.overwrite && self.opts.out_path.exists() {
            return Err(ChartreelError::validation(format!(
                "output file '{}' already exists",
                self.opts.out_path.display()
            )));
        }
        if let Some(parent) = self.opts.out_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create output directory '{}'", parent.display()))?;
        }
        self.rgba = vec![0; cfg.width as usize * cfg.height as usize * 4];
        self.cfg = Some(cfg);
        self.staging = Staging::default();
        self.last_idx = None;
        Ok(())
    }

    fn push_audio(&mut self, samples: &[f32]) -> ChartreelResult<()> {
        self.started()?;
        if self.encoder.is_some() {
            return Err(ChartreelError::evaluation(
                "audio must be pushed before the first frame",
            ));
        }
        if samples.is_empty() {
            return Ok(());
        }
        let path = Staging::temp_path("f32le");
        write_mix_to_f32le_file(samples, &path)?;
        self.staging.audio = Some(path);
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> ChartreelResult<()> {
        let cfg = self.started()?;
        if self.last_idx.is_some_and(|last| idx.0 <= last.0) {
            return Err(ChartreelError::evaluation(format!(
                "frame {} pushed out of order",
                idx.0
            )));
        }
        if (frame.width, frame.height) != (cfg.width, cfg.height) {
            return Err(ChartreelError::validation(format!(
                "frame is {}x{}, encoder expects {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }
        frame.validate()?;
        if self.encoder.is_none() {
            self.spawn(cfg)?;
        }
        opaque_over_black(&mut self.rgba, frame);
        let Some((_, stdin)) = self.encoder.as_mut() else {
            return Err(ChartreelError::evaluation("ffmpeg sink already finished"));
        };
        stdin.write_all(&self.rgba).map_err(|e| {
            ChartreelError::evaluation(format!("write frame {} to ffmpeg: {e}", idx.0))
        })?;
        self.last_idx = Some(idx);
        Ok(())
    }

    fn end(&mut self) -> ChartreelResult<()> {
        let cfg = self.started()?;
        if self.encoder.is_none() {
            self.spawn(cfg)?;
        }
        let Some((mut child, stdin)) = self.encoder.take() else {
            return Err(ChartreelError::evaluation("ffmpeg sink already finished"));
        };
        drop(stdin);
        let status = child
            .wait()
            .map_err(|e| ChartreelError::evaluation(format!("wait for ffmpeg: {e}")))?;
        let log = self.staging.read_log();
        self.staging = Staging::default();
        self.cfg = None;
        if !status.success() {
            return Err(ChartreelError::evaluation(format!(
                "ffmpeg exited with {status}: {}",
                log.trim()
            )));
        }
        Ok(())
    }
}

/// Command line for encoding `cfg`-shaped rawvideo from stdin, muxed with the staged track.
fn encoder_args(
    cfg: &SinkConfig,
    audio: Option<&Path>,
    out: &Path,
    overwrite: bool,
) -> Vec<OsString> {
    fn push(args: &mut Vec<OsString>, items: &[&str]) {
        args.extend(items.iter().map(OsString::from));
    }

    let size = format!("{}x{}", cfg.width, cfg.height);
    let rate = format!("{}/{}", cfg.fps.num, cfg.fps.den);
    let mut args = Vec::new();
    push(&mut args, &[if overwrite { "-y" } else { "-n" }, "-loglevel", "error"]);
    // rawvideo takes its rate from `-r` before `-i`.
    push(
        &mut args,
        &["-f", "rawvideo", "-pix_fmt", "rgba", "-s", &size, "-r", &rate, "-i", "pipe:0"],
    );
    match audio {
        Some(path) => {
            let sample_rate = cfg.sample_rate.to_string();
            let channels = cfg.channels.to_string();
            push(
                &mut args,
                &["-f", "f32le", "-ar", &sample_rate, "-ac", &channels, "-i"],
            );
            args.push(path.as_os_str().to_owned());
            push(&mut args, &["-c:a", "aac", "-shortest"]);
        }
        None => push(&mut args, &["-an"]),
    }
    push(
        &mut args,
        &["-c:v", "libx264", "-pix_fmt", "yuv420p", "-movflags", "+faststart"],
    );
    args.push(out.as_os_str().to_owned());
    args
}

/// Flatten `frame` over black into opaque RGBA. Premultiplied colour over black is the colour
/// itself.
fn opaque_over_black(dst: &mut [u8], frame: &FrameRGBA) {
    for (d, s) in dst.chunks_exact_mut(4).zip(frame.data.chunks_exact(4)) {
        if frame.premultiplied || s[3] == 255 {
            d[..3].copy_from_slice(&s[..3]);
        } else {
            let a = u16::from(s[3]);
            for (dc, sc) in d[..3].iter_mut().zip(&s[..3]) {
                *dc = mul_div255_u16(u16::from(*sc), a) as u8;
            }
        }
        d[3] = 255;
    }
}

/// Temporary files of one encode, removed on drop.
#[derive(Debug, Default)]
struct Staging {
    audio: Option<PathBuf>,
    log: Option<PathBuf>,
}

impl Staging {
    fn temp_path(ext: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!(
            "chartreel_{}_{nanos}.{ext}",
            std::process::id()
        ))
    }

    fn read_log(&self) -> String {
        self.log
            .as_ref()
            .and_then(|p| std::fs::read(p).ok())
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default()
    }
}

impl Drop for Staging {
    fn drop(&mut self) {
        for path in [self.audio.take(), self.log.take()].into_iter().flatten() {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

#[cfg(test)]
#[path = "../../tests/unit/export/ffmpeg.rs"]
mod tests;
