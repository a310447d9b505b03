use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "chartreel", version, about = "Compose explainer videos from a JSON project")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render an MP4 video (requires `ffmpeg` on PATH).
    Render(RenderArgs),
    /// Render a single frame as a PNG.
    Frame(FrameArgs),
    /// Print the resolved timeline, audio tracks and output format.
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    /// Fail instead of overwriting an existing output.
    #[arg(long, default_value_t = false)]
    no_overwrite: bool,

    /// Compose frames on a single thread.
    #[arg(long, default_value_t = false)]
    sequential: bool,

    /// Override rayon worker threads.
    #[arg(long)]
    threads: Option<usize>,

    /// Frames per render range.
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Sample providers at this many frames per second and retime to the output rate.
    #[arg(long)]
    generation_fps: Option<u32>,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Frame index (0-based).
    #[arg(long)]
    frame: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Frame(args) => cmd_frame(args),
        Command::Inspect(args) => cmd_inspect(args),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}

fn load(path: &Path) -> anyhow::Result<chartreel::LoadedProject> {
    let cfg = chartreel::ProjectConfig::from_path(path)
        .with_context(|| format!("load project '{}'", path.display()))?;
    let loaded = cfg
        .build()
        .with_context(|| format!("build project '{}'", path.display()))?;
    Ok(loaded)
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let loaded = load(&args.in_path)?;
    let mut opts = loaded.opts;
    if args.sequential {
        opts.parallel = false;
    }
    if args.threads.is_some() {
        opts.threads = args.threads;
    }
    if let Some(chunk) = args.chunk_size {
        opts.chunk_size = chunk;
    }
    if let Some(fps) = args.generation_fps {
        opts.generation_fps = Some(chartreel::Fps::new(fps, 1)?);
    }
    let session = chartreel::RenderSession::new(loaded.project, &loaded.providers, opts)?;

    let mut sink = chartreel::FfmpegSink::new(chartreel::FfmpegSinkOpts {
        overwrite: !args.no_overwrite,
        ..chartreel::FfmpegSinkOpts::new(&args.out)
    });

    let (tx, rx) = chartreel::progress_channel(16);
    let control = chartreel::RenderControl::new().with_progress(tx);
    let stats = std::thread::scope(|scope| {
        let printer = scope.spawn(move || {
            for ev in rx {
                tracing::info!(
                    done = ev.completed_ranges,
                    of = ev.total_ranges,
                    "{:.0}%",
                    ev.ratio() * 100.0
                );
            }
        });
        let res = session.render(&mut sink, &control);
        drop(control);
        let _ = printer.join();
        res
    })?;

    eprintln!(
        "wrote {} ({} frames, {} rendered, {} provider retries, {} repairs, {} overflow warnings)",
        args.out.display(),
        stats.frames_total,
        stats.frames_rendered,
        stats.provider_retries,
        stats.repairs,
        stats.overflow_warnings
    );
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let loaded = load(&args.in_path)?;
    let session = chartreel::RenderSession::new(loaded.project, &loaded.providers, loaded.opts)?;
    let frame = session.render_frame(chartreel::FrameIndex(args.frame))?;

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    image::save_buffer_with_format(
        &args.out,
        &frame.to_straight_rgba8(),
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let loaded = load(&args.in_path)?;
    let project = &loaded.project;
    let output = project.output();
    let canvas = output.canvas();
    println!(
        "output: {}x{} @ {}/{} fps, {} Hz x{}",
        canvas.width,
        canvas.height,
        output.frame_rate.num,
        output.frame_rate.den,
        output.sample_rate,
        output.channels
    );
    println!(
        "duration: {:.3}s ({} frames, {} samples)",
        project.total_duration(),
        project.frame_count(),
        output.sample_count(project.total_duration())
    );

    let timeline = project.timeline();
    for (i, scene) in timeline.scenes().iter().enumerate() {
        if i > 0 {
            let t = &timeline.transitions()[i - 1];
            println!("  -> {} {:.3}s", t.kind.name(), t.duration);
        }
        println!(
            "scene {:<16} {:<10} {:>8.3}s .. {:>8.3}s",
            scene.id,
            format!("{:?}", scene.kind).to_lowercase(),
            scene.start_time,
            scene.end_time()
        );
    }
    for track in project.tracks() {
        println!(
            "track {:<16} {:<10} {:>8.3}s .. {:>8.3}s",
            track.id,
            format!("{:?}", track.role).to_lowercase(),
            track.start_time,
            track.end_time()
        );
    }
    Ok(())
}
