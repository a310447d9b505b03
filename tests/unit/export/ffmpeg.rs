use super::*;
use crate::foundation::core::Fps;

fn cfg(width: u32, height: u32) -> SinkConfig {
    SinkConfig {
        width,
        height,
        fps: Fps::new(30000, 1001).unwrap(),
        sample_rate: 48_000,
        channels: 2,
        frame_count: 1,
    }
}

fn strings(args: &[OsString]) -> Vec<String> {
    args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
}

#[test]
fn premultiplied_pixels_keep_their_colour_and_become_opaque() {
    let frame = FrameRGBA {
        width: 2,
        height: 1,
        data: vec![40, 20, 10, 128, 0, 0, 0, 0],
        premultiplied: true,
    };
    let mut dst = vec![9u8; 8];
    opaque_over_black(&mut dst, &frame);
    assert_eq!(dst, vec![40, 20, 10, 255, 0, 0, 0, 255]);
}

#[test]
fn straight_alpha_is_multiplied_out() {
    let frame = FrameRGBA {
        width: 1,
        height: 1,
        data: vec![200, 100, 50, 51],
        premultiplied: false,
    };
    let mut dst = vec![0u8; 4];
    opaque_over_black(&mut dst, &frame);
    assert_eq!(dst, vec![40, 20, 10, 255]);
}

#[test]
fn args_mux_the_staged_track_with_rawvideo_from_stdin() {
    let args = strings(&encoder_args(
        &cfg(64, 36),
        Some(Path::new("/tmp/mix.f32le")),
        Path::new("out.mp4"),
        false,
    ));
    assert_eq!(args[0], "-n");
    let r = args.iter().position(|a| a == "-r").unwrap();
    let video_in = args.iter().position(|a| a == "pipe:0").unwrap();
    assert!(r < video_in);
    assert_eq!(args[r + 1], "30000/1001");
    assert!(args.windows(2).any(|w| w[0] == "-s" && w[1] == "64x36"));
    assert!(args.windows(2).any(|w| w[0] == "-ar" && w[1] == "48000"));
    assert!(args.windows(2).any(|w| w[0] == "-i" && w[1] == "/tmp/mix.f32le"));
    assert!(args.contains(&"aac".to_owned()));
    assert!(!args.contains(&"-an".to_owned()));
    assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
}

#[test]
fn args_without_audio_disable_the_audio_stream() {
    let args = strings(&encoder_args(&cfg(64, 36), None, Path::new("o.mp4"), true));
    assert_eq!(args[0], "-y");
    assert!(args.contains(&"-an".to_owned()));
    assert!(!args.contains(&"f32le".to_owned()));
    assert!(args.windows(2).any(|w| w[0] == "-pix_fmt" && w[1] == "yuv420p"));
}

#[test]
fn begin_rejects_odd_dimensions() {
    let mut sink = FfmpegSink::new(FfmpegSinkOpts::new(
        std::env::temp_dir().join("chartreel_odd.mp4"),
    ));
    let err = sink.begin(cfg(3, 2)).unwrap_err();
    assert!(err.to_string().contains("even"));
}

#[test]
fn begin_refuses_to_overwrite_when_asked() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("taken.mp4");
    std::fs::write(&out, b"x").unwrap();
    let mut sink = FfmpegSink::new(FfmpegSinkOpts {
        overwrite: false,
        ..FfmpegSinkOpts::new(&out)
    });
    let err = sink.begin(cfg(4, 4)).unwrap_err();
    assert!(err.to_string().contains("already exists"));
}

#[test]
fn staged_audio_is_removed_on_drop() {
    let mut sink = FfmpegSink::new(FfmpegSinkOpts::new(
        std::env::temp_dir().join("chartreel_never_encoded.mp4"),
    ));
    sink.begin(cfg(4, 4)).unwrap();
    sink.push_audio(&[0.25, -0.25]).unwrap();
    let staged = sink.staging.audio.clone().unwrap();
    assert_eq!(std::fs::metadata(&staged).unwrap().len(), 8);
    drop(sink);
    assert!(!staged.exists());
}

#[test]
fn push_before_begin_fails() {
    let mut sink = FfmpegSink::new(FfmpegSinkOpts::new("unused.mp4"));
    let frame = FrameRGBA {
        width: 2,
        height: 2,
        data: vec![0; 16],
        premultiplied: true,
    };
    assert!(sink.push_frame(FrameIndex(0), &frame).is_err());
    assert!(sink.push_audio(&[0.0]).is_err());
    assert!(sink.end().is_err());
}
