use super::*;
use crate::foundation::core::FrameIndex;
use crate::render::session::RenderSession;

fn write_tone(path: &Path, sample_rate: u32, frames: usize) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut w = hound::WavWriter::create(path, spec).expect("test wav should be creatable");
    for i in 0..frames {
        let s = ((i as f32 * 0.05).sin() * 8_000.0) as i16;
        w.write_sample(s).expect("sample should be writable");
    }
    w.finalize().expect("wav should finalize");
}

const FULL: &str = r##"{
  "output": {
    "resolution": { "custom": [64, 36] },
    "frame_rate": { "num": 10, "den": 1 },
    "sample_rate": 8000,
    "channels": 1
  },
  "theme": { "chart_bg": "#ffffff" },
  "scenes": [
    { "id": "intro", "content": { "type": "title", "title": "Growth", "description": "2000-2020" } },
    {
      "id": "chart",
      "duration": 4.0,
      "transition_in": { "kind": "fade", "duration": 1.0 },
      "content": { "type": "chart", "chart_type": "bar", "years": [2000, 2001, 2002], "values": [1, 2, 3] }
    },
    {
      "id": "outro",
      "content": { "type": "solid", "color": "#112233" },
      "voice": { "path": "voice.wav" }
    }
  ],
  "music": { "path": "music.wav" },
  "render": { "chunk_size": 8, "parallel": false }
}"##;

#[test]
fn minimal_project_uses_defaults() {
    let cfg = ProjectConfig::from_json_str(
        r##"{ "scenes": [ { "id": "t", "content": { "type": "title", "title": "Hi" } } ] }"##,
    )
    .unwrap();
    assert_eq!(cfg.output, OutputConfig::default());
    assert_eq!(cfg.theme.theme().unwrap(), Theme::default());
    assert_eq!(cfg.render, RenderOpts::default());

    let loaded = cfg.build_with(SvgRasterizer::without_fonts()).unwrap();
    assert_eq!(loaded.project.total_duration(), DEFAULT_TITLE_SECS);
    assert_eq!(loaded.project.output().canvas().width, 1280);
    assert_eq!(loaded.project.frame_count(), 72);
    assert_eq!(
        loaded.project.timeline().scenes()[0].kind,
        SceneKind::Title
    );
    assert_eq!(loaded.providers.len(), 1);
    assert!(loaded.project.tracks().is_empty());
}

#[test]
fn full_project_builds_scenes_voice_and_music() {
    let dir = tempfile::tempdir().unwrap();
    write_tone(&dir.path().join("voice.wav"), 8_000, 16_000);
    write_tone(&dir.path().join("music.wav"), 8_000, 8_000);
    let path = dir.path().join("project.json");
    std::fs::write(&path, FULL).unwrap();

    let cfg = ProjectConfig::from_path(&path).unwrap();
    let loaded = cfg.build_with(SvgRasterizer::without_fonts()).unwrap();
    let tl = loaded.project.timeline();
    let starts: Vec<f64> = tl.scenes().iter().map(|s| s.start_time).collect();
    assert_eq!(starts, vec![0.0, 2.0, 6.0]);
    assert_eq!(tl.scenes()[2].kind, SceneKind::Voiceover);
    assert_eq!(tl.scenes()[2].duration, 2.0);
    assert_eq!(loaded.project.total_duration(), 8.0);

    let tracks = loaded.project.tracks();
    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[0].id, "voice:outro");
    assert_eq!(tracks[0].role, AudioRole::Voice);
    assert_eq!(tracks[0].start_time, 6.0);
    assert_eq!(tracks[1].role, AudioRole::Music);
    assert_eq!(tracks[1].gain_envelope.gain_at(0.5), DEFAULT_MUSIC_GAIN);

    assert_eq!(loaded.opts.chunk_size, 8);
    assert!(!loaded.opts.parallel);

    let session = RenderSession::new(loaded.project, &loaded.providers, loaded.opts).unwrap();
    let mid_fade = session.render_frame(FrameIndex(25)).unwrap();
    assert_eq!((mid_fade.width, mid_fade.height), (64, 36));
    let outro = session.render_frame(FrameIndex(70)).unwrap();
    assert_eq!(outro.pixel(10, 10), [0x11, 0x22, 0x33, 255]);
}

#[test]
fn unknown_chart_type_lists_valid_types() {
    let err = ProjectConfig::from_json_str(
        r##"{ "scenes": [ { "id": "c", "duration": 2.0,
             "content": { "type": "chart", "chart_type": "pie", "years": [1], "values": [1] } } ] }"##,
    )
    .unwrap()
    .validate()
    .unwrap_err();
    assert!(matches!(err, ChartreelError::Validation(_)));
    assert!(err.to_string().contains("line, bar, scatter"), "{err}");
}

#[test]
fn structural_mistakes_are_rejected() {
    let cases = [
        r##"{ "scenes": [] }"##,
        r##"{ "scenes": [ { "id": "s", "content": { "type": "solid", "color": "#000000" } } ] }"##,
        r##"{ "scenes": [ { "id": "s", "duration": 1.0,
             "transition_in": { "kind": "fade", "duration": 0.5 },
             "content": { "type": "solid", "color": "#000000" } } ] }"##,
        r##"{ "scenes": [ { "id": "s", "kind": "title", "voice": { "path": "v.wav" },
             "content": { "type": "title", "title": "x" } } ] }"##,
        r##"{ "scenes": [ { "id": "s", "duration": 1.0,
             "content": { "type": "solid", "color": "blue" } } ] }"##,
        r##"{ "theme": { "text": "#12" },
             "scenes": [ { "id": "t", "content": { "type": "title", "title": "x" } } ] }"##,
        r##"{ "render": { "threads": 2, "mix": { "window_secs": 0.0 } },
             "scenes": [ { "id": "t", "content": { "type": "title", "title": "x" } } ] }"##,
    ];
    for json in cases {
        let cfg = ProjectConfig::from_json_str(json).unwrap();
        assert!(cfg.validate().is_err(), "accepted: {json}");
    }
}

#[test]
fn unknown_fields_fail_to_parse() {
    let err = ProjectConfig::from_json_str(
        r##"{ "scenes": [ { "id": "t", "content": { "type": "title", "title": "x" } } ], "fsp": 30 }"##,
    )
    .unwrap_err();
    assert!(matches!(err, ChartreelError::Serde(_)));
    let err = ProjectConfig::from_json_str(
        r##"{ "scenes": [ { "id": "t", "content": { "type": "video", "path": "a.mp4" } } ] }"##,
    )
    .unwrap_err();
    assert!(matches!(err, ChartreelError::Serde(_)));
}

#[test]
fn overlong_transition_is_an_invalid_timeline() {
    let err = ProjectConfig::from_json_str(
        r##"{ "scenes": [
             { "id": "a", "duration": 1.0, "content": { "type": "solid", "color": "#ff0000" } },
             { "id": "b", "duration": 5.0, "transition_in": { "kind": "fade", "duration": 2.0 },
               "content": { "type": "solid", "color": "#00ff00" } } ] }"##,
    )
    .unwrap()
    .build_with(SvgRasterizer::without_fonts())
    .unwrap_err();
    assert!(matches!(err, ChartreelError::InvalidTimeline(_)), "{err}");
}

#[test]
fn missing_audio_file_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let err = ProjectConfig::from_json_str(
        r##"{ "scenes": [ { "id": "t", "content": { "type": "title", "title": "x" } } ],
             "music": { "path": "nowhere.wav", "gain": 0.5 } }"##,
    )
    .unwrap()
    .with_base_dir(dir.path())
    .build_with(SvgRasterizer::without_fonts())
    .unwrap_err();
    assert!(err.to_string().contains("nowhere.wav"), "{err}");
}

#[test]
fn explicit_tracks_keep_their_envelope() {
    let dir = tempfile::tempdir().unwrap();
    write_tone(&dir.path().join("sting.wav"), 8_000, 4_000);
    let loaded = ProjectConfig::from_json_str(
        r##"{ "scenes": [ { "id": "t", "content": { "type": "title", "title": "x" } } ],
             "tracks": [ { "id": "sting", "role": "fx", "path": "sting.wav", "start_time": 1.0,
                           "gain_envelope": [ { "time": 0.0, "gain": 0.0 }, { "time": 0.5, "gain": 1.0 } ],
                           "effects": [ { "type": "normalization" } ] } ] }"##,
    )
    .unwrap()
    .with_base_dir(dir.path())
    .build_with(SvgRasterizer::without_fonts())
    .unwrap();
    let track = &loaded.project.tracks()[0];
    assert_eq!(track.role, AudioRole::Fx);
    assert_eq!(track.gain_envelope.points().len(), 2);
    assert!((track.gain_envelope.gain_at(0.25) - 0.5).abs() < 1e-6);
    assert_eq!(track.effects.len(), 1);
}
