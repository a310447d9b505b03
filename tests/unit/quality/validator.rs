use super::*;
use crate::foundation::core::{Canvas, Resolution, Rgba8Premul};

fn output() -> OutputSpec {
    OutputSpec {
        resolution: Resolution::Custom([2, 2]),
        frame_rate: Fps::new(10, 1).unwrap(),
        sample_rate: 1_000,
        channels: 2,
    }
}

fn validator() -> QualityValidator {
    QualityValidator::new(
        QualityConfig {
            max_black_run_secs: 0.3,
            max_identical_run_secs: 0.5,
            clip_level: 0.999,
            max_clip_run_secs: 0.005,
            max_retries: 1,
        },
        output(),
    )
}

fn solid(v: u8) -> FrameRGBA {
    FrameRGBA::solid(
        Canvas {
            width: 2,
            height: 2,
        },
        Rgba8Premul::from_straight_rgba(v, v, v, 255),
    )
}

fn origin(scene: usize) -> FrameOrigin {
    FrameOrigin {
        primary: scene,
        secondary: None,
        exempt: false,
        held: false,
    }
}

#[test]
fn default_config_is_valid() {
    QualityConfig::default().validate().unwrap();
    let bad = QualityConfig {
        clip_level: 1.5,
        ..QualityConfig::default()
    };
    assert!(bad.validate().is_err());
    let bad = QualityConfig {
        max_black_run_secs: f64::NAN,
        ..QualityConfig::default()
    };
    assert!(bad.validate().is_err());
}

#[test]
fn black_run_beyond_threshold_is_reported() {
    // Threshold is 3 frames; frames 2..6 are black.
    let frames: Vec<FrameRGBA> = (0..8)
        .map(|i| if (2..6).contains(&i) { solid(0) } else { solid(i as u8 + 10) })
        .collect();
    let origins: Vec<FrameOrigin> = (0..8).map(|i| origin(usize::from(i >= 4))).collect();
    let defects = validator().inspect_frames(&frames, &origins);
    assert_eq!(
        defects,
        vec![Defect::BlackRun {
            scenes: vec![0, 1],
            frames: FrameRange::new(FrameIndex(2), FrameIndex(6)).unwrap(),
        }]
    );
    assert!(defects[0].is_repairable());
}

#[test]
fn short_black_run_is_fine() {
    let frames: Vec<FrameRGBA> = (0..6)
        .map(|i| if i < 3 { solid(0) } else { solid(i as u8 + 10) })
        .collect();
    let origins = vec![origin(0); 6];
    assert!(validator().inspect_frames(&frames, &origins).is_empty());
}

#[test]
fn identical_run_beyond_threshold_is_reported() {
    let frames = vec![solid(40); 7];
    let origins = vec![origin(2); 7];
    let defects = validator().inspect_frames(&frames, &origins);
    assert_eq!(defects.len(), 1);
    let Defect::IdenticalRun { scenes, frames } = &defects[0] else {
        panic!("expected an identical run");
    };
    assert_eq!(scenes, &vec![2]);
    assert_eq!(frames.len_frames(), 7);
}

#[test]
fn static_scenes_are_exempt() {
    let frames = vec![solid(0); 20];
    let origins = vec![
        FrameOrigin {
            primary: 0,
            secondary: None,
            exempt: true,
            held: false,
        };
        20
    ];
    assert!(validator().inspect_frames(&frames, &origins).is_empty());
}

#[test]
fn settled_content_may_repeat_but_not_go_black() {
    let held = FrameOrigin {
        held: true,
        ..origin(0)
    };
    let frames = vec![solid(90); 20];
    assert!(validator().inspect_frames(&frames, &vec![held; 20]).is_empty());

    let black = vec![solid(0); 20];
    let defects = validator().inspect_frames(&black, &vec![held; 20]);
    assert_eq!(defects.len(), 1);
    assert!(matches!(defects[0], Defect::BlackRun { .. }));
}

#[test]
fn shared_frames_are_inspected_like_owned_ones() {
    let frame = std::sync::Arc::new(solid(90));
    let frames = vec![frame; 8];
    let defects = validator().inspect_frames(&frames, &vec![origin(1); 8]);
    assert_eq!(
        defects,
        vec![Defect::IdenticalRun {
            scenes: vec![1],
            frames: FrameRange::new(FrameIndex(0), FrameIndex(8)).unwrap(),
        }]
    );
}

#[test]
fn changing_frames_pass() {
    let frames: Vec<FrameRGBA> = (0..30).map(|i| solid(i as u8 + 1)).collect();
    let origins = vec![origin(0); 30];
    assert!(validator().inspect_frames(&frames, &origins).is_empty());
}

#[test]
fn sustained_clipping_is_reported() {
    // 5 sample frames allowed; frames 100..110 clip on the right channel.
    let mut samples = vec![0.1f32; 2 * 1_000];
    for f in 100..110 {
        samples[f * 2 + 1] = -1.0;
    }
    samples[500 * 2] = 1.0;
    let defects = validator().inspect_audio(&samples);
    assert_eq!(
        defects,
        vec![Defect::Clipping {
            start_frame: 100,
            end_frame: 110,
            peak: 1.0,
        }]
    );
}

#[test]
fn counts_must_match_output_spec() {
    let v = validator();
    assert!(v.check_counts(20, 4_000, 2.0).is_empty());
    let defects = v.check_counts(19, 3_998, 2.0);
    assert_eq!(
        defects,
        vec![
            Defect::FrameCount {
                expected: 20,
                actual: 19
            },
            Defect::SampleCount {
                expected: 4_000,
                actual: 3_998
            },
        ]
    );
    assert!(defects.iter().all(|d| !d.is_repairable()));
    assert!(defects[0].to_string().contains("expected 20 frames"));
}

#[test]
fn fingerprints_distinguish_content() {
    assert_eq!(FrameFingerprint::of(&solid(5)), FrameFingerprint::of(&solid(5)));
    assert_ne!(FrameFingerprint::of(&solid(5)), FrameFingerprint::of(&solid(6)));
}
