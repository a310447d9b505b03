use super::*;
use crate::composition::timeline::TimelineBuilder;

fn timeline() -> Timeline {
    TimelineBuilder::new()
        .scene("a", SceneKind::Title, 5.0, "solid")
        .transition(TransitionSpec::new("fade", 1.0, Ease::Linear))
        .scene("b", SceneKind::Chart, 5.0, "solid")
        .build()
        .unwrap()
}

fn tone(id: &str, role: AudioRole, secs: f64) -> AudioTrack {
    let frames = (secs * 8_000.0) as usize;
    AudioTrack::new(id, role, AudioSource::new(8_000, 1, vec![0.1; frames]), 0.0)
}

#[test]
fn output_counts_follow_rounding_rules() {
    let out = OutputSpec {
        resolution: Resolution::Custom([64, 36]),
        frame_rate: Fps::new(30_000, 1_001).unwrap(),
        sample_rate: 44_100,
        channels: 2,
    };
    assert_eq!(out.frame_count(9.0), 270);
    assert_eq!(out.sample_frames(9.0), 396_900);
    assert_eq!(out.sample_count(9.0), 793_800);
}

#[test]
fn project_exposes_timeline_duration_and_frame_count() {
    let project = Project::new(timeline(), vec![], OutputSpec::default()).unwrap();
    assert!((project.total_duration() - 9.0).abs() < 1e-12);
    assert_eq!(project.frame_count(), 216);
    assert_eq!(project.output().canvas().width, 1280);
}

#[test]
fn project_rejects_bad_tracks_and_output() {
    let dup = Project::new(
        timeline(),
        vec![tone("m", AudioRole::Music, 1.0), tone("m", AudioRole::Fx, 1.0)],
        OutputSpec::default(),
    );
    assert!(dup.is_err());

    let mut ragged = tone("v", AudioRole::Voice, 1.0);
    ragged.source = AudioSource::new(8_000, 2, vec![0.0; 3]);
    assert!(Project::new(timeline(), vec![ragged], OutputSpec::default()).is_err());

    let surround = OutputSpec {
        channels: 6,
        ..OutputSpec::default()
    };
    assert!(Project::new(timeline(), vec![], surround).is_err());
}

#[test]
fn track_window_and_overlap() {
    let mut t = tone("v", AudioRole::Voice, 2.0);
    t.start_time = 2.0;
    assert!((t.end_time() - 4.0).abs() < 1e-12);
    assert!(t.overlaps(3.9, 5.0));
    assert!(!t.overlaps(4.0, 5.0));
    assert!(!t.overlaps(0.0, 2.0));
}

#[test]
fn transition_spec_deserializes_with_defaults() {
    let spec: TransitionSpec = serde_json::from_str(r#"{ "kind": "slide", "duration": 0.5 }"#).unwrap();
    assert_eq!(spec.ease, Ease::Linear);
    assert!(spec.params.is_null());
    let scene: SceneKind = serde_json::from_str(r#""voiceover""#).unwrap();
    assert_eq!(scene, SceneKind::Voiceover);
}
