use super::*;
use crate::animation::ease::Ease;
use crate::composition::model::{SceneKind, TransitionSpec};
use crate::composition::timeline::TimelineBuilder;

fn ab_fade() -> Timeline {
    TimelineBuilder::new()
        .scene("a", SceneKind::Title, 5.0, "a")
        .transition(TransitionSpec::new("fade", 1.0, Ease::Linear))
        .scene("b", SceneKind::Chart, 5.0, "b")
        .build()
        .unwrap()
}

#[test]
fn clock_counts_and_timestamps() {
    let fps = Fps::new(24, 1).unwrap();
    let clock = FrameClock::new(fps, 9.0);
    assert_eq!(clock.total_frames(), 216);
    assert_eq!(clock.timestamp(FrameIndex(108)), 4.5);
    assert_eq!(clock.range().len_frames(), 216);
}

#[test]
fn steady_state_has_one_scene() {
    let tl = ab_fade();
    let fps = Fps::new(24, 1).unwrap();
    let ActiveSet::Single(s) = active_at(&tl, fps, FrameIndex(24)).unwrap() else {
        panic!("expected a single scene");
    };
    assert_eq!(s.index, 0);
    assert_eq!(s.local_time, 1.0);

    let ActiveSet::Single(s) = active_at(&tl, fps, FrameIndex(120)).unwrap() else {
        panic!("expected a single scene");
    };
    assert_eq!(s.index, 1);
    assert_eq!(s.local_time, 1.0);
}

#[test]
fn transition_window_orders_outgoing_first() {
    let tl = ab_fade();
    let set = active_at_time(&tl, 4.5).unwrap();
    let ActiveSet::Transition {
        outgoing,
        incoming,
        transition,
        progress,
    } = set
    else {
        panic!("expected a transition");
    };
    assert_eq!((outgoing.index, incoming.index, transition), (0, 1, 0));
    assert_eq!(outgoing.local_time, 4.5);
    assert_eq!(incoming.local_time, 0.5);
    assert!((progress - 0.5).abs() < 1e-12);
}

#[test]
fn window_edges_are_half_open() {
    let tl = ab_fade();
    let ActiveSet::Transition { progress, .. } = active_at_time(&tl, 4.0).unwrap() else {
        panic!("transition starts at the incoming scene's start");
    };
    assert_eq!(progress, 0.0);
    assert!(matches!(
        active_at_time(&tl, 5.0).unwrap(),
        ActiveSet::Single(ActiveScene { index: 1, .. })
    ));
}

#[test]
fn eased_progress_uses_transition_curve() {
    let tl = TimelineBuilder::new()
        .scene("a", SceneKind::Title, 2.0, "a")
        .transition(TransitionSpec::new("zoom", 1.0, Ease::InQuad))
        .scene("b", SceneKind::Title, 2.0, "b")
        .build()
        .unwrap();
    let ActiveSet::Transition { progress, .. } = active_at_time(&tl, 1.5).unwrap() else {
        panic!("expected a transition");
    };
    assert!((progress - 0.25).abs() < 1e-12);
}

#[test]
fn cut_switches_at_the_boundary() {
    let tl = TimelineBuilder::new()
        .scene("a", SceneKind::Title, 2.0, "a")
        .scene("b", SceneKind::Title, 2.0, "b")
        .build()
        .unwrap();
    assert!(matches!(
        active_at_time(&tl, 1.999).unwrap(),
        ActiveSet::Single(ActiveScene { index: 0, .. })
    ));
    assert!(matches!(
        active_at_time(&tl, 2.0).unwrap(),
        ActiveSet::Single(ActiveScene { index: 1, .. })
    ));
}

#[test]
fn outside_the_timeline_is_fatal() {
    let tl = ab_fade();
    for t in [-0.1, 9.0, 12.0, f64::NAN] {
        assert!(matches!(
            active_at_time(&tl, t),
            Err(ChartreelError::InvalidTimeline(_))
        ));
    }
}

#[test]
fn scheduler_is_deterministic() {
    let tl = ab_fade();
    let fps = Fps::new(30, 1).unwrap();
    for i in 0..270 {
        assert_eq!(
            active_at(&tl, fps, FrameIndex(i)).unwrap(),
            active_at(&tl, fps, FrameIndex(i)).unwrap()
        );
    }
}

#[test]
fn scene_frames_cover_active_windows() {
    let tl = ab_fade();
    let clock = FrameClock::new(Fps::new(24, 1).unwrap(), tl.total_duration());
    let a = clock.scene_frames(&tl, 0).unwrap();
    let b = clock.scene_frames(&tl, 1).unwrap();
    assert_eq!((a.start.0, a.end.0), (0, 120));
    assert_eq!((b.start.0, b.end.0), (96, 216));
    assert!(clock.scene_frames(&tl, 2).is_none());
}

#[test]
fn frame_to_sample_uses_rational_fps() {
    let fps = Fps::new(30_000, 1_001).unwrap();
    assert_eq!(frame_to_sample(0, fps, 48_000), 0);
    assert_eq!(frame_to_sample(30_000, fps, 48_000), 48_048_000);
}
