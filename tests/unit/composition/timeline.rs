use super::*;
use proptest::prelude::*;

fn scene(id: &str, start: f64, duration: f64) -> Scene {
    Scene {
        id: id.to_string(),
        kind: SceneKind::Custom,
        start_time: start,
        duration,
        content_ref: ContentRef::new(id),
    }
}

fn fade(duration: f64) -> TransitionSpec {
    TransitionSpec::new("fade", duration, Ease::Linear)
}

#[test]
fn fade_overlap_shortens_total_duration() {
    let tl = Timeline::new(
        vec![scene("a", 0.0, 5.0), scene("b", 4.0, 5.0)],
        vec![fade(1.0)],
    )
    .unwrap();
    assert!((tl.total_duration() - 9.0).abs() < 1e-12);
    assert_eq!(tl.transitions()[0].kind, TransitionKind::Fade);
    assert_eq!(tl.scene_index("b"), Some(1));
    assert_eq!(tl.scene_window(1), Some((4.0, 9.0)));
}

#[test]
fn transition_as_long_as_shorter_scene_is_accepted() {
    let tl = Timeline::new(
        vec![scene("a", 0.0, 5.0), scene("b", 3.0, 2.0)],
        vec![fade(2.0)],
    )
    .unwrap();
    assert!((tl.total_duration() - 5.0).abs() < 1e-12);
}

#[test]
fn transition_longer_than_margin_is_rejected() {
    let err = Timeline::new(
        vec![scene("a", 0.0, 5.0), scene("b", 2.5, 2.0)],
        vec![fade(2.5)],
    )
    .unwrap_err();
    assert!(matches!(err, ChartreelError::InvalidTimeline(_)));
}

#[test]
fn margins_account_for_the_other_transition() {
    // b lasts 3s but already spends 2s fading in, so it can spare only 1s for its exit.
    let err = Timeline::new(
        vec![scene("a", 0.0, 4.0), scene("b", 2.0, 3.0), scene("c", 3.0, 4.0)],
        vec![fade(2.0), fade(2.0)],
    )
    .unwrap_err();
    assert!(matches!(err, ChartreelError::InvalidTimeline(_)));
}

#[test]
fn gaps_and_unconsumed_overlaps_are_rejected() {
    let gap = Timeline::new(
        vec![scene("a", 0.0, 5.0), scene("b", 5.5, 5.0)],
        vec![TransitionSpec::cut()],
    )
    .unwrap_err();
    assert!(gap.to_string().contains("gap"));

    let overlap = Timeline::new(
        vec![scene("a", 0.0, 5.0), scene("b", 3.0, 5.0)],
        vec![fade(1.0)],
    )
    .unwrap_err();
    assert!(overlap.to_string().contains("overlap"));

    let late_first = Timeline::new(vec![scene("a", 1.0, 5.0)], vec![]).unwrap_err();
    assert!(matches!(late_first, ChartreelError::InvalidTimeline(_)));
}

#[test]
fn cut_with_duration_is_rejected() {
    let err = Timeline::new(
        vec![scene("a", 0.0, 5.0), scene("b", 4.0, 5.0)],
        vec![TransitionSpec::new("cut", 1.0, Ease::Linear)],
    )
    .unwrap_err();
    assert!(matches!(err, ChartreelError::InvalidTimeline(_)));
}

#[test]
fn transition_count_must_match_joins() {
    let err = Timeline::new(vec![scene("a", 0.0, 5.0), scene("b", 5.0, 5.0)], vec![]).unwrap_err();
    assert!(matches!(err, ChartreelError::InvalidTimeline(_)));
    assert!(Timeline::new(vec![], vec![]).is_err());
}

#[test]
fn duplicate_ids_and_bad_durations_are_rejected() {
    assert!(
        Timeline::new(
            vec![scene("a", 0.0, 5.0), scene("a", 5.0, 5.0)],
            vec![TransitionSpec::cut()],
        )
        .is_err()
    );
    assert!(Timeline::new(vec![scene("a", 0.0, 0.0)], vec![]).is_err());
    assert!(Timeline::new(vec![scene("a", 0.0, f64::NAN)], vec![]).is_err());
}

#[test]
fn unknown_transition_resolves_to_fade() {
    let tl = Timeline::new(
        vec![scene("a", 0.0, 5.0), scene("b", 4.0, 5.0)],
        vec![TransitionSpec::new("spiral", 1.0, Ease::Linear)],
    )
    .unwrap();
    assert_eq!(tl.transitions()[0].kind, TransitionKind::Fade);
}

#[test]
fn builder_places_scenes_back_to_back() {
    let tl = TimelineBuilder::new()
        .scene("intro", SceneKind::Title, 5.0, "title")
        .transition(fade(1.0))
        .scene("chart", SceneKind::Chart, 5.0, "chart")
        .scene("outro", SceneKind::Custom, 2.0, "solid")
        .build()
        .unwrap();
    let starts: Vec<f64> = tl.scenes().iter().map(|s| s.start_time).collect();
    assert_eq!(starts, vec![0.0, 4.0, 9.0]);
    assert_eq!(tl.transitions()[1].kind, TransitionKind::Cut);
    assert!((tl.total_duration() - 11.0).abs() < 1e-12);
}

#[test]
fn builder_rejects_trailing_transition() {
    let err = TimelineBuilder::new()
        .scene("a", SceneKind::Title, 2.0, "x")
        .transition(fade(1.0))
        .build()
        .unwrap_err();
    assert!(matches!(err, ChartreelError::InvalidTimeline(_)));
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn total_duration_is_scene_sum_minus_transition_sum(
        durations in prop::collection::vec(1.0f64..10.0, 1..8),
        fracs in prop::collection::vec(0.0f64..0.5, 8),
    ) {
        let mut b = TimelineBuilder::new();
        let mut expected = 0.0;
        for (i, d) in durations.iter().enumerate() {
            if i > 0 {
                // Up to half of the shorter neighbour keeps both margins satisfied.
                let tr = fracs[i] * d.min(durations[i - 1]);
                expected -= tr;
                b = b.transition(fade(tr));
            }
            expected += d;
            b = b.scene(format!("s{i}"), SceneKind::Custom, *d, "solid");
        }
        let tl = b.build().unwrap();
        prop_assert!((tl.total_duration() - expected).abs() < 1e-9);
    }
}
