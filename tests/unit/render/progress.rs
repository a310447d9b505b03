use super::*;

#[test]
fn ratio_of_completed_ranges() {
    let ev = ProgressEvent {
        completed_ranges: 1,
        total_ranges: 4,
    };
    assert_eq!(ev.ratio(), 0.25);
    assert_eq!(
        ProgressEvent {
            completed_ranges: 0,
            total_ranges: 0
        }
        .ratio(),
        1.0
    );
}

#[test]
fn full_channel_keeps_the_newest_events() {
    let (tx, rx) = progress_channel(2);
    for i in 1..=5 {
        tx.report(ProgressEvent {
            completed_ranges: i,
            total_ranges: 5,
        });
    }
    let got: Vec<u64> = rx.try_iter().map(|e| e.completed_ranges).collect();
    assert_eq!(got, vec![4, 5]);
}

#[test]
fn completion_reaches_a_slow_observer() {
    let (tx, rx) = progress_channel(1);
    let control = RenderControl::new().with_progress(tx);
    for i in 1..=8 {
        control.report(ProgressEvent {
            completed_ranges: i,
            total_ranges: 8,
        });
    }
    drop(control);
    let seen: Vec<ProgressEvent> = rx.iter().collect();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].ratio(), 1.0);
}

#[test]
fn disconnected_receiver_is_ignored() {
    let (tx, rx) = progress_channel(4);
    drop(rx);
    let control = RenderControl::new().with_progress(tx);
    control.report(ProgressEvent {
        completed_ranges: 1,
        total_ranges: 1,
    });
}

#[test]
fn cancel_token_is_shared() {
    let token = CancelToken::new();
    let control = RenderControl::new().with_cancel(token.clone());
    assert!(!control.cancel.is_cancelled());
    token.cancel();
    assert!(control.cancel.is_cancelled());
}
