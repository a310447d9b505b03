use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        ChartreelError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        ChartreelError::invalid_timeline("gap")
            .to_string()
            .contains("invalid timeline: gap")
    );
    assert!(
        ChartreelError::evaluation("x")
            .to_string()
            .contains("evaluation error:")
    );
    assert!(
        ChartreelError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
}

#[test]
fn provider_failure_names_scene_and_time() {
    let err = ChartreelError::provider("chart", 1.5, "empty buffer");
    assert!(err.is_provider_failure());
    let msg = err.to_string();
    assert!(msg.contains("'chart'"));
    assert!(msg.contains("1.500s"));
    assert!(msg.contains("empty buffer"));
}

#[test]
fn encode_handoff_carries_last_frame() {
    let err = ChartreelError::encode_handoff(Some(41), "pipe closed");
    assert!(err.to_string().contains("Some(41)"));
    assert!(!err.is_provider_failure());
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = ChartreelError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
