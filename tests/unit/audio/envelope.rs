use super::*;

#[test]
fn empty_envelope_is_unity() {
    assert_eq!(GainEnvelope::default().gain_at(3.0), 1.0);
}

#[test]
fn interpolates_and_holds_ends() {
    let env = GainEnvelope::from_points(vec![
        GainPoint { time: 1.0, gain: 0.0 },
        GainPoint { time: 3.0, gain: 1.0 },
    ])
    .unwrap();
    assert_eq!(env.gain_at(0.0), 0.0);
    assert!((env.gain_at(2.0) - 0.5).abs() < 1e-6);
    assert_eq!(env.gain_at(3.0), 1.0);
    assert_eq!(env.gain_at(10.0), 1.0);
}

#[test]
fn rejects_unordered_or_negative_points() {
    assert!(
        GainEnvelope::from_points(vec![
            GainPoint { time: 2.0, gain: 1.0 },
            GainPoint { time: 1.0, gain: 1.0 },
        ])
        .is_err()
    );
    assert!(GainEnvelope::from_points(vec![GainPoint { time: 0.0, gain: -0.1 }]).is_err());
}

#[test]
fn deserializes_from_point_list() {
    let env: GainEnvelope =
        serde_json::from_str(r#"[{"time":0.0,"gain":0.3},{"time":1.0,"gain":0.6}]"#).unwrap();
    assert_eq!(env.points().len(), 2);
    assert!((env.gain_at(0.5) - 0.45).abs() < 1e-6);
}
