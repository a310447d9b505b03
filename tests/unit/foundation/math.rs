use super::*;

#[test]
fn mul_div255_identity_and_zero() {
    for x in [0u16, 1, 127, 128, 254, 255] {
        assert_eq!(mul_div255_u16(x, 255), x);
        assert_eq!(mul_div255_u16(x, 0), 0);
    }
}

#[test]
fn db_gain_conversions() {
    assert!((db_to_gain(0.0) - 1.0).abs() < 1e-6);
    assert!((db_to_gain(-12.0) - 0.251_188_6).abs() < 1e-4);
    assert!((gain_to_db(0.5) + 6.0206).abs() < 1e-3);
    assert_eq!(gain_to_db(0.0), -120.0);
}

#[test]
fn fnv_differs_for_different_bytes() {
    let mut a = Fnv1a64::new_default();
    a.write_bytes(&[1, 2, 3]);
    let mut b = Fnv1a64::new_default();
    b.write_bytes(&[1, 2, 4]);
    assert_ne!(a.finish(), b.finish());
}
