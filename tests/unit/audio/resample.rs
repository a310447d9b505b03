use super::*;

fn sine(freq: f64, sample_rate: u32, frames: usize) -> Vec<f32> {
    (0..frames)
        .map(|i| (std::f64::consts::TAU * freq * i as f64 / f64::from(sample_rate)).sin() as f32)
        .collect()
}

fn rms(s: &[f32]) -> f32 {
    (s.iter().map(|v| v * v).sum::<f32>() / s.len() as f32).sqrt()
}

#[test]
fn same_rate_is_identity() {
    let input = vec![0.1, -0.2, 0.3, -0.4];
    assert_eq!(resample_interleaved(&input, 2, 48_000, 48_000), input);
}

#[test]
fn output_length_is_rounded_ratio() {
    assert_eq!(output_frames(44_100, 44_100, 48_000), 48_000);
    assert_eq!(output_frames(3, 2, 3), 5);
    let out = resample_interleaved(&vec![0.0; 2 * 22_050], 2, 22_050, 48_000);
    assert_eq!(out.len(), 2 * 48_000);
}

#[test]
fn dc_level_is_preserved() {
    let out = resample_interleaved(&vec![0.5; 8_000], 1, 8_000, 11_025);
    for v in &out[200..out.len() - 200] {
        assert!((v - 0.5).abs() < 1e-3, "{v}");
    }
}

#[test]
fn passband_tone_survives_upsampling() {
    let input = sine(440.0, 16_000, 16_000);
    let out = resample_interleaved(&input, 1, 16_000, 48_000);
    let expected = sine(440.0, 48_000, 48_000);
    let mid = 1_000..47_000;
    let err: f32 = out[mid.clone()]
        .iter()
        .zip(&expected[mid])
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f32::max);
    assert!(err < 0.01, "max error {err}");
}

#[test]
fn downsampling_suppresses_content_above_target_nyquist() {
    // 7 kHz cannot be represented at 8 kHz and must not alias into the output.
    let input = sine(7_000.0, 48_000, 48_000);
    let out = resample_interleaved(&input, 1, 48_000, 8_000);
    assert!(rms(&out[200..out.len() - 200]) < 0.05);
}

#[test]
fn stereo_channels_stay_separate() {
    let mut input = Vec::new();
    for _ in 0..4_000 {
        input.extend_from_slice(&[0.25, -0.75]);
    }
    let out = resample_interleaved(&input, 2, 8_000, 12_000);
    assert_eq!(out.len(), 2 * 6_000);
    assert!((out[3_000 * 2] - 0.25).abs() < 1e-3);
    assert!((out[3_000 * 2 + 1] + 0.75).abs() < 1e-3);
}
