use super::*;
use crate::foundation::core::{Resolution, Rgba8Premul};

fn canvas(w: u32, h: u32) -> Canvas {
    Canvas {
        width: w,
        height: h,
    }
}

#[test]
fn same_size_is_untouched() {
    let f = FrameRGBA::solid(canvas(3, 2), Rgba8Premul::from_straight_rgba(1, 2, 3, 255));
    assert_eq!(fit_to_canvas(f.clone(), canvas(3, 2)).unwrap(), f);
}

#[test]
fn upscale_interpolates_instead_of_replicating() {
    // Left column black, right column white.
    let data = vec![
        0, 0, 0, 255, 255, 255, 255, 255, //
        0, 0, 0, 255, 255, 255, 255, 255,
    ];
    let f = FrameRGBA {
        width: 2,
        height: 2,
        data,
        premultiplied: true,
    };
    let out = fit_to_canvas(f, canvas(8, 2)).unwrap();
    assert_eq!((out.width, out.height), (8, 2));
    let mid = out.pixel(4, 0)[0];
    assert!(mid > 0 && mid < 255, "{mid}");
}

#[test]
fn solid_colour_survives_resampling_and_premul_stays_valid() {
    let f = FrameRGBA::solid(canvas(5, 7), Rgba8Premul::from_straight_rgba(40, 80, 120, 128));
    let out = fit_to_canvas(f, canvas(16, 9)).unwrap();
    for px in out.data.chunks_exact(4) {
        assert!(px[0] <= px[3] && px[1] <= px[3] && px[2] <= px[3]);
        assert!((i16::from(px[3]) - 128).abs() <= 1);
    }
}

#[test]
fn retimer_duplicates_when_generating_slower() {
    let r = FrameRetimer::new(Fps::new(24, 1).unwrap(), Some(Fps::new(12, 1).unwrap()));
    assert!(!r.is_identity());
    let gen_frames: Vec<u64> = (0..6).map(|i| r.generation_frame(FrameIndex(i))).collect();
    assert_eq!(gen_frames, vec![0, 0, 1, 1, 2, 2]);
    assert_eq!(r.generation_time(FrameIndex(3)), 1.0 / 12.0);
}

#[test]
fn retimer_drops_when_generating_faster() {
    let r = FrameRetimer::new(Fps::new(24, 1).unwrap(), Some(Fps::new(60, 1).unwrap()));
    let gen_frames: Vec<u64> = (0..4).map(|i| r.generation_frame(FrameIndex(i))).collect();
    assert_eq!(gen_frames, vec![0, 2, 5, 7]);
}

#[test]
fn retimer_identity_for_equal_rationals() {
    let r = FrameRetimer::new(Fps::new(24, 1).unwrap(), Some(Fps::new(48, 2).unwrap()));
    assert!(r.is_identity());
    assert_eq!(r.generation_time(FrameIndex(12)), 0.5);
}

#[test]
fn audio_is_conformed_to_exact_length() {
    let out = OutputSpec {
        resolution: Resolution::Custom([2, 2]),
        frame_rate: Fps::new(24, 1).unwrap(),
        sample_rate: 8_000,
        channels: 2,
    };
    let short = conform_audio(vec![0.5; 100], 8_000, 1, &out, 0.1).unwrap();
    assert_eq!(short.len(), 1_600);
    assert_eq!(short[0], 0.5);
    assert_eq!(short[1_599], 0.0);

    let long = conform_audio(vec![0.1; 4_000], 8_000, 2, &out, 0.1).unwrap();
    assert_eq!(long.len(), 1_600);

    let resampled = conform_audio(vec![0.0; 800], 4_000, 2, &out, 0.2).unwrap();
    assert_eq!(resampled.len(), 3_200);
    assert!(conform_audio(vec![], 0, 2, &out, 0.1).is_err());
}
