use super::*;
use crate::composition::model::SceneKind;
use crate::composition::timeline::TimelineBuilder;
use crate::foundation::core::{Canvas, Rgba8Premul};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

struct Exclusive {
    in_flight: AtomicUsize,
    max_seen: AtomicUsize,
}

impl FrameProvider for Exclusive {
    fn get_frame(&self, _scene_id: &str, _local_time: f64) -> ChartreelResult<FrameRGBA> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_seen.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(2));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(FrameRGBA::solid(
            Canvas {
                width: 1,
                height: 1,
            },
            Rgba8Premul::transparent(),
        ))
    }

    fn is_concurrent_safe(&self) -> bool {
        false
    }
}

#[test]
fn unsafe_providers_are_serialized() {
    let inner = Arc::new(Exclusive {
        in_flight: AtomicUsize::new(0),
        max_seen: AtomicUsize::new(0),
    });
    let mut reg = ProviderRegistry::new();
    reg.register("x", inner.clone());
    let provider = reg.get(&ContentRef::new("x")).unwrap().clone();
    assert!(provider.is_concurrent_safe());

    std::thread::scope(|s| {
        for _ in 0..4 {
            let p = provider.clone();
            s.spawn(move || {
                for i in 0..5 {
                    p.get_frame("scene", f64::from(i)).unwrap();
                }
            });
        }
    });
    assert_eq!(inner.max_seen.load(Ordering::SeqCst), 1);
}

#[test]
fn resolve_reports_unknown_content() {
    let tl = TimelineBuilder::new()
        .scene("intro", SceneKind::Title, 1.0, "missing")
        .build()
        .unwrap();
    let err = ProviderRegistry::new().resolve(&tl).err().unwrap();
    assert!(err.to_string().contains("missing"));
    assert!(ProviderRegistry::new().is_empty());
}
