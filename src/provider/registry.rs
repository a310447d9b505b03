use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::{
    composition::{model::ContentRef, timeline::Timeline},
    foundation::error::{ChartreelError, ChartreelResult},
    render::frame::FrameRGBA,
};

/// Capability producing a pixel buffer for a scene at a local time.
///
/// Frames may come back at any size; they are fitted to the output canvas before compositing.
pub trait FrameProvider: Send + Sync {
    /// Render the frame for `scene_id` at `local_time` seconds since the scene start.
    fn get_frame(&self, scene_id: &str, local_time: f64) -> ChartreelResult<FrameRGBA>;

    /// Whether concurrent `get_frame` calls are safe. Unsafe providers are serialized.
    fn is_concurrent_safe(&self) -> bool {
        true
    }

    /// Whether every frame is identical regardless of `local_time`.
    fn is_static(&self) -> bool {
        false
    }

    /// Local time from which the content stops changing, such as the end of a reveal.
    ///
    /// Frames at or past it are expected to repeat and are not reported as a frozen provider.
    fn settled_after(&self) -> Option<f64> {
        None
    }
}

/// Wraps a provider that cannot take concurrent calls.
struct Serialized {
    inner: Arc<dyn FrameProvider>,
    lock: Mutex<()>,
}

impl FrameProvider for Serialized {
    fn get_frame(&self, scene_id: &str, local_time: f64) -> ChartreelResult<FrameRGBA> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| ChartreelError::provider(scene_id, local_time, "provider lock poisoned"))?;
        self.inner.get_frame(scene_id, local_time)
    }

    fn is_concurrent_safe(&self) -> bool {
        true
    }

    fn is_static(&self) -> bool {
        self.inner.is_static()
    }

    fn settled_after(&self) -> Option<f64> {
        self.inner.settled_after()
    }
}

/// Content handles mapped to their frame providers.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<ContentRef, Arc<dyn FrameProvider>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("content_refs", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ProviderRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` under `content_ref`, replacing any previous entry.
    ///
    /// Providers that are not concurrent-safe get a per-provider lock, so unrelated providers
    /// stay parallel.
    pub fn register(
        &mut self,
        content_ref: impl Into<String>,
        provider: Arc<dyn FrameProvider>,
    ) -> &mut Self {
        let provider: Arc<dyn FrameProvider> = if provider.is_concurrent_safe() {
            provider
        } else {
            Arc::new(Serialized {
                inner: provider,
                lock: Mutex::new(()),
            })
        };
        self.providers
            .insert(ContentRef::new(content_ref), provider);
        self
    }

    /// Look up the provider for a content handle.
    pub fn get(&self, content_ref: &ContentRef) -> Option<&Arc<dyn FrameProvider>> {
        self.providers.get(content_ref)
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Return `true` when no provider is registered.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Resolve one provider per scene, in scene order. Fails before rendering when a scene names
    /// an unregistered handle.
    pub fn resolve(&self, timeline: &Timeline) -> ChartreelResult<Vec<Arc<dyn FrameProvider>>> {
        timeline
            .scenes()
            .iter()
            .map(|scene| {
                self.get(&scene.content_ref).cloned().ok_or_else(|| {
                    ChartreelError::validation(format!(
                        "scene '{}' references unknown content '{}'",
                        scene.id,
                        scene.content_ref.as_str()
                    ))
                })
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/provider/registry.rs"]
mod tests;
