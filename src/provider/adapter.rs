use std::sync::{Arc, OnceLock};

use crate::{
    composition::timeline::Timeline,
    export::normalize::fit_to_canvas,
    foundation::{
        core::Canvas,
        error::{ChartreelError, ChartreelResult},
    },
    provider::registry::{FrameProvider, ProviderRegistry},
    render::frame::FrameRGBA,
};

/// A provider frame fitted to the output canvas.
#[derive(Clone, Debug)]
pub struct FetchedFrame {
    /// Canvas-sized, validated frame. Static scenes hand out one shared buffer.
    pub frame: Arc<FrameRGBA>,
    /// Whether the first request failed and a retry produced this frame.
    pub retried: bool,
}

/// Per-scene provider access for one render: retry policy, canvas fitting and the static-frame
/// cache.
pub struct SceneFrames {
    canvas: Canvas,
    scene_ids: Vec<String>,
    providers: Vec<Arc<dyn FrameProvider>>,
    statics: Vec<OnceLock<Arc<FrameRGBA>>>,
}

impl std::fmt::Debug for SceneFrames {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneFrames")
            .field("canvas", &self.canvas)
            .field("scene_ids", &self.scene_ids)
            .finish()
    }
}

impl SceneFrames {
    /// Resolve the provider of every scene. Unknown content fails here, before any frame.
    pub fn new(
        timeline: &Timeline,
        registry: &ProviderRegistry,
        canvas: Canvas,
    ) -> ChartreelResult<Self> {
        let providers = registry.resolve(timeline)?;
        let statics = providers.iter().map(|_| OnceLock::new()).collect();
        Ok(Self {
            canvas,
            scene_ids: timeline.scenes().iter().map(|s| s.id.clone()).collect(),
            providers,
            statics,
        })
    }

    /// Number of scenes.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Return `true` when there are no scenes.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Whether the scene's provider declares time-invariant output.
    pub fn is_static(&self, scene: usize) -> bool {
        self.providers.get(scene).is_some_and(|p| p.is_static())
    }

    /// Whether the scene's content has settled by `local_time`.
    pub fn is_held(&self, scene: usize, local_time: f64) -> bool {
        self.providers
            .get(scene)
            .and_then(|p| p.settled_after())
            .is_some_and(|t| local_time >= t)
    }

    /// Fetch the frame of `scene` at `local_time`.
    ///
    /// A failed or malformed response is retried once; a second failure is a
    /// [`ChartreelError::ProviderFailure`].
    pub fn fetch(&self, scene: usize, local_time: f64) -> ChartreelResult<FetchedFrame> {
        let provider = self.providers.get(scene).ok_or_else(|| {
            ChartreelError::evaluation(format!("scene index {scene} out of range"))
        })?;
        let scene_id = self.scene_ids[scene].as_str();

        if provider.is_static()
            && let Some(frame) = self.statics[scene].get()
        {
            return Ok(FetchedFrame {
                frame: Arc::clone(frame),
                retried: false,
            });
        }

        let (frame, retried) = match self.attempt(provider.as_ref(), scene_id, local_time) {
            Ok(frame) => (frame, false),
            Err(first) => {
                tracing::warn!(
                    scene = scene_id,
                    local_time,
                    reason = %first,
                    "provider request failed, retrying once"
                );
                let frame = self
                    .attempt(provider.as_ref(), scene_id, local_time)
                    .map_err(|second| {
                        ChartreelError::provider(scene_id, local_time, second.to_string())
                    })?;
                (frame, true)
            }
        };
        let frame = Arc::new(frame);

        if provider.is_static() {
            // A concurrent first fetch may have won; either frame is identical.
            let _ = self.statics[scene].set(Arc::clone(&frame));
        }
        Ok(FetchedFrame { frame, retried })
    }

    fn attempt(
        &self,
        provider: &dyn FrameProvider,
        scene_id: &str,
        local_time: f64,
    ) -> ChartreelResult<FrameRGBA> {
        let frame = provider.get_frame(scene_id, local_time)?;
        if frame.width == 0 || frame.height == 0 {
            return Err(ChartreelError::provider(
                scene_id,
                local_time,
                "provider returned an empty frame",
            ));
        }
        frame
            .validate()
            .map_err(|e| ChartreelError::provider(scene_id, local_time, e.to_string()))?;
        fit_to_canvas(frame, self.canvas)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/provider/adapter.rs"]
mod tests;
