/// Convenience result type used across chartreel.
pub type ChartreelResult<T> = Result<T, ChartreelError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum ChartreelError {
    /// Invalid user-provided configuration data.
    #[error("validation error: {0}")]
    Validation(String),

    /// The timeline has a temporal gap or an overlap not consumed by a transition.
    #[error("invalid timeline: {0}")]
    InvalidTimeline(String),

    /// A frame provider returned no data or invalid data for a requested time.
    #[error("provider failure for scene '{scene}' at {local_time:.3}s: {reason}")]
    ProviderFailure {
        /// Scene whose provider failed.
        scene: String,
        /// Scene-local time of the failed request.
        local_time: f64,
        /// Provider-reported or validation reason.
        reason: String,
    },

    /// Composition could not satisfy the output spec (retries exhausted, count mismatch).
    #[error("composition error: {0}")]
    Composition(String),

    /// The external encoder rejected the finalized buffers.
    #[error("encode handoff failed after frame {last_frame:?}: {reason}")]
    EncodeHandoff {
        /// Index of the last frame the encoder accepted, if any.
        last_frame: Option<u64>,
        /// Encoder-reported reason.
        reason: String,
    },

    /// The render was cancelled before completion.
    #[error("render cancelled")]
    Cancelled,

    /// Errors while evaluating timeline state or executing a render stage.
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ChartreelError {
    /// Build a [`ChartreelError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`ChartreelError::InvalidTimeline`] value.
    pub fn invalid_timeline(msg: impl Into<String>) -> Self {
        Self::InvalidTimeline(msg.into())
    }

    /// Build a [`ChartreelError::ProviderFailure`] value.
    pub fn provider(scene: impl Into<String>, local_time: f64, reason: impl Into<String>) -> Self {
        Self::ProviderFailure {
            scene: scene.into(),
            local_time,
            reason: reason.into(),
        }
    }

    /// Build a [`ChartreelError::Composition`] value.
    pub fn composition(msg: impl Into<String>) -> Self {
        Self::Composition(msg.into())
    }

    /// Build a [`ChartreelError::EncodeHandoff`] value.
    pub fn encode_handoff(last_frame: Option<u64>, reason: impl Into<String>) -> Self {
        Self::EncodeHandoff {
            last_frame,
            reason: reason.into(),
        }
    }

    /// Build a [`ChartreelError::Evaluation`] value.
    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }

    /// Build a [`ChartreelError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Return `true` for provider failures, which are eligible for targeted re-render.
    pub fn is_provider_failure(&self) -> bool {
        matches!(self, Self::ProviderFailure { .. })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
