use crate::{
    composition::model::TransitionSpec,
    foundation::core::Vec2,
    foundation::error::{ChartreelError, ChartreelResult},
};

/// Horizontal direction the incoming frame travels during a slide.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SlideDir {
    /// Incoming enters from the right edge, moving left.
    #[default]
    Left,
    /// Incoming enters from the left edge, moving right.
    Right,
}

/// Closed set of transition algorithms.
///
/// Resolved once when the timeline is built; the render loop dispatches on this enum and never
/// looks up transitions by name.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TransitionKind {
    /// Linear alpha blend `out * (1 - p) + in * p`.
    Fade,
    /// Incoming frame offset horizontally by `(1 - p) * width`.
    Slide {
        /// Travel direction.
        dir: SlideDir,
    },
    /// Incoming frame scaled by `p` about `anchor`.
    Zoom {
        /// Anchor in normalized canvas coordinates (`(0.5, 0.5)` is the centre).
        anchor: Vec2,
    },
    /// Hard switch at the boundary instant.
    Cut,
}

impl TransitionKind {
    /// Stable lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Fade => "fade",
            Self::Slide { .. } => "slide",
            Self::Zoom { .. } => "zoom",
            Self::Cut => "cut",
        }
    }
}

/// Parse a transition kind and its parameters.
///
/// Unknown kinds fail closed to [`TransitionKind::Fade`] with a warning. Malformed parameters of a
/// known kind are configuration errors.
pub fn parse_transition_kind_params(
    kind: &str,
    params: &serde_json::Value,
) -> ChartreelResult<TransitionKind> {
    let kind = kind.trim().to_ascii_lowercase();

    let params = if params.is_null() {
        None
    } else {
        Some(params.as_object().ok_or_else(|| {
            ChartreelError::validation(format!("{kind} params must be an object"))
        })?)
    };

    match kind.as_str() {
        "fade" | "crossfade" | "dissolve" => Ok(TransitionKind::Fade),
        "cut" => Ok(TransitionKind::Cut),
        "slide" => {
            let dir = match params.and_then(|p| p.get("dir")).and_then(|v| v.as_str()) {
                None => SlideDir::Left,
                Some(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "left" | "right_to_left" | "rtl" => SlideDir::Left,
                    "right" | "left_to_right" | "ltr" => SlideDir::Right,
                    other => {
                        return Err(ChartreelError::validation(format!(
                            "unknown slide.dir '{other}'"
                        )));
                    }
                },
            };
            Ok(TransitionKind::Slide { dir })
        }
        "zoom" => {
            let anchor = match params.and_then(|p| p.get("anchor")) {
                None => Vec2::new(0.5, 0.5),
                Some(v) => {
                    let pair = v
                        .as_array()
                        .filter(|a| a.len() == 2)
                        .and_then(|a| Some((a[0].as_f64()?, a[1].as_f64()?)))
                        .ok_or_else(|| {
                            ChartreelError::validation("zoom.anchor must be a [x, y] number pair")
                        })?;
                    if !pair.0.is_finite() || !pair.1.is_finite() {
                        return Err(ChartreelError::validation("zoom.anchor must be finite"));
                    }
                    Vec2::new(pair.0.clamp(0.0, 1.0), pair.1.clamp(0.0, 1.0))
                }
            };
            Ok(TransitionKind::Zoom { anchor })
        }
        other => {
            tracing::warn!(
                kind = other,
                "unsupported transition type, falling back to fade"
            );
            Ok(TransitionKind::Fade)
        }
    }
}

/// Resolve a [`TransitionSpec`] into its closed kind.
pub fn parse_transition(spec: &TransitionSpec) -> ChartreelResult<TransitionKind> {
    parse_transition_kind_params(&spec.kind, &spec.params)
}

#[cfg(test)]
#[path = "../../tests/unit/effects/transitions.rs"]
mod tests;
