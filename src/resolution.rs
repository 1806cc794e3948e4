//! Canvas size resolution.
//!
//! | Kind | Result |
//! |------|--------|
//! | preset `16:9` | 1280×720 |
//! | preset `9:16` | 720×1280 |
//! | preset `4:3` | 1024×768 |
//! | preset `1:1` | 1080×1080 |
//! | fixedRatio + width | `(width, round(width × rh / rw))` |
//! | fixedRatio + height | `(round(height × rw / rh), height)` |
//! | custom | `(width, height)` |

use crate::dsl::{AspectRatio, Preset, RatioEdge, ResolutionSpec};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("ratio {ratio} with {edge} {value}px gives a zero-sized canvas")]
    Degenerate {
        ratio: AspectRatio,
        edge: &'static str,
        value: u32,
    },
}

pub fn preset_dimensions(preset: Preset) -> (u32, u32) {
    match preset {
        Preset::Widescreen => (1280, 720),
        Preset::Vertical => (720, 1280),
        Preset::Standard => (1024, 768),
        Preset::Square => (1080, 1080),
    }
}

/// Derive the other edge of a fixed-ratio canvas.
pub fn derive_edge(given: u32, numerator: u32, denominator: u32) -> u32 {
    (given as f64 * numerator as f64 / denominator as f64).round() as u32
}

pub fn resolve(spec: &ResolutionSpec) -> Result<(u32, u32), ResolutionError> {
    match *spec {
        ResolutionSpec::Preset(preset) => Ok(preset_dimensions(preset)),
        ResolutionSpec::Custom { width, height } => Ok((width, height)),
        ResolutionSpec::FixedRatio { ratio, edge } => {
            let (w, h, edge_name, value) = match edge {
                RatioEdge::Width(w) => (w, derive_edge(w, ratio.height, ratio.width), "width", w),
                RatioEdge::Height(h) => (derive_edge(h, ratio.width, ratio.height), h, "height", h),
            };
            if w == 0 || h == 0 {
                return Err(ResolutionError::Degenerate {
                    ratio,
                    edge: edge_name,
                    value,
                });
            }
            Ok((w, h))
        }
    }
}
