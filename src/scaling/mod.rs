//! Preview resolution negotiation and placement.
//!
//! A scaling strategy scores every device-supported resolution against the
//! desired viewfinder size (both in natural camera orientation), then places
//! the chosen preview relative to the viewfinder. Placement rectangles may
//! have a negative origin: under [`CropStrategy`] the preview extends past
//! the visible frame.

mod crop;
mod display;
mod fit;
mod legacy;
mod stretch;

pub use crop::CropStrategy;
pub use display::DisplayConfiguration;
pub use fit::FitStrategy;
pub use legacy::LegacyStrategy;
pub use stretch::StretchStrategy;

use crate::types::{Rect, Size};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

/// Picks a preview resolution and computes its placement.
///
/// Implementations are pure; the default ordering recomputes scores per
/// comparison, which is fine for the handful of resolutions devices report.
pub trait PreviewScalingStrategy: Send + Sync {
    /// Quality of displaying `size` on a `desired` viewfinder; higher wins.
    /// Non-positive dimensions score 0.
    fn score(&self, _size: Size, _desired: Size) -> f32 {
        0.5
    }

    /// Candidates ordered best-first. The sort is stable, so equal scores
    /// keep the device's original list order.
    fn best_preview_order(&self, sizes: &[Size], desired: Size) -> Vec<Size> {
        let mut ordered = sizes.to_vec();
        ordered.sort_by(|a, b| {
            self.score(*b, desired)
                .partial_cmp(&self.score(*a, desired))
                .unwrap_or(Ordering::Equal)
        });
        ordered
    }

    /// Best supported resolution for `desired`, or None for an empty list.
    fn best_preview_size(&self, sizes: &[Size], desired: Size) -> Option<Size> {
        let ordered = self.best_preview_order(sizes, desired);
        log::info!("viewfinder size: {}", desired);
        log::info!("preview in order of preference: {:?}", ordered);
        ordered.first().copied()
    }

    /// Placement of `preview` relative to a viewfinder of `viewfinder`
    /// size, in viewfinder coordinates.
    fn scale_preview(&self, preview: Size, viewfinder: Size) -> Rect;
}

/// Centers `scaled` on the viewfinder; shared by the fit/crop/legacy
/// placements.
pub(crate) fn center_on_viewfinder(scaled: Size, viewfinder: Size) -> Rect {
    let dx = (scaled.width as i32 - viewfinder.width as i32) / 2;
    let dy = (scaled.height as i32 - viewfinder.height as i32) / 2;
    Rect::new(
        -dx,
        -dy,
        scaled.width as i32 - dx,
        scaled.height as i32 - dy,
    )
}

/// Strategy selector used by the configuration surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalingMode {
    /// Whole preview visible, letterboxed.
    #[default]
    Fit,
    /// Viewfinder filled, preview edges cropped away.
    Crop,
    /// Viewfinder filled exactly, aspect ratio not preserved.
    Stretch,
    /// Power-of-two / 3:2 scaling steps only.
    Legacy,
}

impl ScalingMode {
    pub fn strategy(self) -> Arc<dyn PreviewScalingStrategy> {
        match self {
            ScalingMode::Fit => Arc::new(FitStrategy),
            ScalingMode::Crop => Arc::new(CropStrategy),
            ScalingMode::Stretch => Arc::new(StretchStrategy),
            ScalingMode::Legacy => Arc::new(LegacyStrategy),
        }
    }
}
