//! Display-side view of the negotiation: rotation, viewfinder size and the
//! strategy that reconciles them with what the camera supports.

use super::{FitStrategy, PreviewScalingStrategy};
use crate::types::{Rect, Rotation, Size};
use std::fmt;
use std::sync::Arc;

/// Snapshot of the display situation, rebuilt whenever the container is
/// laid out or the device rotates.
#[derive(Clone)]
pub struct DisplayConfiguration {
    rotation: Rotation,
    viewfinder_size: Option<Size>,
    strategy: Arc<dyn PreviewScalingStrategy>,
}

impl DisplayConfiguration {
    pub fn new(rotation: Rotation, viewfinder_size: Size) -> Self {
        DisplayConfiguration {
            rotation,
            viewfinder_size: Some(viewfinder_size),
            strategy: Arc::new(FitStrategy),
        }
    }

    /// Rotation-only configuration; size negotiation is skipped until a
    /// viewfinder size is known.
    pub fn for_rotation(rotation: Rotation) -> Self {
        DisplayConfiguration {
            rotation,
            viewfinder_size: None,
            strategy: Arc::new(FitStrategy),
        }
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn PreviewScalingStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn viewfinder_size(&self) -> Option<Size> {
        self.viewfinder_size
    }

    /// Viewfinder size in camera orientation: rotated when camera and
    /// display are perpendicular.
    pub fn desired_preview_size(&self, rotate: bool) -> Option<Size> {
        self.viewfinder_size
            .map(|size| if rotate { size.rotate() } else { size })
    }

    /// Best supported resolution, in natural camera orientation.
    pub fn best_preview_size(&self, sizes: &[Size], rotate: bool) -> Option<Size> {
        let desired = self.desired_preview_size(rotate)?;
        self.strategy.best_preview_size(sizes, desired)
    }

    /// Placement of the preview (display orientation) on the viewfinder.
    pub fn scale_preview(&self, preview: Size) -> Option<Rect> {
        let viewfinder = self.viewfinder_size?;
        Some(self.strategy.scale_preview(preview, viewfinder))
    }
}

impl fmt::Debug for DisplayConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayConfiguration")
            .field("rotation", &self.rotation)
            .field("viewfinder_size", &self.viewfinder_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scaling::CropStrategy;

    #[test]
    fn desired_size_rotates_when_perpendicular() {
        let config = DisplayConfiguration::new(Rotation::Deg90, Size::new(1080, 1920));
        assert_eq!(
            config.desired_preview_size(true),
            Some(Size::new(1920, 1080))
        );
        assert_eq!(
            config.desired_preview_size(false),
            Some(Size::new(1080, 1920))
        );
    }

    #[test]
    fn negotiation_skipped_without_viewfinder() {
        let config = DisplayConfiguration::for_rotation(Rotation::Deg0);
        assert_eq!(config.best_preview_size(&[Size::new(640, 480)], false), None);
        assert_eq!(config.scale_preview(Size::new(640, 480)), None);
    }

    #[test]
    fn crop_strategy_picks_exact_match() {
        let config = DisplayConfiguration::new(Rotation::Deg90, Size::new(1080, 1920))
            .with_strategy(Arc::new(CropStrategy));
        let sizes = [
            Size::new(640, 480),
            Size::new(1280, 720),
            Size::new(1920, 1080),
        ];
        assert_eq!(
            config.best_preview_size(&sizes, true),
            Some(Size::new(1920, 1080))
        );
    }
}
