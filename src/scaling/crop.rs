//! Filling strategy: the viewfinder is covered and preview edges cropped.

use super::{center_on_viewfinder, PreviewScalingStrategy};
use crate::types::{Rect, Size};

/// Scales the preview to cover the viewfinder, centered, cropping the
/// overflow. Scoring penalizes the cropped-away share quadratically and
/// slightly favors downscaling over upscaling.
#[derive(Debug, Default, Clone, Copy)]
pub struct CropStrategy;

impl PreviewScalingStrategy for CropStrategy {
    fn score(&self, size: Size, desired: Size) -> f32 {
        if size.width == 0 || size.height == 0 {
            return 0.0;
        }
        let scaled = size.scale_crop(desired);
        let scale_ratio = scaled.width as f32 / size.width as f32;
        let scale_score = if scale_ratio > 1.0 {
            (1.0 / scale_ratio as f64).powf(1.1) as f32
        } else {
            scale_ratio
        };
        // Share of the scaled preview that spills past the viewfinder.
        let crop_ratio = (scaled.width as f32 / desired.width as f32)
            * (scaled.height as f32 / desired.height as f32);
        let crop_score = 1.0 / crop_ratio / crop_ratio;
        scale_score * crop_score
    }

    fn scale_preview(&self, preview: Size, viewfinder: Size) -> Rect {
        center_on_viewfinder(preview.scale_crop(viewfinder), viewfinder)
    }
}
