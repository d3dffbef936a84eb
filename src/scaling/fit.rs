//! Letterboxing strategy: the whole preview stays visible.

use super::{center_on_viewfinder, PreviewScalingStrategy};
use crate::types::{Rect, Size};

/// Scales the preview to fit inside the viewfinder, centered, with bars on
/// one axis. Scoring slightly favors downscaling over upscaling and
/// penalizes the hidden viewfinder area cubically.
#[derive(Debug, Default, Clone, Copy)]
pub struct FitStrategy;

impl PreviewScalingStrategy for FitStrategy {
    fn score(&self, size: Size, desired: Size) -> f32 {
        if size.width == 0 || size.height == 0 {
            return 0.0;
        }
        let scaled = size.scale_fit(desired);
        let scale_ratio = scaled.width as f32 / size.width as f32;
        let scale_score = if scale_ratio > 1.0 {
            // Upscaling costs a little more than the inverse ratio.
            (1.0 / scale_ratio as f64).powf(1.1) as f32
        } else {
            scale_ratio
        };
        let crop_ratio = (desired.width as f32 / scaled.width as f32)
            * (desired.height as f32 / scaled.height as f32);
        let crop_score = 1.0 / crop_ratio / crop_ratio / crop_ratio;
        scale_score * crop_score
    }

    fn scale_preview(&self, preview: Size, viewfinder: Size) -> Rect {
        center_on_viewfinder(preview.scale_fit(viewfinder), viewfinder)
    }
}
