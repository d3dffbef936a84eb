//! Exact-fill strategy: aspect ratio is sacrificed, nothing is cropped.

use super::PreviewScalingStrategy;
use crate::types::{Rect, Size};

/// Stretches the preview onto the viewfinder. Scoring penalizes the
/// per-axis scaling and the aspect distortion cubically.
#[derive(Debug, Default, Clone, Copy)]
pub struct StretchStrategy;

fn abs_ratio(ratio: f32) -> f32 {
    if ratio < 1.0 {
        1.0 / ratio
    } else {
        ratio
    }
}

impl PreviewScalingStrategy for StretchStrategy {
    fn score(&self, size: Size, desired: Size) -> f32 {
        if size.width == 0 || size.height == 0 {
            return 0.0;
        }
        let scale_x = abs_ratio(size.width as f32 / desired.width as f32);
        let scale_y = abs_ratio(size.height as f32 / desired.height as f32);
        let scale_score = 1.0 / scale_x / scale_y;
        let distortion = abs_ratio(
            (size.width as f32 / size.height as f32) / (desired.width as f32 / desired.height as f32),
        );
        let distortion_score = 1.0 / distortion / distortion / distortion;
        scale_score * distortion_score
    }

    fn scale_preview(&self, _preview: Size, viewfinder: Size) -> Rect {
        Rect::from_size(viewfinder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_scores_one() {
        let s = StretchStrategy;
        assert!((s.score(Size::new(640, 480), Size::new(640, 480)) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn distortion_outweighs_size() {
        let s = StretchStrategy;
        let desired = Size::new(1600, 900);
        let same_aspect = s.score(Size::new(1280, 720), desired);
        let distorted = s.score(Size::new(1600, 1200), desired);
        assert!(same_aspect > distorted);
    }

    #[test]
    fn placement_is_the_viewfinder() {
        let s = StretchStrategy;
        let rect = s.scale_preview(Size::new(1280, 720), Size::new(500, 400));
        assert_eq!(rect, Rect::new(0, 0, 500, 400));
    }
}
