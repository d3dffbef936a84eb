//! Ratio-limited strategy for older hardware: scaling restricted to
//! powers of two and 3:2 steps, which scale quickly with little quality
//! loss.

use super::{center_on_viewfinder, PreviewScalingStrategy};
use crate::types::{Rect, Size};
use std::cmp::Ordering;

/// Prefers no scaling, then the least downscaling, then the least
/// upscaling. Orders by comparator rather than by score; aspect ratio is
/// ignored since the overflow is cropped anyway.
#[derive(Debug, Default, Clone, Copy)]
pub struct LegacyStrategy;

impl LegacyStrategy {
    /// Scales `from` in 3:2 / 2:1 steps (or 2:3 / 1:2 down) until `to`
    /// just fits inside the result. Aspect ratio is preserved.
    pub fn scale(from: Size, to: Size) -> Size {
        let mut current = from;
        if !to.fits_in(current) {
            // Scale up.
            loop {
                let scaled_150 = current.scale(3, 2);
                let scaled_200 = current.scale(2, 1);
                if to.fits_in(scaled_150) {
                    return scaled_150;
                }
                if to.fits_in(scaled_200) {
                    return scaled_200;
                }
                if scaled_200 == current {
                    // Degenerate size that cannot grow.
                    return current;
                }
                current = scaled_200;
            }
        } else {
            // Scale down while the target still fits.
            loop {
                let scaled_66 = current.scale(2, 3);
                let scaled_50 = current.scale(1, 2);
                if !to.fits_in(scaled_50) {
                    return if to.fits_in(scaled_66) {
                        scaled_66
                    } else {
                        current
                    };
                }
                current = scaled_50;
            }
        }
    }
}

impl PreviewScalingStrategy for LegacyStrategy {
    fn best_preview_order(&self, sizes: &[Size], desired: Size) -> Vec<Size> {
        let mut ordered = sizes.to_vec();
        ordered.sort_by(|a, b| {
            let a_delta = Self::scale(*a, desired).width as i64 - a.width as i64;
            let b_delta = Self::scale(*b, desired).width as i64 - b.width as i64;
            if a_delta == 0 && b_delta == 0 {
                // Neither needs scaling; pick the smaller one.
                a.cmp(b)
            } else if a_delta == 0 {
                Ordering::Less
            } else if b_delta == 0 {
                Ordering::Greater
            } else if a_delta < 0 && b_delta < 0 {
                // Both downscaled; the smaller needed less.
                a.cmp(b)
            } else if a_delta > 0 && b_delta > 0 {
                // Both upscaled; the larger needed less.
                b.cmp(a)
            } else if a_delta < 0 {
                // Downscaling beats upscaling.
                Ordering::Less
            } else {
                Ordering::Greater
            }
        });
        ordered
    }

    fn scale_preview(&self, preview: Size, viewfinder: Size) -> Rect {
        center_on_viewfinder(Self::scale(preview, viewfinder), viewfinder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_scaling_when_target_already_fits() {
        assert_eq!(
            LegacyStrategy::scale(Size::new(640, 480), Size::new(640, 480)),
            Size::new(640, 480)
        );
    }

    #[test]
    fn scales_up_in_limited_steps() {
        // 400x300 -> 3/2 step covers 600x450.
        assert_eq!(
            LegacyStrategy::scale(Size::new(400, 300), Size::new(600, 450)),
            Size::new(600, 450)
        );
        // A single 3/2 step is not enough for 800x600.
        assert_eq!(
            LegacyStrategy::scale(Size::new(400, 300), Size::new(800, 600)),
            Size::new(800, 600)
        );
    }

    #[test]
    fn scales_down_in_limited_steps() {
        assert_eq!(
            LegacyStrategy::scale(Size::new(1280, 960), Size::new(640, 480)),
            Size::new(640, 480)
        );
        // 1/2 step to 960x720 while the target still fits, then a 2/3 step.
        assert_eq!(
            LegacyStrategy::scale(Size::new(1920, 1440), Size::new(640, 480)),
            Size::new(640, 480)
        );
    }

    #[test]
    fn prefers_unscaled_then_least_downscale_then_least_upscale() {
        let s = LegacyStrategy;
        let desired = Size::new(640, 480);
        let sizes = [
            Size::new(320, 240),   // upscaled
            Size::new(640, 480),   // exact
            Size::new(1280, 960),  // downscaled
        ];
        let ordered = s.best_preview_order(&sizes, desired);
        assert_eq!(ordered[0], Size::new(640, 480));
        assert_eq!(ordered[1], Size::new(1280, 960));
        assert_eq!(ordered[2], Size::new(320, 240));
    }
}
