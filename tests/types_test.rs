//! Tests for framescan core geometry types
//!
//! Ensures the size, rectangle and rotation primitives behave the way the
//! negotiation and framing math relies on.

use framescan::types::{Point, Rect, Rotation, Size};

#[cfg(test)]
mod size_tests {
    use super::*;

    #[test]
    fn rotate_swaps_axes() {
        assert_eq!(Size::new(1920, 1080).rotate(), Size::new(1080, 1920));
        assert_eq!(Size::new(640, 640).rotate(), Size::new(640, 640));
    }

    #[test]
    fn scale_applies_a_rational_factor() {
        assert_eq!(Size::new(640, 480).scale(3, 2), Size::new(960, 720));
        assert_eq!(Size::new(640, 480).scale(1, 2), Size::new(320, 240));
        // Rounds down.
        assert_eq!(Size::new(3, 3).scale(1, 2), Size::new(1, 1));
    }

    #[test]
    fn scale_fit_letterboxes_inside_the_target() {
        let scaled = Size::new(1280, 720).scale_fit(Size::new(720, 720));
        assert_eq!(scaled, Size::new(720, 405));
        assert!(scaled.fits_in(Size::new(720, 720)));
    }

    #[test]
    fn scale_crop_covers_the_target() {
        let scaled = Size::new(1280, 720).scale_crop(Size::new(720, 720));
        assert_eq!(scaled, Size::new(1280, 720));
        assert!(Size::new(720, 720).fits_in(scaled));
    }

    #[test]
    fn empty_sizes_pass_through_scaling() {
        assert_eq!(Size::new(0, 480).scale_fit(Size::new(640, 480)), Size::new(0, 480));
        assert_eq!(Size::new(640, 0).scale_crop(Size::new(640, 480)), Size::new(640, 0));
    }

    #[test]
    fn ordering_is_by_area() {
        let mut sizes = vec![
            Size::new(1920, 1080),
            Size::new(640, 480),
            Size::new(1280, 720),
        ];
        sizes.sort();
        assert_eq!(sizes[0], Size::new(640, 480));
        assert_eq!(sizes[2], Size::new(1920, 1080));
        assert_eq!(Size::new(1920, 1080).area(), 2_073_600);
    }

    #[test]
    fn serde_round_trip() {
        let size = Size::new(1280, 720);
        let json = serde_json::to_string(&size).unwrap();
        let back: Size = serde_json::from_str(&json).unwrap();
        assert_eq!(back, size);
    }
}

#[cfg(test)]
mod rect_tests {
    use super::*;

    #[test]
    fn dimensions_and_emptiness() {
        let rect = Rect::new(10, 20, 110, 70);
        assert_eq!(rect.width(), 100);
        assert_eq!(rect.height(), 50);
        assert!(!rect.is_empty());
        assert!(Rect::new(10, 20, 10, 70).is_empty());
        assert!(Rect::new(10, 20, 5, 70).is_empty());
    }

    #[test]
    fn offset_moves_both_corners() {
        let rect = Rect::new(10, 20, 110, 70).offset(-10, 5);
        assert_eq!(rect, Rect::new(0, 25, 100, 75));
        assert_eq!(rect.width(), 100);
    }

    #[test]
    fn inset_shrinks_symmetrically() {
        let rect = Rect::new(0, 0, 100, 100).inset(10, 25);
        assert_eq!(rect, Rect::new(10, 25, 90, 75));
    }

    #[test]
    fn intersect_clips_to_the_overlap() {
        let a = Rect::new(0, 0, 100, 100);
        let b = Rect::new(50, -20, 150, 60);
        assert_eq!(a.intersect(&b), Some(Rect::new(50, 0, 100, 60)));
    }

    #[test]
    fn disjoint_rects_do_not_intersect() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(20, 20, 30, 30);
        assert_eq!(a.intersect(&b), None);
    }

    #[test]
    fn from_size_sits_at_the_origin() {
        let rect = Rect::from_size(Size::new(640, 480));
        assert_eq!(rect, Rect::new(0, 0, 640, 480));
        assert_eq!(rect.size(), Size::new(640, 480));
    }
}

#[cfg(test)]
mod rotation_tests {
    use super::*;

    #[test]
    fn from_degrees_accepts_right_angles_only() {
        assert_eq!(Rotation::from_degrees(0), Some(Rotation::Deg0));
        assert_eq!(Rotation::from_degrees(90), Some(Rotation::Deg90));
        assert_eq!(Rotation::from_degrees(180), Some(Rotation::Deg180));
        assert_eq!(Rotation::from_degrees(270), Some(Rotation::Deg270));
        assert_eq!(Rotation::from_degrees(45), None);
        assert_eq!(Rotation::from_degrees(360), None);
    }

    #[test]
    fn degrees_round_trip() {
        for rotation in [
            Rotation::Deg0,
            Rotation::Deg90,
            Rotation::Deg180,
            Rotation::Deg270,
        ] {
            assert_eq!(Rotation::from_degrees(rotation.degrees()), Some(rotation));
        }
    }

    #[test]
    fn perpendicular_means_axes_swapped() {
        assert!(!Rotation::Deg0.is_perpendicular());
        assert!(Rotation::Deg90.is_perpendicular());
        assert!(!Rotation::Deg180.is_perpendicular());
        assert!(Rotation::Deg270.is_perpendicular());
    }
}

#[cfg(test)]
mod point_tests {
    use super::*;

    #[test]
    fn points_compare_by_coordinates() {
        assert_eq!(Point::new(1.5, 2.5), Point::new(1.5, 2.5));
        assert_ne!(Point::new(1.5, 2.5), Point::new(2.5, 1.5));
    }
}
