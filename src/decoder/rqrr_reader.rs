//! QR reader backed by the rqrr detector.

use crate::decoder::reader::{BarcodeFormat, DecodeHints, DecodedPayload, Reader};
use crate::frame::LuminanceView;
use crate::types::Point;

/// Detects and decodes QR symbols in a luminance view.
///
/// Grid corners are recorded as possible points even when decoding the
/// grid fails, so a viewfinder can show feedback while the user steadies
/// the camera.
pub struct RqrrReader {
    hints: DecodeHints,
    last_points: Vec<Point>,
}

impl RqrrReader {
    pub fn new(hints: DecodeHints) -> Self {
        if hints.character_set.is_some() {
            // QR text carries its own encoding; the hint is for symbologies
            // that do not.
            log::debug!("character-set hint ignored by the QR reader");
        }
        RqrrReader {
            hints,
            last_points: Vec::new(),
        }
    }
}

impl Reader for RqrrReader {
    fn decode(&mut self, view: &LuminanceView) -> Option<DecodedPayload> {
        self.last_points.clear();
        if !self.hints.allows(BarcodeFormat::QrCode) {
            return None;
        }
        let (width, height) = (view.width() as usize, view.height() as usize);
        if width == 0 || height == 0 {
            return None;
        }
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| {
            view.get(x as u32, y as u32)
        });
        let grids = prepared.detect_grids();
        for grid in &grids {
            let corners: Vec<Point> = grid
                .bounds
                .iter()
                .map(|p| Point::new(p.x as f32, p.y as f32))
                .collect();
            self.last_points.extend(corners.iter().copied());
            match grid.decode() {
                Ok((_meta, content)) => {
                    return Some(DecodedPayload {
                        raw_bytes: content.as_bytes().to_vec(),
                        text: content,
                        format: BarcodeFormat::QrCode,
                        points: corners,
                    });
                }
                Err(e) => log::debug!("qr grid found but not decodable: {e}"),
            }
        }
        None
    }

    fn possible_points(&mut self) -> Vec<Point> {
        std::mem::take(&mut self.last_points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_view() -> LuminanceView {
        LuminanceView::new(vec![255; 64 * 64], 64, 64).unwrap()
    }

    #[test]
    fn blank_image_yields_nothing() {
        let mut reader = RqrrReader::new(DecodeHints::default());
        assert!(reader.decode(&blank_view()).is_none());
        assert!(reader.possible_points().is_empty());
    }

    #[test]
    fn hints_without_qr_skip_detection() {
        let hints = DecodeHints {
            formats: Some(vec![BarcodeFormat::Ean13]),
            character_set: None,
        };
        let mut reader = RqrrReader::new(hints);
        assert!(reader.decode(&blank_view()).is_none());
    }

    #[test]
    fn possible_points_drain() {
        let mut reader = RqrrReader::new(DecodeHints::default());
        reader.last_points.push(Point::new(1.0, 2.0));
        assert_eq!(reader.possible_points().len(), 1);
        assert!(reader.possible_points().is_empty());
    }
}
