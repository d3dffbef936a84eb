//! The reader seam: symbology engines plug in behind one small trait.

use serde::{Deserialize, Serialize};

use crate::frame::LuminanceView;
use crate::types::Point;

/// Barcode symbologies a reader may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BarcodeFormat {
    QrCode,
    MicroQrCode,
    DataMatrix,
    Aztec,
    Pdf417,
    Ean8,
    Ean13,
    UpcA,
    UpcE,
    Code39,
    Code93,
    Code128,
    Itf,
    Codabar,
}

/// Caller preferences passed to a reader at construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecodeHints {
    /// Formats to look for; `None` means anything the reader supports.
    pub formats: Option<Vec<BarcodeFormat>>,
    /// Text encoding for symbologies that do not declare their own.
    pub character_set: Option<String>,
}

impl DecodeHints {
    pub fn allows(&self, format: BarcodeFormat) -> bool {
        match &self.formats {
            Some(formats) => formats.contains(&format),
            None => true,
        }
    }
}

/// A successfully decoded symbol, in the coordinates of the decoded view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedPayload {
    pub text: String,
    pub raw_bytes: Vec<u8>,
    pub format: BarcodeFormat,
    /// Locator points (finder patterns or symbol corners).
    pub points: Vec<Point>,
}

/// One symbology engine.
///
/// `decode` is one attempt on one view; anything that is not a clean hit is
/// `None`. Readers keep per-frame scratch state (`&mut self`), which is
/// safe because each decode worker owns its reader exclusively.
pub trait Reader: Send {
    fn decode(&mut self, view: &LuminanceView) -> Option<DecodedPayload>;

    /// Candidate points noticed during the last attempt, even when the
    /// decode failed. Drains the internal buffer.
    fn possible_points(&mut self) -> Vec<Point> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_hints_allow_everything() {
        let hints = DecodeHints::default();
        assert!(hints.allows(BarcodeFormat::QrCode));
        assert!(hints.allows(BarcodeFormat::Ean13));
    }

    #[test]
    fn format_list_restricts() {
        let hints = DecodeHints {
            formats: Some(vec![BarcodeFormat::QrCode, BarcodeFormat::Aztec]),
            character_set: None,
        };
        assert!(hints.allows(BarcodeFormat::QrCode));
        assert!(!hints.allows(BarcodeFormat::Ean13));
    }

    #[test]
    fn formats_serialize_kebab_case() {
        let json = serde_json::to_string(&BarcodeFormat::QrCode).unwrap();
        assert_eq!(json, "\"qr-code\"");
    }
}
