//! Decoder construction.

use crate::decoder::reader::{BarcodeFormat, DecodeHints};
use crate::decoder::rqrr_reader::RqrrReader;
use crate::decoder::{BinarizationMode, Decoder};

/// Builds the decoder used by a decode session.
///
/// A fresh decoder is created on the decode thread every time decoding
/// starts, so implementations must be cheap to call and shareable across
/// threads.
pub trait DecoderFactory: Send + Sync {
    fn create_decoder(&self, base_hints: &DecodeHints) -> Decoder;
}

/// Factory with preset formats, character set, and binarization mode.
///
/// Presets win over the base hints passed at creation time, so a scanner
/// configured for QR only stays QR only no matter what the per-session
/// hints ask for.
#[derive(Debug, Clone, Default)]
pub struct DefaultDecoderFactory {
    formats: Option<Vec<BarcodeFormat>>,
    character_set: Option<String>,
    mode: BinarizationMode,
}

impl DefaultDecoderFactory {
    pub fn new() -> Self {
        DefaultDecoderFactory::default()
    }

    pub fn with_formats(mut self, formats: Vec<BarcodeFormat>) -> Self {
        self.formats = Some(formats);
        self
    }

    pub fn with_character_set(mut self, character_set: impl Into<String>) -> Self {
        self.character_set = Some(character_set.into());
        self
    }

    pub fn with_mode(mut self, mode: BinarizationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> BinarizationMode {
        self.mode
    }

    fn merged(&self, base_hints: &DecodeHints) -> DecodeHints {
        DecodeHints {
            formats: self.formats.clone().or_else(|| base_hints.formats.clone()),
            character_set: self
                .character_set
                .clone()
                .or_else(|| base_hints.character_set.clone()),
        }
    }
}

impl DecoderFactory for DefaultDecoderFactory {
    fn create_decoder(&self, base_hints: &DecodeHints) -> Decoder {
        Decoder::new(
            Box::new(RqrrReader::new(self.merged(base_hints))),
            self.mode,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_override_base_hints() {
        let factory = DefaultDecoderFactory::new()
            .with_formats(vec![BarcodeFormat::QrCode])
            .with_character_set("ISO-8859-1");
        let base = DecodeHints {
            formats: Some(vec![BarcodeFormat::Ean13]),
            character_set: Some("UTF-8".into()),
        };
        let merged = factory.merged(&base);
        assert_eq!(merged.formats, Some(vec![BarcodeFormat::QrCode]));
        assert_eq!(merged.character_set.as_deref(), Some("ISO-8859-1"));
    }

    #[test]
    fn base_hints_fill_unset_presets() {
        let factory = DefaultDecoderFactory::new();
        let base = DecodeHints {
            formats: Some(vec![BarcodeFormat::QrCode]),
            character_set: None,
        };
        let merged = factory.merged(&base);
        assert_eq!(merged.formats, Some(vec![BarcodeFormat::QrCode]));
        assert!(merged.character_set.is_none());
    }

    #[test]
    fn default_factory_uses_normal_mode() {
        assert_eq!(DefaultDecoderFactory::new().mode(), BinarizationMode::Normal);
    }
}
