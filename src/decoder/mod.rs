//! Barcode decoding pipeline.
//!
//! [`Decoder`] wraps a [`Reader`] with the binarization policy, the
//! [`factory`] builds decoders from hints, and [`thread`] runs the
//! request/decode loop against a camera session.

pub mod factory;
pub mod reader;
pub mod result;
pub mod rqrr_reader;
pub mod thread;

pub use factory::{DecoderFactory, DefaultDecoderFactory};
pub use reader::{BarcodeFormat, DecodeHints, DecodedPayload, Reader};
pub use result::BarcodeResult;
pub use rqrr_reader::RqrrReader;
pub use thread::DecoderThread;

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::{Deserialize, Serialize};

use crate::frame::LuminanceView;
use crate::types::Point;

/// How luminance data is interpreted before it reaches the reader.
///
/// Scanning a barcode shown on a screen in dark mode means light modules
/// on a dark background, which readers expect the other way around.
/// `Alternating` flips the interpretation on every frame so both kinds
/// are found without doubling the work per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinarizationMode {
    Normal,
    Inverted,
    Alternating,
}

impl Default for BinarizationMode {
    fn default() -> Self {
        BinarizationMode::Normal
    }
}

/// A reader plus the binarization policy applied to each frame.
pub struct Decoder {
    reader: Box<dyn Reader>,
    mode: BinarizationMode,
    invert_next: bool,
}

impl Decoder {
    pub fn new(reader: Box<dyn Reader>, mode: BinarizationMode) -> Self {
        Decoder {
            reader,
            mode,
            // Alternating starts on the inverted pass.
            invert_next: true,
        }
    }

    /// Decodes one frame, honoring the binarization mode.
    ///
    /// In `Alternating` mode the orientation flips on every call,
    /// whether or not this one produced a result.
    pub fn decode(&mut self, view: &LuminanceView) -> Option<DecodedPayload> {
        let invert = match self.mode {
            BinarizationMode::Normal => false,
            BinarizationMode::Inverted => true,
            BinarizationMode::Alternating => {
                let invert = self.invert_next;
                self.invert_next = !self.invert_next;
                invert
            }
        };
        if invert {
            self.catch_decode(&view.inverted())
        } else {
            self.catch_decode(view)
        }
    }

    /// Points noticed during the most recent decode, decoded or not.
    pub fn possible_points(&mut self) -> Vec<Point> {
        self.reader.possible_points()
    }

    // A malformed frame must not take the decode thread down with it.
    fn catch_decode(&mut self, view: &LuminanceView) -> Option<DecodedPayload> {
        match catch_unwind(AssertUnwindSafe(|| self.reader.decode(view))) {
            Ok(payload) => payload,
            Err(_) => {
                log::warn!("reader panicked on a frame, skipping it");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct ScriptedReader {
        saw_inverted: Arc<Mutex<Vec<bool>>>,
    }

    impl Reader for ScriptedReader {
        fn decode(&mut self, view: &LuminanceView) -> Option<DecodedPayload> {
            // The probe frame is all black, so any white pixel means the
            // decoder handed us the inverted view.
            let inverted = view.get(0, 0) == 255;
            self.saw_inverted.lock().expect("lock poisoned").push(inverted);
            None
        }
    }

    fn black_view() -> LuminanceView {
        LuminanceView::new(vec![0; 16], 4, 4).unwrap()
    }

    fn observed(mode: BinarizationMode, calls: usize) -> Vec<bool> {
        let script = Arc::new(Mutex::new(Vec::new()));
        let mut decoder = Decoder::new(
            Box::new(ScriptedReader {
                saw_inverted: Arc::clone(&script),
            }),
            mode,
        );
        let view = black_view();
        for _ in 0..calls {
            decoder.decode(&view);
        }
        let seen = script.lock().expect("lock poisoned").clone();
        seen
    }

    #[test]
    fn normal_mode_never_inverts() {
        assert_eq!(observed(BinarizationMode::Normal, 3), vec![false, false, false]);
    }

    #[test]
    fn inverted_mode_always_inverts() {
        assert_eq!(observed(BinarizationMode::Inverted, 3), vec![true, true, true]);
    }

    #[test]
    fn alternating_mode_flips_every_call() {
        assert_eq!(
            observed(BinarizationMode::Alternating, 4),
            vec![true, false, true, false]
        );
    }

    #[test]
    fn panicking_reader_is_contained() {
        struct PanickyReader;
        impl Reader for PanickyReader {
            fn decode(&mut self, _view: &LuminanceView) -> Option<DecodedPayload> {
                panic!("boom");
            }
        }
        let mut decoder = Decoder::new(Box::new(PanickyReader), BinarizationMode::Normal);
        assert!(decoder.decode(&black_view()).is_none());
    }

    #[test]
    fn default_mode_is_normal() {
        assert_eq!(BinarizationMode::default(), BinarizationMode::Normal);
    }
}
