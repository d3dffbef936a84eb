//! A decoded barcode paired with the frame it was found in.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::decoder::reader::{BarcodeFormat, DecodedPayload};
use crate::errors::ScanError;
use crate::frame::SourceData;
use crate::types::Point;

/// Downsample factor for frame snapshots handed to callers.
const IMAGE_SCALE: u32 = 2;

/// What the reader found, stamped at decode time, with enough frame
/// context to render a snapshot or overlay the detection points.
#[derive(Debug, Clone)]
pub struct BarcodeResult {
    payload: DecodedPayload,
    source: SourceData,
    timestamp: DateTime<Utc>,
}

impl BarcodeResult {
    pub fn new(payload: DecodedPayload, source: SourceData) -> Self {
        BarcodeResult {
            payload,
            source,
            timestamp: Utc::now(),
        }
    }

    pub fn text(&self) -> &str {
        &self.payload.text
    }

    pub fn raw_bytes(&self) -> &[u8] {
        &self.payload.raw_bytes
    }

    pub fn format(&self) -> BarcodeFormat {
        self.payload.format
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Detection points mapped into the coordinates of the frame in
    /// display orientation, so they line up with [`BarcodeResult::to_image`].
    pub fn result_points(&self) -> Vec<Point> {
        self.payload
            .points
            .iter()
            .map(|p| self.source.translate_point(*p))
            .collect()
    }

    pub fn source_data(&self) -> &SourceData {
        &self.source
    }

    /// Grayscale snapshot of the whole captured frame, downsampled to
    /// keep it cheap to hold on to.
    pub fn to_image(&self) -> Result<image::GrayImage, ScanError> {
        self.source.to_image(None, IMAGE_SCALE)
    }
}

impl fmt::Display for BarcodeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.payload.text)
    }
}
