//! Framescan: live camera barcode scanning with background decoding
//!
//! This crate drives a camera preview and decodes barcodes from its frames
//! without ever blocking the caller's thread. Device work runs on one
//! shared camera worker thread, decoding runs on a per-session decode
//! thread, and results come back over an event channel the embedder drains
//! at its own pace.
//!
//! # Features
//! - Shared, reference-counted camera worker across concurrent scanners
//! - Continuous and single-shot decode sessions with live reconfiguration
//! - Preview size negotiation with fit/crop/stretch scaling strategies
//! - Viewfinder framing with coordinate mapping back to preview pixels
//! - Torch control, auto focus cycling, and ambient-light auto torch
//! - Scripted synthetic camera for hardware-free tests and demos
//!
//! # Usage
//! Add this to your `Cargo.toml`:
//! ```toml
//! [dependencies]
//! framescan = "0.4"
//! ```
//!
//! Then drive a scanner from your UI or main loop:
//! ```rust,ignore
//! use framescan::{BarcodeScanner, Size};
//!
//! fn main() -> Result<(), framescan::ScanError> {
//!     framescan::init_logging();
//!     let mut scanner = BarcodeScanner::new();
//!     scanner.set_container_size(Size::new(1080, 1920));
//!     scanner.resume()?;
//!     scanner.decode_continuous(Box::new(|result: &framescan::BarcodeResult| {
//!         println!("{result}");
//!     }));
//!     loop {
//!         scanner.pump_events();
//!         std::thread::sleep(std::time::Duration::from_millis(16));
//!     }
//! }
//! ```
pub mod camera;
pub mod config;
pub mod decoder;
pub mod errors;
pub mod events;
pub mod frame;
pub mod scaling;
pub mod scanner;
pub mod types;

// Testing utilities - scripted devices for offline scanning
pub mod testing;

// Re-exports for convenience
pub use camera::{
    CameraFacing, CameraSession, CameraSettings, CameraWorker, FocusMode, FrameSource,
    LightSensor, PreviewSurface, SourceOpener,
};
pub use config::ScannerConfig;
pub use decoder::{
    BarcodeFormat, BarcodeResult, BinarizationMode, DecodeHints, DecodedPayload, Decoder,
    DecoderFactory, DefaultDecoderFactory, Reader,
};
pub use errors::ScanError;
pub use events::{EventReceiver, EventSender, ScanEvent};
pub use scaling::{DisplayConfiguration, ScalingMode};
pub use scanner::{BarcodeListener, BarcodeScanner, DecodeMode, SavedState, StateListener};
pub use types::{Point, Rect, Rotation, Size};

/// Initialize logging for the scanning pipeline
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "framescan=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
