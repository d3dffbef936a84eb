//! Error taxonomy for the scanning pipeline.
//!
//! Errors raised inside worker threads never cross a thread boundary as
//! panics; they are converted to events on the result channel or absorbed
//! where the failure is recoverable (a rejected parameter pass, a single
//! failed decode attempt).

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ScanError {
    /// No camera matched the requested id, or none exists. Fatal to the
    /// session; reported once as a camera-error event.
    #[error("no usable camera device: {0}")]
    DeviceUnavailable(String),

    /// Enqueue attempted after the worker's use-count dropped to zero.
    /// Benign during shutdown races.
    #[error("camera worker is not running: {0}")]
    WorkerNotRunning(String),

    /// Unexpected failure from open/start. Session transitions to closed;
    /// repeats are suppressed for the session's lifetime.
    #[error("camera failure: {0}")]
    CameraFatal(String),

    /// A single preview frame failed to deliver. Recovered by requesting
    /// the next frame.
    #[error("preview frame failed: {0}")]
    PreviewFrame(String),

    /// The device rejected a parameter set. Recovered internally by the
    /// desired / safe / default fallback ladder; never shown to the caller.
    #[error("camera parameters rejected: {0}")]
    Configuration(String),

    /// Configuration file could not be read, written, or parsed.
    #[error("configuration file error: {0}")]
    ConfigFile(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
