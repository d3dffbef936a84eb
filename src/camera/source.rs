//! The device seam: everything above this trait is portable logic.

use serde::{Deserialize, Serialize};

use crate::camera::settings::{CameraSettings, FocusMode};
use crate::camera::surface::PreviewSurface;
use crate::errors::ScanError;
use crate::frame::PixelFormat;
use crate::types::Size;

/// Which way the camera points relative to the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    /// Away from the user. Frames are delivered unmirrored.
    Back,
    /// Towards the user. Frames are mirrored to match what the user sees.
    Front,
    /// Detached device, e.g. a USB webcam. Treated like a back camera.
    External,
}

impl CameraFacing {
    pub fn is_front(&self) -> bool {
        matches!(self, CameraFacing::Front)
    }
}

/// Static facts about an opened device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceMetadata {
    pub id: String,
    pub name: String,
    pub facing: CameraFacing,
    /// Clockwise rotation in degrees needed for sensor output to appear
    /// upright on a display in its natural orientation. Multiples of 90.
    pub sensor_orientation: i32,
}

/// One frame pulled from the device, in the source's native format.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// The parameter set handed to [`FrameSource::apply_parameters`].
///
/// Configuration runs up to two passes. The desired pass carries everything
/// the settings ask for. If the device rejects it, the safe pass retries
/// with only the essentials, and if that fails too the session continues on
/// device defaults rather than erroring out.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewParameters {
    pub preview_size: Option<Size>,
    pub focus_mode: Option<FocusMode>,
    /// Initial torch state. Always off at configure time.
    pub torch: bool,
    pub invert_colors: bool,
    pub scene_mode: bool,
    pub metering: bool,
    /// Compensate exposure when the torch toggles.
    pub exposure: bool,
}

impl PreviewParameters {
    /// The full parameter set for the first configuration pass.
    pub fn desired(settings: &CameraSettings, preview_size: Option<Size>) -> Self {
        PreviewParameters {
            preview_size,
            focus_mode: settings.focus_mode(),
            torch: false,
            invert_colors: settings.scan_inverted(),
            scene_mode: settings.scene_mode(),
            metering: settings.metering(),
            exposure: settings.exposure(),
        }
    }

    /// The minimal parameter set retried after the desired pass is rejected.
    pub fn safe(settings: &CameraSettings, preview_size: Option<Size>) -> Self {
        PreviewParameters {
            preview_size,
            focus_mode: settings.focus_mode(),
            torch: false,
            invert_colors: false,
            scene_mode: false,
            metering: false,
            exposure: false,
        }
    }
}

/// A camera device as the session layer sees it.
///
/// Implementations are driven exclusively from the shared camera worker
/// thread, so they need `Send` but never interior locking. Methods for
/// capabilities a device lacks should return `Ok` and log, except
/// [`FrameSource::set_torch`], which reports the miss so callers know the
/// torch state did not change.
pub trait FrameSource: Send {
    fn metadata(&self) -> DeviceMetadata;

    /// Preview resolutions the device claims to support, natural orientation.
    fn supported_preview_sizes(&mut self) -> Vec<Size>;

    fn apply_parameters(&mut self, params: &PreviewParameters) -> Result<(), ScanError>;

    /// The resolution actually in effect, if the device reports one.
    fn preview_size(&self) -> Option<Size>;

    fn attach_surface(&mut self, surface: &PreviewSurface) -> Result<(), ScanError>;

    fn start_preview(&mut self) -> Result<(), ScanError>;

    fn stop_preview(&mut self) -> Result<(), ScanError>;

    /// Pulls the next preview frame. Only valid while previewing.
    fn grab_frame(&mut self) -> Result<CapturedFrame, ScanError>;

    fn set_torch(&mut self, on: bool) -> Result<(), ScanError>;

    fn torch_on(&self) -> bool;

    /// Kicks off one focus sweep. Called periodically in auto/macro modes.
    fn trigger_focus(&mut self) -> Result<(), ScanError>;

    /// Releases the device. The source is unusable afterwards.
    fn release(&mut self) -> Result<(), ScanError>;
}

/// Factory for [`FrameSource`] instances, injectable for tests.
pub trait SourceOpener: Send + Sync {
    /// Opens the requested device, or the default when `requested` is `None`.
    fn open(&self, requested: Option<&str>) -> Result<Box<dyn FrameSource>, ScanError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desired_parameters_follow_settings() {
        let mut settings = CameraSettings::default();
        settings.set_scan_inverted(true);
        settings.set_metering(true);

        let size = Some(Size::new(1280, 720));
        let desired = PreviewParameters::desired(&settings, size);
        assert_eq!(desired.preview_size, size);
        assert_eq!(desired.focus_mode, Some(FocusMode::Auto));
        assert!(desired.invert_colors);
        assert!(desired.metering);
        assert!(!desired.torch);
    }

    #[test]
    fn safe_parameters_keep_only_size_and_focus() {
        let mut settings = CameraSettings::default();
        settings.set_scan_inverted(true);
        settings.set_scene_mode(true);
        settings.set_metering(true);
        settings.set_exposure(true);

        let safe = PreviewParameters::safe(&settings, Some(Size::new(640, 480)));
        assert_eq!(safe.preview_size, Some(Size::new(640, 480)));
        assert_eq!(safe.focus_mode, Some(FocusMode::Auto));
        assert!(!safe.invert_colors);
        assert!(!safe.scene_mode);
        assert!(!safe.metering);
        assert!(!safe.exposure);
    }

    #[test]
    fn external_facing_is_not_front() {
        assert!(CameraFacing::Front.is_front());
        assert!(!CameraFacing::External.is_front());
    }
}
