//! Device orchestration: open, configure, preview, torch, focus.
//!
//! Every method here runs on the camera worker thread, invoked through
//! session tasks. The controller owns the frame source and the helper
//! threads (auto focus, ambient light) that only live while previewing.

use std::sync::{Arc, Mutex};

use crate::camera::ambient::{AmbientLightMonitor, SharedLightSensor};
use crate::camera::autofocus::AutoFocusManager;
use crate::camera::settings::CameraSettings;
use crate::camera::source::{
    CameraFacing, DeviceMetadata, FrameSource, PreviewParameters, SourceOpener,
};
use crate::camera::surface::PreviewSurface;
use crate::camera::worker::CameraWorker;
use crate::errors::ScanError;
use crate::frame::SourceData;
use crate::scaling::DisplayConfiguration;
use crate::types::{Rotation, Size};

pub(crate) struct CameraController {
    opener: Arc<dyn SourceOpener>,
    settings: CameraSettings,
    display_config: Option<DisplayConfiguration>,
    source: Option<Box<dyn FrameSource>>,
    metadata: Option<DeviceMetadata>,
    /// Rotation from sensor frame to display orientation.
    rotation: Rotation,
    requested_size: Option<Size>,
    /// Size in effect after configuration, natural orientation.
    realized_size: Option<Size>,
    previewing: bool,
    surface: Option<PreviewSurface>,
    autofocus: Option<AutoFocusManager>,
    ambient: Option<AmbientLightMonitor>,
    light_sensor: Option<SharedLightSensor>,
}

impl CameraController {
    pub fn new(settings: CameraSettings, opener: Arc<dyn SourceOpener>) -> Self {
        CameraController {
            opener,
            settings,
            display_config: None,
            source: None,
            metadata: None,
            rotation: Rotation::Deg0,
            requested_size: None,
            realized_size: None,
            previewing: false,
            surface: None,
            autofocus: None,
            ambient: None,
            light_sensor: None,
        }
    }

    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    pub fn set_display_config(&mut self, config: DisplayConfiguration) {
        self.display_config = Some(config);
    }

    pub fn set_surface(&mut self, surface: PreviewSurface) {
        self.surface = Some(surface);
    }

    pub fn set_light_sensor(&mut self, sensor: SharedLightSensor) {
        self.light_sensor = Some(sensor);
    }

    /// Opens the device named by the settings.
    pub fn open(&mut self) -> Result<(), ScanError> {
        if self.source.is_some() {
            log::warn!("open called twice on one controller");
            return Ok(());
        }
        let source = self.opener.open(self.settings.requested_device_id())?;
        let metadata = source.metadata();
        log::info!(
            "opened camera {} ({:?}, sensor at {} degrees)",
            metadata.name,
            metadata.facing,
            metadata.sensor_orientation
        );
        self.metadata = Some(metadata);
        self.source = Some(source);
        Ok(())
    }

    /// Negotiates a preview size and applies the parameter ladder.
    ///
    /// Parameter rejection is never fatal: a failed desired pass retries in
    /// safe mode, and a failed safe pass leaves the device on its defaults.
    /// Returns the preview size in display orientation.
    pub fn configure(&mut self) -> Result<Size, ScanError> {
        let config = match self.display_config.clone() {
            Some(c) => c,
            None => {
                return Err(ScanError::InvalidArgument(
                    "configure called before display configuration".to_string(),
                ))
            }
        };
        self.rotation = self.frame_rotation(&config);
        let rotate = self.rotation.is_perpendicular();

        let source = match self.source.as_mut() {
            Some(s) => s,
            None => {
                return Err(ScanError::InvalidArgument(
                    "configure called before open".to_string(),
                ))
            }
        };
        let sizes = source.supported_preview_sizes();
        let requested = if sizes.is_empty() {
            log::warn!("device reports no preview sizes, relying on its defaults");
            None
        } else {
            config.best_preview_size(&sizes, rotate)
        };
        self.requested_size = requested;

        let desired = PreviewParameters::desired(&self.settings, requested);
        if let Err(first) = source.apply_parameters(&desired) {
            log::warn!("camera rejected desired parameters, retrying in safe mode: {first}");
            let safe = PreviewParameters::safe(&self.settings, requested);
            if let Err(second) = source.apply_parameters(&safe) {
                log::warn!(
                    "camera rejected safe-mode parameters, continuing on device defaults: {second}"
                );
            }
        }

        self.realized_size = source.preview_size().or(requested);
        let natural = match self.realized_size {
            Some(size) => size,
            None => {
                return Err(ScanError::CameraFatal(
                    "device reports no preview resolution".to_string(),
                ))
            }
        };
        let display = if rotate { natural.rotate() } else { natural };
        log::info!("preview resolution {natural} ({display} in display orientation)");
        Ok(display)
    }

    fn frame_rotation(&self, config: &DisplayConfiguration) -> Rotation {
        let metadata = match self.metadata.as_ref() {
            Some(m) => m,
            None => return Rotation::Deg0,
        };
        let degrees = rotation_degrees(
            metadata.facing,
            metadata.sensor_orientation,
            config.rotation().degrees(),
        );
        log::info!("sensor to display rotation: {degrees} degrees");
        Rotation::from_degrees(degrees).unwrap_or(Rotation::Deg0)
    }

    /// Starts the preview plus the focus and light helper threads.
    ///
    /// Needs the shared handle so the helpers can call back in through the
    /// worker without keeping the controller alive.
    pub fn start_preview(
        this: &Arc<Mutex<CameraController>>,
        worker: &CameraWorker,
    ) -> Result<(), ScanError> {
        let mut controller = this.lock().expect("lock poisoned");
        if controller.previewing {
            log::debug!("preview already running");
            return Ok(());
        }
        let surface = match controller.surface {
            Some(s) => s,
            None => {
                return Err(ScanError::CameraFatal(
                    "no preview surface attached".to_string(),
                ))
            }
        };
        {
            let source = match controller.source.as_mut() {
                Some(s) => s,
                None => return Err(ScanError::CameraFatal("camera is not open".to_string())),
            };
            source.attach_surface(&surface)?;
            source.start_preview()?;
        }
        controller.previewing = true;
        log::info!("preview started");

        let focus_mode = controller.settings.focus_mode();
        controller.autofocus =
            AutoFocusManager::start(worker.clone(), Arc::downgrade(this), focus_mode);
        if controller.settings.auto_torch() {
            match controller.light_sensor.clone() {
                Some(sensor) => {
                    controller.ambient =
                        AmbientLightMonitor::start(worker.clone(), Arc::downgrade(this), sensor);
                }
                None => log::debug!("auto torch enabled but no light sensor installed"),
            }
        }
        Ok(())
    }

    /// Applies a torch change, pausing the focus timer around it.
    ///
    /// Device refusal is logged, not propagated; the caller's torch state
    /// is a request, not a guarantee.
    pub fn set_torch(this: &Arc<Mutex<CameraController>>, worker: &CameraWorker, on: bool) {
        let mut controller = this.lock().expect("lock poisoned");
        if controller.source.is_none() {
            log::debug!("torch change ignored, camera is closed");
            return;
        }
        if controller.torch_on() == on {
            return;
        }
        if let Some(mut autofocus) = controller.autofocus.take() {
            autofocus.stop();
        }
        if let Some(source) = controller.source.as_mut() {
            match source.set_torch(on) {
                Ok(()) => log::info!("torch {}", if on { "on" } else { "off" }),
                Err(e) => log::error!("failed to set torch: {e}"),
            }
        }
        if controller.previewing {
            let focus_mode = controller.settings.focus_mode();
            controller.autofocus =
                AutoFocusManager::start(worker.clone(), Arc::downgrade(this), focus_mode);
        }
    }

    pub fn torch_on(&self) -> bool {
        self.source.as_ref().map(|s| s.torch_on()).unwrap_or(false)
    }

    /// One focus sweep, driven by the auto-focus timer.
    pub fn trigger_focus_cycle(&mut self) {
        if !self.previewing {
            return;
        }
        if let Some(source) = self.source.as_mut() {
            if let Err(e) = source.trigger_focus() {
                log::warn!("focus sweep failed: {e}");
            }
        }
    }

    /// Pulls one frame and wraps it with rotation and mirror metadata.
    pub fn grab_source_data(&mut self) -> Result<SourceData, ScanError> {
        if !self.previewing {
            return Err(ScanError::PreviewFrame("preview is not running".to_string()));
        }
        let mirrored = self
            .metadata
            .as_ref()
            .map(|m| m.facing.is_front())
            .unwrap_or(false);
        let rotation = self.rotation;
        let source = match self.source.as_mut() {
            Some(s) => s,
            None => return Err(ScanError::PreviewFrame("camera is closed".to_string())),
        };
        let captured = source.grab_frame()?;
        let mut data = SourceData::new(
            captured.data,
            captured.width,
            captured.height,
            captured.format,
            rotation,
        )?;
        data.set_mirrored(mirrored);
        Ok(data)
    }

    pub fn is_previewing(&self) -> bool {
        self.previewing
    }

    pub fn is_configured(&self) -> bool {
        self.realized_size.is_some()
    }

    /// Negotiated preview size in display orientation.
    pub fn preview_size_display(&self) -> Option<Size> {
        self.realized_size.map(|size| {
            if self.rotation.is_perpendicular() {
                size.rotate()
            } else {
                size
            }
        })
    }

    /// Stops the helper threads and the device preview.
    pub fn stop_preview(&mut self) {
        if let Some(mut autofocus) = self.autofocus.take() {
            autofocus.stop();
        }
        if let Some(mut ambient) = self.ambient.take() {
            ambient.stop();
        }
        if self.previewing {
            if let Some(source) = self.source.as_mut() {
                if let Err(e) = source.stop_preview() {
                    log::warn!("failed to stop preview: {e}");
                }
            }
            self.previewing = false;
        }
    }

    /// Stops everything and releases the device.
    pub fn close(&mut self) {
        self.stop_preview();
        if let Some(mut source) = self.source.take() {
            match source.release() {
                Ok(()) => log::info!("camera released"),
                Err(e) => log::error!("failed to release camera: {e}"),
            }
        }
        self.metadata = None;
        self.requested_size = None;
        self.realized_size = None;
    }
}

/// Clockwise rotation, in degrees, from sensor output to display
/// orientation. Front cameras compound the mirror with the rotation, which
/// flips the direction of correction.
fn rotation_degrees(facing: CameraFacing, sensor_orientation: i32, display_degrees: i32) -> i32 {
    if facing.is_front() {
        (360 - (sensor_orientation + display_degrees) % 360) % 360
    } else {
        (sensor_orientation - display_degrees + 360) % 360
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn back_camera_rotation() {
        // A typical phone sensor mounted at 90 degrees.
        assert_eq!(rotation_degrees(CameraFacing::Back, 90, 0), 90);
        assert_eq!(rotation_degrees(CameraFacing::Back, 90, 90), 0);
        assert_eq!(rotation_degrees(CameraFacing::Back, 90, 180), 270);
        assert_eq!(rotation_degrees(CameraFacing::Back, 90, 270), 180);
    }

    #[test]
    fn front_camera_rotation_compensates_for_mirroring() {
        assert_eq!(rotation_degrees(CameraFacing::Front, 270, 0), 90);
        assert_eq!(rotation_degrees(CameraFacing::Front, 270, 90), 0);
        assert_eq!(rotation_degrees(CameraFacing::Front, 270, 270), 180);
    }

    #[test]
    fn external_camera_behaves_like_back() {
        assert_eq!(rotation_degrees(CameraFacing::External, 0, 0), 0);
        assert_eq!(rotation_degrees(CameraFacing::External, 0, 90), 270);
    }

    #[test]
    fn rotation_is_always_a_right_angle() {
        for &facing in &[CameraFacing::Back, CameraFacing::Front] {
            for sensor in [0, 90, 180, 270] {
                for display in [0, 90, 180, 270] {
                    let degrees = rotation_degrees(facing, sensor, display);
                    assert_eq!(degrees % 90, 0);
                    assert!((0..360).contains(&degrees));
                }
            }
        }
    }
}
