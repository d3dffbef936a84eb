//! Production frame source over the nokhwa capture library.
//!
//! Desktop webcams have no torch, no focus control and no orientation
//! sensor, so most parameter requests reduce to logging. What the backend
//! does provide is device enumeration, format selection and a frame stream,
//! which is everything the decode pipeline actually needs.

use nokhwa::pixel_format::LumaFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::{query, CallbackCamera};

use crate::camera::source::{
    CameraFacing, CapturedFrame, DeviceMetadata, FrameSource, PreviewParameters, SourceOpener,
};
use crate::camera::surface::PreviewSurface;
use crate::errors::ScanError;
use crate::frame::PixelFormat;
use crate::types::Size;

const STREAM_FPS: u32 = 30;

/// Opens [`NokhwaSource`] devices. The default backend for sessions.
pub struct NokhwaOpener;

impl NokhwaOpener {
    pub fn new() -> Self {
        NokhwaOpener
    }
}

impl Default for NokhwaOpener {
    fn default() -> Self {
        NokhwaOpener::new()
    }
}

impl SourceOpener for NokhwaOpener {
    fn open(&self, requested: Option<&str>) -> Result<Box<dyn FrameSource>, ScanError> {
        Ok(Box::new(NokhwaSource::open(requested)?))
    }
}

pub struct NokhwaSource {
    camera: Option<CallbackCamera>,
    index: CameraIndex,
    metadata: DeviceMetadata,
    applied_size: Option<Size>,
    streaming: bool,
}

// The nokhwa camera is only touched from the camera worker thread.
unsafe impl Send for NokhwaSource {}

impl NokhwaSource {
    /// Opens the device matching `requested` by index or name, or the
    /// first device found.
    pub fn open(requested: Option<&str>) -> Result<NokhwaSource, ScanError> {
        let devices = query(ApiBackend::Auto)
            .map_err(|e| ScanError::DeviceUnavailable(format!("camera query failed: {e}")))?;
        let info = match requested {
            Some(wanted) => devices
                .iter()
                .find(|d| d.index().to_string() == wanted || d.human_name() == wanted)
                .ok_or_else(|| {
                    ScanError::DeviceUnavailable(format!("no camera matches '{wanted}'"))
                })?,
            None => devices
                .first()
                .ok_or_else(|| ScanError::DeviceUnavailable("no cameras detected".to_string()))?,
        };
        let index = info.index().clone();
        let metadata = DeviceMetadata {
            id: index.to_string(),
            name: info.human_name(),
            facing: CameraFacing::External,
            sensor_orientation: 0,
        };
        let camera = open_camera(index.clone(), RequestedFormatType::None)?;
        Ok(NokhwaSource {
            camera: Some(camera),
            index,
            metadata,
            applied_size: None,
            streaming: false,
        })
    }

    /// Replaces the camera handle with one opened at `format_type`. The old
    /// handle must be dropped first or the device stays busy.
    fn reopen(&mut self, format_type: RequestedFormatType) -> Result<(), ScanError> {
        let was_streaming = self.streaming;
        if let Some(mut old) = self.camera.take() {
            if was_streaming {
                let _ = old.stop_stream();
            }
            self.streaming = false;
        }
        let mut camera = open_camera(self.index.clone(), format_type)?;
        if was_streaming {
            camera
                .open_stream()
                .map_err(|e| ScanError::CameraFatal(format!("failed to restart stream: {e}")))?;
            self.streaming = true;
        }
        self.camera = Some(camera);
        Ok(())
    }
}

impl FrameSource for NokhwaSource {
    fn metadata(&self) -> DeviceMetadata {
        self.metadata.clone()
    }

    fn supported_preview_sizes(&mut self) -> Vec<Size> {
        // Mode enumeration is not dependable across nokhwa backends, so
        // offer the ladder every UVC-class device handles.
        vec![
            Size::new(1920, 1080),
            Size::new(1280, 720),
            Size::new(800, 600),
            Size::new(640, 480),
            Size::new(352, 288),
            Size::new(320, 240),
        ]
    }

    fn apply_parameters(&mut self, params: &PreviewParameters) -> Result<(), ScanError> {
        if let Some(mode) = params.focus_mode {
            log::debug!("focus mode {mode:?} requested, backend has no focus control");
        }
        if params.invert_colors || params.scene_mode || params.metering || params.exposure {
            log::debug!("imaging tweaks requested, backend applies none of them");
        }
        let size = match params.preview_size {
            Some(size) => size,
            None => return Ok(()),
        };
        if self.applied_size == Some(size) {
            return Ok(());
        }
        let exact = RequestedFormatType::Exact(CameraFormat::new(
            Resolution::new(size.width, size.height),
            FrameFormat::MJPEG,
            STREAM_FPS,
        ));
        match self.reopen(exact) {
            Ok(()) => {
                self.applied_size = Some(size);
                log::info!("camera format set to {size} at {STREAM_FPS} fps");
                Ok(())
            }
            Err(e) => {
                if let Err(restore) = self.reopen(RequestedFormatType::None) {
                    log::error!("could not restore default camera format: {restore}");
                }
                self.applied_size = None;
                Err(ScanError::Configuration(format!(
                    "device rejected {size}: {e}"
                )))
            }
        }
    }

    fn preview_size(&self) -> Option<Size> {
        self.applied_size
    }

    fn attach_surface(&mut self, surface: &PreviewSurface) -> Result<(), ScanError> {
        // Rendering is the embedder's concern; the backend only streams.
        log::debug!("preview surface {surface:?} attached");
        Ok(())
    }

    fn start_preview(&mut self) -> Result<(), ScanError> {
        let camera = match self.camera.as_mut() {
            Some(c) => c,
            None => return Err(ScanError::CameraFatal("camera is not open".to_string())),
        };
        camera
            .open_stream()
            .map_err(|e| ScanError::CameraFatal(format!("failed to open stream: {e}")))?;
        self.streaming = true;
        Ok(())
    }

    fn stop_preview(&mut self) -> Result<(), ScanError> {
        let camera = match self.camera.as_mut() {
            Some(c) => c,
            None => return Ok(()),
        };
        self.streaming = false;
        camera
            .stop_stream()
            .map_err(|e| ScanError::CameraFatal(format!("failed to stop stream: {e}")))
    }

    fn grab_frame(&mut self) -> Result<CapturedFrame, ScanError> {
        let camera = match self.camera.as_mut() {
            Some(c) => c,
            None => return Err(ScanError::PreviewFrame("camera is not open".to_string())),
        };
        let buffer = camera
            .poll_frame()
            .map_err(|e| ScanError::PreviewFrame(format!("frame poll failed: {e}")))?;
        let resolution = buffer.resolution();
        let luma = buffer
            .decode_image::<LumaFormat>()
            .map_err(|e| ScanError::PreviewFrame(format!("luma decode failed: {e}")))?;
        Ok(CapturedFrame {
            data: luma.into_raw(),
            width: resolution.width_x,
            height: resolution.height_y,
            format: PixelFormat::Luma8,
        })
    }

    fn set_torch(&mut self, _on: bool) -> Result<(), ScanError> {
        Err(ScanError::Configuration(
            "backend has no torch control".to_string(),
        ))
    }

    fn torch_on(&self) -> bool {
        false
    }

    fn trigger_focus(&mut self) -> Result<(), ScanError> {
        log::debug!("focus sweep requested, backend has no focus control");
        Ok(())
    }

    fn release(&mut self) -> Result<(), ScanError> {
        if let Some(mut camera) = self.camera.take() {
            if self.streaming {
                let _ = camera.stop_stream();
                self.streaming = false;
            }
        }
        Ok(())
    }
}

impl Drop for NokhwaSource {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

fn open_camera(
    index: CameraIndex,
    format_type: RequestedFormatType,
) -> Result<CallbackCamera, ScanError> {
    let requested = RequestedFormat::new::<LumaFormat>(format_type);
    CallbackCamera::new(index, requested, |_| {})
        .map_err(|e| ScanError::DeviceUnavailable(format!("failed to open camera: {e}")))
}
