//! A camera that exists only as a script.
//!
//! [`SyntheticSource`] plays back a [`SyntheticScript`], and the script
//! doubles as the probe: every call the session layer makes to the device
//! is recorded where a test can read it back. Frames are generated, so the
//! whole pipeline runs without hardware.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::camera::{
    CameraFacing, CapturedFrame, DeviceMetadata, FrameSource, PreviewParameters, PreviewSurface,
    SourceOpener,
};
use crate::decoder::{
    BarcodeFormat, BinarizationMode, DecodeHints, DecodedPayload, Decoder, DecoderFactory, Reader,
};
use crate::errors::ScanError;
use crate::frame::{LuminanceView, PixelFormat};
use crate::types::{Point, Size};

/// Fallback resolution when no parameter pass has set one.
const DEVICE_DEFAULT_SIZE: Size = Size::new(640, 480);

/// A luminance ramp that shifts with the frame number, so consecutive
/// frames differ at every pixel.
pub fn gradient_luma(frame_number: u64, width: u32, height: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity((width as usize) * (height as usize));
    let base = (frame_number % 256) as u8;
    for y in 0..height {
        for x in 0..width {
            let value = base.wrapping_add((x % 256) as u8).wrapping_add((y % 256) as u8);
            data.push(value);
        }
    }
    data
}

/// Alternating black and white cells, `cell` pixels on a side.
pub fn checkerboard_luma(width: u32, height: u32, cell: u32) -> Vec<u8> {
    let cell = cell.max(1);
    let mut data = Vec::with_capacity((width as usize) * (height as usize));
    for y in 0..height {
        for x in 0..width {
            let dark = ((x / cell) + (y / cell)) % 2 == 0;
            data.push(if dark { 0 } else { 255 });
        }
    }
    data
}

#[derive(Debug)]
struct ScriptState {
    device_id: String,
    facing: CameraFacing,
    sensor_orientation: i32,
    supported_sizes: Vec<Size>,
    // Failure injection.
    fail_open: bool,
    parameter_rejections: u32,
    fail_start: bool,
    failing_grabs: u32,
    fail_torch: bool,
    grab_delay: Duration,
    release_hang: Duration,
    // Observations, written by the source as the worker drives it.
    opens: u32,
    applied_passes: Vec<PreviewParameters>,
    applied_size: Option<Size>,
    surfaces: Vec<u64>,
    preview_starts: u32,
    preview_stops: u32,
    previewing: bool,
    frames_served: u64,
    torch_history: Vec<bool>,
    torch_on: bool,
    focus_cycles: u32,
    releases: u32,
}

impl Default for ScriptState {
    fn default() -> Self {
        ScriptState {
            device_id: "synthetic-0".to_string(),
            facing: CameraFacing::Back,
            // A typical phone module, mounted sideways.
            sensor_orientation: 90,
            supported_sizes: vec![
                Size::new(640, 480),
                Size::new(1280, 720),
                Size::new(1920, 1080),
            ],
            fail_open: false,
            parameter_rejections: 0,
            fail_start: false,
            failing_grabs: 0,
            fail_torch: false,
            grab_delay: Duration::ZERO,
            release_hang: Duration::ZERO,
            opens: 0,
            applied_passes: Vec::new(),
            applied_size: None,
            surfaces: Vec::new(),
            preview_starts: 0,
            preview_stops: 0,
            previewing: false,
            frames_served: 0,
            torch_history: Vec::new(),
            torch_on: false,
            focus_cycles: 0,
            releases: 0,
        }
    }
}

/// Shared script and probe for synthetic devices.
///
/// Clone it freely: one clone goes into the [`SyntheticOpener`], the test
/// keeps another and reads the observations back after driving the
/// session. Setters only take effect for calls made after them, so arrange
/// the script before opening the camera.
#[derive(Debug, Clone, Default)]
pub struct SyntheticScript {
    inner: Arc<Mutex<ScriptState>>,
}

impl SyntheticScript {
    pub fn new() -> Self {
        SyntheticScript::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        self.inner.lock().expect("lock poisoned")
    }

    pub fn set_device_id(&self, id: &str) {
        self.lock().device_id = id.to_string();
    }

    pub fn set_facing(&self, facing: CameraFacing) {
        self.lock().facing = facing;
    }

    pub fn set_sensor_orientation(&self, degrees: i32) {
        self.lock().sensor_orientation = degrees;
    }

    pub fn set_supported_sizes(&self, sizes: &[Size]) {
        self.lock().supported_sizes = sizes.to_vec();
    }

    /// Makes the opener report no device at all.
    pub fn fail_open(&self) {
        self.lock().fail_open = true;
    }

    /// Rejects the next `count` parameter passes. One rejection refuses the
    /// desired pass and accepts the safe retry; two refuse both.
    pub fn reject_parameter_passes(&self, count: u32) {
        self.lock().parameter_rejections = count;
    }

    pub fn fail_preview_start(&self) {
        self.lock().fail_start = true;
    }

    /// Fails the next `count` frame grabs.
    pub fn fail_grabs(&self, count: u32) {
        self.lock().failing_grabs = count;
    }

    /// Makes torch changes report failure, as a torchless device would.
    pub fn fail_torch(&self) {
        self.lock().fail_torch = true;
    }

    /// Stalls every frame grab, to give tests a slow device.
    pub fn set_grab_delay(&self, delay: Duration) {
        self.lock().grab_delay = delay;
    }

    /// Stalls release, simulating a device that hangs while closing.
    pub fn set_release_hang(&self, hang: Duration) {
        self.lock().release_hang = hang;
    }

    pub fn opens(&self) -> u32 {
        self.lock().opens
    }

    pub fn applied_passes(&self) -> Vec<PreviewParameters> {
        self.lock().applied_passes.clone()
    }

    pub fn attached_surfaces(&self) -> Vec<u64> {
        self.lock().surfaces.clone()
    }

    pub fn preview_starts(&self) -> u32 {
        self.lock().preview_starts
    }

    pub fn preview_stops(&self) -> u32 {
        self.lock().preview_stops
    }

    pub fn is_previewing(&self) -> bool {
        self.lock().previewing
    }

    pub fn frames_served(&self) -> u64 {
        self.lock().frames_served
    }

    pub fn torch_history(&self) -> Vec<bool> {
        self.lock().torch_history.clone()
    }

    pub fn focus_cycles(&self) -> u32 {
        self.lock().focus_cycles
    }

    pub fn releases(&self) -> u32 {
        self.lock().releases
    }

    pub fn was_released(&self) -> bool {
        self.releases() > 0
    }
}

/// A [`FrameSource`] driven entirely by its script.
pub struct SyntheticSource {
    script: SyntheticScript,
    frame_number: u64,
}

impl SyntheticSource {
    pub fn new(script: SyntheticScript) -> Self {
        SyntheticSource {
            script,
            frame_number: 0,
        }
    }
}

impl FrameSource for SyntheticSource {
    fn metadata(&self) -> DeviceMetadata {
        let state = self.script.lock();
        DeviceMetadata {
            id: state.device_id.clone(),
            name: "Synthetic Camera".to_string(),
            facing: state.facing,
            sensor_orientation: state.sensor_orientation,
        }
    }

    fn supported_preview_sizes(&mut self) -> Vec<Size> {
        self.script.lock().supported_sizes.clone()
    }

    fn apply_parameters(&mut self, params: &PreviewParameters) -> Result<(), ScanError> {
        let mut state = self.script.lock();
        state.applied_passes.push(params.clone());
        if state.parameter_rejections > 0 {
            state.parameter_rejections -= 1;
            return Err(ScanError::Configuration(
                "scripted parameter rejection".to_string(),
            ));
        }
        state.applied_size = params.preview_size;
        Ok(())
    }

    fn preview_size(&self) -> Option<Size> {
        self.script.lock().applied_size
    }

    fn attach_surface(&mut self, surface: &PreviewSurface) -> Result<(), ScanError> {
        self.script.lock().surfaces.push(surface.handle());
        Ok(())
    }

    fn start_preview(&mut self) -> Result<(), ScanError> {
        let mut state = self.script.lock();
        if state.fail_start {
            return Err(ScanError::CameraFatal(
                "scripted preview failure".to_string(),
            ));
        }
        state.previewing = true;
        state.preview_starts += 1;
        Ok(())
    }

    fn stop_preview(&mut self) -> Result<(), ScanError> {
        let mut state = self.script.lock();
        state.previewing = false;
        state.preview_stops += 1;
        Ok(())
    }

    fn grab_frame(&mut self) -> Result<CapturedFrame, ScanError> {
        let (delay, size) = {
            let mut state = self.script.lock();
            if state.failing_grabs > 0 {
                state.failing_grabs -= 1;
                return Err(ScanError::PreviewFrame("scripted grab failure".to_string()));
            }
            let size = state.applied_size.unwrap_or(DEVICE_DEFAULT_SIZE);
            (state.grab_delay, size)
        };
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        self.frame_number += 1;
        self.script.lock().frames_served += 1;
        Ok(CapturedFrame {
            data: gradient_luma(self.frame_number, size.width, size.height),
            width: size.width,
            height: size.height,
            format: PixelFormat::Luma8,
        })
    }

    fn set_torch(&mut self, on: bool) -> Result<(), ScanError> {
        let mut state = self.script.lock();
        state.torch_history.push(on);
        if state.fail_torch {
            return Err(ScanError::Configuration("no torch on this device".to_string()));
        }
        state.torch_on = on;
        Ok(())
    }

    fn torch_on(&self) -> bool {
        self.script.lock().torch_on
    }

    fn trigger_focus(&mut self) -> Result<(), ScanError> {
        self.script.lock().focus_cycles += 1;
        Ok(())
    }

    fn release(&mut self) -> Result<(), ScanError> {
        let hang = self.script.lock().release_hang;
        if !hang.is_zero() {
            thread::sleep(hang);
        }
        let mut state = self.script.lock();
        state.previewing = false;
        state.releases += 1;
        Ok(())
    }
}

/// Opens [`SyntheticSource`]s sharing one script.
pub struct SyntheticOpener {
    script: SyntheticScript,
}

impl SyntheticOpener {
    pub fn new(script: SyntheticScript) -> Self {
        SyntheticOpener { script }
    }
}

impl SourceOpener for SyntheticOpener {
    fn open(&self, requested: Option<&str>) -> Result<Box<dyn FrameSource>, ScanError> {
        {
            let mut state = self.script.lock();
            if state.fail_open {
                return Err(ScanError::DeviceUnavailable(
                    "no synthetic device".to_string(),
                ));
            }
            if let Some(id) = requested {
                if id != state.device_id {
                    return Err(ScanError::DeviceUnavailable(format!(
                        "no camera with id {id}"
                    )));
                }
            }
            state.opens += 1;
        }
        Ok(Box::new(SyntheticSource::new(self.script.clone())))
    }
}

/// A [`Reader`] that pops scripted outcomes instead of looking at pixels.
///
/// `None` entries are misses. Once the queue runs dry every further decode
/// misses too.
pub struct ScriptedReader {
    outcomes: Arc<Mutex<VecDeque<Option<String>>>>,
}

impl ScriptedReader {
    pub fn with_outcomes(outcomes: impl IntoIterator<Item = Option<String>>) -> Self {
        ScriptedReader {
            outcomes: Arc::new(Mutex::new(outcomes.into_iter().collect())),
        }
    }
}

impl Reader for ScriptedReader {
    fn decode(&mut self, _view: &LuminanceView) -> Option<DecodedPayload> {
        let text = self
            .outcomes
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .flatten()?;
        Some(DecodedPayload {
            raw_bytes: text.as_bytes().to_vec(),
            text,
            format: BarcodeFormat::QrCode,
            points: vec![Point::new(0.0, 0.0)],
        })
    }
}

/// Decoder factory handing out [`ScriptedReader`]s over a shared queue.
///
/// Push outcomes before or while the decode thread runs; each decoded
/// frame consumes one.
#[derive(Clone, Default)]
pub struct ScriptedDecoderFactory {
    outcomes: Arc<Mutex<VecDeque<Option<String>>>>,
}

impl ScriptedDecoderFactory {
    pub fn new() -> Self {
        ScriptedDecoderFactory::default()
    }

    /// Queues a successful decode carrying `text`.
    pub fn push_result(&self, text: &str) {
        self.outcomes
            .lock()
            .expect("lock poisoned")
            .push_back(Some(text.to_string()));
    }

    /// Queues a miss.
    pub fn push_miss(&self) {
        self.outcomes.lock().expect("lock poisoned").push_back(None);
    }

    pub fn remaining(&self) -> usize {
        self.outcomes.lock().expect("lock poisoned").len()
    }
}

impl DecoderFactory for ScriptedDecoderFactory {
    fn create_decoder(&self, _hints: &DecodeHints) -> Decoder {
        let reader = ScriptedReader {
            outcomes: Arc::clone(&self.outcomes),
        };
        Decoder::new(Box::new(reader), BinarizationMode::Normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_frames_change_with_the_frame_number() {
        let first = gradient_luma(0, 8, 8);
        let second = gradient_luma(1, 8, 8);
        assert_eq!(first.len(), 64);
        assert_eq!(second.len(), 64);
        assert!(first.iter().zip(&second).all(|(a, b)| a != b));
    }

    #[test]
    fn checkerboard_alternates_cells() {
        let data = checkerboard_luma(4, 4, 2);
        assert_eq!(data[0], 0);
        assert_eq!(data[2], 255);
        assert_eq!(data[2 * 4], 255);
        assert_eq!(data[2 * 4 + 2], 0);
    }

    #[test]
    fn source_plays_the_happy_path() {
        let script = SyntheticScript::new();
        let opener = SyntheticOpener::new(script.clone());

        let mut source = opener.open(None).unwrap();
        assert_eq!(script.opens(), 1);
        assert_eq!(source.metadata().sensor_orientation, 90);

        let params = PreviewParameters {
            preview_size: Some(Size::new(1280, 720)),
            focus_mode: None,
            torch: false,
            invert_colors: false,
            scene_mode: false,
            metering: false,
            exposure: false,
        };
        source.apply_parameters(&params).unwrap();
        assert_eq!(source.preview_size(), Some(Size::new(1280, 720)));

        source.attach_surface(&PreviewSurface::Window(7)).unwrap();
        source.start_preview().unwrap();
        let frame = source.grab_frame().unwrap();
        assert_eq!(frame.width, 1280);
        assert_eq!(frame.data.len(), 1280 * 720);

        source.set_torch(true).unwrap();
        assert!(source.torch_on());
        source.trigger_focus().unwrap();
        source.release().unwrap();

        assert_eq!(script.attached_surfaces(), vec![7]);
        assert_eq!(script.preview_starts(), 1);
        assert_eq!(script.frames_served(), 1);
        assert_eq!(script.torch_history(), vec![true]);
        assert_eq!(script.focus_cycles(), 1);
        assert!(script.was_released());
    }

    #[test]
    fn one_rejection_refuses_only_the_first_pass() {
        let script = SyntheticScript::new();
        script.reject_parameter_passes(1);
        let mut source = SyntheticSource::new(script.clone());

        let params = PreviewParameters {
            preview_size: Some(Size::new(640, 480)),
            focus_mode: None,
            torch: false,
            invert_colors: true,
            scene_mode: false,
            metering: false,
            exposure: false,
        };
        assert!(source.apply_parameters(&params).is_err());
        assert_eq!(source.preview_size(), None);
        assert!(source.apply_parameters(&params).is_ok());
        assert_eq!(source.preview_size(), Some(Size::new(640, 480)));
        assert_eq!(script.applied_passes().len(), 2);
    }

    #[test]
    fn opener_checks_the_requested_id() {
        let script = SyntheticScript::new();
        script.set_device_id("rear");
        let opener = SyntheticOpener::new(script.clone());

        assert!(opener.open(Some("front")).is_err());
        assert!(opener.open(Some("rear")).is_ok());
        assert!(opener.open(None).is_ok());
        assert_eq!(script.opens(), 2);
    }

    #[test]
    fn scripted_factory_pops_outcomes_in_order() {
        let factory = ScriptedDecoderFactory::new();
        factory.push_miss();
        factory.push_result("hello");

        let mut decoder = factory.create_decoder(&DecodeHints::default());
        let view = LuminanceView::new(vec![0; 16], 4, 4).unwrap();
        assert!(decoder.decode(&view).is_none());
        let payload = decoder.decode(&view).unwrap();
        assert_eq!(payload.text, "hello");
        assert!(decoder.decode(&view).is_none());
        assert_eq!(factory.remaining(), 0);
    }
}
