//! The scanning orchestrator.
//!
//! [`BarcodeScanner`] is the owning-context object tying the pieces
//! together: it drives the camera session lifecycle, computes viewfinder
//! framing, starts and stops decode sessions, and dispatches events from
//! the worker threads to registered listeners. All public methods must be
//! called from the thread that created the scanner; worker outcomes are
//! collected by calling [`BarcodeScanner::pump_events`] from that thread.

use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::camera::{
    CameraSession, CameraSettings, CameraWorker, NokhwaOpener, PreviewSurface, SessionState,
    SharedLightSensor, SourceOpener,
};
use crate::decoder::{
    BarcodeResult, BinarizationMode, DecodeHints, DecoderFactory, DecoderThread,
    DefaultDecoderFactory,
};
use crate::errors::ScanError;
use crate::events::{event_channel, EventReceiver, EventSender, ScanEvent};
use crate::scaling::{DisplayConfiguration, ScalingMode};
use crate::types::{Point, Rect, Rotation, Size};

/// Ceiling for [`BarcodeScanner::pause_and_wait`].
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Margin fraction used when no explicit framing size is set.
const DEFAULT_MARGIN_FRACTION: f64 = 0.1;

/// What happens after a barcode is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeMode {
    /// Frames are pumped but results are not delivered.
    #[default]
    None,
    /// Deliver the first result, then stop decoding.
    Single,
    /// Deliver every result until decoding is stopped.
    Continuous,
}

/// Receives decode outcomes on the owning thread.
pub trait BarcodeListener {
    fn barcode_result(&mut self, result: &BarcodeResult);

    /// Candidate detection points from the latest attempt, for live
    /// viewfinder feedback. Delivered whether or not the attempt decoded.
    fn possible_points(&mut self, _points: &[Point]) {}
}

impl<F> BarcodeListener for F
where
    F: FnMut(&BarcodeResult),
{
    fn barcode_result(&mut self, result: &BarcodeResult) {
        self(result)
    }
}

/// Observes scanner lifecycle changes, all on the owning thread.
pub trait StateListener {
    /// Framing rectangles have been (re)computed and are available.
    fn preview_sized(&mut self) {}
    /// The hardware preview is confirmed running.
    fn preview_started(&mut self) {}
    /// The preview was stopped by a pause.
    fn preview_stopped(&mut self) {}
    fn camera_error(&mut self, _error: &ScanError) {}
    fn camera_closed(&mut self) {}
}

/// The one piece of state persisted across a save/restore cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SavedState {
    pub torch_on: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FramingSpec {
    /// Fraction of the smaller container dimension left free on each side.
    Margin(f64),
    /// Exact framing size, centered and clamped to the container.
    Exact(Size),
}

/// Owns one camera/decoder pipeline from the controlling context.
pub struct BarcodeScanner {
    worker: CameraWorker,
    opener: Option<Arc<dyn SourceOpener>>,
    settings: CameraSettings,
    decoder_factory: Option<Arc<dyn DecoderFactory>>,
    decode_hints: DecodeHints,
    framing: FramingSpec,
    scaling_override: Option<ScalingMode>,
    light_sensor: Option<SharedLightSensor>,

    session: Option<CameraSession>,
    decoder_thread: Option<DecoderThread>,
    events: Option<(EventSender, EventReceiver)>,
    decode_mode: DecodeMode,
    barcode_listener: Option<Box<dyn BarcodeListener>>,
    state_listeners: Vec<Box<dyn StateListener>>,

    display_rotation: Rotation,
    opened_rotation: Rotation,
    container_size: Option<Size>,
    display_config: Option<DisplayConfiguration>,
    configured: bool,
    preview_size: Option<Size>,
    surface: Option<PreviewSurface>,
    surface_rect: Option<Rect>,
    framing_rect: Option<Rect>,
    preview_framing_rect: Option<Rect>,
    preview_requested: bool,
    preview_active: bool,
    torch_on: bool,
    owner: ThreadId,
}

impl BarcodeScanner {
    /// A scanner on the process-wide camera worker.
    pub fn new() -> Self {
        BarcodeScanner::with_worker(CameraWorker::shared())
    }

    /// A scanner on a private worker handle (used by tests to keep worker
    /// lifecycles isolated).
    pub fn with_worker(worker: CameraWorker) -> Self {
        BarcodeScanner {
            worker,
            opener: None,
            settings: CameraSettings::default(),
            decoder_factory: None,
            decode_hints: DecodeHints::default(),
            framing: FramingSpec::Margin(DEFAULT_MARGIN_FRACTION),
            scaling_override: None,
            light_sensor: None,
            session: None,
            decoder_thread: None,
            events: None,
            decode_mode: DecodeMode::None,
            barcode_listener: None,
            state_listeners: Vec::new(),
            display_rotation: Rotation::Deg0,
            opened_rotation: Rotation::Deg0,
            container_size: None,
            display_config: None,
            configured: false,
            preview_size: None,
            surface: None,
            surface_rect: None,
            framing_rect: None,
            preview_framing_rect: None,
            preview_requested: false,
            preview_active: false,
            torch_on: false,
            owner: std::thread::current().id(),
        }
    }

    // ---- configuration, before or between activations ----

    /// Settings applied at the next [`BarcodeScanner::resume`]. Ignored
    /// while the camera is active.
    pub fn set_camera_settings(&mut self, settings: CameraSettings) {
        if self.is_active() {
            log::warn!("camera settings change ignored while the camera is active");
            return;
        }
        self.settings = settings;
    }

    pub fn camera_settings(&self) -> &CameraSettings {
        &self.settings
    }

    /// Device backend override, read at the next resume.
    pub fn set_source_opener(&mut self, opener: Arc<dyn SourceOpener>) {
        self.opener = Some(opener);
    }

    /// Ambient light source for auto-torch, installed at the next resume.
    pub fn set_light_sensor(&mut self, sensor: SharedLightSensor) {
        self.light_sensor = Some(sensor);
    }

    /// Replaces the decoder factory. A live decode session is restarted so
    /// the next frame already uses the new decoder.
    pub fn set_decoder_factory(&mut self, factory: Arc<dyn DecoderFactory>) {
        self.assert_owner();
        self.decoder_factory = Some(factory);
        if self.decoder_thread.is_some() {
            self.start_decoder_if_needed();
        }
    }

    /// Base hints handed to the decoder factory.
    pub fn set_decode_hints(&mut self, hints: DecodeHints) {
        self.assert_owner();
        self.decode_hints = hints;
        if self.decoder_thread.is_some() {
            self.start_decoder_if_needed();
        }
    }

    /// Exact framing rectangle size, centered in the container.
    pub fn set_framing_size(&mut self, size: Size) {
        self.framing = FramingSpec::Exact(size);
        self.recompute_frames();
    }

    /// Margin fraction of the smaller container dimension, per side.
    pub fn set_framing_margin_fraction(&mut self, fraction: f64) -> Result<(), ScanError> {
        if !(fraction < 0.5) {
            return Err(ScanError::InvalidArgument(
                "the margin fraction must be less than 0.5".to_string(),
            ));
        }
        self.framing = FramingSpec::Margin(fraction);
        self.recompute_frames();
        Ok(())
    }

    /// Overrides the scaling strategy chosen from the surface kind.
    pub fn set_scaling_mode(&mut self, mode: ScalingMode) {
        self.scaling_override = Some(mode);
    }

    // ---- lifecycle ----

    /// Opens the camera. Idempotent while active.
    ///
    /// Preview negotiation starts as soon as a container size is known
    /// (either already set, or via [`BarcodeScanner::set_container_size`]).
    pub fn resume(&mut self) -> Result<(), ScanError> {
        self.assert_owner();
        if self.session.is_some() {
            log::warn!("resume called while the camera is already active");
            return Ok(());
        }
        let (tx, rx) = event_channel();
        let opener = self
            .opener
            .clone()
            .unwrap_or_else(|| Arc::new(NokhwaOpener::new()));
        let session = CameraSession::with_opener(&self.worker, self.settings.clone(), opener);
        session.set_event_sender(tx.clone());
        if let Some(sensor) = &self.light_sensor {
            session.set_light_sensor(Arc::clone(sensor));
        }
        session.open()?;
        self.opened_rotation = self.display_rotation;
        self.events = Some((tx, rx));
        self.session = Some(session);
        self.configured = false;
        self.preview_requested = false;
        self.preview_active = false;
        if self.container_size.is_some() {
            self.configure_if_ready();
        }
        Ok(())
    }

    /// Stops decoding and closes the camera. Idempotent.
    ///
    /// The device teardown finishes in the background; a camera-closed
    /// event follows on the next pump. Decode mode and listeners survive,
    /// so a later resume picks up scanning again.
    pub fn pause(&mut self) {
        self.assert_owner();
        self.pause_inner();
    }

    /// [`BarcodeScanner::pause`], then a bounded wait for the camera to
    /// finish closing. Gives up after 2 seconds rather than hang.
    pub fn pause_and_wait(&mut self) {
        self.assert_owner();
        let session = self.session.clone();
        self.pause_inner();
        if let Some(session) = session {
            if !session.wait_for_close(CLOSE_TIMEOUT) {
                log::warn!("camera close did not finish within {CLOSE_TIMEOUT:?}");
            }
        }
    }

    /// Layout notification: the size of the area showing the preview.
    ///
    /// The first call after a resume triggers preview negotiation; later
    /// calls recompute the framing rectangles.
    pub fn set_container_size(&mut self, size: Size) {
        self.assert_owner();
        self.container_size = Some(size);
        self.configure_if_ready();
        if self.preview_size.is_some() {
            self.recompute_frames();
            self.try_start_preview();
        }
    }

    /// Attaches the display surface the preview renders onto.
    ///
    /// Attach before [`BarcodeScanner::resume`] to let the surface kind
    /// pick the default scaling strategy (crop for texture surfaces, fit
    /// otherwise).
    pub fn set_surface(&mut self, surface: PreviewSurface) {
        self.assert_owner();
        self.surface = Some(surface);
        self.try_start_preview();
    }

    /// Rotation of the display relative to its natural orientation.
    /// Changing it while active restarts the camera.
    pub fn set_display_rotation(&mut self, rotation: Rotation) -> Result<(), ScanError> {
        self.assert_owner();
        self.display_rotation = rotation;
        if self.is_active() && rotation != self.opened_rotation {
            log::info!("display rotated, restarting the camera");
            self.pause_inner();
            return self.resume();
        }
        Ok(())
    }

    pub fn set_torch(&mut self, on: bool) {
        self.assert_owner();
        self.torch_on = on;
        if let Some(session) = &self.session {
            session.set_torch(on);
        }
    }

    pub fn is_torch_on(&self) -> bool {
        self.torch_on
    }

    pub fn saved_state(&self) -> SavedState {
        SavedState {
            torch_on: self.torch_on,
        }
    }

    pub fn restore_state(&mut self, state: SavedState) {
        self.set_torch(state.torch_on);
    }

    // ---- decoding ----

    /// Decodes until the first result, delivers it, then stops.
    pub fn decode_single(&mut self, listener: Box<dyn BarcodeListener>) {
        self.assert_owner();
        self.decode_mode = DecodeMode::Single;
        self.barcode_listener = Some(listener);
        self.start_decoder_if_needed();
    }

    /// Delivers every result until [`BarcodeScanner::stop_decoding`].
    pub fn decode_continuous(&mut self, listener: Box<dyn BarcodeListener>) {
        self.assert_owner();
        self.decode_mode = DecodeMode::Continuous;
        self.barcode_listener = Some(listener);
        self.start_decoder_if_needed();
    }

    pub fn stop_decoding(&mut self) {
        self.assert_owner();
        self.decode_mode = DecodeMode::None;
        self.barcode_listener = None;
        self.stop_decoder_thread();
    }

    pub fn decode_mode(&self) -> DecodeMode {
        self.decode_mode
    }

    // ---- events ----

    pub fn add_state_listener(&mut self, listener: Box<dyn StateListener>) {
        self.state_listeners.push(listener);
    }

    /// Drains pending worker events and dispatches them to listeners.
    /// Returns the number of events handled. Must be called from the
    /// owning thread, typically once per UI tick.
    pub fn pump_events(&mut self) -> usize {
        self.assert_owner();
        let rx = match &self.events {
            Some((_, rx)) => rx.clone(),
            None => return 0,
        };
        let mut handled = 0;
        while let Ok(event) = rx.try_recv() {
            self.dispatch(event);
            handled += 1;
        }
        handled
    }

    // ---- observers ----

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_preview_active(&self) -> bool {
        self.preview_active
    }

    pub fn session_state(&self) -> SessionState {
        match &self.session {
            Some(session) => session.state(),
            None => SessionState::Closed,
        }
    }

    /// Negotiated preview resolution in display orientation.
    pub fn preview_size(&self) -> Option<Size> {
        self.preview_size
    }

    /// Viewfinder framing rectangle in container coordinates.
    pub fn framing_rect(&self) -> Option<Rect> {
        self.framing_rect
    }

    /// Framing rectangle mapped into preview-resolution coordinates; this
    /// is the region decode attempts look at.
    pub fn preview_framing_rect(&self) -> Option<Rect> {
        self.preview_framing_rect
    }

    /// Placement of the preview relative to the container.
    pub fn surface_rect(&self) -> Option<Rect> {
        self.surface_rect
    }

    // ---- internals ----

    fn pause_inner(&mut self) {
        self.stop_decoder_thread();
        match self.session.take() {
            Some(session) => session.close(),
            None => {
                // Parity with an active close: observers still get their
                // camera-closed notification on the next pump.
                if let Some((tx, _)) = &self.events {
                    tx.send(ScanEvent::CameraClosed);
                }
            }
        }
        self.preview_active = false;
        self.preview_requested = false;
        self.configured = false;
        self.display_config = None;
        self.preview_size = None;
        self.surface_rect = None;
        self.framing_rect = None;
        self.preview_framing_rect = None;
        for listener in &mut self.state_listeners {
            listener.preview_stopped();
        }
    }

    fn dispatch(&mut self, event: ScanEvent) {
        match event {
            ScanEvent::PreviewSizeReady(size) => {
                log::debug!("preview size ready: {size}");
                self.preview_size = Some(size);
                self.recompute_frames();
                self.try_start_preview();
            }
            ScanEvent::PreviewStarted => {
                self.preview_active = true;
                for listener in &mut self.state_listeners {
                    listener.preview_started();
                }
                self.start_decoder_if_needed();
            }
            ScanEvent::CameraClosed => {
                for listener in &mut self.state_listeners {
                    listener.camera_closed();
                }
            }
            ScanEvent::CameraError(error) => {
                if self.session.is_some() {
                    self.pause_inner();
                    for listener in &mut self.state_listeners {
                        listener.camera_error(&error);
                    }
                }
            }
            ScanEvent::DecodeSucceeded(result) => {
                if self.decode_mode != DecodeMode::None {
                    if let Some(listener) = self.barcode_listener.as_mut() {
                        listener.barcode_result(&result);
                    }
                    if self.decode_mode == DecodeMode::Single {
                        self.stop_decoding();
                    }
                }
            }
            ScanEvent::DecodeFailed => {}
            ScanEvent::PossiblePoints(points) => {
                if self.decode_mode != DecodeMode::None {
                    if let Some(listener) = self.barcode_listener.as_mut() {
                        listener.possible_points(&points);
                    }
                }
            }
        }
    }

    /// Builds the display configuration and queues preview negotiation,
    /// once per activation, as soon as both session and container exist.
    fn configure_if_ready(&mut self) {
        if self.configured {
            return;
        }
        let Some(session) = &self.session else { return };
        let Some(container) = self.container_size else {
            return;
        };
        let mode = self.effective_scaling_mode();
        let config =
            DisplayConfiguration::new(self.display_rotation, container).with_strategy(mode.strategy());
        self.display_config = Some(config.clone());
        session.set_display_config(config);
        if let Err(e) = session.configure() {
            log::warn!("camera configure rejected: {e}");
        }
        self.configured = true;
        if self.torch_on {
            session.set_torch(true);
        }
    }

    fn effective_scaling_mode(&self) -> ScalingMode {
        if let Some(mode) = self.scaling_override {
            return mode;
        }
        match self.surface {
            Some(surface) if surface.is_texture() => ScalingMode::Crop,
            _ => ScalingMode::Fit,
        }
    }

    /// Starts the hardware preview once the resolution is negotiated and a
    /// surface is attached. Runs at most once per activation.
    fn try_start_preview(&mut self) {
        if self.preview_requested {
            return;
        }
        let Some(session) = &self.session else { return };
        let Some(surface) = self.surface else { return };
        if self.preview_size.is_none() || self.surface_rect.is_none() {
            return;
        }
        log::info!("starting preview");
        session.set_surface(surface);
        if let Err(e) = session.start_preview() {
            log::warn!("preview start rejected: {e}");
            return;
        }
        self.preview_requested = true;
    }

    /// (Re)starts the decode session; any previous one is stopped first.
    fn start_decoder_if_needed(&mut self) {
        self.stop_decoder_thread();
        if self.decode_mode == DecodeMode::None || !self.preview_active {
            return;
        }
        let Some(session) = &self.session else { return };
        let Some((tx, _)) = &self.events else { return };
        let decoder = match &self.decoder_factory {
            Some(factory) => factory.create_decoder(&self.decode_hints),
            None => self.default_factory().create_decoder(&self.decode_hints),
        };
        let mut thread = DecoderThread::new(session.clone(), decoder, tx.clone());
        thread.set_crop_rect(self.preview_framing_rect);
        if let Err(e) = thread.start() {
            log::error!("decoding could not start: {e}");
            return;
        }
        self.decoder_thread = Some(thread);
    }

    fn default_factory(&self) -> DefaultDecoderFactory {
        let mode = if self.settings.scan_inverted() {
            BinarizationMode::Inverted
        } else {
            BinarizationMode::Normal
        };
        DefaultDecoderFactory::new().with_mode(mode)
    }

    fn stop_decoder_thread(&mut self) {
        if let Some(mut thread) = self.decoder_thread.take() {
            thread.stop();
        }
    }

    /// Recomputes surface placement and framing rectangles from the
    /// current container size, preview size, and display configuration.
    fn recompute_frames(&mut self) {
        self.surface_rect = None;
        self.framing_rect = None;
        self.preview_framing_rect = None;
        let (Some(container), Some(preview)) = (self.container_size, self.preview_size) else {
            return;
        };
        let Some(config) = &self.display_config else {
            return;
        };
        let Some(surface) = config.scale_preview(preview) else {
            return;
        };
        if surface.width() <= 0 || surface.height() <= 0 {
            log::warn!("preview placement is empty");
            return;
        }
        let framing = self.compute_framing_rect(Rect::from_size(container));
        let in_preview = framing.offset(-surface.left, -surface.top);
        let preview_framing = Rect::new(
            in_preview.left * preview.width as i32 / surface.width(),
            in_preview.top * preview.height as i32 / surface.height(),
            in_preview.right * preview.width as i32 / surface.width(),
            in_preview.bottom * preview.height as i32 / surface.height(),
        );
        self.surface_rect = Some(surface);
        if preview_framing.is_empty() {
            log::warn!("preview frame is too small");
        } else {
            self.framing_rect = Some(framing);
            self.preview_framing_rect = Some(preview_framing);
            for listener in &mut self.state_listeners {
                listener.preview_sized();
            }
        }
    }

    fn compute_framing_rect(&self, container: Rect) -> Rect {
        match self.framing {
            FramingSpec::Exact(size) => {
                let dx = ((container.width() - size.width as i32) / 2).max(0);
                let dy = ((container.height() - size.height as i32) / 2).max(0);
                container.inset(dx, dy)
            }
            FramingSpec::Margin(fraction) => {
                let margin = (container.width() as f64 * fraction)
                    .min(container.height() as f64 * fraction) as i32;
                let rect = container.inset(margin, margin);
                if rect.height() > rect.width() {
                    // Never taller than wide.
                    rect.inset(0, (rect.height() - rect.width()) / 2)
                } else {
                    rect
                }
            }
        }
    }

    fn assert_owner(&self) {
        debug_assert_eq!(
            std::thread::current().id(),
            self.owner,
            "scanner methods must run on the owning thread"
        );
    }
}

impl Default for BarcodeScanner {
    fn default() -> Self {
        BarcodeScanner::new()
    }
}

impl Drop for BarcodeScanner {
    fn drop(&mut self) {
        if self.session.is_some() {
            log::warn!("scanner dropped while active, closing the camera");
            self.pause_inner();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detached_scanner() -> BarcodeScanner {
        BarcodeScanner::with_worker(CameraWorker::new())
    }

    #[test]
    fn margin_framing_squares_off_portrait_containers() {
        let scanner = detached_scanner();
        let rect = scanner.compute_framing_rect(Rect::new(0, 0, 600, 1000));
        // Margin is 10% of the smaller dimension (60), then the vertical
        // excess is trimmed to keep the frame no taller than wide.
        assert_eq!(rect, Rect::new(60, 260, 540, 740));
    }

    #[test]
    fn margin_framing_landscape_keeps_both_margins() {
        let scanner = detached_scanner();
        let rect = scanner.compute_framing_rect(Rect::new(0, 0, 1000, 600));
        assert_eq!(rect, Rect::new(60, 60, 940, 540));
    }

    #[test]
    fn exact_framing_is_centered_and_clamped() {
        let mut scanner = detached_scanner();
        scanner.set_framing_size(Size::new(200, 100));
        let rect = scanner.compute_framing_rect(Rect::new(0, 0, 600, 400));
        assert_eq!(rect, Rect::new(200, 150, 400, 250));

        scanner.set_framing_size(Size::new(900, 100));
        let oversized = scanner.compute_framing_rect(Rect::new(0, 0, 600, 400));
        assert_eq!((oversized.left, oversized.right), (0, 600));
    }

    #[test]
    fn margin_fraction_must_stay_below_half() {
        let mut scanner = detached_scanner();
        assert!(scanner.set_framing_margin_fraction(0.49).is_ok());
        assert!(matches!(
            scanner.set_framing_margin_fraction(0.5),
            Err(ScanError::InvalidArgument(_))
        ));
        assert!(matches!(
            scanner.set_framing_margin_fraction(f64::NAN),
            Err(ScanError::InvalidArgument(_))
        ));
    }

    #[test]
    fn torch_state_round_trips_through_saved_state() {
        let mut scanner = detached_scanner();
        scanner.set_torch(true);
        let saved = scanner.saved_state();
        let mut restored = detached_scanner();
        restored.restore_state(saved);
        assert!(restored.is_torch_on());
    }

    #[test]
    fn default_scaling_follows_the_surface_kind() {
        let mut scanner = detached_scanner();
        assert_eq!(scanner.effective_scaling_mode(), ScalingMode::Fit);
        scanner.set_surface(PreviewSurface::Texture(1));
        assert_eq!(scanner.effective_scaling_mode(), ScalingMode::Crop);
        scanner.set_surface(PreviewSurface::Window(1));
        assert_eq!(scanner.effective_scaling_mode(), ScalingMode::Fit);
        scanner.set_scaling_mode(ScalingMode::Legacy);
        assert_eq!(scanner.effective_scaling_mode(), ScalingMode::Legacy);
    }

    #[test]
    fn pause_without_resume_reports_closed_on_next_pump() {
        struct ClosedFlag(std::rc::Rc<std::cell::Cell<bool>>);
        impl StateListener for ClosedFlag {
            fn camera_closed(&mut self) {
                self.0.set(true);
            }
        }
        let closed = std::rc::Rc::new(std::cell::Cell::new(false));
        let mut scanner = detached_scanner();
        scanner.add_state_listener(Box::new(ClosedFlag(closed.clone())));
        // No event channel exists before the first resume; pause is a
        // plain no-op there.
        scanner.pause();
        assert_eq!(scanner.pump_events(), 0);
        assert!(!closed.get());
    }

    #[test]
    fn inactive_scanner_reports_closed_state() {
        let scanner = detached_scanner();
        assert!(!scanner.is_active());
        assert!(!scanner.is_preview_active());
        assert_eq!(scanner.session_state(), SessionState::Closed);
        assert_eq!(scanner.decode_mode(), DecodeMode::None);
    }
}
