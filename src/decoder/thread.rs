//! The decode worker: request a frame, decode it, report, repeat.
//!
//! Frames travel as channel messages from the camera worker to this
//! thread. The run flag is checked when a request is issued, when a frame
//! is delivered, and again when it is dequeued, so no frame captured
//! before a stop is decoded after it.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::camera::{CameraSession, FrameSink};
use crate::decoder::result::BarcodeResult;
use crate::decoder::Decoder;
use crate::errors::ScanError;
use crate::events::{EventSender, ScanEvent};
use crate::frame::SourceData;
use crate::types::{Point, Rect};

/// How long `stop` waits for the decode thread to wind down before
/// letting it finish detached.
const STOP_TIMEOUT: Duration = Duration::from_secs(2);

enum DecodeMessage {
    Frame(SourceData),
    FrameFailed,
    Quit,
}

struct DecoderState {
    running: bool,
    tx: Option<Sender<DecodeMessage>>,
}

struct DecoderShared {
    state: Mutex<DecoderState>,
    events: EventSender,
}

/// Handed to the camera session for each frame request; forwards the
/// outcome to the decode thread while it is still running.
struct PreviewSink {
    shared: Arc<DecoderShared>,
}

impl FrameSink for PreviewSink {
    fn on_frame(&self, frame: SourceData) {
        let state = self.shared.state.lock().expect("lock poisoned");
        if !state.running {
            log::debug!("frame delivered after decoding stopped, dropped");
            return;
        }
        if let Some(tx) = &state.tx {
            let _ = tx.send(DecodeMessage::Frame(frame));
        }
    }

    fn on_frame_error(&self, error: ScanError) {
        let state = self.shared.state.lock().expect("lock poisoned");
        if !state.running {
            return;
        }
        log::debug!("preview frame failed: {error}");
        if let Some(tx) = &state.tx {
            let _ = tx.send(DecodeMessage::FrameFailed);
        }
    }
}

/// Owns one decode session against a camera session.
///
/// Runs at most once: build a new instance to restart decoding. Results
/// and candidate points are reported through the event channel, never
/// through return values.
pub struct DecoderThread {
    session: CameraSession,
    decoder: Option<Decoder>,
    shared: Arc<DecoderShared>,
    handle: Option<JoinHandle<()>>,
    crop: Option<Rect>,
    owner: ThreadId,
}

impl DecoderThread {
    pub fn new(session: CameraSession, decoder: Decoder, events: EventSender) -> Self {
        DecoderThread {
            session,
            decoder: Some(decoder),
            shared: Arc::new(DecoderShared {
                state: Mutex::new(DecoderState {
                    running: false,
                    tx: None,
                }),
                events,
            }),
            handle: None,
            crop: None,
            owner: thread::current().id(),
        }
    }

    /// Region to decode, in display-orientation frame coordinates. Unset
    /// means frames are still pumped but nothing is decoded.
    pub fn set_crop_rect(&mut self, crop: Option<Rect>) {
        self.crop = crop;
    }

    /// Spawns the decode thread and requests the first frame.
    pub fn start(&mut self) -> Result<(), ScanError> {
        self.assert_owner();
        let decoder = match self.decoder.take() {
            Some(decoder) => decoder,
            None => {
                log::warn!("decoder thread started twice");
                return Ok(());
            }
        };
        let (tx, rx) = unbounded();
        {
            let mut state = self.shared.state.lock().expect("lock poisoned");
            state.running = true;
            state.tx = Some(tx);
        }
        let shared = Arc::clone(&self.shared);
        let session = self.session.clone();
        let crop = self.crop;
        let spawned = thread::Builder::new()
            .name("framescan-decoder".to_string())
            .spawn(move || decode_loop(rx, decoder, shared, session, crop));
        match spawned {
            Ok(handle) => self.handle = Some(handle),
            Err(e) => {
                let mut state = self.shared.state.lock().expect("lock poisoned");
                state.running = false;
                state.tx = None;
                return Err(ScanError::CameraFatal(format!(
                    "decoder thread spawn failed: {e}"
                )));
            }
        }
        request_next_frame(&self.shared, &self.session);
        Ok(())
    }

    /// Stops decoding. Frames already in flight are dropped, not decoded.
    pub fn stop(&mut self) {
        self.assert_owner();
        self.shutdown();
    }

    fn shutdown(&mut self) {
        {
            let mut state = self.shared.state.lock().expect("lock poisoned");
            state.running = false;
            if let Some(tx) = state.tx.take() {
                let _ = tx.send(DecodeMessage::Quit);
            }
        }
        if let Some(handle) = self.handle.take() {
            let deadline = Instant::now() + STOP_TIMEOUT;
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(5));
            }
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                log::warn!("decode thread still busy after {STOP_TIMEOUT:?}, detaching");
            }
        }
    }

    fn assert_owner(&self) {
        debug_assert_eq!(
            std::thread::current().id(),
            self.owner,
            "decoder lifecycle methods must run on the owning thread"
        );
    }
}

impl Drop for DecoderThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn is_running(shared: &DecoderShared) -> bool {
    shared.state.lock().expect("lock poisoned").running
}

fn request_next_frame(shared: &Arc<DecoderShared>, session: &CameraSession) {
    if !is_running(shared) {
        return;
    }
    session.request_frame(Box::new(PreviewSink {
        shared: Arc::clone(shared),
    }));
}

fn decode_loop(
    rx: Receiver<DecodeMessage>,
    mut decoder: Decoder,
    shared: Arc<DecoderShared>,
    session: CameraSession,
    crop: Option<Rect>,
) {
    log::debug!("decode loop running");
    loop {
        match rx.recv() {
            Ok(DecodeMessage::Frame(frame)) => {
                if is_running(&shared) {
                    decode_frame(&mut decoder, frame, crop, &shared);
                    request_next_frame(&shared, &session);
                }
            }
            Ok(DecodeMessage::FrameFailed) => request_next_frame(&shared, &session),
            Ok(DecodeMessage::Quit) | Err(_) => break,
        }
    }
    log::debug!("decode loop finished");
}

fn decode_frame(
    decoder: &mut Decoder,
    mut frame: SourceData,
    crop: Option<Rect>,
    shared: &DecoderShared,
) {
    if let Some(crop) = crop {
        frame.set_crop_rect(crop);
    }
    let started = Instant::now();
    let view = match frame.luminance_view() {
        Ok(view) => view,
        Err(e) => {
            log::debug!("frame not decodable: {e}");
            None
        }
    };
    let payload = view.and_then(|view| decoder.decode(&view));
    let possible: Vec<Point> = decoder
        .possible_points()
        .into_iter()
        .map(|p| frame.translate_point(p))
        .collect();
    match payload {
        Some(payload) => {
            log::debug!("found barcode in {} ms", started.elapsed().as_millis());
            shared
                .events
                .send(ScanEvent::DecodeSucceeded(BarcodeResult::new(payload, frame)));
        }
        None => shared.events.send(ScanEvent::DecodeFailed),
    }
    shared.events.send(ScanEvent::PossiblePoints(possible));
}
