//! One-way, ordered event path from the worker threads back to the owning
//! context.
//!
//! Producers never block: sends are fire-and-forget over an unbounded
//! channel, and a vanished consumer only costs a debug log line. The
//! receiving side is drained on the owning thread, normally by
//! [`crate::scanner::BarcodeScanner::pump_events`].

use crate::decoder::BarcodeResult;
use crate::errors::ScanError;
use crate::types::{Point, Size};
use crossbeam_channel::{unbounded, Receiver, Sender};

/// Lifecycle and decode events crossing back to the owning context.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// Preview resolution negotiated, in display orientation.
    PreviewSizeReady(Size),
    /// Hardware preview is running; decoding may start.
    PreviewStarted,
    /// The camera finished closing (always sent, even on failed release).
    CameraClosed,
    /// Fatal session error; sent at most once per session.
    CameraError(ScanError),
    DecodeSucceeded(BarcodeResult),
    DecodeFailed,
    /// Candidate detection points from the last attempt, for live feedback.
    PossiblePoints(Vec<Point>),
}

/// Sending half handed to the camera and decode workers.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<ScanEvent>,
}

impl EventSender {
    pub fn send(&self, event: ScanEvent) {
        if self.tx.send(event).is_err() {
            log::debug!("scan event dropped, consumer is gone");
        }
    }
}

/// Receiving half owned by the scanner / owning context.
pub type EventReceiver = Receiver<ScanEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = unbounded();
    (EventSender { tx }, rx)
}
