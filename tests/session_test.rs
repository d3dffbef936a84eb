//! Camera session lifecycle over a scripted device.
//!
//! Covers worker sharing between concurrent sessions, the two-pass
//! parameter ladder, error reporting, torch deduplication and the bounded
//! close wait. Every test runs on a private worker instance so thread
//! lifecycle stays observable.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use framescan::camera::{CameraSession, CameraSettings, CameraWorker, FrameSink, SessionState};
use framescan::events::{event_channel, EventReceiver, ScanEvent};
use framescan::frame::SourceData;
use framescan::scaling::DisplayConfiguration;
use framescan::testing::{SyntheticOpener, SyntheticScript};
use framescan::types::{Rotation, Size};
use framescan::{PreviewSurface, ScanError};

const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

fn scripted_session(
    worker: &CameraWorker,
    script: &SyntheticScript,
    settings: CameraSettings,
) -> (CameraSession, EventReceiver) {
    let (tx, rx) = event_channel();
    let session = CameraSession::with_opener(
        worker,
        settings,
        Arc::new(SyntheticOpener::new(script.clone())),
    );
    session.set_event_sender(tx);
    (session, rx)
}

/// Drives a session up to the previewing state and returns the negotiated
/// display-oriented preview size.
fn drive_to_previewing(session: &CameraSession, rx: &EventReceiver) -> Size {
    session.open().unwrap();
    session.set_display_config(DisplayConfiguration::new(
        Rotation::Deg0,
        Size::new(1080, 1920),
    ));
    session.configure().unwrap();
    let size = match rx.recv_timeout(EVENT_TIMEOUT).unwrap() {
        ScanEvent::PreviewSizeReady(size) => size,
        other => panic!("expected a preview size, got {other:?}"),
    };
    session.set_surface(PreviewSurface::Window(1));
    session.start_preview().unwrap();
    match rx.recv_timeout(EVENT_TIMEOUT).unwrap() {
        ScanEvent::PreviewStarted => {}
        other => panic!("expected preview started, got {other:?}"),
    }
    size
}

struct ChannelSink {
    tx: crossbeam_channel::Sender<Result<SourceData, ScanError>>,
}

impl FrameSink for ChannelSink {
    fn on_frame(&self, frame: SourceData) {
        let _ = self.tx.send(Ok(frame));
    }

    fn on_frame_error(&self, error: ScanError) {
        let _ = self.tx.send(Err(error));
    }
}

#[test]
fn full_lifecycle_reaches_previewing_and_closes() {
    let worker = CameraWorker::new();
    let script = SyntheticScript::new();
    let (session, rx) = scripted_session(&worker, &script, CameraSettings::default());

    assert_eq!(session.state(), SessionState::Closed);
    let size = drive_to_previewing(&session, &rx);

    // Portrait viewfinder on a sensor mounted at 90 degrees: the natural
    // 1920x1080 mode comes back rotated into display orientation.
    assert_eq!(size, Size::new(1080, 1920));
    assert_eq!(session.state(), SessionState::Previewing);
    assert_eq!(script.opens(), 1);
    assert_eq!(script.preview_starts(), 1);
    assert_eq!(script.attached_surfaces(), vec![1]);
    // The focus timer fires its first sweep right away.
    assert!(wait_until(|| script.focus_cycles() >= 1));

    session.close();
    assert!(session.wait_for_close(EVENT_TIMEOUT));
    assert!(script.was_released());
    assert_eq!(session.state(), SessionState::Closed);
    assert!(matches!(
        rx.recv_timeout(EVENT_TIMEOUT).unwrap(),
        ScanEvent::CameraClosed
    ));
    assert!(!worker.is_running());
    assert!(wait_until(|| !worker.is_thread_alive()));
}

#[test]
fn concurrent_sessions_share_one_worker_thread() {
    let worker = CameraWorker::new();
    let script = SyntheticScript::new();
    let (first, first_rx) = scripted_session(&worker, &script, CameraSettings::default());
    let (second, second_rx) = scripted_session(&worker, &script, CameraSettings::default());

    first.open().unwrap();
    second.open().unwrap();
    assert_eq!(worker.use_count(), 2);
    assert_eq!(worker.start_count(), 1);
    assert!(wait_until(|| script.opens() == 2));

    first.close();
    assert!(first.wait_for_close(EVENT_TIMEOUT));
    assert!(matches!(
        first_rx.recv_timeout(EVENT_TIMEOUT).unwrap(),
        ScanEvent::CameraClosed
    ));
    // The close task releases its reference after signalling.
    assert!(wait_until(|| worker.use_count() == 1));
    assert!(worker.is_running());

    second.close();
    assert!(second.wait_for_close(EVENT_TIMEOUT));
    assert!(matches!(
        second_rx.recv_timeout(EVENT_TIMEOUT).unwrap(),
        ScanEvent::CameraClosed
    ));
    assert!(wait_until(|| worker.use_count() == 0));
    assert!(wait_until(|| !worker.is_thread_alive()));
    // The whole overlap ran on a single spawn.
    assert_eq!(worker.start_count(), 1);
    assert_eq!(script.releases(), 2);
}

#[test]
fn rejected_desired_pass_degrades_to_safe_parameters() {
    let worker = CameraWorker::new();
    let script = SyntheticScript::new();
    script.reject_parameter_passes(1);
    let mut settings = CameraSettings::default();
    settings.set_scan_inverted(true);
    let (session, rx) = scripted_session(&worker, &script, settings);

    drive_to_previewing(&session, &rx);

    let passes = script.applied_passes();
    assert_eq!(passes.len(), 2);
    assert!(passes[0].invert_colors);
    assert!(!passes[1].invert_colors);
    assert_eq!(passes[0].preview_size, passes[1].preview_size);

    session.close();
    assert!(session.wait_for_close(EVENT_TIMEOUT));
}

#[test]
fn double_rejection_continues_on_device_defaults() {
    let worker = CameraWorker::new();
    let script = SyntheticScript::new();
    script.reject_parameter_passes(2);
    let (session, rx) = scripted_session(&worker, &script, CameraSettings::default());

    // Still negotiates a size (the requested one) and reaches previewing
    // without a camera error.
    let size = drive_to_previewing(&session, &rx);
    assert_eq!(size, Size::new(1080, 1920));
    assert_eq!(script.applied_passes().len(), 2);
    assert_eq!(session.state(), SessionState::Previewing);

    session.close();
    assert!(session.wait_for_close(EVENT_TIMEOUT));
    assert!(matches!(
        rx.recv_timeout(EVENT_TIMEOUT).unwrap(),
        ScanEvent::CameraClosed
    ));
}

#[test]
fn missing_device_surfaces_one_error_event() {
    let worker = CameraWorker::new();
    let script = SyntheticScript::new();
    let mut settings = CameraSettings::default();
    settings.set_requested_device_id(Some("does-not-exist".to_string()));
    let (session, rx) = scripted_session(&worker, &script, settings);

    session.open().unwrap();
    assert!(matches!(
        rx.recv_timeout(EVENT_TIMEOUT).unwrap(),
        ScanEvent::CameraError(ScanError::DeviceUnavailable(_))
    ));

    // Follow-up failures are suppressed; only the close notification comes
    // through.
    session.set_display_config(DisplayConfiguration::new(
        Rotation::Deg0,
        Size::new(1080, 1920),
    ));
    session.configure().unwrap();
    session.close();
    assert!(session.wait_for_close(EVENT_TIMEOUT));
    assert!(matches!(
        rx.recv_timeout(EVENT_TIMEOUT).unwrap(),
        ScanEvent::CameraClosed
    ));
    assert!(rx.try_recv().is_err());
}

#[test]
fn hung_device_release_trips_the_close_wait() {
    let worker = CameraWorker::new();
    let script = SyntheticScript::new();
    script.set_release_hang(Duration::from_millis(400));
    let (session, rx) = scripted_session(&worker, &script, CameraSettings::default());

    drive_to_previewing(&session, &rx);
    session.close();
    assert!(!session.wait_for_close(Duration::from_millis(50)));
    assert!(!script.was_released());

    // The close still completes once the device comes back.
    assert!(session.wait_for_close(EVENT_TIMEOUT));
    assert!(script.was_released());
}

#[test]
fn torch_changes_reach_the_device_once_per_transition() {
    let worker = CameraWorker::new();
    let script = SyntheticScript::new();
    let (session, rx) = scripted_session(&worker, &script, CameraSettings::default());

    drive_to_previewing(&session, &rx);
    session.set_torch(true);
    session.set_torch(true);
    session.set_torch(false);
    assert!(wait_until(|| script.torch_history() == vec![true, false]));

    session.close();
    assert!(session.wait_for_close(EVENT_TIMEOUT));
}

#[test]
fn frame_requests_only_flow_while_previewing() {
    let worker = CameraWorker::new();
    let script = SyntheticScript::new();
    let (session, rx) = scripted_session(&worker, &script, CameraSettings::default());
    let (frame_tx, frame_rx) = crossbeam_channel::unbounded();

    // Not open yet: dropped without a callback.
    session.request_frame(Box::new(ChannelSink {
        tx: frame_tx.clone(),
    }));
    assert!(frame_rx.recv_timeout(Duration::from_millis(50)).is_err());

    drive_to_previewing(&session, &rx);
    session.request_frame(Box::new(ChannelSink {
        tx: frame_tx.clone(),
    }));
    let frame = frame_rx
        .recv_timeout(EVENT_TIMEOUT)
        .unwrap()
        .expect("previewing session delivers frames");
    // Raw buffer stays in sensor orientation.
    assert_eq!(frame.data_width(), 1920);
    assert_eq!(frame.data_height(), 1080);
    assert!(frame.is_rotated());

    session.close();
    assert!(session.wait_for_close(EVENT_TIMEOUT));
}

#[test]
fn failed_grab_reports_error_then_recovers() {
    let worker = CameraWorker::new();
    let script = SyntheticScript::new();
    script.fail_grabs(1);
    let (session, rx) = scripted_session(&worker, &script, CameraSettings::default());
    let (frame_tx, frame_rx) = crossbeam_channel::unbounded();

    drive_to_previewing(&session, &rx);

    session.request_frame(Box::new(ChannelSink {
        tx: frame_tx.clone(),
    }));
    assert!(matches!(
        frame_rx.recv_timeout(EVENT_TIMEOUT).unwrap(),
        Err(ScanError::PreviewFrame(_))
    ));

    session.request_frame(Box::new(ChannelSink { tx: frame_tx }));
    assert!(frame_rx.recv_timeout(EVENT_TIMEOUT).unwrap().is_ok());
    assert_eq!(script.frames_served(), 1);

    session.close();
    assert!(session.wait_for_close(EVENT_TIMEOUT));
}

#[test]
fn reopening_after_close_spawns_a_fresh_worker_thread() {
    let worker = CameraWorker::new();
    let script = SyntheticScript::new();

    let (session, rx) = scripted_session(&worker, &script, CameraSettings::default());
    drive_to_previewing(&session, &rx);
    session.close();
    assert!(session.wait_for_close(EVENT_TIMEOUT));
    assert!(wait_until(|| !worker.is_thread_alive()));

    let (session, rx) = scripted_session(&worker, &script, CameraSettings::default());
    drive_to_previewing(&session, &rx);
    assert_eq!(worker.start_count(), 2);
    assert_eq!(script.opens(), 2);

    session.close();
    assert!(session.wait_for_close(EVENT_TIMEOUT));
}

#[test]
fn state_is_shared_across_session_clones() {
    let worker = CameraWorker::new();
    let script = SyntheticScript::new();
    let (session, rx) = scripted_session(&worker, &script, CameraSettings::default());

    let observer = session.clone();
    assert_eq!(observer.session_id(), session.session_id());
    drive_to_previewing(&session, &rx);
    assert_eq!(observer.state(), SessionState::Previewing);

    session.close();
    assert!(session.wait_for_close(EVENT_TIMEOUT));
    assert!(observer.is_camera_closed());
}

/// Notes how many torch changes the device had seen at the moment each
/// frame was grabbed. Runs on the worker thread, so the count is exact.
struct OrderSink {
    script: SyntheticScript,
    torch_sets_at_frame: Arc<Mutex<Vec<usize>>>,
    tx: crossbeam_channel::Sender<()>,
}

impl FrameSink for OrderSink {
    fn on_frame(&self, _frame: SourceData) {
        self.torch_sets_at_frame
            .lock()
            .expect("lock poisoned")
            .push(self.script.torch_history().len());
        let _ = self.tx.send(());
    }

    fn on_frame_error(&self, _error: ScanError) {
        let _ = self.tx.send(());
    }
}

#[test]
fn slow_device_keeps_the_queue_ordered() {
    let worker = CameraWorker::new();
    let script = SyntheticScript::new();
    script.set_grab_delay(Duration::from_millis(20));
    let (session, rx) = scripted_session(&worker, &script, CameraSettings::default());
    drive_to_previewing(&session, &rx);

    let torch_sets_at_frame = Arc::new(Mutex::new(Vec::new()));
    let (frame_tx, frame_rx) = crossbeam_channel::unbounded();
    for _ in 0..3 {
        session.request_frame(Box::new(OrderSink {
            script: script.clone(),
            torch_sets_at_frame: torch_sets_at_frame.clone(),
            tx: frame_tx.clone(),
        }));
    }
    // A torch toggle queued behind the grabs runs after all of them.
    session.set_torch(true);
    for _ in 0..3 {
        frame_rx.recv_timeout(EVENT_TIMEOUT).unwrap();
    }
    assert!(wait_until(|| script.torch_history() == vec![true]));
    assert_eq!(*torch_sets_at_frame.lock().unwrap(), vec![0, 0, 0]);

    session.close();
    assert!(session.wait_for_close(EVENT_TIMEOUT));
}
