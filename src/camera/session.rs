//! One camera use, from open to close.
//!
//! A session is a cloneable handle. The owning thread drives the lifecycle
//! (open, configure, start preview, close); each call turns into a task on
//! the shared camera worker, and outcomes come back asynchronously on the
//! session's event channel. Frame requests are the one cross-thread entry
//! point, used by the decode worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::ThreadId;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::camera::ambient::SharedLightSensor;
use crate::camera::controller::CameraController;
use crate::camera::nokhwa_source::NokhwaOpener;
use crate::camera::settings::CameraSettings;
use crate::camera::source::SourceOpener;
use crate::camera::surface::PreviewSurface;
use crate::camera::worker::CameraWorker;
use crate::errors::ScanError;
use crate::events::{EventSender, ScanEvent};
use crate::frame::SourceData;
use crate::scaling::DisplayConfiguration;

/// Where a session is in its lifecycle.
///
/// States advance as the corresponding worker tasks complete; right after
/// [`CameraSession::open`] returns, the state is `Open` even though the
/// device may still be opening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Open,
    Configured,
    Previewing,
}

/// Receives the outcome of one frame request.
///
/// Implementations must not block: callbacks run on the camera worker
/// thread, and a slow sink stalls every camera operation behind it.
pub trait FrameSink: Send {
    fn on_frame(&self, frame: SourceData);
    fn on_frame_error(&self, error: ScanError);
}

struct SessionShared {
    id: Uuid,
    controller: Arc<Mutex<CameraController>>,
    /// Set on the owner thread; read by worker tasks and frame requesters.
    open: AtomicBool,
    /// True once the close task has run (or close was a no-op).
    closed: Mutex<bool>,
    closed_cv: Condvar,
    error_sent: AtomicBool,
    events: Mutex<Option<EventSender>>,
}

/// Handle to one camera lifecycle on the shared worker.
#[derive(Clone)]
pub struct CameraSession {
    shared: Arc<SessionShared>,
    worker: CameraWorker,
    owner: ThreadId,
}

impl CameraSession {
    /// A session over the default device backend.
    pub fn new(worker: &CameraWorker, settings: CameraSettings) -> Self {
        CameraSession::with_opener(worker, settings, Arc::new(NokhwaOpener::new()))
    }

    /// A session over a caller-supplied device backend.
    pub fn with_opener(
        worker: &CameraWorker,
        settings: CameraSettings,
        opener: Arc<dyn SourceOpener>,
    ) -> Self {
        let id = Uuid::new_v4();
        log::debug!("camera session {id} created");
        CameraSession {
            shared: Arc::new(SessionShared {
                id,
                controller: Arc::new(Mutex::new(CameraController::new(settings, opener))),
                open: AtomicBool::new(false),
                closed: Mutex::new(false),
                closed_cv: Condvar::new(),
                error_sent: AtomicBool::new(false),
                events: Mutex::new(None),
            }),
            worker: worker.clone(),
            owner: std::thread::current().id(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.shared.id
    }

    /// Installs the sender session outcomes are posted to. Set this before
    /// [`CameraSession::open`] or early events are dropped.
    pub fn set_event_sender(&self, sender: EventSender) {
        *self.shared.events.lock().expect("lock poisoned") = Some(sender);
    }

    /// Must be set before [`CameraSession::configure`].
    pub fn set_display_config(&self, config: DisplayConfiguration) {
        self.shared
            .controller
            .lock()
            .expect("lock poisoned")
            .set_display_config(config);
    }

    /// Must be set before [`CameraSession::start_preview`].
    pub fn set_surface(&self, surface: PreviewSurface) {
        self.shared
            .controller
            .lock()
            .expect("lock poisoned")
            .set_surface(surface);
    }

    /// Installs the ambient light source used when auto-torch is enabled.
    pub fn set_light_sensor(&self, sensor: SharedLightSensor) {
        self.shared
            .controller
            .lock()
            .expect("lock poisoned")
            .set_light_sensor(sensor);
    }

    pub fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::SeqCst)
    }

    /// True once the background close has finished.
    pub fn is_camera_closed(&self) -> bool {
        *self.shared.closed.lock().expect("lock poisoned")
    }

    pub fn state(&self) -> SessionState {
        if !self.is_open() {
            return SessionState::Closed;
        }
        let controller = self.shared.controller.lock().expect("lock poisoned");
        if controller.is_previewing() {
            SessionState::Previewing
        } else if controller.is_configured() {
            SessionState::Configured
        } else {
            SessionState::Open
        }
    }

    /// Registers with the worker and queues the device open.
    ///
    /// Open failures surface asynchronously as a camera-error event; the
    /// returned error only covers failure to reach the worker at all.
    pub fn open(&self) -> Result<(), ScanError> {
        self.assert_owner();
        if self.shared.open.swap(true, Ordering::SeqCst) {
            log::warn!("session {} opened twice", self.shared.id);
            return Ok(());
        }
        *self.shared.closed.lock().expect("lock poisoned") = false;
        let shared = self.shared.clone();
        self.worker.acquire_and_enqueue(move || {
            let result = shared.controller.lock().expect("lock poisoned").open();
            if let Err(e) = result {
                notify_error(&shared, e);
            }
        })
    }

    /// Queues preview negotiation. Success posts a preview-size event.
    pub fn configure(&self) -> Result<(), ScanError> {
        self.assert_owner();
        if !self.is_open() {
            return Err(ScanError::InvalidArgument(
                "session is not open".to_string(),
            ));
        }
        let shared = self.shared.clone();
        self.worker.enqueue(move || {
            let result = shared.controller.lock().expect("lock poisoned").configure();
            match result {
                Ok(size) => send_event(&shared, ScanEvent::PreviewSizeReady(size)),
                Err(e) => notify_error(&shared, e),
            }
        })
    }

    /// Queues the preview start. Success posts a preview-started event.
    pub fn start_preview(&self) -> Result<(), ScanError> {
        self.assert_owner();
        if !self.is_open() {
            return Err(ScanError::InvalidArgument(
                "session is not open".to_string(),
            ));
        }
        let shared = self.shared.clone();
        let worker = self.worker.clone();
        self.worker.enqueue(move || {
            match CameraController::start_preview(&shared.controller, &worker) {
                Ok(()) => send_event(&shared, ScanEvent::PreviewStarted),
                Err(e) => notify_error(&shared, e),
            }
        })
    }

    /// Queues a torch change. Silently dropped when the session is closed.
    pub fn set_torch(&self, on: bool) {
        self.assert_owner();
        if !self.is_open() {
            log::debug!("torch change on closed session ignored");
            return;
        }
        let shared = self.shared.clone();
        let worker = self.worker.clone();
        let enqueued = self.worker.enqueue(move || {
            CameraController::set_torch(&shared.controller, &worker, on);
        });
        if let Err(e) = enqueued {
            log::debug!("torch change dropped: {e}");
        }
    }

    /// Grabs one preview frame on the worker and hands it to `sink`.
    ///
    /// Callable from any thread; the decode worker calls it between frames.
    /// When the session is closed or the preview is not running, the
    /// request is dropped without any callback, leaving the requester
    /// parked until its own shutdown wakes it.
    pub fn request_frame(&self, sink: Box<dyn FrameSink>) {
        if !self.is_open() {
            log::debug!("frame request on closed session dropped");
            return;
        }
        let shared = self.shared.clone();
        let enqueued = self.worker.enqueue(move || {
            let grabbed = {
                let mut controller = shared.controller.lock().expect("lock poisoned");
                if controller.is_previewing() {
                    Some(controller.grab_source_data())
                } else {
                    log::debug!("frame request while preview inactive, dropping");
                    None
                }
            };
            match grabbed {
                Some(Ok(frame)) => sink.on_frame(frame),
                Some(Err(e)) => {
                    log::debug!("preview frame failed: {e}");
                    sink.on_frame_error(e);
                }
                None => {}
            }
        });
        if let Err(e) = enqueued {
            log::debug!("frame request dropped: {e}");
        }
    }

    /// Closes the session. The device teardown runs on the worker; when it
    /// finishes, a camera-closed event is posted and the worker reference
    /// is released.
    pub fn close(&self) {
        self.assert_owner();
        if self.shared.open.swap(false, Ordering::SeqCst) {
            let shared = self.shared.clone();
            let worker = self.worker.clone();
            let enqueued = self.worker.enqueue(move || {
                shared.controller.lock().expect("lock poisoned").close();
                mark_closed(&shared);
                worker.release();
            });
            if let Err(e) = enqueued {
                log::warn!("close could not reach the camera worker: {e}");
                mark_closed(&self.shared);
                self.worker.release();
            }
        } else {
            // Never opened (or already closing): nothing holds the device.
            *self.shared.closed.lock().expect("lock poisoned") = true;
            self.shared.closed_cv.notify_all();
        }
    }

    /// Blocks until the background close finishes, up to `timeout`.
    /// Returns false if the deadline passed first.
    pub fn wait_for_close(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut closed = self.shared.closed.lock().expect("lock poisoned");
        while !*closed {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .shared
                .closed_cv
                .wait_timeout(closed, deadline - now)
                .expect("lock poisoned");
            closed = guard;
        }
        true
    }

    fn assert_owner(&self) {
        debug_assert_eq!(
            std::thread::current().id(),
            self.owner,
            "session lifecycle methods must run on the owning thread"
        );
    }
}

fn mark_closed(shared: &Arc<SessionShared>) {
    *shared.closed.lock().expect("lock poisoned") = true;
    shared.closed_cv.notify_all();
    send_event(shared, ScanEvent::CameraClosed);
    log::debug!("camera session {} closed", shared.id);
}

/// Posts a camera error once per session; later errors are only logged.
fn notify_error(shared: &Arc<SessionShared>, error: ScanError) {
    if shared.error_sent.swap(true, Ordering::SeqCst) {
        log::debug!("suppressing repeat camera error: {error}");
        return;
    }
    log::error!("camera session {} failed: {error}", shared.id);
    send_event(shared, ScanEvent::CameraError(error));
}

fn send_event(shared: &Arc<SessionShared>, event: ScanEvent) {
    if let Some(events) = shared.events.lock().expect("lock poisoned").as_ref() {
        events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_is_closed_and_not_open() {
        let worker = CameraWorker::new();
        let session = CameraSession::new(&worker, CameraSettings::default());
        assert_eq!(session.state(), SessionState::Closed);
        assert!(!session.is_open());
        assert!(!session.is_camera_closed());
    }

    #[test]
    fn close_without_open_completes_immediately() {
        let worker = CameraWorker::new();
        let session = CameraSession::new(&worker, CameraSettings::default());
        session.close();
        assert!(session.is_camera_closed());
        assert!(session.wait_for_close(Duration::from_millis(10)));
        assert!(!worker.is_running());
    }

    #[test]
    fn configure_before_open_is_rejected() {
        let worker = CameraWorker::new();
        let session = CameraSession::new(&worker, CameraSettings::default());
        assert!(matches!(
            session.configure(),
            Err(ScanError::InvalidArgument(_))
        ));
        assert!(matches!(
            session.start_preview(),
            Err(ScanError::InvalidArgument(_))
        ));
    }
}
