//! Periodic focus re-triggering for focus modes that need it.

use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::camera::controller::CameraController;
use crate::camera::settings::FocusMode;
use crate::camera::worker::CameraWorker;

/// Delay between focus sweeps.
const FOCUS_INTERVAL: Duration = Duration::from_millis(2000);

/// Re-triggers a focus sweep every two seconds while the preview runs.
///
/// Only the auto and macro focus modes need this; continuous focus is
/// handled by the device and the other modes never refocus. The timer runs
/// on its own thread but the actual focus call is enqueued on the camera
/// worker, keeping all device access serialized.
pub(crate) struct AutoFocusManager {
    stop: Arc<(Mutex<bool>, Condvar)>,
    handle: Option<JoinHandle<()>>,
}

impl AutoFocusManager {
    /// Starts the focus timer, or returns `None` when the focus mode does
    /// not use periodic sweeps.
    pub fn start(
        worker: CameraWorker,
        controller: Weak<Mutex<CameraController>>,
        focus_mode: Option<FocusMode>,
    ) -> Option<AutoFocusManager> {
        if !matches!(focus_mode, Some(FocusMode::Auto) | Some(FocusMode::Macro)) {
            return None;
        }
        let stop = Arc::new((Mutex::new(false), Condvar::new()));
        let thread_stop = stop.clone();
        let spawn = std::thread::Builder::new()
            .name("framescan-autofocus".to_string())
            .spawn(move || focus_loop(thread_stop, worker, controller));
        match spawn {
            Ok(handle) => Some(AutoFocusManager {
                stop,
                handle: Some(handle),
            }),
            Err(e) => {
                log::warn!("could not start auto-focus timer: {e}");
                None
            }
        }
    }

    /// Stops the timer and waits for its thread to exit.
    pub fn stop(&mut self) {
        let (lock, cvar) = &*self.stop;
        *lock.lock().expect("lock poisoned") = true;
        cvar.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for AutoFocusManager {
    fn drop(&mut self) {
        self.stop();
    }
}

fn focus_loop(
    stop: Arc<(Mutex<bool>, Condvar)>,
    worker: CameraWorker,
    controller: Weak<Mutex<CameraController>>,
) {
    loop {
        let target = match controller.upgrade() {
            Some(target) => target,
            None => return,
        };
        let enqueued = worker.enqueue(move || {
            let mut controller = target.lock().expect("lock poisoned");
            controller.trigger_focus_cycle();
        });
        if let Err(e) = enqueued {
            log::debug!("skipping focus sweep: {e}");
        }
        if wait_for_stop(&stop, FOCUS_INTERVAL) {
            return;
        }
    }
}

/// Sleeps for `interval`, returning early with `true` once stop is flagged.
fn wait_for_stop(stop: &Arc<(Mutex<bool>, Condvar)>, interval: Duration) -> bool {
    let (lock, cvar) = &**stop;
    let deadline = Instant::now() + interval;
    let mut stopped = lock.lock().expect("lock poisoned");
    while !*stopped {
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        let (guard, _) = cvar
            .wait_timeout(stopped, deadline - now)
            .expect("lock poisoned");
        stopped = guard;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_auto_and_macro_get_a_timer() {
        let worker = CameraWorker::new();
        assert!(AutoFocusManager::start(worker.clone(), Weak::new(), None).is_none());
        assert!(
            AutoFocusManager::start(worker.clone(), Weak::new(), Some(FocusMode::Continuous))
                .is_none()
        );
        assert!(
            AutoFocusManager::start(worker.clone(), Weak::new(), Some(FocusMode::Infinity))
                .is_none()
        );

        let mut auto = AutoFocusManager::start(worker.clone(), Weak::new(), Some(FocusMode::Auto))
            .expect("auto mode uses the timer");
        auto.stop();

        let mut macro_mode = AutoFocusManager::start(worker, Weak::new(), Some(FocusMode::Macro))
            .expect("macro mode uses the timer");
        macro_mode.stop();
    }

    #[test]
    fn stop_is_idempotent_and_fast() {
        let worker = CameraWorker::new();
        let mut manager = AutoFocusManager::start(worker, Weak::new(), Some(FocusMode::Auto))
            .expect("auto mode uses the timer");
        let start = Instant::now();
        manager.stop();
        manager.stop();
        assert!(start.elapsed() < FOCUS_INTERVAL);
    }
}
