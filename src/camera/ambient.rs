//! Ambient-light driven torch control.

use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::camera::controller::CameraController;
use crate::camera::worker::CameraWorker;

/// Below this the scene is considered too dark and the torch turns on.
const TOO_DARK_LUX: f32 = 45.0;
/// Above this the scene is bright enough and the torch turns off.
const BRIGHT_ENOUGH_LUX: f32 = 450.0;
/// How often the sensor is sampled.
const POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Source of ambient light readings, in lux.
///
/// Implemented by the embedder; the crate has no portable way to read a
/// light sensor. A reading of `None` means no sample was available this
/// tick and leaves the torch untouched.
pub trait LightSensor: Send {
    fn read_lux(&mut self) -> Option<f32>;
}

/// Polls a [`LightSensor`] while the preview runs and drives the torch
/// through the camera worker.
///
/// Readings between the two thresholds change nothing, so the torch does
/// not flap when the light level sits near a boundary.
pub(crate) struct AmbientLightMonitor {
    stop: Arc<(Mutex<bool>, Condvar)>,
    handle: Option<JoinHandle<()>>,
}

impl AmbientLightMonitor {
    pub fn start(
        worker: CameraWorker,
        controller: Weak<Mutex<CameraController>>,
        sensor: Arc<Mutex<Box<dyn LightSensor>>>,
    ) -> Option<AmbientLightMonitor> {
        let stop = Arc::new((Mutex::new(false), Condvar::new()));
        let thread_stop = stop.clone();
        let spawn = std::thread::Builder::new()
            .name("framescan-lightmeter".to_string())
            .spawn(move || monitor_loop(thread_stop, worker, controller, sensor));
        match spawn {
            Ok(handle) => Some(AmbientLightMonitor {
                stop,
                handle: Some(handle),
            }),
            Err(e) => {
                log::warn!("could not start ambient light monitor: {e}");
                None
            }
        }
    }

    pub fn stop(&mut self) {
        let (lock, cvar) = &*self.stop;
        *lock.lock().expect("lock poisoned") = true;
        cvar.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for AmbientLightMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn monitor_loop(
    stop: Arc<(Mutex<bool>, Condvar)>,
    worker: CameraWorker,
    controller: Weak<Mutex<CameraController>>,
    sensor: Arc<Mutex<Box<dyn LightSensor>>>,
) {
    loop {
        if wait_for_stop(&stop, POLL_INTERVAL) {
            return;
        }
        let lux = sensor.lock().expect("lock poisoned").read_lux();
        let on = match lux.and_then(torch_for_lux) {
            Some(on) => on,
            None => continue,
        };
        let target = match controller.upgrade() {
            Some(target) => target,
            None => return,
        };
        let worker_inner = worker.clone();
        let enqueued = worker.enqueue(move || {
            CameraController::set_torch(&target, &worker_inner, on);
        });
        if let Err(e) = enqueued {
            log::debug!("skipping ambient torch update: {e}");
        }
    }
}

/// Torch state a light reading calls for, `None` inside the hysteresis band.
fn torch_for_lux(lux: f32) -> Option<bool> {
    if lux <= TOO_DARK_LUX {
        Some(true)
    } else if lux >= BRIGHT_ENOUGH_LUX {
        Some(false)
    } else {
        None
    }
}

fn wait_for_stop(stop: &Arc<(Mutex<bool>, Condvar)>, interval: Duration) -> bool {
    let (lock, cvar) = &**stop;
    let deadline = std::time::Instant::now() + interval;
    let mut stopped = lock.lock().expect("lock poisoned");
    while !*stopped {
        let now = std::time::Instant::now();
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

/// Shared ownership wrapper so a sensor survives preview restarts.
pub type SharedLightSensor = Arc<Mutex<Box<dyn LightSensor>>>;
