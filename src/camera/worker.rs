//! The shared camera worker thread.
//!
//! All device access in this crate is funneled through a single background
//! thread so that open, configure, frame grabs and close never race each
//! other. The thread is reference counted: it spins up when the first
//! session registers and winds down, after draining its queue, when the
//! last one leaves.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};
use lazy_static::lazy_static;

use crate::errors::ScanError;

type Task = Box<dyn FnOnce() + Send + 'static>;

lazy_static! {
    static ref SHARED_WORKER: CameraWorker = CameraWorker::new();
}

struct WorkerState {
    /// Number of registered consumers. The thread runs while this is > 0.
    use_count: usize,
    /// Send half of the task queue. Dropping it lets the thread drain
    /// whatever is queued and then exit.
    tx: Option<Sender<Task>>,
    /// Kept after shutdown so liveness stays observable until the next spawn.
    handle: Option<JoinHandle<()>>,
    /// Times a thread has been spawned over this worker's lifetime.
    starts: u64,
}

/// Cloneable handle to a reference-counted task thread.
///
/// Every clone refers to the same thread and the same use count. Production
/// code normally goes through [`CameraWorker::shared`]; tests construct
/// private instances with [`CameraWorker::new`] so they can observe thread
/// lifecycle without interference.
#[derive(Clone)]
pub struct CameraWorker {
    state: Arc<Mutex<WorkerState>>,
}

impl CameraWorker {
    /// A worker with no consumers and no thread.
    pub fn new() -> Self {
        CameraWorker {
            state: Arc::new(Mutex::new(WorkerState {
                use_count: 0,
                tx: None,
                handle: None,
                starts: 0,
            })),
        }
    }

    /// The process-wide worker used by default.
    pub fn shared() -> Self {
        SHARED_WORKER.clone()
    }

    /// Registers a consumer, spawning the thread if none is live.
    pub fn acquire(&self) -> Result<(), ScanError> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.use_count += 1;
        ensure_running(&mut state)
    }

    /// Registers a consumer and queues its first task in one step.
    pub fn acquire_and_enqueue(
        &self,
        task: impl FnOnce() + Send + 'static,
    ) -> Result<(), ScanError> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.use_count += 1;
        ensure_running(&mut state)?;
        send_task(&state, Box::new(task))
    }

    /// Queues a task for the worker thread. Tasks run in FIFO order.
    ///
    /// Fails with [`ScanError::WorkerNotRunning`] when no consumer is
    /// registered.
    pub fn enqueue(&self, task: impl FnOnce() + Send + 'static) -> Result<(), ScanError> {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.tx.is_none() {
            if state.use_count == 0 {
                return Err(ScanError::WorkerNotRunning(
                    "no camera session holds the worker".to_string(),
                ));
            }
            ensure_running(&mut state)?;
        }
        send_task(&state, Box::new(task))
    }

    /// Deregisters a consumer. When the count reaches zero the queue is
    /// closed; the thread finishes whatever is already queued and exits.
    ///
    /// Callable from the worker thread itself, which is how a session's
    /// close task hands the thread back as its final act.
    pub fn release(&self) {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.use_count == 0 {
            log::warn!("camera worker released more times than acquired");
            return;
        }
        state.use_count -= 1;
        if state.use_count == 0 {
            log::debug!("last camera worker consumer left, draining queue");
            state.tx = None;
        }
    }

    /// True while the task queue accepts work.
    pub fn is_running(&self) -> bool {
        self.state.lock().expect("lock poisoned").tx.is_some()
    }

    /// True while a worker thread exists and has not yet exited. Stays true
    /// briefly after [`CameraWorker::release`] while the queue drains.
    pub fn is_thread_alive(&self) -> bool {
        let state = self.state.lock().expect("lock poisoned");
        state.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// How many times a thread has been spawned for this worker.
    pub fn start_count(&self) -> u64 {
        self.state.lock().expect("lock poisoned").starts
    }

    pub fn use_count(&self) -> usize {
        self.state.lock().expect("lock poisoned").use_count
    }
}

impl Default for CameraWorker {
    fn default() -> Self {
        CameraWorker::new()
    }
}

fn ensure_running(state: &mut WorkerState) -> Result<(), ScanError> {
    if state.tx.is_some() {
        return Ok(());
    }
    if let Some(old) = state.handle.take() {
        if old.is_finished() {
            let _ = old.join();
        }
        // A still-draining predecessor is left to finish on its own.
    }
    let (tx, rx) = unbounded::<Task>();
    let handle = std::thread::Builder::new()
        .name("framescan-camera".to_string())
        .spawn(move || run_loop(rx))
        .map_err(|e| ScanError::CameraFatal(format!("camera worker spawn failed: {e}")))?;
    state.tx = Some(tx);
    state.handle = Some(handle);
    state.starts += 1;
    log::debug!("camera worker thread started (start #{})", state.starts);
    Ok(())
}

fn send_task(state: &WorkerState, task: Task) -> Result<(), ScanError> {
    match &state.tx {
        Some(tx) => tx.send(task).map_err(|_| {
            ScanError::WorkerNotRunning("camera worker queue is closed".to_string())
        }),
        None => Err(ScanError::WorkerNotRunning(
            "camera worker has no thread".to_string(),
        )),
    }
}

fn run_loop(rx: Receiver<Task>) {
    while let Ok(task) = rx.recv() {
        task();
    }
    log::debug!("camera worker thread exiting");
}
