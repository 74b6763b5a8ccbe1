// Background task queue
// Item actions and submitted text run here instead of on the UI thread

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, warn};

type Job = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("task queue is full")]
    QueueFull,
    #[error("task queue is closed")]
    Closed,
}

/// A fixed pool of workers fed by a bounded channel. Failing or panicking
/// jobs are logged and never take a worker down.
pub struct TaskQueue {
    sender: Mutex<Option<SyncSender<(String, Job)>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    pending: Arc<AtomicUsize>,
}

impl TaskQueue {
    pub fn new(workers: usize, capacity: usize) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::sync_channel::<(String, Job)>(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let pending = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for n in 0..workers.max(1) {
            let receiver = receiver.clone();
            let pending = pending.clone();
            let handle = thread::Builder::new()
                .name(format!("task-{n}"))
                .spawn(move || worker_loop(&receiver, &pending))?;
            handles.push(handle);
        }
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(handles),
            pending,
        })
    }

    /// Queues a job without blocking.
    pub fn submit<F>(&self, name: &str, job: F) -> Result<(), TaskError>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let sender = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        let sender = sender.as_ref().ok_or(TaskError::Closed)?;
        self.pending.fetch_add(1, Ordering::SeqCst);
        match sender.try_send((name.to_string(), Box::new(job))) {
            Ok(()) => {
                debug!("Queued task {}", name);
                Ok(())
            }
            Err(e) => {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                match e {
                    TrySendError::Full(_) => Err(TaskError::QueueFull),
                    TrySendError::Disconnected(_) => Err(TaskError::Closed),
                }
            }
        }
    }

    /// Jobs queued or running
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Stops accepting jobs, lets queued ones finish and joins the workers.
    pub fn shutdown(&self) {
        self.sender.lock().unwrap_or_else(|e| e.into_inner()).take();
        let handles: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for handle in handles {
            if handle.join().is_err() {
                warn!("Task worker exited abnormally");
            }
        }
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(receiver: &Mutex<Receiver<(String, Job)>>, pending: &AtomicUsize) {
    loop {
        let next = receiver.lock().unwrap_or_else(|e| e.into_inner()).recv();
        let Ok((name, job)) = next else {
            return;
        };
        match panic::catch_unwind(AssertUnwindSafe(job)) {
            Ok(Ok(())) => debug!("Task {} done", name),
            Ok(Err(e)) => warn!("Task {} failed: {:#}", name, e),
            Err(_) => error!("Task {} panicked", name),
        }
        pending.fetch_sub(1, Ordering::SeqCst);
    }
}
