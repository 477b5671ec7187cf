//! Single-consumer work queue.
//!
//! One dedicated thread owns the work target (the mount core) and runs queued
//! closures against it strictly in submission order. Callers on any thread
//! either block on a result (`submit`) or fire and forget (`post`). A closure
//! that fails or panics is logged and the target is asked to recover before
//! the next item runs.

use crate::error::{MountError, MountResult};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

/// State owned by the worker thread.
pub trait WorkTarget: Send + 'static {
    /// Called after a work item failed, before the next one runs.
    fn recover(&mut self);
}

type Job<T> = Box<dyn FnOnce(&mut T) -> Option<String> + Send + 'static>;
type Reply<R> = thread::Result<MountResult<R>>;

enum Message<T> {
    Run(Job<T>),
    Shutdown,
}

/// Cloneable handle for queueing work from any thread.
pub struct WorkQueue<T> {
    sender: mpsc::Sender<Message<T>>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T> std::fmt::Debug for WorkQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue").finish_non_exhaustive()
    }
}

impl<T: WorkTarget> WorkQueue<T> {
    /// Run `work` on the worker and wait for its result. A panic inside
    /// `work` is resumed on the calling thread.
    pub fn submit<R, F>(&self, work: F) -> MountResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut T) -> MountResult<R> + Send + 'static,
    {
        let (reply_tx, reply_rx) = mpsc::sync_channel::<Reply<R>>(1);
        let job: Job<T> = Box::new(move |target: &mut T| {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(target)));
            let failure = failure_reason(&outcome);
            let _ = reply_tx.send(outcome);
            failure
        });
        self.sender
            .send(Message::Run(job))
            .map_err(|_| MountError::WorkerStopped)?;

        match reply_rx.recv() {
            Ok(Ok(result)) => result,
            Ok(Err(payload)) => panic::resume_unwind(payload),
            Err(_) => Err(MountError::WorkerStopped),
        }
    }

    /// Queue `work` without waiting. Failures are only logged.
    pub fn post<F>(&self, work: F) -> MountResult<()>
    where
        F: FnOnce(&mut T) -> MountResult<()> + Send + 'static,
    {
        let job: Job<T> = Box::new(move |target: &mut T| {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(target)));
            failure_reason(&outcome)
        });
        self.sender
            .send(Message::Run(job))
            .map_err(|_| MountError::WorkerStopped)
    }
}

fn failure_reason<R>(outcome: &Reply<R>) -> Option<String> {
    match outcome {
        Ok(Ok(_)) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(payload) => Some(format!("work item panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

/// Owns the worker thread. Dropping it stops the worker after the items
/// already queued have run.
pub struct WorkSerializer<T> {
    queue: WorkQueue<T>,
    worker: Option<JoinHandle<()>>,
}

impl<T: WorkTarget> WorkSerializer<T> {
    /// Start the worker. `build` receives a queue handle so the target can
    /// hand it to background jobs.
    pub fn spawn<B>(name: &str, build: B) -> MountResult<Self>
    where
        B: FnOnce(WorkQueue<T>) -> T,
    {
        let (sender, receiver) = mpsc::channel::<Message<T>>();
        let queue = WorkQueue { sender };
        let mut target = build(queue.clone());

        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!(tag = "WorkSerializer", "worker started");
                while let Ok(message) = receiver.recv() {
                    match message {
                        Message::Run(job) => {
                            if let Some(reason) = job(&mut target) {
                                error!(tag = "WorkSerializer", "work item failed: {}", reason);
                                target.recover();
                            }
                        }
                        Message::Shutdown => break,
                    }
                }
                debug!(tag = "WorkSerializer", "worker stopped");
            })
            .map_err(MountError::WorkerSpawn)?;

        Ok(Self {
            queue,
            worker: Some(worker),
        })
    }

    pub fn queue(&self) -> &WorkQueue<T> {
        &self.queue
    }

    pub fn submit<R, F>(&self, work: F) -> MountResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut T) -> MountResult<R> + Send + 'static,
    {
        self.queue.submit(work)
    }

    pub fn post<F>(&self, work: F) -> MountResult<()>
    where
        F: FnOnce(&mut T) -> MountResult<()> + Send + 'static,
    {
        self.queue.post(work)
    }
}

impl<T> Drop for WorkSerializer<T> {
    fn drop(&mut self) {
        let _ = self.queue.sender.send(Message::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.thread().id() != thread::current().id() {
                let _ = worker.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        log: Vec<u32>,
        recoveries: usize,
    }

    impl WorkTarget for Recorder {
        fn recover(&mut self) {
            self.recoveries += 1;
        }
    }

    fn serializer() -> WorkSerializer<Recorder> {
        WorkSerializer::spawn("test-worker", |_| Recorder::default()).unwrap()
    }

    #[test]
    fn test_submit_returns_result() {
        let serializer = serializer();
        let value = serializer.submit(|r| {
            r.log.push(7);
            Ok(r.log.len())
        });
        assert_eq!(value.unwrap(), 1);
    }

    #[test]
    fn test_items_run_in_submission_order() {
        let serializer = serializer();
        for i in 0..50 {
            serializer
                .post(move |r| {
                    r.log.push(i);
                    Ok(())
                })
                .unwrap();
        }
        let log = serializer.submit(|r| Ok(r.log.clone())).unwrap();
        assert_eq!(log, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_concurrent_submitters_never_interleave() {
        let serializer = Arc::new(serializer());
        let mut handles = Vec::new();
        for t in 0..8u32 {
            let queue = serializer.queue().clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..25 {
                    queue
                        .submit(move |r| {
                            // A torn pair would show up as two different values
                            // adjacent in the log.
                            r.log.push(t);
                            std::thread::sleep(Duration::from_micros(50));
                            r.log.push(t);
                            Ok(())
                        })
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        let log = serializer.submit(|r| Ok(r.log.clone())).unwrap();
        assert_eq!(log.len(), 8 * 25 * 2);
        for pair in log.chunks(2) {
            assert_eq!(pair[0], pair[1]);
        }
    }

    #[test]
    fn test_failure_triggers_recovery_and_is_returned() {
        let serializer = serializer();
        let result: MountResult<()> =
            serializer.submit(|_| Err(MountError::protocol("garbled reply")));
        assert!(matches!(result, Err(MountError::ProtocolFault(_))));

        let recoveries = serializer.submit(|r| Ok(r.recoveries)).unwrap();
        assert_eq!(recoveries, 1);
    }

    #[test]
    fn test_posted_failure_triggers_recovery() {
        let serializer = serializer();
        serializer
            .post(|_| Err(MountError::protocol("garbled reply")))
            .unwrap();
        let recoveries = serializer.submit(|r| Ok(r.recoveries)).unwrap();
        assert_eq!(recoveries, 1);
    }

    #[test]
    fn test_panic_is_rethrown_and_worker_survives() {
        let serializer = serializer();
        let queue = serializer.queue().clone();
        let caught = std::thread::spawn(move || {
            queue.submit::<(), _>(|_| panic!("boom"))
        })
        .join();
        assert!(caught.is_err());

        let recoveries = serializer.submit(|r| Ok(r.recoveries)).unwrap();
        assert_eq!(recoveries, 1);
    }

    #[test]
    fn test_queue_reports_stopped_worker() {
        let serializer = serializer();
        let queue = serializer.queue().clone();
        drop(serializer);

        let result = queue.submit(|_| Ok(()));
        assert!(matches!(result, Err(MountError::WorkerStopped)));
    }
}
