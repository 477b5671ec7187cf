//! Background completion jobs.
//!
//! Jobs never touch mount state. They sleep or poll, checking their
//! cancellation flag between steps, and finish by queueing a finalize
//! closure on the work serializer. Each job carries an id; finalize closures
//! only act if the state they were started for is still current.

use crate::error::{MountError, MountResult};
use crate::serializer::WorkQueue;
use crate::state::{AxisRole, MountCore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const SLEEP_STEP: Duration = Duration::from_millis(1);

/// Set-once flag shared between a moving state and its job.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` in short steps. Returns false if cancelled first.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(SLEEP_STEP.min(deadline - now));
        }
    }
}

/// An in-flight background job owned by a moving state.
///
/// Dropping the job sets its cancellation flag and detaches the thread.
#[derive(Debug)]
pub struct PendingJob {
    id: u64,
    flag: CancellationFlag,
    handle: Option<JoinHandle<()>>,
}

impl PendingJob {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cancel(&self) {
        self.flag.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.is_cancelled()
    }
}

impl Drop for PendingJob {
    fn drop(&mut self) {
        self.flag.cancel();
        self.handle.take();
    }
}

fn spawn_job<F>(id: u64, name: &str, body: F) -> MountResult<PendingJob>
where
    F: FnOnce(CancellationFlag) + Send + 'static,
{
    let flag = CancellationFlag::new();
    let job_flag = flag.clone();
    let handle = thread::Builder::new()
        .name(format!("{name}-{id}"))
        .spawn(move || body(job_flag))
        .map_err(|e| spawn_failed(name, id, e))?;

    Ok(PendingJob {
        id,
        flag,
        handle: Some(handle),
    })
}

fn spawn_failed(name: &str, id: u64, e: std::io::Error) -> MountError {
    warn!(tag = "Jobs", "failed to spawn {} job {}: {}", name, id, e);
    MountError::WorkerSpawn(e)
}

/// Wait out a pulse guide, then ask the core to finish it.
pub fn spawn_pulse_timer(
    queue: WorkQueue<MountCore>,
    axis: AxisRole,
    id: u64,
    duration: Duration,
) -> MountResult<PendingJob> {
    spawn_job(id, "pulse-guide", move |flag| {
        if !flag.sleep(duration) {
            debug!(tag = "PulseGuide", "guide job {} cancelled", id);
            return;
        }
        if let Err(e) = queue.post(move |core| core.complete_pulse_guide(axis, id)) {
            debug!(tag = "PulseGuide", "guide job {} could not finalize: {}", id, e);
        }
    })
}

/// Poll the mount's live slewing indicator until the goto ends.
pub fn spawn_slew_poller(
    queue: WorkQueue<MountCore>,
    id: u64,
    interval: Duration,
) -> MountResult<PendingJob> {
    spawn_job(id, "goto-poll", move |flag| loop {
        if flag.is_cancelled() {
            debug!(tag = "Goto", "goto job {} cancelled", id);
            return;
        }
        match queue.submit(move |core| core.poll_slew(id)) {
            Ok(Some(true)) => {
                if !flag.sleep(interval) {
                    debug!(tag = "Goto", "goto job {} cancelled", id);
                    return;
                }
            }
            Ok(Some(false)) => {
                let _ = queue.post(move |core| core.complete_slew(id));
                return;
            }
            Ok(None) => return,
            Err(MountError::WorkerStopped) => return,
            Err(e) => {
                warn!(tag = "Goto", "slew status query failed, aborting goto: {}", e);
                let _ = queue.post(move |core| core.abort_slew_job(id));
                return;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_is_shared_and_monotonic() {
        let flag = CancellationFlag::new();
        let other = flag.clone();
        assert!(!other.is_cancelled());
        flag.cancel();
        flag.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn test_sleep_runs_to_completion() {
        let flag = CancellationFlag::new();
        let start = Instant::now();
        assert!(flag.sleep(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_sleep_stops_early_when_cancelled() {
        let flag = CancellationFlag::new();
        let canceller = flag.clone();
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            canceller.cancel();
        });
        let start = Instant::now();
        assert!(!flag.sleep(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(5));
        t.join().unwrap();
    }

    #[test]
    fn test_dropping_job_sets_flag() {
        let observed = CancellationFlag::new();
        let job = spawn_job(7, "test", {
            let observed = observed.clone();
            move |flag| {
                while !flag.is_cancelled() {
                    thread::sleep(Duration::from_millis(1));
                }
                observed.cancel();
            }
        })
        .unwrap();
        assert_eq!(job.id(), 7);
        drop(job);

        let deadline = Instant::now() + Duration::from_secs(5);
        while !observed.is_cancelled() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(observed.is_cancelled());
    }

    #[test]
    fn test_spawn_failure_maps_to_worker_spawn() {
        let e = std::io::Error::new(std::io::ErrorKind::OutOfMemory, "no threads left");
        let err = spawn_failed("pulse-guide", 3, e);
        assert!(matches!(err, MountError::WorkerSpawn(_)));
        assert!(!err.is_transient());
    }
}
