// Delay scheduler
//
// Every automation step is a job submitted here. Two implementations:
// - TokioScheduler: a single current-thread tokio runtime on a dedicated
//   worker thread, distinct from the host's main thread
// - ManualScheduler: a virtual clock advanced explicitly, for deterministic
//   tests and replays
//
// Jobs never touch game state themselves; they re-enter the host's main
// thread through `MainThread::execute`.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

/// A one-shot job.
pub type Job = Box<dyn FnOnce() + Send>;

/// A job fired repeatedly at a fixed period.
pub type RepeatingJob = Arc<dyn Fn() + Send + Sync>;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Failed to build scheduler runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("Failed to spawn scheduler thread: {0}")]
    Thread(#[source] std::io::Error),
}

#[derive(Debug, Default)]
struct HandleState {
    cancelled: AtomicBool,
    finished: AtomicBool,
}

/// Cancellable handle to a scheduled job.
///
/// Cancelling prevents future firings. A firing that is already running is
/// not interrupted.
#[derive(Debug, Clone, Default)]
pub struct TaskHandle {
    state: Arc<HandleState>,
    abort: Option<AbortHandle>,
}

impl TaskHandle {
    fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// True once a one-shot job has run. Repeating jobs never finish.
    pub fn is_finished(&self) -> bool {
        self.state.finished.load(Ordering::SeqCst)
    }

    /// True while the job may still fire.
    pub fn is_pending(&self) -> bool {
        !self.is_cancelled() && !self.is_finished()
    }

    fn mark_finished(&self) {
        self.state.finished.store(true, Ordering::SeqCst);
    }
}

/// Time-ordered job queue.
pub trait Scheduler: Send + Sync {
    /// Run `job` once, no earlier than `delay` from now.
    fn after(&self, delay: Duration, job: Job) -> TaskHandle;

    /// Run `job` immediately and then every `period` until cancelled.
    fn every(&self, period: Duration, job: RepeatingJob) -> TaskHandle;

    fn cancel(&self, handle: &TaskHandle) {
        handle.cancel();
    }
}

/// Scheduler backed by a dedicated worker thread.
pub struct TokioScheduler {
    handle: tokio::runtime::Handle,
    shutdown_tx: Option<oneshot::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl TokioScheduler {
    /// Start the worker thread.
    pub fn new(thread_name: &str) -> Result<Self, SchedulerError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(SchedulerError::Runtime)?;
        let handle = runtime.handle().clone();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let worker = std::thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || {
                tracing::debug!("Scheduler worker started");
                runtime.block_on(async {
                    let _ = shutdown_rx.await;
                });
                tracing::debug!("Scheduler worker stopped");
            })
            .map_err(SchedulerError::Thread)?;

        Ok(Self {
            handle,
            shutdown_tx: Some(shutdown_tx),
            worker: Some(worker),
        })
    }
}

impl Scheduler for TokioScheduler {
    fn after(&self, delay: Duration, job: Job) -> TaskHandle {
        let mut task = TaskHandle::new();
        let state = task.clone();
        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if !state.is_cancelled() {
                job();
            }
            state.mark_finished();
        });
        task.abort = Some(join.abort_handle());
        task
    }

    fn every(&self, period: Duration, job: RepeatingJob) -> TaskHandle {
        let mut task = TaskHandle::new();
        let state = task.clone();
        let join = self.handle.spawn(async move {
            // The first tick completes immediately; the default burst
            // behaviour keeps a fixed rate.
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                if state.is_cancelled() {
                    break;
                }
                job();
            }
        });
        task.abort = Some(join.abort_handle());
        task
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(worker) = self.worker.take() {
            // The last owner may be a job running on the worker itself. That
            // thread exits on its own once the runtime returns.
            if worker.thread().id() == std::thread::current().id() {
                return;
            }
            let _ = worker.join();
        }
    }
}

enum ManualJob {
    Once(Job),
    Repeating { job: RepeatingJob, period: Duration },
}

struct ManualEntry {
    due: Duration,
    seq: u64,
    handle: TaskHandle,
    job: ManualJob,
}

#[derive(Default)]
struct ManualQueue {
    now: Duration,
    seq: u64,
    entries: Vec<ManualEntry>,
}

impl ManualQueue {
    fn push(&mut self, due: Duration, handle: TaskHandle, job: ManualJob) {
        self.seq += 1;
        self.entries.push(ManualEntry {
            due,
            seq: self.seq,
            handle,
            job,
        });
    }

    /// Remove and return the earliest live entry due at or before `deadline`.
    fn pop_due(&mut self, deadline: Duration) -> Option<ManualEntry> {
        self.entries.retain(|e| !e.handle.is_cancelled());
        let position = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.due <= deadline)
            .min_by_key(|(_, e)| (e.due, e.seq))
            .map(|(i, _)| i)?;
        Some(self.entries.swap_remove(position))
    }
}

/// Virtual-clock scheduler. Nothing fires until [`advance`](Self::advance)
/// is called; jobs then run on the calling thread in due order.
#[derive(Default)]
pub struct ManualScheduler {
    queue: Mutex<ManualQueue>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation.
    pub fn now(&self) -> Duration {
        self.queue.lock().now
    }

    /// Move the clock forward by `by`, running every job that comes due,
    /// including jobs scheduled by jobs run during this call.
    pub fn advance(&self, by: Duration) {
        let deadline = self.now() + by;
        loop {
            let entry = {
                let mut queue = self.queue.lock();
                match queue.pop_due(deadline) {
                    Some(entry) => {
                        queue.now = queue.now.max(entry.due);
                        entry
                    }
                    None => {
                        queue.now = deadline;
                        break;
                    }
                }
            };

            match entry.job {
                ManualJob::Once(job) => {
                    job();
                    entry.handle.mark_finished();
                }
                ManualJob::Repeating { job, period } => {
                    job();
                    if !entry.handle.is_cancelled() {
                        self.queue.lock().push(
                            entry.due + period,
                            entry.handle,
                            ManualJob::Repeating { job, period },
                        );
                    }
                }
            }
        }
    }

    /// Run only the jobs due right now.
    pub fn run_due(&self) {
        self.advance(Duration::ZERO);
    }

    /// Live one-shot jobs waiting to fire.
    pub fn pending_one_shot(&self) -> usize {
        self.count_live(|job| matches!(job, ManualJob::Once(_)))
    }

    /// Live repeating jobs.
    pub fn pending_repeating(&self) -> usize {
        self.count_live(|job| matches!(job, ManualJob::Repeating { .. }))
    }

    pub fn pending(&self) -> usize {
        self.pending_one_shot() + self.pending_repeating()
    }

    /// Due time of the earliest live job, relative to the current time.
    pub fn next_due_in(&self) -> Option<Duration> {
        let queue = self.queue.lock();
        queue
            .entries
            .iter()
            .filter(|e| !e.handle.is_cancelled())
            .map(|e| e.due.saturating_sub(queue.now))
            .min()
    }

    fn count_live(&self, filter: impl Fn(&ManualJob) -> bool) -> usize {
        self.queue
            .lock()
            .entries
            .iter()
            .filter(|e| !e.handle.is_cancelled() && filter(&e.job))
            .count()
    }
}

impl Scheduler for ManualScheduler {
    fn after(&self, delay: Duration, job: Job) -> TaskHandle {
        let handle = TaskHandle::new();
        let mut queue = self.queue.lock();
        let due = queue.now + delay;
        queue.push(due, handle.clone(), ManualJob::Once(job));
        handle
    }

    fn every(&self, period: Duration, job: RepeatingJob) -> TaskHandle {
        let handle = TaskHandle::new();
        let mut queue = self.queue.lock();
        let due = queue.now;
        queue.push(due, handle.clone(), ManualJob::Repeating { job, period });
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter_job(counter: &Arc<AtomicUsize>) -> Job {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_manual_after_fires_on_time() {
        let scheduler = ManualScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let handle = scheduler.after(Duration::from_millis(100), counter_job(&fired));

        scheduler.advance(Duration::from_millis(99));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(handle.is_pending());

        scheduler.advance(Duration::from_millis(1));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(handle.is_finished());
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_manual_runs_in_due_order() {
        let scheduler = ManualScheduler::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for (delay, label) in [(300, "c"), (100, "a"), (200, "b"), (100, "a2")] {
            let order = Arc::clone(&order);
            scheduler.after(
                Duration::from_millis(delay),
                Box::new(move || order.lock().push(label)),
            );
        }

        scheduler.advance(Duration::from_secs(1));
        assert_eq!(*order.lock(), vec!["a", "a2", "b", "c"]);
    }

    #[test]
    fn test_manual_chained_jobs_run_within_one_advance() {
        let scheduler = Arc::new(ManualScheduler::new());
        let fired = Arc::new(AtomicUsize::new(0));

        let inner_scheduler = Arc::clone(&scheduler);
        let inner_fired = Arc::clone(&fired);
        scheduler.after(
            Duration::from_millis(50),
            Box::new(move || {
                inner_scheduler.after(Duration::from_millis(50), counter_job(&inner_fired));
            }),
        );

        scheduler.advance(Duration::from_millis(100));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.now(), Duration::from_millis(100));
    }

    #[test]
    fn test_manual_every_fires_immediately_then_periodically() {
        let scheduler = ManualScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);

        let handle = scheduler.every(
            Duration::from_secs(35),
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        scheduler.run_due();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        scheduler.advance(Duration::from_secs(70));
        assert_eq!(fired.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.pending_repeating(), 1);

        scheduler.cancel(&handle);
        assert_eq!(scheduler.pending_repeating(), 0);

        scheduler.advance(Duration::from_secs(100));
        assert_eq!(fired.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_manual_cancelled_one_shot_never_fires() {
        let scheduler = ManualScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let handle = scheduler.after(Duration::from_millis(10), counter_job(&fired));
        handle.cancel();

        scheduler.advance(Duration::from_secs(1));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!handle.is_pending());
    }

    #[test]
    fn test_tokio_scheduler_after_and_cancel() {
        let scheduler = TokioScheduler::new("test-scheduler").unwrap();
        let fired = Arc::new(AtomicUsize::new(0));

        let kept = scheduler.after(Duration::from_millis(20), counter_job(&fired));
        let dropped = scheduler.after(Duration::from_millis(200), counter_job(&fired));
        dropped.cancel();

        std::thread::sleep(Duration::from_millis(400));

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(kept.is_finished());
        assert!(dropped.is_cancelled());
    }

    #[test]
    fn test_tokio_scheduler_dropped_from_its_own_worker() {
        let scheduler = Arc::new(TokioScheduler::new("test-self-drop").unwrap());
        let last_owner = Arc::clone(&scheduler);
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&dropped);

        scheduler.after(
            Duration::from_millis(50),
            Box::new(move || {
                drop(last_owner);
                flag.store(true, Ordering::SeqCst);
            }),
        );
        drop(scheduler);

        std::thread::sleep(Duration::from_millis(300));
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_tokio_scheduler_every_runs_on_worker_thread() {
        let scheduler = TokioScheduler::new("test-every").unwrap();
        let names = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&names);

        let handle = scheduler.every(
            Duration::from_millis(30),
            Arc::new(move || {
                let name = std::thread::current().name().map(str::to_string);
                seen.lock().push(name);
            }),
        );

        std::thread::sleep(Duration::from_millis(100));
        handle.cancel();
        let count = names.lock().len();
        std::thread::sleep(Duration::from_millis(100));

        assert!(count >= 2, "expected repeated firings, got {}", count);
        assert_eq!(names.lock().len(), count);
        assert!(
            names
                .lock()
                .iter()
                .all(|n| n.as_deref() == Some("test-every"))
        );
    }
}
