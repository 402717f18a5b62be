//! Background job scheduling.
//!
//! A [`Job`] runs on a worker and talks to its owner only through a shared
//! [`JobControl`]: a stop token, an "entries changed" flag, a progress value
//! and a finished flag. The owner polls these from its own thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use dirlist_core::ListError;

/// Signals shared between a running job and its owner.
#[derive(Debug, Default)]
pub struct JobControl {
    stop: CancellationToken,
    do_update: AtomicBool,
    progress: AtomicU32,
    finished: AtomicBool,
}

impl JobControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the job to stop at its next checkpoint.
    pub fn request_stop(&self) {
        self.stop.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Token cancelled when a stop is requested.
    pub fn token(&self) -> &CancellationToken {
        &self.stop
    }

    /// Report progress in `[0, 1]`.
    pub fn set_progress(&self, fraction: f32) {
        self.progress
            .store(fraction.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    pub fn progress(&self) -> f32 {
        f32::from_bits(self.progress.load(Ordering::Relaxed))
    }

    /// Flag that new results are available.
    pub fn mark_updated(&self) {
        self.do_update.store(true, Ordering::Release);
    }

    /// Consume the "new results" flag.
    pub fn take_update(&self) -> bool {
        self.do_update.swap(false, Ordering::AcqRel)
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    fn mark_finished(&self) {
        self.finished.store(true, Ordering::Release);
    }
}

/// Work that runs off the owner's thread.
pub trait Job: Send + 'static {
    /// Do the work, checking `control` for stop requests.
    fn run(&mut self, control: &JobControl);

    /// Called on the worker once `run` returns, stopped or not.
    fn finish(&mut self, _control: &JobControl) {}
}

/// Owner-side handle to a started job.
#[derive(Debug, Clone)]
pub struct JobHandle {
    control: Arc<JobControl>,
}

impl JobHandle {
    pub fn control(&self) -> &JobControl {
        &self.control
    }

    /// Request a cooperative stop.
    pub fn stop(&self) {
        self.control.request_stop();
    }

    pub fn is_running(&self) -> bool {
        !self.control.is_finished()
    }

    pub fn is_finished(&self) -> bool {
        self.control.is_finished()
    }

    pub fn progress(&self) -> f32 {
        self.control.progress()
    }

    /// Consume the "new results" flag.
    pub fn take_update(&self) -> bool {
        self.control.take_update()
    }
}

fn run_to_completion(mut job: Box<dyn Job>, control: &JobControl) {
    job.run(control);
    job.finish(control);
    control.mark_finished();
}

/// Starts jobs.
pub trait JobScheduler: Send + Sync {
    fn start(&self, job: Box<dyn Job>) -> Result<JobHandle, ListError>;
}

/// Runs jobs on the blocking pool of a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Scheduler for the runtime the caller is running in.
    pub fn current() -> Result<Self, ListError> {
        let handle = Handle::try_current().map_err(|e| ListError::JobStart {
            message: e.to_string(),
        })?;
        Ok(Self::new(handle))
    }
}

impl JobScheduler for TokioScheduler {
    fn start(&self, job: Box<dyn Job>) -> Result<JobHandle, ListError> {
        let control = Arc::new(JobControl::new());
        let worker_control = Arc::clone(&control);
        self.handle.spawn_blocking(move || {
            run_to_completion(job, &worker_control);
            debug!("Background job finished");
        });
        Ok(JobHandle { control })
    }
}

/// Runs jobs synchronously inside `start`.
///
/// The returned handle is already finished.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineScheduler;

impl InlineScheduler {
    pub fn new() -> Self {
        Self
    }
}

impl JobScheduler for InlineScheduler {
    fn start(&self, job: Box<dyn Job>) -> Result<JobHandle, ListError> {
        let control = Arc::new(JobControl::new());
        run_to_completion(job, &control);
        Ok(JobHandle { control })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    struct CountJob {
        steps: u32,
        finished: Arc<AtomicBool>,
    }

    impl Job for CountJob {
        fn run(&mut self, control: &JobControl) {
            for step in 1..=self.steps {
                if control.is_stopped() {
                    return;
                }
                control.set_progress(step as f32 / self.steps as f32);
                control.mark_updated();
            }
        }

        fn finish(&mut self, _control: &JobControl) {
            self.finished.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_control_flags() {
        let control = JobControl::new();
        assert!(!control.take_update());
        control.mark_updated();
        assert!(control.take_update());
        assert!(!control.take_update());

        control.set_progress(1.5);
        assert_eq!(control.progress(), 1.0);

        assert!(!control.is_stopped());
        control.request_stop();
        assert!(control.is_stopped());
        assert!(control.token().is_cancelled());
    }

    #[test]
    fn test_inline_scheduler() {
        let finished = Arc::new(AtomicBool::new(false));
        let job = CountJob {
            steps: 4,
            finished: Arc::clone(&finished),
        };

        let handle = InlineScheduler::new().start(Box::new(job)).unwrap();
        assert!(handle.is_finished());
        assert!(handle.take_update());
        assert_eq!(handle.progress(), 1.0);
        assert!(finished.load(Ordering::SeqCst));
    }

    #[test]
    fn test_tokio_scheduler() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let scheduler = TokioScheduler::new(runtime.handle().clone());
        let finished = Arc::new(AtomicBool::new(false));
        let job = CountJob {
            steps: 10,
            finished: Arc::clone(&finished),
        };

        let handle = scheduler.start(Box::new(job)).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while handle.is_running() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        assert!(handle.is_finished());
        assert!(finished.load(Ordering::SeqCst));
    }

    #[test]
    fn test_current_without_runtime() {
        assert!(matches!(
            TokioScheduler::current(),
            Err(ListError::JobStart { .. })
        ));
    }
}
