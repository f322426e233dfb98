//! Periodic task runner.
//!
//! Each [`PeriodicTask`] owns two threads: a worker that runs the body and
//! a timer that wakes on monotonic deadlines. The timer posts into a
//! single-slot channel with `try_send`, so at most one wake is latched per
//! task: if the body overruns its period, the ticks that fire meanwhile
//! collapse into one catch-up wake and are counted as missed.
//!
//! Both threads request `SCHED_FIFO` at the task priority. Without the
//! privilege to do so the task still runs, at normal priority.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::{NodeError, Result};

/// Name, period and fixed priority of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSpec {
    pub name: &'static str,
    pub period: Duration,
    /// SCHED_FIFO priority; 0 keeps the default scheduler
    pub priority: u8,
}

impl TaskSpec {
    pub const fn new(name: &'static str, period_ms: u64, priority: u8) -> Self {
        Self {
            name,
            period: Duration::from_millis(period_ms),
            priority,
        }
    }
}

/// Work executed by a [`PeriodicTask`].
pub trait PeriodicBody: Send + 'static {
    /// Runs once on the task's own thread before the timer is armed.
    /// An error here ends the task without running the body.
    fn init(&mut self, _stop: &StopSignal) -> Result<()> {
        Ok(())
    }

    /// One tick.
    fn run(&mut self);

    /// Runs once after the last tick, on the task's own thread.
    fn finish(&mut self) {}
}

/// Adapts a plain closure into a [`PeriodicBody`].
#[cfg(test)]
pub struct FnBody<F>(pub F);

#[cfg(test)]
impl<F> PeriodicBody for FnBody<F>
where
    F: FnMut() + Send + 'static,
{
    fn run(&mut self) {
        (self.0)()
    }
}

/// Cooperative stop request, observable by both waiting and polling.
#[derive(Debug, Default)]
pub struct StopSignal {
    requested: Mutex<bool>,
    cv: Condvar,
}

impl StopSignal {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        let mut requested = self.requested.lock().unwrap_or_else(PoisonError::into_inner);
        *requested = true;
        self.cv.notify_all();
    }

    pub fn is_requested(&self) -> bool {
        *self.requested.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until `deadline` or a stop request. Returns `true` on stop.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut requested = self.requested.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if *requested {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            requested = self
                .cv
                .wait_timeout(requested, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    pub fn wait_for(&self, timeout: Duration) -> bool {
        self.wait_until(Instant::now() + timeout)
    }
}

/// Tick accounting returned when a task stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskReport {
    /// Body invocations
    pub ticks: u64,
    /// Timer fires that found a wake already pending
    pub missed: u64,
}

#[derive(Debug, Default)]
struct Shared {
    stop: StopSignal,
    running: AtomicBool,
    ticks: AtomicU64,
    missed: AtomicU64,
}

pub struct PeriodicTask {
    spec: TaskSpec,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<Result<()>>>,
}

impl PeriodicTask {
    /// Spawn the task's execution unit. Initialization, timer arming and
    /// the tick loop all happen on that thread; this only fails if the
    /// thread cannot be created or the period is zero.
    pub fn start<B: PeriodicBody>(spec: TaskSpec, body: B) -> Result<Self> {
        if spec.period.is_zero() {
            return Err(NodeError::Timer {
                task: spec.name,
                source: io::Error::new(io::ErrorKind::InvalidInput, "zero period"),
            });
        }

        let shared = Arc::new(Shared::default());
        shared.running.store(true, Ordering::SeqCst);

        let worker_shared = shared.clone();
        let worker = thread::Builder::new()
            .name(spec.name.into())
            .spawn(move || {
                let outcome = run_task(spec, body, &worker_shared);
                worker_shared.running.store(false, Ordering::SeqCst);
                outcome
            })
            .map_err(|source| NodeError::Timer {
                task: spec.name,
                source,
            })?;

        Ok(Self {
            spec,
            shared,
            worker: Some(worker),
        })
    }

    pub fn spec(&self) -> &TaskSpec {
        &self.spec
    }

    /// True until the execution unit has exited.
    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Ask the task to exit after its current tick, without waiting.
    pub fn request_stop(&self) {
        self.shared.stop.request();
    }

    /// Stop the task and block until its execution unit has exited.
    ///
    /// Returns the task's initialization error if it never reached the
    /// periodic phase. Calling this again returns the final report.
    pub fn stop(&mut self) -> Result<TaskReport> {
        self.shared.stop.request();
        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(outcome) => outcome?,
                Err(_) => log::error!("{}: execution unit panicked", self.spec.name),
            }
        }
        Ok(self.report())
    }

    pub fn report(&self) -> TaskReport {
        TaskReport {
            ticks: self.shared.ticks.load(Ordering::SeqCst),
            missed: self.shared.missed.load(Ordering::SeqCst),
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.stop();
        }
    }
}

// ── Execution unit ───────────────────────────────────────────────────

fn run_task<B: PeriodicBody>(spec: TaskSpec, mut body: B, shared: &Arc<Shared>) -> Result<()> {
    apply_priority(&spec, true);

    match body.init(&shared.stop) {
        Ok(()) => {}
        Err(NodeError::Interrupted(_)) => {
            log::info!("{}: stopped before entering periodic phase", spec.name);
            return Ok(());
        }
        Err(e) => {
            log::error!("{}: {}; task terminated", spec.name, e);
            return Err(e);
        }
    }

    let (wake_tx, wake_rx) = mpsc::sync_channel::<()>(1);
    let timer_shared = shared.clone();
    let timer = thread::Builder::new()
        .name(format!("{}-timer", spec.name))
        .spawn(move || timer_loop(spec, wake_tx, &timer_shared));
    let timer = match timer {
        Ok(handle) => handle,
        Err(source) => {
            let e = NodeError::Timer {
                task: spec.name,
                source,
            };
            log::error!("{}: {}; task terminated", spec.name, e);
            body.finish();
            return Err(e);
        }
    };

    log::info!(
        "{}: armed, period {} ms, priority {}",
        spec.name,
        spec.period.as_millis(),
        spec.priority
    );

    // recv fails only once the timer has exited and dropped its sender
    while wake_rx.recv().is_ok() {
        if shared.stop.is_requested() {
            break;
        }
        body.run();
        shared.ticks.fetch_add(1, Ordering::SeqCst);
    }

    body.finish();

    shared.stop.request();
    if timer.join().is_err() {
        log::error!("{}: timer panicked", spec.name);
    }
    log::debug!("{}: execution unit exiting", spec.name);
    Ok(())
}

fn timer_loop(spec: TaskSpec, wake_tx: SyncSender<()>, shared: &Shared) {
    apply_priority(&spec, false);

    let period = spec.period;
    let mut next = Instant::now() + period;
    loop {
        if shared.stop.wait_until(next) {
            break;
        }

        match wake_tx.try_send(()) {
            Ok(()) => {}
            Err(TrySendError::Full(())) => {
                shared.missed.fetch_add(1, Ordering::SeqCst);
                log::debug!("{}: overrun, tick collapsed into pending wake", spec.name);
            }
            Err(TrySendError::Disconnected(())) => break,
        }

        next += period;
        let now = Instant::now();
        if next <= now {
            // Timer thread itself fell behind; skip the lost deadlines
            let behind = (now - next).as_nanos() / period.as_nanos() + 1;
            shared.missed.fetch_add(behind as u64, Ordering::SeqCst);
            next += period * behind as u32;
        }
    }
}

fn apply_priority(spec: &TaskSpec, report: bool) {
    if spec.priority == 0 {
        return;
    }
    match set_fifo_priority(spec.priority) {
        Ok(applied) if report => {
            log::debug!("{}: SCHED_FIFO priority {}", spec.name, applied);
        }
        Ok(_) => {}
        Err(e) if report => {
            log::warn!(
                "{}: SCHED_FIFO priority {} unavailable ({}); running at normal priority",
                spec.name,
                spec.priority,
                e
            );
        }
        Err(_) => {}
    }
}

/// Switch the calling thread to `SCHED_FIFO` at `priority`, clamped to the
/// range the kernel accepts. Returns the priority applied.
#[cfg(target_os = "linux")]
pub fn set_fifo_priority(priority: u8) -> io::Result<i32> {
    let (min, max) = unsafe {
        (
            libc::sched_get_priority_min(libc::SCHED_FIFO),
            libc::sched_get_priority_max(libc::SCHED_FIFO),
        )
    };
    if min < 0 || max < 0 {
        return Err(io::Error::last_os_error());
    }
    let applied = (priority as i32).clamp(min, max);

    // Safety: sched_param is plain data; zeroed is a valid value
    let mut param: libc::sched_param = unsafe { std::mem::zeroed() };
    param.sched_priority = applied;
    let rc = unsafe { libc::pthread_setschedparam(libc::pthread_self(), libc::SCHED_FIFO, &param) };
    if rc != 0 {
        return Err(io::Error::from_raw_os_error(rc));
    }
    Ok(applied)
}

#[cfg(not(target_os = "linux"))]
pub fn set_fifo_priority(_priority: u8) -> io::Result<i32> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "SCHED_FIFO is only supported on Linux",
    ))
}
