// src/scheduler.rs
//! Fixed-rate consumer loops and cooperative shutdown
//!
//! Each periodic task runs on its own thread with its own deadline, so a
//! slow sink only ever delays its own task. A tick that overruns its period
//! runs again immediately and the deadline is re-anchored at that moment:
//! missed ticks are skipped, never queued.
//!
//! Shutdown goes through a [`StopSignal`]. Loops poll their [`StopToken`]
//! between iterations and sleep on it, so a stop wakes sleeping tasks at
//! once instead of after their period. [`stop_on_interrupt`] ties the signal
//! to Ctrl+C.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::constants::scheduler::{INTERRUPT_POLL_MS, MAX_RATE_HZ, SESSION_POLL_MS};
use crate::config::constants::sinks::FAILURE_LOG_INTERVAL;
use crate::error::GripResult;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("task '{name}' rate must be in (0, {max}] Hz, got {rate}")]
    InvalidRate { name: String, rate: f64, max: f64 },

    #[error("failed to spawn thread '{name}': {source}")]
    Spawn {
        name: String,
        source: std::io::Error,
    },

    #[error("thread '{0}' panicked")]
    TaskPanicked(String),

    #[error("failed to install interrupt handler: {0}")]
    SignalHandler(std::io::Error),
}

/// Owner side of the process-wide stop condition
#[derive(Debug, Clone)]
pub struct StopSignal {
    stopped: Arc<AtomicBool>,
    // Dropping the sender disconnects every token's receiver, waking sleepers
    waker: Arc<Mutex<Option<Sender<()>>>>,
    receiver: Receiver<()>,
}

/// Observer side handed to every loop
#[derive(Debug, Clone)]
pub struct StopToken {
    stopped: Arc<AtomicBool>,
    receiver: Receiver<()>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (sender, receiver) = channel::bounded(0);
        Self {
            stopped: Arc::new(AtomicBool::new(false)),
            waker: Arc::new(Mutex::new(Some(sender))),
            receiver,
        }
    }

    pub fn token(&self) -> StopToken {
        StopToken {
            stopped: self.stopped.clone(),
            receiver: self.receiver.clone(),
        }
    }

    /// Request every loop to exit after its current iteration
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            debug!("stop requested");
        }
        self.waker.lock().take();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl StopToken {
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Sleep for up to `timeout`, returning early with `true` on stop
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_stopped() {
            return true;
        }
        match self.receiver.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => self.is_stopped(),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
        }
    }
}

/// Deadline bookkeeping for one fixed-rate loop
#[derive(Debug, Clone)]
pub struct SampleClock {
    period: Duration,
    next_deadline: Instant,
    overruns: u64,
}

impl SampleClock {
    /// Clock whose first tick is due at `start`
    pub fn new(period: Duration, start: Instant) -> Self {
        Self {
            period,
            next_deadline: start,
            overruns: 0,
        }
    }

    pub fn from_rate_hz(rate_hz: f64, start: Instant) -> Self {
        Self::new(Duration::from_secs_f64(1.0 / rate_hz), start)
    }

    /// Advance past a finished tick and return how long to wait before the
    /// next one. An overrun yields zero and re-anchors the schedule at `now`.
    pub fn schedule_next(&mut self, now: Instant) -> Duration {
        self.next_deadline += self.period;

        if now >= self.next_deadline {
            self.overruns += 1;
            self.next_deadline = now;
            return Duration::ZERO;
        }
        self.next_deadline - now
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn overruns(&self) -> u64 {
        self.overruns
    }
}

/// Stop `signal` when the process receives Ctrl+C.
///
/// The listener runs on its own thread with a single-threaded tokio runtime
/// and exits once the signal is stopped by anyone.
pub fn stop_on_interrupt(signal: &StopSignal) -> Result<JoinHandle<()>, SchedulerError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(SchedulerError::SignalHandler)?;
    let signal = signal.clone();

    thread::Builder::new()
        .name("interrupt".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                let interrupted = tokio::signal::ctrl_c();
                tokio::pin!(interrupted);

                while !signal.is_stopped() {
                    tokio::select! {
                        result = &mut interrupted => {
                            match result {
                                Ok(()) => info!("interrupt received, stopping session"),
                                Err(err) => error!(error = %err, "interrupt listener failed, stopping session"),
                            }
                            signal.stop();
                        }
                        _ = tokio::time::sleep(Duration::from_millis(INTERRUPT_POLL_MS)) => {}
                    }
                }
            });
        })
        .map_err(|source| SchedulerError::Spawn {
            name: "interrupt".to_string(),
            source,
        })
}

/// Why [`Scheduler::wait_for_session`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionEnd {
    /// The stop signal fired, for example on Ctrl+C
    Stopped,
    /// The session ran for its full time limit
    TimeLimit,
}

/// Outcome of one periodic task after it stopped
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub name: String,
    pub ticks: u64,
    pub overruns: u64,
    pub failures: u64,
}

/// Owns every long-lived thread of a session
pub struct Scheduler {
    stop: StopSignal,
    periodic: Vec<(String, JoinHandle<TaskReport>)>,
    workers: Vec<(String, JoinHandle<()>)>,
}

impl Scheduler {
    pub fn new(stop: StopSignal) -> Self {
        Self {
            stop,
            periodic: Vec::new(),
            workers: Vec::new(),
        }
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    /// Run `tick` at `rate_hz` until stopped. Tick failures are counted and
    /// logged but never end the task.
    pub fn spawn_periodic<F>(&mut self, name: &str, rate_hz: f64, mut tick: F) -> Result<(), SchedulerError>
    where
        F: FnMut(u64) -> GripResult<()> + Send + 'static,
    {
        if !(rate_hz.is_finite() && rate_hz > 0.0 && rate_hz <= MAX_RATE_HZ) {
            return Err(SchedulerError::InvalidRate {
                name: name.to_string(),
                rate: rate_hz,
                max: MAX_RATE_HZ,
            });
        }

        let token = self.stop.token();
        let task_name = name.to_string();

        let handle = thread::Builder::new()
            .name(task_name.clone())
            .spawn(move || {
                let mut clock = SampleClock::from_rate_hz(rate_hz, Instant::now());
                let mut report = TaskReport {
                    name: task_name,
                    ticks: 0,
                    overruns: 0,
                    failures: 0,
                };
                info!(task = %report.name, rate_hz, "periodic task started");

                while !token.is_stopped() {
                    if let Err(err) = tick(report.ticks) {
                        report.failures += 1;
                        if report.failures == 1 || report.failures % FAILURE_LOG_INTERVAL == 0 {
                            if err.is_recoverable() {
                                warn!(task = %report.name, failures = report.failures, error = %err, "tick failed");
                            } else {
                                error!(task = %report.name, failures = report.failures, error = %err, "tick failed");
                            }
                        }
                    }
                    report.ticks += 1;

                    let wait = clock.schedule_next(Instant::now());
                    if !wait.is_zero() && token.wait_timeout(wait) {
                        break;
                    }
                }

                report.overruns = clock.overruns();
                info!(task = %report.name, ticks = report.ticks, overruns = report.overruns, "periodic task stopped");
                report
            })
            .map_err(|source| SchedulerError::Spawn {
                name: name.to_string(),
                source,
            })?;

        self.periodic.push((name.to_string(), handle));
        Ok(())
    }

    /// Run a long-lived producer loop that watches the stop token itself
    pub fn spawn_worker<F>(&mut self, name: &str, work: F) -> Result<(), SchedulerError>
    where
        F: FnOnce(StopToken) + Send + 'static,
    {
        let token = self.stop.token();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || work(token))
            .map_err(|source| SchedulerError::Spawn {
                name: name.to_string(),
                source,
            })?;

        self.workers.push((name.to_string(), handle));
        Ok(())
    }

    /// True once every spawned thread has returned
    pub fn all_finished(&self) -> bool {
        self.periodic.iter().all(|(_, h)| h.is_finished()) && self.workers.iter().all(|(_, h)| h.is_finished())
    }

    /// Names of workers that have already exited on their own
    pub fn finished_workers(&self) -> Vec<String> {
        self.workers
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Block until the stop signal fires or `limit` elapses. `None` waits for
    /// the stop signal only. Workers that exit early are reported once.
    pub fn wait_for_session(&self, limit: Option<Duration>) -> SessionEnd {
        let token = self.stop.token();
        let deadline = limit.map(|limit| Instant::now() + limit);
        let poll = Duration::from_millis(SESSION_POLL_MS);
        let mut reported = Vec::new();

        loop {
            let wait = match deadline {
                Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                    Some(remaining) if !remaining.is_zero() => remaining.min(poll),
                    _ => return SessionEnd::TimeLimit,
                },
                None => poll,
            };
            if token.wait_timeout(wait) {
                return SessionEnd::Stopped;
            }

            for name in self.finished_workers() {
                if !reported.contains(&name) {
                    warn!(worker = %name, "producer exited, its windows will go stale");
                    reported.push(name);
                }
            }
        }
    }

    /// Signal stop and join everything, returning the periodic task reports
    pub fn shutdown(self) -> Result<Vec<TaskReport>, SchedulerError> {
        self.stop.stop();

        let mut panicked = None;
        for (name, handle) in self.workers {
            if handle.join().is_err() {
                error!(thread = %name, "worker panicked");
                panicked.get_or_insert(name);
            }
        }

        let mut reports = Vec::with_capacity(self.periodic.len());
        for (name, handle) in self.periodic {
            match handle.join() {
                Ok(report) => reports.push(report),
                Err(_) => {
                    error!(task = %name, "periodic task panicked");
                    panicked.get_or_insert(name);
                }
            }
        }

        match panicked {
            Some(name) => Err(SchedulerError::TaskPanicked(name)),
            None => Ok(reports),
        }
    }
}
