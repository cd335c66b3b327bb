//! Waiting for an export to finish staging.
//!
//! Polling is an explicit state machine: a submitted request is polled,
//! stays `Pending` while the service reports a nonzero status, and ends
//! either `Ready` or `Failed`. Time is read and spent through [`Clock`] so
//! the loop can be driven without real sleeps.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::{ExportError, Result};
use crate::reply::ExportStatus;

pub trait Clock: Send + Sync {
    /// Monotonic time since an arbitrary fixed point.
    fn elapsed(&self) -> Duration;
    fn sleep(&self, dur: Duration);
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, dur: Duration) {
        std::thread::sleep(dur);
    }
}

/// Cooperative cancellation flag, checked before every status call.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Give up once this much time has passed without a ready status.
    pub max_wait: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_wait: None,
        }
    }
}

#[derive(Debug)]
pub enum ExportState {
    Submitted { request_id: String },
    Pending {
        request_id: String,
        status: i64,
        /// Seconds the service still expects staging to take.
        wait: Option<u64>,
    },
    Ready(ExportStatus),
    Failed(ExportError),
}

impl ExportState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready(_) | Self::Failed(_))
    }
}

/// Drives the state machine, calling `poll` with the request id on every
/// status check.
pub struct Poller<'a> {
    policy: PollPolicy,
    clock: &'a dyn Clock,
    cancel: Option<&'a CancelToken>,
    started: Duration,
}

impl<'a> Poller<'a> {
    pub fn new(policy: PollPolicy, clock: &'a dyn Clock) -> Self {
        Self {
            policy,
            clock,
            cancel: None,
            started: clock.elapsed(),
        }
    }

    pub fn with_cancel(mut self, cancel: &'a CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn step<F>(&self, state: ExportState, poll: &mut F) -> ExportState
    where
        F: FnMut(&str) -> Result<ExportStatus>,
    {
        match state {
            ExportState::Submitted { request_id } => self.check(&request_id, poll),
            ExportState::Pending { request_id, .. } => {
                if let Some(err) = self.deadline_passed(&request_id) {
                    return ExportState::Failed(err);
                }
                self.clock.sleep(self.next_sleep());
                if let Some(err) = self.deadline_passed(&request_id) {
                    return ExportState::Failed(err);
                }
                self.check(&request_id, poll)
            }
            terminal => terminal,
        }
    }

    pub fn run<F>(&self, request_id: &str, mut poll: F) -> Result<ExportStatus>
    where
        F: FnMut(&str) -> Result<ExportStatus>,
    {
        let mut state = ExportState::Submitted {
            request_id: request_id.to_string(),
        };
        loop {
            state = match state {
                ExportState::Ready(status) => return Ok(status),
                ExportState::Failed(err) => return Err(err),
                live => self.step(live, &mut poll),
            };
        }
    }

    fn waited(&self) -> Duration {
        self.clock.elapsed().saturating_sub(self.started)
    }

    /// The poll interval, cut short so the sleep never runs past `max_wait`.
    fn next_sleep(&self) -> Duration {
        match self.policy.max_wait {
            Some(max_wait) => self
                .policy
                .interval
                .min(max_wait.saturating_sub(self.waited())),
            None => self.policy.interval,
        }
    }

    fn deadline_passed(&self, request_id: &str) -> Option<ExportError> {
        let max_wait = self.policy.max_wait?;
        let waited = self.waited();
        (waited >= max_wait).then(|| ExportError::DeadlineExceeded {
            request_id: request_id.to_string(),
            waited,
        })
    }

    fn check<F>(&self, request_id: &str, poll: &mut F) -> ExportState
    where
        F: FnMut(&str) -> Result<ExportStatus>,
    {
        if self.cancel.is_some_and(CancelToken::is_cancelled) {
            return ExportState::Failed(ExportError::Cancelled {
                request_id: request_id.to_string(),
            });
        }

        match poll(request_id) {
            Ok(status) if status.is_ready() => {
                debug!(request_id, files = status.filenames.len(), "export ready");
                ExportState::Ready(status)
            }
            Ok(status) => {
                if let Some(wait) = status.wait {
                    info!(
                        status = status.status,
                        wait_secs = wait,
                        "Waiting for data to stage"
                    );
                } else {
                    debug!(request_id, status = status.status, "export pending");
                }
                ExportState::Pending {
                    request_id: status.request_id,
                    status: status.status,
                    wait: status.wait,
                }
            }
            Err(err) => ExportState::Failed(err),
        }
    }
}
