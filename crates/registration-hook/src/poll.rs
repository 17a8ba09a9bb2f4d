//! Poll-until-ready loop racing a timeout.
//!
//! The attempt loop runs in a background task while the caller waits on a
//! timer. Both sides settle a shared state that moves exactly once out of
//! `Polling` into `Succeeded`, `TimedOut` or `Cancelled`. A result produced
//! after the timer has won is dropped instead of delivered, and the loop
//! issues no further attempts once the state is terminal.

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

const POLLING: u8 = 0;
const SUCCEEDED: u8 = 1;
const TIMED_OUT: u8 = 2;
const CANCELLED: u8 = 3;

/// Terminal state of a poll loop.
#[derive(Debug, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Succeeded(T),
    /// Budget exhausted; carries the elapsed time.
    TimedOut(Duration),
    Cancelled,
}

/// Shared completion flag of one loop.
#[derive(Debug, Clone)]
struct PollState(Arc<AtomicU8>);

impl PollState {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(POLLING)))
    }

    /// Moves out of `Polling`; returns false if another side already did.
    fn settle(&self, terminal: u8) -> bool {
        self.0
            .compare_exchange(POLLING, terminal, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn is_polling(&self) -> bool {
        self.0.load(Ordering::Acquire) == POLLING
    }
}

/// Timing of a poll loop.
#[derive(Debug, Clone, Copy)]
pub struct Poller {
    /// Wait before the first attempt.
    pub initial_delay: Duration,
    /// Wait between attempts.
    pub interval: Duration,
    /// Overall budget, measured from the call.
    pub timeout: Duration,
}

impl Poller {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            initial_delay: Duration::ZERO,
            interval,
            timeout,
        }
    }

    #[must_use]
    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    /// Repeats `attempt` until it yields `Some`, the budget runs out or
    /// `cancel` fires, whichever happens first.
    pub async fn run<T, F, Fut>(&self, cancel: &CancellationToken, mut attempt: F) -> PollOutcome<T>
    where
        T: Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Option<T>> + Send + 'static,
    {
        let state = PollState::new();
        let (tx, mut rx) = oneshot::channel();
        let started = Instant::now();

        let loop_state = state.clone();
        let interval = self.interval;
        let initial_delay = self.initial_delay;
        let task = tokio::spawn(async move {
            sleep(initial_delay).await;
            let mut attempts = 0_u32;
            while loop_state.is_polling() {
                attempts += 1;
                if let Some(value) = attempt().await {
                    if loop_state.settle(SUCCEEDED) {
                        debug!(attempts, "Poll loop succeeded");
                        let _ = tx.send(value);
                    }
                    return;
                }
                sleep(interval).await;
            }
        });

        let outcome = tokio::select! {
            Ok(value) = &mut rx => PollOutcome::Succeeded(value),
            () = sleep(self.timeout) => {
                if state.settle(TIMED_OUT) {
                    PollOutcome::TimedOut(started.elapsed())
                } else {
                    // The loop settled first; its value is already on the way.
                    match (&mut rx).await {
                        Ok(value) => PollOutcome::Succeeded(value),
                        Err(_) => PollOutcome::TimedOut(started.elapsed()),
                    }
                }
            }
            () = cancel.cancelled() => {
                state.settle(CANCELLED);
                PollOutcome::Cancelled
            }
        };

        task.abort();
        outcome
    }
}
