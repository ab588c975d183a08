//! One-second countdown for a timed attempt.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> (Expired | Stopped)
//! ```
//!
//! `start` spawns a single ticking task and hands back the event receiver.
//! The task is aborted on `stop`, on expiry and on drop, so a countdown can
//! never outlive the attempt that owns it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};

use crate::error::CountdownError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownState {
    Idle,
    Running,
    Expired,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEvent {
    /// One period elapsed.
    Tick { remaining_secs: u32 },
    /// Remaining time crossed the warning threshold. Sent at most once.
    Warning { remaining_secs: u32 },
    /// Remaining time reached zero. Sent exactly once; the channel closes after it.
    Expired,
}

struct Inner {
    state: CountdownState,
    remaining_secs: u32,
    warning_threshold_secs: u32,
    warned: bool,
    events: Option<mpsc::UnboundedSender<CountdownEvent>>,
}

impl Inner {
    fn emit(&self, event: CountdownEvent) {
        if let Some(events) = &self.events {
            // A dropped receiver only means nobody is listening any more.
            let _ = events.send(event);
        }
    }

    /// Advance by one second. Returns whether the countdown is still running.
    fn tick(&mut self) -> bool {
        if self.state != CountdownState::Running {
            return false;
        }

        let before = self.remaining_secs;
        self.remaining_secs = before.saturating_sub(1);
        self.emit(CountdownEvent::Tick {
            remaining_secs: self.remaining_secs,
        });

        if !self.warned
            && before > self.warning_threshold_secs
            && self.remaining_secs <= self.warning_threshold_secs
            && self.remaining_secs > 0
        {
            self.warned = true;
            tracing::debug!(remaining_secs = self.remaining_secs, "countdown warning");
            self.emit(CountdownEvent::Warning {
                remaining_secs: self.remaining_secs,
            });
        }

        if self.remaining_secs == 0 {
            self.expire();
            return false;
        }
        true
    }

    fn expire(&mut self) {
        self.state = CountdownState::Expired;
        tracing::debug!("countdown expired");
        self.emit(CountdownEvent::Expired);
        self.events = None;
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Countdown {
    inner: Arc<Mutex<Inner>>,
    period: Duration,
    task: Option<JoinHandle<()>>,
}

impl Countdown {
    /// `period` is the tick length (one second outside of tests).
    #[must_use]
    pub fn new(period: Duration, warning_threshold_secs: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: CountdownState::Idle,
                remaining_secs: 0,
                warning_threshold_secs,
                warned: false,
                events: None,
            })),
            period,
            task: None,
        }
    }

    /// Begin counting down from `remaining_secs`.
    ///
    /// Must be called inside a Tokio runtime. Starting at zero expires immediately.
    ///
    /// # Errors
    ///
    /// Returns `CountdownError::NotIdle` unless the countdown is still `Idle`.
    pub fn start(
        &mut self,
        remaining_secs: u32,
    ) -> Result<mpsc::UnboundedReceiver<CountdownEvent>, CountdownError> {
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut inner = lock(&self.inner);
            if inner.state != CountdownState::Idle {
                return Err(CountdownError::NotIdle(inner.state));
            }
            inner.state = CountdownState::Running;
            inner.remaining_secs = remaining_secs;
            inner.events = Some(tx);
            if remaining_secs == 0 {
                inner.expire();
                return Ok(rx);
            }
        }

        tracing::debug!(remaining_secs, "countdown started");
        let inner = Arc::clone(&self.inner);
        let period = self.period;
        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                if !lock(&inner).tick() {
                    break;
                }
            }
        }));

        Ok(rx)
    }

    /// Cancel the tick source. Idempotent; an expired countdown stays `Expired`.
    pub fn stop(&mut self) {
        {
            let mut inner = lock(&self.inner);
            if inner.state == CountdownState::Running {
                inner.state = CountdownState::Stopped;
                tracing::debug!(remaining_secs = inner.remaining_secs, "countdown stopped");
            }
            inner.events = None;
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    #[must_use]
    pub fn state(&self) -> CountdownState {
        lock(&self.inner).state
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        lock(&self.inner).remaining_secs
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Countdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("Countdown")
            .field("state", &inner.state)
            .field("remaining_secs", &inner.remaining_secs)
            .field("period", &self.period)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn drain(rx: &mut mpsc::UnboundedReceiver<CountdownEvent>) -> Vec<CountdownEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn counts_down_and_expires_once() {
        let mut countdown = Countdown::new(Duration::from_secs(1), 60);
        let mut rx = countdown.start(3).unwrap();

        let events = drain(&mut rx).await;
        assert_eq!(
            events,
            vec![
                CountdownEvent::Tick { remaining_secs: 2 },
                CountdownEvent::Tick { remaining_secs: 1 },
                CountdownEvent::Tick { remaining_secs: 0 },
                CountdownEvent::Expired,
            ]
        );
        assert_eq!(countdown.state(), CountdownState::Expired);
        assert_eq!(countdown.remaining_secs(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn warns_once_when_crossing_threshold() {
        let mut countdown = Countdown::new(Duration::from_secs(1), 60);
        let mut rx = countdown.start(62).unwrap();

        let events = drain(&mut rx).await;
        let warnings: Vec<_> = events
            .iter()
            .filter(|event| matches!(event, CountdownEvent::Warning { .. }))
            .collect();
        assert_eq!(warnings, vec![&CountdownEvent::Warning { remaining_secs: 60 }]);
        assert_eq!(
            events
                .iter()
                .filter(|event| **event == CountdownEvent::Expired)
                .count(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn starting_below_threshold_does_not_warn() {
        let mut countdown = Countdown::new(Duration::from_secs(1), 60);
        let mut rx = countdown.start(5).unwrap();
        let events = drain(&mut rx).await;
        assert!(
            !events
                .iter()
                .any(|event| matches!(event, CountdownEvent::Warning { .. }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_ticks_and_is_idempotent() {
        let mut countdown = Countdown::new(Duration::from_secs(1), 60);
        let mut rx = countdown.start(10).unwrap();
        assert_eq!(
            rx.recv().await,
            Some(CountdownEvent::Tick { remaining_secs: 9 })
        );

        countdown.stop();
        countdown.stop();
        assert_eq!(countdown.state(), CountdownState::Stopped);
        assert_eq!(rx.recv().await, None);
        assert_eq!(countdown.remaining_secs(), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_remaining_expires_immediately() {
        let mut countdown = Countdown::new(Duration::from_secs(1), 60);
        let mut rx = countdown.start(0).unwrap();
        assert_eq!(drain(&mut rx).await, vec![CountdownEvent::Expired]);
        assert_eq!(countdown.state(), CountdownState::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn cannot_restart_a_used_countdown() {
        let mut countdown = Countdown::new(Duration::from_secs(1), 60);
        let _rx = countdown.start(10).unwrap();
        assert_eq!(
            countdown.start(10).unwrap_err(),
            CountdownError::NotIdle(CountdownState::Running)
        );
        countdown.stop();
        assert_eq!(
            countdown.start(10).unwrap_err(),
            CountdownError::NotIdle(CountdownState::Stopped)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_countdown_closes_the_channel() {
        let mut countdown = Countdown::new(Duration::from_secs(1), 60);
        let mut rx = countdown.start(30).unwrap();
        drop(countdown);
        assert_eq!(rx.recv().await, None);
    }
}
