//! Process-local circuit breaker
//!
//! Shared by all dispatch tasks in the process. CLOSED counts consecutive
//! failures; reaching the threshold opens the circuit, which rejects every
//! submission until the reset window elapses, after which a single HALF_OPEN
//! probe is admitted. The probe's outcome decides between CLOSED and OPEN.

use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::{Duration, Instant};

use crate::sender::SendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed { failures: u32 },
    Open { since: Instant },
    HalfOpen,
}

/// Circuit breaker guarding the notification provider
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<State>,
    fail_max: u32,
    reset_timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(fail_max: u32, reset_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(State::Closed { failures: 0 }),
            fail_max,
            reset_timeout,
        }
    }

    /// Ask for permission to call the provider
    ///
    /// While OPEN every caller is rejected without touching the provider;
    /// once the reset window has elapsed exactly one caller gets the
    /// HALF_OPEN probe and the rest keep seeing `CircuitOpen`.
    pub fn try_acquire(&self) -> Result<(), SendError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match *state {
            State::Closed { .. } => Ok(()),
            State::HalfOpen => Err(SendError::CircuitOpen),
            State::Open { since } => {
                if since.elapsed() >= self.reset_timeout {
                    *state = State::HalfOpen;
                    Ok(())
                } else {
                    Err(SendError::CircuitOpen)
                }
            }
        }
    }

    /// Record a successful provider call
    pub fn record_success(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !matches!(*state, State::Closed { failures: 0 }) {
            tracing::info!("circuit breaker closed");
        }
        *state = State::Closed { failures: 0 };
    }

    /// Record a failed provider call
    pub fn record_failure(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = match *state {
            State::Closed { failures } => {
                let failures = failures + 1;
                if failures >= self.fail_max {
                    tracing::warn!(
                        failures,
                        "circuit breaker opened after consecutive failures"
                    );
                    State::Open {
                        since: Instant::now(),
                    }
                } else {
                    State::Closed { failures }
                }
            }
            // A failed probe re-opens for a full reset window
            State::HalfOpen | State::Open { .. } => {
                tracing::warn!("circuit breaker re-opened");
                State::Open {
                    since: Instant::now(),
                }
            }
        };
    }

    /// Whether the breaker currently rejects submissions
    pub fn is_open(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        matches!(*state, State::Open { .. } | State::HalfOpen)
    }
}
