//! Circuit breaker over a rolling sampling window.
//!
//! # State Transitions
//! ```text
//! Closed → Open: windowed failures reach the threshold (or the failure
//!                ratio) with minimum throughput satisfied
//! Open → Half-Open: after the break duration elapses
//! Half-Open → Closed: the single trial call succeeds
//! Half-Open → Open: the trial call fails
//! ```
//!
//! # Design Decisions
//! - One coarse lock; outcome recording is far cheaper than the downstream
//!   call it follows
//! - Out-of-range settings are clamped to documented defaults, never
//!   rejected
//! - A trial that never reports back frees its slot after one break
//!   duration, so an abandoned trial cannot wedge the breaker

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::routing::route::QosSettings;

/// Break-duration range (exclusive bounds) and default, in milliseconds.
pub const LOW_BREAK_DURATION_MS: u64 = 500;
pub const HIGH_BREAK_DURATION_MS: u64 = 86_400_000;
pub const DEFAULT_BREAK_DURATION_MS: u64 = 5_000;

/// Minimum throughput floor for configured values; below it the failure
/// threshold itself is used, so a threshold of one trips on one failure.
pub const LOW_MINIMUM_THROUGHPUT: u32 = 2;

/// Failure-ratio range (0, 1] and default.
pub const DEFAULT_FAILURE_RATIO: f64 = 0.8;

/// Sampling-window range (exclusive bounds) and default, in milliseconds.
pub const LOW_SAMPLING_DURATION_MS: u64 = 500;
pub const HIGH_SAMPLING_DURATION_MS: u64 = 86_400_000;
pub const DEFAULT_SAMPLING_DURATION_MS: u64 = 10_000;

/// Validated breaker settings.
#[derive(Debug, Clone)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub minimum_throughput: u32,
    pub break_duration: Duration,
    pub failure_ratio: f64,
    pub sampling_duration: Duration,
}

impl BreakerSettings {
    /// Build settings from route QoS, clamping out-of-range values.
    /// Returns `None` when the breaker is disabled (threshold of zero).
    pub fn from_qos(qos: &QosSettings) -> Option<Self> {
        if qos.exceptions_allowed_before_breaking == 0 {
            return None;
        }
        let threshold = qos.exceptions_allowed_before_breaking;

        let break_ms = if qos.break_duration_ms > LOW_BREAK_DURATION_MS
            && qos.break_duration_ms < HIGH_BREAK_DURATION_MS
        {
            qos.break_duration_ms
        } else {
            DEFAULT_BREAK_DURATION_MS
        };

        let minimum_throughput = if qos.minimum_throughput >= LOW_MINIMUM_THROUGHPUT {
            qos.minimum_throughput
        } else {
            threshold
        };

        let failure_ratio = if qos.failure_ratio > 0.0 && qos.failure_ratio <= 1.0 {
            qos.failure_ratio
        } else {
            DEFAULT_FAILURE_RATIO
        };

        let sampling_ms = if qos.sampling_duration_ms > LOW_SAMPLING_DURATION_MS
            && qos.sampling_duration_ms < HIGH_SAMPLING_DURATION_MS
        {
            qos.sampling_duration_ms
        } else {
            DEFAULT_SAMPLING_DURATION_MS
        };

        Some(Self {
            failure_threshold: threshold,
            minimum_throughput,
            break_duration: Duration::from_millis(break_ms),
            failure_ratio,
            sampling_duration: Duration::from_millis(sampling_ms),
        })
    }
}

/// Returned when the breaker refuses a call.
#[derive(Debug, thiserror::Error)]
#[error("circuit open for '{route}'")]
pub struct CircuitOpenError {
    pub route: String,
}

#[derive(Debug)]
struct Sample {
    at: Instant,
    failure: bool,
}

#[derive(Debug)]
enum BreakerState {
    Closed { window: VecDeque<Sample> },
    Open { until: Instant },
    HalfOpen { trial_started: Option<Instant> },
}

/// Per-route breaker instance; lives inside the cached resilience pipeline.
#[derive(Debug)]
pub struct CircuitBreaker {
    route: String,
    settings: BreakerSettings,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(route: impl Into<String>, settings: BreakerSettings) -> Self {
        Self {
            route: route.into(),
            settings,
            state: Mutex::new(BreakerState::Closed {
                window: VecDeque::new(),
            }),
        }
    }

    /// Admission check before a downstream call. Open circuits refuse
    /// immediately; an elapsed break admits exactly one trial.
    pub fn try_acquire(&self) -> Result<(), CircuitOpenError> {
        let mut state = self.lock();
        let now = Instant::now();

        match &mut *state {
            BreakerState::Closed { .. } => Ok(()),
            BreakerState::Open { until } => {
                if now >= *until {
                    tracing::info!(route = %self.route, "Circuit half-open, admitting trial call");
                    *state = BreakerState::HalfOpen {
                        trial_started: Some(now),
                    };
                    Ok(())
                } else {
                    Err(self.refused())
                }
            }
            BreakerState::HalfOpen { trial_started } => match trial_started {
                None => {
                    *trial_started = Some(now);
                    Ok(())
                }
                Some(started) if now.duration_since(*started) > self.settings.break_duration => {
                    *trial_started = Some(now);
                    Ok(())
                }
                Some(_) => Err(self.refused()),
            },
        }
    }

    /// Record a successful outcome.
    pub fn record_success(&self) {
        let mut state = self.lock();
        match &mut *state {
            BreakerState::Closed { window } => {
                push_sample(window, self.settings.sampling_duration, false);
            }
            BreakerState::HalfOpen { .. } => {
                tracing::info!(route = %self.route, "Trial succeeded, circuit closed");
                *state = BreakerState::Closed {
                    window: VecDeque::new(),
                };
            }
            // A straggler from before the trip changes nothing.
            BreakerState::Open { .. } => {}
        }
    }

    /// Record a failed outcome (server-error status, transport failure or
    /// timeout). May trip the circuit.
    pub fn record_failure(&self) {
        let mut state = self.lock();
        let now = Instant::now();

        match &mut *state {
            BreakerState::Closed { window } => {
                push_sample(window, self.settings.sampling_duration, true);

                let samples = window.len() as u32;
                let failures = window.iter().filter(|s| s.failure).count() as u32;
                let ratio = f64::from(failures) / f64::from(samples.max(1));

                if samples >= self.settings.minimum_throughput
                    && (failures >= self.settings.failure_threshold
                        || ratio >= self.settings.failure_ratio)
                {
                    tracing::error!(
                        route = %self.route,
                        failures,
                        samples,
                        break_ms = self.settings.break_duration.as_millis() as u64,
                        "Circuit opened"
                    );
                    *state = BreakerState::Open {
                        until: now + self.settings.break_duration,
                    };
                }
            }
            BreakerState::HalfOpen { .. } => {
                tracing::error!(route = %self.route, "Trial failed, circuit re-opened");
                *state = BreakerState::Open {
                    until: now + self.settings.break_duration,
                };
            }
            BreakerState::Open { .. } => {}
        }
    }

    /// Current state name, for diagnostics.
    pub fn state_name(&self) -> &'static str {
        match &*self.lock() {
            BreakerState::Closed { .. } => "closed",
            BreakerState::Open { .. } => "open",
            BreakerState::HalfOpen { .. } => "half-open",
        }
    }

    fn refused(&self) -> CircuitOpenError {
        CircuitOpenError {
            route: self.route.clone(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn push_sample(window: &mut VecDeque<Sample>, sampling: Duration, failure: bool) {
    let now = Instant::now();
    window.push_back(Sample { at: now, failure });
    while let Some(front) = window.front() {
        if now.duration_since(front.at) > sampling {
            window.pop_front();
        } else {
            break;
        }
    }
}
