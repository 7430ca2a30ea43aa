//! Per-probe supervision state machine.
//!
//! A supervisor owns one probe for the process lifetime. After the optional
//! initial delay it runs the check, applies the threshold rule, then waits one
//! period and repeats. Before the first success the probe is in its startup
//! phase and the startup threshold applies; from the first success on, the
//! steady-state threshold applies. The first threshold hit is terminal: there
//! is no recovery path, and a supervisor never finishes healthy.

use std::sync::Arc;

use anyhow::anyhow;
use tokio::select;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::Probe;
use crate::shutdown::ShutdownSignal;

use super::evaluator::evaluate;
use super::{Attempt, Checker};

/// Terminal outcome of a supervisor run
#[derive(Debug)]
pub enum Terminal {
    /// The active threshold was reached; carries the last attempt's cause
    Unhealthy { failures: u32, cause: anyhow::Error },
    /// The shutdown signal fired before any threshold was reached
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No attempt has succeeded yet
    Starting,
    /// At least one attempt has succeeded
    Steady,
}

/// Mutable per-run counters, owned by exactly one supervisor
#[derive(Debug)]
struct RunState {
    phase: Phase,
    consecutive_failures: u32,
}

impl RunState {
    fn new() -> Self {
        Self {
            phase: Phase::Starting,
            consecutive_failures: 0,
        }
    }

    fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.phase = Phase::Steady;
    }

    fn record_failure(&mut self) -> u32 {
        self.consecutive_failures += 1;
        self.consecutive_failures
    }

    /// Failure limit in effect for the current phase
    fn limit(&self, startup: u32, steady: u32) -> u32 {
        match self.phase {
            Phase::Starting => startup,
            Phase::Steady => steady,
        }
    }
}

pub struct Supervisor {
    label: String,
    spec: Probe,
    checker: Arc<dyn Checker>,
    shutdown: ShutdownSignal,
}

impl Supervisor {
    pub fn new(
        label: impl Into<String>,
        spec: Probe,
        checker: Arc<dyn Checker>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            label: label.into(),
            spec,
            checker,
            shutdown,
        }
    }

    /// Drive the probe until a terminal outcome
    pub async fn run(mut self) -> Terminal {
        let initial_delay = self.spec.initial_delay();
        if !initial_delay.is_zero() {
            select! {
                _ = sleep(initial_delay) => {}
                _ = self.shutdown.cancelled() => {
                    debug!("Probe {} cancelled during initial delay", self.label);
                    return Terminal::Cancelled;
                }
            }
        }

        let period = self.spec.period();
        let timeout = self.spec.timeout();
        let startup_limit = self.spec.startup_limit();
        let steady_limit = self.spec.failure_threshold;
        let mut state = RunState::new();

        loop {
            let attempt = select! {
                attempt = evaluate(self.checker.as_ref(), timeout) => attempt,
                _ = self.shutdown.cancelled() => {
                    debug!("Probe {} cancelled mid-attempt", self.label);
                    return Terminal::Cancelled;
                }
            };

            let cause = match attempt {
                Attempt::Success => {
                    debug!("Probe {} passed", self.label);
                    state.record_success();
                    None
                }
                Attempt::Failure(cause) => Some(cause),
                Attempt::TimedOut => Some(anyhow!("timed out after {}s", timeout.as_secs())),
            };

            if let Some(cause) = cause {
                let failures = state.record_failure();
                let limit = state.limit(startup_limit, steady_limit);
                warn!(
                    "Probe {} failed ({}/{}): {:#}",
                    self.label, failures, limit, cause
                );
                if failures >= limit {
                    return Terminal::Unhealthy { failures, cause };
                }
            }

            select! {
                _ = sleep(period) => {}
                _ = self.shutdown.cancelled() => {
                    debug!("Probe {} cancelled between attempts", self.label);
                    return Terminal::Cancelled;
                }
            }
        }
    }
}
