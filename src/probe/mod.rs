//! Health-check probes.
//!
//! A probe is an external command plus scheduling and threshold parameters.
//! Each configured probe gets one [`Supervisor`] task for the process lifetime;
//! the supervisor repeatedly runs the check and decides when persistent failure
//! has made the probe unhealthy. Individual attempt failures never leave this
//! module as errors; they only accumulate toward a threshold.

pub mod evaluator;
pub mod supervisor;

pub use evaluator::{evaluate, ExecChecker};
pub use supervisor::{Supervisor, Terminal};

/// A single health check, runnable many times.
///
/// `Ok(())` means healthy; the error carries the failure cause. Timeout
/// enforcement belongs to the caller.
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    async fn check(&self) -> anyhow::Result<()>;
}

/// Outcome of one probe attempt. Produced once per cycle, consumed immediately.
#[derive(Debug)]
pub enum Attempt {
    /// Command exited zero in time
    Success,
    /// Command failed to spawn or exited non-zero
    Failure(anyhow::Error),
    /// Command was still running when the timeout elapsed
    TimedOut,
}

impl Attempt {
    pub fn is_success(&self) -> bool {
        matches!(self, Attempt::Success)
    }
}
