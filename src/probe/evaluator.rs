//! Single probe attempts: spawn the check command, race it against the timeout.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use tokio::process::Command;

use super::{Attempt, Checker};

/// Runs the configured command as a child process.
///
/// stdin is closed and output is discarded; only the exit status matters.
/// The child is spawned with `kill_on_drop`, so an attempt abandoned mid-run
/// (timeout or shutdown) takes its child down with it.
pub struct ExecChecker {
    command: Vec<String>,
}

impl ExecChecker {
    /// `command` is the program followed by its arguments
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

#[async_trait]
impl Checker for ExecChecker {
    async fn check(&self) -> anyhow::Result<()> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("exec probe command cannot be empty"))?;

        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .with_context(|| format!("failed to run {program}"))?;

        if status.success() {
            Ok(())
        } else {
            Err(anyhow!("{program} exited with {status}"))
        }
    }
}

/// Run one attempt of `checker`, bounded by `timeout`.
///
/// Cancellation is the caller's concern: dropping the returned future abandons
/// the attempt (and kills any child an [`ExecChecker`] spawned).
pub async fn evaluate(checker: &dyn Checker, timeout: Duration) -> Attempt {
    match tokio::time::timeout(timeout, checker.check()).await {
        Ok(Ok(())) => Attempt::Success,
        Ok(Err(cause)) => Attempt::Failure(cause),
        Err(_) => Attempt::TimedOut,
    }
}
