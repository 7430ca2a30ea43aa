//! Kick-loop orchestration.
//!
//! Runs every probe supervisor concurrently and kicks the watchdog device on a
//! fixed interval until the first supervisor turns terminal or shutdown is
//! requested. Stopping the kicks is the entire mechanism: no reboot is ever
//! issued from here, the hardware timer is simply allowed to run out.

use std::sync::Arc;
use std::time::Duration;

use tokio::select;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::config::Probe;
use crate::device::Device;
use crate::error::{Result, VigilError};
use crate::probe::{Checker, ExecChecker, Supervisor, Terminal};
use crate::shutdown::ShutdownController;

/// One probe ready to be supervised
pub struct ProbeTask {
    pub label: String,
    pub spec: Probe,
    pub checker: Arc<dyn Checker>,
}

impl std::fmt::Debug for ProbeTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeTask")
            .field("label", &self.label)
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

impl ProbeTask {
    /// Build exec-backed tasks from validated configuration
    pub fn from_config(probes: &[Probe]) -> Result<Vec<ProbeTask>> {
        probes
            .iter()
            .enumerate()
            .map(|(idx, spec)| {
                let command = spec
                    .exec
                    .as_ref()
                    .map(|exec| exec.command.as_slice())
                    .filter(|command| !command.is_empty())
                    .ok_or_else(|| {
                        VigilError::Validation(format!("probes[{idx}] has no exec command"))
                    })?;

                Ok(ProbeTask {
                    label: format!("{}[{idx}]", command[0]),
                    spec: spec.clone(),
                    checker: Arc::new(ExecChecker::new(command.to_vec())),
                })
            })
            .collect()
    }
}

struct Report {
    label: String,
    terminal: Terminal,
}

pub struct Orchestrator {
    device: Box<dyn Device>,
    interval: Duration,
    shutdown: ShutdownController,
}

impl Orchestrator {
    pub fn new(
        device: Box<dyn Device>,
        interval: Duration,
        shutdown: ShutdownController,
    ) -> Self {
        Self {
            device,
            interval,
            shutdown,
        }
    }

    /// Run until a probe turns terminal or shutdown is requested.
    ///
    /// Never returns `Ok`: whatever ended the kick loop comes back as the
    /// error. The device is closed exactly once on every path, and no kick is
    /// issued after the loop has decided to stop.
    pub async fn run(mut self, probes: Vec<ProbeTask>) -> Result<()> {
        let (report_tx, mut report_rx) = mpsc::channel::<Report>(probes.len().max(1));

        for task in probes {
            let tx = report_tx.clone();
            let label = task.label.clone();
            let supervisor = Supervisor::new(
                task.label,
                task.spec,
                task.checker,
                self.shutdown.subscribe(),
            );
            tokio::spawn(async move {
                let terminal = supervisor.run().await;
                let _ = tx.send(Report { label, terminal }).await;
            });
        }
        drop(report_tx);

        let mut signal = self.shutdown.subscribe();
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let err = loop {
            select! {
                // Terminal reports and shutdown take priority over a due kick.
                biased;

                report = report_rx.recv() => {
                    match report {
                        Some(Report { label, terminal: Terminal::Unhealthy { failures, cause } }) => {
                            error!(
                                "Probe {} unhealthy after {} consecutive failures: {:#}",
                                label, failures, cause
                            );
                            break VigilError::ProbeUnhealthy { probe: label, failures, cause };
                        }
                        Some(Report { label, terminal: Terminal::Cancelled }) => {
                            error!("Probe {} cancelled", label);
                            break VigilError::ProbeCancelled { probe: label };
                        }
                        None => {
                            break VigilError::Internal(
                                "all probe supervisors stopped without reporting".to_string(),
                            );
                        }
                    }
                }
                _ = signal.cancelled() => {
                    info!("Shutdown requested, stopping watchdog kicks");
                    break VigilError::Shutdown;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.device.kick() {
                        warn!("Error kicking watchdog, ignoring: {}", e);
                    }
                }
            }
        };

        // Abandon the remaining supervisors; they observe the signal and stop
        // on their own. Nobody waits for them.
        self.shutdown.trigger();

        if let Err(e) = self.device.close() {
            warn!("Error closing watchdog device: {}", e);
        }

        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MockDevice;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    struct StaticChecker {
        healthy: bool,
    }

    #[async_trait]
    impl Checker for StaticChecker {
        async fn check(&self) -> anyhow::Result<()> {
            if self.healthy {
                Ok(())
            } else {
                Err(anyhow::anyhow!("probe failed"))
            }
        }
    }

    fn probe_task(label: &str, healthy: bool, period: u64, failure_threshold: u32) -> ProbeTask {
        ProbeTask {
            label: label.to_string(),
            spec: Probe {
                exec: None,
                failure_threshold,
                startup_threshold: None,
                initial_delay_seconds: 0,
                period_seconds: period,
                timeout_seconds: 1,
            },
            checker: Arc::new(StaticChecker { healthy }),
        }
    }

    fn closing_device() -> MockDevice {
        let mut device = MockDevice::new();
        device.expect_close().times(1).returning(|| Ok(()));
        device
    }

    #[tokio::test(start_paused = true)]
    async fn failing_probe_ends_the_run() {
        let mut device = closing_device();
        device.expect_kick().returning(|| Ok(()));

        let orchestrator = Orchestrator::new(
            Box::new(device),
            Duration::from_secs(1),
            ShutdownController::new(),
        );
        let err = orchestrator
            .run(vec![probe_task("bad", false, 1, 1)])
            .await
            .expect_err("run never succeeds");

        match err {
            VigilError::ProbeUnhealthy { probe, failures, .. } => {
                assert_eq!(probe, "bad");
                assert_eq!(failures, 1);
            }
            other => panic!("expected ProbeUnhealthy, got {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_terminal_report_wins() {
        let mut device = closing_device();
        device.expect_kick().returning(|| Ok(()));

        let orchestrator = Orchestrator::new(
            Box::new(device),
            Duration::from_secs(1),
            ShutdownController::new(),
        );
        // The probe with the lower threshold turns terminal first; the healthy
        // one is abandoned, not awaited.
        let err = orchestrator
            .run(vec![
                probe_task("healthy", true, 1, 1),
                probe_task("flaky", false, 1, 2),
            ])
            .await
            .expect_err("run never succeeds");

        assert!(matches!(
            err,
            VigilError::ProbeUnhealthy { probe, .. } if probe == "flaky"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_signal_ends_the_run() {
        let mut device = closing_device();
        device.expect_kick().times(4).returning(|| Ok(()));

        let shutdown = ShutdownController::new();
        let orchestrator = Orchestrator::new(
            Box::new(device),
            Duration::from_secs(1),
            shutdown.clone(),
        );

        let handle = tokio::spawn(orchestrator.run(vec![probe_task("healthy", true, 1, 1)]));
        sleep(Duration::from_millis(4500)).await;
        shutdown.trigger();

        let err = handle.await.expect("join").expect_err("run never succeeds");
        assert!(matches!(err, VigilError::Shutdown));
    }

    #[tokio::test(start_paused = true)]
    async fn kick_failures_are_ignored() {
        let kicks = Arc::new(AtomicUsize::new(0));
        let kicks_seen = kicks.clone();

        let mut device = closing_device();
        device.expect_kick().returning(move || {
            kicks.fetch_add(1, Ordering::SeqCst);
            Err(std::io::Error::new(std::io::ErrorKind::Other, "EINVAL"))
        });

        let shutdown = ShutdownController::new();
        let orchestrator = Orchestrator::new(
            Box::new(device),
            Duration::from_secs(1),
            shutdown.clone(),
        );

        let handle = tokio::spawn(orchestrator.run(vec![probe_task("healthy", true, 1, 1)]));
        sleep(Duration::from_millis(2500)).await;
        shutdown.trigger();

        let err = handle.await.expect("join").expect_err("run never succeeds");
        // Kick errors never end the loop; only the shutdown signal did.
        assert!(matches!(err, VigilError::Shutdown));
        assert_eq!(kicks_seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn no_kick_after_terminal_outcome() {
        let mut device = closing_device();
        device.expect_kick().times(0);

        let orchestrator = Orchestrator::new(
            Box::new(device),
            Duration::from_secs(1),
            ShutdownController::new(),
        );
        // The probe fails instantly, before the first kick is due.
        let err = orchestrator
            .run(vec![probe_task("bad", false, 1, 1)])
            .await
            .expect_err("run never succeeds");

        assert!(matches!(err, VigilError::ProbeUnhealthy { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn close_failure_is_swallowed() {
        let mut device = MockDevice::new();
        device.expect_kick().returning(|| Ok(()));
        device.expect_close().times(1).returning(|| {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "EBADF"))
        });

        let orchestrator = Orchestrator::new(
            Box::new(device),
            Duration::from_secs(1),
            ShutdownController::new(),
        );
        let err = orchestrator
            .run(vec![probe_task("bad", false, 1, 1)])
            .await
            .expect_err("run never succeeds");

        // The terminal cause survives even when close fails.
        assert!(matches!(err, VigilError::ProbeUnhealthy { .. }));
    }

    #[test]
    fn from_config_labels_probes_by_command() {
        let probes = vec![Probe {
            exec: Some(crate::config::ExecProbe {
                command: vec!["/usr/bin/check-db".to_string(), "--fast".to_string()],
            }),
            failure_threshold: 3,
            startup_threshold: None,
            initial_delay_seconds: 0,
            period_seconds: 10,
            timeout_seconds: 1,
        }];

        let tasks = ProbeTask::from_config(&probes).expect("build");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].label, "/usr/bin/check-db[0]");
    }

    #[test]
    fn from_config_rejects_missing_exec() {
        let probes = vec![Probe {
            exec: None,
            failure_threshold: 3,
            startup_threshold: None,
            initial_delay_seconds: 0,
            period_seconds: 10,
            timeout_seconds: 1,
        }];

        let err = ProbeTask::from_config(&probes).expect_err("must fail");
        assert!(matches!(err, VigilError::Validation(_)));
    }
}
