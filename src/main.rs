use clap::Parser;
use std::process;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use vigil::cli::Cli;
use vigil::config::AppConfig;
use vigil::device::{Device, NoOpDevice};
use vigil::error::{Result, VigilError};
use vigil::orchestrator::{Orchestrator, ProbeTask};
use vigil::shutdown::ShutdownController;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging();

    // There is no clean exit from the long-running mode: either startup
    // failed, a probe went terminal, or shutdown was requested. The
    // surrounding infrastructure treats this process ending as "stop vouching
    // for the host".
    if let Err(e) = run(cli).await {
        error!("Exiting: {}", e);
    }
    process::exit(1);
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,vigil=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load_from(&cli.config)?;
    config
        .validate()
        .map_err(|errors| VigilError::Validation(errors.join("; ")))?;

    let device = open_device(&config, cli.dry_run)?;
    let tasks = ProbeTask::from_config(&config.probes)?;

    info!(
        "Watching {} probes, kicking {} every {}s",
        tasks.len(),
        if cli.dry_run {
            "dry-run device"
        } else {
            config.watchdog.device.as_str()
        },
        config.watchdog.interval_seconds
    );

    let shutdown = ShutdownController::new();
    spawn_signal_listener(shutdown.clone());

    let orchestrator = Orchestrator::new(device, config.watchdog.interval(), shutdown);
    orchestrator.run(tasks).await
}

fn open_device(config: &AppConfig, dry_run: bool) -> Result<Box<dyn Device>> {
    if dry_run {
        return Ok(Box::new(NoOpDevice::new("dry-run")));
    }

    #[cfg(target_os = "linux")]
    {
        ensure_device_node(&config.watchdog.device)?;
        let device = vigil::device::WatchdogDevice::open(&config.watchdog.device)?;
        Ok(Box::new(device))
    }

    #[cfg(not(target_os = "linux"))]
    {
        Err(VigilError::Validation(
            "hardware watchdog support requires Linux; use --dry-run elsewhere".to_string(),
        ))
    }
}

#[cfg(target_os = "linux")]
fn ensure_device_node(path: &str) -> Result<()> {
    use std::os::unix::fs::FileTypeExt;

    let file_type = std::fs::metadata(path)?.file_type();
    if !file_type.is_char_device() && !file_type.is_block_device() {
        return Err(VigilError::NotADevice(path.to_string()));
    }
    Ok(())
}

fn spawn_signal_listener(shutdown: ShutdownController) {
    tokio::spawn(async move {
        let terminate = async {
            #[cfg(unix)]
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    warn!("Couldn't install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
            #[cfg(not(unix))]
            std::future::pending::<()>().await;
        };

        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
            }
            _ = terminate => {
                info!("Received SIGTERM, shutting down");
            }
        }
        shutdown.trigger();
    });
}
