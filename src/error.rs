use thiserror::Error;

/// Main error type for the watchdog keeper
#[derive(Error, Debug)]
pub enum VigilError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Validation(String),

    // Watchdog device errors
    #[error("Watchdog device error: {0}")]
    Device(#[from] std::io::Error),

    #[error("Watchdog device path is not a device node: {0}")]
    NotADevice(String),

    // Supervisor-terminal errors
    #[error("Probe {probe} unhealthy after {failures} consecutive failures: {cause:#}")]
    ProbeUnhealthy {
        probe: String,
        failures: u32,
        cause: anyhow::Error,
    },

    #[error("Probe {probe} cancelled before reaching a verdict")]
    ProbeCancelled { probe: String },

    // Shutdown
    #[error("Shutdown requested")]
    Shutdown,

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, VigilError>;
