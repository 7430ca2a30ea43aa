use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
///
/// The on-disk format is a YAML file with k8s-style camelCase keys: a
/// `watchdog` section naming the device and kick interval, and a non-empty
/// `probes` list. Everything downstream of [`AppConfig::validate`] assumes
/// well-formed values.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub watchdog: WatchdogConfig,
    #[serde(default)]
    pub probes: Vec<Probe>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchdogConfig {
    /// Path to the watchdog device node
    #[serde(default = "default_device")]
    pub device: String,
    /// Seconds between keep-alive kicks; must stay well below the hardware timeout
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            interval_seconds: default_interval_seconds(),
        }
    }
}

impl WatchdogConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

fn default_device() -> String {
    "/dev/watchdog".to_string()
}

fn default_interval_seconds() -> u64 {
    1
}

/// One health-check probe. Mirrors the probe shape of k8s core/v1.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Probe {
    /// Command to execute; the probe passes when it exits zero
    pub exec: Option<ExecProbe>,

    /// Consecutive failures after the first success that make the probe unhealthy
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Consecutive failures tolerated before the first success.
    /// Defaults to `failureThreshold` when unset.
    #[serde(default)]
    pub startup_threshold: Option<u32>,
    /// Seconds to wait before the first attempt
    #[serde(default)]
    pub initial_delay_seconds: u64,
    /// Seconds between attempts
    #[serde(default = "default_period_seconds")]
    pub period_seconds: u64,
    /// Seconds a single attempt may run before it counts as failed
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecProbe {
    pub command: Vec<String>,
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_period_seconds() -> u64 {
    10
}

fn default_timeout_seconds() -> u64 {
    1
}

impl Probe {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_seconds)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_seconds)
    }

    /// Failure limit in effect before the first success
    pub fn startup_limit(&self) -> u32 {
        self.startup_threshold.unwrap_or(self.failure_threshold)
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let builder = Config::builder().add_source(
            File::from(path.as_ref().to_path_buf()).format(FileFormat::Yaml),
        );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.watchdog.device.is_empty() {
            errors.push("watchdog.device must not be empty".to_string());
        }
        if self.watchdog.interval_seconds < 1 {
            errors.push("watchdog.intervalSeconds must be at least 1".to_string());
        }

        if self.probes.is_empty() {
            errors.push("at least one probe is required".to_string());
        }
        for (idx, probe) in self.probes.iter().enumerate() {
            match &probe.exec {
                None => errors.push(format!("probes[{idx}] needs an exec action")),
                Some(exec) if exec.command.is_empty() => {
                    errors.push(format!("probes[{idx}].exec.command must not be empty"));
                }
                Some(_) => {}
            }
            if probe.failure_threshold < 1 {
                errors.push(format!("probes[{idx}].failureThreshold must be at least 1"));
            }
            if matches!(probe.startup_threshold, Some(0)) {
                errors.push(format!("probes[{idx}].startupThreshold must be at least 1"));
            }
            if probe.period_seconds < 1 {
                errors.push(format!("probes[{idx}].periodSeconds must be at least 1"));
            }
            if probe.timeout_seconds < 1 {
                errors.push(format!("probes[{idx}].timeoutSeconds must be at least 1"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
