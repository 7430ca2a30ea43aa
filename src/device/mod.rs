//! Watchdog device capability.
//!
//! The orchestrator only ever sees the [`Device`] trait, so the hardware-backed
//! implementation and the logging stand-in are interchangeable.

use std::io;

use tracing::info;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use linux::WatchdogDevice;

/// Handle to a hardware keep-alive timer.
///
/// `kick` resets the countdown; `close` releases the handle and is called
/// exactly once, on shutdown. Implementations are not expected to survive
/// `close`.
#[cfg_attr(test, mockall::automock)]
pub trait Device: Send {
    fn kick(&mut self) -> io::Result<()>;
    fn close(&mut self) -> io::Result<()>;
}

/// Logging stand-in for dry runs and tests. Kicks go to the log, nowhere else.
pub struct NoOpDevice {
    name: String,
}

impl NoOpDevice {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Device for NoOpDevice {
    fn kick(&mut self) -> io::Result<()> {
        info!("[wd {}] kick", self.name);
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}
