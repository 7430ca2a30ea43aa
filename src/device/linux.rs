//! Linux `/dev/watchdog` implementation.
//!
//! Talks to the kernel watchdog API directly: `WDIOC_GETSUPPORT` to read the
//! driver identity on open, `WDIOC_KEEPALIVE` to reset the countdown. Closing
//! the file descriptor does not write the magic-close character, so the timer
//! stays armed after this process exits.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsRawFd, IntoRawFd};
use std::path::Path;

use nix::libc::c_int;
use tracing::info;

use super::Device;

const WATCHDOG_IOCTL_BASE: u8 = b'W';

/// Mirror of the kernel's `struct watchdog_info`
#[repr(C)]
#[derive(Default)]
struct WatchdogInfo {
    options: u32,
    firmware_version: u32,
    identity: [u8; 32],
}

nix::ioctl_read!(wdioc_getsupport, WATCHDOG_IOCTL_BASE, 0, WatchdogInfo);
nix::ioctl_read!(wdioc_keepalive, WATCHDOG_IOCTL_BASE, 5, c_int);

pub struct WatchdogDevice {
    file: Option<File>,
}

impl WatchdogDevice {
    /// Open the device node and log the identity the driver reports
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new().write(true).open(path.as_ref())?;

        let mut wd_info = WatchdogInfo::default();
        // SAFETY: the fd is open and owned; the kernel fills `wd_info` in place.
        unsafe { wdioc_getsupport(file.as_raw_fd(), &mut wd_info) }
            .map_err(io::Error::from)?;

        let end = wd_info
            .identity
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(wd_info.identity.len());
        let identity = String::from_utf8_lossy(&wd_info.identity[..end]);
        info!("Watchdog identity: {}", identity);

        Ok(Self { file: Some(file) })
    }

    fn fd(&self) -> io::Result<c_int> {
        self.file
            .as_ref()
            .map(|file| file.as_raw_fd())
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "watchdog device already closed"))
    }
}

impl Device for WatchdogDevice {
    fn kick(&mut self) -> io::Result<()> {
        let fd = self.fd()?;
        let mut dummy: c_int = 0;
        // SAFETY: the fd is open and owned; KEEPALIVE only writes the dummy int.
        unsafe { wdioc_keepalive(fd, &mut dummy) }.map_err(io::Error::from)?;
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        if let Some(file) = self.file.take() {
            nix::unistd::close(file.into_raw_fd()).map_err(io::Error::from)?;
        }
        Ok(())
    }
}
