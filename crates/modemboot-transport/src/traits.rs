use std::time::Duration;

use crate::error::Result;

/// A blocking byte transport to the baseband.
///
/// Implemented by the raw serial link used during PSI loading, by the
/// addressed Phonet channels used once the baseband is up, and by
/// [`MockTransport`](crate::mock::MockTransport) for protocol tests.
///
/// Transports never retry. Opening happens in each binding's constructor and
/// closing happens on drop.
pub trait Transport {
    /// Read up to `buf.len()` bytes. Returns `0` when the peer closed the link.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write `buf`, returning how many bytes the link accepted.
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Block until a read would not block, or `timeout` passes.
    ///
    /// Returns `false` on timeout.
    fn wait_readable(&mut self, timeout: Duration) -> Result<bool>;

    /// Block until a write would not block, or `timeout` passes.
    ///
    /// Returns `false` on timeout.
    fn wait_writable(&mut self, timeout: Duration) -> Result<bool>;

    /// Transport name for diagnostics.
    fn transport_name(&self) -> &'static str;
}

/// Modem class power control file.
pub const DEFAULT_POWER_CONTROL_PATH: &str = "/sys/class/modemctl/xmm/control";

/// Modem class power status file.
pub const DEFAULT_POWER_STATUS_PATH: &str = "/sys/class/modemctl/xmm/status";

/// Baseband power switch.
///
/// Both commands are idempotent: they do nothing when the status indicator
/// already reports the requested state.
pub trait PowerControl {
    /// Whether the baseband currently reports itself powered.
    fn is_enabled(&mut self) -> Result<bool>;

    /// Power the baseband on.
    fn power_on(&mut self) -> Result<()>;

    /// Power the baseband off.
    fn power_off(&mut self) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        (**self).write(buf)
    }

    fn wait_readable(&mut self, timeout: Duration) -> Result<bool> {
        (**self).wait_readable(timeout)
    }

    fn wait_writable(&mut self, timeout: Duration) -> Result<bool> {
        (**self).wait_writable(timeout)
    }

    fn transport_name(&self) -> &'static str {
        (**self).transport_name()
    }
}
