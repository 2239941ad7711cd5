use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::sys::{cvt, ifname, IfReq};

/// Administrative control over the interface carrying the baseband channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetInterface {
    name: String,
}

impl NetInterface {
    /// Refer to interface `name`. Nothing is opened until a query is made.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Interface name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `IFF_UP` is currently set.
    pub fn is_up(&self) -> Result<bool> {
        let flags = self.flags()?;
        Ok(flags & libc::IFF_UP as libc::c_short != 0)
    }

    /// Set `IFF_UP`. Does nothing when the interface is already up.
    pub fn set_up(&self) -> Result<()> {
        self.update_flags(|flags| flags | libc::IFF_UP as libc::c_short)
    }

    /// Clear `IFF_UP`. Does nothing when the interface is already down.
    pub fn set_down(&self) -> Result<()> {
        self.update_flags(|flags| flags & !(libc::IFF_UP as libc::c_short))
    }

    fn flags(&self) -> Result<libc::c_short> {
        let mut req = self.request()?;
        let socket = self.control_socket()?;
        // SAFETY: `req` is a properly sized ifreq and `socket` is an open descriptor.
        cvt(unsafe { libc::ioctl(socket.as_raw_fd(), libc::SIOCGIFFLAGS as _, &mut req as *mut IfReq) })
            .map_err(|source| self.error(source))?;
        // SAFETY: SIOCGIFFLAGS filled the flags member of the union.
        Ok(unsafe { req.data.flags })
    }

    fn update_flags(&self, update: impl FnOnce(libc::c_short) -> libc::c_short) -> Result<()> {
        let mut req = self.request()?;
        let socket = self.control_socket()?;
        // SAFETY: `req` is a properly sized ifreq and `socket` is an open descriptor.
        cvt(unsafe { libc::ioctl(socket.as_raw_fd(), libc::SIOCGIFFLAGS as _, &mut req as *mut IfReq) })
            .map_err(|source| self.error(source))?;

        // SAFETY: SIOCGIFFLAGS filled the flags member of the union.
        let current = unsafe { req.data.flags };
        let wanted = update(current);
        if wanted == current {
            debug!(interface = %self.name, "interface flags already in requested state");
            return Ok(());
        }

        req.data.flags = wanted;
        // SAFETY: same request buffer, now carrying the updated flags.
        cvt(unsafe { libc::ioctl(socket.as_raw_fd(), libc::SIOCSIFFLAGS as _, &req as *const IfReq) })
            .map_err(|source| self.error(source))?;
        debug!(interface = %self.name, up = wanted & libc::IFF_UP as libc::c_short != 0, "updated interface flags");
        Ok(())
    }

    fn request(&self) -> Result<IfReq> {
        let name = ifname(&self.name).ok_or_else(|| TransportError::InterfaceNameTooLong {
            name: self.name.clone(),
            len: self.name.len(),
            max: libc::IFNAMSIZ - 1,
        })?;
        Ok(IfReq::new(name))
    }

    fn control_socket(&self) -> Result<OwnedFd> {
        // SAFETY: plain socket(2) call; the result is checked before use.
        let fd = cvt(unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM | libc::SOCK_CLOEXEC, 0) })
            .map_err(|source| self.error(source))?;
        // SAFETY: `fd` was just returned by socket(2) and is owned by nobody else.
        Ok(unsafe { OwnedFd::from_raw_fd(fd) })
    }

    fn error(&self, source: std::io::Error) -> TransportError {
        TransportError::Interface {
            name: self.name.clone(),
            source,
        }
    }
}
