use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::time::Duration;

use tracing::{debug, info};

use crate::channel::{ChannelConfig, ChannelKind};
use crate::error::{Result, TransportError};
use crate::netif::NetInterface;
use crate::sys::{cvt, cvt_size, ifname, poll_fd, IfReq};
use crate::traits::Transport;

/// Linux address family for Phonet sockets.
pub const AF_PHONET: libc::c_int = 35;

/// Socket option carrying [`ChannelConfig::rfs_magic`] on RFS endpoints.
pub const SO_RFSMAGIC: libc::c_int = 0x21;

/// `struct sockaddr_pn` from `<linux/phonet.h>`.
#[repr(C, packed)]
#[derive(Clone, Copy)]
struct SockaddrPn {
    spn_family: libc::sa_family_t,
    spn_obj: u8,
    spn_dev: u8,
    spn_resource: u8,
    spn_zero: [u8; 11],
}

/// Addressed datagram endpoint for one logical baseband channel.
///
/// One instance per channel; endpoints are not shared between FMT and RFS.
/// Dropping the channel closes the socket but leaves the interface up.
pub struct PhonetChannel {
    fd: OwnedFd,
    addr: SockaddrPn,
    kind: ChannelKind,
    interface: String,
    ifindex: libc::c_int,
}

impl PhonetChannel {
    /// Open and bind the endpoint for `kind`.
    ///
    /// Also brings the shared interface up; repeated opens leave it up.
    pub fn open(kind: ChannelKind, config: &ChannelConfig) -> Result<Self> {
        let fail = |stage: &'static str| {
            let interface = config.interface.clone();
            move |source: std::io::Error| TransportError::Channel {
                channel: kind,
                interface,
                stage,
                source,
            }
        };

        let name = ifname(&config.interface).ok_or_else(|| TransportError::InterfaceNameTooLong {
            name: config.interface.clone(),
            len: config.interface.len(),
            max: libc::IFNAMSIZ - 1,
        })?;

        let addr = SockaddrPn {
            spn_family: AF_PHONET as libc::sa_family_t,
            spn_obj: 0,
            spn_dev: config.device,
            spn_resource: config.resource(kind),
            spn_zero: [0; 11],
        };

        // SAFETY: plain socket(2) call; the result is checked before use.
        let raw = cvt(unsafe { libc::socket(AF_PHONET, libc::SOCK_DGRAM | libc::SOCK_CLOEXEC, 0) })
            .map_err(fail("socket"))?;
        // SAFETY: `raw` was just returned by socket(2) and is owned by nobody else.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        // SAFETY: `name` is IFNAMSIZ bytes long and outlives the call.
        cvt(unsafe {
            libc::setsockopt(
                fd.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_BINDTODEVICE,
                name.as_ptr().cast::<libc::c_void>(),
                libc::IFNAMSIZ as libc::socklen_t,
            )
        })
        .map_err(fail("bind to device"))?;

        let mut req = IfReq::new(name);
        // SAFETY: `req` is a properly sized ifreq and `fd` is open.
        cvt(unsafe { libc::ioctl(fd.as_raw_fd(), libc::SIOCGIFINDEX as _, &mut req as *mut IfReq) })
            .map_err(fail("interface index"))?;
        // SAFETY: SIOCGIFINDEX filled the ifindex member of the union.
        let ifindex = unsafe { req.data.ifindex };

        set_int_option(&fd, libc::SO_REUSEADDR, 1).map_err(fail("address reuse"))?;

        // SAFETY: `addr` is a valid sockaddr_pn and the length matches its size.
        cvt(unsafe {
            libc::bind(
                fd.as_raw_fd(),
                (&addr as *const SockaddrPn).cast::<libc::sockaddr>(),
                std::mem::size_of::<SockaddrPn>() as libc::socklen_t,
            )
        })
        .map_err(fail("bind"))?;

        if kind == ChannelKind::Rfs {
            set_int_option(&fd, SO_RFSMAGIC, config.rfs_magic as libc::c_int)
                .map_err(fail("rfs magic"))?;
        }

        NetInterface::new(config.interface.clone()).set_up()?;

        info!(
            channel = %kind,
            interface = %config.interface,
            ifindex,
            resource = config.resource(kind),
            "opened baseband channel"
        );

        Ok(Self {
            fd,
            addr,
            kind,
            interface: config.interface.clone(),
            ifindex,
        })
    }

    /// Logical channel this endpoint serves.
    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// Interface the endpoint is bound to.
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Kernel index of the bound interface.
    pub fn ifindex(&self) -> i32 {
        self.ifindex
    }

    /// Release the endpoint. The interface stays up.
    pub fn close(self) {
        debug!(channel = %self.kind, "closing baseband channel");
    }
}

impl Transport for PhonetChannel {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut addr_len = std::mem::size_of::<SockaddrPn>() as libc::socklen_t;
        // SAFETY: `buf` is writable for its length; `self.addr` is a writable
        // sockaddr_pn and `addr_len` holds its size.
        let read = cvt_size(unsafe {
            libc::recvfrom(
                self.fd.as_raw_fd(),
                buf.as_mut_ptr().cast::<libc::c_void>(),
                buf.len(),
                0,
                (&mut self.addr as *mut SockaddrPn).cast::<libc::sockaddr>(),
                &mut addr_len,
            )
        })?;
        Ok(read)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        // SAFETY: `buf` is readable for its length; `self.addr` is a valid sockaddr_pn.
        let written = cvt_size(unsafe {
            libc::sendto(
                self.fd.as_raw_fd(),
                buf.as_ptr().cast::<libc::c_void>(),
                buf.len(),
                0,
                (&self.addr as *const SockaddrPn).cast::<libc::sockaddr>(),
                std::mem::size_of::<SockaddrPn>() as libc::socklen_t,
            )
        })?;
        Ok(written)
    }

    fn wait_readable(&mut self, timeout: Duration) -> Result<bool> {
        Ok(poll_fd(self.fd.as_raw_fd(), libc::POLLIN, timeout)?)
    }

    fn wait_writable(&mut self, timeout: Duration) -> Result<bool> {
        Ok(poll_fd(self.fd.as_raw_fd(), libc::POLLOUT, timeout)?)
    }

    fn transport_name(&self) -> &'static str {
        "phonet-datagram"
    }
}

impl std::fmt::Debug for PhonetChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhonetChannel")
            .field("kind", &self.kind)
            .field("interface", &self.interface)
            .field("ifindex", &self.ifindex)
            .field("fd", &self.fd.as_raw_fd())
            .finish()
    }
}

fn set_int_option(fd: &OwnedFd, option: libc::c_int, value: libc::c_int) -> std::io::Result<()> {
    // SAFETY: `value` is a live c_int and the length matches its size.
    cvt(unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            libc::SOL_SOCKET,
            option,
            (&value as *const libc::c_int).cast::<libc::c_void>(),
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    })?;
    Ok(())
}
