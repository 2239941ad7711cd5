//! Thin helpers over raw libc calls shared by the device bindings.

use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

/// Convert a libc return code into an `io::Result`.
pub(crate) fn cvt(rc: libc::c_int) -> io::Result<libc::c_int> {
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc)
    }
}

/// Same as [`cvt`] for calls returning `ssize_t`.
pub(crate) fn cvt_size(rc: libc::ssize_t) -> io::Result<usize> {
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc as usize)
    }
}

/// Wait for `events` on `fd` for at most `timeout`.
///
/// Returns `false` when the timeout expires first.
pub(crate) fn poll_fd(fd: RawFd, events: libc::c_short, timeout: Duration) -> io::Result<bool> {
    let millis = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
    let mut pfd = libc::pollfd {
        fd,
        events,
        revents: 0,
    };

    loop {
        // SAFETY: `pfd` is a valid, writable pollfd and we pass a count of 1.
        let rc = unsafe { libc::poll(&mut pfd, 1, millis) };
        match cvt(rc) {
            Ok(0) => return Ok(false),
            Ok(_) => return Ok(true),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
}

/// Copy an interface name into a NUL-terminated `IFNAMSIZ` buffer.
///
/// Returns `None` when the name (plus terminator) does not fit.
pub(crate) fn ifname(name: &str) -> Option<[libc::c_char; libc::IFNAMSIZ]> {
    let bytes = name.as_bytes();
    if bytes.len() >= libc::IFNAMSIZ || bytes.contains(&0) {
        return None;
    }
    let mut out = [0 as libc::c_char; libc::IFNAMSIZ];
    for (dst, src) in out.iter_mut().zip(bytes) {
        *dst = *src as libc::c_char;
    }
    Some(out)
}

/// `struct ifreq` restricted to the members we touch.
#[repr(C)]
pub(crate) struct IfReq {
    pub name: [libc::c_char; libc::IFNAMSIZ],
    pub data: IfReqData,
}

#[repr(C)]
pub(crate) union IfReqData {
    pub flags: libc::c_short,
    pub ifindex: libc::c_int,
    // Matches the size of the kernel's ifr_ifru union.
    _pad: [u8; 24],
}

impl IfReq {
    pub(crate) fn new(name: [libc::c_char; libc::IFNAMSIZ]) -> Self {
        Self {
            name,
            data: IfReqData { _pad: [0; 24] },
        }
    }
}
