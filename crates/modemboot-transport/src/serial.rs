use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::mem::MaybeUninit;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::sys::{cvt, poll_fd};
use crate::traits::Transport;

/// Raw serial link to the baseband boot ROM.
///
/// Opened in raw mode (no line discipline, no echo, 8N1) at a fixed baud
/// rate. The descriptor closes when the port is dropped.
pub struct SerialPort {
    file: File,
    path: PathBuf,
}

impl SerialPort {
    /// Baud rate used by the PSI loader.
    pub const DEFAULT_BAUD: u32 = 115_200;

    /// Open `path` and configure it for raw framing at `baud`.
    pub fn open(path: impl AsRef<Path>, baud: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let speed = baud_to_speed(baud).ok_or_else(|| TransportError::Configure {
            target: path.display().to_string(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("unsupported baud rate {baud}"),
            ),
        })?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY)
            .open(&path)
            .map_err(|source| TransportError::Open {
                path: path.clone(),
                source,
            })?;

        configure_raw(file.as_raw_fd(), speed).map_err(|source| TransportError::Configure {
            target: path.display().to_string(),
            source,
        })?;

        info!(?path, baud, "opened raw serial link");
        Ok(Self { file, path })
    }

    /// Device path this port was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the port explicitly.
    pub fn close(self) {
        debug!(path = ?self.path, "closing raw serial link");
    }
}

impl Transport for SerialPort {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.file.read(buf)?)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        Ok(self.file.write(buf)?)
    }

    fn wait_readable(&mut self, timeout: Duration) -> Result<bool> {
        Ok(poll_fd(self.file.as_raw_fd(), libc::POLLIN, timeout)?)
    }

    fn wait_writable(&mut self, timeout: Duration) -> Result<bool> {
        Ok(poll_fd(self.file.as_raw_fd(), libc::POLLOUT, timeout)?)
    }

    fn transport_name(&self) -> &'static str {
        "raw-serial"
    }
}

impl std::fmt::Debug for SerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPort")
            .field("path", &self.path)
            .field("fd", &self.file.as_raw_fd())
            .finish()
    }
}

fn baud_to_speed(baud: u32) -> Option<libc::speed_t> {
    let speed = match baud {
        9_600 => libc::B9600,
        19_200 => libc::B19200,
        38_400 => libc::B38400,
        57_600 => libc::B57600,
        115_200 => libc::B115200,
        230_400 => libc::B230400,
        460_800 => libc::B460800,
        921_600 => libc::B921600,
        _ => return None,
    };
    Some(speed)
}

fn configure_raw(fd: RawFd, speed: libc::speed_t) -> std::io::Result<()> {
    let mut termios = MaybeUninit::<libc::termios>::uninit();
    // SAFETY: `fd` is an open descriptor and `termios` points to writable storage
    // that tcgetattr fully initializes on success.
    cvt(unsafe { libc::tcgetattr(fd, termios.as_mut_ptr()) })?;
    // SAFETY: tcgetattr succeeded, so the struct is initialized.
    let mut termios = unsafe { termios.assume_init() };

    // SAFETY: `termios` is a valid, initialized termios struct for all calls below.
    unsafe {
        libc::cfmakeraw(&mut termios);
        cvt(libc::cfsetispeed(&mut termios, speed))?;
        cvt(libc::cfsetospeed(&mut termios, speed))?;
        cvt(libc::tcsetattr(fd, libc::TCSANOW, &termios))?;
    }
    Ok(())
}
