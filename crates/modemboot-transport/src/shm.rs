//! Shared memory window used to hand firmware and calibration data to the
//! baseband.
//!
//! The host stages both payloads in the mapped window, unmaps it, and then
//! releases the hardware semaphore. From that point the baseband owns the
//! memory: [`SharedMemoryRegion`] refuses further mapping or writes until a
//! new region is opened for the next boot cycle.

use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// Default shared memory device node.
pub const DEFAULT_DEVICE_PATH: &str = "/dev/onedram";

/// `ONEDRAM_REL_SEM`: `_IO('o', 0x22)`.
pub const ONEDRAM_REL_SEM: u32 = 0x6F22;

/// Low-level operations on a shared memory device.
pub trait ShmDevice {
    /// Mapping type returned by [`ShmDevice::map`]. Dropping it unmaps.
    type Mapping: ShmMapping;

    /// Block until a sentinel word can be read, or `timeout` passes.
    fn wait_readable(&mut self, timeout: Duration) -> Result<bool>;

    /// Block until a command word can be written, or `timeout` passes.
    fn wait_writable(&mut self, timeout: Duration) -> Result<bool>;

    /// Read one 32-bit little-endian sentinel word.
    fn read_word(&mut self) -> Result<u32>;

    /// Write one 32-bit little-endian command word.
    fn write_word(&mut self, word: u32) -> Result<()>;

    /// Map `len` bytes of the device window.
    fn map(&mut self, len: usize) -> Result<Self::Mapping>;

    /// Signal the baseband that the window is ready for consumption.
    fn release_semaphore(&mut self) -> Result<()>;
}

/// A live mapping of the shared window.
pub trait ShmMapping {
    /// Writable view of the mapped bytes.
    fn as_mut_slice(&mut self) -> &mut [u8];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ownership {
    Host,
    Baseband,
}

/// Host-side owner of the shared memory device for one boot cycle.
///
/// Holds at most one mapping at a time. Enforces that the semaphore is
/// released only after both the firmware and calibration copies completed and
/// the window was unmapped.
pub struct SharedMemoryRegion<D: ShmDevice> {
    // Declared before `device` so the window unmaps before the device closes.
    mapping: Option<D::Mapping>,
    device: D,
    window_size: usize,
    firmware_written: bool,
    calibration_written: bool,
    ownership: Ownership,
}

impl<D: ShmDevice> SharedMemoryRegion<D> {
    /// Take ownership of an opened device whose window is `window_size` bytes.
    pub fn open(device: D, window_size: usize) -> Self {
        Self {
            mapping: None,
            device,
            window_size,
            firmware_written: false,
            calibration_written: false,
            ownership: Ownership::Host,
        }
    }

    /// Wait up to `timeout` for a sentinel word from the baseband.
    ///
    /// Returns `None` when nothing arrived in time.
    pub fn read_sentinel(&mut self, timeout: Duration) -> Result<Option<u32>> {
        if !self.device.wait_readable(timeout)? {
            return Ok(None);
        }
        let word = self.device.read_word()?;
        debug!(word = format_args!("{word:#010x}"), "read shared memory sentinel");
        Ok(Some(word))
    }

    /// Send a 32-bit command word once the device accepts writes.
    ///
    /// Returns `false` when the device stayed busy for `timeout`.
    pub fn send_command(&mut self, word: u32, timeout: Duration) -> Result<bool> {
        if !self.device.wait_writable(timeout)? {
            return Ok(false);
        }
        debug!(word = format_args!("{word:#010x}"), "writing shared memory command");
        self.device.write_word(word)?;
        Ok(true)
    }

    /// Map the whole window.
    pub fn map(&mut self) -> Result<()> {
        self.ensure_host_owned("map")?;
        if self.mapping.is_some() {
            return Err(TransportError::OutOfOrder {
                operation: "map",
                reason: "window already mapped",
            });
        }
        self.mapping = Some(self.device.map(self.window_size)?);
        debug!(len = self.window_size, "mapped shared memory window");
        Ok(())
    }

    /// Copy `bytes` into the mapped window at `offset`.
    pub fn write_at(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        self.ensure_host_owned("write")?;
        let window = self.window_size;
        let mapping = self.mapping.as_mut().ok_or(TransportError::OutOfOrder {
            operation: "write",
            reason: "window not mapped",
        })?;

        let end = offset
            .checked_add(bytes.len())
            .filter(|end| *end <= window)
            .ok_or(TransportError::OutOfBounds {
                offset,
                len: bytes.len(),
                window,
            })?;

        mapping.as_mut_slice()[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Copy the firmware remainder to the start of the window.
    pub fn write_firmware(&mut self, image: &[u8]) -> Result<()> {
        self.write_at(0, image)?;
        self.firmware_written = true;
        info!(bytes = image.len(), "firmware copied to shared memory");
        Ok(())
    }

    /// Copy calibration data to `offset` within the window.
    pub fn write_calibration(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        self.write_at(offset, data)?;
        self.calibration_written = true;
        info!(bytes = data.len(), offset, "calibration copied to shared memory");
        Ok(())
    }

    /// Drop the current mapping, if any.
    pub fn unmap(&mut self) {
        if self.mapping.take().is_some() {
            debug!("unmapped shared memory window");
        }
    }

    /// Hand the window to the baseband.
    pub fn release_semaphore(&mut self) -> Result<()> {
        self.ensure_host_owned("release")?;
        if !self.firmware_written {
            return Err(TransportError::OutOfOrder {
                operation: "release",
                reason: "firmware not copied",
            });
        }
        if !self.calibration_written {
            return Err(TransportError::OutOfOrder {
                operation: "release",
                reason: "calibration not copied",
            });
        }
        if self.mapping.is_some() {
            return Err(TransportError::OutOfOrder {
                operation: "release",
                reason: "window still mapped",
            });
        }

        self.device.release_semaphore()?;
        self.ownership = Ownership::Baseband;
        info!("released shared memory semaphore to baseband");
        Ok(())
    }

    /// Whether the window has been handed to the baseband.
    pub fn is_released(&self) -> bool {
        self.ownership == Ownership::Baseband
    }

    /// Whether a mapping is live.
    pub fn is_mapped(&self) -> bool {
        self.mapping.is_some()
    }

    /// Size of the device window.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Unmap (if needed) and close the device.
    pub fn close(mut self) {
        self.unmap();
        debug!("closing shared memory device");
    }

    fn ensure_host_owned(&self, operation: &'static str) -> Result<()> {
        match self.ownership {
            Ownership::Host => Ok(()),
            Ownership::Baseband => Err(TransportError::OutOfOrder {
                operation,
                reason: "window owned by baseband",
            }),
        }
    }
}

#[cfg(target_os = "linux")]
pub use self::onedram::{MappedWindow, OnedramDevice};

#[cfg(target_os = "linux")]
mod onedram {
    use std::fs::{File, OpenOptions};
    use std::io::{Read, Write};
    use std::os::fd::AsRawFd;
    use std::path::{Path, PathBuf};
    use std::ptr::NonNull;
    use std::time::Duration;

    use tracing::info;

    use super::{ShmDevice, ShmMapping, ONEDRAM_REL_SEM};
    use crate::error::{Result, TransportError};
    use crate::sys::{cvt, poll_fd};

    /// Character device exposing the shared DRAM window.
    pub struct OnedramDevice {
        file: File,
        path: PathBuf,
    }

    impl OnedramDevice {
        /// Open the device read/write.
        pub fn open(path: impl AsRef<Path>) -> Result<Self> {
            let path = path.as_ref().to_path_buf();
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(&path)
                .map_err(|source| TransportError::Open {
                    path: path.clone(),
                    source,
                })?;
            info!(?path, "opened shared memory device");
            Ok(Self { file, path })
        }

        /// Device path.
        pub fn path(&self) -> &Path {
            &self.path
        }
    }

    impl ShmDevice for OnedramDevice {
        type Mapping = MappedWindow;

        fn wait_readable(&mut self, timeout: Duration) -> Result<bool> {
            Ok(poll_fd(self.file.as_raw_fd(), libc::POLLIN, timeout)?)
        }

        fn wait_writable(&mut self, timeout: Duration) -> Result<bool> {
            Ok(poll_fd(self.file.as_raw_fd(), libc::POLLOUT, timeout)?)
        }

        fn read_word(&mut self) -> Result<u32> {
            let mut word = [0u8; 4];
            self.file.read_exact(&mut word)?;
            Ok(u32::from_le_bytes(word))
        }

        fn write_word(&mut self, word: u32) -> Result<()> {
            self.file.write_all(&word.to_le_bytes())?;
            Ok(())
        }

        fn map(&mut self, len: usize) -> Result<MappedWindow> {
            // SAFETY: mapping a fresh region chosen by the kernel; the result is
            // checked against MAP_FAILED before use.
            let ptr = unsafe {
                libc::mmap(
                    std::ptr::null_mut(),
                    len,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_SHARED,
                    self.file.as_raw_fd(),
                    0,
                )
            };
            if ptr == libc::MAP_FAILED {
                return Err(TransportError::Map {
                    len,
                    source: std::io::Error::last_os_error(),
                });
            }
            let ptr = NonNull::new(ptr.cast::<u8>()).ok_or_else(|| TransportError::Map {
                len,
                source: std::io::Error::other("mmap returned a null mapping"),
            })?;
            Ok(MappedWindow { ptr, len })
        }

        fn release_semaphore(&mut self) -> Result<()> {
            // SAFETY: argument-less ioctl on an open descriptor.
            cvt(unsafe { libc::ioctl(self.file.as_raw_fd(), ONEDRAM_REL_SEM as _) })?;
            Ok(())
        }
    }

    impl std::fmt::Debug for OnedramDevice {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("OnedramDevice")
                .field("path", &self.path)
                .finish()
        }
    }

    /// `mmap`ed view of the shared window; unmapped on drop.
    pub struct MappedWindow {
        ptr: NonNull<u8>,
        len: usize,
    }

    impl ShmMapping for MappedWindow {
        fn as_mut_slice(&mut self) -> &mut [u8] {
            // SAFETY: `ptr` maps `len` writable bytes for as long as `self` lives.
            unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
        }
    }

    impl Drop for MappedWindow {
        fn drop(&mut self) {
            // SAFETY: `ptr`/`len` describe a mapping created by `map` and not yet unmapped.
            unsafe {
                libc::munmap(self.ptr.as_ptr().cast::<libc::c_void>(), self.len);
            }
        }
    }
}
