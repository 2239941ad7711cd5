//! Serial side of the bootstrap: wake the bootcore and upload the PSI.
//!
//! Upload layout on the wire:
//! ```text
//! ┌───────┬──────────────┬──────────────────────────┬──────────┐
//! │ magic │ length       │ image[..length]          │ checksum │
//! │ (1B)  │ (2B LE)      │ one byte per write       │ (1B XOR) │
//! └───────┴──────────────┴──────────────────────────┴──────────┘
//! ```
//! Every byte moved is gated on a readiness wait; a wait that times out
//! aborts the attempt.

use std::time::Duration;

use modemboot_transport::Transport;
use tracing::{debug, info, warn};

use crate::config::{BootTiming, PsiProtocol};
use crate::error::HandshakeFailure;

type Step<T> = std::result::Result<T, HandshakeFailure>;

/// XOR of every byte in `data`.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, byte| acc ^ byte)
}

/// Drives the PSI loader protocol over a raw serial transport.
pub struct PsiLoader<'a, T: Transport> {
    link: &'a mut T,
    protocol: &'a PsiProtocol,
    timing: &'a BootTiming,
}

impl<'a, T: Transport> PsiLoader<'a, T> {
    pub fn new(link: &'a mut T, protocol: &'a PsiProtocol, timing: &'a BootTiming) -> Self {
        Self {
            link,
            protocol,
            timing,
        }
    }

    /// Send the wake pattern, then read and check the bootcore version and
    /// consume the info-size byte.
    ///
    /// Returns the info-size byte.
    pub fn handshake(&mut self, sleep: &mut dyn FnMut(Duration)) -> Step<u8> {
        self.wake(sleep)?;
        self.read_version()?;
        let info_size = self.read_byte("info size")?;
        debug!(info_size = format_args!("{info_size:#04x}"), "bootcore info size");
        Ok(info_size)
    }

    /// Write the wake pattern the configured number of times.
    pub fn wake(&mut self, sleep: &mut dyn FnMut(Duration)) -> Step<()> {
        let pattern = self.protocol.wake_pattern.as_bytes();
        let interval = self.timing.wake_interval();
        for _ in 0..self.timing.wake_attempts {
            self.write_all("wake pattern", pattern)?;
            sleep(interval);
        }
        sleep(interval);
        debug!(attempts = self.timing.wake_attempts, "wake pattern sent");
        Ok(())
    }

    /// Read the bootcore version byte and reject unexpected values.
    pub fn read_version(&mut self) -> Step<u8> {
        let version = self.read_byte("bootcore version")?;
        if version != self.protocol.bootcore_version {
            warn!(
                got = format_args!("{version:#04x}"),
                expected = format_args!("{:#04x}", self.protocol.bootcore_version),
                "unexpected bootcore version"
            );
            return Err(HandshakeFailure::BadVersion {
                expected: self.protocol.bootcore_version,
                got: version,
            });
        }
        info!(version = format_args!("{version:#04x}"), "bootcore answered");
        Ok(version)
    }

    /// Stream the PSI: magic, little-endian length, payload, checksum.
    ///
    /// Returns the checksum byte that was sent.
    pub fn send_image(&mut self, psi: &[u8]) -> Step<u8> {
        let len = u16::try_from(psi.len()).map_err(|_| HandshakeFailure::Io {
            step: "PSI length",
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("PSI of {} bytes exceeds the 16-bit length field", psi.len()),
            )
            .into(),
        })?;

        self.write_byte("PSI magic", self.protocol.psi_magic)?;
        for byte in len.to_le_bytes() {
            self.write_byte("PSI length", byte)?;
        }

        let mut crc = 0u8;
        for &byte in psi {
            self.write_byte("PSI data", byte)?;
            crc ^= byte;
        }
        self.write_byte("PSI checksum", crc)?;

        info!(bytes = psi.len(), checksum = format_args!("{crc:#04x}"), "PSI sent");
        Ok(crc)
    }

    /// Poll for the acknowledgement byte, bounded by the configured read count.
    pub fn await_ack(&mut self) -> Step<()> {
        let limit = self.timing.ack_poll_limit;
        for read in 1..=limit {
            let byte = self.read_byte("PSI acknowledgement")?;
            if byte == self.protocol.ack {
                debug!(reads = read, "PSI acknowledged");
                return Ok(());
            }
        }
        warn!(reads = limit, "PSI acknowledgement not observed");
        Err(HandshakeFailure::AckNotObserved { reads: limit })
    }

    fn read_byte(&mut self, step: &'static str) -> Step<u8> {
        let ready = self
            .link
            .wait_readable(self.timing.ready_timeout())
            .map_err(HandshakeFailure::io(step))?;
        if !ready {
            return Err(HandshakeFailure::ReadinessTimeout { step });
        }

        let mut byte = [0u8; 1];
        let read = self
            .link
            .read(&mut byte)
            .map_err(HandshakeFailure::io(step))?;
        if read == 0 {
            return Err(HandshakeFailure::LinkClosed { step });
        }
        Ok(byte[0])
    }

    fn write_byte(&mut self, step: &'static str, byte: u8) -> Step<()> {
        self.write_all(step, &[byte])
    }

    /// Write `bytes` completely, waiting for writability before every chunk.
    fn write_all(&mut self, step: &'static str, mut bytes: &[u8]) -> Step<()> {
        while !bytes.is_empty() {
            let ready = self
                .link
                .wait_writable(self.timing.ready_timeout())
                .map_err(HandshakeFailure::io(step))?;
            if !ready {
                return Err(HandshakeFailure::ReadinessTimeout { step });
            }

            let written = self
                .link
                .write(bytes)
                .map_err(HandshakeFailure::io(step))?;
            if written == 0 {
                return Err(HandshakeFailure::LinkClosed { step });
            }
            bytes = &bytes[written.min(bytes.len())..];
        }
        Ok(())
    }
}
