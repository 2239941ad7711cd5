use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{PowerControl, DEFAULT_POWER_CONTROL_PATH, DEFAULT_POWER_STATUS_PATH};

const POWER_ON_COMMAND: &[u8] = b"on";
const POWER_OFF_COMMAND: &[u8] = b"off";
const STATUS_ENABLED: u8 = b'1';

/// Power control through the modem class sysfs files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysfsPower {
    control: PathBuf,
    status: PathBuf,
}

impl SysfsPower {
    /// Use explicit control and status paths.
    pub fn new(control: impl Into<PathBuf>, status: impl Into<PathBuf>) -> Self {
        Self {
            control: control.into(),
            status: status.into(),
        }
    }

    /// Control file receiving `on`/`off` commands.
    pub fn control_path(&self) -> &Path {
        &self.control
    }

    /// Status file read to decide whether a command is needed.
    pub fn status_path(&self) -> &Path {
        &self.status
    }

    fn write_command(&self, command: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .open(&self.control)
            .map_err(|source| TransportError::Power {
                path: self.control.clone(),
                source,
            })?;
        file.write_all(command)
            .map_err(|source| TransportError::Power {
                path: self.control.clone(),
                source,
            })?;
        info!(
            command = %String::from_utf8_lossy(command),
            path = ?self.control,
            "sent baseband power command"
        );
        Ok(())
    }
}

impl Default for SysfsPower {
    fn default() -> Self {
        Self::new(DEFAULT_POWER_CONTROL_PATH, DEFAULT_POWER_STATUS_PATH)
    }
}

impl PowerControl for SysfsPower {
    /// An unreadable or empty status file counts as "off".
    fn is_enabled(&mut self) -> Result<bool> {
        let mut status = [0u8; 1];
        let enabled = match std::fs::File::open(&self.status) {
            Ok(mut file) => matches!(file.read(&mut status), Ok(1)) && status[0] == STATUS_ENABLED,
            Err(err) => {
                debug!(path = ?self.status, error = %err, "status file unreadable");
                false
            }
        };
        Ok(enabled)
    }

    fn power_on(&mut self) -> Result<()> {
        if self.is_enabled()? {
            debug!("baseband already powered on");
            return Ok(());
        }
        self.write_command(POWER_ON_COMMAND)
    }

    fn power_off(&mut self) -> Result<()> {
        if !self.is_enabled()? {
            debug!("baseband already powered off");
            return Ok(());
        }
        self.write_command(POWER_OFF_COMMAND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "modemboot-power-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn fixture(tag: &str, status: &[u8]) -> (PathBuf, SysfsPower) {
        let dir = unique_dir(tag);
        let control = dir.join("control");
        let status_path = dir.join("status");
        std::fs::write(&control, b"").unwrap();
        std::fs::write(&status_path, status).unwrap();
        (dir, SysfsPower::new(control, status_path))
    }

    #[test]
    fn power_on_when_enabled_writes_nothing() {
        let (dir, mut power) = fixture("on-noop", b"1\n");
        power.power_on().unwrap();
        assert!(std::fs::read(power.control_path()).unwrap().is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn power_on_when_disabled_writes_on() {
        let (dir, mut power) = fixture("on-write", b"0\n");
        power.power_on().unwrap();
        assert_eq!(std::fs::read(power.control_path()).unwrap(), b"on");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn power_off_when_disabled_writes_nothing() {
        let (dir, mut power) = fixture("off-noop", b"0");
        power.power_off().unwrap();
        assert!(std::fs::read(power.control_path()).unwrap().is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn power_off_when_enabled_writes_off() {
        let (dir, mut power) = fixture("off-write", b"1");
        power.power_off().unwrap();
        assert_eq!(std::fs::read(power.control_path()).unwrap(), b"off");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_status_reads_as_disabled() {
        let dir = unique_dir("missing");
        let mut power = SysfsPower::new(dir.join("control"), dir.join("status"));
        assert!(!power.is_enabled().unwrap());
        // Control file is missing too, so the write fails structurally.
        let err = power.power_on().unwrap_err();
        assert!(matches!(err, TransportError::Power { .. }));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
