use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{BootError, Result};

/// Everything the boot sequence needs to know about the device.
///
/// Defaults describe the stock hardware. Any subset of fields can be
/// overridden from JSON; missing fields keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BootConfig {
    /// Device nodes and files.
    pub paths: DevicePaths,
    /// Network interface taken down before each power cycle.
    pub interface: String,
    /// Serial line speed for the PSI upload.
    pub serial_baud: u32,
    /// Handshake bytes and sentinel words.
    pub protocol: PsiProtocol,
    /// Image sizes and shared window layout.
    pub layout: ImageLayout,
    /// Delays, timeouts and retry bounds.
    pub timing: BootTiming,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            paths: DevicePaths::default(),
            interface: modemboot_transport::channel::DEFAULT_INTERFACE.to_string(),
            serial_baud: DEFAULT_SERIAL_BAUD,
            protocol: PsiProtocol::default(),
            layout: ImageLayout::default(),
            timing: BootTiming::default(),
        }
    }
}

impl BootConfig {
    /// Load and validate a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|err| BootError::Config(format!("cannot read {}: {err}", path.display())))?;
        Self::from_json_str(&text)
            .map_err(|err| BootError::Config(format!("{}: {err}", path.display())))
    }

    /// Parse and validate a configuration from JSON text.
    pub fn from_json_str(text: &str) -> std::result::Result<Self, String> {
        let config: BootConfig = serde_json::from_str(text).map_err(|err| err.to_string())?;
        config.check().map(|()| config)
    }

    /// Check that the layout and bounds are usable.
    pub fn validate(&self) -> Result<()> {
        self.check().map_err(BootError::Config)
    }

    fn check(&self) -> std::result::Result<(), String> {
        let layout = &self.layout;
        if self.interface.is_empty() {
            return Err("interface name is empty".into());
        }
        if self.protocol.wake_pattern.is_empty() {
            return Err("wake pattern is empty".into());
        }
        if layout.psi_data_len == 0 || layout.psi_data_len > u16::MAX as usize {
            return Err(format!(
                "psi_data_len {} must be between 1 and {}",
                layout.psi_data_len,
                u16::MAX
            ));
        }
        if layout.psi_data_len > layout.read_size {
            return Err(format!(
                "psi_data_len {:#x} exceeds firmware read size {:#x}",
                layout.psi_data_len, layout.read_size
            ));
        }
        if layout.firmware_payload_len() > layout.calibration_offset {
            return Err(format!(
                "firmware payload ({:#x} bytes) overlaps calibration offset {:#x}",
                layout.firmware_payload_len(),
                layout.calibration_offset
            ));
        }
        let calibration_end = layout
            .calibration_offset
            .checked_add(layout.calibration_size)
            .filter(|end| *end <= layout.window_size);
        if calibration_end.is_none() {
            return Err(format!(
                "calibration ({:#x} bytes at {:#x}) does not fit the {:#x}-byte window",
                layout.calibration_size, layout.calibration_offset, layout.window_size
            ));
        }
        if layout.firmware_block_size == 0 || layout.calibration_block_size == 0 {
            return Err("read block sizes must be non-zero".into());
        }
        if self.timing.max_attempts == 0 {
            return Err("max_attempts must be at least 1".into());
        }
        if self.timing.ack_poll_limit == 0 {
            return Err("ack_poll_limit must be at least 1".into());
        }
        Ok(())
    }
}

/// Device nodes and files consumed during boot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DevicePaths {
    pub firmware: PathBuf,
    pub calibration: PathBuf,
    pub serial: PathBuf,
    pub shared_memory: PathBuf,
    pub power_control: PathBuf,
    pub power_status: PathBuf,
}

impl Default for DevicePaths {
    fn default() -> Self {
        Self {
            firmware: DEFAULT_FIRMWARE_PATH.into(),
            calibration: DEFAULT_CALIBRATION_PATH.into(),
            serial: DEFAULT_SERIAL_PATH.into(),
            shared_memory: DEFAULT_SHM_PATH.into(),
            power_control: DEFAULT_POWER_CONTROL_PATH.into(),
            power_status: DEFAULT_POWER_STATUS_PATH.into(),
        }
    }
}

/// Byte and word values exchanged during the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PsiProtocol {
    pub wake_pattern: String,
    pub bootcore_version: u8,
    pub psi_magic: u8,
    pub ack: u8,
    pub init_sentinel: u32,
    pub deinit_command: u32,
    pub deinit_sentinel: u32,
}

impl Default for PsiProtocol {
    fn default() -> Self {
        Self {
            wake_pattern: String::from_utf8_lossy(WAKE_PATTERN).into_owned(),
            bootcore_version: BOOTCORE_VERSION,
            psi_magic: PSI_MAGIC,
            ack: PSI_ACK,
            init_sentinel: ONEDRAM_INIT_READ,
            deinit_command: ONEDRAM_DEINIT_CMD,
            deinit_sentinel: ONEDRAM_DEINIT_READ,
        }
    }
}

/// Firmware image and shared window geometry, in bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageLayout {
    /// Bytes read from the firmware partition.
    pub read_size: usize,
    /// Leading image bytes streamed over serial.
    pub psi_data_len: usize,
    /// Offset of the calibration data in the window.
    pub calibration_offset: usize,
    /// Calibration file size.
    pub calibration_size: usize,
    /// Calibration read block.
    pub calibration_block_size: usize,
    /// Firmware partition erase block, used for bad-block skipping.
    pub firmware_block_size: usize,
    /// Shared memory mapping length.
    pub window_size: usize,
}

impl ImageLayout {
    /// Bytes copied into the shared window after the PSI part.
    pub fn firmware_payload_len(&self) -> usize {
        self.read_size.saturating_sub(self.psi_data_len)
    }
}

impl Default for ImageLayout {
    fn default() -> Self {
        Self {
            read_size: RADIO_IMG_READ_SIZE,
            psi_data_len: PSI_DATA_LEN,
            calibration_offset: RADIO_IMG_MAX_SIZE,
            calibration_size: NV_DATA_SIZE,
            calibration_block_size: NV_DATA_BLOCK_SIZE,
            firmware_block_size: RADIO_IMG_READ_SIZE,
            window_size: ONENAND_MAP_SIZE,
        }
    }
}

/// Delays, timeouts and retry bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BootTiming {
    pub ready_timeout_ms: u64,
    pub retry_delay_ms: u64,
    pub wake_interval_ms: u64,
    pub power_off_settle_ms: u64,
    pub power_on_settle_ms: u64,
    pub wake_attempts: u32,
    pub ack_poll_limit: usize,
    pub max_attempts: u32,
}

impl BootTiming {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn wake_interval(&self) -> Duration {
        Duration::from_millis(self.wake_interval_ms)
    }

    pub fn power_off_settle(&self) -> Duration {
        Duration::from_millis(self.power_off_settle_ms)
    }

    pub fn power_on_settle(&self) -> Duration {
        Duration::from_millis(self.power_on_settle_ms)
    }
}

impl Default for BootTiming {
    fn default() -> Self {
        Self {
            ready_timeout_ms: READY_TIMEOUT.as_millis() as u64,
            retry_delay_ms: RETRY_DELAY.as_millis() as u64,
            wake_interval_ms: WAKE_INTERVAL.as_millis() as u64,
            power_off_settle_ms: POWER_OFF_SETTLE.as_millis() as u64,
            power_on_settle_ms: POWER_ON_SETTLE.as_millis() as u64,
            wake_attempts: WAKE_ATTEMPTS,
            ack_poll_limit: ACK_POLL_LIMIT,
            max_attempts: MAX_BOOT_ATTEMPTS,
        }
    }
}
