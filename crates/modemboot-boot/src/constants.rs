//! Protocol constants and default device surface.
//!
//! Every value here is a default for [`BootConfig`](crate::config::BootConfig);
//! the boot sequence itself only reads the configuration.

use std::time::Duration;

/// Bootcore version byte the baseband announces after the wake pattern.
pub const BOOTCORE_VERSION: u8 = 0xF0;

/// First byte of the PSI upload.
pub const PSI_MAGIC: u8 = 0x30;

/// Number of image bytes streamed over serial.
pub const PSI_DATA_LEN: usize = 0x5000;

/// Byte the baseband sends once the PSI checksum matched.
pub const PSI_ACK: u8 = 0x01;

/// ASCII wake pattern repeated until the bootcore answers.
pub const WAKE_PATTERN: &[u8] = b"AT";

/// Number of wake pattern writes.
pub const WAKE_ATTEMPTS: u32 = 20;

/// Delay after every wake write, and once more after the last one.
pub const WAKE_INTERVAL: Duration = Duration::from_millis(50);

/// Bytes read from the firmware partition.
pub const RADIO_IMG_READ_SIZE: usize = 0xD8_0000;

/// Offset of the calibration data inside the shared window.
pub const RADIO_IMG_MAX_SIZE: usize = 0xD8_0000;

/// Size of the calibration file.
pub const NV_DATA_SIZE: usize = 0x20_0000;

/// Calibration file read block size.
pub const NV_DATA_BLOCK_SIZE: usize = 1024;

/// Length of the shared memory mapping.
pub const ONENAND_MAP_SIZE: usize = 0xFF_F000;

/// Sentinel announcing the shared window is ready for the firmware.
pub const ONEDRAM_INIT_READ: u32 = 0x1234_1234;

/// Command word asking the baseband to take over the window.
pub const ONEDRAM_DEINIT_CMD: u32 = 0x4567_4567;

/// Sentinel acknowledging the takeover.
pub const ONEDRAM_DEINIT_READ: u32 = 0xABCD_ABCD;

/// Bound on every readiness wait.
pub const READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Reads allowed while waiting for [`PSI_ACK`].
pub const ACK_POLL_LIMIT: usize = 50;

/// Full boot attempts before giving up.
pub const MAX_BOOT_ATTEMPTS: u32 = 5;

/// Delay before each new attempt.
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Settle time after powering off.
pub const POWER_OFF_SETTLE: Duration = Duration::from_millis(1);

/// Settle time after powering on.
pub const POWER_ON_SETTLE: Duration = Duration::from_millis(200);

/// Raw firmware partition.
pub const DEFAULT_FIRMWARE_PATH: &str = "/dev/block/bml12";

/// Calibration data file.
pub const DEFAULT_CALIBRATION_PATH: &str = "/efs/nv_data.bin";

/// Raw serial device the PSI loader runs over.
pub const DEFAULT_SERIAL_PATH: &str = "/dev/s3c2410_serial3";

/// Serial line speed.
pub const DEFAULT_SERIAL_BAUD: u32 = 115_200;

/// Shared memory device node.
pub const DEFAULT_SHM_PATH: &str = modemboot_transport::shm::DEFAULT_DEVICE_PATH;

/// Modem class power control file.
pub const DEFAULT_POWER_CONTROL_PATH: &str = modemboot_transport::traits::DEFAULT_POWER_CONTROL_PATH;

/// Modem class power status file.
pub const DEFAULT_POWER_STATUS_PATH: &str = modemboot_transport::traits::DEFAULT_POWER_STATUS_PATH;
