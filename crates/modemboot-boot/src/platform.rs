use std::path::Path;
use std::time::Duration;

use modemboot_transport::{PowerControl, ShmDevice, Transport};

use crate::config::BootConfig;
use crate::error::Result;

/// Everything the boot sequence touches outside its own state.
///
/// `HardwarePlatform` talks to the real devices;
/// [`MockPlatform`](crate::mock::MockPlatform) replays scripted devices and
/// records delays.
pub trait BootPlatform {
    /// Raw serial link used for the PSI upload.
    type Serial: Transport;
    /// Shared memory device used for the firmware handoff.
    type SharedMemory: ShmDevice;
    /// Baseband power switch.
    type Power: PowerControl;

    /// Read the firmware image described by `config`.
    fn read_firmware(&mut self, config: &BootConfig) -> Result<Vec<u8>>;

    /// Read the calibration data described by `config`.
    fn read_calibration(&mut self, config: &BootConfig) -> Result<Vec<u8>>;

    /// Bring the messaging interface down ahead of a power cycle.
    fn set_interface_down(&mut self, name: &str) -> Result<()>;

    /// Baseband power control.
    fn power(&mut self) -> &mut Self::Power;

    /// Open and configure the raw serial link.
    fn open_serial(&mut self, path: &Path, baud: u32) -> Result<Self::Serial>;

    /// Open the shared memory device.
    fn open_shared_memory(&mut self, path: &Path) -> Result<Self::SharedMemory>;

    /// Block for `duration`.
    fn sleep(&mut self, duration: Duration);
}

#[cfg(target_os = "linux")]
pub use self::hardware::HardwarePlatform;

#[cfg(target_os = "linux")]
mod hardware {
    use std::path::Path;
    use std::time::Duration;

    use modemboot_transport::{NetInterface, OnedramDevice, SerialPort, SysfsPower};

    use super::BootPlatform;
    use crate::config::BootConfig;
    use crate::error::{BootError, Result};
    use crate::image;

    /// The stock device set: flash partition, sysfs power, raw serial and
    /// the onedram window.
    #[derive(Debug)]
    pub struct HardwarePlatform {
        power: SysfsPower,
    }

    impl HardwarePlatform {
        /// Build a platform from the power paths in `config`.
        pub fn from_config(config: &BootConfig) -> Self {
            Self {
                power: SysfsPower::new(&config.paths.power_control, &config.paths.power_status),
            }
        }
    }

    impl BootPlatform for HardwarePlatform {
        type Serial = SerialPort;
        type SharedMemory = OnedramDevice;
        type Power = SysfsPower;

        fn read_firmware(&mut self, config: &BootConfig) -> Result<Vec<u8>> {
            image::read_firmware(
                &config.paths.firmware,
                config.layout.read_size,
                config.layout.firmware_block_size,
            )
        }

        fn read_calibration(&mut self, config: &BootConfig) -> Result<Vec<u8>> {
            image::read_calibration(
                &config.paths.calibration,
                config.layout.calibration_size,
                config.layout.calibration_block_size,
            )
        }

        fn set_interface_down(&mut self, name: &str) -> Result<()> {
            NetInterface::new(name).set_down()?;
            Ok(())
        }

        fn power(&mut self) -> &mut SysfsPower {
            &mut self.power
        }

        fn open_serial(&mut self, path: &Path, baud: u32) -> Result<SerialPort> {
            SerialPort::open(path, baud).map_err(|source| BootError::Device {
                device: "serial port",
                source,
            })
        }

        fn open_shared_memory(&mut self, path: &Path) -> Result<OnedramDevice> {
            OnedramDevice::open(path).map_err(|source| BootError::Device {
                device: "shared memory",
                source,
            })
        }

        fn sleep(&mut self, duration: Duration) {
            std::thread::sleep(duration);
        }
    }
}
