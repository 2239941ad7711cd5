//! Scripted [`BootPlatform`] for exercising the boot sequence without hardware.
//!
//! Serial links and shared memory devices are handed out from queues in the
//! order they are opened. Once a queue runs dry every further open gets a
//! silent device, which makes the attempt time out.

use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use modemboot_transport::mock::{
    MockHandle, MockPower, MockShmDevice, MockShmHandle, MockTransport,
};
use modemboot_transport::TransportError;

use crate::config::BootConfig;
use crate::error::{BootError, Result};
use crate::platform::BootPlatform;

/// In-memory platform with inspectable side effects.
#[derive(Debug)]
pub struct MockPlatform {
    /// Image returned by `read_firmware`.
    pub firmware: Vec<u8>,
    /// Data returned by `read_calibration`.
    pub calibration: Vec<u8>,
    /// Power switch state and command log.
    pub power: MockPower,
    /// Every delay requested, in order.
    pub sleeps: Vec<Duration>,
    /// Number of interface-down requests.
    pub interface_downs: usize,
    window_size: usize,
    serials: VecDeque<MockTransport>,
    shared_memory: VecDeque<MockShmDevice>,
    serial_handles: Vec<MockHandle>,
    shm_handles: Vec<MockShmHandle>,
    fail_serial_open: bool,
}

impl MockPlatform {
    /// Platform sized for `config`, with a patterned firmware image and
    /// calibration data and the baseband powered off.
    pub fn new(config: &BootConfig) -> Self {
        Self {
            firmware: pattern(config.layout.read_size, 0x11),
            calibration: pattern(config.layout.calibration_size, 0x5C),
            power: MockPower::new(false),
            sleeps: Vec::new(),
            interface_downs: 0,
            window_size: config.layout.window_size,
            serials: VecDeque::new(),
            shared_memory: VecDeque::new(),
            serial_handles: Vec::new(),
            shm_handles: Vec::new(),
            fail_serial_open: false,
        }
    }

    /// Queue the serial link handed to the next attempt.
    pub fn with_serial(mut self, serial: MockTransport) -> Self {
        self.serials.push_back(serial);
        self
    }

    /// Queue the shared memory device handed to the next attempt.
    pub fn with_shared_memory(mut self, device: MockShmDevice) -> Self {
        self.shared_memory.push_back(device);
        self
    }

    /// Make every serial open fail as if the device node were missing.
    pub fn failing_serial_open(mut self) -> Self {
        self.fail_serial_open = true;
        self
    }

    /// Handles of every serial link opened so far.
    pub fn serial_handles(&self) -> &[MockHandle] {
        &self.serial_handles
    }

    /// Handles of every shared memory device opened so far.
    pub fn shm_handles(&self) -> &[MockShmHandle] {
        &self.shm_handles
    }

    /// Delays equal to `duration`.
    pub fn sleeps_of(&self, duration: Duration) -> usize {
        self.sleeps.iter().filter(|d| **d == duration).count()
    }
}

/// Serial link that answers the wake pattern and acknowledges the PSI.
pub fn responsive_serial(config: &BootConfig) -> MockTransport {
    let protocol = &config.protocol;
    let upload = protocol.wake_pattern.len() * config.timing.wake_attempts as usize
        + 1
        + 2
        + config.layout.psi_data_len
        + 1;
    MockTransport::new()
        .with_inbound(vec![protocol.bootcore_version, 0x00])
        .respond_after(upload, vec![protocol.ack])
}

/// Shared memory device that reports ready and acknowledges the deinit command.
pub fn responsive_shm(config: &BootConfig) -> MockShmDevice {
    MockShmDevice::new(config.layout.window_size)
        .with_sentinels([config.protocol.init_sentinel, config.protocol.deinit_sentinel])
}

fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(7).wrapping_add(seed))
        .collect()
}

impl BootPlatform for MockPlatform {
    type Serial = MockTransport;
    type SharedMemory = MockShmDevice;
    type Power = MockPower;

    fn read_firmware(&mut self, _config: &BootConfig) -> Result<Vec<u8>> {
        Ok(self.firmware.clone())
    }

    fn read_calibration(&mut self, _config: &BootConfig) -> Result<Vec<u8>> {
        Ok(self.calibration.clone())
    }

    fn set_interface_down(&mut self, _name: &str) -> Result<()> {
        self.interface_downs += 1;
        Ok(())
    }

    fn power(&mut self) -> &mut MockPower {
        &mut self.power
    }

    fn open_serial(&mut self, path: &Path, _baud: u32) -> Result<MockTransport> {
        if self.fail_serial_open {
            return Err(BootError::Device {
                device: "serial port",
                source: TransportError::Open {
                    path: path.to_path_buf(),
                    source: std::io::ErrorKind::NotFound.into(),
                },
            });
        }
        let serial = self.serials.pop_front().unwrap_or_default();
        self.serial_handles.push(serial.handle());
        Ok(serial)
    }

    fn open_shared_memory(&mut self, _path: &Path) -> Result<MockShmDevice> {
        let device = self
            .shared_memory
            .pop_front()
            .unwrap_or_else(|| MockShmDevice::new(self.window_size));
        self.shm_handles.push(device.handle());
        Ok(device)
    }

    fn sleep(&mut self, duration: Duration) {
        self.sleeps.push(duration);
    }
}
