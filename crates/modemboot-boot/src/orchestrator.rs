use modemboot_transport::{PowerControl, SharedMemoryRegion, ShmDevice, TransportError};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::BootConfig;
use crate::error::{AttemptError, BootError, HandshakeFailure, Result};
use crate::platform::BootPlatform;
use crate::psi::PsiLoader;
use crate::state::{BootEvent, BootState};

/// Summary of a successful boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BootReport {
    /// Attempts used, including the successful one.
    pub attempts: u32,
}

/// Brings the baseband from powered off to message-ready.
pub struct Bootstrapper<P: BootPlatform> {
    platform: P,
    config: BootConfig,
}

/// Handles held by one boot invocation.
///
/// Dropping the session, or starting a new attempt, closes whatever is open.
struct BootSession<S, D: ShmDevice> {
    attempt: u32,
    serial: Option<S>,
    region: Option<SharedMemoryRegion<D>>,
}

impl<S, D: ShmDevice> BootSession<S, D> {
    fn new() -> Self {
        Self {
            attempt: 0,
            serial: None,
            region: None,
        }
    }

    fn release(&mut self) {
        if self.serial.take().is_some() {
            debug!("closed serial link");
        }
        if let Some(region) = self.region.take() {
            region.close();
        }
    }

    fn serial(&mut self) -> std::result::Result<&mut S, AttemptError> {
        self.serial.as_mut().ok_or_else(|| missing("serial", "link not open"))
    }

    fn region(&mut self) -> std::result::Result<&mut SharedMemoryRegion<D>, AttemptError> {
        self.region
            .as_mut()
            .ok_or_else(|| missing("shared memory", "device not open"))
    }
}

fn missing(operation: &'static str, reason: &'static str) -> AttemptError {
    AttemptError::Fatal(BootError::Transport(TransportError::OutOfOrder {
        operation,
        reason,
    }))
}

type StepResult = std::result::Result<(), AttemptError>;

impl<P: BootPlatform> Bootstrapper<P> {
    /// Create an orchestrator after validating `config`.
    pub fn new(platform: P, config: BootConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { platform, config })
    }

    pub fn config(&self) -> &BootConfig {
        &self.config
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn into_platform(self) -> P {
        self.platform
    }

    /// Run the boot sequence until it completes or the retry budget is spent.
    ///
    /// Firmware and calibration are read once, before the first attempt.
    /// Structural errors end the invocation immediately; handshake failures
    /// restart from the power cycle.
    pub fn boot(&mut self) -> Result<BootReport> {
        let image = self.platform.read_firmware(&self.config)?;
        let layout = &self.config.layout;
        if image.len() < layout.read_size {
            return Err(BootError::Firmware {
                path: self.config.paths.firmware.clone(),
                source: short_read(image.len(), layout.read_size),
            });
        }
        let calibration = self.platform.read_calibration(&self.config)?;
        if calibration.len() < layout.calibration_size {
            return Err(BootError::Calibration {
                path: self.config.paths.calibration.clone(),
                source: short_read(calibration.len(), layout.calibration_size),
            });
        }

        let mut session: BootSession<P::Serial, P::SharedMemory> = BootSession::new();
        let mut state = BootState::Idle;
        let mut last_failure: Option<HandshakeFailure> = None;
        let mut fatal: Option<BootError> = None;

        loop {
            let event = match state {
                BootState::Complete => {
                    info!(attempts = session.attempt, "baseband boot complete");
                    return Ok(BootReport {
                        attempts: session.attempt,
                    });
                }
                BootState::Failed => {
                    session.release();
                    let attempts = session.attempt;
                    let err = fatal.take().unwrap_or_else(|| BootError::ExhaustedRetries {
                        attempts,
                        last: last_failure.take(),
                    });
                    error!(attempts = session.attempt, error = %err, "baseband boot failed");
                    return Err(err);
                }
                BootState::Retry => {
                    session.release();
                    if session.attempt < self.config.timing.max_attempts {
                        info!(
                            attempt = session.attempt,
                            delay_ms = self.config.timing.retry_delay_ms,
                            "retrying baseband boot"
                        );
                        self.platform.sleep(self.config.timing.retry_delay());
                        BootEvent::RetryGranted
                    } else {
                        BootEvent::RetryDenied
                    }
                }
                _ => match self.step(state, &mut session, &image, &calibration) {
                    Ok(()) => BootEvent::Advanced,
                    Err(AttemptError::Transient(failure)) => {
                        warn!(
                            state = %state,
                            attempt = session.attempt,
                            error = %failure,
                            "boot attempt aborted"
                        );
                        last_failure = Some(failure);
                        BootEvent::TransientFailure
                    }
                    Err(AttemptError::Fatal(err)) => {
                        fatal = Some(err);
                        BootEvent::FatalFailure
                    }
                },
            };

            let next = state.transition(event);
            debug!(from = %state, to = %next, ?event, attempt = session.attempt, "boot transition");
            state = next;
        }
    }

    fn step(
        &mut self,
        state: BootState,
        session: &mut BootSession<P::Serial, P::SharedMemory>,
        image: &[u8],
        calibration: &[u8],
    ) -> StepResult {
        let config = &self.config;
        let platform = &mut self.platform;
        let layout = &config.layout;

        match state {
            BootState::Idle => Ok(()),

            BootState::PowerCycle => {
                session.release();
                session.attempt += 1;
                info!(
                    attempt = session.attempt,
                    max = config.timing.max_attempts,
                    "starting baseband boot attempt"
                );
                platform.set_interface_down(&config.interface)?;
                platform.power().power_off().map_err(BootError::from)?;
                platform.sleep(config.timing.power_off_settle());
                platform.power().power_on().map_err(BootError::from)?;
                platform.sleep(config.timing.power_on_settle());
                Ok(())
            }

            BootState::SerialHandshake => {
                let serial = platform.open_serial(&config.paths.serial, config.serial_baud)?;
                let serial = session.serial.insert(serial);
                PsiLoader::new(serial, &config.protocol, &config.timing)
                    .handshake(&mut |delay| platform.sleep(delay))?;
                Ok(())
            }

            BootState::ImageTransfer => {
                let serial = session.serial()?;
                PsiLoader::new(serial, &config.protocol, &config.timing)
                    .send_image(&image[..layout.psi_data_len])?;
                Ok(())
            }

            BootState::AwaitAck => {
                let serial = session.serial()?;
                PsiLoader::new(serial, &config.protocol, &config.timing).await_ack()?;
                Ok(())
            }

            BootState::SharedMemInit => {
                session.release();
                let device = platform.open_shared_memory(&config.paths.shared_memory)?;
                let region = session
                    .region
                    .insert(SharedMemoryRegion::open(device, layout.window_size));
                expect_sentinel(
                    region,
                    ("init", "init sentinel"),
                    config.protocol.init_sentinel,
                    config.timing.ready_timeout(),
                )?;
                Ok(())
            }

            BootState::FirmwareCopy => {
                let region = session.region()?;
                region.map().map_err(HandshakeFailure::MapFailed)?;
                region
                    .write_firmware(&image[layout.psi_data_len..layout.read_size])
                    .map_err(HandshakeFailure::io("firmware copy"))?;
                Ok(())
            }

            BootState::CalibrationCopy => {
                let region = session.region()?;
                region
                    .write_calibration(
                        layout.calibration_offset,
                        &calibration[..layout.calibration_size],
                    )
                    .map_err(HandshakeFailure::io("calibration copy"))?;
                Ok(())
            }

            BootState::ReleaseSemaphore => {
                let region = session.region()?;
                region.unmap();
                region
                    .release_semaphore()
                    .map_err(HandshakeFailure::SemaphoreRelease)?;
                Ok(())
            }

            BootState::DeinitHandshake => {
                let region = session.region()?;
                let sent = region
                    .send_command(config.protocol.deinit_command, config.timing.ready_timeout())
                    .map_err(HandshakeFailure::io("deinit command"))?;
                if !sent {
                    return Err(HandshakeFailure::ReadinessTimeout {
                        step: "deinit command",
                    }
                    .into());
                }
                expect_sentinel(
                    region,
                    ("deinit", "deinit sentinel"),
                    config.protocol.deinit_sentinel,
                    config.timing.ready_timeout(),
                )?;
                session.release();
                Ok(())
            }

            BootState::Complete | BootState::Retry | BootState::Failed => Ok(()),
        }
    }
}

fn expect_sentinel<D: ShmDevice>(
    region: &mut SharedMemoryRegion<D>,
    (stage, step): (&'static str, &'static str),
    expected: u32,
    timeout: std::time::Duration,
) -> std::result::Result<(), HandshakeFailure> {
    let word = region
        .read_sentinel(timeout)
        .map_err(HandshakeFailure::io(step))?
        .ok_or(HandshakeFailure::ReadinessTimeout { step })?;
    if word != expected {
        return Err(HandshakeFailure::SentinelMismatch {
            stage,
            expected,
            got: word,
        });
    }
    debug!(stage, word = format_args!("{word:#010x}"), "sentinel matched");
    Ok(())
}

fn short_read(got: usize, expected: usize) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        format!("read {got} bytes, expected {expected}"),
    )
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use modemboot_transport::mock::{MockShmDevice, MockTransport, ShmOp};

    use super::*;
    use crate::config::ImageLayout;
    use crate::mock::{responsive_serial, responsive_shm, MockPlatform};
    use crate::psi::checksum;

    fn small_config() -> BootConfig {
        BootConfig {
            layout: ImageLayout {
                read_size: 64,
                psi_data_len: 16,
                calibration_offset: 64,
                calibration_size: 32,
                calibration_block_size: 8,
                firmware_block_size: 64,
                window_size: 128,
            },
            ..BootConfig::default()
        }
    }

    fn retry_sleeps(platform: &MockPlatform) -> usize {
        platform.sleeps_of(Duration::from_secs(2))
    }

    #[test]
    fn boots_in_one_attempt() {
        let config = small_config();
        let platform = MockPlatform::new(&config)
            .with_serial(responsive_serial(&config))
            .with_shared_memory(responsive_shm(&config));
        let mut boot = Bootstrapper::new(platform, config.clone()).expect("config is valid");

        let report = boot.boot().expect("boot should succeed");
        assert_eq!(report, BootReport { attempts: 1 });

        let platform = boot.into_platform();
        assert_eq!(platform.interface_downs, 1);
        assert_eq!(platform.power.commands, vec!["on"]);
        assert_eq!(retry_sleeps(&platform), 0);
        assert_eq!(platform.serial_handles().len(), 1);
        assert!(platform.serial_handles()[0].is_closed());
        assert!(platform.shm_handles()[0].is_closed());
    }

    #[test]
    fn uploads_psi_with_xor_checksum() {
        let config = small_config();
        let platform = MockPlatform::new(&config)
            .with_serial(responsive_serial(&config))
            .with_shared_memory(responsive_shm(&config));
        let mut boot = Bootstrapper::new(platform, config.clone()).expect("config is valid");
        boot.boot().expect("boot should succeed");

        let platform = boot.platform();
        let written = platform.serial_handles()[0].written();
        let wake_len = 2 * config.timing.wake_attempts as usize;
        assert!(written[..wake_len].chunks(2).all(|c| c == b"AT"));

        let upload = &written[wake_len..];
        assert_eq!(&upload[..3], &[0x30, 16, 0]);
        assert_eq!(&upload[3..19], &platform.firmware[..16]);
        assert_eq!(upload[19], checksum(&platform.firmware[..16]));
        assert_eq!(upload.len(), 20);
    }

    #[test]
    fn stages_firmware_and_calibration_in_order() {
        let config = small_config();
        let platform = MockPlatform::new(&config)
            .with_serial(responsive_serial(&config))
            .with_shared_memory(responsive_shm(&config));
        let mut boot = Bootstrapper::new(platform, config).expect("config is valid");
        boot.boot().expect("boot should succeed");

        let platform = boot.platform();
        let shm = &platform.shm_handles()[0];
        assert_eq!(
            shm.ops(),
            vec![
                ShmOp::ReadWord(0x1234_1234),
                ShmOp::Map(128),
                ShmOp::Unmap,
                ShmOp::ReleaseSemaphore,
                ShmOp::WriteWord(0x4567_4567),
                ShmOp::ReadWord(0xABCD_ABCD),
            ]
        );

        let memory = shm.memory();
        assert_eq!(&memory[..48], &platform.firmware[16..64]);
        assert_eq!(&memory[64..96], &platform.calibration[..]);
    }

    #[test]
    fn unacknowledged_psi_exhausts_retries() {
        let config = small_config();
        let mut platform = MockPlatform::new(&config);
        for _ in 0..6 {
            platform = platform.with_serial(
                MockTransport::new()
                    .with_inbound(vec![0xF0, 0x00])
                    .respond_after(1, vec![0x00; 60]),
            );
        }
        let mut boot = Bootstrapper::new(platform, config).expect("config is valid");

        let err = boot.boot().unwrap_err();
        assert!(matches!(
            err,
            BootError::ExhaustedRetries {
                attempts: 5,
                last: Some(HandshakeFailure::AckNotObserved { reads: 50 })
            }
        ));

        let platform = boot.platform();
        assert_eq!(platform.serial_handles().len(), 5);
        assert_eq!(retry_sleeps(platform), 4);
        assert_eq!(platform.interface_downs, 5);
        for handle in platform.serial_handles() {
            assert!(handle.is_closed());
            assert_eq!(handle.read_calls(), 2 + 50);
        }
        assert!(platform.shm_handles().is_empty());
    }

    #[test]
    fn silent_devices_exhaust_retries() {
        let config = small_config();
        let mut boot =
            Bootstrapper::new(MockPlatform::new(&config), config).expect("config is valid");

        let err = boot.boot().unwrap_err();
        assert!(matches!(
            err,
            BootError::ExhaustedRetries {
                attempts: 5,
                last: Some(HandshakeFailure::ReadinessTimeout {
                    step: "bootcore version"
                })
            }
        ));
        assert_eq!(retry_sleeps(boot.platform()), 4);
    }

    #[test]
    fn bad_version_is_retried() {
        let config = small_config();
        let platform = MockPlatform::new(&config)
            .with_serial(MockTransport::new().with_inbound(vec![0xE1, 0x00]))
            .with_serial(responsive_serial(&config))
            .with_shared_memory(responsive_shm(&config));
        let mut boot = Bootstrapper::new(platform, config).expect("config is valid");

        let report = boot.boot().expect("second attempt should succeed");
        assert_eq!(report.attempts, 2);

        let platform = boot.platform();
        assert_eq!(retry_sleeps(platform), 1);
        assert!(platform.serial_handles().iter().all(|h| h.is_closed()));
        assert_eq!(platform.shm_handles().len(), 1);
    }

    #[test]
    fn sentinel_mismatch_is_retried() {
        let config = small_config();
        let platform = MockPlatform::new(&config)
            .with_serial(responsive_serial(&config))
            .with_serial(responsive_serial(&config))
            .with_shared_memory(MockShmDevice::new(128).with_sentinels([0xDEAD_BEEF]))
            .with_shared_memory(responsive_shm(&config));
        let mut boot = Bootstrapper::new(platform, config).expect("config is valid");

        let report = boot.boot().expect("second attempt should succeed");
        assert_eq!(report.attempts, 2);

        let first = &boot.platform().shm_handles()[0];
        assert!(first.is_closed());
        assert_eq!(first.ops(), vec![ShmOp::ReadWord(0xDEAD_BEEF)]);
    }

    #[test]
    fn deinit_mismatch_is_retried_after_release() {
        let config = small_config();
        let platform = MockPlatform::new(&config)
            .with_serial(responsive_serial(&config))
            .with_serial(responsive_serial(&config))
            .with_shared_memory(MockShmDevice::new(128).with_sentinels([0x1234_1234, 0]))
            .with_shared_memory(responsive_shm(&config));
        let mut boot = Bootstrapper::new(platform, config).expect("config is valid");

        assert_eq!(boot.boot().expect("boot should succeed").attempts, 2);
        let first = &boot.platform().shm_handles()[0];
        assert!(first.ops().contains(&ShmOp::ReleaseSemaphore));
        assert!(first.is_closed());
    }

    #[test]
    fn busy_shared_memory_times_out_deinit_command() {
        let mut config = small_config();
        config.timing.max_attempts = 1;
        let platform = MockPlatform::new(&config)
            .with_serial(responsive_serial(&config))
            .with_shared_memory(responsive_shm(&config).busy_writes());
        let mut boot = Bootstrapper::new(platform, config).expect("config is valid");

        let err = boot.boot().unwrap_err();
        assert!(matches!(
            err,
            BootError::ExhaustedRetries {
                attempts: 1,
                last: Some(HandshakeFailure::ReadinessTimeout {
                    step: "deinit command"
                }),
            }
        ));
        assert!(boot.platform().shm_handles()[0].commands().is_empty());
    }

    #[test]
    fn failed_map_is_retried() {
        let config = small_config();
        let platform = MockPlatform::new(&config)
            .with_serial(responsive_serial(&config))
            .with_serial(responsive_serial(&config))
            .with_shared_memory(responsive_shm(&config).failing_map())
            .with_shared_memory(responsive_shm(&config));
        let mut boot = Bootstrapper::new(platform, config).expect("config is valid");

        assert_eq!(boot.boot().expect("boot should succeed").attempts, 2);
    }

    #[test]
    fn failed_semaphore_release_is_retried() {
        let config = small_config();
        let platform = MockPlatform::new(&config)
            .with_serial(responsive_serial(&config))
            .with_serial(responsive_serial(&config))
            .with_shared_memory(responsive_shm(&config).failing_release())
            .with_shared_memory(responsive_shm(&config));
        let mut boot = Bootstrapper::new(platform, config).expect("config is valid");

        assert_eq!(boot.boot().expect("boot should succeed").attempts, 2);
    }

    #[test]
    fn missing_serial_device_is_fatal() {
        let config = small_config();
        let platform = MockPlatform::new(&config).failing_serial_open();
        let mut boot = Bootstrapper::new(platform, config).expect("config is valid");

        let err = boot.boot().unwrap_err();
        assert!(matches!(
            err,
            BootError::Device {
                device: "serial port",
                ..
            }
        ));
        assert_eq!(retry_sleeps(boot.platform()), 0);
        assert_eq!(boot.platform().interface_downs, 1);
    }

    #[test]
    fn short_calibration_is_fatal_before_power_cycle() {
        let config = small_config();
        let mut platform = MockPlatform::new(&config);
        platform.calibration.truncate(8);
        let mut boot = Bootstrapper::new(platform, config).expect("config is valid");

        let err = boot.boot().unwrap_err();
        assert!(matches!(err, BootError::Calibration { .. }));
        assert!(boot.platform().power.commands.is_empty());
        assert_eq!(boot.platform().interface_downs, 0);
    }

    #[test]
    fn single_attempt_budget_does_not_sleep() {
        let mut config = small_config();
        config.timing.max_attempts = 1;
        let mut boot =
            Bootstrapper::new(MockPlatform::new(&config), config).expect("config is valid");

        let err = boot.boot().unwrap_err();
        assert!(matches!(err, BootError::ExhaustedRetries { attempts: 1, .. }));
        assert_eq!(retry_sleeps(boot.platform()), 0);
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut config = small_config();
        config.layout.window_size = 16;
        let result = Bootstrapper::new(MockPlatform::new(&config), config);
        assert!(matches!(result, Err(BootError::Config(_))));
    }

    #[test]
    fn already_powered_baseband_is_cycled() {
        let config = small_config();
        let mut platform = MockPlatform::new(&config)
            .with_serial(responsive_serial(&config))
            .with_shared_memory(responsive_shm(&config));
        platform.power.enabled = true;
        let mut boot = Bootstrapper::new(platform, config).expect("config is valid");

        boot.boot().expect("boot should succeed");
        assert_eq!(boot.platform().power.commands, vec!["off", "on"]);
    }
}
