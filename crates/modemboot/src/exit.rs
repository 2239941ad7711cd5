use std::fmt;
use std::io;

use modemboot_boot::BootError;
use modemboot_frame::FrameError;
use modemboot_transport::TransportError;

// Exit code constants aligned with sysexits-style semantics.
pub const SUCCESS: i32 = 0;
#[cfg(not(target_os = "linux"))]
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DEVICE_BUSY: i32 = 16;
pub const HEALTH_CHECK_FAILED: i32 = 30;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const DEVICE_UNAVAILABLE: i32 = 69;
pub const BOOT_EXHAUSTED: i32 = 75;
pub const CONFIG_INVALID: i32 = 78;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = io_code(&err);
    CliError::new(code, format!("{context}: {err}"))
}

fn io_code(err: &io::Error) -> i32 {
    match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => DEVICE_UNAVAILABLE,
        io::ErrorKind::ResourceBusy => DEVICE_BUSY,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        _ => INTERNAL,
    }
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    let code = match &err {
        TransportError::Open { source, .. }
        | TransportError::Configure { source, .. }
        | TransportError::Channel { source, .. }
        | TransportError::Interface { source, .. }
        | TransportError::Power { source, .. }
        | TransportError::Map { source, .. }
        | TransportError::Io(source) => match io_code(source) {
            INTERNAL => TRANSPORT_ERROR,
            code => code,
        },
        TransportError::InterfaceNameTooLong { .. } => USAGE,
        TransportError::OutOfBounds { .. } | TransportError::OutOfOrder { .. } => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Transport(err) => transport_error(context, err),
        FrameError::Truncated { .. }
        | FrameError::LengthBelowHeader { .. }
        | FrameError::FrameTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ShortWrite { .. } => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
    }
}

pub fn boot_error(context: &str, err: BootError) -> CliError {
    match err {
        BootError::Device { device, source } => {
            transport_error(&format!("{context}: {device}"), source)
        }
        BootError::Transport(err) => transport_error(context, err),
        BootError::Config(_) => CliError::new(CONFIG_INVALID, format!("{context}: {err}")),
        BootError::Firmware { ref source, .. } | BootError::Calibration { ref source, .. } => {
            let code = match source.kind() {
                io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidInput => DATA_INVALID,
                _ => io_code(source),
            };
            CliError::new(code, format!("{context}: {err}"))
        }
        BootError::ExhaustedRetries { .. } => {
            CliError::new(BOOT_EXHAUSTED, format!("{context}: {err}"))
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub fn unsupported(command: &str) -> CliError {
    CliError::new(
        FAILURE,
        format!("{command} requires Linux baseband device support"),
    )
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use modemboot_boot::HandshakeFailure;

    use super::*;

    #[test]
    fn exhausted_retries_is_distinct_from_missing_firmware() {
        let exhausted = boot_error(
            "boot failed",
            BootError::ExhaustedRetries {
                attempts: 5,
                last: Some(HandshakeFailure::AckNotObserved { reads: 50 }),
            },
        );
        let missing = boot_error(
            "boot failed",
            BootError::Firmware {
                path: PathBuf::from("/dev/block/bml12"),
                source: io::ErrorKind::NotFound.into(),
            },
        );
        assert_eq!(exhausted.code, BOOT_EXHAUSTED);
        assert_eq!(missing.code, DEVICE_UNAVAILABLE);
    }

    #[test]
    fn busy_device_maps_to_busy() {
        let err = boot_error(
            "boot failed",
            BootError::Device {
                device: "serial port",
                source: TransportError::Open {
                    path: PathBuf::from("/dev/s3c2410_serial3"),
                    source: io::ErrorKind::ResourceBusy.into(),
                },
            },
        );
        assert_eq!(err.code, DEVICE_BUSY);
        assert!(err.message.contains("serial port"));
    }

    #[test]
    fn framing_errors_are_data_invalid() {
        let err = frame_error(
            "decode failed",
            FrameError::Truncated {
                declared: 20,
                available: 8,
            },
        );
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn short_image_is_data_invalid() {
        let err = boot_error(
            "boot failed",
            BootError::Calibration {
                path: PathBuf::from("/efs/nv_data.bin"),
                source: io::ErrorKind::UnexpectedEof.into(),
            },
        );
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn config_errors_are_config_invalid() {
        let err = boot_error("config", BootError::Config("bad".into()));
        assert_eq!(err.code, CONFIG_INVALID);
    }

    #[cfg(not(target_os = "linux"))]
    #[test]
    fn unsupported_commands_exit_with_failure() {
        let err = unsupported("boot");
        assert_eq!(err.code, FAILURE);
        assert!(err.message.contains("boot"));
    }
}
