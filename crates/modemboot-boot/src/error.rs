use std::path::PathBuf;

use modemboot_transport::TransportError;

/// Errors that end a boot invocation.
#[derive(Debug, thiserror::Error)]
pub enum BootError {
    /// A device node could not be opened or configured.
    #[error("{device} unavailable: {source}")]
    Device {
        device: &'static str,
        source: TransportError,
    },

    /// Transport-level error outside the handshake itself.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The boot configuration is inconsistent.
    #[error("invalid boot configuration: {0}")]
    Config(String),

    /// The firmware image could not be read.
    #[error("failed to read firmware from {path}: {source}")]
    Firmware {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The calibration data could not be read.
    #[error("failed to read calibration data from {path}: {source}")]
    Calibration {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Every attempt aborted on a handshake failure.
    #[error("baseband boot failed after {attempts} attempts{}", describe_last(.last))]
    ExhaustedRetries {
        attempts: u32,
        last: Option<HandshakeFailure>,
    },
}

fn describe_last(last: &Option<HandshakeFailure>) -> String {
    match last {
        Some(failure) => format!(" (last: {failure})"),
        None => String::new(),
    }
}

/// Recoverable reasons an attempt aborted.
///
/// Each of these sends the orchestrator back through a full power cycle.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeFailure {
    /// The bootcore announced an unexpected version.
    #[error("unexpected bootcore version {got:#04x} (expected {expected:#04x})")]
    BadVersion { expected: u8, got: u8 },

    /// The device did not become ready within the step timeout.
    #[error("timed out waiting for {step}")]
    ReadinessTimeout { step: &'static str },

    /// No acknowledgement byte arrived within the poll bound.
    #[error("PSI acknowledgement not observed after {reads} reads")]
    AckNotObserved { reads: usize },

    /// A shared memory sentinel carried the wrong value.
    #[error("{stage} sentinel mismatch: got {got:#010x}, expected {expected:#010x}")]
    SentinelMismatch {
        stage: &'static str,
        expected: u32,
        got: u32,
    },

    /// The serial link reported end of file.
    #[error("serial link closed during {step}")]
    LinkClosed { step: &'static str },

    /// An I/O error during a handshake step.
    #[error("{step} failed: {source}")]
    Io {
        step: &'static str,
        source: TransportError,
    },

    /// The shared memory window could not be mapped.
    #[error("shared memory map failed: {0}")]
    MapFailed(TransportError),

    /// The release-semaphore command failed.
    #[error("release semaphore failed: {0}")]
    SemaphoreRelease(TransportError),
}

impl HandshakeFailure {
    pub(crate) fn io(step: &'static str) -> impl FnOnce(TransportError) -> Self {
        move |source| HandshakeFailure::Io { step, source }
    }
}

/// Outcome of a failed attempt, split by whether it is worth retrying.
#[derive(Debug)]
pub(crate) enum AttemptError {
    Transient(HandshakeFailure),
    Fatal(BootError),
}

impl From<HandshakeFailure> for AttemptError {
    fn from(failure: HandshakeFailure) -> Self {
        AttemptError::Transient(failure)
    }
}

impl From<BootError> for AttemptError {
    fn from(err: BootError) -> Self {
        AttemptError::Fatal(err)
    }
}

pub type Result<T> = std::result::Result<T, BootError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_retries_names_last_failure() {
        let err = BootError::ExhaustedRetries {
            attempts: 5,
            last: Some(HandshakeFailure::AckNotObserved { reads: 50 }),
        };
        let text = err.to_string();
        assert!(text.contains("after 5 attempts"));
        assert!(text.contains("50 reads"));
    }

    #[test]
    fn sentinel_mismatch_formats_words() {
        let failure = HandshakeFailure::SentinelMismatch {
            stage: "init",
            expected: 0x1234_1234,
            got: 0,
        };
        assert_eq!(
            failure.to_string(),
            "init sentinel mismatch: got 0x00000000, expected 0x12341234"
        );
    }
}
