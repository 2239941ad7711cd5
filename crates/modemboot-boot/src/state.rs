use std::fmt;

use serde::Serialize;

/// Phases of one boot invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BootState {
    Idle,
    PowerCycle,
    SerialHandshake,
    ImageTransfer,
    AwaitAck,
    SharedMemInit,
    FirmwareCopy,
    CalibrationCopy,
    ReleaseSemaphore,
    DeinitHandshake,
    Complete,
    Retry,
    Failed,
}

/// Inputs to [`BootState::transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BootEvent {
    /// The current step finished.
    Advanced,
    /// The current step failed in a way a new power cycle may fix.
    TransientFailure,
    /// The current step failed in a way retrying cannot fix.
    FatalFailure,
    /// Retry budget remains.
    RetryGranted,
    /// Retry budget is spent.
    RetryDenied,
}

impl BootState {
    /// Next state for `event`.
    ///
    /// Total over all pairs. Terminal states absorb every event, and an event
    /// that makes no sense for the current state ends in `Failed`.
    pub fn transition(self, event: BootEvent) -> BootState {
        use BootEvent::*;
        use BootState::*;

        match (self, event) {
            (Complete, _) | (Failed, _) => self,
            (_, FatalFailure) => Failed,

            (Retry, RetryGranted) => PowerCycle,
            (Retry, RetryDenied) => Failed,
            (Retry, _) => Failed,

            (state, TransientFailure) if state.is_retryable() => Retry,
            (_, TransientFailure) => Failed,

            (Idle, Advanced) => PowerCycle,
            (PowerCycle, Advanced) => SerialHandshake,
            (SerialHandshake, Advanced) => ImageTransfer,
            (ImageTransfer, Advanced) => AwaitAck,
            (AwaitAck, Advanced) => SharedMemInit,
            (SharedMemInit, Advanced) => FirmwareCopy,
            (FirmwareCopy, Advanced) => CalibrationCopy,
            (CalibrationCopy, Advanced) => ReleaseSemaphore,
            (ReleaseSemaphore, Advanced) => DeinitHandshake,
            (DeinitHandshake, Advanced) => Complete,

            (_, RetryGranted) | (_, RetryDenied) => Failed,
        }
    }

    /// Whether a transient failure in this state leads to `Retry`.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            BootState::SerialHandshake
                | BootState::ImageTransfer
                | BootState::AwaitAck
                | BootState::SharedMemInit
                | BootState::FirmwareCopy
                | BootState::CalibrationCopy
                | BootState::ReleaseSemaphore
                | BootState::DeinitHandshake
        )
    }

    /// Whether the state ends the invocation.
    pub fn is_terminal(self) -> bool {
        matches!(self, BootState::Complete | BootState::Failed)
    }

    pub fn name(self) -> &'static str {
        match self {
            BootState::Idle => "idle",
            BootState::PowerCycle => "power_cycle",
            BootState::SerialHandshake => "serial_handshake",
            BootState::ImageTransfer => "image_transfer",
            BootState::AwaitAck => "await_ack",
            BootState::SharedMemInit => "shared_mem_init",
            BootState::FirmwareCopy => "firmware_copy",
            BootState::CalibrationCopy => "calibration_copy",
            BootState::ReleaseSemaphore => "release_semaphore",
            BootState::DeinitHandshake => "deinit_handshake",
            BootState::Complete => "complete",
            BootState::Retry => "retry",
            BootState::Failed => "failed",
        }
    }
}

impl fmt::Display for BootState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::BootEvent::*;
    use super::BootState::*;
    use super::*;

    const ALL_STATES: [BootState; 13] = [
        Idle,
        PowerCycle,
        SerialHandshake,
        ImageTransfer,
        AwaitAck,
        SharedMemInit,
        FirmwareCopy,
        CalibrationCopy,
        ReleaseSemaphore,
        DeinitHandshake,
        Complete,
        Retry,
        Failed,
    ];

    const ALL_EVENTS: [BootEvent; 5] = [
        Advanced,
        TransientFailure,
        FatalFailure,
        RetryGranted,
        RetryDenied,
    ];

    #[test]
    fn happy_path_reaches_complete() {
        let mut state = Idle;
        let mut visited = vec![state];
        while !state.is_terminal() {
            state = state.transition(Advanced);
            visited.push(state);
        }
        assert_eq!(
            visited,
            vec![
                Idle,
                PowerCycle,
                SerialHandshake,
                ImageTransfer,
                AwaitAck,
                SharedMemInit,
                FirmwareCopy,
                CalibrationCopy,
                ReleaseSemaphore,
                DeinitHandshake,
                Complete,
            ]
        );
    }

    #[test]
    fn transient_failures_retry_from_handshake_states() {
        for state in ALL_STATES.into_iter().filter(|s| s.is_retryable()) {
            assert_eq!(state.transition(TransientFailure), Retry, "{state}");
        }
        assert_eq!(Idle.transition(TransientFailure), Failed);
        assert_eq!(PowerCycle.transition(TransientFailure), Failed);
    }

    #[test]
    fn retry_edge_is_first_class() {
        assert_eq!(Retry.transition(RetryGranted), PowerCycle);
        assert_eq!(Retry.transition(RetryDenied), Failed);
        assert_eq!(Retry.transition(Advanced), Failed);
    }

    #[test]
    fn fatal_failure_always_fails() {
        for state in ALL_STATES.into_iter().filter(|s| !s.is_terminal()) {
            assert_eq!(state.transition(FatalFailure), Failed, "{state}");
        }
    }

    #[test]
    fn terminal_states_absorb_every_event() {
        for event in ALL_EVENTS {
            assert_eq!(Complete.transition(event), Complete);
            assert_eq!(Failed.transition(event), Failed);
        }
    }

    #[test]
    fn stray_retry_decisions_fail() {
        assert_eq!(AwaitAck.transition(RetryGranted), Failed);
        assert_eq!(Idle.transition(RetryDenied), Failed);
    }
}
