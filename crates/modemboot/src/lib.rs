//! Baseband bootstrap and messaging for XMM-class cellular modems.
//!
//! modemboot powers the baseband on, uploads the secondary bootloader over a
//! raw serial link, hands the firmware and calibration data over through
//! shared memory, and then exchanges framed messages on the FMT and RFS
//! channels.
//!
//! # Crate Structure
//!
//! - [`transport`]: Device bindings (serial, Phonet channels, shared memory, power)
//! - [`frame`]: FMT/RFS message framing
//! - [`boot`]: Boot state machine and PSI loader

/// Re-export transport types.
pub mod transport {
    pub use modemboot_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use modemboot_frame::*;
}

/// Re-export boot types.
pub mod boot {
    pub use modemboot_boot::*;
}
