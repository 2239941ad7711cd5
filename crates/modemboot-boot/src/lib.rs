//! Baseband bootstrap: power cycle, PSI upload over raw serial, and firmware
//! plus calibration handoff through shared memory.
//!
//! [`Bootstrapper`] drives an explicit state machine ([`BootState`]) over a
//! [`BootPlatform`]. Handshake failures restart the whole power cycle, up to
//! a bounded number of attempts; structural failures end the boot at once.
//!
//! ```no_run
//! # #[cfg(target_os = "linux")]
//! # fn main() -> modemboot_boot::Result<()> {
//! use modemboot_boot::{BootConfig, Bootstrapper, HardwarePlatform};
//!
//! let config = BootConfig::default();
//! let platform = HardwarePlatform::from_config(&config);
//! let report = Bootstrapper::new(platform, config)?.boot()?;
//! println!("baseband up after {} attempt(s)", report.attempts);
//! # Ok(())
//! # }
//! # #[cfg(not(target_os = "linux"))]
//! # fn main() {}
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod image;
pub mod mock;
pub mod orchestrator;
pub mod platform;
pub mod psi;
pub mod state;

pub use config::{BootConfig, BootTiming, DevicePaths, ImageLayout, PsiProtocol};
pub use error::{BootError, HandshakeFailure, Result};
pub use image::{read_calibration, read_firmware};
pub use orchestrator::{BootReport, Bootstrapper};
pub use platform::BootPlatform;
#[cfg(target_os = "linux")]
pub use platform::HardwarePlatform;
pub use psi::{checksum, PsiLoader};
pub use state::{BootEvent, BootState};
