//! Device bindings for baseband bootstrap and messaging.
//!
//! This is the lowest layer of modemboot. It provides:
//! - the [`Transport`] capability over which bytes move (raw serial during
//!   PSI loading, addressed Phonet datagram channels afterwards)
//! - baseband power control through the modem class sysfs files
//! - the shared memory window used for the firmware/calibration handoff
//! - in-memory mocks of all of the above for protocol tests
//!
//! Nothing here retries. Retry policy belongs to the boot orchestrator.

pub mod channel;
pub mod error;
pub mod mock;
pub mod shm;
pub mod traits;

#[cfg(target_os = "linux")]
pub mod mtd;
#[cfg(target_os = "linux")]
pub mod netif;
#[cfg(target_os = "linux")]
pub mod phonet;
#[cfg(target_os = "linux")]
pub mod power;
#[cfg(target_os = "linux")]
pub mod serial;
#[cfg(target_os = "linux")]
mod sys;

pub use channel::{ChannelConfig, ChannelKind};
pub use error::{Result, TransportError};
pub use shm::{SharedMemoryRegion, ShmDevice, ShmMapping};
pub use traits::{PowerControl, Transport};

#[cfg(target_os = "linux")]
pub use netif::NetInterface;
#[cfg(target_os = "linux")]
pub use phonet::PhonetChannel;
#[cfg(target_os = "linux")]
pub use power::SysfsPower;
#[cfg(target_os = "linux")]
pub use serial::SerialPort;
#[cfg(target_os = "linux")]
pub use shm::{MappedWindow, OnedramDevice};
