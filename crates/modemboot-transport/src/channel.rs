//! Logical sub-channel selectors.
//!
//! After bootstrap the baseband exposes two message channels over the same
//! Phonet interface, distinguished by resource id.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Interface the baseband channels are bound to.
pub const DEFAULT_INTERFACE: &str = "svnet0";

/// Phonet resource id of the control-plane channel.
pub const RESOURCE_FMT: u8 = 0x01;

/// Phonet resource id of the filesystem-plane channel.
pub const RESOURCE_RFS: u8 = 0x41;

/// Value stored in the RFS-identifying socket option.
pub const SOCKET_RFS_MAGIC: u32 = 0x80000;

/// Logical channel selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// Control plane.
    Fmt,
    /// Remote filesystem plane.
    Rfs,
}

impl ChannelKind {
    /// Lowercase name used in logs and CLI output.
    pub fn name(self) -> &'static str {
        match self {
            ChannelKind::Fmt => "fmt",
            ChannelKind::Rfs => "rfs",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Addressing parameters for the baseband channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChannelConfig {
    /// Network interface both channels bind to.
    pub interface: String,
    /// Phonet device address.
    pub device: u8,
    /// Resource id for [`ChannelKind::Fmt`].
    pub fmt_resource: u8,
    /// Resource id for [`ChannelKind::Rfs`].
    pub rfs_resource: u8,
    /// Value of the RFS socket option, set on RFS endpoints only.
    pub rfs_magic: u32,
}

impl ChannelConfig {
    /// Resolve a selector to its resource id.
    pub fn resource(&self, kind: ChannelKind) -> u8 {
        match kind {
            ChannelKind::Fmt => self.fmt_resource,
            ChannelKind::Rfs => self.rfs_resource,
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            interface: DEFAULT_INTERFACE.to_string(),
            device: 0,
            fmt_resource: RESOURCE_FMT,
            rfs_resource: RESOURCE_RFS,
            rfs_magic: SOCKET_RFS_MAGIC,
        }
    }
}
