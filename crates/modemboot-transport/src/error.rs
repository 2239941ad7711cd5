use std::path::PathBuf;

use crate::channel::ChannelKind;

/// Errors that can occur in baseband transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open a device node or control file.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to configure an opened device (termios, socket options).
    #[error("failed to configure {target}: {source}")]
    Configure {
        target: String,
        source: std::io::Error,
    },

    /// Failed to create or bind a logical channel endpoint.
    #[error("failed to set up {channel} channel on {interface} ({stage}): {source}")]
    Channel {
        channel: ChannelKind,
        interface: String,
        stage: &'static str,
        source: std::io::Error,
    },

    /// A network interface flag query or update failed.
    #[error("interface {name}: {source}")]
    Interface {
        name: String,
        source: std::io::Error,
    },

    /// The interface name does not fit into `IFNAMSIZ`.
    #[error("interface name too long ({len} bytes, max {max}): {name}")]
    InterfaceNameTooLong { name: String, len: usize, max: usize },

    /// Writing a power command failed.
    #[error("power control via {path} failed: {source}")]
    Power {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Mapping the shared memory window failed.
    #[error("failed to map {len} bytes of shared memory: {source}")]
    Map { len: usize, source: std::io::Error },

    /// A shared memory write falls outside the mapped window.
    #[error("shared memory write out of bounds (offset {offset}, len {len}, window {window})")]
    OutOfBounds {
        offset: usize,
        len: usize,
        window: usize,
    },

    /// A shared memory operation was issued in the wrong order.
    #[error("shared memory {operation} rejected: {reason}")]
    OutOfOrder {
        operation: &'static str,
        reason: &'static str,
    },

    /// An I/O error occurred on an open transport.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
