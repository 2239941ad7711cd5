//! Message framing for the baseband's logical IPC channels.
//!
//! Two header shapes share one message model:
//! - FMT (control plane): 8-byte header with sequence, ack, group, index,
//!   type and a 16-bit total length
//! - RFS (remote filesystem): 6-byte header with a 32-bit total length,
//!   command and id
//!
//! Each datagram carries exactly one frame.

pub mod channel;
pub mod codec;
pub mod error;
pub mod message;

pub use channel::MessageChannel;
pub use codec::{
    decode_fmt, decode_rfs, encode_fmt, encode_rfs, ChannelCodec, FmtHeader, FrameConfig,
    RfsHeader, FMT_HEADER_SIZE, MAX_MODEM_DATA_SIZE, RFS_HEADER_SIZE,
};
pub use error::{FrameError, Result};
pub use message::{IpcMessage, GROUP_RFS};
