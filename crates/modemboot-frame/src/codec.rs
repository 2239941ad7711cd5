use bytes::{Buf, BufMut, Bytes, BytesMut};
use modemboot_transport::ChannelKind;

use crate::error::{FrameError, Result};
use crate::message::{IpcMessage, GROUP_RFS};

/// FMT header: sequence (1) + ack (1) + group (1) + index (1) + type (2) + length (2).
pub const FMT_HEADER_SIZE: usize = 8;

/// RFS header: length (4) + command (1) + id (1).
pub const RFS_HEADER_SIZE: usize = 6;

/// Largest datagram the baseband exchanges on either channel.
pub const MAX_MODEM_DATA_SIZE: usize = 0x1000;

/// Control-plane header.
///
/// Wire format (little-endian, no padding):
/// ```text
/// ┌──────┬──────┬───────┬───────┬──────────┬────────────┬─────────────┐
/// │ seq  │ ack  │ group │ index │ type     │ length     │ payload     │
/// │ (1B) │ (1B) │ (1B)  │ (1B)  │ (2B LE)  │ (2B LE)    │             │
/// └──────┴──────┴───────┴───────┴──────────┴────────────┴─────────────┘
/// ```
/// `length` counts the header too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FmtHeader {
    pub sequence: u8,
    pub ack_sequence: u8,
    pub group: u8,
    pub index: u8,
    pub msg_type: u16,
    pub length: u16,
}

impl FmtHeader {
    /// Append the packed header to `dst`.
    pub fn put(&self, dst: &mut BytesMut) {
        dst.put_u8(self.sequence);
        dst.put_u8(self.ack_sequence);
        dst.put_u8(self.group);
        dst.put_u8(self.index);
        dst.put_u16_le(self.msg_type);
        dst.put_u16_le(self.length);
    }

    /// Parse a header from the front of `src`.
    pub fn parse(src: &[u8]) -> Result<Self> {
        if src.len() < FMT_HEADER_SIZE {
            return Err(FrameError::Truncated {
                declared: FMT_HEADER_SIZE,
                available: src.len(),
            });
        }
        let mut buf = &src[..FMT_HEADER_SIZE];
        Ok(Self {
            sequence: buf.get_u8(),
            ack_sequence: buf.get_u8(),
            group: buf.get_u8(),
            index: buf.get_u8(),
            msg_type: buf.get_u16_le(),
            length: buf.get_u16_le(),
        })
    }
}

/// Filesystem-plane header.
///
/// Wire format (little-endian, no padding):
/// ```text
/// ┌────────────┬─────────┬──────┬─────────────┐
/// │ length     │ command │ id   │ payload     │
/// │ (4B LE)    │ (1B)    │ (1B) │             │
/// └────────────┴─────────┴──────┴─────────────┘
/// ```
/// `length` counts the header too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RfsHeader {
    pub length: u32,
    pub command: u8,
    pub id: u8,
}

impl RfsHeader {
    /// Append the packed header to `dst`.
    pub fn put(&self, dst: &mut BytesMut) {
        dst.put_u32_le(self.length);
        dst.put_u8(self.command);
        dst.put_u8(self.id);
    }

    /// Parse a header from the front of `src`.
    pub fn parse(src: &[u8]) -> Result<Self> {
        if src.len() < RFS_HEADER_SIZE {
            return Err(FrameError::Truncated {
                declared: RFS_HEADER_SIZE,
                available: src.len(),
            });
        }
        let mut buf = &src[..RFS_HEADER_SIZE];
        Ok(Self {
            length: buf.get_u32_le(),
            command: buf.get_u8(),
            id: buf.get_u8(),
        })
    }
}

/// Encode `msg` as an FMT frame.
pub fn encode_fmt(msg: &IpcMessage, max_frame_size: usize) -> Result<Bytes> {
    let total = frame_size(FMT_HEADER_SIZE, msg, max_frame_size, u16::MAX as usize)?;
    let header = FmtHeader {
        sequence: msg.sequence,
        ack_sequence: msg.ack_sequence,
        group: msg.group,
        index: msg.index,
        msg_type: msg.msg_type,
        length: total as u16,
    };

    let mut dst = BytesMut::with_capacity(total);
    header.put(&mut dst);
    dst.put_slice(&msg.payload);
    Ok(dst.freeze())
}

/// Decode one FMT frame.
///
/// Bytes past the declared length are ignored.
pub fn decode_fmt(src: &[u8], max_frame_size: usize) -> Result<IpcMessage> {
    let header = FmtHeader::parse(src)?;
    let payload = payload_slice(src, header.length as usize, FMT_HEADER_SIZE, max_frame_size)?;
    Ok(IpcMessage {
        sequence: header.sequence,
        ack_sequence: header.ack_sequence,
        group: header.group,
        index: header.index,
        msg_type: header.msg_type,
        payload: Bytes::copy_from_slice(payload),
    })
}

/// Encode `msg` as an RFS frame.
///
/// Only `sequence` (as the frame id), `index` (as the command) and the
/// payload are carried. RFS frames must stay strictly below
/// `max_frame_size`.
pub fn encode_rfs(msg: &IpcMessage, max_frame_size: usize) -> Result<Bytes> {
    let total = frame_size(
        RFS_HEADER_SIZE,
        msg,
        rfs_limit(max_frame_size),
        u32::MAX as usize,
    )?;
    let header = RfsHeader {
        length: total as u32,
        command: msg.index,
        id: msg.sequence,
    };

    let mut dst = BytesMut::with_capacity(total);
    header.put(&mut dst);
    dst.put_slice(&msg.payload);
    Ok(dst.freeze())
}

/// Decode one RFS frame.
///
/// The frame id becomes `ack_sequence`, the command becomes `index`, the
/// group is always [`GROUP_RFS`], and `sequence`/`msg_type` are zero.
/// A declared length of `max_frame_size` or more is rejected.
pub fn decode_rfs(src: &[u8], max_frame_size: usize) -> Result<IpcMessage> {
    let header = RfsHeader::parse(src)?;
    let declared = usize::try_from(header.length).unwrap_or(usize::MAX);
    let payload = payload_slice(src, declared, RFS_HEADER_SIZE, rfs_limit(max_frame_size))?;
    Ok(IpcMessage {
        sequence: 0,
        ack_sequence: header.id,
        group: GROUP_RFS,
        index: header.command,
        msg_type: 0,
        payload: Bytes::copy_from_slice(payload),
    })
}

/// Largest RFS frame accepted: the receive buffer is `max_frame_size` bytes
/// and a frame filling it is treated as overrun.
fn rfs_limit(max_frame_size: usize) -> usize {
    max_frame_size.saturating_sub(1)
}

fn frame_size(
    header: usize,
    msg: &IpcMessage,
    max_frame_size: usize,
    field_max: usize,
) -> Result<usize> {
    let total = header.saturating_add(msg.payload.len());
    let max = max_frame_size.min(field_max);
    if total > max {
        return Err(FrameError::FrameTooLarge { size: total, max });
    }
    Ok(total)
}

fn payload_slice(
    src: &[u8],
    declared: usize,
    header: usize,
    max_frame_size: usize,
) -> Result<&[u8]> {
    if declared < header {
        return Err(FrameError::LengthBelowHeader { declared, header });
    }
    if declared > max_frame_size {
        return Err(FrameError::FrameTooLarge {
            size: declared,
            max: max_frame_size,
        });
    }
    if declared > src.len() {
        return Err(FrameError::Truncated {
            declared,
            available: src.len(),
        });
    }
    Ok(&src[header..declared])
}

/// Configuration for the message codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum frame size in bytes, header included. Default: 4 KiB.
    pub max_frame_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: MAX_MODEM_DATA_SIZE,
        }
    }
}

/// Codec bound to one logical channel's header shape.
#[derive(Debug, Clone)]
pub struct ChannelCodec {
    kind: ChannelKind,
    config: FrameConfig,
}

impl ChannelCodec {
    /// Codec for `kind` with default configuration.
    pub fn new(kind: ChannelKind) -> Self {
        Self::with_config(kind, FrameConfig::default())
    }

    /// Codec for `kind` with explicit configuration.
    pub fn with_config(kind: ChannelKind, config: FrameConfig) -> Self {
        Self { kind, config }
    }

    /// Channel this codec frames for.
    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// Current configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Header size of this channel's frames.
    pub fn header_size(&self) -> usize {
        match self.kind {
            ChannelKind::Fmt => FMT_HEADER_SIZE,
            ChannelKind::Rfs => RFS_HEADER_SIZE,
        }
    }

    pub fn encode(&self, msg: &IpcMessage) -> Result<Bytes> {
        match self.kind {
            ChannelKind::Fmt => encode_fmt(msg, self.config.max_frame_size),
            ChannelKind::Rfs => encode_rfs(msg, self.config.max_frame_size),
        }
    }

    pub fn decode(&self, src: &[u8]) -> Result<IpcMessage> {
        match self.kind {
            ChannelKind::Fmt => decode_fmt(src, self.config.max_frame_size),
            ChannelKind::Rfs => decode_rfs(src, self.config.max_frame_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> IpcMessage {
        IpcMessage::new(0x05, 0x01, b"hello, baseband".to_vec())
            .with_sequence(0x12)
            .with_ack_sequence(0x34)
            .with_type(0x0203)
    }

    #[test]
    fn fmt_roundtrip_preserves_every_field() {
        let msg = sample();
        let wire = encode_fmt(&msg, MAX_MODEM_DATA_SIZE).unwrap();
        assert_eq!(wire.len(), FMT_HEADER_SIZE + msg.length());

        let decoded = decode_fmt(&wire, MAX_MODEM_DATA_SIZE).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn fmt_header_layout_is_little_endian() {
        let wire = encode_fmt(&sample(), MAX_MODEM_DATA_SIZE).unwrap();
        let total = (FMT_HEADER_SIZE + 15) as u16;
        assert_eq!(
            &wire[..FMT_HEADER_SIZE],
            &[0x12, 0x34, 0x05, 0x01, 0x03, 0x02, total as u8, (total >> 8) as u8]
        );
    }

    #[test]
    fn fmt_empty_payload() {
        let msg = IpcMessage::new(1, 2, Bytes::new());
        let wire = encode_fmt(&msg, MAX_MODEM_DATA_SIZE).unwrap();
        assert_eq!(wire.len(), FMT_HEADER_SIZE);
        let decoded = decode_fmt(&wire, MAX_MODEM_DATA_SIZE).unwrap();
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn rfs_roundtrip_applies_field_mapping() {
        let msg = sample();
        let wire = encode_rfs(&msg, MAX_MODEM_DATA_SIZE).unwrap();
        assert_eq!(wire.len(), RFS_HEADER_SIZE + msg.length());

        let decoded = decode_rfs(&wire, MAX_MODEM_DATA_SIZE).unwrap();
        assert_eq!(decoded.ack_sequence, msg.sequence);
        assert_eq!(decoded.index, msg.index);
        assert_eq!(decoded.group, GROUP_RFS);
        assert_eq!(decoded.sequence, 0);
        assert_eq!(decoded.msg_type, 0);
        assert_eq!(decoded.payload, msg.payload);
    }

    #[test]
    fn rfs_header_layout() {
        let msg = IpcMessage::new(0, 0x07, vec![0xEE; 2]).with_sequence(0x09);
        let wire = encode_rfs(&msg, MAX_MODEM_DATA_SIZE).unwrap();
        assert_eq!(&wire[..], &[8, 0, 0, 0, 0x07, 0x09, 0xEE, 0xEE]);
    }

    #[test]
    fn decode_rejects_short_header() {
        let err = decode_fmt(&[1, 2, 3], MAX_MODEM_DATA_SIZE).unwrap_err();
        assert!(matches!(
            err,
            FrameError::Truncated {
                declared: FMT_HEADER_SIZE,
                available: 3
            }
        ));
        let err = decode_rfs(&[], MAX_MODEM_DATA_SIZE).unwrap_err();
        assert!(matches!(err, FrameError::Truncated { .. }));
    }

    #[test]
    fn decode_rejects_length_below_header() {
        let mut wire = encode_fmt(&sample(), MAX_MODEM_DATA_SIZE).unwrap().to_vec();
        wire[6] = 4;
        wire[7] = 0;
        let err = decode_fmt(&wire, MAX_MODEM_DATA_SIZE).unwrap_err();
        assert!(matches!(err, FrameError::LengthBelowHeader { declared: 4, .. }));

        let err = decode_rfs(&[0, 0, 0, 0, 1, 1], MAX_MODEM_DATA_SIZE).unwrap_err();
        assert!(matches!(err, FrameError::LengthBelowHeader { declared: 0, .. }));
    }

    #[test]
    fn decode_rejects_truncated_payload() {
        let wire = encode_fmt(&sample(), MAX_MODEM_DATA_SIZE).unwrap();
        let err = decode_fmt(&wire[..wire.len() - 1], MAX_MODEM_DATA_SIZE).unwrap_err();
        assert!(matches!(err, FrameError::Truncated { .. }));

        let wire = encode_rfs(&sample(), MAX_MODEM_DATA_SIZE).unwrap();
        let err = decode_rfs(&wire[..wire.len() - 2], MAX_MODEM_DATA_SIZE).unwrap_err();
        assert!(matches!(err, FrameError::Truncated { .. }));
    }

    #[test]
    fn decode_rejects_oversized_declared_length() {
        let mut wire = BytesMut::new();
        RfsHeader {
            length: 0x7FFF_FFFF,
            command: 1,
            id: 1,
        }
        .put(&mut wire);
        let err = decode_rfs(&wire, MAX_MODEM_DATA_SIZE).unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { .. }));
    }

    #[test]
    fn decode_ignores_trailing_bytes() {
        let msg = sample();
        let mut wire = encode_fmt(&msg, MAX_MODEM_DATA_SIZE).unwrap().to_vec();
        wire.extend_from_slice(&[0; 32]);
        assert_eq!(decode_fmt(&wire, MAX_MODEM_DATA_SIZE).unwrap(), msg);
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let msg = IpcMessage::new(1, 1, vec![0; MAX_MODEM_DATA_SIZE]);
        let err = encode_fmt(&msg, MAX_MODEM_DATA_SIZE).unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { .. }));
        let err = encode_rfs(&msg, MAX_MODEM_DATA_SIZE).unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { .. }));
    }

    #[test]
    fn fmt_accepts_frames_up_to_the_limit() {
        for len in [0, MAX_MODEM_DATA_SIZE - FMT_HEADER_SIZE] {
            let msg = IpcMessage::new(1, 1, vec![0xA5; len]);
            let wire = encode_fmt(&msg, MAX_MODEM_DATA_SIZE).unwrap();
            assert_eq!(wire.len(), FMT_HEADER_SIZE + len);
            assert_eq!(decode_fmt(&wire, MAX_MODEM_DATA_SIZE).unwrap(), msg);
        }

        let over = IpcMessage::new(1, 1, vec![0; MAX_MODEM_DATA_SIZE - FMT_HEADER_SIZE + 1]);
        assert!(matches!(
            encode_fmt(&over, MAX_MODEM_DATA_SIZE).unwrap_err(),
            FrameError::FrameTooLarge {
                size: 0x1001,
                max: MAX_MODEM_DATA_SIZE
            }
        ));
        let wire = encode_fmt(&over, usize::MAX).unwrap();
        assert!(matches!(
            decode_fmt(&wire, MAX_MODEM_DATA_SIZE).unwrap_err(),
            FrameError::FrameTooLarge { size: 0x1001, .. }
        ));
    }

    #[test]
    fn rfs_frames_must_stay_below_the_limit() {
        let largest = MAX_MODEM_DATA_SIZE - RFS_HEADER_SIZE - 1;
        for len in [0, largest] {
            let msg = IpcMessage::new(0, 3, vec![0x5A; len]).with_sequence(2);
            let wire = encode_rfs(&msg, MAX_MODEM_DATA_SIZE).unwrap();
            assert_eq!(wire.len(), RFS_HEADER_SIZE + len);
            let decoded = decode_rfs(&wire, MAX_MODEM_DATA_SIZE).unwrap();
            assert_eq!(decoded.payload, msg.payload);
            assert_eq!(decoded.ack_sequence, 2);
        }

        let full = IpcMessage::new(0, 3, vec![0; MAX_MODEM_DATA_SIZE - RFS_HEADER_SIZE]);
        assert!(matches!(
            encode_rfs(&full, MAX_MODEM_DATA_SIZE).unwrap_err(),
            FrameError::FrameTooLarge {
                size: MAX_MODEM_DATA_SIZE,
                max: 0xFFF
            }
        ));
        let wire = encode_rfs(&full, usize::MAX).unwrap();
        assert_eq!(wire.len(), MAX_MODEM_DATA_SIZE);
        assert!(matches!(
            decode_rfs(&wire, MAX_MODEM_DATA_SIZE).unwrap_err(),
            FrameError::FrameTooLarge {
                size: MAX_MODEM_DATA_SIZE,
                ..
            }
        ));

        let over = IpcMessage::new(0, 3, vec![0; MAX_MODEM_DATA_SIZE - RFS_HEADER_SIZE + 1]);
        assert!(matches!(
            encode_rfs(&over, MAX_MODEM_DATA_SIZE).unwrap_err(),
            FrameError::FrameTooLarge { .. }
        ));
    }

    #[test]
    fn fmt_length_field_caps_configured_limit() {
        let msg = IpcMessage::new(1, 1, vec![0; u16::MAX as usize]);
        let err = encode_fmt(&msg, usize::MAX).unwrap_err();
        assert!(matches!(
            err,
            FrameError::FrameTooLarge {
                max: 0xFFFF,
                ..
            }
        ));
    }

    #[test]
    fn channel_codec_dispatches_on_kind() {
        let msg = sample();
        let fmt = ChannelCodec::new(ChannelKind::Fmt);
        let rfs = ChannelCodec::new(ChannelKind::Rfs);
        assert_eq!(fmt.encode(&msg).unwrap().len(), fmt.header_size() + msg.length());
        assert_eq!(rfs.encode(&msg).unwrap().len(), rfs.header_size() + msg.length());
        assert_eq!(fmt.decode(&fmt.encode(&msg).unwrap()).unwrap(), msg);
        assert_eq!(rfs.decode(&rfs.encode(&msg).unwrap()).unwrap().group, GROUP_RFS);
    }
}
