use std::time::Duration;

use modemboot_transport::{ChannelKind, Transport};

use crate::codec::{ChannelCodec, FrameConfig};
use crate::error::{FrameError, Result};
use crate::message::IpcMessage;

/// Sends and receives [`IpcMessage`]s over one datagram transport.
///
/// Every `send` is exactly one datagram, and every `recv` consumes exactly
/// one. The header shape follows the channel kind.
pub struct MessageChannel<T> {
    inner: T,
    codec: ChannelCodec,
    buf: Vec<u8>,
}

impl<T: Transport> MessageChannel<T> {
    /// Create a channel with default configuration.
    pub fn new(inner: T, kind: ChannelKind) -> Self {
        Self::with_config(inner, kind, FrameConfig::default())
    }

    /// Create a channel with explicit configuration.
    pub fn with_config(inner: T, kind: ChannelKind, config: FrameConfig) -> Self {
        let buf = vec![0u8; config.max_frame_size];
        Self {
            inner,
            codec: ChannelCodec::with_config(kind, config),
            buf,
        }
    }

    /// Encode and send one message.
    pub fn send(&mut self, msg: &IpcMessage) -> Result<()> {
        let wire = self.codec.encode(msg)?;
        let written = self.inner.write(&wire)?;
        if written != wire.len() {
            return Err(FrameError::ShortWrite {
                written,
                expected: wire.len(),
            });
        }
        tracing::debug!(
            channel = %self.codec.kind(),
            group = msg.group,
            index = msg.index,
            seq = msg.sequence,
            len = wire.len(),
            "sent message"
        );
        tracing::trace!(channel = %self.codec.kind(), bytes = ?&wire[..], "datagram out");
        Ok(())
    }

    /// Receive and decode the next datagram (blocking).
    pub fn recv(&mut self) -> Result<IpcMessage> {
        let read = self.inner.read(&mut self.buf)?;
        let datagram = &self.buf[..read];
        tracing::trace!(channel = %self.codec.kind(), bytes = ?datagram, "datagram in");

        let msg = self.codec.decode(datagram)?;
        tracing::debug!(
            channel = %self.codec.kind(),
            group = msg.group,
            index = msg.index,
            ack = msg.ack_sequence,
            len = read,
            "received message"
        );
        Ok(msg)
    }

    /// Receive the next message if one arrives within `timeout`.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<IpcMessage>> {
        if !self.inner.wait_readable(timeout)? {
            return Ok(None);
        }
        self.recv().map(Some)
    }

    /// Channel kind this endpoint frames for.
    pub fn kind(&self) -> ChannelKind {
        self.codec.kind()
    }

    /// Current framing configuration.
    pub fn config(&self) -> &FrameConfig {
        self.codec.config()
    }

    /// Borrow the underlying transport.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying transport.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the channel and return the inner transport.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use modemboot_transport::mock::MockTransport;
    use modemboot_transport::{Result as TransportResult, TransportError};

    use super::*;
    use crate::codec::{encode_fmt, encode_rfs, FMT_HEADER_SIZE, MAX_MODEM_DATA_SIZE};
    use crate::message::GROUP_RFS;

    #[test]
    fn send_writes_one_datagram_per_message() {
        let transport = MockTransport::new();
        let handle = transport.handle();
        let mut channel = MessageChannel::new(transport, ChannelKind::Fmt);

        channel.send(&IpcMessage::new(5, 1, b"one".to_vec())).unwrap();
        channel.send(&IpcMessage::new(5, 2, b"two".to_vec())).unwrap();

        let writes = handle.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].len(), FMT_HEADER_SIZE + 3);
        assert_eq!(writes[1][3], 2);
    }

    #[test]
    fn recv_decodes_fmt_datagram() {
        let msg = IpcMessage::new(0x0A, 0x03, b"status".to_vec()).with_ack_sequence(7);
        let wire = encode_fmt(&msg, MAX_MODEM_DATA_SIZE).unwrap();
        let transport = MockTransport::new().with_inbound(wire.to_vec());

        let mut channel = MessageChannel::new(transport, ChannelKind::Fmt);
        assert_eq!(channel.recv().unwrap(), msg);
    }

    #[test]
    fn recv_decodes_rfs_datagram() {
        let msg = IpcMessage::new(0, 0x11, b"open".to_vec()).with_sequence(9);
        let wire = encode_rfs(&msg, MAX_MODEM_DATA_SIZE).unwrap();
        let transport = MockTransport::new().with_inbound(wire.to_vec());

        let mut channel = MessageChannel::new(transport, ChannelKind::Rfs);
        let received = channel.recv().unwrap();
        assert_eq!(received.group, GROUP_RFS);
        assert_eq!(received.ack_sequence, 9);
        assert_eq!(received.index, 0x11);
        assert_eq!(received.payload.as_ref(), b"open");
    }

    #[test]
    fn recv_rejects_malformed_datagram() {
        let transport = MockTransport::new().with_inbound(vec![1, 2, 3]);
        let mut channel = MessageChannel::new(transport, ChannelKind::Fmt);
        assert!(matches!(channel.recv().unwrap_err(), FrameError::Truncated { .. }));
    }

    #[test]
    fn recv_timeout_returns_none_when_idle() {
        let mut channel = MessageChannel::new(MockTransport::new(), ChannelKind::Fmt);
        assert!(channel.recv_timeout(Duration::from_millis(10)).unwrap().is_none());
    }

    #[test]
    fn oversized_message_is_not_written() {
        let transport = MockTransport::new();
        let handle = transport.handle();
        let mut channel = MessageChannel::new(transport, ChannelKind::Rfs);

        let err = channel
            .send(&IpcMessage::new(0, 1, vec![0; MAX_MODEM_DATA_SIZE]))
            .unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { .. }));
        assert!(handle.writes().is_empty());
    }

    #[test]
    fn transport_failure_is_propagated() {
        let transport = MockTransport::new().failing_writes();
        let mut channel = MessageChannel::new(transport, ChannelKind::Fmt);
        let err = channel.send(&IpcMessage::default()).unwrap_err();
        assert!(matches!(err, FrameError::Transport(_)));
    }

    struct HalfWriter;

    impl Transport for HalfWriter {
        fn read(&mut self, _buf: &mut [u8]) -> TransportResult<usize> {
            Err(TransportError::Io(std::io::ErrorKind::WouldBlock.into()))
        }

        fn write(&mut self, buf: &[u8]) -> TransportResult<usize> {
            Ok(buf.len() / 2)
        }

        fn wait_readable(&mut self, _timeout: Duration) -> TransportResult<bool> {
            Ok(false)
        }

        fn wait_writable(&mut self, _timeout: Duration) -> TransportResult<bool> {
            Ok(true)
        }

        fn transport_name(&self) -> &'static str {
            "half"
        }
    }

    #[test]
    fn short_write_is_reported() {
        let mut channel = MessageChannel::new(HalfWriter, ChannelKind::Fmt);
        let err = channel.send(&IpcMessage::new(1, 1, b"abcd".to_vec())).unwrap_err();
        assert!(matches!(
            err,
            FrameError::ShortWrite {
                written: 6,
                expected: 12
            }
        ));
    }
}
