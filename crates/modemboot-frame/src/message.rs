use bytes::Bytes;

/// Group id reported for every message received on the RFS channel.
pub const GROUP_RFS: u8 = 0x42;

/// Logical message exchanged with the baseband after bootstrap.
///
/// The payload is owned; decoding hands it to the caller, and dropping the
/// message releases it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpcMessage {
    /// Request-side sequence number.
    pub sequence: u8,
    /// Sequence number of the request this message answers.
    pub ack_sequence: u8,
    /// Command group.
    pub group: u8,
    /// Command index within the group.
    pub index: u8,
    /// Request/response type discriminator.
    pub msg_type: u16,
    /// Message body, excluding any header.
    pub payload: Bytes,
}

impl IpcMessage {
    /// Create a message for `group`/`index` carrying `payload`.
    pub fn new(group: u8, index: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            group,
            index,
            payload: payload.into(),
            ..Self::default()
        }
    }

    /// Set the request sequence number.
    pub fn with_sequence(mut self, sequence: u8) -> Self {
        self.sequence = sequence;
        self
    }

    /// Set the acknowledged sequence number.
    pub fn with_ack_sequence(mut self, ack_sequence: u8) -> Self {
        self.ack_sequence = ack_sequence;
        self
    }

    /// Set the type discriminator.
    pub fn with_type(mut self, msg_type: u16) -> Self {
        self.msg_type = msg_type;
        self
    }

    /// Payload length in bytes.
    pub fn length(&self) -> usize {
        self.payload.len()
    }

    /// Combined command identifier, `group << 8 | index`.
    pub fn command(&self) -> u16 {
        u16::from(self.group) << 8 | u16::from(self.index)
    }
}
