//! Logical I2C messages as supplied by a host, and their validated form.

use bitflags::bitflags;

use crate::error::{Error, MessageField, Result};

bitflags! {
    /// Per-message flags, bit-compatible with the kernel's `i2c_msg.flags`.
    ///
    /// Only [`RD`](Self::RD) is interpreted here. Every other bit, named or
    /// not, is handed to the driver untouched.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct MessageFlags: u16 {
        /// Read from the target into the message buffer.
        const RD           = 0x0001;
        /// Ten bit chip address.
        const TEN          = 0x0010;
        /// First received byte is the length of the rest.
        const RECV_LEN     = 0x0400;
        const NO_RD_ACK    = 0x0800;
        const IGNORE_NAK   = 0x1000;
        const REV_DIR_ADDR = 0x2000;
        /// Skip the repeated START before this message.
        const NOSTART      = 0x4000;
        /// Force a STOP after this message.
        const STOP         = 0x8000;
    }
}

impl MessageFlags {
    pub fn is_read(self) -> bool {
        self.contains(MessageFlags::RD)
    }
}

/// Third element of a host message: bytes to write or a count to read.
///
/// Which one is expected depends on the message flags, not on the variant
/// the host happened to pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload<'a> {
    Bytes(&'a [u8]),
    Len(i64),
    /// The host value could not be unpacked into a message at all.
    Malformed,
}

/// A message exactly as the host handed it over, before range checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMessage<'a> {
    pub addr: i64,
    pub flags: i64,
    pub payload: Payload<'a>,
}

impl<'a> RawMessage<'a> {
    pub fn write(addr: i64, flags: i64, data: &'a [u8]) -> Self {
        Self { addr, flags, payload: Payload::Bytes(data) }
    }

    pub fn read(addr: i64, flags: i64, len: i64) -> Self {
        let flags = flags | i64::from(MessageFlags::RD.bits());
        Self { addr, flags, payload: Payload::Len(len) }
    }

    /// Stand-in for a host value that is not an `(addr, flags, data)`
    /// triple. It fails validation with `invalid_message`.
    pub fn malformed() -> Self {
        Self { addr: 0, flags: 0, payload: Payload::Malformed }
    }

    /// Range-check this message, which sits at `index` in its transfer.
    ///
    /// The message shape is checked first, then address, flags and
    /// payload.
    pub fn validate(&self, index: usize) -> Result<Message<'a>> {
        let invalid = |field| Error::InvalidMessage { index, field };
        if self.payload == Payload::Malformed {
            return Err(invalid(MessageField::Shape));
        }

        let addr = u16::try_from(self.addr)
            .map_err(|_| invalid(MessageField::Addr))?;
        let flags = u16::try_from(self.flags)
            .map(MessageFlags::from_bits_retain)
            .map_err(|_| invalid(MessageField::Flags))?;

        let op = if flags.is_read() {
            match self.payload {
                Payload::Len(len) => Operation::Read(
                    u16::try_from(len).map_err(|_| invalid(MessageField::Len))?,
                ),
                _ => return Err(invalid(MessageField::Len)),
            }
        } else {
            match self.payload {
                Payload::Bytes(data) if data.len() <= usize::from(u16::MAX) => {
                    Operation::Write(data)
                }
                _ => return Err(invalid(MessageField::Buf)),
            }
        };

        Ok(Message { addr, flags, op })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation<'a> {
    /// Send these bytes.
    Write(&'a [u8]),
    /// Receive this many bytes.
    Read(u16),
}

/// A message whose address, flags and payload fit the kernel's 16-bit fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message<'a> {
    pub addr: u16,
    pub flags: MessageFlags,
    pub op: Operation<'a>,
}

/// Outcome of one message in a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// The write was carried out.
    Ok,
    /// Bytes received for a read, exactly as many as requested.
    Data(Vec<u8>),
}

impl Response {
    pub fn data(&self) -> Option<&[u8]> {
        match self {
            Response::Ok => None,
            Response::Data(data) => Some(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_flag_bits_pass_through() {
        let msg = RawMessage::write(0x50, 0x0200 | 0x8000, &[1]).validate(0).unwrap();
        assert_eq!(msg.flags.bits(), 0x8200);
        assert!(msg.flags.contains(MessageFlags::STOP));
    }

    #[test]
    fn read_bit_selects_length_payload() {
        let msg = RawMessage::read(0x68, 0, 6).validate(0).unwrap();
        assert_eq!(msg.op, Operation::Read(6));
        assert!(msg.flags.is_read());

        let msg = RawMessage::write(0x68, 0, &[0x75]).validate(0).unwrap();
        assert_eq!(msg.op, Operation::Write(&[0x75]));
    }

    #[test]
    fn address_is_checked_before_flags() {
        let raw = RawMessage { addr: 0x1_0000, flags: -1, payload: Payload::Len(1) };
        let err = raw.validate(2).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidMessage { index: 2, field: MessageField::Addr }
        ));
    }

    #[test]
    fn negative_values_are_out_of_range() {
        let err = RawMessage::write(-1, 0, &[]).validate(0).unwrap_err();
        assert!(matches!(err, Error::InvalidMessage { field: MessageField::Addr, .. }));

        let err = RawMessage::write(0x50, -4, &[]).validate(0).unwrap_err();
        assert!(matches!(err, Error::InvalidMessage { field: MessageField::Flags, .. }));

        let err = RawMessage::read(0x50, 0, -1).validate(0).unwrap_err();
        assert!(matches!(err, Error::InvalidMessage { field: MessageField::Len, .. }));
    }

    #[test]
    fn sixteen_bit_limits_are_inclusive() {
        let msg = RawMessage::read(0xFFFF, 0xFFFF, 0xFFFF).validate(0).unwrap();
        assert_eq!(msg.addr, u16::MAX);
        assert_eq!(msg.op, Operation::Read(u16::MAX));

        let err = RawMessage::read(0x50, 0, 0x1_0000).validate(0).unwrap_err();
        assert!(matches!(err, Error::InvalidMessage { field: MessageField::Len, .. }));
    }

    #[test]
    fn payload_shape_must_match_direction() {
        let raw = RawMessage { addr: 0x50, flags: 0, payload: Payload::Len(4) };
        let err = raw.validate(1).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidMessage { index: 1, field: MessageField::Buf }
        ));

        let raw = RawMessage { addr: 0x50, flags: 1, payload: Payload::Bytes(&[1]) };
        let err = raw.validate(0).unwrap_err();
        assert!(matches!(err, Error::InvalidMessage { field: MessageField::Len, .. }));
    }

    #[test]
    fn malformed_message_is_a_shape_error() {
        let err = RawMessage::malformed().validate(4).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidMessage { index: 4, field: MessageField::Shape }
        ));
        assert_eq!(err.kind().as_str(), "invalid_message");
    }

    #[test]
    fn oversized_write_is_rejected() {
        let big = vec![0u8; usize::from(u16::MAX) + 1];
        let err = RawMessage::write(0x50, 0, &big).validate(0).unwrap_err();
        assert!(matches!(err, Error::InvalidMessage { field: MessageField::Buf, .. }));

        let max = vec![0u8; usize::from(u16::MAX)];
        assert!(RawMessage::write(0x50, 0, &max).validate(0).is_ok());
    }

    #[test]
    fn zero_length_messages_are_valid() {
        let read = RawMessage::read(0x50, 0, 0).validate(0).unwrap();
        assert_eq!(read.op, Operation::Read(0));
        let write = RawMessage::write(0x50, 0, &[]).validate(0).unwrap();
        assert_eq!(write.op, Operation::Write(&[]));
    }
}
