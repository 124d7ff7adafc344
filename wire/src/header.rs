//! Message header layout.
//!
//! Every message starts with a 4-byte header: the total message length
//! (header included) followed by the opcode, both little-endian `u16`.

use bytestream::Reader;

use crate::error::{DecodeError, EncodeError, WireResult};

/// Header size in bytes.
pub const HEADER_SIZE: usize = 2 + 2;

/// Byte offset of the opcode field.
pub const OPCODE_OFFSET: usize = 2;

/// Largest message the 16-bit length field can describe.
pub const MAX_MESSAGE_LEN: usize = u16::MAX as usize;

/// Decoded message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHeader {
    /// Total message length including the header.
    pub length: u16,
    /// Opcode valid in the sender's protocol version.
    pub opcode: u16,
}

impl MessageHeader {
    /// Creates a header for a message of `length` total bytes.
    #[must_use]
    pub const fn new(length: u16, opcode: u16) -> Self {
        Self { length, opcode }
    }

    /// Returns the payload length (total minus header).
    #[must_use]
    pub const fn payload_len(&self) -> usize {
        (self.length as usize).saturating_sub(HEADER_SIZE)
    }
}

/// Decodes the header at the start of `buf`.
pub fn decode_header(buf: &[u8]) -> WireResult<MessageHeader> {
    if buf.len() < HEADER_SIZE {
        return Err(DecodeError::MessageTooSmall {
            actual: buf.len(),
            required: HEADER_SIZE,
        });
    }
    let mut reader = Reader::new(buf);
    let length = reader.read_u16().map_err(|_| DecodeError::MessageTooSmall {
        actual: buf.len(),
        required: HEADER_SIZE,
    })?;
    let opcode = reader.read_u16().map_err(|_| DecodeError::MessageTooSmall {
        actual: buf.len(),
        required: HEADER_SIZE,
    })?;
    Ok(MessageHeader { length, opcode })
}

/// Decodes the header and checks the declared length against `buf`.
pub fn decode_message_header(buf: &[u8]) -> WireResult<MessageHeader> {
    let header = decode_header(buf)?;
    if usize::from(header.length) != buf.len() {
        return Err(DecodeError::LengthMismatch {
            header_len: header.length,
            actual_len: buf.len(),
        });
    }
    Ok(header)
}

/// Reads only the opcode of a complete message.
pub fn read_opcode(buf: &[u8]) -> WireResult<u16> {
    decode_header(buf).map(|header| header.opcode)
}

/// Writes a header into the first [`HEADER_SIZE`] bytes of `out`.
pub fn encode_header(header: &MessageHeader, out: &mut [u8]) -> Result<(), EncodeError> {
    if out.len() < HEADER_SIZE {
        return Err(EncodeError::BufferTooSmall {
            needed: HEADER_SIZE,
            available: out.len(),
        });
    }
    out[0..2].copy_from_slice(&header.length.to_le_bytes());
    out[2..4].copy_from_slice(&header.opcode.to_le_bytes());
    Ok(())
}

/// Rewrites the length field of a complete message to match its size.
pub fn patch_length(message: &mut [u8]) -> Result<(), EncodeError> {
    if message.len() < HEADER_SIZE {
        return Err(EncodeError::BufferTooSmall {
            needed: HEADER_SIZE,
            available: message.len(),
        });
    }
    let length = u16::try_from(message.len()).map_err(|_| EncodeError::LengthOverflow {
        length: message.len(),
    })?;
    message[0..2].copy_from_slice(&length.to_le_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_size_is_four() {
        assert_eq!(HEADER_SIZE, 4);
        assert_eq!(OPCODE_OFFSET, 2);
    }

    #[test]
    fn decode_header_fields() {
        let buf = [0x08, 0x00, 0x34, 0x12, 0, 0, 0, 0];
        let header = decode_header(&buf).unwrap();
        assert_eq!(header, MessageHeader::new(8, 0x1234));
        assert_eq!(header.payload_len(), 4);
    }

    #[test]
    fn decode_header_too_small() {
        let err = decode_header(&[1, 2, 3]).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::MessageTooSmall {
                actual: 3,
                required: 4
            }
        ));
    }

    #[test]
    fn decode_message_header_checks_length() {
        let buf = [0x09, 0x00, 0x01, 0x00, 0, 0, 0, 0];
        let err = decode_message_header(&buf).unwrap_err();
        assert!(matches!(err, DecodeError::LengthMismatch { header_len: 9, .. }));
    }

    #[test]
    fn read_opcode_from_message() {
        assert_eq!(read_opcode(&[4, 0, 0xCD, 0xAB]).unwrap(), 0xABCD);
    }

    #[test]
    fn encode_header_roundtrip() {
        let header = MessageHeader::new(12, 777);
        let mut out = [0u8; 4];
        encode_header(&header, &mut out).unwrap();
        assert_eq!(decode_header(&out).unwrap(), header);
    }

    #[test]
    fn encode_header_small_buffer() {
        let mut out = [0u8; 3];
        assert!(matches!(
            encode_header(&MessageHeader::new(4, 1), &mut out),
            Err(EncodeError::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn patch_length_sets_total_size() {
        let mut message = vec![0, 0, 5, 0, 1, 2, 3];
        patch_length(&mut message).unwrap();
        assert_eq!(&message[..2], &[7, 0]);
    }

    #[test]
    fn patch_length_overflow() {
        let mut message = vec![0u8; MAX_MESSAGE_LEN + 1];
        assert!(matches!(
            patch_length(&mut message),
            Err(EncodeError::LengthOverflow { .. })
        ));
    }
}
