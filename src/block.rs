//! Compressed module frames.
//!
//! A module's data section may be wrapped in a 12-byte frame header followed
//! by a single compressed block:
//!
//! ```text
//! magic "XALZ" | descriptor_index u32 | uncompressed_length u32 | block...
//! ```
//!
//! The descriptor index belongs to the host runtime and is passed through
//! verbatim in both directions.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::codec::BlockCodec;
use crate::error::{StoreError, StoreResult};

pub const FRAME_MAGIC: &[u8; 4] = b"XALZ";
pub const FRAME_HEADER_SIZE: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub magic:               [u8; 4],
    pub descriptor_index:    u32,
    pub uncompressed_length: u32,
}

impl FrameHeader {
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&self.magic)?;
        writer.write_u32::<LittleEndian>(self.descriptor_index)?;
        writer.write_u32::<LittleEndian>(self.uncompressed_length)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> StoreResult<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != FRAME_MAGIC {
            return Err(StoreError::InvalidMagic { expected: *FRAME_MAGIC, found: magic });
        }
        Ok(Self {
            magic,
            descriptor_index:    reader.read_u32::<LittleEndian>()?,
            uncompressed_length: reader.read_u32::<LittleEndian>()?,
        })
    }
}

pub fn is_compressed(data: &[u8]) -> bool {
    data.starts_with(FRAME_MAGIC)
}

/// Wrap `data` in a frame. The length field always comes from `data` itself.
pub fn encode_block(data: &[u8], descriptor_index: u32, codec: &dyn BlockCodec) -> StoreResult<Vec<u8>> {
    let uncompressed_length = u32::try_from(data.len())
        .map_err(|_| StoreError::Compression(format!("{} bytes exceeds frame limit", data.len())))?;
    let payload = codec.encode(data)?;
    let header = FrameHeader { magic: *FRAME_MAGIC, descriptor_index, uncompressed_length };

    let mut out = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    header.write(&mut out)?;
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Unwrap a frame. The decoded size must equal the declared length exactly.
pub fn decode_block(frame: &[u8], codec: &dyn BlockCodec) -> StoreResult<(FrameHeader, Vec<u8>)> {
    let header = FrameHeader::read(frame)?;
    let payload = &frame[FRAME_HEADER_SIZE..];
    let data = codec.decode(payload, header.uncompressed_length as usize)?;
    if data.len() != header.uncompressed_length as usize {
        return Err(StoreError::LengthMismatch {
            declared: header.uncompressed_length,
            actual: data.len(),
        });
    }
    Ok((header, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Lz4BlockCodec;
    use proptest::prelude::*;

    /// Decoder that always comes up one byte short.
    struct ShortCodec;

    impl BlockCodec for ShortCodec {
        fn name(&self) -> &'static str { "short" }
        fn encode(&self, data: &[u8]) -> StoreResult<Vec<u8>> { Ok(data.to_vec()) }
        fn decode(&self, _: &[u8], expected_len: usize) -> StoreResult<Vec<u8>> {
            Ok(vec![0u8; expected_len.saturating_sub(1)])
        }
    }

    #[test]
    fn header_fields_are_little_endian() {
        let frame = encode_block(b"hello", 0x0102_0304, &Lz4BlockCodec).unwrap();
        assert_eq!(&frame[..4], b"XALZ");
        assert_eq!(&frame[4..8], &[4, 3, 2, 1]);
        assert_eq!(&frame[8..12], &5u32.to_le_bytes());
        assert!(is_compressed(&frame));
        assert!(!is_compressed(b"MZ\x90\x00"));
    }

    #[test]
    fn short_decode_is_fatal() {
        let mut frame = Vec::new();
        FrameHeader { magic: *FRAME_MAGIC, descriptor_index: 0, uncompressed_length: 100 }
            .write(&mut frame)
            .unwrap();
        frame.extend_from_slice(&[0u8; 16]);
        match decode_block(&frame, &ShortCodec) {
            Err(StoreError::LengthMismatch { declared, actual }) => {
                assert_eq!(declared, 100);
                assert_eq!(actual, 99);
            }
            other => panic!("expected LengthMismatch, got {other:?}"),
        }
    }

    #[test]
    fn declared_length_below_actual_is_fatal() {
        let data: Vec<u8> = (0..100u8).collect();
        let mut frame = encode_block(&data, 1, &Lz4BlockCodec).unwrap();
        frame[8..12].copy_from_slice(&50u32.to_le_bytes());
        let err = decode_block(&frame, &Lz4BlockCodec).unwrap_err();
        assert!(matches!(err, StoreError::LengthMismatch { declared: 50, actual: 100 }));
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn truncated_header_is_an_error() {
        assert!(decode_block(b"XALZ\x00\x00", &Lz4BlockCodec).is_err());
    }

    #[test]
    fn descriptor_index_passes_through() {
        let frame = encode_block(b"module bytes", 42, &Lz4BlockCodec).unwrap();
        let (header, data) = decode_block(&frame, &Lz4BlockCodec).unwrap();
        assert_eq!(header.descriptor_index, 42);
        assert_eq!(data, b"module bytes");
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(data in proptest::collection::vec(any::<u8>(), 0..4096), desc in any::<u32>()) {
            let frame = encode_block(&data, desc, &Lz4BlockCodec).unwrap();
            let (header, decoded) = decode_block(&frame, &Lz4BlockCodec).unwrap();
            prop_assert_eq!(header.uncompressed_length as usize, data.len());
            prop_assert_eq!(header.descriptor_index, desc);
            prop_assert_eq!(decoded, data);
        }
    }
}
