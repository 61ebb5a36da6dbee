//! Block compression backends for compressed module frames.
//!
//! A frame carries exactly one compressed block, never a stream, so codecs
//! here work on whole buffers. The decoder is told the expected output
//! length up front and must not pad or truncate to reach it; length
//! verification happens in [`crate::block`].

use lz4_flex::block::DecompressError;

use crate::error::{StoreError, StoreResult};

// ── Codec trait ──────────────────────────────────────────────────────────────

pub trait BlockCodec: Send + Sync {
    fn name(&self) -> &'static str;
    fn encode(&self, data: &[u8]) -> StoreResult<Vec<u8>>;
    /// Decode one block. `expected_len` comes from the frame header; a block
    /// that yields more than that fails with `LengthMismatch`. Short output is
    /// returned as-is and rejected by the caller.
    fn decode(&self, data: &[u8], expected_len: usize) -> StoreResult<Vec<u8>>;
}

// ── Built-in codecs ──────────────────────────────────────────────────────────

/// Raw LZ4 block format (no frame, no size prefix).
pub struct Lz4BlockCodec;

impl BlockCodec for Lz4BlockCodec {
    fn name(&self) -> &'static str { "lz4-block" }

    fn encode(&self, data: &[u8]) -> StoreResult<Vec<u8>> {
        Ok(lz4_flex::block::compress(data))
    }

    fn decode(&self, data: &[u8], expected_len: usize) -> StoreResult<Vec<u8>> {
        let err = match lz4_flex::block::decompress(data, expected_len) {
            Ok(out) => return Ok(out),
            Err(e) => e,
        };
        // Retry unbounded to tell an oversized block from a corrupt one.
        // One input byte expands to at most 255 output bytes.
        let floor = match err {
            DecompressError::OutputTooSmall { expected, .. } => expected,
            _ => 0,
        };
        let bound = data.len().saturating_mul(255).max(floor);
        match lz4_flex::block::decompress(data, bound) {
            Ok(out) if out.len() > expected_len => Err(StoreError::LengthMismatch {
                declared: u32::try_from(expected_len).unwrap_or(u32::MAX),
                actual:   out.len(),
            }),
            _ if floor > expected_len => Err(StoreError::LengthMismatch {
                declared: u32::try_from(expected_len).unwrap_or(u32::MAX),
                actual:   floor,
            }),
            _ => Err(StoreError::Decompression(err.to_string())),
        }
    }
}

/// Codec used for every frame this tool reads or writes.
pub fn default_codec() -> Box<dyn BlockCodec> {
    Box::new(Lz4BlockCodec)
}
