//! Error type shared by every stage of the store codec.
//!
//! Every variant is fatal. The binary maps each one onto a distinct exit
//! status through [`StoreError::exit_code`].

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid magic: expected {expected:?}, found {found:?}")]
    InvalidMagic { expected: [u8; 4], found: [u8; 4] },

    #[error("Unsupported store version: {found} (newest supported is {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("Decompressed length mismatch: frame declares {declared} bytes, decoder produced {actual}")]
    LengthMismatch { declared: u32, actual: usize },

    #[error("Missing required input: {0}")]
    MissingInput(PathBuf),

    #[error("Output path already exists: {0}")]
    OutputExists(PathBuf),

    #[error("No manifest record for store {store_id} index {local_index}")]
    ManifestMiss { store_id: u32, local_index: u32 },

    #[error("{table} table holds {actual} records but the global entry count is {expected}")]
    HashTableLength { table: &'static str, expected: u32, actual: usize },

    #[error("Malformed manifest line {line}: {reason}")]
    MalformedManifest { line: usize, reason: String },

    #[error("Duplicate manifest key (store {blob_id}, index {blob_idx})")]
    DuplicateManifestKey { blob_id: u32, blob_idx: u32 },

    #[error("Entry {index}: data range {offset}+{size} exceeds container length {len}")]
    EntryOutOfBounds { index: u32, offset: u32, size: u32, len: usize },

    #[error("Inconsistent unpack record: {0}")]
    InconsistentRecord(String),

    #[error("Modules {first} and {second} both map to output {path}")]
    NameCollision { first: String, second: String, path: PathBuf },

    #[error("Store {0} grew past the 32-bit offset range")]
    OffsetOverflow(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Decompression error: {0}")]
    Decompression(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Process exit status for this failure. Stable across releases.
    pub fn exit_code(&self) -> u8 {
        match self {
            StoreError::InvalidMagic { .. }         => 2,
            StoreError::UnsupportedVersion { .. }   => 3,
            StoreError::LengthMismatch { .. }       => 4,
            StoreError::MissingInput(_)             => 5,
            StoreError::OutputExists(_)             => 6,
            StoreError::ManifestMiss { .. }         => 7,
            StoreError::HashTableLength { .. }      => 8,
            StoreError::MalformedManifest { .. }    => 9,
            StoreError::DuplicateManifestKey { .. } => 10,
            StoreError::EntryOutOfBounds { .. }     => 11,
            StoreError::OffsetOverflow(_)           => 12,
            StoreError::Compression(_)              => 13,
            StoreError::Decompression(_)            => 14,
            StoreError::Json(_)                     => 15,
            StoreError::InconsistentRecord(_)       => 16,
            StoreError::NameCollision { .. }        => 17,
            StoreError::Io(_)                       => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn exit_codes_are_distinct() {
        let errors = vec![
            StoreError::InvalidMagic { expected: *b"XABA", found: *b"ABCD" },
            StoreError::UnsupportedVersion { found: 9, supported: 1 },
            StoreError::LengthMismatch { declared: 100, actual: 99 },
            StoreError::MissingInput(PathBuf::from("a")),
            StoreError::OutputExists(PathBuf::from("b")),
            StoreError::ManifestMiss { store_id: 0, local_index: 1 },
            StoreError::HashTableLength { table: "hash32", expected: 2, actual: 1 },
            StoreError::MalformedManifest { line: 1, reason: String::new() },
            StoreError::DuplicateManifestKey { blob_id: 0, blob_idx: 0 },
            StoreError::EntryOutOfBounds { index: 0, offset: 0, size: 1, len: 0 },
            StoreError::OffsetOverflow("x".into()),
            StoreError::InconsistentRecord(String::new()),
            StoreError::NameCollision { first: "a/b".into(), second: "a_b".into(), path: PathBuf::from("a_b.dll") },
            StoreError::Compression(String::new()),
            StoreError::Decompression(String::new()),
            StoreError::Io(io::Error::new(io::ErrorKind::Other, "x")),
        ];
        let codes: HashSet<u8> = errors.iter().map(StoreError::exit_code).collect();
        assert_eq!(codes.len(), errors.len());
        assert!(!codes.contains(&0));
    }
}
