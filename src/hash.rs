//! Name digests used to key the store hash tables.
//!
//! Both digests are xxHash (XXH32 and XXH64) of the UTF-8 module name with
//! seed 0. The hex form is fixed-width, zero-padded, lowercase, and without
//! a `0x` prefix; the raw form is the canonical big-endian byte sequence, so
//! `hex::encode(raw)` equals the hex form.

use xxhash_rust::xxh32::Xxh32;
use xxhash_rust::xxh64::Xxh64;

pub const HASH_SEED: u64 = 0;

/// Both digests of one module name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameHash {
    pub hash32: u32,
    pub hash64: u64,
}

impl NameHash {
    pub fn of(name: &str) -> Self {
        Self { hash32: hash32(name), hash64: hash64(name) }
    }

    pub fn hex32(&self) -> String {
        hex::encode(self.hash32.to_be_bytes())
    }

    pub fn hex64(&self) -> String {
        hex::encode(self.hash64.to_be_bytes())
    }
}

pub fn hash32(name: &str) -> u32 {
    let mut hasher = Xxh32::new(HASH_SEED as u32);
    hasher.update(name.as_bytes());
    hasher.digest()
}

pub fn hash64(name: &str) -> u64 {
    let mut hasher = Xxh64::new(HASH_SEED);
    hasher.update(name.as_bytes());
    hasher.digest()
}

pub fn hash32_raw(name: &str) -> [u8; 4] {
    hash32(name).to_be_bytes()
}

pub fn hash64_raw(name: &str) -> [u8; 8] {
    hash64(name).to_be_bytes()
}

pub fn hash32_hex(name: &str) -> String {
    hex::encode(hash32_raw(name))
}

pub fn hash64_hex(name: &str) -> String {
    hex::encode(hash64_raw(name))
}

/// Canonical hex of an arbitrary hash value, padded to `width` digits.
pub fn to_hex(value: u64, width: usize) -> String {
    format!("{value:0width$x}")
}

/// Strip an optional `0x` prefix and lowercase a hash string.
pub fn normalize_hex(s: &str) -> String {
    let s = s.trim();
    let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    s.to_ascii_lowercase()
}

/// Parse a hash string (with or without `0x`) into its integer value.
pub fn parse_hex(s: &str) -> Option<u64> {
    let s = normalize_hex(s);
    if s.is_empty() || s.len() > 16 {
        return None;
    }
    u64::from_str_radix(&s, 16).ok()
}
