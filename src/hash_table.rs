//! Consolidated hash tables carried by the primary store.
//!
//! Two tables follow the entry table, each `global_entry_count` records of
//! 20 bytes:
//!
//! ```text
//! hash32: hash u32 | reserved u32 | mapping_index u32 | local_store_index u32 | store_id u32
//! hash64: hash u64                | mapping_index u32 | local_store_index u32 | store_id u32
//! ```
//!
//! Each table is ordered by the zero-padded hex form of its hash value.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::hash::to_hex;

pub const HASH_RECORD_SIZE: usize = 20;
/// Both tables together, per global entry.
pub const HASH_TABLES_STRIDE: usize = 2 * HASH_RECORD_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashWidth {
    Bits32,
    Bits64,
}

impl HashWidth {
    pub fn hex_digits(self) -> usize {
        match self {
            HashWidth::Bits32 => 8,
            HashWidth::Bits64 => 16,
        }
    }

    pub fn table_name(self) -> &'static str {
        match self {
            HashWidth::Bits32 => "hash32",
            HashWidth::Bits64 => "hash64",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashRecord {
    pub width:             HashWidth,
    pub hash:              u64,
    /// Trailing half of a hash32 slot. Carried through untouched.
    pub reserved:          u32,
    pub mapping_index:     u32,
    pub local_store_index: u32,
    pub store_id:          u32,
}

impl HashRecord {
    pub fn new32(hash: u32, mapping_index: u32, local_store_index: u32, store_id: u32) -> Self {
        Self {
            width: HashWidth::Bits32,
            hash: hash as u64,
            reserved: 0,
            mapping_index,
            local_store_index,
            store_id,
        }
    }

    pub fn new64(hash: u64, mapping_index: u32, local_store_index: u32, store_id: u32) -> Self {
        Self {
            width: HashWidth::Bits64,
            hash,
            reserved: 0,
            mapping_index,
            local_store_index,
            store_id,
        }
    }

    pub fn hex(&self) -> String {
        to_hex(self.hash, self.width.hex_digits())
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        match self.width {
            HashWidth::Bits32 => {
                writer.write_u32::<LittleEndian>(self.hash as u32)?;
                writer.write_u32::<LittleEndian>(self.reserved)?;
            }
            HashWidth::Bits64 => writer.write_u64::<LittleEndian>(self.hash)?,
        }
        writer.write_u32::<LittleEndian>(self.mapping_index)?;
        writer.write_u32::<LittleEndian>(self.local_store_index)?;
        writer.write_u32::<LittleEndian>(self.store_id)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R, width: HashWidth) -> io::Result<Self> {
        let (hash, reserved) = match width {
            HashWidth::Bits32 => {
                let hash = reader.read_u32::<LittleEndian>()? as u64;
                (hash, reader.read_u32::<LittleEndian>()?)
            }
            HashWidth::Bits64 => (reader.read_u64::<LittleEndian>()?, 0),
        };
        Ok(Self {
            width,
            hash,
            reserved,
            mapping_index:     reader.read_u32::<LittleEndian>()?,
            local_store_index: reader.read_u32::<LittleEndian>()?,
            store_id:          reader.read_u32::<LittleEndian>()?,
        })
    }
}

/// Stable sort by hex form; ties keep their input order.
pub fn sort_by_hex(records: &mut [HashRecord]) {
    records.sort_by_cached_key(HashRecord::hex);
}

pub fn is_sorted_by_hex(records: &[HashRecord]) -> bool {
    records.windows(2).all(|w| w[0].hex() <= w[1].hex())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashTables {
    pub hash32: Vec<HashRecord>,
    pub hash64: Vec<HashRecord>,
}

impl HashTables {
    pub fn read<R: Read>(mut reader: R, count: u32) -> io::Result<Self> {
        let hash32 = (0..count)
            .map(|_| HashRecord::read(&mut reader, HashWidth::Bits32))
            .collect::<io::Result<Vec<_>>>()?;
        let hash64 = (0..count)
            .map(|_| HashRecord::read(&mut reader, HashWidth::Bits64))
            .collect::<io::Result<Vec<_>>>()?;
        Ok(Self { hash32, hash64 })
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        for record in self.hash32.iter().chain(&self.hash64) {
            record.write(&mut writer)?;
        }
        Ok(())
    }

    pub fn is_sorted(&self) -> bool {
        is_sorted_by_hex(&self.hash32) && is_sorted_by_hex(&self.hash64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    #[test]
    fn records_are_twenty_bytes() {
        let mut buf = Vec::new();
        HashRecord::new32(0xa2e0939b, 1, 1, 0).write(&mut buf).unwrap();
        assert_eq!(buf.len(), HASH_RECORD_SIZE);
        assert_eq!(&buf[4..8], &[0, 0, 0, 0]);

        let mut buf = Vec::new();
        HashRecord::new64(0x4288cfb749e4c631, 1, 1, 0).write(&mut buf).unwrap();
        assert_eq!(buf.len(), HASH_RECORD_SIZE);
        assert_eq!(&buf[..8], &0x4288cfb749e4c631u64.to_le_bytes());
    }

    #[test]
    fn hash64_halves_keep_little_endian_order() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0x9cafe242u32.to_le_bytes());
        bytes.extend_from_slice(&0x01accec3u32.to_le_bytes());
        bytes.extend_from_slice(&[7, 0, 0, 0, 3, 0, 0, 0, 1, 0, 0, 0]);
        let record = HashRecord::read(Cursor::new(&bytes), HashWidth::Bits64).unwrap();
        assert_eq!(record.hash, 0x01accec39cafe242);
        assert_eq!(record.hex(), "01accec39cafe242");
        assert_eq!((record.mapping_index, record.local_store_index, record.store_id), (7, 3, 1));
    }

    #[test]
    fn reserved_bytes_are_preserved() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&5u32.to_le_bytes());
        bytes.extend_from_slice(&0xdeadbeefu32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 12]);
        let record = HashRecord::read(Cursor::new(&bytes), HashWidth::Bits32).unwrap();
        assert_eq!(record.reserved, 0xdeadbeef);
        let mut out = Vec::new();
        record.write(&mut out).unwrap();
        assert_eq!(out, bytes);
    }

    #[test]
    fn empty_tables_read_nothing() {
        let tables = HashTables::read(Cursor::new(&[][..]), 0).unwrap();
        assert!(tables.hash32.is_empty() && tables.hash64.is_empty());
        assert!(tables.is_sorted());
    }

    #[test]
    fn sort_is_stable_on_ties() {
        let mut records = vec![
            HashRecord::new32(5, 0, 0, 0),
            HashRecord::new32(1, 1, 1, 0),
            HashRecord::new32(5, 2, 2, 0),
        ];
        sort_by_hex(&mut records);
        let order: Vec<u32> = records.iter().map(|r| r.mapping_index).collect();
        assert_eq!(order, vec![1, 0, 2]);
    }

    proptest! {
        #[test]
        fn sorted_tables_are_non_decreasing(hashes in proptest::collection::vec(any::<u64>(), 0..64)) {
            let mut records: Vec<HashRecord> = hashes
                .iter()
                .enumerate()
                .map(|(i, h)| HashRecord::new64(*h, i as u32, i as u32, 0))
                .collect();
            sort_by_hex(&mut records);
            prop_assert!(is_sorted_by_hex(&records));
            for pair in records.windows(2) {
                if pair[0].hash == pair[1].hash {
                    prop_assert!(pair[0].mapping_index < pair[1].mapping_index);
                }
            }
        }
    }
}
