//! Fixed store header and per-module entry records.
//!
//! Header layout (20 bytes, little-endian):
//!
//! | Offset | Size | Field                |
//! |--------|------|----------------------|
//! | 0      | 4    | magic `"XABA"`       |
//! | 4      | 4    | format version       |
//! | 8      | 4    | local entry count    |
//! | 12     | 4    | global entry count   |
//! | 16     | 4    | store id             |
//!
//! The header is followed by `local_entry_count` entry records of 24 bytes:
//! data, debug, and config offset/size pairs. Offsets are absolute from the
//! start of the container; a zero size marks the section as absent.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use std::ops::Range;

use crate::error::{StoreError, StoreResult};

pub const STORE_MAGIC: &[u8; 4] = b"XABA";
/// Newest format revision this codec understands.
pub const STORE_VERSION: u32 = 1;
pub const HEADER_SIZE: usize = 20;
pub const ENTRY_SIZE: usize = 24;
/// Store id of the primary store, the one carrying the hash tables.
pub const PRIMARY_STORE_ID: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreHeader {
    pub magic:              [u8; 4],
    pub version:            u32,
    pub local_entry_count:  u32,
    pub global_entry_count: u32,
    pub store_id:           u32,
}

impl StoreHeader {
    pub fn new(local_entry_count: u32, global_entry_count: u32, store_id: u32) -> Self {
        Self {
            magic: *STORE_MAGIC,
            version: STORE_VERSION,
            local_entry_count,
            global_entry_count,
            store_id,
        }
    }

    /// Local and global counts differ only when architecture-specific
    /// companion stores share this store's hash tables.
    pub fn has_companions(&self) -> bool {
        self.local_entry_count != self.global_entry_count
    }

    pub fn is_primary(&self) -> bool {
        self.store_id == PRIMARY_STORE_ID
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&self.magic)?;
        writer.write_u32::<LittleEndian>(self.version)?;
        writer.write_u32::<LittleEndian>(self.local_entry_count)?;
        writer.write_u32::<LittleEndian>(self.global_entry_count)?;
        writer.write_u32::<LittleEndian>(self.store_id)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> StoreResult<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != STORE_MAGIC {
            return Err(StoreError::InvalidMagic { expected: *STORE_MAGIC, found: magic });
        }
        let version = reader.read_u32::<LittleEndian>()?;
        if version > STORE_VERSION {
            return Err(StoreError::UnsupportedVersion {
                found: version,
                supported: STORE_VERSION,
            });
        }
        Ok(Self {
            magic,
            version,
            local_entry_count:  reader.read_u32::<LittleEndian>()?,
            global_entry_count: reader.read_u32::<LittleEndian>()?,
            store_id:           reader.read_u32::<LittleEndian>()?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyEntry {
    pub data_offset:   u32,
    pub data_size:     u32,
    pub debug_offset:  u32,
    pub debug_size:    u32,
    pub config_offset: u32,
    pub config_size:   u32,
}

impl AssemblyEntry {
    /// Entry with only a data section; debug and config are absent.
    pub fn data_only(data_offset: u32, data_size: u32) -> Self {
        Self { data_offset, data_size, ..Self::default() }
    }

    pub fn has_debug(&self) -> bool {
        self.debug_size != 0
    }

    pub fn has_config(&self) -> bool {
        self.config_size != 0
    }

    /// Byte range of the data section within a container of `len` bytes.
    pub fn data_range(&self, index: u32, len: usize) -> StoreResult<Range<usize>> {
        let start = self.data_offset as usize;
        let end = start + self.data_size as usize;
        if end > len {
            return Err(StoreError::EntryOutOfBounds {
                index,
                offset: self.data_offset,
                size: self.data_size,
                len,
            });
        }
        Ok(start..end)
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.data_offset)?;
        writer.write_u32::<LittleEndian>(self.data_size)?;
        writer.write_u32::<LittleEndian>(self.debug_offset)?;
        writer.write_u32::<LittleEndian>(self.debug_size)?;
        writer.write_u32::<LittleEndian>(self.config_offset)?;
        writer.write_u32::<LittleEndian>(self.config_size)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        Ok(Self {
            data_offset:   reader.read_u32::<LittleEndian>()?,
            data_size:     reader.read_u32::<LittleEndian>()?,
            debug_offset:  reader.read_u32::<LittleEndian>()?,
            debug_size:    reader.read_u32::<LittleEndian>()?,
            config_offset: reader.read_u32::<LittleEndian>()?,
            config_size:   reader.read_u32::<LittleEndian>()?,
        })
    }
}
