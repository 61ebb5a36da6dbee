//! One parsed store container: header, entry table, and (primary only) the
//! consolidated hash tables.

use std::io::{Cursor, Write};
use tracing::{info, warn};

use crate::error::{StoreError, StoreResult};
use crate::hash_table::{HashTables, HASH_TABLES_STRIDE};
use crate::header::{AssemblyEntry, StoreHeader, ENTRY_SIZE, HEADER_SIZE};

/// Options for parsing a store.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Dump every header, entry, and hash record through the log.
    pub debug: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreFile {
    pub header:      StoreHeader,
    pub entries:     Vec<AssemblyEntry>,
    /// Present only when the store was parsed as the primary store.
    pub hash_tables: Option<HashTables>,
}

impl StoreFile {
    /// Parse a complete in-memory container. Architecture-specific stores
    /// are parsed with `primary == false` and carry no hash tables.
    pub fn parse(data: &[u8], primary: bool, opts: &ReadOptions) -> StoreResult<Self> {
        let mut cursor = Cursor::new(data);
        let header = StoreHeader::read(&mut cursor)?;
        if opts.debug {
            info!(
                version = header.version,
                local = header.local_entry_count,
                global = header.global_entry_count,
                store_id = header.store_id,
                "store header"
            );
        }

        let entries = (0..header.local_entry_count)
            .map(|_| AssemblyEntry::read(&mut cursor))
            .collect::<std::io::Result<Vec<_>>>()?;
        if opts.debug {
            for (i, e) in entries.iter().enumerate() {
                info!(
                    index = i,
                    data_offset = e.data_offset,
                    data_size = e.data_size,
                    debug_size = e.debug_size,
                    config_size = e.config_size,
                    "entry"
                );
            }
        }

        let hash_tables = if primary {
            let tables = HashTables::read(&mut cursor, header.global_entry_count)?;
            if !tables.is_sorted() {
                warn!(store_id = header.store_id, "hash tables are not in hex order");
            }
            if opts.debug {
                for r in tables.hash32.iter().chain(&tables.hash64) {
                    info!(
                        hash = %r.hex(),
                        mapping_index = r.mapping_index,
                        local_store_index = r.local_store_index,
                        store_id = r.store_id,
                        "{}",
                        r.width.table_name()
                    );
                }
            }
            Some(tables)
        } else {
            None
        };

        Ok(Self { header, entries, hash_tables })
    }

    /// Offset of the first data byte for a store with these counts.
    pub fn data_base(local_entry_count: u32, global_entry_count: u32, primary: bool) -> usize {
        let mut base = HEADER_SIZE + local_entry_count as usize * ENTRY_SIZE;
        if primary {
            base += global_entry_count as usize * HASH_TABLES_STRIDE;
        }
        base
    }

    pub fn is_primary(&self) -> bool {
        self.hash_tables.is_some()
    }

    /// The data section of entry `index`, bounds-checked against `data`.
    pub fn data_slice<'a>(&self, data: &'a [u8], index: u32) -> StoreResult<&'a [u8]> {
        let entry = self.entries.get(index as usize).ok_or(StoreError::ManifestMiss {
            store_id: self.header.store_id,
            local_index: index,
        })?;
        Ok(&data[entry.data_range(index, data.len())?])
    }

    /// Write header, entry table, and hash tables (no module data).
    pub fn write_tables<W: Write>(&self, mut writer: W) -> StoreResult<()> {
        self.header.write(&mut writer)?;
        for entry in &self.entries {
            entry.write(&mut writer)?;
        }
        if let Some(tables) = &self.hash_tables {
            tables.write(&mut writer)?;
        }
        Ok(())
    }
}
