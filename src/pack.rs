//! Store assembly: rebuild manifest and store containers from a side record.
//!
//! Each store image is synthesised in memory in one forward pass. The entry
//! table and (for the primary store) the hash tables are reserved up front;
//! the only backward seeks patch those reserved slots. Nothing touches the
//! output directory until every image has been built.

use std::borrow::Cow;
use std::fs;
use std::io::{Cursor, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::block::encode_block;
use crate::codec::{default_codec, BlockCodec};
use crate::error::{StoreError, StoreResult};
use crate::hash::{normalize_hex, NameHash};
use crate::hash_table::{sort_by_hex, HashRecord, HashTables, HashWidth};
use crate::header::{AssemblyEntry, StoreHeader, ENTRY_SIZE, HEADER_SIZE, PRIMARY_STORE_ID, STORE_VERSION};
use crate::layout::{ensure_absent, write_new, MANIFEST_FILE};
use crate::manifest::{Manifest, ManifestRecord};
use crate::record::{AssemblyRecord, StoreRecord, UnpackRecord};
use crate::store::StoreFile;

/// Logical stores covered by the manifest and the consolidated hash tables:
/// the primary store and the first architecture store.
pub const HASH_TABLE_STORE_CAP: u32 = 2;

// ── PackOptions ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PackOptions {
    pub output_dir: PathBuf,
    pub debug:      bool,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self { output_dir: PathBuf::from("packed"), debug: false }
    }
}

// ── PackModule ────────────────────────────────────────────────────────────────

/// A module ready for assembly.
#[derive(Debug, Clone)]
pub struct PackModule {
    pub name:             String,
    pub store_index:      usize,
    pub store_id:         u32,
    pub local_index:      u32,
    pub compress:         bool,
    /// Written verbatim into the frame header when `compress` is set.
    pub descriptor_index: u32,
    pub data:             Vec<u8>,
}

impl PackModule {
    /// Load the module bytes named by `record`, relative to `base_dir`.
    pub fn load(record: &AssemblyRecord, base_dir: &Path) -> StoreResult<Self> {
        let path = base_dir.join(&record.file);
        if !path.exists() {
            return Err(StoreError::MissingInput(path));
        }
        let module = Self {
            name:             record.name.clone(),
            store_index:      record.store_index,
            store_id:         record.store_id,
            local_index:      record.local_index,
            compress:         record.compressed,
            descriptor_index: record.descriptor_index.unwrap_or(0),
            data:             fs::read(&path)?,
        };

        let hash = module.hash();
        if hash.hex32() != normalize_hex(&record.hash32)
            || hash.hex64() != normalize_hex(&record.hash64)
        {
            warn!(
                name = %record.name,
                recorded32 = %record.hash32,
                recorded64 = %record.hash64,
                "recorded hash differs from regenerated hash; using regenerated"
            );
        }
        Ok(module)
    }

    pub fn hash(&self) -> NameHash {
        NameHash::of(&self.name)
    }

    fn in_hash_scope(&self) -> bool {
        self.store_id < HASH_TABLE_STORE_CAP
    }
}

// ── Output ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PackedStore {
    pub filename: String,
    pub image:    Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct PackedOutput {
    pub manifest: Manifest,
    pub stores:   Vec<PackedStore>,
}

// ── Table builders ────────────────────────────────────────────────────────────

/// Manifest covering the modules of the first two logical stores, in input order.
pub fn build_manifest(modules: &[PackModule]) -> StoreResult<Manifest> {
    let records = modules
        .iter()
        .filter(|m| m.in_hash_scope())
        .map(|m| {
            let hash = m.hash();
            ManifestRecord {
                hash32:   hash.hex32(),
                hash64:   hash.hex64(),
                blob_id:  m.store_id,
                blob_idx: m.local_index,
                name:     m.name.clone(),
            }
        })
        .collect();
    Manifest::from_records(records)
}

/// Sorted hash tables over the first two logical stores.
///
/// Mapping indices address the primary store's entries first, followed by
/// the architecture store's entries offset by `primary_local_count`.
pub fn build_hash_tables(modules: &[PackModule], primary_local_count: u32) -> HashTables {
    let mut tables = HashTables::default();
    for m in modules.iter().filter(|m| m.in_hash_scope()) {
        let mapping_index = if m.store_id == PRIMARY_STORE_ID {
            m.local_index
        } else {
            primary_local_count + m.local_index
        };
        let hash = m.hash();
        tables.hash32.push(HashRecord::new32(hash.hash32, mapping_index, m.local_index, m.store_id));
        tables.hash64.push(HashRecord::new64(hash.hash64, mapping_index, m.local_index, m.store_id));
    }
    sort_by_hex(&mut tables.hash32);
    sort_by_hex(&mut tables.hash64);
    tables
}

fn check_table_len(width: HashWidth, records: &[HashRecord], expected: u32) -> StoreResult<()> {
    if records.len() != expected as usize {
        return Err(StoreError::HashTableLength {
            table: width.table_name(),
            expected,
            actual: records.len(),
        });
    }
    Ok(())
}

/// Every module must belong to a listed store, and each store's local
/// indices must run 0..n with no gaps or repeats.
pub fn check_layout(stores: &[StoreRecord], modules: &[PackModule]) -> StoreResult<()> {
    if let Some(orphan) = modules
        .iter()
        .find(|m| !stores.iter().any(|s| s.store_index == m.store_index))
    {
        return Err(StoreError::InconsistentRecord(format!(
            "module {} references store {} which is not listed",
            orphan.name, orphan.store_index
        )));
    }

    for store in stores {
        let mut indices: Vec<u32> = modules
            .iter()
            .filter(|m| m.store_index == store.store_index)
            .map(|m| m.local_index)
            .collect();
        indices.sort_unstable();
        if let Some((slot, &index)) = indices
            .iter()
            .enumerate()
            .find(|&(slot, &index)| index as usize != slot)
        {
            return Err(StoreError::InconsistentRecord(format!(
                "store {} has local index {index} at slot {slot}; indices must run 0..{}",
                store.filename,
                indices.len()
            )));
        }
    }
    Ok(())
}

// ── StoreAssembler ────────────────────────────────────────────────────────────

pub struct StoreAssembler {
    opts:  PackOptions,
    codec: Box<dyn BlockCodec>,
}

impl StoreAssembler {
    pub fn new(opts: PackOptions) -> Self {
        Self::with_codec(opts, default_codec())
    }

    pub fn with_codec(opts: PackOptions, codec: Box<dyn BlockCodec>) -> Self {
        Self { opts, codec }
    }

    /// Pack the side record at `record_path` into the output directory.
    pub fn run(&self, record_path: &Path) -> StoreResult<PackedOutput> {
        let record = UnpackRecord::read(record_path)?;
        let base_dir = record_path.parent().unwrap_or_else(|| Path::new("."));

        let out = &self.opts.output_dir;
        ensure_absent(&out.join(MANIFEST_FILE))?;
        for store in &record.stores {
            ensure_absent(&out.join(&store.filename))?;
        }

        let modules = record
            .assemblies
            .iter()
            .map(|a| PackModule::load(a, base_dir))
            .collect::<StoreResult<Vec<_>>>()?;
        let output = self.assemble(&record.stores, &modules)?;

        fs::create_dir_all(out)?;
        write_new(&out.join(MANIFEST_FILE), output.manifest.render().as_bytes())?;
        for store in &output.stores {
            write_new(&out.join(&store.filename), &store.image)?;
        }
        info!(
            stores = output.stores.len(),
            assemblies = modules.len(),
            "packed to {}",
            out.display()
        );
        Ok(output)
    }

    /// Build the manifest and every store image without touching disk.
    pub fn assemble(&self, stores: &[StoreRecord], modules: &[PackModule]) -> StoreResult<PackedOutput> {
        check_layout(stores, modules)?;
        let manifest = build_manifest(modules)?;
        let primary_local_count =
            modules.iter().filter(|m| m.store_id == PRIMARY_STORE_ID).count() as u32;

        let mut packed = Vec::with_capacity(stores.len());
        for store in stores {
            let mut members: Vec<&PackModule> =
                modules.iter().filter(|m| m.store_index == store.store_index).collect();
            members.sort_by_key(|m| m.local_index);

            let image = self.build_store(store, &members, modules, primary_local_count)?;
            packed.push(PackedStore { filename: store.filename.clone(), image });
        }
        Ok(PackedOutput { manifest, stores: packed })
    }

    fn build_store(
        &self,
        store:               &StoreRecord,
        members:             &[&PackModule],
        all_modules:         &[PackModule],
        primary_local_count: u32,
    ) -> StoreResult<Vec<u8>> {
        let recorded = &store.header;
        if recorded.version > STORE_VERSION {
            return Err(StoreError::UnsupportedVersion {
                found: recorded.version,
                supported: STORE_VERSION,
            });
        }
        let primary = recorded.store_id == PRIMARY_STORE_ID;
        let local_count = members.len() as u32;
        if local_count != recorded.local_entry_count {
            warn!(
                store = %store.filename,
                recorded = recorded.local_entry_count,
                actual = local_count,
                "local entry count differs from record; writing actual"
            );
        }
        let global_count = recorded.global_entry_count;

        let mut header = StoreHeader::new(local_count, global_count, recorded.store_id);
        header.version = recorded.version;

        let base = StoreFile::data_base(local_count, global_count, primary);
        let mut out = Cursor::new(Vec::with_capacity(
            base + members.iter().map(|m| m.data.len()).sum::<usize>(),
        ));
        header.write(&mut out)?;
        out.write_all(&vec![0u8; base - HEADER_SIZE])?;

        let overflow = || StoreError::OffsetOverflow(store.filename.clone());
        let mut offset = base as u64;
        for (slot, module) in members.iter().enumerate() {
            let bytes: Cow<[u8]> = if module.compress {
                Cow::Owned(encode_block(&module.data, module.descriptor_index, self.codec.as_ref())?)
            } else {
                Cow::Borrowed(&module.data[..])
            };
            let entry = AssemblyEntry::data_only(
                u32::try_from(offset).map_err(|_| overflow())?,
                u32::try_from(bytes.len()).map_err(|_| overflow())?,
            );
            if self.opts.debug {
                info!(
                    name = %module.name,
                    slot,
                    data_offset = entry.data_offset,
                    data_size = entry.data_size,
                    compressed = module.compress,
                    "entry"
                );
            }

            out.seek(SeekFrom::Start((HEADER_SIZE + slot * ENTRY_SIZE) as u64))?;
            entry.write(&mut out)?;
            out.seek(SeekFrom::Start(offset))?;
            out.write_all(&bytes)?;
            offset += bytes.len() as u64;
        }
        if offset > u32::MAX as u64 {
            return Err(overflow());
        }

        if primary {
            let tables = build_hash_tables(all_modules, primary_local_count);
            check_table_len(HashWidth::Bits32, &tables.hash32, global_count)?;
            check_table_len(HashWidth::Bits64, &tables.hash64, global_count)?;
            out.seek(SeekFrom::Start((HEADER_SIZE + local_count as usize * ENTRY_SIZE) as u64))?;
            tables.write(&mut out)?;
        }

        debug!(store = %store.filename, size = offset, "store image built");
        Ok(out.into_inner())
    }
}
