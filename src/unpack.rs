//! Store extraction: slice every module out of the primary store and any
//! selected architecture stores, undo compression, and record where each
//! module came from.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::block::{decode_block, is_compressed};
use crate::codec::{default_codec, BlockCodec};
use crate::error::{StoreError, StoreResult};
use crate::layout::{
    arch_store_file, module_path, record_path, write_new, MANIFEST_FILE, PRIMARY_STORE_FILE,
    RECORD_FILE,
};
use crate::manifest::Manifest;
use crate::record::{AssemblyRecord, HeaderRecord, StoreRecord, UnpackRecord};
use crate::store::{ReadOptions, StoreFile};

// ── UnpackOptions ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct UnpackOptions {
    /// Directory holding `assemblies.blob`, its manifest, and arch stores.
    pub input_dir:     PathBuf,
    pub output_dir:    PathBuf,
    /// Architecture stores to extract alongside the primary store.
    pub architectures: Vec<String>,
    /// Remove an existing output directory instead of failing.
    pub force:         bool,
    pub debug:         bool,
}

impl Default for UnpackOptions {
    fn default() -> Self {
        Self {
            input_dir:     PathBuf::from("."),
            output_dir:    PathBuf::from("out"),
            architectures: Vec::new(),
            force:         false,
            debug:         false,
        }
    }
}

// ── Extracted module ──────────────────────────────────────────────────────────

/// One module's bytes after frame removal.
#[derive(Debug)]
pub struct ExtractedModule<'a> {
    pub data:             Cow<'a, [u8]>,
    pub descriptor_index: Option<u32>,
}

impl ExtractedModule<'_> {
    pub fn compressed(&self) -> bool {
        self.descriptor_index.is_some()
    }
}

/// Recover module `index` from a parsed store, decompressing when framed.
pub fn extract_module<'a>(
    data:  &'a [u8],
    store: &StoreFile,
    index: u32,
    codec: &dyn BlockCodec,
) -> StoreResult<ExtractedModule<'a>> {
    let slice = store.data_slice(data, index)?;
    if is_compressed(slice) {
        let (header, raw) = decode_block(slice, codec)?;
        Ok(ExtractedModule {
            data: Cow::Owned(raw),
            descriptor_index: Some(header.descriptor_index),
        })
    } else {
        Ok(ExtractedModule { data: Cow::Borrowed(slice), descriptor_index: None })
    }
}

// ── StoreExtractor ────────────────────────────────────────────────────────────

pub struct StoreExtractor {
    opts:  UnpackOptions,
    codec: Box<dyn BlockCodec>,
}

impl StoreExtractor {
    pub fn new(opts: UnpackOptions) -> Self {
        Self::with_codec(opts, default_codec())
    }

    pub fn with_codec(opts: UnpackOptions, codec: Box<dyn BlockCodec>) -> Self {
        Self { opts, codec }
    }

    /// Unpack everything and write the side record. Returns the record.
    pub fn run(&self) -> StoreResult<UnpackRecord> {
        let primary_path = self.opts.input_dir.join(PRIMARY_STORE_FILE);
        let manifest_path = self.opts.input_dir.join(MANIFEST_FILE);
        for path in [&primary_path, &manifest_path] {
            if !path.exists() {
                return Err(StoreError::MissingInput(path.clone()));
            }
        }
        self.prepare_output()?;

        let manifest = Manifest::read(&manifest_path)?;
        let read_opts = ReadOptions { debug: self.opts.debug };
        let mut record = UnpackRecord::default();

        let data = fs::read(&primary_path)?;
        let store = StoreFile::parse(&data, true, &read_opts)?;
        if store.header.has_companions() {
            info!(
                local = store.header.local_entry_count,
                global = store.header.global_entry_count,
                "primary store has architecture-specific companions"
            );
        }
        self.extract_store(&data, &store, PRIMARY_STORE_FILE, None, &manifest, &mut record)?;

        let mut seen = HashSet::new();
        for arch in &self.opts.architectures {
            if !seen.insert(arch.as_str()) {
                debug!(arch = %arch, "architecture listed twice, skipping");
                continue;
            }
            let filename = arch_store_file(arch);
            let path = self.opts.input_dir.join(&filename);
            if !path.exists() {
                info!(arch = %arch, "architecture store not present, skipping");
                continue;
            }
            let data = fs::read(&path)?;
            let store = StoreFile::parse(&data, false, &read_opts)?;
            self.extract_store(&data, &store, &filename, Some(arch.as_str()), &manifest, &mut record)?;
        }

        write_new(&self.opts.output_dir.join(RECORD_FILE), &record.to_bytes()?)?;
        info!(
            stores = record.stores.len(),
            assemblies = record.assemblies.len(),
            "unpacked to {}",
            self.opts.output_dir.display()
        );
        Ok(record)
    }

    fn prepare_output(&self) -> StoreResult<()> {
        let out = &self.opts.output_dir;
        if out.exists() {
            if !self.opts.force {
                return Err(StoreError::OutputExists(out.clone()));
            }
            info!("removing existing {}", out.display());
            fs::remove_dir_all(out)?;
        }
        fs::create_dir_all(out)?;
        Ok(())
    }

    /// Extract every module of one parsed store into the output directory.
    pub fn extract_store(
        &self,
        data:     &[u8],
        store:    &StoreFile,
        filename: &str,
        arch:     Option<&str>,
        manifest: &Manifest,
        record:   &mut UnpackRecord,
    ) -> StoreResult<()> {
        let store_index = record.stores.len();
        let store_id = store.header.store_id;
        record.stores.push(StoreRecord {
            filename: filename.to_owned(),
            store_index,
            header: HeaderRecord::from(&store.header),
        });

        for local_index in 0..store.header.local_entry_count {
            let entry = manifest.lookup(store_id, local_index)?;
            let module = extract_module(data, store, local_index, self.codec.as_ref())?;

            let rel = module_path(arch, &entry.name);
            let file = record_path(&rel);
            if let Some(first) = record.assemblies.iter().find(|a| a.file == file) {
                return Err(StoreError::NameCollision {
                    first:  first.name.clone(),
                    second: entry.name.clone(),
                    path:   rel,
                });
            }
            write_new(&self.opts.output_dir.join(&rel), &module.data)?;
            debug!(
                store_id,
                local_index,
                compressed = module.compressed(),
                size = module.data.len(),
                "extracted {}",
                entry.name
            );

            record.assemblies.push(AssemblyRecord {
                store_index,
                name: entry.name.clone(),
                store_id,
                local_index,
                hash32: entry.hash32.clone(),
                hash64: entry.hash64.clone(),
                compressed: module.compressed(),
                descriptor_index: module.descriptor_index,
                file,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::encode_block;
    use crate::codec::Lz4BlockCodec;
    use crate::header::{AssemblyEntry, StoreHeader};
    use crate::manifest::MANIFEST_HEADER;

    fn store_with(payloads: &[&[u8]]) -> (Vec<u8>, StoreFile) {
        let base = StoreFile::data_base(payloads.len() as u32, payloads.len() as u32, false);
        let mut offset = base as u32;
        let mut entries = Vec::new();
        for p in payloads {
            entries.push(AssemblyEntry::data_only(offset, p.len() as u32));
            offset += p.len() as u32;
        }
        let store = StoreFile {
            header: StoreHeader::new(payloads.len() as u32, payloads.len() as u32, 1),
            entries,
            hash_tables: None,
        };
        let mut bytes = Vec::new();
        store.write_tables(&mut bytes).unwrap();
        for p in payloads {
            bytes.extend_from_slice(p);
        }
        (bytes, store)
    }

    #[test]
    fn plain_module_is_borrowed() {
        let (bytes, store) = store_with(&[&b"MZ plain"[..]]);
        let module = extract_module(&bytes, &store, 0, &Lz4BlockCodec).unwrap();
        assert!(matches!(module.data, Cow::Borrowed(_)));
        assert_eq!(&*module.data, b"MZ plain");
        assert!(!module.compressed());
    }

    #[test]
    fn framed_module_is_decompressed() {
        let frame = encode_block(b"MZ framed framed framed", 7, &Lz4BlockCodec).unwrap();
        let (bytes, store) = store_with(&[&b"first"[..], &frame[..]]);
        let module = extract_module(&bytes, &store, 1, &Lz4BlockCodec).unwrap();
        assert_eq!(&*module.data, b"MZ framed framed framed");
        assert_eq!(module.descriptor_index, Some(7));
    }

    #[test]
    fn sanitised_name_collision_names_both_modules() {
        let (bytes, store) = store_with(&[&b"MZ one"[..], &b"MZ two"[..]]);
        let manifest = Manifest::parse(&format!(
            "{}\r\n\
             0x00000001  0x0000000000000001  001      0000      a/b\r\n\
             0x00000002  0x0000000000000002  001      0001      a_b\r\n",
            MANIFEST_HEADER
        ))
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let extractor = StoreExtractor::new(UnpackOptions {
            output_dir: dir.path().to_owned(),
            ..UnpackOptions::default()
        });
        let mut record = UnpackRecord::default();
        let err = extractor
            .extract_store(&bytes, &store, "assemblies.x86.blob", None, &manifest, &mut record)
            .unwrap_err();
        match &err {
            StoreError::NameCollision { first, second, path } => {
                assert_eq!(first, "a/b");
                assert_eq!(second, "a_b");
                assert_eq!(path, &PathBuf::from("a_b.dll"));
            }
            other => panic!("expected NameCollision, got {other:?}"),
        }
        assert_eq!(err.exit_code(), 17);
    }

    #[test]
    fn missing_inputs_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = StoreExtractor::new(UnpackOptions {
            input_dir: dir.path().to_owned(),
            output_dir: dir.path().join("out"),
            ..UnpackOptions::default()
        });
        assert!(matches!(extractor.run(), Err(StoreError::MissingInput(_))));
        assert!(!dir.path().join("out").exists());
    }
}
