//! The text manifest that names every module in the stores.
//!
//! ```text
//! Hash 32     Hash 64             Blob ID  Blob idx  Name
//! 0xa2e0939b  0x4288cfb749e4c631  000      0000      Xamarin.AndroidX.Activity
//! ```
//!
//! Columns are whitespace separated on read. Written manifests use the fixed
//! layout above with CRLF line endings.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{StoreError, StoreResult};
use crate::hash::{normalize_hex, parse_hex};

pub const MANIFEST_HEADER: &str = "Hash 32     Hash 64             Blob ID  Blob idx  Name";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRecord {
    /// Lowercase hex, no prefix.
    pub hash32:   String,
    pub hash64:   String,
    pub blob_id:  u32,
    pub blob_idx: u32,
    pub name:     String,
}

impl ManifestRecord {
    pub fn render(&self) -> String {
        format!(
            "0x{}  0x{}  {:03}      {:04}      {}\r\n",
            self.hash32, self.hash64, self.blob_id, self.blob_idx, self.name
        )
    }
}

/// Records in file order plus a `(blob id, blob index)` lookup.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    records: Vec<ManifestRecord>,
    by_key:  HashMap<(u32, u32), usize>,
}

impl Manifest {
    pub fn from_records(records: Vec<ManifestRecord>) -> StoreResult<Self> {
        let mut by_key = HashMap::with_capacity(records.len());
        for (i, r) in records.iter().enumerate() {
            if by_key.insert((r.blob_id, r.blob_idx), i).is_some() {
                return Err(StoreError::DuplicateManifestKey {
                    blob_id: r.blob_id,
                    blob_idx: r.blob_idx,
                });
            }
        }
        Ok(Self { records, by_key })
    }

    pub fn parse(text: &str) -> StoreResult<Self> {
        let mut records = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("Hash") {
                continue;
            }
            records.push(parse_line(line, i + 1)?);
        }
        Self::from_records(records)
    }

    pub fn read(path: &Path) -> StoreResult<Self> {
        if !path.exists() {
            return Err(StoreError::MissingInput(path.to_owned()));
        }
        Self::parse(&fs::read_to_string(path)?)
    }

    pub fn get(&self, blob_id: u32, blob_idx: u32) -> Option<&ManifestRecord> {
        self.by_key.get(&(blob_id, blob_idx)).map(|&i| &self.records[i])
    }

    pub fn lookup(&self, blob_id: u32, blob_idx: u32) -> StoreResult<&ManifestRecord> {
        self.get(blob_id, blob_idx).ok_or(StoreError::ManifestMiss {
            store_id: blob_id,
            local_index: blob_idx,
        })
    }

    pub fn records(&self) -> &[ManifestRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = String::with_capacity(64 * (self.records.len() + 1));
        out.push_str(MANIFEST_HEADER);
        out.push_str("\r\n");
        for r in &self.records {
            out.push_str(&r.render());
        }
        out
    }
}

fn parse_line(line: &str, line_no: usize) -> StoreResult<ManifestRecord> {
    let malformed = |reason: &str| StoreError::MalformedManifest {
        line: line_no,
        reason: reason.to_owned(),
    };

    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 5 {
        return Err(malformed("expected 5 columns"));
    }
    if parse_hex(fields[0]).is_none() {
        return Err(malformed("bad hash32"));
    }
    if parse_hex(fields[1]).is_none() {
        return Err(malformed("bad hash64"));
    }
    let blob_id = fields[2].parse().map_err(|_| malformed("bad blob id"))?;
    let blob_idx = fields[3].parse().map_err(|_| malformed("bad blob index"))?;

    Ok(ManifestRecord {
        hash32: normalize_hex(fields[0]),
        hash64: normalize_hex(fields[1]),
        blob_id,
        blob_idx,
        name: fields[4..].join(" "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Hash 32     Hash 64             Blob ID  Blob idx  Name\r\n\
        0xa2e0939b  0x4288cfb749e4c631  000      0000      Xamarin.AndroidX.Activity\r\n\
        0xcf3163e6  0x01accec39cafe242  000      0001      Mono.Android\r\n\
        0x62c6282e  0x22a7eb7046413568  001      0000      System.Runtime\r\n";

    #[test]
    fn parses_and_indexes_by_key() {
        let m = Manifest::parse(SAMPLE).unwrap();
        assert_eq!(m.len(), 3);
        let r = m.get(1, 0).unwrap();
        assert_eq!(r.name, "System.Runtime");
        assert_eq!(r.hash32, "62c6282e");
        assert_eq!(r.hash64, "22a7eb7046413568");
        assert_eq!(m.lookup(0, 1).unwrap().name, "Mono.Android");
    }

    #[test]
    fn missing_key_is_a_manifest_miss() {
        let m = Manifest::parse(SAMPLE).unwrap();
        assert!(matches!(
            m.lookup(2, 0),
            Err(StoreError::ManifestMiss { store_id: 2, local_index: 0 })
        ));
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let text = "0x00000001  0x0000000000000001  000  0000  A\n\
                    0x00000002  0x0000000000000002  000  0000  B\n";
        assert!(matches!(
            Manifest::parse(text),
            Err(StoreError::DuplicateManifestKey { blob_id: 0, blob_idx: 0 })
        ));
    }

    #[test]
    fn short_line_reports_line_number() {
        let text = "Hash 32 ...\n0x00000001  0x0000000000000001  000\n";
        assert!(matches!(
            Manifest::parse(text),
            Err(StoreError::MalformedManifest { line: 2, .. })
        ));
    }

    #[test]
    fn render_matches_fixed_layout() {
        let m = Manifest::parse(SAMPLE).unwrap();
        assert_eq!(m.render(), SAMPLE);
        assert_eq!(m.render().matches("\r\n").count(), 4);
    }
}
