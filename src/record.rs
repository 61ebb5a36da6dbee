//! JSON bookkeeping written by unpack and consumed by pack.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{StoreError, StoreResult};
use crate::header::StoreHeader;

/// Header fields of one physical store file.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HeaderRecord {
    pub version:            u32,
    pub local_entry_count:  u32,
    pub global_entry_count: u32,
    pub store_id:           u32,
}

impl From<&StoreHeader> for HeaderRecord {
    fn from(h: &StoreHeader) -> Self {
        Self {
            version:            h.version,
            local_entry_count:  h.local_entry_count,
            global_entry_count: h.global_entry_count,
            store_id:           h.store_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StoreRecord {
    pub filename:    String,
    pub store_index: usize,
    pub header:      HeaderRecord,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AssemblyRecord {
    pub store_index: usize,
    pub name:        String,
    pub store_id:    u32,
    pub local_index: u32,
    pub hash32:      String,
    pub hash64:      String,
    pub compressed:  bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptor_index: Option<u32>,
    /// Module file, relative to the directory holding the record.
    pub file:        String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct UnpackRecord {
    pub stores:     Vec<StoreRecord>,
    pub assemblies: Vec<AssemblyRecord>,
}

impl UnpackRecord {
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn read(path: &Path) -> StoreResult<Self> {
        if !path.exists() {
            return Err(StoreError::MissingInput(path.to_owned()));
        }
        Ok(Self::from_bytes(&fs::read(path)?)?)
    }

    /// Modules of one store, ordered by local index.
    pub fn assemblies_in(&self, store_index: usize) -> Vec<&AssemblyRecord> {
        let mut list: Vec<&AssemblyRecord> = self
            .assemblies
            .iter()
            .filter(|a| a.store_index == store_index)
            .collect();
        list.sort_by_key(|a| a.local_index);
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> UnpackRecord {
        UnpackRecord {
            stores: vec![StoreRecord {
                filename: "assemblies.blob".into(),
                store_index: 0,
                header: HeaderRecord::from(&StoreHeader::new(2, 2, 0)),
            }],
            assemblies: vec![
                AssemblyRecord {
                    store_index: 0,
                    name: "B".into(),
                    store_id: 0,
                    local_index: 1,
                    hash32: "00000001".into(),
                    hash64: "0000000000000001".into(),
                    compressed: false,
                    descriptor_index: None,
                    file: "B.dll".into(),
                },
                AssemblyRecord {
                    store_index: 0,
                    name: "A".into(),
                    store_id: 0,
                    local_index: 0,
                    hash32: "00000002".into(),
                    hash64: "0000000000000002".into(),
                    compressed: true,
                    descriptor_index: Some(3),
                    file: "A.dll".into(),
                },
            ],
        }
    }

    #[test]
    fn json_round_trip_keeps_descriptor_index() {
        let record = sample();
        let bytes = record.to_bytes().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert_eq!(text.matches("descriptor_index").count(), 1);
        assert_eq!(UnpackRecord::from_bytes(&bytes).unwrap(), record);
    }

    #[test]
    fn assemblies_are_grouped_in_local_order() {
        let record = sample();
        let names: Vec<&str> = record.assemblies_in(0).iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert!(record.assemblies_in(1).is_empty());
    }

    #[test]
    fn missing_record_file_is_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            UnpackRecord::read(&dir.path().join("assemblies.json")),
            Err(StoreError::MissingInput(_))
        ));
    }
}
