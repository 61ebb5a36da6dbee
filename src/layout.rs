//! On-disk names of stores, manifest, and side record.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreResult};

pub const PRIMARY_STORE_FILE: &str = "assemblies.blob";
pub const MANIFEST_FILE: &str = "assemblies.manifest";
pub const RECORD_FILE: &str = "assemblies.json";
pub const MODULE_EXTENSION: &str = "dll";

pub const KNOWN_ARCHITECTURES: [&str; 4] = ["arm64_v8a", "armeabi_v7a", "x86", "x86_64"];

/// `assemblies.<arch>.blob`
pub fn arch_store_file(arch: &str) -> String {
    format!("assemblies.{arch}.blob")
}

pub fn is_known_arch(arch: &str) -> bool {
    KNOWN_ARCHITECTURES.contains(&arch)
}

/// Output path of a module, relative to the unpack directory.
///
/// Names are sanitised so a module can never escape the output directory.
pub fn module_path(arch: Option<&str>, name: &str) -> PathBuf {
    let file: String = name
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    let file = if file.is_empty() || file.chars().all(|c| c == '.') {
        format!("_{file}")
    } else {
        file
    };
    let mut path = PathBuf::new();
    if let Some(arch) = arch {
        path.push(arch);
    }
    path.push(format!("{file}.{MODULE_EXTENSION}"));
    path
}

/// Forward-slash form of a relative path, as stored in the side record.
pub fn record_path(path: &Path) -> String {
    path.iter()
        .map(|c| c.to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Fail with `OutputExists` if `path` is already present.
pub fn ensure_absent(path: &Path) -> StoreResult<()> {
    if path.exists() {
        return Err(StoreError::OutputExists(path.to_owned()));
    }
    Ok(())
}

/// Create `path` (and its parents) and write `bytes`; never overwrites.
pub fn write_new(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => StoreError::OutputExists(path.to_owned()),
            _ => StoreError::Io(e),
        })?;
    file.write_all(bytes)?;
    Ok(())
}
