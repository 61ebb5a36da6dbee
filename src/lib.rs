pub mod error;
pub mod header;
pub mod hash;
pub mod hash_table;
pub mod codec;
pub mod block;
pub mod manifest;
pub mod store;
pub mod record;
pub mod layout;
pub mod unpack;
pub mod pack;

pub use error::{StoreError, StoreResult};
pub use header::{AssemblyEntry, StoreHeader};
pub use hash::NameHash;
pub use hash_table::{HashRecord, HashTables};
pub use codec::{BlockCodec, Lz4BlockCodec};
pub use block::{FrameHeader, encode_block, decode_block};
pub use manifest::{Manifest, ManifestRecord};
pub use store::{ReadOptions, StoreFile};
pub use record::UnpackRecord;
pub use unpack::{StoreExtractor, UnpackOptions};
pub use pack::{PackOptions, StoreAssembler};
