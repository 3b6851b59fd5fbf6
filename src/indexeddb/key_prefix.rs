//! Key prefix codec.
//!
//! Every key in the backing store starts with a [`KeyPrefix`]: one header
//! byte holding the byte widths of three ids, then the ids themselves.
//!
//! ```text
//! header = (db_width - 1) << 5 | (os_width - 1) << 2 | (idx_width - 1)
//! ```
//!
//! Database and object store ids take 1-8 bytes, index ids 1-4 bytes. The
//! ids are fixed-width integers in [`CodecConfig::int_order`](crate::indexeddb::coding::CodecConfig)
//! (little-endian in Chrome's format).

use std::fmt;

use serde::Serialize;

use crate::indexeddb::coding::{
    encode_fixed_uint, minimal_width, CodecConfig, Endianness, Reader,
};
use crate::indexeddb::constants::*;
use crate::IdbError;

/// Largest database or object store id (63 bits).
pub const MAX_DATABASE_ID: u64 = (1 << 63) - 1;
pub const MAX_OBJECT_STORE_ID: u64 = (1 << 63) - 1;
/// Largest index id (31 bits).
pub const MAX_INDEX_ID: u64 = (1 << 31) - 1;

/// What a key represents, derived from its prefix ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum KeyType {
    GlobalMetadata,
    DatabaseMetadata,
    ObjectStoreData,
    ExistsEntry,
    BlobEntry,
    IndexData,
    Invalid,
}

impl KeyType {
    pub fn name(self) -> &'static str {
        match self {
            KeyType::GlobalMetadata => "GlobalMetadata",
            KeyType::DatabaseMetadata => "DatabaseMetadata",
            KeyType::ObjectStoreData => "ObjectStoreData",
            KeyType::ExistsEntry => "ExistsEntry",
            KeyType::BlobEntry => "BlobEntry",
            KeyType::IndexData => "IndexData",
            KeyType::Invalid => "Invalid",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The `(database, object store, index)` triple heading every key.
///
/// Prefixes order lexicographically by their three ids.
///
/// ```
/// use idb::indexeddb::coding::Reader;
/// use idb::indexeddb::key_prefix::{KeyPrefix, KeyType};
///
/// let prefix = KeyPrefix::object_store_data(1, 2);
/// let bytes = prefix.encode().unwrap();
/// assert_eq!(bytes, vec![0x00, 0x01, 0x02, 0x01]);
///
/// let decoded = KeyPrefix::decode(&mut Reader::new(&bytes)).unwrap();
/// assert_eq!(decoded, prefix);
/// assert_eq!(decoded.key_type(), KeyType::ObjectStoreData);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct KeyPrefix {
    pub database_id: u64,
    pub object_store_id: u64,
    pub index_id: u64,
}

impl KeyPrefix {
    pub fn new(database_id: u64, object_store_id: u64, index_id: u64) -> Self {
        KeyPrefix {
            database_id,
            object_store_id,
            index_id,
        }
    }

    pub fn global_metadata() -> Self {
        Self::new(0, 0, 0)
    }

    pub fn database_metadata(database_id: u64) -> Self {
        Self::new(database_id, 0, 0)
    }

    pub fn object_store_data(database_id: u64, object_store_id: u64) -> Self {
        Self::new(database_id, object_store_id, OBJECT_STORE_DATA_INDEX_ID)
    }

    pub fn exists_entry(database_id: u64, object_store_id: u64) -> Self {
        Self::new(database_id, object_store_id, EXISTS_ENTRY_INDEX_ID)
    }

    pub fn blob_entry(database_id: u64, object_store_id: u64) -> Self {
        Self::new(database_id, object_store_id, BLOB_ENTRY_INDEX_ID)
    }

    pub fn index_data(database_id: u64, object_store_id: u64, index_id: u64) -> Self {
        Self::new(database_id, object_store_id, index_id)
    }

    /// Classify the key by its reserved ids.
    pub fn key_type(&self) -> KeyType {
        if self.database_id == 0 {
            KeyType::GlobalMetadata
        } else if self.object_store_id == 0 {
            KeyType::DatabaseMetadata
        } else {
            match self.index_id {
                OBJECT_STORE_DATA_INDEX_ID => KeyType::ObjectStoreData,
                EXISTS_ENTRY_INDEX_ID => KeyType::ExistsEntry,
                BLOB_ENTRY_INDEX_ID => KeyType::BlobEntry,
                id if id >= MINIMUM_INDEX_ID => KeyType::IndexData,
                _ => KeyType::Invalid,
            }
        }
    }

    /// Decode a prefix, leaving the cursor untouched on failure.
    pub fn decode(reader: &mut Reader<'_>) -> Result<Self, IdbError> {
        reader
            .atomically(|r| {
                let header = r.read_u8()?;
                let db_width = usize::from((header >> 5) & 0x7) + 1;
                let os_width = usize::from((header >> 2) & 0x7) + 1;
                let idx_width = usize::from(header & 0x3) + 1;
                let database_id = r.read_fixed_uint(db_width)?;
                let object_store_id = r.read_fixed_uint(os_width)?;
                let index_id = r.read_fixed_uint(idx_width)?;
                Ok(KeyPrefix::new(database_id, object_store_id, index_id))
            })
            .map_err(|e| IdbError::InvalidKeyPrefix(e.to_string()))
    }

    /// Check the ids fit their fields.
    pub fn validate(&self) -> Result<(), IdbError> {
        if self.database_id > MAX_DATABASE_ID {
            return Err(IdbError::InvalidKeyPrefix(format!(
                "database id {} exceeds 63 bits",
                self.database_id
            )));
        }
        if self.object_store_id > MAX_OBJECT_STORE_ID {
            return Err(IdbError::InvalidKeyPrefix(format!(
                "object store id {} exceeds 63 bits",
                self.object_store_id
            )));
        }
        if self.index_id > MAX_INDEX_ID {
            return Err(IdbError::InvalidKeyPrefix(format!(
                "index id {} exceeds 31 bits",
                self.index_id
            )));
        }
        Ok(())
    }

    /// Append the encoded prefix using minimal widths.
    pub fn encode_into(&self, order: Endianness, out: &mut Vec<u8>) -> Result<(), IdbError> {
        self.validate()?;
        let db_width = minimal_width(self.database_id);
        let os_width = minimal_width(self.object_store_id);
        let idx_width = minimal_width(self.index_id);
        debug_assert!(db_width <= MAX_DATABASE_ID_BYTES);
        debug_assert!(os_width <= MAX_OBJECT_STORE_ID_BYTES);
        debug_assert!(idx_width <= MAX_INDEX_ID_BYTES);
        let header = (((db_width - 1) << 5) | ((os_width - 1) << 2) | (idx_width - 1)) as u8;
        out.push(header);
        encode_fixed_uint(self.database_id, db_width, order, out);
        encode_fixed_uint(self.object_store_id, os_width, order, out);
        encode_fixed_uint(self.index_id, idx_width, order, out);
        Ok(())
    }

    /// Encode with the id byte order of `config`.
    pub fn encode_with(&self, config: CodecConfig) -> Result<Vec<u8>, IdbError> {
        let mut out = Vec::with_capacity(4);
        self.encode_into(config.int_order, &mut out)?;
        Ok(out)
    }

    /// Encode with little-endian ids, whatever the configured order.
    pub fn encode(&self) -> Result<Vec<u8>, IdbError> {
        self.encode_with(CodecConfig {
            int_order: Endianness::Little,
            ..CodecConfig::default()
        })
    }
}

impl fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "db={} os={} idx={}",
            self.database_id, self.object_store_id, self.index_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_type_rules() {
        assert_eq!(KeyPrefix::new(0, 0, 0).key_type(), KeyType::GlobalMetadata);
        assert_eq!(KeyPrefix::new(0, 5, 9).key_type(), KeyType::GlobalMetadata);
        assert_eq!(KeyPrefix::new(1, 0, 0).key_type(), KeyType::DatabaseMetadata);
        assert_eq!(KeyPrefix::new(1, 2, 1).key_type(), KeyType::ObjectStoreData);
        assert_eq!(KeyPrefix::new(1, 2, 2).key_type(), KeyType::ExistsEntry);
        assert_eq!(KeyPrefix::new(1, 2, 3).key_type(), KeyType::BlobEntry);
        assert_eq!(KeyPrefix::new(1, 2, 30).key_type(), KeyType::IndexData);
        assert_eq!(KeyPrefix::new(1, 2, 0).key_type(), KeyType::Invalid);
        assert_eq!(KeyPrefix::new(1, 2, 29).key_type(), KeyType::Invalid);
    }

    #[test]
    fn test_widths_in_header() {
        let prefix = KeyPrefix::new(0x1234, 0x01_0000, 40);
        let bytes = prefix.encode().unwrap();
        assert_eq!(bytes[0], (1 << 5) | (2 << 2));
        assert_eq!(bytes.len(), 1 + 2 + 3 + 1);
        assert_eq!(&bytes[1..3], &[0x34, 0x12]);
        assert_eq!(KeyPrefix::decode(&mut Reader::new(&bytes)).unwrap(), prefix);
    }

    #[test]
    fn test_big_endian_ids() {
        let config = CodecConfig {
            int_order: Endianness::Big,
            ..CodecConfig::default()
        };
        let prefix = KeyPrefix::new(0x0102, 3, 30);
        let bytes = prefix.encode_with(config).unwrap();
        assert_eq!(&bytes[1..3], &[0x01, 0x02]);
        let decoded = KeyPrefix::decode(&mut Reader::with_config(&bytes, config)).unwrap();
        assert_eq!(decoded, prefix);
        assert_eq!(&prefix.encode().unwrap()[1..3], &[0x02, 0x01]);
    }

    #[test]
    fn test_truncated_prefix() {
        // Header declares an 8-byte database id.
        let data = [0xe0, 0x01, 0x02];
        let mut r = Reader::new(&data);
        let err = KeyPrefix::decode(&mut r).unwrap_err();
        assert!(matches!(err, IdbError::InvalidKeyPrefix(_)));
        assert_eq!(r.position(), 0);
        assert!(KeyPrefix::decode(&mut Reader::new(&[])).is_err());
    }

    #[test]
    fn test_index_id_limit() {
        assert!(KeyPrefix::new(1, 1, MAX_INDEX_ID).encode().is_ok());
        assert!(matches!(
            KeyPrefix::new(1, 1, MAX_INDEX_ID + 1).encode(),
            Err(IdbError::InvalidKeyPrefix(_))
        ));
    }

    #[test]
    fn test_prefix_ordering() {
        assert!(KeyPrefix::new(1, 0, 0) < KeyPrefix::new(1, 0, 1));
        assert!(KeyPrefix::new(1, 9, 9) < KeyPrefix::new(2, 0, 0));
        assert!(KeyPrefix::new(1, 1, 40) > KeyPrefix::new(1, 1, 3));
    }
}
