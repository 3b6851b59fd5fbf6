//! Per-type key suffix layouts.
//!
//! After the [`KeyPrefix`], the rest of a key depends on its [`KeyType`]:
//!
//! | Key type | Suffix |
//! |----------|--------|
//! | GlobalMetadata | type byte, then type-specific fields |
//! | DatabaseMetadata | type byte, then type-specific fields |
//! | ObjectStoreData / ExistsEntry / BlobEntry | encoded primary key |
//! | IndexData | index key, optional sequence number, optional primary key |
//!
//! [`ParsedKey`] is the fully decoded form of any key and can re-encode
//! itself, which is how comparator test vectors are produced.

use std::fmt;

use serde::Serialize;

use crate::indexeddb::coding::{
    encode_string_with_length, encode_varint, CodecConfig, Endianness, Reader,
};
use crate::indexeddb::constants::*;
use crate::indexeddb::idb_key::IndexedDbKey;
use crate::indexeddb::key_prefix::{KeyPrefix, KeyType};
use crate::IdbError;

/// Keys stored under database id 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "fields")]
pub enum GlobalMetadataKey {
    SchemaVersion,
    MaxDatabaseId,
    DataVersion,
    BlobJournal,
    LiveBlobJournal,
    EarliestSweepTime,
    DatabaseFreeList { database_id: u64 },
    DatabaseName { origin: String, database_name: String },
}

impl GlobalMetadataKey {
    pub fn type_byte(&self) -> u8 {
        match self {
            GlobalMetadataKey::SchemaVersion => SCHEMA_VERSION_TYPE_BYTE,
            GlobalMetadataKey::MaxDatabaseId => MAX_DATABASE_ID_TYPE_BYTE,
            GlobalMetadataKey::DataVersion => DATA_VERSION_TYPE_BYTE,
            GlobalMetadataKey::BlobJournal => BLOB_JOURNAL_TYPE_BYTE,
            GlobalMetadataKey::LiveBlobJournal => LIVE_BLOB_JOURNAL_TYPE_BYTE,
            GlobalMetadataKey::EarliestSweepTime => EARLIEST_SWEEP_TIME_TYPE_BYTE,
            GlobalMetadataKey::DatabaseFreeList { .. } => DATABASE_FREE_LIST_TYPE_BYTE,
            GlobalMetadataKey::DatabaseName { .. } => DATABASE_NAME_TYPE_BYTE,
        }
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, IdbError> {
        let offset = r.position();
        let type_byte = r.read_u8()?;
        Ok(match type_byte {
            SCHEMA_VERSION_TYPE_BYTE => GlobalMetadataKey::SchemaVersion,
            MAX_DATABASE_ID_TYPE_BYTE => GlobalMetadataKey::MaxDatabaseId,
            DATA_VERSION_TYPE_BYTE => GlobalMetadataKey::DataVersion,
            BLOB_JOURNAL_TYPE_BYTE => GlobalMetadataKey::BlobJournal,
            LIVE_BLOB_JOURNAL_TYPE_BYTE => GlobalMetadataKey::LiveBlobJournal,
            EARLIEST_SWEEP_TIME_TYPE_BYTE => GlobalMetadataKey::EarliestSweepTime,
            DATABASE_FREE_LIST_TYPE_BYTE => GlobalMetadataKey::DatabaseFreeList {
                database_id: r.read_varint()?,
            },
            DATABASE_NAME_TYPE_BYTE => GlobalMetadataKey::DatabaseName {
                origin: r.read_string_with_length()?,
                database_name: r.read_string_with_length()?,
            },
            tag => {
                return Err(IdbError::MalformedTag {
                    tag,
                    offset,
                    context: "global metadata type",
                })
            }
        })
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.type_byte());
        match self {
            GlobalMetadataKey::DatabaseFreeList { database_id } => encode_varint(*database_id, out),
            GlobalMetadataKey::DatabaseName {
                origin,
                database_name,
            } => {
                encode_string_with_length(origin, out);
                encode_string_with_length(database_name, out);
            }
            _ => {}
        }
    }
}

/// Object store metadata field selected by the sub-type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ObjectStoreMetaType {
    Name,
    KeyPath,
    AutoIncrement,
    Evictable,
    LastVersion,
    MaxIndexId,
    HasKeyPath,
    KeyGeneratorCurrentNumber,
    Unknown(u8),
}

impl ObjectStoreMetaType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            OBJECT_STORE_NAME => ObjectStoreMetaType::Name,
            OBJECT_STORE_KEY_PATH => ObjectStoreMetaType::KeyPath,
            OBJECT_STORE_AUTO_INCREMENT => ObjectStoreMetaType::AutoIncrement,
            OBJECT_STORE_EVICTABLE => ObjectStoreMetaType::Evictable,
            OBJECT_STORE_LAST_VERSION => ObjectStoreMetaType::LastVersion,
            OBJECT_STORE_MAX_INDEX_ID => ObjectStoreMetaType::MaxIndexId,
            OBJECT_STORE_HAS_KEY_PATH => ObjectStoreMetaType::HasKeyPath,
            OBJECT_STORE_KEY_GENERATOR_CURRENT_NUMBER => {
                ObjectStoreMetaType::KeyGeneratorCurrentNumber
            }
            v => ObjectStoreMetaType::Unknown(v),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            ObjectStoreMetaType::Name => OBJECT_STORE_NAME,
            ObjectStoreMetaType::KeyPath => OBJECT_STORE_KEY_PATH,
            ObjectStoreMetaType::AutoIncrement => OBJECT_STORE_AUTO_INCREMENT,
            ObjectStoreMetaType::Evictable => OBJECT_STORE_EVICTABLE,
            ObjectStoreMetaType::LastVersion => OBJECT_STORE_LAST_VERSION,
            ObjectStoreMetaType::MaxIndexId => OBJECT_STORE_MAX_INDEX_ID,
            ObjectStoreMetaType::HasKeyPath => OBJECT_STORE_HAS_KEY_PATH,
            ObjectStoreMetaType::KeyGeneratorCurrentNumber => {
                OBJECT_STORE_KEY_GENERATOR_CURRENT_NUMBER
            }
            ObjectStoreMetaType::Unknown(v) => v,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ObjectStoreMetaType::Name => "Name",
            ObjectStoreMetaType::KeyPath => "KeyPath",
            ObjectStoreMetaType::AutoIncrement => "AutoIncrement",
            ObjectStoreMetaType::Evictable => "Evictable",
            ObjectStoreMetaType::LastVersion => "LastVersion",
            ObjectStoreMetaType::MaxIndexId => "MaxIndexId",
            ObjectStoreMetaType::HasKeyPath => "HasKeyPath",
            ObjectStoreMetaType::KeyGeneratorCurrentNumber => "KeyGeneratorCurrentNumber",
            ObjectStoreMetaType::Unknown(_) => "Unknown",
        }
    }
}

/// Index metadata field selected by the sub-type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IndexMetaType {
    Name,
    Unique,
    KeyPath,
    MultiEntry,
    Unknown(u8),
}

impl IndexMetaType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            INDEX_NAME => IndexMetaType::Name,
            INDEX_UNIQUE => IndexMetaType::Unique,
            INDEX_KEY_PATH => IndexMetaType::KeyPath,
            INDEX_MULTI_ENTRY => IndexMetaType::MultiEntry,
            v => IndexMetaType::Unknown(v),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            IndexMetaType::Name => INDEX_NAME,
            IndexMetaType::Unique => INDEX_UNIQUE,
            IndexMetaType::KeyPath => INDEX_KEY_PATH,
            IndexMetaType::MultiEntry => INDEX_MULTI_ENTRY,
            IndexMetaType::Unknown(v) => v,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            IndexMetaType::Name => "Name",
            IndexMetaType::Unique => "Unique",
            IndexMetaType::KeyPath => "KeyPath",
            IndexMetaType::MultiEntry => "MultiEntry",
            IndexMetaType::Unknown(_) => "Unknown",
        }
    }
}

/// Keys stored under a database id with object store id 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "fields")]
pub enum DatabaseMetadataKey {
    OriginName,
    DatabaseName,
    UserStringVersion,
    MaxObjectStoreId,
    UserVersion,
    BlobKeyGeneratorCurrentNumber,
    /// The store id is a single byte in this key, unlike everywhere else.
    ObjectStoreMeta {
        object_store_id: u8,
        meta_type: ObjectStoreMetaType,
    },
    IndexMeta {
        object_store_id: u64,
        index_id: u64,
        meta_type: IndexMetaType,
    },
    ObjectStoreFreeList {
        object_store_id: u64,
    },
    IndexFreeList {
        object_store_id: u64,
        index_id: u64,
    },
    ObjectStoreNames {
        name: String,
    },
    IndexNames {
        object_store_id: u64,
        name: String,
    },
}

impl DatabaseMetadataKey {
    pub fn type_byte(&self) -> u8 {
        match self {
            DatabaseMetadataKey::OriginName => ORIGIN_NAME_TYPE_BYTE,
            DatabaseMetadataKey::DatabaseName => DATABASE_NAME_META_TYPE_BYTE,
            DatabaseMetadataKey::UserStringVersion => USER_STRING_VERSION_TYPE_BYTE,
            DatabaseMetadataKey::MaxObjectStoreId => MAX_OBJECT_STORE_ID_TYPE_BYTE,
            DatabaseMetadataKey::UserVersion => USER_VERSION_TYPE_BYTE,
            DatabaseMetadataKey::BlobKeyGeneratorCurrentNumber => {
                BLOB_KEY_GENERATOR_CURRENT_NUMBER_TYPE_BYTE
            }
            DatabaseMetadataKey::ObjectStoreMeta { .. } => OBJECT_STORE_META_DATA_TYPE_BYTE,
            DatabaseMetadataKey::IndexMeta { .. } => INDEX_META_DATA_TYPE_BYTE,
            DatabaseMetadataKey::ObjectStoreFreeList { .. } => OBJECT_STORE_FREE_LIST_TYPE_BYTE,
            DatabaseMetadataKey::IndexFreeList { .. } => INDEX_FREE_LIST_TYPE_BYTE,
            DatabaseMetadataKey::ObjectStoreNames { .. } => OBJECT_STORE_NAMES_TYPE_BYTE,
            DatabaseMetadataKey::IndexNames { .. } => INDEX_NAMES_KEY_TYPE_BYTE,
        }
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, IdbError> {
        let offset = r.position();
        let type_byte = r.read_u8()?;
        Ok(match type_byte {
            ORIGIN_NAME_TYPE_BYTE => DatabaseMetadataKey::OriginName,
            DATABASE_NAME_META_TYPE_BYTE => DatabaseMetadataKey::DatabaseName,
            USER_STRING_VERSION_TYPE_BYTE => DatabaseMetadataKey::UserStringVersion,
            MAX_OBJECT_STORE_ID_TYPE_BYTE => DatabaseMetadataKey::MaxObjectStoreId,
            USER_VERSION_TYPE_BYTE => DatabaseMetadataKey::UserVersion,
            BLOB_KEY_GENERATOR_CURRENT_NUMBER_TYPE_BYTE => {
                DatabaseMetadataKey::BlobKeyGeneratorCurrentNumber
            }
            OBJECT_STORE_META_DATA_TYPE_BYTE => DatabaseMetadataKey::ObjectStoreMeta {
                object_store_id: r.read_u8()?,
                meta_type: ObjectStoreMetaType::from_u8(r.read_u8()?),
            },
            INDEX_META_DATA_TYPE_BYTE => DatabaseMetadataKey::IndexMeta {
                object_store_id: r.read_varint()?,
                index_id: r.read_varint()?,
                meta_type: IndexMetaType::from_u8(r.read_u8()?),
            },
            OBJECT_STORE_FREE_LIST_TYPE_BYTE => DatabaseMetadataKey::ObjectStoreFreeList {
                object_store_id: r.read_varint()?,
            },
            INDEX_FREE_LIST_TYPE_BYTE => DatabaseMetadataKey::IndexFreeList {
                object_store_id: r.read_varint()?,
                index_id: r.read_varint()?,
            },
            OBJECT_STORE_NAMES_TYPE_BYTE => DatabaseMetadataKey::ObjectStoreNames {
                name: r.read_string_with_length()?,
            },
            INDEX_NAMES_KEY_TYPE_BYTE => DatabaseMetadataKey::IndexNames {
                object_store_id: r.read_varint()?,
                name: r.read_string_with_length()?,
            },
            tag => {
                return Err(IdbError::MalformedTag {
                    tag,
                    offset,
                    context: "database metadata type",
                })
            }
        })
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.type_byte());
        match self {
            DatabaseMetadataKey::ObjectStoreMeta {
                object_store_id,
                meta_type,
            } => {
                out.push(*object_store_id);
                out.push(meta_type.as_u8());
            }
            DatabaseMetadataKey::IndexMeta {
                object_store_id,
                index_id,
                meta_type,
            } => {
                encode_varint(*object_store_id, out);
                encode_varint(*index_id, out);
                out.push(meta_type.as_u8());
            }
            DatabaseMetadataKey::ObjectStoreFreeList { object_store_id } => {
                encode_varint(*object_store_id, out)
            }
            DatabaseMetadataKey::IndexFreeList {
                object_store_id,
                index_id,
            } => {
                encode_varint(*object_store_id, out);
                encode_varint(*index_id, out);
            }
            DatabaseMetadataKey::ObjectStoreNames { name } => encode_string_with_length(name, out),
            DatabaseMetadataKey::IndexNames {
                object_store_id,
                name,
            } => {
                encode_varint(*object_store_id, out);
                encode_string_with_length(name, out);
            }
            _ => {}
        }
    }
}

/// Suffix of an index data key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexDataKey {
    pub prefix: KeyPrefix,
    pub index_key: IndexedDbKey,
    /// Absent in legacy encodings.
    pub sequence_number: Option<u64>,
    /// Absent in legacy encodings.
    pub primary_key: Option<IndexedDbKey>,
}

/// A fully decoded backing store key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "key")]
pub enum ParsedKey {
    GlobalMetadata(GlobalMetadataKey),
    DatabaseMetadata {
        database_id: u64,
        key: DatabaseMetadataKey,
    },
    /// `primary_key` is `None` for the degenerate empty-suffix key.
    ObjectStoreData {
        prefix: KeyPrefix,
        primary_key: Option<IndexedDbKey>,
    },
    ExistsEntry {
        prefix: KeyPrefix,
        primary_key: Option<IndexedDbKey>,
    },
    BlobEntry {
        prefix: KeyPrefix,
        primary_key: Option<IndexedDbKey>,
    },
    IndexData(IndexDataKey),
}

impl ParsedKey {
    /// Decode `data` with the default (little-endian) configuration.
    pub fn from_bytes(data: &[u8]) -> Result<Self, IdbError> {
        Self::decode(data, CodecConfig::default())
    }

    /// Decode a whole key. Bytes left over after the suffix are an error.
    pub fn decode(data: &[u8], config: CodecConfig) -> Result<Self, IdbError> {
        let mut r = Reader::with_config(data, config);
        let prefix = KeyPrefix::decode(&mut r)?;
        let key = Self::decode_suffix(prefix, &mut r)?;
        if !r.is_empty() {
            return Err(IdbError::LengthMismatch {
                context: "key suffix",
                declared: r.position() as u64,
                actual: data.len() as u64,
            });
        }
        Ok(key)
    }

    /// Decode the part of a key following `prefix`, leaving any trailing
    /// bytes in the reader.
    pub fn decode_suffix(prefix: KeyPrefix, r: &mut Reader<'_>) -> Result<Self, IdbError> {
        let optional_key = |r: &mut Reader<'_>| -> Result<Option<IndexedDbKey>, IdbError> {
            if r.is_empty() {
                Ok(None)
            } else {
                IndexedDbKey::decode(r).map(Some)
            }
        };
        match prefix.key_type() {
            KeyType::GlobalMetadata => GlobalMetadataKey::decode(r).map(ParsedKey::GlobalMetadata),
            KeyType::DatabaseMetadata => Ok(ParsedKey::DatabaseMetadata {
                database_id: prefix.database_id,
                key: DatabaseMetadataKey::decode(r)?,
            }),
            KeyType::ObjectStoreData => Ok(ParsedKey::ObjectStoreData {
                prefix,
                primary_key: optional_key(r)?,
            }),
            KeyType::ExistsEntry => Ok(ParsedKey::ExistsEntry {
                prefix,
                primary_key: optional_key(r)?,
            }),
            KeyType::BlobEntry => Ok(ParsedKey::BlobEntry {
                prefix,
                primary_key: optional_key(r)?,
            }),
            KeyType::IndexData => {
                let index_key = IndexedDbKey::decode(r)?;
                let sequence_number = if r.is_empty() {
                    None
                } else {
                    Some(r.read_varint()?)
                };
                let primary_key = optional_key(r)?;
                Ok(ParsedKey::IndexData(IndexDataKey {
                    prefix,
                    index_key,
                    sequence_number,
                    primary_key,
                }))
            }
            KeyType::Invalid => Err(IdbError::InvalidKeyPrefix(format!(
                "reserved index id {} ({})",
                prefix.index_id, prefix
            ))),
        }
    }

    pub fn prefix(&self) -> KeyPrefix {
        match self {
            ParsedKey::GlobalMetadata(_) => KeyPrefix::global_metadata(),
            ParsedKey::DatabaseMetadata { database_id, .. } => {
                KeyPrefix::database_metadata(*database_id)
            }
            ParsedKey::ObjectStoreData { prefix, .. }
            | ParsedKey::ExistsEntry { prefix, .. }
            | ParsedKey::BlobEntry { prefix, .. } => *prefix,
            ParsedKey::IndexData(k) => k.prefix,
        }
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            ParsedKey::GlobalMetadata(_) => KeyType::GlobalMetadata,
            ParsedKey::DatabaseMetadata { .. } => KeyType::DatabaseMetadata,
            ParsedKey::ObjectStoreData { .. } => KeyType::ObjectStoreData,
            ParsedKey::ExistsEntry { .. } => KeyType::ExistsEntry,
            ParsedKey::BlobEntry { .. } => KeyType::BlobEntry,
            ParsedKey::IndexData(_) => KeyType::IndexData,
        }
    }

    /// Encode with the given int/double byte orders.
    pub fn encode_with(&self, config: CodecConfig) -> Result<Vec<u8>, IdbError> {
        let mut out = Vec::new();
        let prefix = self.prefix();
        if prefix.key_type() != self.key_type() {
            return Err(IdbError::InvalidKeyPrefix(format!(
                "{} prefix {} classifies as {}",
                self.key_type(),
                prefix,
                prefix.key_type()
            )));
        }
        prefix.encode_into(config.int_order, &mut out)?;
        let order = config.host_order;
        match self {
            ParsedKey::GlobalMetadata(k) => k.encode_into(&mut out),
            ParsedKey::DatabaseMetadata { key, .. } => key.encode_into(&mut out),
            ParsedKey::ObjectStoreData { primary_key, .. }
            | ParsedKey::ExistsEntry { primary_key, .. }
            | ParsedKey::BlobEntry { primary_key, .. } => {
                if let Some(k) = primary_key {
                    k.encode_into(order, &mut out);
                }
            }
            ParsedKey::IndexData(k) => {
                k.index_key.encode_into(order, &mut out);
                match (k.sequence_number, &k.primary_key) {
                    (Some(seq), primary) => {
                        encode_varint(seq, &mut out);
                        if let Some(p) = primary {
                            p.encode_into(order, &mut out);
                        }
                    }
                    (None, None) => {}
                    (None, Some(_)) => {
                        return Err(IdbError::Argument(
                            "index data key has a primary key but no sequence number".into(),
                        ))
                    }
                }
            }
        }
        Ok(out)
    }

    /// Encode with little-endian ids and doubles, whatever the configured
    /// orders. Use [`encode_with`](Self::encode_with) to honor them.
    pub fn encode(&self) -> Result<Vec<u8>, IdbError> {
        self.encode_with(CodecConfig {
            int_order: Endianness::Little,
            host_order: Endianness::Little,
        })
    }
}

fn fmt_optional_key(f: &mut fmt::Formatter<'_>, key: &Option<IndexedDbKey>) -> fmt::Result {
    match key {
        Some(k) => write!(f, "{}", k),
        None => write!(f, "<empty>"),
    }
}

impl fmt::Display for ParsedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParsedKey::GlobalMetadata(k) => match k {
                GlobalMetadataKey::DatabaseFreeList { database_id } => {
                    write!(f, "GlobalMetadata: DatabaseFreeList(db={})", database_id)
                }
                GlobalMetadataKey::DatabaseName {
                    origin,
                    database_name,
                } => write!(
                    f,
                    "GlobalMetadata: DatabaseName(origin={:?}, name={:?})",
                    origin, database_name
                ),
                other => write!(f, "GlobalMetadata: {:?}", other),
            },
            ParsedKey::DatabaseMetadata { database_id, key } => {
                write!(f, "DatabaseMetadata(db={}): ", database_id)?;
                match key {
                    DatabaseMetadataKey::ObjectStoreMeta {
                        object_store_id,
                        meta_type,
                    } => write!(
                        f,
                        "ObjectStoreMeta(os={}, {}/{})",
                        object_store_id,
                        meta_type.name(),
                        meta_type.as_u8()
                    ),
                    DatabaseMetadataKey::IndexMeta {
                        object_store_id,
                        index_id,
                        meta_type,
                    } => write!(
                        f,
                        "IndexMeta(os={}, idx={}, {}/{})",
                        object_store_id,
                        index_id,
                        meta_type.name(),
                        meta_type.as_u8()
                    ),
                    other => write!(f, "{:?}", other),
                }
            }
            ParsedKey::ObjectStoreData {
                prefix,
                primary_key,
            } => {
                write!(f, "ObjectStoreData({}): ", prefix)?;
                fmt_optional_key(f, primary_key)
            }
            ParsedKey::ExistsEntry {
                prefix,
                primary_key,
            } => {
                write!(f, "ExistsEntry({}): ", prefix)?;
                fmt_optional_key(f, primary_key)
            }
            ParsedKey::BlobEntry {
                prefix,
                primary_key,
            } => {
                write!(f, "BlobEntry({}): ", prefix)?;
                fmt_optional_key(f, primary_key)
            }
            ParsedKey::IndexData(k) => {
                write!(f, "IndexData({}): key={}", k.prefix, k.index_key)?;
                if let Some(seq) = k.sequence_number {
                    write!(f, " seq={}", seq)?;
                }
                if let Some(p) = &k.primary_key {
                    write!(f, " primary={}", p)?;
                }
                Ok(())
            }
        }
    }
}
