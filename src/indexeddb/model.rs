//! Reconstructed backing store contents.
//!
//! [`IndexedPool`] is the root: global metadata plus every
//! [`IndexedDatabase`] seen, each holding its [`ObjectStore`]s. Entries are
//! created on first reference by id and filled in as more keys for that id
//! are applied, so every field that comes from a single metadata key is an
//! `Option` until that key has been seen.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Serialize, Serializer};

use crate::clone::blink::DecodedValue;
use crate::indexeddb::idb_key::{IndexedDbKey, IndexedDbKeyPath};

/// One `(database, blob key)` pair of a blob journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct BlobJournalEntry {
    pub database_id: u64,
    pub blob_key: u64,
}

/// External blob or file attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlobDescriptor {
    File {
        key: u64,
        content_type: String,
        file_name: String,
    },
    Blob {
        key: u64,
        content_type: String,
        size: u64,
    },
}

impl BlobDescriptor {
    pub fn key(&self) -> u64 {
        match self {
            BlobDescriptor::File { key, .. } | BlobDescriptor::Blob { key, .. } => *key,
        }
    }
}

/// A record value with the version number stored in front of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub version: u64,
    pub value: DecodedValue,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct IndexMeta {
    pub id: u64,
    pub name: Option<String>,
    pub unique: Option<bool>,
    pub key_path: Option<IndexedDbKeyPath>,
    pub multi_entry: Option<bool>,
}

/// One index data row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexEntry {
    pub index_key: IndexedDbKey,
    pub sequence_number: Option<u64>,
    pub primary_key: Option<IndexedDbKey>,
    pub version: u64,
    /// Primary key stored in the value; matches `primary_key` in current encodings.
    pub referenced_primary_key: Option<IndexedDbKey>,
}

fn as_entries<K, V, S>(map: &BTreeMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
where
    K: Serialize,
    V: Serialize,
    S: Serializer,
{
    #[derive(Serialize)]
    struct Entry<'a, K, V> {
        key: &'a K,
        value: &'a V,
    }
    serializer.collect_seq(map.iter().map(|(key, value)| Entry { key, value }))
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ObjectStore {
    pub id: u64,
    pub name: Option<String>,
    pub key_path: Option<IndexedDbKeyPath>,
    pub auto_increment: Option<bool>,
    pub evictable: Option<bool>,
    pub last_version: Option<u64>,
    pub max_index_id: Option<u64>,
    pub has_key_path: Option<bool>,
    pub key_generator_current: Option<u64>,
    pub indices: BTreeMap<u64, IndexMeta>,
    #[serde(serialize_with = "as_entries")]
    pub records: BTreeMap<IndexedDbKey, Record>,
    #[serde(serialize_with = "as_entries")]
    pub exists_markers: BTreeMap<IndexedDbKey, u64>,
    #[serde(serialize_with = "as_entries")]
    pub blob_metadata: BTreeMap<IndexedDbKey, Vec<BlobDescriptor>>,
    /// Rows per index id, in the order they were applied.
    pub index_entries: BTreeMap<u64, Vec<IndexEntry>>,
}

impl ObjectStore {
    pub fn new(id: u64) -> Self {
        ObjectStore {
            id,
            ..Default::default()
        }
    }

    pub fn index_mut(&mut self, index_id: u64) -> &mut IndexMeta {
        self.indices.entry(index_id).or_insert_with(|| IndexMeta {
            id: index_id,
            ..Default::default()
        })
    }

    pub fn record(&self, key: &IndexedDbKey) -> Option<&Record> {
        self.records.get(key)
    }

    pub fn index_by_name(&self, name: &str) -> Option<&IndexMeta> {
        self.indices
            .values()
            .find(|i| i.name.as_deref() == Some(name))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct IndexedDatabase {
    pub id: u64,
    pub name: Option<String>,
    pub origin: Option<String>,
    pub string_version: Option<String>,
    pub idb_version: Option<u64>,
    pub max_object_store_id: Option<u64>,
    pub blob_key_generator: Option<u64>,
    pub object_stores: BTreeMap<u64, ObjectStore>,
    pub free_object_store_ids: BTreeSet<u64>,
    /// Free index ids per object store.
    pub free_index_ids: BTreeMap<u64, BTreeSet<u64>>,
    /// Object store name lookup rows.
    pub object_store_names: BTreeMap<String, u64>,
    /// Index name lookup rows per object store.
    pub index_names: BTreeMap<u64, BTreeMap<String, u64>>,
}

impl IndexedDatabase {
    pub fn new(id: u64) -> Self {
        IndexedDatabase {
            id,
            ..Default::default()
        }
    }

    pub fn object_store_mut(&mut self, object_store_id: u64) -> &mut ObjectStore {
        self.object_stores
            .entry(object_store_id)
            .or_insert_with(|| ObjectStore::new(object_store_id))
    }

    pub fn object_store(&self, object_store_id: u64) -> Option<&ObjectStore> {
        self.object_stores.get(&object_store_id)
    }

    pub fn object_store_by_name(&self, name: &str) -> Option<&ObjectStore> {
        self.object_stores
            .values()
            .find(|s| s.name.as_deref() == Some(name))
            .or_else(|| {
                self.object_store_names
                    .get(name)
                    .and_then(|id| self.object_stores.get(id))
            })
    }

    pub fn record_count(&self) -> usize {
        self.object_stores.values().map(|s| s.records.len()).sum()
    }
}

/// Everything recovered from one backing store.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct IndexedPool {
    pub schema_version: Option<u64>,
    pub max_database_id: Option<u64>,
    pub data_version: Option<u64>,
    pub earliest_sweep: Option<u64>,
    pub primary_blob_journal: Vec<BlobJournalEntry>,
    pub live_blob_journal: Vec<BlobJournalEntry>,
    pub free_database_ids: BTreeSet<u64>,
    pub databases: BTreeMap<u64, IndexedDatabase>,
}

impl IndexedPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn database_mut(&mut self, database_id: u64) -> &mut IndexedDatabase {
        self.databases
            .entry(database_id)
            .or_insert_with(|| IndexedDatabase::new(database_id))
    }

    pub fn database(&self, database_id: u64) -> Option<&IndexedDatabase> {
        self.databases.get(&database_id)
    }

    pub fn database_by_name(&self, name: &str) -> Option<&IndexedDatabase> {
        self.databases
            .values()
            .find(|d| d.name.as_deref() == Some(name))
    }

    pub fn record_count(&self) -> usize {
        self.databases.values().map(IndexedDatabase::record_count).sum()
    }
}
