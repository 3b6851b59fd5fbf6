//! IndexedDB backing store constants.
//!
//! Reserved key prefix ids, metadata type bytes and key tags as written by
//! Chromium's `indexed_db_leveldb_coding`.

/// Name the comparator is registered under in the LevelDB manifest.
pub const COMPARATOR_NAME: &str = "idb_cmp1";

// Reserved index ids
pub const OBJECT_STORE_DATA_INDEX_ID: u64 = 1;
pub const EXISTS_ENTRY_INDEX_ID: u64 = 2;
pub const BLOB_ENTRY_INDEX_ID: u64 = 3;
pub const MINIMUM_INDEX_ID: u64 = 30;

// Key prefix field limits
pub const MAX_DATABASE_ID_BYTES: usize = 8;
pub const MAX_OBJECT_STORE_ID_BYTES: usize = 8;
pub const MAX_INDEX_ID_BYTES: usize = 4;

// Global metadata type bytes (database id 0)
pub const SCHEMA_VERSION_TYPE_BYTE: u8 = 0;
pub const MAX_DATABASE_ID_TYPE_BYTE: u8 = 1;
pub const DATA_VERSION_TYPE_BYTE: u8 = 2;
pub const BLOB_JOURNAL_TYPE_BYTE: u8 = 3;
pub const LIVE_BLOB_JOURNAL_TYPE_BYTE: u8 = 4;
pub const EARLIEST_SWEEP_TIME_TYPE_BYTE: u8 = 5;
pub const MAX_SIMPLE_GLOBAL_META_DATA_TYPE_BYTE: u8 = 6;
pub const DATABASE_FREE_LIST_TYPE_BYTE: u8 = 100;
pub const DATABASE_NAME_TYPE_BYTE: u8 = 201;

// Database metadata type bytes (object store id 0)
pub const ORIGIN_NAME_TYPE_BYTE: u8 = 0;
pub const DATABASE_NAME_META_TYPE_BYTE: u8 = 1;
pub const USER_STRING_VERSION_TYPE_BYTE: u8 = 2;
pub const MAX_OBJECT_STORE_ID_TYPE_BYTE: u8 = 3;
pub const USER_VERSION_TYPE_BYTE: u8 = 4;
pub const BLOB_KEY_GENERATOR_CURRENT_NUMBER_TYPE_BYTE: u8 = 5;
pub const MAX_SIMPLE_DATABASE_META_DATA_TYPE_BYTE: u8 = 6;
pub const OBJECT_STORE_META_DATA_TYPE_BYTE: u8 = 50;
pub const INDEX_META_DATA_TYPE_BYTE: u8 = 100;
pub const OBJECT_STORE_FREE_LIST_TYPE_BYTE: u8 = 150;
pub const INDEX_FREE_LIST_TYPE_BYTE: u8 = 151;
pub const OBJECT_STORE_NAMES_TYPE_BYTE: u8 = 200;
pub const INDEX_NAMES_KEY_TYPE_BYTE: u8 = 201;

// Object store metadata sub-types
pub const OBJECT_STORE_NAME: u8 = 0;
pub const OBJECT_STORE_KEY_PATH: u8 = 1;
pub const OBJECT_STORE_AUTO_INCREMENT: u8 = 2;
pub const OBJECT_STORE_EVICTABLE: u8 = 3;
pub const OBJECT_STORE_LAST_VERSION: u8 = 4;
pub const OBJECT_STORE_MAX_INDEX_ID: u8 = 5;
pub const OBJECT_STORE_HAS_KEY_PATH: u8 = 6;
pub const OBJECT_STORE_KEY_GENERATOR_CURRENT_NUMBER: u8 = 7;

// Index metadata sub-types
pub const INDEX_NAME: u8 = 0;
pub const INDEX_UNIQUE: u8 = 1;
pub const INDEX_KEY_PATH: u8 = 2;
pub const INDEX_MULTI_ENTRY: u8 = 3;

// IndexedDBKey type tags
pub const INDEXED_DB_KEY_NULL_TYPE_BYTE: u8 = 0;
pub const INDEXED_DB_KEY_STRING_TYPE_BYTE: u8 = 1;
pub const INDEXED_DB_KEY_DATE_TYPE_BYTE: u8 = 2;
pub const INDEXED_DB_KEY_NUMBER_TYPE_BYTE: u8 = 3;
pub const INDEXED_DB_KEY_ARRAY_TYPE_BYTE: u8 = 4;
pub const INDEXED_DB_KEY_MIN_KEY_TYPE_BYTE: u8 = 5;
pub const INDEXED_DB_KEY_BINARY_TYPE_BYTE: u8 = 6;

// IndexedDBKeyPath type tags (after the 0x00 0x00 marker)
pub const INDEXED_DB_KEY_PATH_TYPE_CODED_BYTE_1: u8 = 0;
pub const INDEXED_DB_KEY_PATH_TYPE_CODED_BYTE_2: u8 = 0;
pub const INDEXED_DB_KEY_PATH_NULL_TYPE_BYTE: u8 = 0;
pub const INDEXED_DB_KEY_PATH_STRING_TYPE_BYTE: u8 = 1;
pub const INDEXED_DB_KEY_PATH_ARRAY_TYPE_BYTE: u8 = 2;
