//! IndexedDB backing store layout.
//!
//! Chrome keeps every IndexedDB database of an origin in one LevelDB,
//! ordered by the `idb_cmp1` comparator. Keys start with a
//! [`KeyPrefix`](key_prefix::KeyPrefix) naming the database, object store
//! and index they belong to; the rest of the key and the value are laid out
//! per key type.
//!
//! Modules build on each other bottom-up: [`coding`] primitives,
//! [`idb_key`] user keys, [`key_prefix`] and [`keys`] for full keys,
//! [`comparator`] for their order, and [`model`] plus [`builder`] for the
//! reconstructed databases.

pub mod builder;
pub mod coding;
pub mod comparator;
pub mod constants;
pub mod idb_key;
pub mod key_prefix;
pub mod keys;
pub mod model;
