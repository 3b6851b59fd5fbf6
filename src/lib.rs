//! IndexedDB backing store recovery toolkit.
//!
//! The `indexeddb-utils` crate (library name `idb`) decodes the contents of a
//! Chromium IndexedDB LevelDB backing store without the browser: it classifies
//! raw LevelDB keys, orders them exactly like the `idb_cmp1` comparator, decodes
//! the V8/Blink structured clone payloads stored as record values, and folds a
//! stream of key/value pairs into a database → object store → records tree.
//!
//! # CLI Reference
//!
//! Install the `idbx` binary and use its subcommands against a text dump of
//! LevelDB key/value pairs (one `<hex key> <hex value>` pair per line).
//!
//! ```text
//! cargo install indexeddb-utils
//! ```
//!
//! ## Subcommands
//!
//! | Command | Purpose |
//! |---------|---------|
//! | [`idbx scan`](cli::app::Commands::Scan) | Rebuild databases, object stores and records from a dump |
//! | [`idbx key`](cli::app::Commands::Key) | Classify and describe one encoded key |
//! | [`idbx value`](cli::app::Commands::Value) | Decode one structured clone value |
//! | [`idbx compare`](cli::app::Commands::Compare) | Compare two keys with `idb_cmp1` |
//! | [`idbx check-order`](cli::app::Commands::CheckOrder) | Verify a dump is sorted under `idb_cmp1` |
//!
//! ## Global options
//!
//! All subcommands accept `--color <auto|always|never>`, `--output <file>`,
//! `--verbose`, and `--int-order`/`--host-order` to override the byte order
//! of fixed-width integers and host-native fields.
//!
//! # Library API
//!
//! ```toml
//! [dependencies]
//! idb = { package = "indexeddb-utils", version = "1" }
//! ```
//!
//! ## Quick example
//!
//! ```
//! use idb::indexeddb::builder::TracingReporter;
//! use idb::indexeddb::coding::encode_varint;
//! use idb::indexeddb::keys::{GlobalMetadataKey, ParsedKey};
//! use idb::indexeddb::model::IndexedPool;
//!
//! let key = ParsedKey::GlobalMetadata(GlobalMetadataKey::DataVersion).encode().unwrap();
//! let mut value = Vec::new();
//! encode_varint(7, &mut value);
//!
//! let mut pool = IndexedPool::default();
//! pool.process(&key, &value, &mut TracingReporter);
//! assert_eq!(pool.data_version, Some(7));
//! ```
//!
//! ## Key entry points
//!
//! | Type / Function | Purpose |
//! |-----------------|---------|
//! | [`Reader`](indexeddb::coding::Reader) | Atomic cursor over the primitive codec |
//! | [`KeyPrefix`](indexeddb::key_prefix::KeyPrefix) | `(database, object store, index)` triple on every key |
//! | [`ParsedKey`](indexeddb::keys::ParsedKey) | Fully decoded key of any type |
//! | [`compare_keys`](indexeddb::comparator::compare_keys) | The `idb_cmp1` ordering |
//! | [`Deserializer`](clone::deserializer::Deserializer) | V8 structured clone decoder |
//! | [`Serializer`](clone::serializer::Serializer) | V8 structured clone encoder |
//! | [`decode_ssv`](clone::blink::decode_ssv) | Blink envelope + V8 payload of a record value |
//! | [`IndexedPool`](indexeddb::model::IndexedPool) | Reconstructed backing store contents |
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`indexeddb::coding`] | Varints, zig-zag, doubles, UTF-16BE strings, binaries |
//! | [`indexeddb::idb_key`] | `IndexedDbKey` and `IndexedDbKeyPath` |
//! | [`indexeddb::key_prefix`] | Key prefix codec and key type classification |
//! | [`indexeddb::keys`] | Per-type key suffix layouts |
//! | [`indexeddb::comparator`] | `idb_cmp1` comparator |
//! | [`indexeddb::model`] | Database / object store / index model |
//! | [`indexeddb::builder`] | Key/value fold into the model |
//! | [`clone`] | V8 + Blink structured clone codec |
//!
//! ## Feature flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli` | on | Builds the `idbx` binary (`clap`, `colored`, `indicatif`, `rayon`, `chrono`, `tracing-subscriber`). |

#[cfg(feature = "cli")]
pub mod cli;
pub mod clone;
pub mod indexeddb;
pub mod util;

use thiserror::Error;

/// Errors returned by `idb` operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IdbError {
    /// An I/O error occurred (file open, read, or write failure).
    #[error("I/O error: {0}")]
    Io(String),

    /// A parse error occurred (well-framed but invalid payload).
    #[error("Parse error: {0}")]
    Parse(String),

    /// An invalid argument was supplied.
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// The cursor ran past the end of the buffer.
    #[error("Truncated input at offset {offset}: needed {needed} byte(s), {available} available")]
    TruncatedInput {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A tag byte that is unknown or not allowed in the current state.
    #[error("Malformed tag 0x{tag:02x} at offset {offset} ({context})")]
    MalformedTag {
        tag: u8,
        offset: usize,
        context: &'static str,
    },

    /// A declared count or length disagrees with what was actually read.
    #[error("Length mismatch in {context}: declared {declared}, actual {actual}")]
    LengthMismatch {
        context: &'static str,
        declared: u64,
        actual: u64,
    },

    /// An object, transfer or shared-buffer id that cannot be resolved.
    #[error("Unresolved {kind} reference {id}")]
    UnresolvedReference { kind: &'static str, id: u64 },

    /// A format version newer than this crate understands.
    #[error("Unsupported {what} version {version} (latest supported: {supported})")]
    UnsupportedVersion {
        what: &'static str,
        version: u64,
        supported: u64,
    },

    /// The key prefix could not be decoded or violates reserved id rules.
    #[error("Invalid key prefix: {0}")]
    InvalidKeyPrefix(String),

    /// Two keys could not be ordered; the comparator contract is broken.
    #[error("Keys cannot be ordered: {0}")]
    Unorderable(String),
}
