//! The `idb_cmp1` key comparator.
//!
//! LevelDB stores IndexedDB keys sorted by this function, so a reader that
//! iterates or seeks the store must install the identical ordering. Keys are
//! decoded field by field rather than compared as bytes: prefix ids are
//! fixed-width little-endian integers and strings are variable-length, so
//! byte order would not be monotonic.
//!
//! Index data keys order by index key, then primary key, then sequence
//! number. The sequence number is encoded before the primary key but
//! compared after it.

use std::cmp::Ordering;

use crate::indexeddb::coding::{CodecConfig, Reader};
use crate::indexeddb::constants::*;
use crate::indexeddb::idb_key::IndexedDbKey;
use crate::indexeddb::key_prefix::{KeyPrefix, KeyType};
use crate::IdbError;

pub use crate::indexeddb::constants::COMPARATOR_NAME;

/// Comparator over encoded backing store keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct Comparator {
    config: CodecConfig,
    only_compare_index_keys: bool,
}

impl Comparator {
    pub fn new(config: CodecConfig) -> Self {
        Comparator {
            config,
            only_compare_index_keys: false,
        }
    }

    /// Ignore sequence numbers and primary keys of index data keys.
    pub fn only_index_keys(mut self) -> Self {
        self.only_compare_index_keys = true;
        self
    }

    /// Name the comparator is registered under.
    pub fn name(&self) -> &'static str {
        COMPARATOR_NAME
    }

    /// Compare two keys, reporting keys that cannot be ordered.
    pub fn try_compare(&self, a: &[u8], b: &[u8]) -> Result<Ordering, IdbError> {
        let mut ra = Reader::with_config(a, self.config);
        let mut rb = Reader::with_config(b, self.config);
        self.compare_readers(&mut ra, &mut rb).map_err(|e| match e {
            IdbError::Unorderable(_) => e,
            other => IdbError::Unorderable(other.to_string()),
        })
    }

    /// Compare two keys, falling back to byte order for undecodable keys.
    pub fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        match self.try_compare(a, b) {
            Ok(ord) => ord,
            Err(e) => {
                tracing::warn!(error = %e, "{} fell back to byte order", COMPARATOR_NAME);
                a.cmp(b)
            }
        }
    }

    fn compare_readers(
        &self,
        ra: &mut Reader<'_>,
        rb: &mut Reader<'_>,
    ) -> Result<Ordering, IdbError> {
        let prefix_a = KeyPrefix::decode(ra)?;
        let prefix_b = KeyPrefix::decode(rb)?;
        let ord = prefix_a.cmp(&prefix_b);
        if ord != Ordering::Equal {
            return Ok(ord);
        }

        match prefix_a.key_type() {
            KeyType::GlobalMetadata => compare_global_metadata(ra, rb),
            KeyType::DatabaseMetadata => compare_database_metadata(ra, rb),
            KeyType::ObjectStoreData | KeyType::ExistsEntry | KeyType::BlobEntry => {
                if ra.is_empty() || rb.is_empty() {
                    return Ok(ra.remaining().cmp(&rb.remaining()));
                }
                compare_encoded_keys(ra, rb)
            }
            KeyType::IndexData => {
                if ra.is_empty() || rb.is_empty() {
                    return Ok(ra.remaining().cmp(&rb.remaining()));
                }
                self.compare_index_data(ra, rb)
            }
            KeyType::Invalid => Err(IdbError::Unorderable(format!(
                "reserved index id in prefix {}",
                prefix_a
            ))),
        }
    }

    fn compare_index_data(
        &self,
        ra: &mut Reader<'_>,
        rb: &mut Reader<'_>,
    ) -> Result<Ordering, IdbError> {
        let ord = compare_encoded_keys(ra, rb)?;
        if ord != Ordering::Equal || self.only_compare_index_keys {
            return Ok(ord);
        }

        let seq_a = if ra.is_empty() { None } else { Some(ra.read_varint()?) };
        let seq_b = if rb.is_empty() { None } else { Some(rb.read_varint()?) };

        if ra.is_empty() || rb.is_empty() {
            return Ok(ra.remaining().cmp(&rb.remaining()));
        }

        let ord = compare_encoded_keys(ra, rb)?;
        if ord != Ordering::Equal {
            return Ok(ord);
        }
        Ok(seq_a.cmp(&seq_b))
    }
}

fn compare_encoded_keys(ra: &mut Reader<'_>, rb: &mut Reader<'_>) -> Result<Ordering, IdbError> {
    let a = IndexedDbKey::decode(ra)?;
    let b = IndexedDbKey::decode(rb)?;
    Ok(a.cmp(&b))
}

fn compare_varints(ra: &mut Reader<'_>, rb: &mut Reader<'_>) -> Result<Ordering, IdbError> {
    Ok(ra.read_varint()?.cmp(&rb.read_varint()?))
}

fn compare_strings(ra: &mut Reader<'_>, rb: &mut Reader<'_>) -> Result<Ordering, IdbError> {
    Ok(ra
        .read_utf16_with_length()?
        .cmp(&rb.read_utf16_with_length()?))
}

fn compare_bytes(ra: &mut Reader<'_>, rb: &mut Reader<'_>) -> Result<Ordering, IdbError> {
    Ok(ra.read_u8()?.cmp(&rb.read_u8()?))
}

fn compare_global_metadata(
    ra: &mut Reader<'_>,
    rb: &mut Reader<'_>,
) -> Result<Ordering, IdbError> {
    let type_a = ra.read_u8()?;
    let type_b = rb.read_u8()?;
    let ord = type_a.cmp(&type_b);
    if ord != Ordering::Equal || type_a < MAX_SIMPLE_GLOBAL_META_DATA_TYPE_BYTE {
        return Ok(ord);
    }
    match type_a {
        DATABASE_FREE_LIST_TYPE_BYTE => compare_varints(ra, rb),
        DATABASE_NAME_TYPE_BYTE => then(compare_strings(ra, rb)?, || compare_strings(ra, rb)),
        other => Err(IdbError::Unorderable(format!(
            "unknown global metadata type {}",
            other
        ))),
    }
}

fn compare_database_metadata(
    ra: &mut Reader<'_>,
    rb: &mut Reader<'_>,
) -> Result<Ordering, IdbError> {
    let type_a = ra.read_u8()?;
    let type_b = rb.read_u8()?;
    let ord = type_a.cmp(&type_b);
    if ord != Ordering::Equal || type_a < MAX_SIMPLE_DATABASE_META_DATA_TYPE_BYTE {
        return Ok(ord);
    }

    match type_a {
        OBJECT_STORE_META_DATA_TYPE_BYTE => then(compare_bytes(ra, rb)?, || compare_bytes(ra, rb)),
        INDEX_META_DATA_TYPE_BYTE => then(compare_varints(ra, rb)?, || {
            then(compare_varints(ra, rb)?, || compare_bytes(ra, rb))
        }),
        OBJECT_STORE_FREE_LIST_TYPE_BYTE => compare_varints(ra, rb),
        INDEX_FREE_LIST_TYPE_BYTE => then(compare_varints(ra, rb)?, || compare_varints(ra, rb)),
        OBJECT_STORE_NAMES_TYPE_BYTE => compare_strings(ra, rb),
        INDEX_NAMES_KEY_TYPE_BYTE => then(compare_varints(ra, rb)?, || compare_strings(ra, rb)),
        other => Err(IdbError::Unorderable(format!(
            "unknown database metadata type {}",
            other
        ))),
    }
}

/// Continue with the next field only while everything so far is equal.
fn then(
    ord: Ordering,
    next: impl FnOnce() -> Result<Ordering, IdbError>,
) -> Result<Ordering, IdbError> {
    if ord != Ordering::Equal {
        return Ok(ord);
    }
    next()
}

/// Compare two keys with the default configuration.
///
/// Undecodable keys fall back to byte order; use [`try_compare_keys`] to
/// detect them.
pub fn compare_keys(a: &[u8], b: &[u8]) -> Ordering {
    Comparator::default().compare(a, b)
}

/// Compare two keys with the default configuration.
pub fn try_compare_keys(
    a: &[u8],
    b: &[u8],
    only_compare_index_keys: bool,
) -> Result<Ordering, IdbError> {
    let mut cmp = Comparator::default();
    cmp.only_compare_index_keys = only_compare_index_keys;
    cmp.try_compare(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexeddb::keys::{DatabaseMetadataKey, GlobalMetadataKey, IndexDataKey, ParsedKey};

    fn db_meta(database_id: u64, key: DatabaseMetadataKey) -> Vec<u8> {
        ParsedKey::DatabaseMetadata { database_id, key }.encode().unwrap()
    }

    fn index_key(index: f64, seq: Option<u64>, primary: Option<&str>) -> Vec<u8> {
        ParsedKey::IndexData(IndexDataKey {
            prefix: KeyPrefix::index_data(1, 1, 30),
            index_key: IndexedDbKey::Number(index),
            sequence_number: seq,
            primary_key: primary.map(|p| IndexedDbKey::String(p.into())),
        })
        .encode()
        .unwrap()
    }

    #[test]
    fn test_name() {
        assert_eq!(Comparator::default().name(), "idb_cmp1");
    }

    #[test]
    fn test_transitive_chain() {
        let a = db_meta(1, DatabaseMetadataKey::OriginName);
        let b = db_meta(1, DatabaseMetadataKey::DatabaseName);
        let c = db_meta(2, DatabaseMetadataKey::OriginName);
        assert_eq!(compare_keys(&a, &b), Ordering::Less);
        assert_eq!(compare_keys(&b, &c), Ordering::Less);
        assert_eq!(compare_keys(&a, &c), Ordering::Less);
        assert_eq!(compare_keys(&c, &a), Ordering::Greater);
        assert_eq!(compare_keys(&b, &b), Ordering::Equal);
    }

    #[test]
    fn test_prefix_compares_numerically_not_bytewise() {
        // 513 encodes as [0x01, 0x02] and 258 as [0x02, 0x01].
        let mut a = KeyPrefix::database_metadata(513).encode().unwrap();
        let mut b = KeyPrefix::database_metadata(258).encode().unwrap();
        a.push(0);
        b.push(0);
        assert!(a < b);
        assert_eq!(compare_keys(&a, &b), Ordering::Greater);
    }

    #[test]
    fn test_database_name_compares_origin_then_name() {
        let key = |origin: &str, name: &str| {
            ParsedKey::GlobalMetadata(GlobalMetadataKey::DatabaseName {
                origin: origin.into(),
                database_name: name.into(),
            })
            .encode()
            .unwrap()
        };
        // Longer origin would win bytewise because of the length prefix.
        assert_eq!(compare_keys(&key("b", "a"), &key("ab", "z")), Ordering::Greater);
        assert_eq!(compare_keys(&key("a", "x"), &key("a", "y")), Ordering::Less);
    }

    #[test]
    fn test_object_store_meta_orders_store_then_subtype() {
        use crate::indexeddb::keys::ObjectStoreMetaType;
        let k = |os, t| {
            db_meta(
                1,
                DatabaseMetadataKey::ObjectStoreMeta {
                    object_store_id: os,
                    meta_type: t,
                },
            )
        };
        assert_eq!(
            compare_keys(&k(1, ObjectStoreMetaType::KeyPath), &k(2, ObjectStoreMetaType::Name)),
            Ordering::Less
        );
        assert_eq!(
            compare_keys(&k(2, ObjectStoreMetaType::Name), &k(2, ObjectStoreMetaType::KeyPath)),
            Ordering::Less
        );
        assert_eq!(
            try_compare_keys(
                &k(200, ObjectStoreMetaType::Name),
                &k(127, ObjectStoreMetaType::KeyPath),
                false
            )
            .unwrap(),
            Ordering::Greater
        );
    }

    #[test]
    fn test_empty_data_suffix_sorts_first() {
        let floor = KeyPrefix::object_store_data(1, 1).encode().unwrap();
        let key = ParsedKey::ObjectStoreData {
            prefix: KeyPrefix::object_store_data(1, 1),
            primary_key: Some(IndexedDbKey::Min),
        }
        .encode()
        .unwrap();
        assert_eq!(compare_keys(&floor, &key), Ordering::Less);
        assert_eq!(compare_keys(&floor, &floor), Ordering::Equal);
    }

    #[test]
    fn test_data_keys_use_key_ordering() {
        let k = |key: IndexedDbKey| {
            ParsedKey::ObjectStoreData {
                prefix: KeyPrefix::object_store_data(1, 1),
                primary_key: Some(key),
            }
            .encode()
            .unwrap()
        };
        assert_eq!(
            compare_keys(&k(IndexedDbKey::Number(10.0)), &k(IndexedDbKey::Number(9.0))),
            Ordering::Greater
        );
        assert_eq!(
            compare_keys(&k(IndexedDbKey::Number(1e9)), &k(IndexedDbKey::String("0".into()))),
            Ordering::Less
        );
    }

    #[test]
    fn test_null_keys_sort_lowest() {
        let k = |key: IndexedDbKey| {
            ParsedKey::ObjectStoreData {
                prefix: KeyPrefix::object_store_data(1, 1),
                primary_key: Some(key),
            }
            .encode()
            .unwrap()
        };
        let null = k(IndexedDbKey::Null);
        assert_eq!(compare_keys(&null, &k(IndexedDbKey::Number(0.0))), Ordering::Less);
        assert_eq!(compare_keys(&k(IndexedDbKey::Min), &null), Ordering::Less);

        let pair = |second: IndexedDbKey| {
            k(IndexedDbKey::Array(vec![IndexedDbKey::String("a".into()), second]))
        };
        assert_eq!(
            compare_keys(&pair(IndexedDbKey::Null), &pair(IndexedDbKey::Number(-1.0))),
            Ordering::Less
        );
        assert_eq!(
            compare_keys(&pair(IndexedDbKey::Date(0.0)), &pair(IndexedDbKey::Null)),
            Ordering::Greater
        );
    }

    #[test]
    fn test_index_data_primary_before_sequence() {
        let a = index_key(1.0, Some(9), Some("a"));
        let b = index_key(1.0, Some(1), Some("b"));
        assert_eq!(compare_keys(&a, &b), Ordering::Less);

        let c = index_key(1.0, Some(1), Some("a"));
        assert_eq!(compare_keys(&c, &a), Ordering::Less);
    }

    #[test]
    fn test_index_data_partial_keys() {
        let bare = index_key(1.0, None, None);
        let seq_only = index_key(1.0, Some(4), None);
        let full = index_key(1.0, Some(4), Some("a"));
        assert_eq!(compare_keys(&bare, &seq_only), Ordering::Less);
        assert_eq!(compare_keys(&seq_only, &full), Ordering::Less);
        assert_eq!(compare_keys(&index_key(0.0, None, None), &full), Ordering::Less);
    }

    #[test]
    fn test_only_compare_index_keys() {
        let a = index_key(1.0, Some(1), Some("a"));
        let b = index_key(1.0, Some(2), Some("b"));
        assert_eq!(try_compare_keys(&a, &b, true).unwrap(), Ordering::Equal);
        assert_eq!(try_compare_keys(&a, &b, false).unwrap(), Ordering::Less);
    }

    #[test]
    fn test_unorderable_keys_signal_distinct_error() {
        let mut a = KeyPrefix::database_metadata(1).encode().unwrap();
        a.push(99);
        let err = try_compare_keys(&a, &a, false).unwrap_err();
        assert!(matches!(err, IdbError::Unorderable(_)));

        let truncated = [0xe0, 0x01];
        let err = try_compare_keys(&truncated, &a, false).unwrap_err();
        assert!(matches!(err, IdbError::Unorderable(_)));
        // The infallible form still yields an answer.
        assert_eq!(compare_keys(&truncated, &a), truncated.as_slice().cmp(a.as_slice()));
    }
}
