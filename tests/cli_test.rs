#![cfg(feature = "cli")]
//! Integration tests for the `idbx` subcommands, driven through their
//! `execute` entry points.

use std::fs;

use clap::Parser;
use idb::cli::app::{ByteOrder, Cli, Commands};
use idb::cli::check_order::{self, CheckOrderOptions};
use idb::cli::compare::{self, CompareOptions};
use idb::cli::key::{self, KeyOptions};
use idb::cli::scan::{self, ScanOptions};
use idb::cli::value::{self, ValueOptions};
use idb::clone::blink::encode_ssv;
use idb::clone::value::Value;
use idb::indexeddb::coding::{encode_string, encode_varint, CodecConfig, Endianness};
use idb::indexeddb::idb_key::IndexedDbKey;
use idb::indexeddb::key_prefix::KeyPrefix;
use idb::indexeddb::keys::{DatabaseMetadataKey, GlobalMetadataKey, ParsedKey};
use idb::util::hex::format_bytes;
use tempfile::TempDir;

fn record_key(id: f64) -> Vec<u8> {
    ParsedKey::ObjectStoreData {
        prefix: KeyPrefix::object_store_data(1, 1),
        primary_key: Some(IndexedDbKey::Number(id)),
    }
    .encode()
    .unwrap()
}

fn run<F>(f: F) -> (Result<(), idb::IdbError>, String)
where
    F: FnOnce(&mut Vec<u8>) -> Result<(), idb::IdbError>,
{
    let mut out = Vec::new();
    let result = f(&mut out);
    (result, String::from_utf8(out).unwrap())
}

fn write_sorted_dump(dir: &TempDir) -> String {
    let mut name = Vec::new();
    encode_string("notes", &mut name);
    let mut record = Vec::new();
    encode_varint(1, &mut record);
    record.extend(encode_ssv(&Value::string("first note")).unwrap());

    let lines = [
        "# produced by a leveldb dump".to_string(),
        format!(
            "{} 07",
            format_bytes(
                &ParsedKey::GlobalMetadata(GlobalMetadataKey::DataVersion)
                    .encode()
                    .unwrap()
            )
        ),
        format!(
            "{} {}",
            format_bytes(
                &ParsedKey::DatabaseMetadata {
                    database_id: 1,
                    key: DatabaseMetadataKey::DatabaseName,
                }
                .encode()
                .unwrap()
            ),
            format_bytes(&name)
        ),
        String::new(),
        format!("{} {}", format_bytes(&record_key(1.0)), format_bytes(&record)),
        format!("{} {}", format_bytes(&record_key(2.0)), format_bytes(&record)),
    ];
    let path = dir.path().join("notes.txt");
    fs::write(&path, lines.join("\n")).unwrap();
    path.to_string_lossy().to_string()
}

#[test]
fn test_parse_global_flags() {
    let cli = Cli::try_parse_from([
        "idbx",
        "--int-order",
        "big",
        "key",
        "0000000002",
        "--json",
    ])
    .unwrap();
    assert_eq!(cli.int_order, ByteOrder::Big);
    assert_eq!(cli.host_order, ByteOrder::Little);
    assert!(matches!(cli.command, Commands::Key { json: true, .. }));

    let config = idb::cli::codec_config(cli.int_order, cli.host_order);
    assert_eq!(config.int_order, Endianness::Big);
}

#[test]
fn test_parse_rejects_missing_file() {
    assert!(Cli::try_parse_from(["idbx", "scan"]).is_err());
    assert!(Cli::try_parse_from(["idbx", "check-order", "-f", "dump.txt", "-l", "3"]).is_ok());
}

#[test]
fn test_scan_sorted_dump() {
    let dir = TempDir::new().unwrap();
    let file = write_sorted_dump(&dir);
    let (result, text) = run(|out| {
        scan::execute(
            &ScanOptions {
                file,
                records: true,
                threads: None,
                json: false,
                config: CodecConfig::default(),
            },
            out,
        )
    });
    result.unwrap();
    assert!(text.contains("4 pairs, 4 applied, 0 skipped"));
    assert!(text.contains("notes"));
    assert!(text.contains("first note"));
    assert!(!text.contains("Skipped Entries"));
}

#[test]
fn test_check_order_accepts_sorted_dump() {
    let dir = TempDir::new().unwrap();
    let file = write_sorted_dump(&dir);
    let (result, text) = run(|out| {
        check_order::execute(
            &CheckOrderOptions {
                file,
                limit: None,
                json: true,
                config: CodecConfig::default(),
            },
            out,
        )
    });
    result.unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["sorted"], true);
    assert_eq!(json["comparator"], "idb_cmp1");
    assert_eq!(json["pairs"], 4);
}

#[test]
fn test_check_order_flags_inversion() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("unsorted.txt");
    fs::write(
        &path,
        format!(
            "{} 00\n{} 00\n",
            format_bytes(&record_key(2.0)),
            format_bytes(&record_key(1.0))
        ),
    )
    .unwrap();
    let (result, text) = run(|out| {
        check_order::execute(
            &CheckOrderOptions {
                file: path.to_string_lossy().to_string(),
                limit: None,
                json: false,
                config: CodecConfig::default(),
            },
            out,
        )
    });
    assert!(result.is_err());
    assert!(text.contains("INVERSION"));
    assert!(text.contains("lines 1-2"));
}

#[test]
fn test_key_describes_record_key() {
    let (result, text) = run(|out| {
        key::execute(
            &KeyOptions {
                hex: format_bytes(&record_key(42.0)),
                json: false,
                config: CodecConfig::default(),
            },
            out,
        )
    });
    result.unwrap();
    assert!(text.contains("KEY PREFIX"));
    assert!(text.contains("Object Store ID: 1"));
    assert!(text.contains("42"));
}

#[test]
fn test_value_decodes_record() {
    let mut record = Vec::new();
    encode_varint(3, &mut record);
    record.extend(encode_ssv(&Value::string("hi")).unwrap());
    let (result, text) = run(|out| {
        value::execute(
            &ValueOptions {
                hex: format_bytes(&record),
                record: true,
                dump: false,
                json: true,
                config: CodecConfig::default(),
            },
            out,
        )
    });
    result.unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["record_version"], 3);
    assert_eq!(json["wire_version"], 21);
}

#[test]
fn test_compare_orders_keys() {
    let (result, text) = run(|out| {
        compare::execute(
            &CompareOptions {
                a: format_bytes(&record_key(1.0)),
                b: format_bytes(&record_key(2.0)),
                json: true,
                config: CodecConfig::default(),
            },
            out,
        )
    });
    result.unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["ordering"], "less");
}
