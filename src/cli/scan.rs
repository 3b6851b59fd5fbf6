use std::io::Write;
use std::path::Path;

use colored::Colorize;
use rayon::prelude::*;
use serde::Serialize;

use crate::cli::{create_progress_bar, wprint, wprintln, write_json};
use crate::indexeddb::builder::{decode_entry, CollectingReporter, DecodedEntry};
use crate::indexeddb::coding::CodecConfig;
use crate::indexeddb::model::{BlobDescriptor, IndexedDatabase, IndexedPool, ObjectStore};
use crate::util::hex::format_bytes;
use crate::util::kvdump::read_dump;
use crate::IdbError;

/// Options for the scan subcommand.
pub struct ScanOptions {
    pub file: String,
    pub records: bool,
    pub threads: Option<usize>,
    pub json: bool,
    pub config: CodecConfig,
}

#[derive(Serialize)]
struct SkippedJson {
    key: String,
    key_type: Option<&'static str>,
    error: String,
}

#[derive(Serialize)]
struct ScanJson<'a> {
    file: String,
    pairs: usize,
    applied: usize,
    skipped: Vec<SkippedJson>,
    pool: &'a IndexedPool,
}

/// Rebuild the backing store model from a key/value dump.
///
/// Pairs are decoded in parallel on a rayon pool (`--threads` bounds it);
/// the decoded entries are then folded into one [`IndexedPool`] in dump
/// order on the calling thread. Pairs that fail to decode are listed at the
/// end and do not stop the scan.
pub fn execute(opts: &ScanOptions, writer: &mut dyn Write) -> Result<(), IdbError> {
    let pairs = read_dump(Path::new(&opts.file))?;
    let config = opts.config;

    let pb = if !opts.json && pairs.len() > 1 {
        Some(create_progress_bar(pairs.len() as u64, "entries"))
    } else {
        None
    };
    let decode_all = || -> Vec<Result<DecodedEntry, IdbError>> {
        pairs
            .par_iter()
            .map(|p| {
                if let Some(ref pb) = pb {
                    pb.inc(1);
                }
                decode_entry(&p.key, &p.value, config)
            })
            .collect()
    };
    let decoded = match opts.threads {
        Some(n) => rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build()
            .map_err(|e| IdbError::Argument(format!("Cannot start {} threads: {}", n, e)))?
            .install(decode_all),
        None => decode_all(),
    };
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let mut pool = IndexedPool::new();
    let mut reporter = CollectingReporter::default();
    let mut applied = 0usize;
    for (pair, result) in pairs.iter().zip(decoded) {
        if pool.fold(&pair.key, result, config, &mut reporter) {
            applied += 1;
        }
    }

    if opts.json {
        let skipped = reporter
            .notices
            .iter()
            .map(|n| SkippedJson {
                key: format_bytes(&n.key),
                key_type: n.key_type.map(|t| t.name()),
                error: n.error.to_string(),
            })
            .collect();
        return write_json(
            writer,
            &ScanJson {
                file: opts.file.clone(),
                pairs: pairs.len(),
                applied,
                skipped,
                pool: &pool,
            },
        );
    }

    wprintln!(
        writer,
        "Scanned {} ({} pairs, {} applied, {} skipped)",
        opts.file,
        pairs.len(),
        applied,
        reporter.notices.len()
    )?;
    wprintln!(writer)?;
    print_globals(writer, &pool)?;
    for db in pool.databases.values() {
        wprintln!(writer)?;
        print_database(writer, db, opts.records)?;
    }

    if !reporter.notices.is_empty() {
        wprintln!(writer)?;
        wprintln!(writer, "{}", "Skipped Entries".bold())?;
        for n in &reporter.notices {
            wprintln!(
                writer,
                "  {} [{}] {}",
                format_bytes(&n.key),
                n.key_type.map_or("unknown", |t| t.name()),
                n.error.to_string().red()
            )?;
        }
    }
    Ok(())
}

fn opt<T: std::fmt::Display>(value: &Option<T>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "-".to_string(),
    }
}

fn print_globals(writer: &mut dyn Write, pool: &IndexedPool) -> Result<(), IdbError> {
    wprintln!(writer, "{}", "Global Metadata".bold())?;
    wprintln!(writer, "  Schema Version:     {}", opt(&pool.schema_version))?;
    wprintln!(writer, "  Data Version:       {}", opt(&pool.data_version))?;
    wprintln!(writer, "  Max Database ID:    {}", opt(&pool.max_database_id))?;
    wprintln!(writer, "  Earliest Sweep:     {}", opt(&pool.earliest_sweep))?;
    wprintln!(
        writer,
        "  Blob Journal:       {} primary, {} live",
        pool.primary_blob_journal.len(),
        pool.live_blob_journal.len()
    )?;
    if !pool.free_database_ids.is_empty() {
        wprintln!(writer, "  Free Database IDs:  {:?}", pool.free_database_ids)?;
    }
    Ok(())
}

fn print_database(
    writer: &mut dyn Write,
    db: &IndexedDatabase,
    records: bool,
) -> Result<(), IdbError> {
    wprintln!(
        writer,
        "{} {} {}",
        "Database".bold(),
        db.id,
        db.name.as_deref().unwrap_or("<unnamed>").cyan()
    )?;
    wprintln!(writer, "  Origin:             {}", opt(&db.origin))?;
    wprintln!(writer, "  Version:            {}", opt(&db.idb_version))?;
    if let Some(v) = &db.string_version {
        wprintln!(writer, "  String Version:     {}", v)?;
    }
    wprintln!(writer, "  Max Object Store:   {}", opt(&db.max_object_store_id))?;
    wprintln!(writer, "  Blob Key Generator: {}", opt(&db.blob_key_generator))?;
    if !db.free_object_store_ids.is_empty() {
        wprintln!(writer, "  Free Store IDs:     {:?}", db.free_object_store_ids)?;
    }
    for store in db.object_stores.values() {
        print_store(writer, store, records)?;
    }
    Ok(())
}

fn print_store(writer: &mut dyn Write, store: &ObjectStore, records: bool) -> Result<(), IdbError> {
    wprint!(
        writer,
        "  {} {} {}",
        "Object Store".bold(),
        store.id,
        store.name.as_deref().unwrap_or("<unnamed>").cyan()
    )?;
    wprintln!(
        writer,
        " (key path {}, auto increment {}, {} record(s))",
        opt(&store.key_path),
        opt(&store.auto_increment),
        store.records.len()
    )?;
    for index in store.indices.values() {
        let rows = store.index_entries.get(&index.id).map_or(0, Vec::len);
        wprintln!(
            writer,
            "    Index {} {} (key path {}, unique {}, multi entry {}, {} row(s))",
            index.id,
            index.name.as_deref().unwrap_or("<unnamed>"),
            opt(&index.key_path),
            opt(&index.unique),
            opt(&index.multi_entry),
            rows
        )?;
    }
    for (key, blobs) in &store.blob_metadata {
        for blob in blobs {
            match blob {
                BlobDescriptor::File {
                    key: blob_key,
                    content_type,
                    file_name,
                } => wprintln!(
                    writer,
                    "    Blob {} for {}: file {:?} ({})",
                    blob_key,
                    key,
                    file_name,
                    content_type
                )?,
                BlobDescriptor::Blob {
                    key: blob_key,
                    content_type,
                    size,
                } => wprintln!(
                    writer,
                    "    Blob {} for {}: {} bytes ({})",
                    blob_key,
                    key,
                    size,
                    content_type
                )?,
            }
        }
    }
    if records {
        for (key, record) in &store.records {
            wprintln!(
                writer,
                "    {} {} {}",
                key,
                "=>".dimmed(),
                record.value.value
            )?;
        }
    }
    Ok(())
}
