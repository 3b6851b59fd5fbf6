use std::cmp::Ordering;
use std::io::Write;
use std::path::Path;

use colored::Colorize;
use serde::Serialize;

use crate::cli::{write_json, wprintln};
use crate::indexeddb::coding::CodecConfig;
use crate::indexeddb::comparator::Comparator;
use crate::util::hex::format_bytes;
use crate::util::kvdump::read_dump;
use crate::IdbError;

/// Options for the check-order subcommand.
pub struct CheckOrderOptions {
    pub file: String,
    pub limit: Option<usize>,
    pub json: bool,
    pub config: CodecConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum ViolationKind {
    /// Later key sorts before the one above it.
    Inversion,
    Duplicate,
    /// The comparator could not decode one of the keys.
    Unorderable,
}

#[derive(Serialize)]
struct Violation {
    kind: ViolationKind,
    previous_line: usize,
    line: usize,
    previous_key: String,
    key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct CheckOrderJson {
    file: String,
    comparator: &'static str,
    pairs: usize,
    sorted: bool,
    violations: Vec<Violation>,
}

/// Walk a dump and report every adjacent pair that `idb_cmp1` does not
/// place in strictly ascending order.
pub fn execute(opts: &CheckOrderOptions, writer: &mut dyn Write) -> Result<(), IdbError> {
    let pairs = read_dump(Path::new(&opts.file))?;
    let cmp = Comparator::new(opts.config);

    let mut violations = Vec::new();
    for window in pairs.windows(2) {
        if opts.limit.is_some_and(|l| violations.len() >= l) {
            break;
        }
        let (prev, cur) = (&window[0], &window[1]);
        let (kind, error) = match cmp.try_compare(&prev.key, &cur.key) {
            Ok(Ordering::Less) => continue,
            Ok(Ordering::Equal) => (ViolationKind::Duplicate, None),
            Ok(Ordering::Greater) => (ViolationKind::Inversion, None),
            Err(e) => (ViolationKind::Unorderable, Some(e.to_string())),
        };
        violations.push(Violation {
            kind,
            previous_line: prev.line,
            line: cur.line,
            previous_key: format_bytes(&prev.key),
            key: format_bytes(&cur.key),
            error,
        });
    }
    let sorted = violations.is_empty();

    if opts.json {
        write_json(
            writer,
            &CheckOrderJson {
                file: opts.file.clone(),
                comparator: cmp.name(),
                pairs: pairs.len(),
                sorted,
                violations,
            },
        )?;
    } else {
        wprintln!(
            writer,
            "Checking {} ({} pairs) against {}...",
            opts.file,
            pairs.len(),
            cmp.name()
        )?;
        for v in &violations {
            let label = match v.kind {
                ViolationKind::Inversion => "INVERSION".red(),
                ViolationKind::Duplicate => "DUPLICATE".yellow(),
                ViolationKind::Unorderable => "UNORDERABLE".red(),
            };
            wprintln!(
                writer,
                "  {} lines {}-{}: {} then {}",
                label,
                v.previous_line,
                v.line,
                v.previous_key,
                v.key
            )?;
            if let Some(e) = &v.error {
                wprintln!(writer, "    {}", e)?;
            }
        }
        if sorted {
            wprintln!(writer, "Order: {}", "OK".green())?;
        } else {
            wprintln!(writer, "Order: {} ({} violation(s))", "FAILED".red(), violations.len())?;
        }
    }

    if !sorted {
        return Err(IdbError::Argument("Ordering check failed".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexeddb::idb_key::IndexedDbKey;
    use crate::indexeddb::key_prefix::KeyPrefix;
    use crate::indexeddb::keys::ParsedKey;
    use std::fs;
    use tempfile::TempDir;

    fn record_key(n: f64) -> String {
        let key = ParsedKey::ObjectStoreData {
            prefix: KeyPrefix::object_store_data(1, 1),
            primary_key: Some(IndexedDbKey::Number(n)),
        }
        .encode()
        .unwrap();
        format_bytes(&key)
    }

    fn run(lines: &[String]) -> (Result<(), IdbError>, String) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dump.txt");
        fs::write(&path, lines.join("\n")).unwrap();
        let opts = CheckOrderOptions {
            file: path.to_string_lossy().to_string(),
            limit: None,
            json: true,
            config: CodecConfig::default(),
        };
        let mut out = Vec::new();
        let result = execute(&opts, &mut out);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_sorted_dump() {
        let (result, text) = run(&[record_key(1.0), record_key(2.0), record_key(10.0)]);
        result.unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["sorted"], true);
        assert_eq!(json["pairs"], 3);
    }

    #[test]
    fn test_inversion_reported() {
        let (result, text) = run(&[record_key(10.0), record_key(2.0), record_key(2.0)]);
        assert!(matches!(result, Err(IdbError::Argument(_))));
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["violations"][0]["kind"], "inversion");
        assert_eq!(json["violations"][0]["line"], 2);
        assert_eq!(json["violations"][1]["kind"], "duplicate");
    }
}
