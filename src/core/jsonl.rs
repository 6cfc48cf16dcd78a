//! Line-oriented record store.
//!
//! Every durable collection in Molt is a file of independent JSON lines. The
//! collection is the unit of durability: loads tolerate corrupt lines by
//! skipping them (counted, never fatal), saves rewrite the whole file. There
//! is no locking; callers must serialize writers against a given store.

use crate::core::error::MoltError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// Outcome of a collection load: how many lines decoded, how many were
/// skipped as corrupt. Tests assert on `skipped` instead of the failures
/// being silently swallowed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseReport {
    pub loaded: usize,
    pub skipped: usize,
}

/// Load all records from `path`. A missing file is an empty collection.
pub fn load_records<T: DeserializeOwned>(path: &Path) -> Result<(Vec<T>, ParseReport), MoltError> {
    let mut records = Vec::new();
    let mut report = ParseReport::default();

    if !path.exists() {
        return Ok((records, report));
    }

    let file = File::open(path).map_err(MoltError::IoError)?;
    let reader = BufReader::new(file);
    for line in reader.lines() {
        let line = line.map_err(MoltError::IoError)?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(&line) {
            Ok(record) => {
                records.push(record);
                report.loaded += 1;
            }
            Err(_) => report.skipped += 1,
        }
    }

    Ok((records, report))
}

/// Append a single record line, creating the file and parent directory on
/// first use.
pub fn append_record<T: Serialize>(path: &Path, record: &T) -> Result<(), MoltError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(MoltError::IoError)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(MoltError::IoError)?;
    let line = serde_json::to_string(record).map_err(MoltError::JsonError)?;
    writeln!(file, "{}", line).map_err(MoltError::IoError)?;
    Ok(())
}

/// Rewrite the whole collection. Callers back up the file first when the
/// rewrite must be revertible.
pub fn rewrite_records<T: Serialize>(path: &Path, records: &[T]) -> Result<(), MoltError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(MoltError::IoError)?;
    }
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record).map_err(MoltError::JsonError)?);
        out.push('\n');
    }
    fs::write(path, out).map_err(MoltError::IoError)?;
    Ok(())
}
