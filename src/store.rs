
use csv::{ReaderBuilder, StringRecord, Writer};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// One baseline entry: path, digest (lowercase hex), timestamp of the last
/// successful verification (RFC 3339). Persisted as one CSV row in that
/// column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub path: String,
    pub digest: String,
    pub last_verified: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not open baseline store {path}: {source}")]
    Unavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not write baseline store {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("expected 3 columns, got {got}")]
    ColumnCount { got: usize },
    #[error("digest is not 64-char hex: {digest:?}")]
    BadDigest { digest: String },
}

/// Decode one CSV row into a Record. Column order: path, digest, timestamp.
pub fn decode_row(row: &StringRecord) -> Result<Record, DecodeError> {
    if row.len() != 3 {
        return Err(DecodeError::ColumnCount { got: row.len() });
    }
    let digest = &row[1];
    if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(DecodeError::BadDigest {
            digest: digest.to_string(),
        });
    }
    Ok(Record {
        path: row[0].to_string(),
        digest: digest.to_string(),
        last_verified: row[2].to_string(),
    })
}

/// Handle to the persisted baseline table. The location is explicit so tests
/// can point at a temporary store.
#[derive(Debug, Clone)]
pub struct BaselineStore {
    path: PathBuf,
}

impl BaselineStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unavailable(&self, source: std::io::Error) -> StoreError {
        StoreError::Unavailable {
            path: self.path.to_string_lossy().to_string(),
            source,
        }
    }

    fn write_err(&self, source: csv::Error) -> StoreError {
        StoreError::Write {
            path: self.path.to_string_lossy().to_string(),
            source,
        }
    }

    /// Load every well-formed row, in file order. Malformed rows are logged
    /// and skipped; they never abort the load.
    pub fn load(&self) -> Result<Vec<Record>, StoreError> {
        let file = fs::File::open(&self.path).map_err(|e| self.unavailable(e))?;
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);

        let mut records = Vec::new();
        for (idx, row) in reader.records().enumerate() {
            let row = match row {
                Ok(r) => r,
                Err(e) => {
                    warn!("skipping unreadable row {}: {}", idx + 1, e);
                    continue;
                }
            };
            match decode_row(&row) {
                Ok(rec) => records.push(rec),
                Err(e) => warn!("skipping malformed row {}: {}", idx + 1, e),
            }
        }
        Ok(records)
    }

    /// Append one row in add-only mode. No dedup by path: re-registering a
    /// path appends a second row and load order decides (last write wins at
    /// verification time).
    pub fn append(&self, record: &Record) -> Result<(), StoreError> {
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.unavailable(e))?;
        let mut w = Writer::from_writer(file);
        w.write_record([&record.path, &record.digest, &record.last_verified])
            .map_err(|e| self.write_err(e))?;
        w.flush()
            .map_err(|e| self.write_err(csv::Error::from(e)))?;
        Ok(())
    }

    /// Replace the whole table. Written to a sibling temp file first, then
    /// renamed over the store.
    pub fn rewrite(&self, records: &[Record]) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("tmp");
        {
            let file = fs::File::create(&tmp).map_err(|e| self.unavailable(e))?;
            let mut w = Writer::from_writer(file);
            for rec in records {
                w.write_record([&rec.path, &rec.digest, &rec.last_verified])
                    .map_err(|e| self.write_err(e))?;
            }
            w.flush()
                .map_err(|e| self.write_err(csv::Error::from(e)))?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| self.unavailable(e))?;
        Ok(())
    }
}
