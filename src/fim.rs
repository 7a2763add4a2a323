
use crate::config::Config;
use crate::hash;
use crate::store::{BaselineStore, Record};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::{fs, io::Write};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
struct AuditEvent<'a> {
    ts: i128,
    kind: &'a str,
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    actual: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_valid: Option<String>,
}

/// Outcome of checking one Record. Terminal within a pass; there are no
/// retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Secure,
    NotSecure { last_valid: String },
    Unreadable { reason: String },
}

#[derive(Debug, Clone)]
pub struct CheckReport {
    pub path: String,
    pub status: CheckStatus,
}

/// Pure comparison of a Record against the live digest. `Secure` iff the
/// digests match; on mismatch the stored timestamp rides along untouched so
/// the operator can judge how long the drift may have existed.
pub fn verify(record: &Record, live_digest: &str) -> CheckStatus {
    if record.digest == live_digest {
        CheckStatus::Secure
    } else {
        CheckStatus::NotSecure {
            last_valid: record.last_verified.clone(),
        }
    }
}

/// Fingerprint a new file and append it to the baseline as trusted.
pub fn register(cfg: &Config, store: &BaselineStore, path: &Path) -> Result<Record> {
    let digest = hash::compute_digest(path, &cfg.hash_alg)
        .with_context(|| format!("could not read {}", path.display()))?;
    let record = Record {
        path: normalize_path(path),
        digest,
        last_verified: now_rfc3339(),
    };
    store.append(&record)?;
    info!("registered {} ({})", record.path, record.digest);
    Ok(record)
}

/// Recheck every Record in the baseline against the live filesystem.
///
/// A store that cannot be opened is fatal (nothing to verify against); an
/// unreadable monitored file is reported and the pass continues. Duplicate
/// rows for one path collapse last-write-wins before checking. On a match
/// the in-memory timestamp is refreshed; it reaches the store only when
/// `persist_timestamps` is set.
pub fn check_all(
    cfg: &Config,
    store: &BaselineStore,
    jsonl_out: Option<&Path>,
) -> Result<Vec<CheckReport>> {
    let mut records = dedup_last_wins(store.load()?);
    debug!("checking {} records from {}", records.len(), store.path().display());

    let mut out = match jsonl_out {
        Some(p) => Some(
            fs::OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(p)
                .context("open audit jsonl")?,
        ),
        None => None,
    };

    let mut reports = Vec::with_capacity(records.len());
    let mut refreshed = false;
    for rec in records.iter_mut() {
        let status = match hash::compute_digest(Path::new(&rec.path), &cfg.hash_alg) {
            Ok(live) => {
                let status = verify(rec, &live);
                match &status {
                    CheckStatus::Secure => {
                        rec.last_verified = now_rfc3339();
                        refreshed = true;
                        if let Some(f) = &mut out {
                            write_jsonl(f, AuditEvent {
                                ts: now_ms(), kind: "secure", path: rec.path.clone(),
                                expected: Some(rec.digest.clone()), actual: Some(live),
                                last_valid: None,
                            })?;
                        }
                    }
                    CheckStatus::NotSecure { last_valid } => {
                        warn!("digest mismatch for {}", rec.path);
                        if let Some(f) = &mut out {
                            write_jsonl(f, AuditEvent {
                                ts: now_ms(), kind: "not_secure", path: rec.path.clone(),
                                expected: Some(rec.digest.clone()), actual: Some(live),
                                last_valid: Some(last_valid.clone()),
                            })?;
                        }
                    }
                    CheckStatus::Unreadable { .. } => {}
                }
                status
            }
            Err(e) => {
                debug!("cannot fingerprint {}: {}", rec.path, e);
                if let Some(f) = &mut out {
                    write_jsonl(f, AuditEvent {
                        ts: now_ms(), kind: "unreadable", path: rec.path.clone(),
                        expected: Some(rec.digest.clone()), actual: None,
                        last_valid: None,
                    })?;
                }
                CheckStatus::Unreadable {
                    reason: e.to_string(),
                }
            }
        };
        reports.push(CheckReport {
            path: rec.path.clone(),
            status,
        });
    }

    if cfg.persist_timestamps && refreshed {
        store.rewrite(&records)?;
        debug!("persisted refreshed timestamps to {}", store.path().display());
    }
    Ok(reports)
}

/// Collapse duplicate rows for one path, keeping first-seen order but the
/// value of the last row (re-registration supersedes older trust).
fn dedup_last_wins(rows: Vec<Record>) -> Vec<Record> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<Record> = Vec::with_capacity(rows.len());
    for rec in rows {
        match index.get(&rec.path) {
            Some(&i) => out[i] = rec,
            None => {
                index.insert(rec.path.clone(), out.len());
                out.push(rec);
            }
        }
    }
    out
}

fn write_jsonl(f: &mut fs::File, evt: AuditEvent<'_>) -> Result<()> {
    let line = serde_json::to_string(&evt)? + "\n";
    f.write_all(line.as_bytes())?;
    Ok(())
}

fn normalize_path(p: &Path) -> String {
    match dunce::canonicalize(p) {
        Ok(pp) => pp.to_string_lossy().to_string(),
        Err(_) => p.to_string_lossy().to_string(),
    }
}

fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

fn now_ms() -> i128 {
    OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000
}
