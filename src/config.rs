
use serde::Deserialize;
use anyhow::{Context, Result};
use std::fs;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Baseline store location, relative to the working directory.
    #[serde(default = "default_store_path")]
    pub store_path: String,
    /// "sha256" or "blake3". One algorithm per baseline lifetime.
    #[serde(default = "default_hash_alg")]
    pub hash_alg: String,
    /// Write refreshed last-verified timestamps back to the store after a
    /// pass. Off by default: a clean pass then costs no store rewrite.
    #[serde(default)]
    pub persist_timestamps: bool,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let s = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path))?;
        let cfg: Config = toml::from_str(&s)
            .with_context(|| format!("invalid TOML in {}", path))?;
        Ok(cfg)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            hash_alg: default_hash_alg(),
            persist_timestamps: false,
        }
    }
}

fn default_store_path() -> String { "valid_checksums.csv".to_string() }
fn default_hash_alg() -> String { "sha256".to_string() }
