
use std::fs;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

const CHUNK_SIZE: usize = 64 * 1024;

/// Why a file could not be fingerprinted. All variants mean "not readable"
/// to the verification pass; the discrimination is for logs and callers
/// that care about the cause.
#[derive(Debug, Error)]
pub enum HashError {
    #[error("file not found: {path}")]
    NotFound { path: String },
    #[error("permission denied: {path}")]
    PermissionDenied { path: String },
    #[error("read failed: {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    fn from_io(path: &Path, source: std::io::Error) -> Self {
        let path = path.to_string_lossy().to_string();
        match source.kind() {
            std::io::ErrorKind::NotFound => HashError::NotFound { path },
            std::io::ErrorKind::PermissionDenied => HashError::PermissionDenied { path },
            _ => HashError::Io { path, source },
        }
    }
}

/// Stream the file through an incremental hasher and return the digest as
/// lowercase hex. Pure function of the file's bytes; the chunk size never
/// affects the result.
pub fn compute_digest(path: &Path, alg: &str) -> Result<String, HashError> {
    let mut f = fs::File::open(path).map_err(|e| HashError::from_io(path, e))?;

    if alg.eq_ignore_ascii_case("blake3") {
        let mut hasher = blake3::Hasher::new();
        let mut buf = [0u8; CHUNK_SIZE];
        loop {
            let n = f.read(&mut buf).map_err(|e| HashError::from_io(path, e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hasher.finalize().to_hex().to_string())
    } else {
        // default sha256
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        let mut buf = [0u8; CHUNK_SIZE];
        loop {
            let n = f.read(&mut buf).map_err(|e| HashError::from_io(path, e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(format!("{:x}", hasher.finalize()))
    }
}
