//! Content-addressed loading of trained-model artifacts.

use std::path::Path;

use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};

use crate::error::ModelError;

/// A deserialized artifact together with the SHA-256 of its bytes.
#[derive(Debug, Clone)]
pub struct Artifact<T> {
    pub value: T,
    pub digest: String,
}

/// Hex SHA-256 of `bytes`.
pub fn digest_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Read a JSON artifact, verifying it against `pinned` when one is given.
pub fn load_json<T: DeserializeOwned>(
    path: &Path,
    pinned: Option<&str>,
) -> Result<Artifact<T>, ModelError> {
    let bytes = std::fs::read(path).map_err(|source| ModelError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let digest = digest_hex(&bytes);
    if let Some(expected) = pinned {
        if !expected.trim().eq_ignore_ascii_case(&digest) {
            return Err(ModelError::DigestMismatch {
                path: path.to_path_buf(),
                expected: expected.trim().to_string(),
                actual: digest,
            });
        }
    }

    let value = serde_json::from_slice(&bytes).map_err(|e| ModelError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    tracing::info!(path = %path.display(), sha256 = %digest, "Model artifact loaded");
    Ok(Artifact { value, digest })
}
