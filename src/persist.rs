//! JSON file persistence shared by both stores.
//!
//! Each store keeps its records as one flat JSON array. Reads classify the
//! file instead of failing, so callers can decide how to degrade. Writes go
//! to a sibling temp file and are renamed into place, so a crash or a
//! cancelled task never leaves a half-written document behind.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Outcome of reading a JSON array file.
#[derive(Debug)]
pub enum JsonLoad<T> {
    /// The file does not exist.
    Missing,
    /// The file exists but holds only whitespace (or `null`).
    Empty,
    Parsed(Vec<T>),
    /// The file exists but is not a valid array of `T`.
    Corrupt(String),
}

/// Read and classify a JSON array file.
///
/// Only unexpected I/O failures (permissions, a directory in the way) are
/// returned as errors.
pub async fn read_json_list<T: DeserializeOwned>(path: &Path) -> Result<JsonLoad<T>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(JsonLoad::Missing),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(JsonLoad::Empty);
    }

    match serde_json::from_slice::<Option<Vec<T>>>(&bytes) {
        Ok(Some(items)) => Ok(JsonLoad::Parsed(items)),
        Ok(None) => Ok(JsonLoad::Empty),
        Err(e) => Ok(JsonLoad::Corrupt(e.to_string())),
    }
}

/// Temp path used while writing `path`.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Serialize `items` as a pretty-printed array and replace `path` atomically.
///
/// Creates the parent directory if needed.
pub async fn write_json_atomic<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }

    let json = serde_json::to_vec_pretty(items).context("Failed to serialize records")?;
    let tmp = temp_path(path);
    tokio::fs::write(&tmp, &json)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
            tracing::debug!(path = %tmp.display(), error = %cleanup, "failed to remove temp file");
        }
        return Err(e).with_context(|| format!("Failed to replace {}", path.display()));
    }
    Ok(())
}
