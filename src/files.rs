//! Async file helpers shared by the stores.
//!
//! All writes go through [`atomic_write`]: the bytes land in a uniquely named
//! temp file next to the target, which is then renamed over it. A reader
//! never observes a half-written document, but two concurrent writers to the
//! same file still race and the last rename wins.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tokio::fs;

use crate::error::{NavError, Result};

pub async fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).await.map_err(|source| NavError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads and parses a JSON document, propagating every failure.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = read_text(path).await?;
    serde_json::from_str(&text).map_err(|source| NavError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let data = serde_json::to_vec(value).map_err(|e| NavError::Serialize {
        path: path.to_path_buf(),
        details: e.to_string(),
    })?;
    atomic_write(path, &data).await
}

/// Write data to a file atomically
///
/// 1. Ensure the parent directory exists
/// 2. Write to a temp file in the same directory
/// 3. Rename the temp file to the target path
pub async fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let write_err = |source| NavError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    if let Err(e) = fs::write(&temp_path, data).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(write_err(e));
    }

    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(write_err(e));
    }

    Ok(())
}
