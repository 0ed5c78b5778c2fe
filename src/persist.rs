//! Durable storage for the committed upload queue.
//!
//! Entries are serialized as `{name, content(base64), type}` records in one
//! JSON file. Loading is forgiving: records with missing or malformed
//! content are filtered out silently, never surfaced as an error.

use base64::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs;

use crate::upload::QueueEntry;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedFile {
    name: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(rename = "type", default)]
    media_type: String,
    #[serde(default)]
    uuid: String,
}

#[derive(Debug, Clone)]
pub struct QueueStore {
    path: PathBuf,
}

impl QueueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn save(&self, entries: &[QueueEntry]) -> Result<(), PersistError> {
        let records: Vec<PersistedFile> = entries
            .iter()
            .map(|entry| PersistedFile {
                name: entry.file_name.clone(),
                content: Some(BASE64_STANDARD.encode(&entry.content)),
                media_type: entry.media_type.clone(),
                uuid: entry.uuid.clone(),
            })
            .collect();
        let bytes = serde_json::to_vec_pretty(&records)?;
        fs::write(&self.path, bytes).await?;
        Ok(())
    }

    /// Load the persisted queue, dropping unusable records. A missing or
    /// unreadable file is an empty queue, not a failure.
    pub async fn load(&self) -> Vec<QueueEntry> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err,
                    "could not read persisted queue");
                return Vec::new();
            }
        };
        let records: Vec<PersistedFile> = match serde_json::from_slice(&bytes) {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err,
                    "persisted queue is malformed, starting empty");
                return Vec::new();
            }
        };
        records
            .into_iter()
            .filter_map(|record| {
                let Some(encoded) = record.content else {
                    tracing::warn!(name = %record.name, "persisted entry has no content, dropped");
                    return None;
                };
                match BASE64_STANDARD.decode(encoded.as_bytes()) {
                    Ok(content) => Some(QueueEntry {
                        uuid: record.uuid,
                        file_name: record.name,
                        estimated_minutes: 0.0,
                        content,
                        media_type: record.media_type,
                    }),
                    Err(err) => {
                        tracing::warn!(name = %record.name, error = %err,
                            "persisted entry has malformed content, dropped");
                        None
                    }
                }
            })
            .collect()
    }
}
