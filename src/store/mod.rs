use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;

pub mod github;
#[cfg(test)]
pub mod memory;

/// Outcome of addressing an object that may not exist.
#[derive(Clone, Debug, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Submodule,
    #[serde(other)]
    Other,
}

/// A file or directory in the repository, as reported by the contents API.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ContentEntry {
    pub name: String,
    pub path: String,
    /// Blob SHA, required to update or delete the object.
    pub sha: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{message}")]
    Upstream { status: u16, message: String },
    #[error("GitHub rejected the configured credentials: {0}")]
    Unauthorized(String),
    #[error("request to GitHub failed: {0}")]
    Transport(surf::Error),
    #[error("GitHub did not respond within {0:?}")]
    Timeout(Duration),
    #[error("unexpected response from GitHub: {0}")]
    Decode(String),
}

impl From<surf::Error> for StoreError {
    fn from(err: surf::Error) -> Self {
        StoreError::Transport(err)
    }
}

/// Versioned file storage addressed by repository path.
#[async_trait::async_trait]
pub trait ContentStore: Send + Sync {
    async fn get_content(&self, path: &str) -> Result<Lookup<ContentEntry>, StoreError>;

    async fn list_directory(&self, path: &str) -> Result<Lookup<Vec<ContentEntry>>, StoreError>;

    /// Creates `path`, or overwrites it when `sha` names its current blob.
    async fn put_content(
        &self,
        path: &str,
        base64_content: &str,
        message: &str,
        sha: Option<&str>,
    ) -> Result<ContentEntry, StoreError>;

    async fn delete_content(
        &self,
        path: &str,
        message: &str,
        sha: &str,
    ) -> Result<Lookup<()>, StoreError>;

    /// Author time of the newest commit touching `path`.
    async fn latest_commit_date(&self, path: &str)
        -> Result<Option<OffsetDateTime>, StoreError>;
}
