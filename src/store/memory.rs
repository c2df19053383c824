use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use time::OffsetDateTime;

use crate::store::{ContentEntry, ContentStore, EntryKind, Lookup, StoreError};

struct StoredFile {
    content: String,
    sha: String,
    date: Option<OffsetDateTime>,
}

/// Repository held in memory, counting every call made against it.
#[derive(Default)]
pub struct MemoryStore {
    files: Mutex<BTreeMap<String, StoredFile>>,
    broken_history: Mutex<BTreeSet<String>>,
    failure: Mutex<Option<StoreError>>,
    next_sha: AtomicUsize,
    calls: AtomicUsize,
}

fn name_of(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: &str, content: &str, date: Option<OffsetDateTime>) -> String {
        let sha = self.new_sha();
        self.files.lock().unwrap().insert(
            path.to_string(),
            StoredFile {
                content: content.to_string(),
                sha: sha.clone(),
                date,
            },
        );
        sha
    }

    /// Makes the commit history lookup fail for `path`.
    pub fn break_history(&self, path: &str) {
        self.broken_history.lock().unwrap().insert(path.to_string());
    }

    /// Makes the next call fail with `error`.
    pub fn fail_next(&self, error: StoreError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn paths(&self) -> Vec<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }

    pub fn content(&self, path: &str) -> Option<String> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .map(|file| file.content.clone())
    }

    fn new_sha(&self) -> String {
        format!("sha-{}", self.next_sha.fetch_add(1, Ordering::SeqCst))
    }

    fn enter(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failure.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn entry(path: &str, file: &StoredFile) -> ContentEntry {
        ContentEntry {
            name: name_of(path),
            path: path.to_string(),
            sha: file.sha.clone(),
            size: (file.content.len() * 3 / 4) as u64,
            kind: EntryKind::File,
        }
    }
}

#[async_trait::async_trait]
impl ContentStore for MemoryStore {
    async fn get_content(&self, path: &str) -> Result<Lookup<ContentEntry>, StoreError> {
        self.enter()?;
        let files = self.files.lock().unwrap();
        Ok(match files.get(path) {
            Some(file) => Lookup::Found(Self::entry(path, file)),
            None => Lookup::NotFound,
        })
    }

    async fn list_directory(&self, path: &str) -> Result<Lookup<Vec<ContentEntry>>, StoreError> {
        self.enter()?;
        let prefix = format!("{}/", path);
        let files = self.files.lock().unwrap();

        let mut entries: Vec<ContentEntry> = Vec::new();
        for (file_path, file) in files.iter() {
            let rest = match file_path.strip_prefix(&prefix) {
                Some(rest) => rest,
                None => continue,
            };
            match rest.split_once('/') {
                None => entries.push(Self::entry(file_path, file)),
                Some((dir, _)) => {
                    if !entries.iter().any(|e| e.name == dir) {
                        entries.push(ContentEntry {
                            name: dir.to_string(),
                            path: format!("{}{}", prefix, dir),
                            sha: "tree".to_string(),
                            size: 0,
                            kind: EntryKind::Dir,
                        });
                    }
                },
            }
        }

        // Directories only exist while they contain files.
        if entries.is_empty() {
            Ok(Lookup::NotFound)
        } else {
            Ok(Lookup::Found(entries))
        }
    }

    async fn put_content(
        &self,
        path: &str,
        base64_content: &str,
        _message: &str,
        sha: Option<&str>,
    ) -> Result<ContentEntry, StoreError> {
        self.enter()?;
        let new_sha = self.new_sha();
        let mut files = self.files.lock().unwrap();

        let current = files.get(path).map(|file| file.sha.as_str());
        if current.is_some() && current != sha {
            return Err(StoreError::Upstream {
                status: 409,
                message: format!("{} does not match", sha.unwrap_or("\"sha\"")),
            });
        }

        let file = StoredFile {
            content: base64_content.to_string(),
            sha: new_sha,
            date: Some(OffsetDateTime::now_utc()),
        };
        let entry = Self::entry(path, &file);
        files.insert(path.to_string(), file);
        Ok(entry)
    }

    async fn delete_content(
        &self,
        path: &str,
        _message: &str,
        sha: &str,
    ) -> Result<Lookup<()>, StoreError> {
        self.enter()?;
        let mut files = self.files.lock().unwrap();
        let current = files.get(path).map(|file| file.sha.clone());
        match current {
            None => Ok(Lookup::NotFound),
            Some(current) if current != sha => Err(StoreError::Upstream {
                status: 409,
                message: format!("{} does not match {}", path, sha),
            }),
            Some(_) => {
                files.remove(path);
                Ok(Lookup::Found(()))
            },
        }
    }

    async fn latest_commit_date(
        &self,
        path: &str,
    ) -> Result<Option<OffsetDateTime>, StoreError> {
        self.enter()?;
        if self.broken_history.lock().unwrap().contains(path) {
            return Err(StoreError::Upstream {
                status: 502,
                message: "Server Error".to_string(),
            });
        }
        Ok(self
            .files
            .lock()
            .unwrap()
            .get(path)
            .and_then(|file| file.date))
    }
}
