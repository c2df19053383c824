use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_std::task::{self, JoinHandle};
use time::OffsetDateTime;

use crate::config::Config;
use crate::store::{ContentEntry, ContentStore, EntryKind, Lookup, StoreError};
use imghost_api_structs::{has_image_extension, ImageRecord};

/// Millisecond timestamps that never repeat within the process, even when
/// several uploads arrive in the same millisecond.
#[derive(Debug, Default)]
pub struct SuffixClock {
    last: AtomicU64,
}

impl SuffixClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        let now = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as u64;
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match self.last.compare_exchange_weak(
                last,
                candidate,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }
}

/// Replaces every character outside `[a-zA-Z0-9._-]` with `_`.
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '_' | '-' => c,
            _ => '_',
        })
        .collect()
}

/// Name an upload is stored under: sanitized, `.png` when there is no
/// extension, and `_<suffix>` before the extension.
pub fn stored_filename(filename: &str, suffix: u64) -> String {
    let sanitized = sanitize_filename(filename);
    match sanitized.rsplit_once('.') {
        Some((stem, ext)) => format!("{}_{}.{}", stem, suffix, ext),
        None => format!("{}_{}.png", sanitized, suffix),
    }
}

/// A bare file name that stays inside the images directory.
pub fn is_plain_filename(name: &str) -> bool {
    !name.contains('/') && !name.contains('\\') && name != "." && name != ".."
}

pub fn is_image_entry(entry: &ContentEntry) -> bool {
    entry.kind == EntryKind::File && has_image_extension(&entry.name)
}

/// Newest first. Images without a known date go last.
pub fn sort_newest_first(images: &mut [ImageRecord]) {
    images.sort_by(|a, b| b.date.cmp(&a.date));
}

fn image_record(entry: ContentEntry, url: String, date: Option<OffsetDateTime>) -> ImageRecord {
    ImageRecord {
        name: entry.name,
        url,
        size: entry.size,
        date,
        version_marker: entry.sha,
    }
}

/// Lists the images directory with each file's last commit time.
///
/// Commit lookups run concurrently. A file whose lookup fails is left out
/// rather than failing the listing, and a missing directory is an empty
/// gallery.
pub async fn list_images(
    store: &Arc<dyn ContentStore>,
    config: &Config,
) -> Result<Vec<ImageRecord>, StoreError> {
    let entries = match store.list_directory(&config.images_dir).await? {
        Lookup::Found(entries) => entries,
        Lookup::NotFound => return Ok(Vec::new()),
    };

    let handles: Vec<JoinHandle<Option<ImageRecord>>> = entries
        .into_iter()
        .filter(is_image_entry)
        .map(|entry| {
            let store = store.clone();
            let url = config.raw_url(&entry.path);
            task::spawn(async move {
                match store.latest_commit_date(&entry.path).await {
                    Ok(date) => Some(image_record(entry, url, date)),
                    Err(err) => {
                        tracing::warn!("dropping {} from listing: {}", entry.name, err);
                        None
                    },
                }
            })
        })
        .collect();

    let mut images = Vec::with_capacity(handles.len());
    for handle in handles {
        if let Some(image) = handle.await {
            images.push(image);
        }
    }
    sort_newest_first(&mut images);

    Ok(images)
}

/// Looks up a single image by file name.
pub async fn find_image(
    store: &Arc<dyn ContentStore>,
    config: &Config,
    filename: &str,
) -> Result<Lookup<ImageRecord>, StoreError> {
    let path = config.image_path(filename);
    let entry = match store.get_content(&path).await? {
        Lookup::Found(entry) if is_image_entry(&entry) => entry,
        _ => return Ok(Lookup::NotFound),
    };

    let date = match store.latest_commit_date(&path).await {
        Ok(date) => date,
        Err(err) => {
            tracing::warn!("no commit date for {}: {}", path, err);
            None
        },
    };
    let url = config.raw_url(&path);

    Ok(Lookup::Found(image_record(entry, url, date)))
}
