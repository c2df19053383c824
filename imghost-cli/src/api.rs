use std::io::Cursor;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use surf::StatusCode;
use thiserror::Error;

use crate::config::ClientConfig;
use imghost_api_structs::{
    has_image_extension, DeletePayload, DeleteResponse, ErrorBody, ImageList, ImageRecord,
    UploadPayload, UploadResponse, MAX_UPLOAD_SIZE,
};

#[derive(Error, Debug)]
pub enum ClientError {
    /// Error reported by the server, shown as is.
    #[error("{0}")]
    Api(String),
    #[error("request failed: {0}")]
    Http(surf::Error),
    #[error("{0}")]
    Invalid(String),
    #[error("could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not decode image: {0}")]
    Image(#[from] image::ImageError),
}

impl From<surf::Error> for ClientError {
    fn from(err: surf::Error) -> Self {
        ClientError::Http(err)
    }
}

/// Checks a local file before its bytes are read.
pub fn validate_file(path: &Path, size: u64) -> Result<(), ClientError> {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    if !has_image_extension(&name) {
        return Err(ClientError::Invalid(format!(
            "{}: invalid file type. Please upload PNG, JPG, GIF, or WEBP images.",
            name
        )));
    }
    if size > MAX_UPLOAD_SIZE {
        return Err(ClientError::Invalid(format!(
            "File {} exceeds 15MB limit.",
            name
        )));
    }
    Ok(())
}

async fn check(mut res: surf::Response, fallback: &str) -> Result<surf::Response, ClientError> {
    if res.status().is_success() {
        return Ok(res);
    }
    let message = match res.body_json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => fallback.to_string(),
    };
    Err(ClientError::Api(message))
}

/// Client of the imghost server API.
pub struct ApiClient {
    client: surf::Client,
    endpoint: String,
}

impl ApiClient {
    pub fn new(endpoint: &str) -> Self {
        ApiClient {
            client: surf::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.endpoint, path)
    }

    pub async fn upload_file(&self, path: &Path) -> Result<UploadResponse, ClientError> {
        let io_error = |source| ClientError::Io {
            path: path.to_path_buf(),
            source,
        };
        let size = async_std::fs::metadata(path).await.map_err(io_error)?.len();
        validate_file(path, size)?;

        let data = async_std::fs::read(path).await.map_err(io_error)?;
        let payload = UploadPayload {
            filename: path
                .file_name()
                .map(|name| name.to_string_lossy().to_string()),
            content: Some(STANDARD.encode(&data)),
            size: Some(size),
        };

        log::info!("Uploading {} ({} bytes)", path.display(), size);
        let res = self
            .client
            .post(self.url("upload"))
            .body_json(&payload)?
            .await?;
        let mut res = check(res, "Upload failed").await?;
        Ok(res.body_json().await?)
    }

    pub async fn list(&self) -> Result<Vec<ImageRecord>, ClientError> {
        let res = self.client.get(self.url("images")).await?;
        let mut res = check(res, "Failed to load images").await?;
        let list: ImageList = res.body_json().await?;
        Ok(list.images)
    }

    pub async fn delete(&self, filename: &str) -> Result<DeleteResponse, ClientError> {
        let payload = DeletePayload {
            filename: Some(filename.to_string()),
        };
        let res = self
            .client
            .post(self.url("delete"))
            .body_json(&payload)?
            .await?;
        let mut res = check(res, "Delete failed").await?;
        Ok(res.body_json().await?)
    }
}

#[derive(Deserialize)]
struct RepoEntry {
    name: String,
    path: String,
    sha: String,
    size: u64,
    #[serde(rename = "type")]
    kind: String,
}

fn records_from_listing(config: &ClientConfig, entries: Vec<RepoEntry>) -> Vec<ImageRecord> {
    entries
        .into_iter()
        .filter(|entry| entry.kind == "file" && has_image_extension(&entry.name))
        .map(|entry| ImageRecord {
            url: config.raw_url(&entry.path),
            name: entry.name,
            size: entry.size,
            date: None,
            version_marker: entry.sha,
        })
        .collect()
}

/// Lists a public repository straight from the contents API, without the
/// server. Commit dates are not looked up.
pub async fn list_public_repo(config: &ClientConfig) -> Result<Vec<ImageRecord>, ClientError> {
    let mut res = surf::get(config.contents_api_url())
        .header("Accept", "application/vnd.github+json")
        .header("User-Agent", "imghost-cli")
        .await?;

    if res.status() == StatusCode::NotFound {
        return Ok(Vec::new());
    }
    if !res.status().is_success() {
        return Err(ClientError::Api(format!(
            "GitHub answered {} for {}",
            res.status(),
            config.contents_api_url()
        )));
    }

    let entries: Vec<RepoEntry> = res.body_json().await?;
    Ok(records_from_listing(config, entries))
}

/// Downloads an image and reports its pixel dimensions.
pub async fn image_dimensions(url: &str) -> Result<(u32, u32), ClientError> {
    let mut res = surf::get(url).await?;
    if !res.status().is_success() {
        return Err(ClientError::Api(format!("{} answered {}", url, res.status())));
    }
    let bytes = res.body_bytes().await?;

    let reader = image::io::Reader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|source| ClientError::Io {
            path: PathBuf::from(url),
            source,
        })?;
    Ok(reader.into_dimensions()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_images_and_large_files() {
        assert!(validate_file(Path::new("/tmp/cat.png"), 10).is_ok());
        assert!(validate_file(Path::new("/tmp/cat.PNG"), MAX_UPLOAD_SIZE).is_ok());

        match validate_file(Path::new("/tmp/notes.txt"), 10) {
            Err(ClientError::Invalid(message)) => assert!(message.contains("invalid file type")),
            other => panic!("unexpected result: {:?}", other),
        }
        match validate_file(Path::new("/tmp/big.jpg"), MAX_UPLOAD_SIZE + 1) {
            Err(ClientError::Invalid(message)) => {
                assert_eq!(message, "File big.jpg exceeds 15MB limit.")
            },
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn direct_listing_keeps_image_files() {
        let config = ClientConfig::new("octo", "pics", "main").unwrap();
        let entries: Vec<RepoEntry> = serde_json::from_str(
            r#"[{"name": "a.png", "path": "images/a.png", "sha": "1", "size": 3, "type": "file"},
                {"name": "b.txt", "path": "images/b.txt", "sha": "2", "size": 3, "type": "file"},
                {"name": "c.gif", "path": "images/c.gif", "sha": "3", "size": 0, "type": "dir"}]"#,
        )
        .unwrap();

        let records = records_from_listing(&config, entries);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "a.png");
        assert_eq!(
            records[0].url,
            "https://raw.githubusercontent.com/octo/pics/main/images/a.png"
        );
        assert_eq!(records[0].version_marker, "1");
    }

    #[test]
    fn endpoint_trailing_slash_is_ignored() {
        let client = ApiClient::new("http://localhost:8166/");
        assert_eq!(client.url("images"), "http://localhost:8166/api/images");
    }
}
