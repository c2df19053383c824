use std::time::Duration;

use serde::{Deserialize, Serialize};
use surf::{RequestBuilder, StatusCode};
use time::OffsetDateTime;

use crate::config::{encode_path, GitHubConfig};
use crate::store::{ContentEntry, ContentStore, Lookup, StoreError};

const USER_AGENT: &str = concat!("imghost/", env!("CARGO_PKG_VERSION"));

/// Contents API client for a single repository and branch.
pub struct GitHubStore {
    client: surf::Client,
    config: GitHubConfig,
    timeout: Duration,
}

#[derive(Serialize)]
struct RefQuery<'a> {
    #[serde(rename = "ref")]
    reference: &'a str,
}

#[derive(Serialize)]
struct CommitsQuery<'a> {
    path: &'a str,
    sha: &'a str,
    per_page: u8,
}

#[derive(Serialize)]
struct PutContent<'a> {
    message: &'a str,
    content: &'a str,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Serialize)]
struct DeleteContent<'a> {
    message: &'a str,
    sha: &'a str,
    branch: &'a str,
}

/// A path resolves to a single object for files and to a listing for
/// directories.
#[derive(Deserialize)]
#[serde(untagged)]
enum Contents {
    Directory(Vec<ContentEntry>),
    File(ContentEntry),
}

#[derive(Deserialize)]
struct PutResponse {
    content: ContentEntry,
}

#[derive(Deserialize)]
struct CommitSummary {
    commit: CommitDetail,
}

#[derive(Deserialize)]
struct CommitDetail {
    author: Option<Signature>,
    committer: Option<Signature>,
}

#[derive(Deserialize)]
struct Signature {
    #[serde(with = "time::serde::rfc3339")]
    date: OffsetDateTime,
}

#[derive(Deserialize)]
struct GitHubMessage {
    message: String,
}

impl GitHubStore {
    pub fn new(config: GitHubConfig, timeout: Duration) -> Self {
        GitHubStore {
            client: surf::Client::new(),
            config,
            timeout,
        }
    }

    fn repo_url(&self, suffix: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.config.api_url.as_str().trim_end_matches('/'),
            self.config.owner,
            self.config.repo,
            suffix,
        )
    }

    fn contents_url(&self, path: &str) -> String {
        self.repo_url(&format!("contents/{}", encode_path(path)))
    }

    async fn send(&self, request: RequestBuilder) -> Result<surf::Response, StoreError> {
        let request = request
            .header("Authorization", format!("Bearer {}", self.config.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", USER_AGENT);

        match async_std::future::timeout(self.timeout, request).await {
            Ok(response) => Ok(response?),
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }

    async fn get_contents(&self, path: &str) -> Result<Lookup<Contents>, StoreError> {
        let request = self.client.get(self.contents_url(path)).query(&RefQuery {
            reference: &self.config.branch,
        })?;
        let mut response = self.send(request).await?;

        match response.status() {
            StatusCode::NotFound => Ok(Lookup::NotFound),
            status if status.is_success() => Ok(Lookup::Found(decode(&mut response).await?)),
            _ => Err(upstream_error(response).await),
        }
    }
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: &mut surf::Response,
) -> Result<T, StoreError> {
    response
        .body_json()
        .await
        .map_err(|err| StoreError::Decode(err.to_string()))
}

/// Turns a failed response into an error carrying GitHub's own message.
async fn upstream_error(mut response: surf::Response) -> StoreError {
    let status = response.status();
    let message = match response.body_json::<GitHubMessage>().await {
        Ok(body) => body.message,
        Err(_) => status.canonical_reason().to_string(),
    };

    match status {
        StatusCode::Unauthorized => StoreError::Unauthorized(message),
        _ => StoreError::Upstream {
            status: status.into(),
            message,
        },
    }
}

#[async_trait::async_trait]
impl ContentStore for GitHubStore {
    #[tracing::instrument(skip(self))]
    async fn get_content(&self, path: &str) -> Result<Lookup<ContentEntry>, StoreError> {
        match self.get_contents(path).await? {
            Lookup::Found(Contents::File(entry)) => Ok(Lookup::Found(entry)),
            Lookup::Found(Contents::Directory(_)) => Err(StoreError::Decode(format!(
                "{} is a directory",
                path
            ))),
            Lookup::NotFound => Ok(Lookup::NotFound),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn list_directory(&self, path: &str) -> Result<Lookup<Vec<ContentEntry>>, StoreError> {
        match self.get_contents(path).await? {
            Lookup::Found(Contents::Directory(entries)) => Ok(Lookup::Found(entries)),
            Lookup::Found(Contents::File(entry)) => Ok(Lookup::Found(vec![entry])),
            Lookup::NotFound => Ok(Lookup::NotFound),
        }
    }

    #[tracing::instrument(skip(self, base64_content), fields(content_len = base64_content.len()))]
    async fn put_content(
        &self,
        path: &str,
        base64_content: &str,
        message: &str,
        sha: Option<&str>,
    ) -> Result<ContentEntry, StoreError> {
        let request = self.client.put(self.contents_url(path)).body_json(&PutContent {
            message,
            content: base64_content,
            branch: &self.config.branch,
            sha,
        })?;
        let mut response = self.send(request).await?;

        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }
        let created: PutResponse = decode(&mut response).await?;
        tracing::info!(sha = %created.content.sha, "stored {}", created.content.path);

        Ok(created.content)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_content(
        &self,
        path: &str,
        message: &str,
        sha: &str,
    ) -> Result<Lookup<()>, StoreError> {
        let request = self
            .client
            .delete(self.contents_url(path))
            .body_json(&DeleteContent {
                message,
                sha,
                branch: &self.config.branch,
            })?;
        let response = self.send(request).await?;

        match response.status() {
            StatusCode::NotFound => Ok(Lookup::NotFound),
            status if status.is_success() => {
                tracing::info!("deleted {}", path);
                Ok(Lookup::Found(()))
            },
            _ => Err(upstream_error(response).await),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn latest_commit_date(
        &self,
        path: &str,
    ) -> Result<Option<OffsetDateTime>, StoreError> {
        let request = self.client.get(self.repo_url("commits")).query(&CommitsQuery {
            path,
            sha: &self.config.branch,
            per_page: 1,
        })?;
        let mut response = self.send(request).await?;

        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }
        let commits: Vec<CommitSummary> = decode(&mut response).await?;

        Ok(commits.into_iter().next().and_then(|summary| {
            summary
                .commit
                .author
                .or(summary.commit.committer)
                .map(|signature| signature.date)
        }))
    }
}
