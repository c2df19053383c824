use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use thiserror::Error;
use url::Url;

use crate::Args;

/// Characters escaped inside a single URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("invalid URL for {name}: {source}")]
    InvalidUrl {
        name: &'static str,
        #[source]
        source: url::ParseError,
    },
}

/// Coordinates and credentials of the repository images are stored in.
#[derive(Clone)]
pub struct GitHubConfig {
    pub token: String,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub api_url: Url,
}

impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("token", &"<redacted>")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .field("api_url", &self.api_url.as_str())
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub github: GitHubConfig,
    /// Repository directory holding the images.
    pub images_dir: String,
    pub raw_base_url: Url,
    pub upstream_timeout: Duration,
}

fn required(
    value: &Option<String>,
    name: &'static str,
    missing: &mut Vec<&'static str>,
) -> String {
    match value.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => {
            missing.push(name);
            String::new()
        },
    }
}

fn parse_url(value: &str, name: &'static str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|source| ConfigError::InvalidUrl { name, source })
}

impl Config {
    /// Validates the server arguments once, reporting every missing value
    /// together.
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        let token = required(&args.github_token, "GITHUB_TOKEN", &mut missing);
        let owner = required(&args.github_owner, "GITHUB_OWNER", &mut missing);
        let repo = required(&args.github_repo, "GITHUB_REPO", &mut missing);
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let branch = match args.github_branch.trim() {
            "" => "main".to_string(),
            branch => branch.to_string(),
        };

        Ok(Config {
            github: GitHubConfig {
                token,
                owner,
                repo,
                branch,
                api_url: parse_url(&args.github_api_url, "GITHUB_API_URL")?,
            },
            images_dir: args.images_dir.trim_matches('/').to_string(),
            raw_base_url: parse_url(&args.raw_base_url, "IMGHOST_RAW_BASE_URL")?,
            upstream_timeout: Duration::from_secs(args.upstream_timeout),
        })
    }

    /// Repository path of an image file.
    pub fn image_path(&self, filename: &str) -> String {
        format!("{}/{}", self.images_dir, filename)
    }

    /// Unauthenticated address serving the current bytes of `path`.
    pub fn raw_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.raw_base_url.as_str().trim_end_matches('/'),
            self.github.owner,
            self.github.repo,
            self.github.branch,
            encode_path(path),
        )
    }

    /// Repository tree view of the images directory.
    pub fn repo_url(&self) -> String {
        format!(
            "https://github.com/{}/{}/tree/{}/{}",
            self.github.owner, self.github.repo, self.github.branch, self.images_dir
        )
    }
}

/// Percent-encodes each segment of a slash-separated path.
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        github: GitHubConfig {
            token: "secret".to_string(),
            owner: "octo".to_string(),
            repo: "pics".to_string(),
            branch: "main".to_string(),
            api_url: Url::parse("https://api.github.com").unwrap(),
        },
        images_dir: "images".to_string(),
        raw_base_url: Url::parse("https://raw.githubusercontent.com").unwrap(),
        upstream_timeout: Duration::from_secs(30),
    }
}
