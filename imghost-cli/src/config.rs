use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Location of the saved config, relative to the user config directory.
pub const CONFIG_FILE: &str = "imghost/config.json";

const IMAGES_DIR: &str = "images";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("owner, repo and branch are all required")]
    Incomplete,
    #[error("no user config directory on this platform")]
    NoConfigDir,
    #[error("could not access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Repository the client talks to directly, saved between runs.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ClientConfig {
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

pub fn default_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_FILE))
        .ok_or(ConfigError::NoConfigDir)
}

impl ClientConfig {
    pub fn new(owner: &str, repo: &str, branch: &str) -> Result<Self, ConfigError> {
        let (owner, repo, branch) = (owner.trim(), repo.trim(), branch.trim());
        if owner.is_empty() || repo.is_empty() || branch.is_empty() {
            return Err(ConfigError::Incomplete);
        }
        Ok(ClientConfig {
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch: branch.to_string(),
        })
    }

    /// Reads the saved config. `None` means setup has not happened yet.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            },
        };
        serde_json::from_str(&data)
            .map(Some)
            .map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source: io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let data = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, data).map_err(io_error)
    }

    pub fn clear(path: &Path) -> Result<(), ConfigError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn repo_tree_url(&self) -> String {
        format!(
            "https://github.com/{}/{}/tree/{}/{}",
            self.owner, self.repo, self.branch, IMAGES_DIR
        )
    }

    /// GitHub Pages address of an image, or of the images directory.
    pub fn pages_url(&self, filename: Option<&str>) -> String {
        match filename {
            Some(filename) => format!(
                "https://{}.github.io/{}/{}/{}",
                self.owner, self.repo, IMAGES_DIR, filename
            ),
            None => format!("https://{}.github.io/{}/{}", self.owner, self.repo, IMAGES_DIR),
        }
    }

    pub fn contents_api_url(&self) -> String {
        format!(
            "https://api.github.com/repos/{}/{}/contents/{}?ref={}",
            self.owner, self.repo, IMAGES_DIR, self.branch
        )
    }

    pub fn raw_url(&self, path: &str) -> String {
        format!(
            "https://raw.githubusercontent.com/{}/{}/{}/{}",
            self.owner, self.repo, self.branch, path
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        ClientConfig::new("octo", "pics", "main").unwrap()
    }

    #[test]
    fn missing_file_means_not_configured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        assert_eq!(ClientConfig::load(&path).unwrap(), None);
    }

    #[test]
    fn saved_config_is_loaded_back_and_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        config().save(&path).unwrap();
        assert_eq!(ClientConfig::load(&path).unwrap(), Some(config()));

        ClientConfig::clear(&path).unwrap();
        assert_eq!(ClientConfig::load(&path).unwrap(), None);
        ClientConfig::clear(&path).unwrap();
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            ClientConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn blank_fields_are_rejected() {
        assert!(matches!(
            ClientConfig::new("octo", "  ", "main"),
            Err(ConfigError::Incomplete)
        ));
        assert_eq!(
            ClientConfig::new(" octo ", "pics", "dev").unwrap().owner,
            "octo"
        );
    }

    #[test]
    fn derived_urls() {
        let config = config();
        assert_eq!(
            config.repo_tree_url(),
            "https://github.com/octo/pics/tree/main/images"
        );
        assert_eq!(
            config.pages_url(Some("cat.png")),
            "https://octo.github.io/pics/images/cat.png"
        );
        assert_eq!(config.pages_url(None), "https://octo.github.io/pics/images");
        assert_eq!(
            config.contents_api_url(),
            "https://api.github.com/repos/octo/pics/contents/images?ref=main"
        );
        assert_eq!(
            config.raw_url("images/cat.png"),
            "https://raw.githubusercontent.com/octo/pics/main/images/cat.png"
        );
    }
}
