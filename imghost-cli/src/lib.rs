pub mod api;
pub mod clipboard;
pub mod config;
pub mod format;
pub mod gallery;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Client(#[from] api::ClientError),
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error("terminal: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Failed(String),
}
