use std::sync::Arc;

use opentelemetry_tide::TideExt;
use structopt::StructOpt;

pub mod config;
pub mod models;
pub mod store;
pub mod telemetry;
pub mod web;

use crate::config::{Config, ConfigError};
use crate::models::images::SuffixClock;
use crate::store::github::GitHubStore;
use crate::store::ContentStore;

#[derive(Clone)]
pub struct State {
    pub config: Arc<Config>,
    pub store: Arc<dyn ContentStore>,
    pub tera: Arc<tera::Tera>,
    pub suffixes: Arc<SuffixClock>,
}

#[derive(Debug)]
pub enum Error {
    ConfigurationError(ConfigError),
    TemplatePathError(std::io::Error),
    TemplateParseError(tera::Error),
    TelemetryInitError(anyhow::Error),
    ListenError(std::io::Error),
}

impl From<Error> for i32 {
    fn from(error: Error) -> i32 {
        match error {
            Error::ConfigurationError(_) => 2,
            Error::TemplatePathError(_) => 3,
            Error::TemplateParseError(_) => 3,
            Error::TelemetryInitError(_) => 4,
            Error::ListenError(_) => 5,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::ConfigurationError(err) => {
                write!(f, "Server configuration error: {}", err)
            },
            Error::TemplatePathError(err) => {
                write!(f, "Could not open template directory: {}", err)
            },
            Error::TemplateParseError(err) => {
                write!(f, "Template parsing error: {}", err)
            },
            Error::TelemetryInitError(err) => {
                write!(f, "Failed to init telemetry: {}", err)
            },
            Error::ListenError(err) => {
                write!(f, "Failed to start server: {}", err)
            },
        }
    }
}

#[derive(Debug, StructOpt)]
pub struct Args {
    /// Host address to bind to.
    #[structopt(long, default_value = "localhost", env = "IMGHOST_BIND_ADDRESS")]
    address: String,
    /// Port to bind to.
    #[structopt(long, default_value = "8166", env = "IMGHOST_BIND_PORT")]
    port: u16,

    /// GitHub token used for the contents API.
    #[structopt(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// Owner of the repository images are stored in.
    #[structopt(long, env = "GITHUB_OWNER")]
    github_owner: Option<String>,

    /// Name of the repository images are stored in.
    #[structopt(long, env = "GITHUB_REPO")]
    github_repo: Option<String>,

    /// Branch images are committed to.
    #[structopt(long, default_value = "main", env = "GITHUB_BRANCH")]
    github_branch: String,

    /// Repository directory holding the images.
    #[structopt(long, default_value = "images", env = "IMGHOST_IMAGES_DIR")]
    images_dir: String,

    /// GitHub REST API base URL.
    #[structopt(
        long,
        default_value = "https://api.github.com",
        env = "GITHUB_API_URL"
    )]
    github_api_url: String,

    /// Base URL serving raw repository files.
    #[structopt(
        long,
        default_value = "https://raw.githubusercontent.com",
        env = "IMGHOST_RAW_BASE_URL"
    )]
    raw_base_url: String,

    /// Seconds to wait for a single GitHub API request.
    #[structopt(long, default_value = "30", env = "IMGHOST_UPSTREAM_TIMEOUT")]
    upstream_timeout: u64,

    /// Path to Tera templates directory
    #[structopt(
        long,
        parse(from_os_str),
        default_value = "./templates",
        env = "IMGHOST_TEMPLATE_PATH"
    )]
    template_path: std::path::PathBuf,
}

pub fn server(state: State) -> tide::Server<State> {
    let mut app = tide::with_state(state);

    app.with_default_tracing_middleware();

    web::mount(&mut app);

    app
}

pub async fn main() -> Result<(), Error> {
    dotenv::dotenv().ok();
    let args = Args::from_args();

    telemetry::init().map_err(Error::TelemetryInitError)?;

    let config = Config::from_args(&args).map_err(Error::ConfigurationError)?;
    tracing::info!(?config, "loaded configuration");

    let template_path = args
        .template_path
        .canonicalize()
        .map_err(Error::TemplatePathError)?;
    let tera = match tera::Tera::new(&template_path.join("**/*.html").to_string_lossy()) {
        Ok(t) => t,
        Err(e) => {
            return Err(Error::TemplateParseError(e));
        },
    };

    let store = GitHubStore::new(config.github.clone(), config.upstream_timeout);

    let state = State {
        config: Arc::new(config),
        store: Arc::new(store),
        tera: Arc::new(tera),
        suffixes: Arc::new(SuffixClock::new()),
    };
    let app = server(state);

    let address: &str = args.address.as_ref();
    app.listen((address, args.port))
        .await
        .map_err(Error::ListenError)?;

    Ok(())
}

#[cfg(test)]
pub(crate) fn test_state(store: Arc<dyn ContentStore>) -> State {
    let mut tera = tera::Tera::default();
    tera.add_raw_templates(vec![
        ("base.html", include_str!("../templates/base.html")),
        ("gallery.html", include_str!("../templates/gallery.html")),
        ("image.html", include_str!("../templates/image.html")),
    ])
    .expect("bundled templates should parse");

    State {
        config: Arc::new(config::test_config()),
        store,
        tera: Arc::new(tera),
        suffixes: Arc::new(SuffixClock::new()),
    }
}
