use std::io::Write;
use std::path::PathBuf;

use async_std::channel::{self, Sender};
use async_std::io::BufReader;
use async_std::prelude::*;
use async_std::stream::Stream;
use structopt::StructOpt;
use time::OffsetDateTime;

use imghost_api_structs::{CopyFormat, ImageRecord};
use imghost_cli::api::{image_dimensions, list_public_repo, ApiClient, ClientError};
use imghost_cli::clipboard::{self, CopyMethod};
use imghost_cli::config::{default_path, ClientConfig};
use imghost_cli::format::{file_size, relative_date};
use imghost_cli::gallery::{Action, Effect, Gallery, Input, Phase, HELP};
use imghost_cli::Error;

#[derive(StructOpt)]
struct SharedApiArgs {
    /// imghost server address
    #[structopt(long, env = "IMGHOST_API_ENDPOINT", default_value = "http://localhost:8166")]
    endpoint: String,
}

#[derive(StructOpt)]
pub struct ConfigureArgs {
    /// GitHub user or organization owning the repository.
    #[structopt(long)]
    owner: Option<String>,
    /// Repository name.
    #[structopt(long)]
    repo: Option<String>,
    /// Branch holding the images.
    #[structopt(long)]
    branch: Option<String>,
}

#[derive(StructOpt)]
pub struct UploadArgs {
    #[structopt(flatten)]
    api_arguments: SharedApiArgs,

    /// Image files to upload.
    #[structopt(name = "PATH", parse(from_os_str), required = true)]
    paths: Vec<PathBuf>,
}

#[derive(StructOpt)]
pub struct ListArgs {
    #[structopt(flatten)]
    api_arguments: SharedApiArgs,

    /// Only show images whose name contains this text.
    #[structopt(long, short)]
    search: Option<String>,

    /// Read the public repository directly instead of asking the server.
    #[structopt(long)]
    direct: bool,
}

#[derive(StructOpt)]
pub struct DeleteArgs {
    #[structopt(flatten)]
    api_arguments: SharedApiArgs,

    /// Don't ask for confirmation.
    #[structopt(long, short)]
    yes: bool,

    #[structopt(name = "FILENAME")]
    filename: String,
}

#[derive(StructOpt)]
pub struct CopyArgs {
    #[structopt(flatten)]
    api_arguments: SharedApiArgs,

    /// direct, markdown or html
    #[structopt(long, short, default_value = "direct")]
    format: CopyFormat,

    #[structopt(name = "FILENAME")]
    filename: String,
}

#[derive(StructOpt)]
pub struct BrowseArgs {
    #[structopt(flatten)]
    api_arguments: SharedApiArgs,
}

#[derive(StructOpt)]
pub enum Command {
    /// Save the repository used for direct listing and links.
    Configure(ConfigureArgs),
    /// Forget the saved repository.
    ClearConfig,
    Upload(UploadArgs),
    List(ListArgs),
    Delete(DeleteArgs),
    /// Copy an image's address to the clipboard.
    Copy(CopyArgs),
    /// Interactive gallery.
    Browse(BrowseArgs),
}

fn prompt(question: &str) -> std::io::Result<String> {
    print!("{}", question);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn confirm(question: &str) -> std::io::Result<bool> {
    let answer = prompt(&format!("{} [y/N] ", question))?;
    Ok(matches!(answer.as_str(), "y" | "Y" | "yes"))
}

fn print_cards<'a>(images: impl IntoIterator<Item = &'a ImageRecord>) {
    let now = OffsetDateTime::now_utc();
    let mut empty = true;
    for (index, image) in images.into_iter().enumerate() {
        empty = false;
        println!(
            "{:>3}. {}  {}  {}",
            index + 1,
            image.name,
            file_size(image.size),
            relative_date(image.date, now)
        );
    }
    if empty {
        println!("No images found.");
    }
}

fn copy_to_clipboard(text: &str, label: &str) -> std::io::Result<()> {
    let method = clipboard::copy(text, &mut std::io::stdout())?;
    match method {
        CopyMethod::Program(program) => log::debug!("copied with {}", program),
        CopyMethod::Terminal => println!(),
    }
    println!("{}", label);
    Ok(())
}

fn setup(config_path: &std::path::Path, args: ConfigureArgs) -> Result<ClientConfig, Error> {
    let ask = |value: Option<String>, question: &str| match value {
        Some(value) => Ok(value),
        None => prompt(question),
    };
    let owner = ask(args.owner, "GitHub owner: ")?;
    let repo = ask(args.repo, "Repository: ")?;
    let branch = match ask(args.branch, "Branch [main]: ")? {
        branch if branch.is_empty() => "main".to_string(),
        branch => branch,
    };

    let config = ClientConfig::new(&owner, &repo, &branch)?;
    config.save(config_path)?;
    log::info!("Saved configuration to {}", config_path.display());
    Ok(config)
}

async fn upload(args: UploadArgs) -> Result<(), Error> {
    let client = ApiClient::new(&args.api_arguments.endpoint);
    let mut failed = 0;

    for path in &args.paths {
        match client.upload_file(path).await {
            Ok(res) => println!("{} -> {}", res.filename, res.url),
            Err(err) => {
                log::error!("{}: {}", path.display(), err);
                failed += 1;
            },
        }
    }

    if failed > 0 {
        return Err(Error::Failed(format!(
            "{} of {} uploads failed",
            failed,
            args.paths.len()
        )));
    }
    Ok(())
}

async fn list(args: ListArgs) -> Result<(), Error> {
    let images = if args.direct {
        let config = ClientConfig::load(&default_path()?)?.ok_or_else(|| {
            Error::Failed("no repository configured, run `imghost-cli configure`".to_string())
        })?;
        println!("{}", config.repo_tree_url());
        list_public_repo(&config).await?
    } else {
        ApiClient::new(&args.api_arguments.endpoint).list().await?
    };

    let search = args.search.unwrap_or_default();
    print_cards(images.iter().filter(|image| image.matches(search.trim())));
    Ok(())
}

async fn delete(args: DeleteArgs) -> Result<(), Error> {
    if !args.yes && !confirm(&format!("Are you sure you want to delete {}?", args.filename))? {
        return Ok(());
    }
    let res = ApiClient::new(&args.api_arguments.endpoint)
        .delete(&args.filename)
        .await?;
    println!("{}", res.message);
    Ok(())
}

async fn copy(args: CopyArgs) -> Result<(), Error> {
    let images = ApiClient::new(&args.api_arguments.endpoint).list().await?;
    let image = images
        .iter()
        .find(|image| image.name == args.filename)
        .ok_or_else(|| Error::Failed(format!("No image named {}", args.filename)))?;

    copy_to_clipboard(&args.format.render(image), args.format.confirmation())?;
    Ok(())
}

type DimensionsResult = (String, Result<(u32, u32), ClientError>);

enum Event {
    Line(Option<std::io::Result<String>>),
    Dimensions(Option<DimensionsResult>),
}

struct Browser {
    client: ApiClient,
    config: ClientConfig,
    gallery: Gallery,
    dimensions: Sender<DimensionsResult>,
}

impl Browser {
    fn show(&self) {
        match &self.gallery.phase {
            Phase::Idle => println!("Type refresh to load the gallery."),
            Phase::Loading => println!("Loading..."),
            Phase::Error(message) => println!("Failed to load images: {} (type refresh to retry)", message),
            Phase::Displaying => match &self.gallery.selected {
                Some(selected) => {
                    let image = &selected.image;
                    println!("{}", image.name);
                    println!("  url:        {}", image.url);
                    println!("  pages:      {}", self.config.pages_url(Some(&image.name)));
                    println!("  size:       {}", file_size(image.size));
                    println!(
                        "  uploaded:   {}",
                        relative_date(image.date, OffsetDateTime::now_utc())
                    );
                    match selected.dimensions {
                        Some((width, height)) => println!("  dimensions: {}x{}", width, height),
                        None => println!("  dimensions: loading..."),
                    }
                },
                None => {
                    if !self.gallery.query().is_empty() {
                        println!("Search: {:?}", self.gallery.query());
                    }
                    print_cards(self.gallery.visible());
                },
            },
        }
    }

    async fn perform<S>(&mut self, mut effect: Effect, lines: &mut S) -> Result<(), Error>
    where
        S: Stream<Item = std::io::Result<String>> + Unpin,
    {
        loop {
            effect = match effect {
                Effect::None => return Ok(()),
                Effect::Notice(message) => {
                    println!("{}", message);
                    return Ok(());
                },
                Effect::FetchImages => {
                    let action = match self.client.list().await {
                        Ok(images) => Action::Loaded(images),
                        Err(err) => Action::LoadFailed(err.to_string()),
                    };
                    let effect = self.gallery.dispatch(action);
                    self.show();
                    effect
                },
                Effect::LoadDimensions { url } => {
                    let sender = self.dimensions.clone();
                    async_std::task::spawn(async move {
                        let result = image_dimensions(&url).await;
                        // The browser may have quit already.
                        let _ = sender.send((url, result)).await;
                    });
                    self.show();
                    Effect::None
                },
                Effect::CopyText { text, label } => {
                    copy_to_clipboard(&text, label)?;
                    Effect::None
                },
                Effect::DeleteImage { name } => {
                    print!("Are you sure you want to delete {}? [y/N] ", name);
                    std::io::stdout().flush()?;
                    let answer = match lines.next().await {
                        Some(line) => line?,
                        None => return Ok(()),
                    };
                    if !matches!(answer.trim(), "y" | "Y" | "yes") {
                        return Ok(());
                    }

                    match self.client.delete(&name).await {
                        Ok(_) => {
                            println!("Image deleted successfully");
                            self.gallery.dispatch(Action::Deleted(name))
                        },
                        Err(err) => Effect::Notice(err.to_string()),
                    }
                },
            };
        }
    }
}

async fn browse(args: BrowseArgs) -> Result<(), Error> {
    let config_path = default_path()?;
    let config = match ClientConfig::load(&config_path)? {
        Some(config) => config,
        None => {
            println!("No repository configured yet.");
            setup(&config_path, ConfigureArgs {
                owner: None,
                repo: None,
                branch: None,
            })?
        },
    };
    println!("Repository: {}", config.repo_tree_url());

    let (sender, receiver) = channel::unbounded();
    let mut browser = Browser {
        client: ApiClient::new(&args.api_arguments.endpoint),
        config,
        gallery: Gallery::new(),
        dimensions: sender,
    };
    let mut lines = Box::pin(BufReader::new(async_std::io::stdin()).lines());

    let effect = browser.gallery.dispatch(Action::Refresh);
    browser.perform(effect, &mut lines).await?;

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let event = futures_lite::future::or(
            async { Event::Line(lines.next().await) },
            async { Event::Dimensions(receiver.recv().await.ok()) },
        )
        .await;

        let action = match event {
            Event::Line(None) => return Ok(()),
            Event::Line(Some(line)) => match Input::parse(&line?) {
                Ok(Input::Action(action)) => action,
                Ok(Input::List) => {
                    browser.show();
                    continue;
                },
                Ok(Input::Help) => {
                    println!("{}", HELP);
                    continue;
                },
                Ok(Input::Quit) => return Ok(()),
                Err(message) => {
                    println!("{}", message);
                    continue;
                },
            },
            Event::Dimensions(None) => continue,
            Event::Dimensions(Some((url, Ok((width, height))))) => {
                Action::DimensionsLoaded { url, width, height }
            },
            Event::Dimensions(Some((url, Err(err)))) => {
                log::warn!("could not read dimensions of {}: {}", url, err);
                continue;
            },
        };

        let redraw = match &action {
            Action::Search(_) | Action::Close => true,
            Action::DimensionsLoaded { url, .. } => browser
                .gallery
                .selected
                .as_ref()
                .map_or(false, |selected| &selected.image.url == url),
            _ => false,
        };
        let effect = browser.gallery.dispatch(action);
        browser.perform(effect, &mut lines).await?;
        if redraw {
            println!();
            browser.show();
        }
    }
}

async fn run(command: Command) -> Result<(), Error> {
    match command {
        Command::Configure(args) => {
            let config = setup(&default_path()?, args)?;
            println!("{}", config.repo_tree_url());
            Ok(())
        },
        Command::ClearConfig => {
            ClientConfig::clear(&default_path()?)?;
            println!("Configuration cleared.");
            Ok(())
        },
        Command::Upload(args) => upload(args).await,
        Command::List(args) => list(args).await,
        Command::Delete(args) => delete(args).await,
        Command::Copy(args) => copy(args).await,
        Command::Browse(args) => browse(args).await,
    }
}

#[async_std::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::init();

    if let Err(err) = run(Command::from_args()).await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}
