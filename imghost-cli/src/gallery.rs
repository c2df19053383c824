use imghost_api_structs::{CopyFormat, ImageRecord};

#[derive(Clone, Debug, PartialEq)]
pub enum Phase {
    Idle,
    Loading,
    Displaying,
    Error(String),
}

/// Image shown in the detail view.
#[derive(Clone, Debug, PartialEq)]
pub struct Selected {
    pub image: ImageRecord,
    pub dimensions: Option<(u32, u32)>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Target {
    /// 1-based position in the visible list.
    Index(usize),
    Name(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    Refresh,
    Loaded(Vec<ImageRecord>),
    LoadFailed(String),
    Search(String),
    Open(Target),
    DimensionsLoaded { url: String, width: u32, height: u32 },
    Close,
    Copy(CopyFormat),
    Delete,
    Deleted(String),
}

/// A line typed at the browse prompt.
#[derive(Clone, Debug, PartialEq)]
pub enum Input {
    Action(Action),
    List,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  search <text>                  filter by name (empty clears)
  refresh                        reload the image list
  open <number|name>             show an image
  close                          leave the detail view
  copy <direct|markdown|html>    copy the open image's address
  delete                         delete the open image
  list                           show the gallery
  quit";

impl Input {
    pub fn parse(line: &str) -> Result<Input, String> {
        let line = line.trim();
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        let action = match command {
            "search" | "s" => Action::Search(rest.to_string()),
            "refresh" | "r" => Action::Refresh,
            "open" | "o" if rest.is_empty() => return Err("open needs a number or name".to_string()),
            "open" | "o" => match rest.parse::<usize>() {
                Ok(index) => Action::Open(Target::Index(index)),
                Err(_) => Action::Open(Target::Name(rest.to_string())),
            },
            "close" | "c" => Action::Close,
            "copy" | "y" => Action::Copy(rest.parse()?),
            "delete" | "d" => Action::Delete,
            "list" | "l" | "" => return Ok(Input::List),
            "help" | "?" => return Ok(Input::Help),
            "quit" | "q" | "exit" => return Ok(Input::Quit),
            other => return Err(format!("unknown command {:?}, try help", other)),
        };
        Ok(Input::Action(action))
    }
}

/// Work the controller performs after a transition.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    None,
    FetchImages,
    LoadDimensions { url: String },
    CopyText { text: String, label: &'static str },
    DeleteImage { name: String },
    Notice(String),
}

#[derive(Debug)]
pub struct Gallery {
    pub phase: Phase,
    images: Vec<ImageRecord>,
    query: String,
    pub selected: Option<Selected>,
}

impl Default for Gallery {
    fn default() -> Self {
        Gallery {
            phase: Phase::Idle,
            images: Vec::new(),
            query: String::new(),
            selected: None,
        }
    }
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn total(&self) -> usize {
        self.images.len()
    }

    /// Cached images matching the current search, in server order.
    pub fn visible(&self) -> Vec<&ImageRecord> {
        self.images
            .iter()
            .filter(|image| image.matches(&self.query))
            .collect()
    }

    pub fn dispatch(&mut self, action: Action) -> Effect {
        match action {
            Action::Refresh => {
                self.phase = Phase::Loading;
                Effect::FetchImages
            },
            Action::Loaded(images) => {
                self.images = images;
                self.phase = Phase::Displaying;
                Effect::None
            },
            Action::LoadFailed(message) => {
                self.phase = Phase::Error(message);
                Effect::None
            },
            Action::Search(query) => {
                self.query = query.trim().to_string();
                Effect::None
            },
            Action::Open(target) => self.open(target),
            Action::DimensionsLoaded { url, width, height } => {
                if let Some(selected) = self.selected.as_mut() {
                    // Results for an image that was closed in the meantime are dropped.
                    if selected.image.url == url {
                        selected.dimensions = Some((width, height));
                    }
                }
                Effect::None
            },
            Action::Close => {
                self.selected = None;
                Effect::None
            },
            Action::Copy(format) => match &self.selected {
                Some(selected) => Effect::CopyText {
                    text: format.render(&selected.image),
                    label: format.confirmation(),
                },
                None => Effect::Notice("Open an image first".to_string()),
            },
            Action::Delete => match &self.selected {
                Some(selected) => Effect::DeleteImage {
                    name: selected.image.name.clone(),
                },
                None => Effect::Notice("Open an image first".to_string()),
            },
            Action::Deleted(name) => {
                self.images.retain(|image| image.name != name);
                self.selected = None;
                self.phase = Phase::Loading;
                Effect::FetchImages
            },
        }
    }

    fn open(&mut self, target: Target) -> Effect {
        if self.phase != Phase::Displaying {
            return Effect::Notice("The gallery is not loaded".to_string());
        }

        let image = match &target {
            Target::Index(index) => index
                .checked_sub(1)
                .and_then(|index| self.visible().get(index).copied()),
            Target::Name(name) => self.images.iter().find(|image| &image.name == name),
        };
        let image = match image {
            Some(image) => image.clone(),
            None => {
                return Effect::Notice(match target {
                    Target::Index(index) => format!("No image number {}", index),
                    Target::Name(name) => format!("No image named {}", name),
                })
            },
        };

        let url = image.url.clone();
        self.selected = Some(Selected {
            image,
            dimensions: None,
        });
        Effect::LoadDimensions { url }
    }
}
