use time::OffsetDateTime;

/// Largest accepted image, in bytes.
pub const MAX_UPLOAD_SIZE: u64 = 15 * 1024 * 1024;

/// File extensions recognized as images, compared case-insensitively.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

pub fn has_image_extension(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((_, ext)) => IMAGE_EXTENSIONS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(known)),
        None => false,
    }
}

#[derive(Debug, Default, serde::Deserialize, serde::Serialize)]
pub struct UploadPayload {
    pub filename: Option<String>,
    /// Base64-encoded file bytes.
    pub content: Option<String>,
    pub size: Option<u64>,
}

#[derive(Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub url: String,
    pub filename: String,
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ImageRecord {
    pub name: String,
    pub url: String,
    pub size: u64,
    /// Time of the most recent commit touching the file, if known.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
    #[serde(rename = "versionMarker")]
    pub version_marker: String,
}

impl ImageRecord {
    /// Case-insensitive substring match on the file name. An empty query
    /// matches everything.
    pub fn matches(&self, query: &str) -> bool {
        self.name.to_lowercase().contains(&query.to_lowercase())
    }
}

/// Ways of sharing an image's address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CopyFormat {
    Direct,
    Markdown,
    Html,
}

impl CopyFormat {
    pub const ALL: [CopyFormat; 3] = [CopyFormat::Direct, CopyFormat::Markdown, CopyFormat::Html];

    pub fn name(self) -> &'static str {
        match self {
            CopyFormat::Direct => "direct",
            CopyFormat::Markdown => "markdown",
            CopyFormat::Html => "html",
        }
    }

    pub fn render(self, image: &ImageRecord) -> String {
        match self {
            CopyFormat::Direct => image.url.clone(),
            CopyFormat::Markdown => format!("![{}]({})", image.name, image.url),
            CopyFormat::Html => format!("<img src=\"{}\" alt=\"{}\">", image.url, image.name),
        }
    }

    /// Message shown once the snippet is on the clipboard.
    pub fn confirmation(self) -> &'static str {
        match self {
            CopyFormat::Direct => "Direct link copied!",
            CopyFormat::Markdown => "Markdown copied!",
            CopyFormat::Html => "HTML copied!",
        }
    }
}

impl std::str::FromStr for CopyFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CopyFormat::ALL
            .iter()
            .copied()
            .find(|format| format.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown copy format {:?}, expected direct, markdown or html", s))
    }
}

#[derive(Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ImageList {
    pub images: Vec<ImageRecord>,
}

#[derive(Debug, Default, serde::Deserialize, serde::Serialize)]
pub struct DeletePayload {
    pub filename: Option<String>,
}

#[derive(Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ErrorBody {
    pub error: String,
}
