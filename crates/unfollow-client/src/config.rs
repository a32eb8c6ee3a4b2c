//! Credentials and API settings, read from a JSON file.
//!
//! ```json
//! {
//!   "bearer_token": "AAAA...",
//!   "screen_name": "someone",
//!   "api_base_url": "https://api.twitter.com/",
//!   "batch_size": 100
//! }
//! ```
//!
//! `bearer_token` and `screen_name` are required. An app-only token has no
//! account of its own, so the tracked account is always named.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use snafu::{OptionExt as _, ResultExt as _, Snafu, ensure};
use url::Url;

use crate::resolver::DEFAULT_BATCH_SIZE;

pub const DEFAULT_API_BASE_URL: &str = "https://api.twitter.com/";

#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display("Failed to read config file {}", path.display()))]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Malformed config file"))]
    Parse { source: serde_json::Error },
    #[snafu(display("`bearer_token` is missing or empty"))]
    MissingToken,
    #[snafu(display("`screen_name` is missing or empty"))]
    MissingScreenName,
    #[snafu(display("Invalid `api_base_url`"))]
    InvalidBaseUrl { source: url::ParseError },
    #[snafu(display("`batch_size` must be between 1 and {max}, got {got}"))]
    InvalidBatchSize { got: usize, max: usize },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[derive(Deserialize)]
struct RawConfig {
    bearer_token: Option<String>,
    screen_name: Option<String>,
    api_base_url: Option<String>,
    batch_size: Option<usize>,
}

#[derive(Clone)]
pub struct ClientConfig {
    pub bearer_token: String,
    /// Account whose followers are tracked
    pub screen_name: String,
    /// Always ends with `/`
    pub api_base_url: Url,
    pub batch_size: usize,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("bearer_token", &"<redacted>")
            .field("screen_name", &self.screen_name)
            .field("api_base_url", &self.api_base_url.as_str())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl ClientConfig {
    pub async fn load(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .context(IoSnafu { path })?;
        Self::from_json(&content)
    }

    pub fn from_json(s: &str) -> ConfigResult<Self> {
        let raw: RawConfig = serde_json::from_str(s).context(ParseSnafu)?;

        let bearer_token = raw
            .bearer_token
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty())
            .context(MissingTokenSnafu)?;

        let screen_name = raw
            .screen_name
            .map(|s| s.trim().trim_start_matches('@').to_owned())
            .filter(|s| !s.is_empty())
            .context(MissingScreenNameSnafu)?;

        let mut api_base_url = raw
            .api_base_url
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_owned());
        if !api_base_url.ends_with('/') {
            api_base_url.push('/');
        }
        let api_base_url = Url::parse(&api_base_url).context(InvalidBaseUrlSnafu)?;

        let batch_size = raw.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
        ensure!(
            (1..=DEFAULT_BATCH_SIZE).contains(&batch_size),
            InvalidBatchSizeSnafu {
                got: batch_size,
                max: DEFAULT_BATCH_SIZE
            }
        );

        Ok(Self {
            bearer_token,
            screen_name,
            api_base_url,
            batch_size,
        })
    }
}
