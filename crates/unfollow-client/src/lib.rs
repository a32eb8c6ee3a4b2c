pub mod batch;
pub mod config;
pub mod resolver;
pub mod twitter;

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use snafu::Snafu;
use unfollow_core::{Descriptor, Identity};

pub use self::batch::{BatchError, LookupBatch};
pub use self::config::{ClientConfig, ConfigError};
pub use self::resolver::{AttributeFetchError, AttributeResolver};
pub use self::twitter::TwitterClient;

pub const LOG_TARGET: &str = "unfollow::client";

/// A single failed API request.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ApiError {
    #[snafu(display("Invalid request URL"))]
    Url { source: url::ParseError },
    #[snafu(display("HTTP request failed"))]
    Http { source: reqwest::Error },
    #[snafu(display("Unexpected status {status}: {body}"))]
    Status { status: u16, body: String },
    #[snafu(display("Malformed response"))]
    Decode { source: serde_json::Error },
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Enumerating the follower set failed.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum FetchError {
    #[snafu(display("Follower page {page} request failed"))]
    Page { page: u32, source: ApiError },
    #[snafu(display("Could not write audit dump {}", path.display()))]
    AuditDump { path: PathBuf, source: io::Error },
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Display attributes of one account, as returned by the lookup API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserAttributes {
    pub id: Identity,
    pub name: String,
    pub screen_name: String,
}

impl UserAttributes {
    pub fn into_descriptor(self) -> (Identity, Descriptor) {
        (self.id, Descriptor::new(self.name, self.screen_name))
    }
}

/// Source of the complete current follower set.
#[async_trait]
pub trait FollowerSource {
    /// All follower ids, across every page.
    async fn get_all_followers(&self) -> FetchResult<Vec<Identity>>;
}

/// Source of display attributes for follower ids.
#[async_trait]
pub trait AttributeSource {
    /// Most ids a single [`AttributeSource::lookup_batch`] call accepts.
    fn max_batch_size(&self) -> usize;

    /// Ids the remote side does not know (e.g. suspended accounts) are
    /// simply missing from the result.
    async fn lookup_batch(&self, batch: &LookupBatch) -> ApiResult<Vec<UserAttributes>>;
}
