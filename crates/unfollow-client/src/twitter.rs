use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use snafu::{ResultExt as _, ensure};
use tracing::{debug, info};
use unfollow_core::{Identity, Timestamp};
use url::Url;

use crate::{
    ApiResult, AttributeSource, AuditDumpSnafu, ClientConfig, DecodeSnafu, FetchResult,
    FollowerSource, HttpSnafu, LOG_TARGET, LookupBatch, PageSnafu, StatusSnafu, UrlSnafu,
    UserAttributes,
};

const FOLLOWERS_IDS_PATH: &str = "1.1/followers/ids.json";
const USERS_LOOKUP_PATH: &str = "1.1/users/lookup.json";

/// Ids the followers endpoint returns per page, at most.
const FOLLOWERS_PAGE_SIZE: u32 = 5000;
/// Ids the users lookup endpoint accepts per request, at most.
pub const USERS_LOOKUP_MAX_IDS: usize = 100;

/// Cursor value requesting the first page.
const FIRST_CURSOR: i64 = -1;

#[derive(Debug, Deserialize)]
struct FollowerIdsPage {
    ids: Vec<Identity>,
    next_cursor: i64,
}

/// REST client for the followers and users lookup endpoints.
pub struct TwitterClient {
    http: reqwest::Client,
    base_url: Url,
    bearer_token: String,
    screen_name: String,
    /// Where to keep a copy of every raw follower page, if anywhere
    audit_dir: Option<PathBuf>,
}

#[bon::bon]
impl TwitterClient {
    #[builder(finish_fn(name = "build"))]
    pub fn new(
        #[builder(start_fn)] config: ClientConfig,
        audit_dir: Option<PathBuf>,
    ) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("unfollow/", env!("CARGO_PKG_VERSION")))
            .build()
            .context(HttpSnafu)?;

        Ok(Self {
            http,
            base_url: config.api_base_url,
            bearer_token: config.bearer_token,
            screen_name: config.screen_name,
            audit_dir,
        })
    }
}

impl TwitterClient {
    /// GET `path` with `query`, returning the status and raw body.
    async fn get_raw(&self, path: &str, query: &[(&str, String)]) -> ApiResult<(u16, Vec<u8>)> {
        let url = self.base_url.join(path).context(UrlSnafu)?;

        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.bearer_token)
            .query(query)
            .send()
            .await
            .context(HttpSnafu)?;

        let status = resp.status().as_u16();
        let body = resp.bytes().await.context(HttpSnafu)?.to_vec();

        Ok((status, body))
    }

    fn ensure_success(status: u16, body: &[u8]) -> ApiResult<()> {
        ensure!(
            (200..300).contains(&status),
            StatusSnafu {
                status,
                body: String::from_utf8_lossy(body).into_owned(),
            }
        );
        Ok(())
    }

    async fn get_followers_page(
        &self,
        cursor: i64,
        page: u32,
        run_ts: Timestamp,
    ) -> FetchResult<FollowerIdsPage> {
        let query = [
            ("screen_name", self.screen_name.clone()),
            ("cursor", cursor.to_string()),
            ("count", FOLLOWERS_PAGE_SIZE.to_string()),
        ];

        let (status, body) = self
            .get_raw(FOLLOWERS_IDS_PATH, &query)
            .await
            .context(PageSnafu { page })?;

        if let Some(dir) = &self.audit_dir {
            let path = dir.join(format!("followers-{}-{page:03}.json", run_ts.as_secs()));
            tokio::fs::create_dir_all(dir)
                .await
                .context(AuditDumpSnafu { path: &path })?;
            tokio::fs::write(&path, &body)
                .await
                .context(AuditDumpSnafu { path: &path })?;
            debug!(target: LOG_TARGET, path = %path.display(), "Wrote audit dump");
        }

        Self::ensure_success(status, &body).context(PageSnafu { page })?;

        serde_json::from_slice(&body)
            .context(DecodeSnafu)
            .context(PageSnafu { page })
    }
}

#[async_trait]
impl FollowerSource for TwitterClient {
    async fn get_all_followers(&self) -> FetchResult<Vec<Identity>> {
        let run_ts = Timestamp::now();
        let mut ret = Vec::with_capacity(FOLLOWERS_PAGE_SIZE as usize);

        let mut cursor = FIRST_CURSOR;
        let mut page = 0;
        loop {
            let resp = self.get_followers_page(cursor, page, run_ts).await?;

            debug!(target: LOG_TARGET, page, count = resp.ids.len(), next_cursor = resp.next_cursor, "Fetched follower page");
            ret.extend(resp.ids);

            if resp.next_cursor == 0 {
                break;
            }
            cursor = resp.next_cursor;
            page += 1;
        }

        info!(target: LOG_TARGET, pages = page + 1, count = ret.len(), "Fetched all followers");
        Ok(ret)
    }
}

#[async_trait]
impl AttributeSource for TwitterClient {
    fn max_batch_size(&self) -> usize {
        USERS_LOOKUP_MAX_IDS
    }

    async fn lookup_batch(&self, batch: &LookupBatch) -> ApiResult<Vec<UserAttributes>> {
        let (status, body) = self
            .get_raw(USERS_LOOKUP_PATH, &[("user_id", batch.query_value())])
            .await?;

        // Returned when none of the ids can be described
        if status == 404 {
            debug!(target: LOG_TARGET, count = batch.len(), "No user in batch could be described");
            return Ok(vec![]);
        }
        Self::ensure_success(status, &body)?;

        serde_json::from_slice(&body).context(DecodeSnafu)
    }
}
