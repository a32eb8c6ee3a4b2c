use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use snafu::{ResultExt as _, Snafu};
use tracing::{debug, info, instrument, warn};
use unfollow_client::{AttributeFetchError, AttributeResolver, FetchError, FollowerSource};
use unfollow_core::{Descriptor, Identity, SnapshotDiff, Timestamp, diff};
use unfollow_db::{Bucket, Database, DbError};

pub const LOG_TARGET: &str = "unfollow::tracker";

#[derive(Debug, Snafu)]
pub enum RunError {
    #[snafu(display("Failed to get current followers"))]
    Fetch { source: FetchError },
    #[snafu(display("Failed to describe current followers"))]
    Resolve { source: AttributeFetchError },
    #[snafu(display("Database error"))]
    Database { source: DbError },
}

pub type RunResult<T> = std::result::Result<T, RunError>;

/// Outcome of a single reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub timestamp: Timestamp,
    /// Started following since the last run, as just described
    pub newcomers: BTreeMap<Identity, Descriptor>,
    /// Stopped following since the last run, as last seen
    pub departed: BTreeMap<Identity, Descriptor>,
    /// Newcomers that had been in the graveyard
    pub returning: Vec<Identity>,
    /// Newcomers the attribute lookup had nothing for; not stored
    pub unresolved: Vec<Identity>,
    /// Current follower count minus the previous one
    pub delta: i64,
}

/// Reconciles the stored follower state with the remote one.
pub struct Tracker<'a> {
    db: &'a Database,
    followers: &'a (dyn FollowerSource + Send + Sync),
    resolver: AttributeResolver<'a>,
}

impl<'a> Tracker<'a> {
    pub fn new(
        db: &'a Database,
        followers: &'a (dyn FollowerSource + Send + Sync),
        resolver: AttributeResolver<'a>,
    ) -> Self {
        Self {
            db,
            followers,
            resolver,
        }
    }

    /// Run one reconciliation, stamping everything seen with `now`.
    ///
    /// Nothing is written unless both the follower fetch and the attribute
    /// lookup succeed. The writes themselves are separate transactions.
    #[instrument(skip_all, fields(now = %now))]
    pub async fn run(&self, now: Timestamp) -> RunResult<RunReport> {
        let mut current = self
            .followers
            .get_all_followers()
            .await
            .context(FetchSnafu)?;
        current.sort_unstable();
        current.dedup();

        // Undecodable records still count as members, so they can depart
        let previous_ids = self
            .db
            .read_bucket_ids(Bucket::Active)
            .await
            .context(DatabaseSnafu)?;
        let previous = self
            .db
            .read_bucket(Bucket::Active)
            .await
            .context(DatabaseSnafu)?;
        let graveyard: BTreeSet<Identity> = self
            .db
            .read_bucket_ids(Bucket::Graveyard)
            .await
            .context(DatabaseSnafu)?
            .into_iter()
            .collect();

        let SnapshotDiff {
            newcomers,
            departed,
        } = diff(current.iter().copied(), previous_ids.iter().copied());
        info!(
            target: LOG_TARGET,
            current = current.len(),
            previous = previous_ids.len(),
            newcomers = newcomers.len(),
            departed = departed.len(),
            "Computed follower diff"
        );

        let mut resolved = self.resolver.resolve(&current).await.context(ResolveSnafu)?;
        if resolved.len() < current.len() {
            warn!(
                target: LOG_TARGET,
                missing = current.len() - resolved.len(),
                "Some followers could not be described"
            );
        }

        for (id, desc) in &mut resolved {
            desc.stamp(now, previous.get(id));
        }

        let mut report = RunReport {
            timestamp: now,
            newcomers: BTreeMap::new(),
            departed: BTreeMap::new(),
            returning: vec![],
            unresolved: vec![],
            delta: len_i64(current.len()) - len_i64(previous_ids.len()),
        };

        for id in &newcomers {
            match resolved.get(id) {
                Some(desc) => {
                    debug!(target: LOG_TARGET, %id, handle = %desc.handle, "Newcomer");
                    report.newcomers.insert(*id, desc.clone());
                    if graveyard.contains(id) {
                        report.returning.push(*id);
                    }
                }
                None => report.unresolved.push(*id),
            }
        }

        for id in &departed {
            match previous.get(id) {
                Some(desc) => {
                    debug!(target: LOG_TARGET, %id, handle = %desc.handle, "Departed");
                    report.departed.insert(*id, desc.clone());
                }
                None => {
                    warn!(target: LOG_TARGET, %id, "Departed with an undecodable record, dropping it");
                }
            }
        }

        // Current members must not linger in the graveyard
        let exhumed: Vec<Identity> = resolved
            .keys()
            .filter(|id| graveyard.contains(id))
            .copied()
            .collect();

        self.persist(&resolved, &departed, &exhumed, &report).await?;

        Ok(report)
    }

    /// Departed are buried before they leave `active`, so an interrupted
    /// run leaves them in both buckets, which the next run repairs.
    async fn persist(
        &self,
        resolved: &BTreeMap<Identity, Descriptor>,
        departed: &[Identity],
        exhumed: &[Identity],
        report: &RunReport,
    ) -> RunResult<()> {
        self.db
            .upsert_bucket(Bucket::Active, resolved)
            .await
            .context(DatabaseSnafu)?;
        self.db
            .upsert_bucket(Bucket::Graveyard, &report.departed)
            .await
            .context(DatabaseSnafu)?;
        self.db
            .delete_from_bucket(Bucket::Active, departed)
            .await
            .context(DatabaseSnafu)?;
        self.db
            .delete_from_bucket(Bucket::Graveyard, exhumed)
            .await
            .context(DatabaseSnafu)?;

        info!(
            target: LOG_TARGET,
            active = resolved.len(),
            buried = report.departed.len(),
            exhumed = exhumed.len(),
            "Stored follower state"
        );
        Ok(())
    }
}

fn len_i64(len: usize) -> i64 {
    i64::try_from(len).unwrap_or(i64::MAX)
}
