use std::collections::BTreeMap;

use snafu::{ResultExt as _, Snafu};
use tracing::debug;
use unfollow_core::{Descriptor, Identity};

use crate::{ApiError, AttributeSource, BatchError, LOG_TARGET, LookupBatch};

/// Largest batch the users lookup endpoint accepts.
pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Snafu)]
pub enum AttributeFetchError {
    #[snafu(display("Attribute lookup failed for a batch of {} ids", ids.len()))]
    Lookup {
        /// Ids of the batch that failed
        ids: Vec<Identity>,
        source: ApiError,
    },
    #[snafu(display("Invalid lookup batch"))]
    Batch { source: BatchError },
}

pub type AttributeFetchResult<T> = std::result::Result<T, AttributeFetchError>;

/// Resolves display attributes for any number of ids, one batch at a time.
pub struct AttributeResolver<'s> {
    source: &'s (dyn AttributeSource + Send + Sync),
    batch_size: usize,
}

impl<'s> AttributeResolver<'s> {
    /// `batch_size` is capped at what `source` accepts.
    pub fn new(source: &'s (dyn AttributeSource + Send + Sync), batch_size: usize) -> Self {
        let batch_size = batch_size.clamp(1, source.max_batch_size().max(1));
        Self { source, batch_size }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Look up every id in `ids`.
    ///
    /// Descriptors come back without `first_seen`/`last_seen`. Fails as a
    /// whole if any batch fails.
    pub async fn resolve(
        &self,
        ids: &[Identity],
    ) -> AttributeFetchResult<BTreeMap<Identity, Descriptor>> {
        let mut ret = BTreeMap::new();

        for (i, chunk) in ids.chunks(self.batch_size).enumerate() {
            let batch = LookupBatch::new(chunk.to_vec(), self.batch_size).context(BatchSnafu)?;

            let users = self
                .source
                .lookup_batch(&batch)
                .await
                .context(LookupSnafu { ids: chunk })?;

            debug!(
                target: LOG_TARGET,
                batch = i,
                requested = batch.len(),
                returned = users.len(),
                "Resolved batch"
            );

            ret.extend(users.into_iter().map(|user| user.into_descriptor()));
        }

        Ok(ret)
    }
}
