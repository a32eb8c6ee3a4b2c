use std::collections::BTreeMap;

use redb::{ReadableTable as _, ReadableTableMetadata as _};
use snafu::{ResultExt as _, Snafu};
use tracing::{debug, warn};
use unfollow_core::{Descriptor, Identity};
use unfollow_util_error::FmtCompact as _;

use crate::{Bucket, Database, DbResult, LOG_TARGET, RecordEncodeSnafu};

/// A stored record that could not be decoded.
///
/// Never returned to callers: the record is logged and skipped.
#[derive(Debug, Snafu)]
#[snafu(display("Corrupt record for {id} in {bucket}"))]
pub struct RecordDecodeError {
    pub bucket: Bucket,
    pub id: Identity,
    source: serde_json::Error,
}

impl Database {
    /// Opens `bucket` for reading, `None` if it was never written.
    fn open_bucket_read_tx(
        tx: &redb::ReadTransaction,
        bucket: Bucket,
    ) -> DbResult<Option<redb::ReadOnlyTable<u64, &'static [u8]>>> {
        match tx.open_table(bucket.table()) {
            Ok(table) => Ok(Some(table)),
            Err(redb::TableError::TableDoesNotExist(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn read_bucket_tx(
        tx: &redb::ReadTransaction,
        bucket: Bucket,
    ) -> DbResult<BTreeMap<Identity, Descriptor>> {
        let mut ret = BTreeMap::new();

        let Some(table) = Self::open_bucket_read_tx(tx, bucket)? else {
            return Ok(ret);
        };

        for record in table.iter()? {
            let (k, v) = record?;
            let id = Identity::from(k.value());

            match serde_json::from_slice::<Descriptor>(v.value())
                .context(RecordDecodeSnafu { bucket, id })
            {
                Ok(desc) => {
                    ret.insert(id, desc);
                }
                Err(err) => {
                    warn!(target: LOG_TARGET, err = %err.fmt_compact(), "Skipping record");
                }
            }
        }

        Ok(ret)
    }

    /// Ids of every record in `bucket`, including ones that fail to decode.
    pub fn read_bucket_ids_tx(
        tx: &redb::ReadTransaction,
        bucket: Bucket,
    ) -> DbResult<Vec<Identity>> {
        let Some(table) = Self::open_bucket_read_tx(tx, bucket)? else {
            return Ok(vec![]);
        };

        let mut ret = vec![];
        for record in table.iter()? {
            let (k, _) = record?;
            ret.push(Identity::from(k.value()));
        }

        Ok(ret)
    }

    pub fn upsert_bucket_tx(
        tx: &redb::WriteTransaction,
        bucket: Bucket,
        encoded: &[(Identity, Vec<u8>)],
    ) -> DbResult<()> {
        let mut table = tx.open_table(bucket.table())?;

        for (id, value) in encoded {
            table.insert(id.as_u64(), value.as_slice())?;
        }

        Ok(())
    }

    pub fn delete_from_bucket_tx(
        tx: &redb::WriteTransaction,
        bucket: Bucket,
        ids: &[Identity],
    ) -> DbResult<usize> {
        let mut table = tx.open_table(bucket.table())?;

        let mut removed = 0;
        for id in ids {
            if table.remove(id.as_u64())?.is_some() {
                removed += 1;
            }
        }

        Ok(removed)
    }

    /// Every decodable record of `bucket`, in ascending id order.
    ///
    /// A bucket that was never written reads as empty.
    pub async fn read_bucket(&self, bucket: Bucket) -> DbResult<BTreeMap<Identity, Descriptor>> {
        self.read_with(|tx| Self::read_bucket_tx(tx, bucket)).await
    }

    /// Every id stored in `bucket`, ascending, whether its record decodes
    /// or not.
    pub async fn read_bucket_ids(&self, bucket: Bucket) -> DbResult<Vec<Identity>> {
        self.read_with(|tx| Self::read_bucket_ids_tx(tx, bucket)).await
    }

    /// Replace the records for all `entries` in a single transaction.
    ///
    /// Entries that fail to encode are logged and left out. Returns the
    /// number of records written.
    pub async fn upsert_bucket(
        &self,
        bucket: Bucket,
        entries: &BTreeMap<Identity, Descriptor>,
    ) -> DbResult<usize> {
        let encoded: Vec<_> = entries
            .iter()
            .filter_map(|(id, desc)| {
                serde_json::to_vec(desc)
                    .context(RecordEncodeSnafu { id: *id })
                    .inspect_err(|err| {
                        warn!(target: LOG_TARGET, %bucket, err = %err.fmt_compact(), "Skipping record");
                    })
                    .ok()
                    .map(|value| (*id, value))
            })
            .collect();

        self.write_with(|tx| Self::upsert_bucket_tx(tx, bucket, &encoded))
            .await?;

        debug!(target: LOG_TARGET, %bucket, count = encoded.len(), "Upserted records");
        Ok(encoded.len())
    }

    /// Remove `ids` from `bucket` in a single transaction.
    ///
    /// Missing ids are ignored. Returns how many were actually removed.
    pub async fn delete_from_bucket(&self, bucket: Bucket, ids: &[Identity]) -> DbResult<usize> {
        let removed = self
            .write_with(|tx| Self::delete_from_bucket_tx(tx, bucket, ids))
            .await?;

        debug!(target: LOG_TARGET, %bucket, requested = ids.len(), removed, "Deleted records");
        Ok(removed)
    }

    /// Number of records stored in `bucket`, decodable or not.
    pub async fn bucket_len(&self, bucket: Bucket) -> DbResult<u64> {
        self.read_with(|tx| {
            Ok(match Self::open_bucket_read_tx(tx, bucket)? {
                Some(table) => table.len()?,
                None => 0,
            })
        })
        .await
    }
}
