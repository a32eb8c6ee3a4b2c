use std::collections::BTreeMap;

use snafu::ResultExt as _;
use tempfile::{TempDir, tempdir};
use unfollow_core::{Descriptor, Identity, Timestamp};
use unfollow_util_error::BoxedErrorResult;

use crate::{Bucket, Database, RecordEncodeSnafu};

async fn temp_db() -> BoxedErrorResult<(TempDir, Database)> {
    let dir = tempdir()?;
    let db = Database::open(dir.path().join("db.redb")).await.boxed()?;

    Ok((dir, db))
}

fn stamped(name: &str, first_seen: u64, last_seen: u64) -> Descriptor {
    Descriptor {
        display_name: name.to_owned(),
        handle: name.to_lowercase(),
        first_seen: Some(Timestamp::from(first_seen)),
        last_seen: Some(Timestamp::from(last_seen)),
    }
}

fn entries(raw: &[(u64, &str)]) -> BTreeMap<Identity, Descriptor> {
    raw.iter()
        .map(|(id, name)| (Identity::from(*id), stamped(name, 100, 200)))
        .collect()
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn test_read_missing_bucket_is_empty() -> BoxedErrorResult<()> {
    let (_dir, db) = temp_db().await?;

    for bucket in Bucket::ALL {
        assert!(db.read_bucket(bucket).await?.is_empty());
        assert!(db.read_bucket_ids(bucket).await?.is_empty());
        assert_eq!(db.bucket_len(bucket).await?, 0);
    }

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn test_upsert_then_read_round_trips() -> BoxedErrorResult<()> {
    let (_dir, db) = temp_db().await?;

    let mut written = entries(&[(3, "Carol"), (1, "Alice"), (2, "Bob")]);
    written.insert(
        Identity::from(u64::MAX),
        Descriptor {
            display_name: "Ünïcødé \"quoted\" name".into(),
            handle: "max".into(),
            first_seen: None,
            last_seen: Some(Timestamp::from(7)),
        },
    );

    assert_eq!(db.upsert_bucket(Bucket::Active, &written).await?, 4);

    let read = db.read_bucket(Bucket::Active).await?;
    assert_eq!(read, written);
    assert_eq!(
        read.keys().copied().map(u64::from).collect::<Vec<_>>(),
        vec![1, 2, 3, u64::MAX]
    );

    // other bucket untouched
    assert!(db.read_bucket(Bucket::Graveyard).await?.is_empty());

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn test_upsert_replaces_existing() -> BoxedErrorResult<()> {
    let (_dir, db) = temp_db().await?;

    db.upsert_bucket(Bucket::Active, &entries(&[(1, "Alice"), (2, "Bob")]))
        .await?;

    let mut update = BTreeMap::new();
    update.insert(Identity::from(2), stamped("Robert", 100, 300));
    db.upsert_bucket(Bucket::Active, &update).await?;

    let read = db.read_bucket(Bucket::Active).await?;
    assert_eq!(read.len(), 2);
    assert_eq!(read[&Identity::from(1)].display_name, "Alice");
    assert_eq!(read[&Identity::from(2)], stamped("Robert", 100, 300));

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn test_delete_ignores_missing_keys() -> BoxedErrorResult<()> {
    let (_dir, db) = temp_db().await?;

    // deleting from a bucket that was never written is fine
    assert_eq!(
        db.delete_from_bucket(Bucket::Graveyard, &[Identity::from(1)])
            .await?,
        0
    );

    db.upsert_bucket(
        Bucket::Active,
        &entries(&[(1, "Alice"), (2, "Bob"), (3, "Carol")]),
    )
    .await?;

    let removed = db
        .delete_from_bucket(
            Bucket::Active,
            &[Identity::from(1), Identity::from(3), Identity::from(42)],
        )
        .await?;
    assert_eq!(removed, 2);

    let read = db.read_bucket(Bucket::Active).await?;
    assert_eq!(read.keys().copied().collect::<Vec<_>>(), vec![Identity::from(2)]);

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn test_corrupt_record_is_skipped() -> BoxedErrorResult<()> {
    let (_dir, db) = temp_db().await?;

    db.upsert_bucket(
        Bucket::Active,
        &entries(&[(1, "Alice"), (2, "Bob"), (4, "Dave")]),
    )
    .await?;

    db.write_with(|tx| {
        let mut table = tx.open_table(Bucket::Active.table())?;
        table.insert(3u64, b"{not json".as_slice())?;
        Ok(())
    })
    .await?;

    assert_eq!(db.bucket_len(Bucket::Active).await?, 4);

    let read = db.read_bucket(Bucket::Active).await?;
    assert_eq!(
        read.keys().copied().map(u64::from).collect::<Vec<_>>(),
        vec![1, 2, 4]
    );
    assert_eq!(
        db.read_bucket_ids(Bucket::Active)
            .await?
            .into_iter()
            .map(u64::from)
            .collect::<Vec<_>>(),
        vec![1, 2, 3, 4]
    );

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn test_keys_are_little_endian_u64() -> BoxedErrorResult<()> {
    let (_dir, db) = temp_db().await?;

    db.upsert_bucket(Bucket::Active, &entries(&[(0x0102_0304_0506_0708, "Alice")]))
        .await?;

    let raw_keys = db
        .read_with(|tx| {
            let table = tx.open_table(Bucket::Active.table())?;
            let mut keys = vec![];
            for record in redb::ReadableTable::iter(&table)? {
                let (k, _) = record?;
                keys.push(<u64 as redb::Value>::as_bytes(&k.value()));
            }
            Ok(keys)
        })
        .await?;

    assert_eq!(raw_keys, vec![[8, 7, 6, 5, 4, 3, 2, 1]]);

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn test_failed_write_transaction_leaves_bucket_untouched() -> BoxedErrorResult<()> {
    let (_dir, db) = temp_db().await?;

    db.upsert_bucket(Bucket::Active, &entries(&[(1, "Alice")]))
        .await?;

    let res = db
        .write_with(|tx| {
            let mut table = tx.open_table(Bucket::Active.table())?;
            table.insert(2u64, b"{}".as_slice())?;
            table.remove(1u64)?;
            // any error returned from the closure aborts the transaction
            serde_json::from_slice::<Descriptor>(b"!").context(RecordEncodeSnafu {
                id: Identity::from(2),
            })?;
            Ok(())
        })
        .await;
    assert!(res.is_err());

    let read = db.read_bucket(Bucket::Active).await?;
    assert_eq!(read.keys().copied().collect::<Vec<_>>(), vec![Identity::from(1)]);

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn test_reopen_keeps_data() -> BoxedErrorResult<()> {
    let dir = tempdir()?;
    let path = dir.path().join("db.redb");

    {
        let db = Database::open(&path).await.boxed()?;
        db.upsert_bucket(Bucket::Graveyard, &entries(&[(9, "Ivan")]))
            .await?;
    }

    let db = Database::open(&path).await.boxed()?;
    assert_eq!(
        db.read_bucket(Bucket::Graveyard).await?,
        entries(&[(9, "Ivan")])
    );

    Ok(())
}
