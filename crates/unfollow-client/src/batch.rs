use itertools::Itertools as _;
use snafu::{Snafu, ensure};
use unfollow_core::Identity;

#[derive(Debug, Snafu)]
pub enum BatchError {
    #[snafu(display("Lookup batch is empty"))]
    EmptyBatch,
    #[snafu(display("Lookup batch of {len} ids exceeds the limit of {max}"))]
    BatchTooLarge { len: usize, max: usize },
}

pub type BatchResult<T> = std::result::Result<T, BatchError>;

/// Ids for one attribute lookup request.
///
/// Always non-empty and within the limit it was built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupBatch {
    ids: Vec<Identity>,
}

impl LookupBatch {
    pub fn new(ids: Vec<Identity>, max: usize) -> BatchResult<Self> {
        ensure!(!ids.is_empty(), EmptyBatchSnafu);
        ensure!(
            ids.len() <= max,
            BatchTooLargeSnafu {
                len: ids.len(),
                max
            }
        );

        Ok(Self { ids })
    }

    pub fn ids(&self) -> &[Identity] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Comma separated ids, as expected by the `user_id` query parameter.
    pub fn query_value(&self) -> String {
        self.ids.iter().join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: u64) -> Vec<Identity> {
        (1..=n).map(Identity::from).collect()
    }

    #[test]
    fn batch_rejects_empty() {
        assert!(matches!(
            LookupBatch::new(vec![], 100),
            Err(BatchError::EmptyBatch)
        ));
    }

    #[test]
    fn batch_rejects_over_limit() {
        assert!(matches!(
            LookupBatch::new(ids(101), 100),
            Err(BatchError::BatchTooLarge { len: 101, max: 100 })
        ));
    }

    #[test]
    fn batch_accepts_exact_limit() {
        let batch = LookupBatch::new(ids(100), 100).unwrap();
        assert_eq!(batch.len(), 100);
        assert_eq!(batch.ids().last(), Some(&Identity::from(100)));
    }

    #[test]
    fn batch_query_value_is_comma_separated() {
        let batch = LookupBatch::new(
            vec![Identity::from(12), Identity::from(7), Identity::from(u64::MAX)],
            3,
        )
        .unwrap();
        assert_eq!(batch.query_value(), "12,7,18446744073709551615");
    }
}
