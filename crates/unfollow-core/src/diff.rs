//! Snapshot diffing.
//!
//! Both snapshots are sorted and walked once with two cursors.

use std::cmp::Ordering;

use crate::Identity;

/// Result of comparing the current snapshot with the previous one.
///
/// Both lists are ascending and disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    /// In the current snapshot, not in the previous one
    pub newcomers: Vec<Identity>,
    /// In the previous snapshot, not in the current one
    pub departed: Vec<Identity>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.newcomers.is_empty() && self.departed.is_empty()
    }
}

/// Compare two snapshots, in any order.
///
/// Duplicates are collapsed before comparing.
pub fn diff(
    current: impl IntoIterator<Item = Identity>,
    previous: impl IntoIterator<Item = Identity>,
) -> SnapshotDiff {
    let current = sorted(current);
    let previous = sorted(previous);

    diff_sorted(&current, &previous)
}

fn sorted(ids: impl IntoIterator<Item = Identity>) -> Vec<Identity> {
    let mut ids: Vec<_> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Merge-compare two strictly ascending snapshots.
fn diff_sorted(current: &[Identity], previous: &[Identity]) -> SnapshotDiff {
    debug_assert!(current.windows(2).all(|w| w[0] < w[1]));
    debug_assert!(previous.windows(2).all(|w| w[0] < w[1]));

    let mut newcomers = vec![];
    let mut departed = vec![];

    let (mut i, mut j) = (0, 0);
    while i < current.len() && j < previous.len() {
        match current[i].cmp(&previous[j]) {
            Ordering::Equal => {
                i += 1;
                j += 1;
            }
            // `previous[j]` can't appear later in `current`
            Ordering::Greater => {
                departed.push(previous[j]);
                j += 1;
            }
            // `current[i]` can't appear later in `previous`
            Ordering::Less => {
                newcomers.push(current[i]);
                i += 1;
            }
        }
    }

    newcomers.extend_from_slice(&current[i..]);
    departed.extend_from_slice(&previous[j..]);

    SnapshotDiff {
        newcomers,
        departed,
    }
}
