// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Consistent read views
//!
//! A read view is taken when a transaction performs its first consistent
//! read and never changes afterwards. It decides which transaction ids
//! produced changes the snapshot may see.

use super::TrxId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadView {
    /// Transaction that opened the view; its own changes are always visible
    creator: TrxId,
    /// Ids at or above this were not yet assigned when the view opened
    low_limit_id: TrxId,
    /// Ids below this had committed when the view opened
    up_limit_id: TrxId,
    /// Sorted ids of transactions active when the view opened
    ids: Vec<TrxId>,
}

impl ReadView {
    /// `active` lists the transactions active at open time; `next_id` is the
    /// next id the transaction system will assign.
    pub fn new(creator: TrxId, next_id: TrxId, active: impl IntoIterator<Item = TrxId>) -> Self {
        let mut ids: Vec<TrxId> = active.into_iter().filter(|id| *id != creator).collect();
        ids.sort_unstable();
        ids.dedup();
        let up_limit_id = ids.first().copied().unwrap_or(next_id);
        Self {
            creator,
            low_limit_id: next_id,
            up_limit_id,
            ids,
        }
    }

    /// True if changes made by `id` are part of this snapshot
    pub fn changes_visible(&self, id: TrxId) -> bool {
        if id < self.up_limit_id || id == self.creator {
            return true;
        }
        if id >= self.low_limit_id {
            return false;
        }
        self.ids.binary_search(&id).is_err()
    }

    pub fn creator(&self) -> TrxId {
        self.creator
    }

    pub fn low_limit_id(&self) -> TrxId {
        self.low_limit_id
    }

    pub fn up_limit_id(&self) -> TrxId {
        self.up_limit_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_rules() {
        // trx 10 opens a view while 7 and 12 are active and 15 is next
        let view = ReadView::new(TrxId(10), TrxId(15), [TrxId(12), TrxId(7), TrxId(10)]);

        assert_eq!(view.up_limit_id(), TrxId(7));
        assert!(view.changes_visible(TrxId(3)));
        assert!(!view.changes_visible(TrxId(7)));
        assert!(view.changes_visible(TrxId(9)));
        assert!(view.changes_visible(TrxId(10)));
        assert!(!view.changes_visible(TrxId(12)));
        assert!(view.changes_visible(TrxId(13)));
        assert!(!view.changes_visible(TrxId(15)));
        assert!(!view.changes_visible(TrxId(40)));
    }

    #[test]
    fn test_view_without_active_transactions() {
        let view = ReadView::new(TrxId(4), TrxId(5), []);
        assert_eq!(view.up_limit_id(), TrxId(5));
        assert!(view.changes_visible(TrxId(4)));
        assert!(!view.changes_visible(TrxId(5)));
    }
}
