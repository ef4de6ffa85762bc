// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Mini-transactions
//!
//! A mini-transaction records the page and index latches taken while one
//! piece of B-tree work runs. Committing releases every latch in its memo.
//! Save points allow a nested lookup to release only the latches it added.

use crate::dict::SpaceId;
use log::warn;
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoKind {
    PageS,
    PageX,
    IndexS,
    IndexX,
}

/// One latch held by a mini-transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoSlot {
    pub kind: MemoKind,
    /// Page number or index id, depending on `kind`
    pub object: u64,
}

impl MemoSlot {
    pub fn page(kind: MemoKind, page_no: u32) -> Self {
        Self {
            kind,
            object: u64::from(page_no),
        }
    }
}

/// Start and commit counters of a mini-transaction handle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MtrStats {
    pub started: u64,
    pub committed: u64,
}

impl MtrStats {
    pub fn is_balanced(&self) -> bool {
        self.started == self.committed
    }
}

/// Memo position to roll back to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Savepoint(usize);

#[derive(Debug, Default)]
pub struct Mtr {
    active: bool,
    named_space: Option<SpaceId>,
    memo: Vec<MemoSlot>,
    stats: MtrStats,
}

impl Mtr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        if self.active {
            warn!(
                "mini-transaction started while {} latches are still held, committing them",
                self.memo.len()
            );
            self.commit();
        }
        self.active = true;
        self.stats.started += 1;
    }

    /// Releases every latch. Committing an inactive mini-transaction is a no-op.
    pub fn commit(&mut self) {
        if !self.active {
            return;
        }
        self.memo.clear();
        self.named_space = None;
        self.active = false;
        self.stats.committed += 1;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_named_space(&mut self, space: SpaceId) {
        self.named_space = Some(space);
    }

    pub fn named_space(&self) -> Option<SpaceId> {
        self.named_space
    }

    pub fn memo_push(&mut self, slot: MemoSlot) {
        self.memo.push(slot);
    }

    pub fn memo_len(&self) -> usize {
        self.memo.len()
    }

    pub fn holds(&self, kind: MemoKind, object: u64) -> bool {
        self.memo
            .iter()
            .any(|slot| slot.kind == kind && slot.object == object)
    }

    pub fn savepoint(&self) -> Savepoint {
        Savepoint(self.memo.len())
    }

    /// Releases the latches taken after `savepoint`.
    pub fn rollback_to_savepoint(&mut self, savepoint: Savepoint) {
        self.memo.truncate(savepoint.0);
    }

    pub fn stats(&self) -> MtrStats {
        self.stats
    }
}

/// Starts a mini-transaction and commits it when dropped.
///
/// [`MtrScope::keep_open`] hands the still-active mini-transaction back to
/// its owner instead.
pub struct MtrScope<'a> {
    mtr: &'a mut Mtr,
    keep_open: bool,
}

impl<'a> MtrScope<'a> {
    pub fn start(mtr: &'a mut Mtr, space: SpaceId) -> Self {
        mtr.start();
        mtr.set_named_space(space);
        Self {
            mtr,
            keep_open: false,
        }
    }

    pub fn commit(self) {
        // Drop does the work
    }

    pub fn keep_open(mut self) {
        self.keep_open = true;
    }
}

impl Deref for MtrScope<'_> {
    type Target = Mtr;

    fn deref(&self) -> &Mtr {
        self.mtr
    }
}

impl DerefMut for MtrScope<'_> {
    fn deref_mut(&mut self) -> &mut Mtr {
        self.mtr
    }
}

impl Drop for MtrScope<'_> {
    fn drop(&mut self) {
        if !self.keep_open {
            self.mtr.commit();
        }
    }
}
