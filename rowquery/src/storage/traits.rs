// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Storage engine traits
//!
//! The executor reaches the B-tree, the lock manager, the transaction system
//! and the undo-based version builder only through these traits. Any engine
//! implementing all of them gets [`StorageEngine`] through a blanket impl.

use super::cursor::PersistentCursor;
use super::types::{BigRec, LatchMode, LockMode, SearchMode};
use crate::data::{Tuple, UpdateVector};
use crate::dict::{IndexDef, TableDef, TableId};
use crate::error::DbResult;
use crate::mtr::Mtr;
use crate::rem::{ExternRef, Record};
use crate::trx::{ReadView, Transaction};
use std::sync::Arc;

/// Table lookup
pub trait Dictionary: Send + Sync {
    /// Fails with `TableNotFound` for unknown names
    fn table_by_name(&self, name: &str) -> DbResult<Arc<TableDef>>;

    fn table_by_id(&self, id: TableId) -> DbResult<Arc<TableDef>>;
}

/// Cursor positioning and movement on the leaf level
pub trait BtrCursorOps: Send + Sync {
    /// Positions `pcur` in its bound index according to `mode`.
    fn open(
        &self,
        pcur: &mut PersistentCursor,
        tuple: &Tuple,
        mode: SearchMode,
        latch: LatchMode,
        mtr: &mut Mtr,
    ) -> DbResult<()>;

    /// Positions on the first user record greater than or equal to `tuple`.
    fn open_on_user_rec(
        &self,
        pcur: &mut PersistentCursor,
        tuple: &Tuple,
        latch: LatchMode,
        mtr: &mut Mtr,
    ) -> DbResult<()> {
        self.open(pcur, tuple, SearchMode::Ge, latch, mtr)
    }

    /// Positions before the first (`from_left`) or after the last record.
    fn open_leaf(
        &self,
        pcur: &mut PersistentCursor,
        from_left: bool,
        latch: LatchMode,
        mtr: &mut Mtr,
    ) -> DbResult<()>;

    /// Moves to the next user record; false when the index is exhausted.
    fn move_to_next(&self, pcur: &mut PersistentCursor, mtr: &mut Mtr) -> DbResult<bool>;

    /// Copy of the record under the cursor, `None` if not on a user record
    fn get_rec(&self, pcur: &PersistentCursor, mtr: &mut Mtr) -> DbResult<Option<Record>>;

    /// Like [`Self::get_rec`], but when the record under the cursor was
    /// purged after positioning, moves on to the next user record.
    fn get_rec_or_next(
        &self,
        pcur: &mut PersistentCursor,
        mtr: &mut Mtr,
    ) -> DbResult<Option<Record>> {
        while pcur.is_on_user_rec() {
            if let Some(rec) = self.get_rec(pcur, mtr)? {
                return Ok(Some(rec));
            }
            if !self.move_to_next(pcur, mtr)? {
                break;
            }
        }
        Ok(None)
    }
}

/// Row modification primitives
pub trait RowModifyOps: Send + Sync {
    /// Inserts a full row into a clustered index.
    ///
    /// Returns `LockWait` with a wait request attached to `trx` when a
    /// conflicting record with the same key is locked by another transaction.
    fn insert_clust_index_entry(
        &self,
        trx: &mut Transaction,
        index: &IndexDef,
        entry: &Tuple,
        mtr: &mut Mtr,
    ) -> DbResult<()>;

    /// Inserts a secondary index entry. An identical entry is left in place.
    fn insert_sec_index_entry(
        &self,
        trx: &mut Transaction,
        index: &IndexDef,
        entry: &Tuple,
        mtr: &mut Mtr,
    ) -> DbResult<()>;

    /// Sets the delete mark on the record under the cursor.
    fn del_mark_set_clust_rec(
        &self,
        trx: &mut Transaction,
        pcur: &PersistentCursor,
        mtr: &mut Mtr,
    ) -> DbResult<()>;

    /// Update that changes no field size
    fn update_in_place(
        &self,
        trx: &mut Transaction,
        pcur: &PersistentCursor,
        update: &UpdateVector,
        mtr: &mut Mtr,
    ) -> DbResult<()>;

    /// Update within the current page; fails with `Overflow` or `Underflow`
    fn optimistic_update(
        &self,
        trx: &mut Transaction,
        pcur: &PersistentCursor,
        update: &UpdateVector,
        mtr: &mut Mtr,
    ) -> DbResult<()>;

    /// Update that may split or merge pages.
    ///
    /// Fields moved off page are returned as a [`BigRec`] to be written with
    /// [`RowModifyOps::store_big_rec_extern_fields`].
    fn pessimistic_update(
        &self,
        trx: &mut Transaction,
        pcur: &PersistentCursor,
        update: &UpdateVector,
        mtr: &mut Mtr,
    ) -> DbResult<Option<BigRec>>;

    fn store_big_rec_extern_fields(
        &self,
        pcur: &PersistentCursor,
        big_rec: &BigRec,
        mtr: &mut Mtr,
    ) -> DbResult<()>;

    /// Exclusive latch on the whole index
    fn x_lock_index(&self, index: &IndexDef, mtr: &mut Mtr);
}

/// Lock manager
pub trait LockOps: Send + Sync {
    /// Non-gap lock on a clustered record.
    ///
    /// `LockWait` means the request is queued and attached to `trx`.
    fn lock_clust_rec(
        &self,
        trx: &mut Transaction,
        index: &IndexDef,
        rec: &Record,
        mode: LockMode,
    ) -> DbResult<()>;

    fn lock_table(&self, trx: &mut Transaction, table: &TableDef, mode: LockMode)
        -> DbResult<()>;

    /// Blocks until the request attached to `trx` is resolved.
    ///
    /// Returns `LockWaitTimeout` or `Deadlock` when it is not granted.
    fn lock_wait(&self, trx: &mut Transaction) -> DbResult<()>;
}

/// Transaction system
pub trait TrxOps: Send + Sync {
    fn trx_start_if_not_started(&self, trx: &mut Transaction);

    /// Starts the transaction if needed and opens its read view.
    fn open_read_view(&self, trx: &mut Transaction);

    /// Releases every lock and wakes waiters.
    fn commit(&self, trx: &mut Transaction) -> DbResult<()>;

    /// Applies the transaction's undo records in reverse, then releases locks.
    fn rollback(&self, trx: &mut Transaction) -> DbResult<()>;
}

/// Version reconstruction and off-page reads
pub trait VersionOps: Send + Sync {
    /// Builds the version of `rec` visible to `view`.
    ///
    /// `None` means the row did not exist in the snapshot.
    fn build_for_consistent_read(
        &self,
        rec: &Record,
        index: &IndexDef,
        view: &ReadView,
    ) -> DbResult<Option<Record>>;

    fn read_extern_field(&self, ext: &ExternRef) -> DbResult<Vec<u8>>;
}

/// Everything the executor needs from a storage engine
pub trait StorageEngine:
    Dictionary + BtrCursorOps + RowModifyOps + LockOps + TrxOps + VersionOps
{
}

impl<T> StorageEngine for T where
    T: Dictionary + BtrCursorOps + RowModifyOps + LockOps + TrxOps + VersionOps
{
}
