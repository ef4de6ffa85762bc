// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Record query executor
//!
//! One executor serves one transaction on one thread. Every operation runs
//! inside its own mini-transaction, or one per retry pass, and commits it on
//! every exit path. The only exception is [`QueryExecutor::select_for_update`],
//! which leaves its mini-transaction open on success so that a following
//! [`QueryExecutor::update_record`] works on the still latched row; it is
//! released with [`QueryExecutor::commit_mtr`].

use super::callback::{CompareAction, RecordCallback, RecordView};
use super::clustered_lookup::lookup_clustered_record;
use super::lock_wait;
use super::mvcc::process_record_with_mvcc;
use crate::data::{Tuple, UpdateVector};
use crate::dict::{IndexDef, TableDef};
use crate::error::{DbError, DbResult};
use crate::mtr::{Mtr, MtrScope, MtrStats};
use crate::rem::{cmp_dtuple_rec, rec_get_offsets, row_build_index_entry};
use crate::storage::{LatchMode, LockMode, PersistentCursor, SearchMode, StorageEngine};
use crate::trx::{QueLockState, QueryThread, Transaction};
use log::{debug, warn};
use std::cmp::Ordering;
use std::sync::Arc;

/// Result of one pass of a locking scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanStep {
    Done,
    /// A lock wait was granted; the pass must start over
    Retry,
}

/// How a consistent scan ended
#[derive(Debug, Clone, Copy, Default)]
struct ScanOutcome {
    matched: usize,
    stopped_by_callback: bool,
}

/// Generic row operations over the indexes of one storage engine
pub struct QueryExecutor<'t> {
    engine: Arc<dyn StorageEngine>,
    trx: &'t mut Transaction,
    thr: QueryThread,
    mtr: Mtr,
    pcur: PersistentCursor,
}

impl<'t> QueryExecutor<'t> {
    pub fn new(engine: Arc<dyn StorageEngine>, trx: &'t mut Transaction) -> Self {
        Self {
            engine,
            trx,
            thr: QueryThread::new(),
            mtr: Mtr::new(),
            pcur: PersistentCursor::new(),
        }
    }

    pub fn engine(&self) -> &Arc<dyn StorageEngine> {
        &self.engine
    }

    pub fn transaction(&self) -> &Transaction {
        self.trx
    }

    pub fn lock_state(&self) -> QueLockState {
        self.thr.lock_state
    }

    /// Start and commit counts of the executor's mini-transactions
    pub fn mtr_stats(&self) -> MtrStats {
        self.mtr.stats()
    }

    /// Inserts a full row into the clustered index and the matching entries
    /// into every secondary index.
    ///
    /// No explicit row lock is taken. When the engine has to wait for a lock
    /// on a delete-marked row with the same key, the insert is re-issued
    /// after the wait.
    pub fn insert_record(&mut self, table: &TableDef, tuple: &Tuple) -> DbResult<()> {
        let clust = Arc::clone(table.clustered_index());
        tuple.ensure_full_row(&clust)?;

        loop {
            let result = {
                let mut mtr = MtrScope::start(&mut self.mtr, table.space);
                self.engine
                    .insert_clust_index_entry(self.trx, &clust, tuple, &mut mtr)
            };
            match result {
                Err(DbError::LockWait) => {
                    self.handle_wait(DbError::LockWait, false)?;
                    debug!("retrying insert into {}", table.name);
                }
                other => {
                    other?;
                    break;
                }
            }
        }

        for sec in table.secondary_indexes() {
            let entry = row_build_index_entry(tuple, &clust, sec)?;
            let mut mtr = MtrScope::start(&mut self.mtr, table.space);
            self.engine
                .insert_sec_index_entry(self.trx, sec, &entry, &mut mtr)?;
        }
        Ok(())
    }

    /// Requests a table lock, starting the transaction if needed.
    ///
    /// `LockWait` means the request is queued; run [`Self::handle_wait`].
    pub fn lock_table(&mut self, table: &TableDef, mode: LockMode) -> DbResult<()> {
        self.engine.trx_start_if_not_started(self.trx);
        self.engine.lock_table(self.trx, table, mode)
    }

    /// Blocks on the transaction's pending lock request, if any.
    ///
    /// `Ok` means the lock was granted and the failed operation must be
    /// re-issued from scratch. Without a pending request `pending` is
    /// returned unchanged.
    pub fn handle_wait(&mut self, pending: DbError, table_lock: bool) -> DbResult<()> {
        lock_wait::handle_wait(&*self.engine, self.trx, &mut self.thr, pending, table_lock)
    }

    /// Delete-marks every live row of the clustered index matching `tuple`.
    ///
    /// Returns the number of rows marked, or `RecordNotFound` when there
    /// were none.
    pub fn delete_record(&mut self, table: &TableDef, tuple: &Tuple) -> DbResult<usize> {
        tuple.ensure_prefix_of(table.clustered_index())?;
        let deleted = self.delete_rows(table, Some(tuple))?;
        if deleted == 0 {
            return Err(DbError::RecordNotFound);
        }
        Ok(deleted)
    }

    /// Delete-marks every live row of the table.
    ///
    /// Rows marked before an error stay marked.
    pub fn delete_all(&mut self, table: &TableDef) -> DbResult<usize> {
        self.delete_rows(table, None)
    }

    fn delete_rows(&mut self, table: &TableDef, search: Option<&Tuple>) -> DbResult<usize> {
        let mut deleted = 0;
        loop {
            match self.delete_pass(table, search, &mut deleted)? {
                ScanStep::Done => return Ok(deleted),
                ScanStep::Retry => debug!("restarting delete scan on {}", table.name),
            }
        }
    }

    fn delete_pass(
        &mut self,
        table: &TableDef,
        search: Option<&Tuple>,
        deleted: &mut usize,
    ) -> DbResult<ScanStep> {
        let index = Arc::clone(table.clustered_index());
        self.pcur.bind(Arc::clone(&index));

        let engine = &*self.engine;
        let mut mtr = MtrScope::start(&mut self.mtr, table.space);
        match search {
            Some(tuple) => {
                engine.open_on_user_rec(&mut self.pcur, tuple, LatchMode::ModifyLeaf, &mut mtr)?
            }
            None => {
                engine.open_leaf(&mut self.pcur, true, LatchMode::ModifyLeaf, &mut mtr)?;
                if !engine.move_to_next(&mut self.pcur, &mut mtr)? {
                    return Ok(ScanStep::Done);
                }
            }
        }

        while let Some(rec) = engine.get_rec_or_next(&mut self.pcur, &mut mtr)? {
            if !rec.is_delete_marked() && !rec.is_min_rec() {
                let offsets = rec_get_offsets(&rec, &index)?;
                if let Some(tuple) = search {
                    // The index is ordered: the first mismatch ends the matches
                    if cmp_dtuple_rec(tuple, &rec, &offsets) != Ordering::Equal {
                        break;
                    }
                }

                match engine.lock_clust_rec(self.trx, &index, &rec, LockMode::X) {
                    Ok(()) => {}
                    Err(DbError::LockWait) => {
                        mtr.commit();
                        lock_wait::handle_wait(
                            engine,
                            self.trx,
                            &mut self.thr,
                            DbError::LockWait,
                            false,
                        )?;
                        return Ok(ScanStep::Retry);
                    }
                    Err(e) => return Err(e),
                }

                engine.del_mark_set_clust_rec(self.trx, &self.pcur, &mut mtr)?;
                *deleted += 1;
            }
            if !engine.move_to_next(&mut self.pcur, &mut mtr)? {
                break;
            }
        }
        Ok(ScanStep::Done)
    }

    /// Locks the row of the clustered index equal to `search` for update.
    ///
    /// Opens the transaction's read view first if it has none. A row that
    /// is delete-marked, or whose creator is invisible to the read view, is
    /// reported as `RecordNotFound`; older versions are not consulted.
    /// Unlike a plain locking read, delete-marked rows are never locked, so
    /// [`Self::replace_record`] reuses them through an insert.
    ///
    /// If the lock had to be waited for, `LockWait` is returned after the
    /// grant and the caller must start over. On success the callback has
    /// seen the row and the mini-transaction stays open until
    /// [`Self::commit_mtr`].
    pub fn select_for_update(
        &mut self,
        table: &TableDef,
        search: &Tuple,
        callback: Option<&mut dyn RecordCallback>,
    ) -> DbResult<()> {
        let index = Arc::clone(table.clustered_index());
        search.ensure_prefix_of(&index)?;
        if !self.trx.has_read_view() {
            self.engine.open_read_view(self.trx);
        }
        self.pcur.bind(Arc::clone(&index));

        let engine = &*self.engine;
        let mut mtr = MtrScope::start(&mut self.mtr, table.space);
        engine.open_on_user_rec(&mut self.pcur, search, LatchMode::ModifyLeaf, &mut mtr)?;

        let rec = engine
            .get_rec(&self.pcur, &mut mtr)?
            .ok_or(DbError::RecordNotFound)?;
        let offsets = rec_get_offsets(&rec, &index)?;

        if let Some(view) = &self.trx.read_view {
            if !view.changes_visible(rec.trx_id()) {
                return Err(DbError::RecordNotFound);
            }
        }
        if rec.is_delete_marked() || cmp_dtuple_rec(search, &rec, &offsets) != Ordering::Equal {
            return Err(DbError::RecordNotFound);
        }

        match engine.lock_clust_rec(self.trx, &index, &rec, LockMode::X) {
            Ok(()) => {}
            Err(DbError::LockWait) => {
                mtr.commit();
                lock_wait::handle_wait(
                    engine,
                    self.trx,
                    &mut self.thr,
                    DbError::LockWait,
                    false,
                )?;
                return Err(DbError::LockWait);
            }
            Err(e) => return Err(e),
        }

        if let Some(callback) = callback {
            let view = RecordView::new(engine, &rec, &index, &offsets);
            match callback.compare_record(Some(search), &view) {
                CompareAction::Process => {
                    callback.process_record(&view)?;
                }
                CompareAction::Skip => return Err(DbError::RecordNotFound),
                CompareAction::Stop => {}
            }
        }

        mtr.keep_open();
        Ok(())
    }

    /// Updates the row positioned by a successful [`Self::select_for_update`].
    ///
    /// Tries an in-place update when no field changes size, then an
    /// optimistic update, then a pessimistic one; fields the pessimistic
    /// update moved off page are written to external storage. Ordering
    /// fields and columns covered by a secondary index cannot be updated.
    ///
    /// The mini-transaction stays open; release it with [`Self::commit_mtr`].
    pub fn update_record(&mut self, table: &TableDef, update: &UpdateVector) -> DbResult<()> {
        let index = Arc::clone(table.clustered_index());
        let positioned = self.mtr.is_active()
            && self.pcur.is_on_user_rec()
            && self.pcur.index().is_ok_and(|bound| bound.id == index.id);
        if !positioned {
            return Err(DbError::Generic(
                "update_record needs a row selected for update".to_string(),
            ));
        }
        update.validate(&index)?;
        check_secondary_columns(table, &index, update)?;

        let engine = &*self.engine;
        engine.x_lock_index(&index, &mut self.mtr);
        let rec = engine
            .get_rec(&self.pcur, &mut self.mtr)?
            .ok_or(DbError::RecordNotFound)?;
        let offsets = rec_get_offsets(&rec, &index)?;

        let first_try = if update.changes_size(&rec, &offsets) {
            Err(DbError::Overflow)
        } else {
            engine.update_in_place(self.trx, &self.pcur, update, &mut self.mtr)
        };
        let err = match first_try {
            Err(e) if e.is_escalation() => e,
            other => return other,
        };

        debug!("{} on {}, trying an optimistic update", err, index.name);
        let err = match engine.optimistic_update(self.trx, &self.pcur, update, &mut self.mtr) {
            Err(e) if e.is_escalation() => e,
            other => return other,
        };

        debug!("{} on {}, falling back to a pessimistic update", err, index.name);
        if let Some(big_rec) =
            engine.pessimistic_update(self.trx, &self.pcur, update, &mut self.mtr)?
        {
            engine.store_big_rec_extern_fields(&self.pcur, &big_rec, &mut self.mtr)?;
        }
        Ok(())
    }

    /// Updates the row equal to `search` or inserts `insert` if there is
    /// none.
    ///
    /// Lock waits are retried until the lock manager grants or times out.
    pub fn replace_record(
        &mut self,
        table: &TableDef,
        search: &Tuple,
        update: &UpdateVector,
        insert: &Tuple,
    ) -> DbResult<()> {
        loop {
            match self.select_for_update(table, search, None) {
                Ok(()) => {
                    let result = self.update_record(table, update);
                    self.mtr.commit();
                    return result;
                }
                Err(DbError::RecordNotFound) => return self.insert_record(table, insert),
                Err(DbError::LockWait) => debug!("retrying replace on {}", table.name),
                Err(e) => return Err(e),
            }
        }
    }

    /// Consistent forward scan of the clustered index.
    ///
    /// With a tuple the scan starts at the first record that is greater
    /// than or equal to it (`Ge`) or greater than it (`G`); without one it
    /// covers the whole index. Records the callback processes go through
    /// version resolution first.
    ///
    /// Returns `RecordNotFound` when a keyed scan processed nothing. A full
    /// scan, or a scan the callback ended, always succeeds.
    pub fn read(
        &mut self,
        table: &TableDef,
        tuple: Option<&Tuple>,
        mode: SearchMode,
        callback: &mut dyn RecordCallback,
    ) -> DbResult<()> {
        let index = Arc::clone(table.clustered_index());
        let outcome = self.scan(table, &index, tuple, mode, callback)?;
        if outcome.stopped_by_callback || outcome.matched > 0 || tuple.is_none() {
            Ok(())
        } else {
            Err(DbError::RecordNotFound)
        }
    }

    /// Consistent forward scan of a secondary index; every processed entry
    /// is resolved to its clustered row first.
    ///
    /// Returns `RecordNotFound` unless at least one entry led to an existing
    /// clustered row.
    pub fn read_by_index(
        &mut self,
        table: &TableDef,
        sec_index: &Arc<IndexDef>,
        tuple: &Tuple,
        mode: SearchMode,
        callback: &mut dyn RecordCallback,
    ) -> DbResult<()> {
        if sec_index.is_clustered() || sec_index.table_id != table.id {
            return Err(DbError::DictionaryMismatch(format!(
                "{} is not a secondary index of {}",
                sec_index.name, table.name
            )));
        }
        let outcome = self.scan(table, sec_index, Some(tuple), mode, callback)?;
        if outcome.stopped_by_callback || outcome.matched > 0 {
            Ok(())
        } else {
            Err(DbError::RecordNotFound)
        }
    }

    fn scan(
        &mut self,
        table: &TableDef,
        index: &Arc<IndexDef>,
        tuple: Option<&Tuple>,
        mode: SearchMode,
        callback: &mut dyn RecordCallback,
    ) -> DbResult<ScanOutcome> {
        if !matches!(mode, SearchMode::Ge | SearchMode::G) {
            return Err(DbError::Generic(format!(
                "scans move forward, {:?} is not supported",
                mode
            )));
        }
        if let Some(tuple) = tuple {
            tuple.ensure_prefix_of(index)?;
        }
        if !self.trx.has_read_view() {
            self.engine.open_read_view(self.trx);
        }
        self.pcur.bind(Arc::clone(index));

        let clust = table.clustered_index();
        let engine = &*self.engine;
        let mut mtr = MtrScope::start(&mut self.mtr, table.space);
        match tuple {
            Some(tuple) => engine.open(&mut self.pcur, tuple, mode, LatchMode::SearchLeaf, &mut mtr)?,
            None => {
                engine.open_leaf(&mut self.pcur, true, LatchMode::SearchLeaf, &mut mtr)?;
                if !engine.move_to_next(&mut self.pcur, &mut mtr)? {
                    return Ok(ScanOutcome::default());
                }
            }
        }

        let mut outcome = ScanOutcome::default();
        while let Some(rec) = engine.get_rec_or_next(&mut self.pcur, &mut mtr)? {
            let offsets = rec_get_offsets(&rec, index)?;
            let action =
                callback.compare_record(tuple, &RecordView::new(engine, &rec, index, &offsets));
            match action {
                CompareAction::Process if index.is_clustered() => {
                    let keep_scanning =
                        process_record_with_mvcc(engine, &*self.trx, index, &rec, &offsets, callback)?;
                    if !keep_scanning {
                        outcome.stopped_by_callback = true;
                        return Ok(outcome);
                    }
                    outcome.matched += 1;
                }
                CompareAction::Process => {
                    let lookup = lookup_clustered_record(
                        engine, &*self.trx, &mut mtr, index, clust, &rec, &offsets, callback,
                    )?;
                    if lookup.matched {
                        outcome.matched += 1;
                    }
                    if !lookup.keep_scanning {
                        outcome.stopped_by_callback = true;
                        return Ok(outcome);
                    }
                }
                CompareAction::Skip => {}
                CompareAction::Stop => break,
            }
            if !engine.move_to_next(&mut self.pcur, &mut mtr)? {
                break;
            }
        }
        Ok(outcome)
    }

    /// Releases the mini-transaction left open by [`Self::select_for_update`].
    pub fn commit_mtr(&mut self) {
        self.mtr.commit();
    }
}

impl Drop for QueryExecutor<'_> {
    fn drop(&mut self) {
        if self.mtr.is_active() {
            warn!("query executor dropped with an open mini-transaction");
            self.mtr.commit();
        }
        self.pcur.close();
    }
}

/// Rejects updates of clustered fields that secondary index entries copy.
fn check_secondary_columns(
    table: &TableDef,
    clust: &IndexDef,
    update: &UpdateVector,
) -> DbResult<()> {
    for field in update.fields() {
        let Some(column) = clust.columns.get(field.field_no) else {
            continue;
        };
        if let Some(sec) = table
            .secondary_indexes()
            .find(|sec| sec.column_position(&column.name).is_some())
        {
            return Err(DbError::DictionaryMismatch(format!(
                "column {} is part of secondary index {}",
                column.name, sec.name
            )));
        }
    }
    Ok(())
}
