// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-memory storage engine
//!
//! A complete implementation of the engine traits kept in process memory:
//! leaf pages with splits and merges, a lock system with wait queues and
//! deadlock detection, a transaction system with an undo log, off-page
//! blobs and purge. Used by tests and as the reference engine.

mod blob;
mod btree;
mod lock_sys;
mod trx_sys;

use self::blob::BlobStore;
use self::btree::IndexTree;
use self::lock_sys::{Enqueued, LockKey, LockTables};
use self::trx_sys::{TrxSys, UndoRecord};
use super::cursor::{CursorPosition, PersistentCursor};
use super::traits::{BtrCursorOps, Dictionary, LockOps, RowModifyOps, TrxOps, VersionOps};
use super::types::{BigRec, BigRecField, LatchMode, LockMode, SearchMode};
use crate::config::{ConfigResult, EngineConfig};
use crate::data::{DataField, Datum, Tuple, UpdateVector};
use crate::dict::{IndexDef, IndexId, SpaceId, TableBuilder, TableDef, TableId};
use crate::error::{DbError, DbResult};
use crate::mtr::{MemoKind, MemoSlot, Mtr};
use crate::rem::record::REC_HEADER_SIZE;
use crate::rem::{
    rec_get_offsets, rec_sort_key, row_build_index_entry, ExternRef, FieldValue, Record,
};
use crate::trx::{ReadView, Transaction, TrxState, WaitStatus};
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Bound;
use std::sync::Arc;
use std::time::Instant;

/// Counters of work done by the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub rows_inserted: u64,
    pub rows_delete_marked: u64,
    pub in_place_updates: u64,
    pub optimistic_updates: u64,
    pub pessimistic_updates: u64,
    pub page_splits: u64,
    pub page_merges: u64,
    pub blobs_written: u64,
    pub rows_purged: u64,
    pub lock_waits: u64,
    pub lock_wait_timeouts: u64,
    pub deadlocks: u64,
}

/// Shape of one index tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub n_pages: usize,
    pub n_records: usize,
}

#[derive(Debug)]
struct DictCache {
    by_name: HashMap<String, Arc<TableDef>>,
    by_id: HashMap<TableId, Arc<TableDef>>,
    next_table_id: u64,
    next_index_id: u64,
}

impl Default for DictCache {
    fn default() -> Self {
        Self {
            by_name: HashMap::new(),
            by_id: HashMap::new(),
            next_table_id: 1,
            next_index_id: 1,
        }
    }
}

type TreeHandle = Arc<RwLock<IndexTree>>;

/// In-memory storage engine.
///
/// Lock order: index tree, then lock tables, then transaction system. The
/// blob store and the counters are leaves.
#[derive(Debug)]
pub struct MemoryEngine {
    config: EngineConfig,
    dict: RwLock<DictCache>,
    trees: RwLock<HashMap<IndexId, TreeHandle>>,
    locks: Mutex<LockTables>,
    trx_sys: Mutex<TrxSys>,
    blobs: RwLock<BlobStore>,
    stats: Mutex<EngineStats>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::from_parts(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::from_parts(config))
    }

    fn from_parts(config: EngineConfig) -> Self {
        Self {
            config,
            dict: RwLock::new(DictCache::default()),
            trees: RwLock::new(HashMap::new()),
            locks: Mutex::new(LockTables::default()),
            trx_sys: Mutex::new(TrxSys::default()),
            blobs: RwLock::new(BlobStore::default()),
            stats: Mutex::new(EngineStats::default()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Creates a table and its empty index trees.
    pub fn create_table(&self, builder: TableBuilder) -> DbResult<Arc<TableDef>> {
        let mut dict = self.dict.write();
        if dict.by_name.contains_key(builder.name()) {
            return Err(DbError::Generic(format!(
                "Table already exists: {}",
                builder.name()
            )));
        }

        let id = TableId(dict.next_table_id);
        let first_index_id = dict.next_index_id;
        let n_indexes = builder.n_indexes() as u64;
        let table = Arc::new(builder.build(id, SpaceId(id.0 as u32), first_index_id)?);
        dict.next_table_id += 1;
        dict.next_index_id += n_indexes;

        let mut trees = self.trees.write();
        for index in &table.indexes {
            trees.insert(
                index.id,
                Arc::new(RwLock::new(IndexTree::new(self.config.page_size))),
            );
        }
        dict.by_name.insert(table.name.clone(), Arc::clone(&table));
        dict.by_id.insert(id, Arc::clone(&table));
        info!("created table {} ({}) with {} indexes", table.name, id, table.indexes.len());
        Ok(table)
    }

    pub fn stats(&self) -> EngineStats {
        let mut stats = *self.stats.lock();
        for tree in self.trees.read().values() {
            let tree = tree.read();
            stats.page_splits += tree.splits;
            stats.page_merges += tree.merges;
        }
        stats
    }

    pub fn index_stats(&self, index: &IndexDef) -> DbResult<IndexStats> {
        let tree = self.tree(index.id)?;
        let tree = tree.read();
        Ok(IndexStats {
            n_pages: tree.n_pages(),
            n_records: tree.n_records(),
        })
    }

    /// Number of transactions blocked in a lock queue
    pub fn n_lock_waits(&self) -> usize {
        self.locks.lock().n_waiting()
    }

    pub fn n_active_transactions(&self) -> usize {
        self.trx_sys.lock().n_active()
    }

    /// Removes delete-marked rows that no read view can see any more, with
    /// their secondary index entries, and drops undo records nobody needs.
    pub fn purge(&self) -> DbResult<usize> {
        let limit = self.trx_sys.lock().purge_limit();
        let tables: Vec<Arc<TableDef>> = self.dict.read().by_id.values().cloned().collect();

        let mut purged = 0;
        for table in tables {
            let clust = table.clustered_index();
            let tree = self.tree(clust.id)?;
            let mut tree = tree.write();

            let candidates: Vec<(Vec<u8>, Record)> = {
                let trx_sys = self.trx_sys.lock();
                tree.records()
                    .filter(|(_, rec)| {
                        rec.is_delete_marked()
                            && rec.trx_id() < limit
                            && !trx_sys.is_active(rec.trx_id())
                    })
                    .map(|(key, rec)| (key.clone(), rec.clone()))
                    .collect()
            };

            for (key, rec) in candidates {
                tree.remove(&key)?;
                self.purge_secondary_entries(&table, &rec)?;
                purged += 1;
            }
        }

        let undo = self.trx_sys.lock().purge_undo();
        self.stats.lock().rows_purged += purged as u64;
        debug!("purged {} rows and {} undo records", purged, undo);
        Ok(purged)
    }

    /// Discards every undo record regardless of the read views still open.
    ///
    /// Readers that need an older version afterwards fail with
    /// `MissingHistory`.
    pub fn truncate_undo(&self) {
        warn!("truncating the undo log");
        self.trx_sys.lock().truncate_undo();
    }

    fn tree(&self, id: IndexId) -> DbResult<TreeHandle> {
        self.trees
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| DbError::DictionaryMismatch(format!("no tree for {}", id)))
    }

    fn purge_secondary_entries(&self, table: &TableDef, rec: &Record) -> DbResult<()> {
        let clust = table.clustered_index();
        if table.indexes.len() < 2 {
            return Ok(());
        }
        let row = self.rec_to_row(rec, clust)?;
        for sec in table.secondary_indexes() {
            let entry = row_build_index_entry(&row, clust, sec)?;
            let key = entry.sort_key(sec.n_uniq);
            self.tree(sec.id)?.write().remove(&key)?;
        }
        Ok(())
    }

    /// Full row of a clustered record with off-page fields fetched
    fn rec_to_row(&self, rec: &Record, index: &IndexDef) -> DbResult<Tuple> {
        let offsets = rec_get_offsets(rec, index)?;
        let fields = index
            .columns
            .iter()
            .enumerate()
            .map(|(n, column)| {
                let data = match rec.extern_ref(&offsets, n) {
                    Some(ext) => Some(self.read_extern_field(&ext)?),
                    None => rec.field_bytes(&offsets, n).map(<[u8]>::to_vec),
                };
                Ok(DataField { ty: column.ty, data })
            })
            .collect::<DbResult<Vec<_>>>()?;
        Ok(Tuple::from_fields(fields))
    }

    /// Moves the longest eligible fields off page until the record fits.
    fn externalize(
        &self,
        index: &IndexDef,
        tree: &IndexTree,
        fields: &mut [FieldValue],
    ) -> DbResult<BigRec> {
        let mut big_rec = BigRec::default();
        loop {
            let size = REC_HEADER_SIZE + fields.iter().map(FieldValue::stored_size).sum::<usize>();
            if tree.fits_on_page(size) {
                return Ok(big_rec);
            }

            let candidate = fields
                .iter()
                .enumerate()
                .filter_map(|(n, field)| match field {
                    FieldValue::Inline(data)
                        if index.field_can_be_extern(n)
                            && data.len() >= self.config.extern_field_threshold =>
                    {
                        Some((n, data.len()))
                    }
                    _ => None,
                })
                .max_by_key(|(_, len)| *len);

            let Some((field_no, _)) = candidate else {
                return Err(DbError::OutOfSpace(format!(
                    "record of {} bytes does not fit on a page of index {}",
                    size, index.name
                )));
            };

            let data = match std::mem::replace(&mut fields[field_no], FieldValue::Null) {
                FieldValue::Inline(data) => data,
                other => {
                    fields[field_no] = other;
                    continue;
                }
            };
            let ext = self.blobs.write().reserve(&data);
            fields[field_no] = FieldValue::Extern(ext);
            big_rec.fields.push(BigRecField {
                field_no,
                ext,
                data,
            });
        }
    }

    fn store_blobs(&self, big_rec: &BigRec) -> DbResult<()> {
        if big_rec.is_empty() {
            return Ok(());
        }
        let mut blobs = self.blobs.write();
        for field in &big_rec.fields {
            blobs.put(&field.ext, field.data.clone())?;
        }
        drop(blobs);
        self.stats.lock().blobs_written += big_rec.fields.len() as u64;
        Ok(())
    }

    /// Requests a record lock, converting the creator's implicit lock first.
    fn lock_rec(
        &self,
        trx: &mut Transaction,
        index: &IndexDef,
        key: &[u8],
        rec: &Record,
        mode: LockMode,
    ) -> DbResult<()> {
        let lock_key = LockKey::Record(index.id, key.to_vec());
        let mut locks = self.locks.lock();
        let creator = rec.trx_id();
        if creator != trx.id() && self.trx_sys.lock().is_active(creator) {
            locks.convert_implicit(creator, lock_key.clone());
        }
        match locks.enqueue(trx.id(), lock_key, mode) {
            Enqueued::Granted => Ok(()),
            Enqueued::Waiting(wait) => {
                trx.lock.wait = Some(wait);
                self.stats.lock().lock_waits += 1;
                Err(DbError::LockWait)
            }
        }
    }

    fn cursor_target(&self, pcur: &PersistentCursor) -> DbResult<(Arc<IndexDef>, Vec<u8>)> {
        let index = Arc::clone(pcur.index()?);
        let key = pcur.rec_key().ok_or(DbError::RecordNotFound)?.to_vec();
        Ok((index, key))
    }

    fn apply_update(
        index: &IndexDef,
        rec: &Record,
        update: &UpdateVector,
    ) -> DbResult<Vec<FieldValue>> {
        let offsets = rec_get_offsets(rec, index)?;
        let mut fields = rec.field_values(&offsets);
        for uf in update.fields() {
            let slot = fields.get_mut(uf.field_no).ok_or_else(|| {
                DbError::DictionaryMismatch(format!(
                    "update field {} out of range for index {}",
                    uf.field_no, index.name
                ))
            })?;
            *slot = match &uf.new_val {
                Datum::Null => FieldValue::Null,
                Datum::Bytes(data) => FieldValue::Inline(data.clone()),
            };
        }
        Ok(fields)
    }

    fn page_memo(latch: LatchMode, page_no: u32) -> MemoSlot {
        let kind = match latch {
            LatchMode::SearchLeaf => MemoKind::PageS,
            LatchMode::ModifyLeaf => MemoKind::PageX,
        };
        MemoSlot::page(kind, page_no)
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Dictionary for MemoryEngine {
    fn table_by_name(&self, name: &str) -> DbResult<Arc<TableDef>> {
        self.dict
            .read()
            .by_name
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    fn table_by_id(&self, id: TableId) -> DbResult<Arc<TableDef>> {
        self.dict
            .read()
            .by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| DbError::TableNotFound(id.to_string()))
    }
}

impl BtrCursorOps for MemoryEngine {
    fn open(
        &self,
        pcur: &mut PersistentCursor,
        tuple: &Tuple,
        mode: SearchMode,
        latch: LatchMode,
        mtr: &mut Mtr,
    ) -> DbResult<()> {
        let index = Arc::clone(pcur.index()?);
        let tree = self.tree(index.id)?;
        let tree = tree.read();

        let key = tuple.sort_key(tuple.n_fields().min(index.n_uniq));
        // Every key that starts with `key` sorts below `key + 0xFF`
        let mut upper = key.clone();
        upper.push(0xFF);

        let found = match mode {
            SearchMode::Ge => tree.next_from(Bound::Included(&key)),
            SearchMode::G => tree.next_from(Bound::Included(&upper)),
            SearchMode::Le => tree.prev_from(Bound::Excluded(&upper)),
            SearchMode::L => tree.prev_from(Bound::Excluded(&key)),
        };

        let pos = match found {
            Some((rec_key, page_no)) => {
                mtr.memo_push(Self::page_memo(latch, page_no));
                CursorPosition::On(rec_key)
            }
            None if matches!(mode, SearchMode::Ge | SearchMode::G) => CursorPosition::AfterLast,
            None => CursorPosition::BeforeFirst,
        };
        pcur.set_position(pos);
        Ok(())
    }

    fn open_leaf(
        &self,
        pcur: &mut PersistentCursor,
        from_left: bool,
        latch: LatchMode,
        mtr: &mut Mtr,
    ) -> DbResult<()> {
        let index = Arc::clone(pcur.index()?);
        let tree = self.tree(index.id)?;
        let tree = tree.read();
        let edge = if from_left {
            tree.next_from(Bound::Unbounded)
        } else {
            tree.prev_from(Bound::Unbounded)
        };
        if let Some((_, page_no)) = edge {
            mtr.memo_push(Self::page_memo(latch, page_no));
        }
        pcur.set_position(if from_left {
            CursorPosition::BeforeFirst
        } else {
            CursorPosition::AfterLast
        });
        Ok(())
    }

    fn move_to_next(&self, pcur: &mut PersistentCursor, mtr: &mut Mtr) -> DbResult<bool> {
        let index = Arc::clone(pcur.index()?);
        let tree = self.tree(index.id)?;
        let tree = tree.read();

        let next = match pcur.position() {
            CursorPosition::Unpositioned => {
                return Err(DbError::Generic("cursor is not positioned".to_string()))
            }
            CursorPosition::BeforeFirst => tree.next_from(Bound::Unbounded),
            CursorPosition::On(key) => tree.next_from(Bound::Excluded(key.as_slice())),
            CursorPosition::AfterLast => None,
        };

        match next {
            Some((key, page_no)) => {
                mtr.memo_push(MemoSlot::page(MemoKind::PageS, page_no));
                pcur.set_position(CursorPosition::On(key));
                Ok(true)
            }
            None => {
                pcur.set_position(CursorPosition::AfterLast);
                Ok(false)
            }
        }
    }

    fn get_rec(&self, pcur: &PersistentCursor, _mtr: &mut Mtr) -> DbResult<Option<Record>> {
        let Some(key) = pcur.rec_key() else {
            return Ok(None);
        };
        let tree = self.tree(pcur.index()?.id)?;
        let tree = tree.read();
        Ok(tree.get(key)?.map(|(rec, _)| rec.clone()))
    }
}

impl RowModifyOps for MemoryEngine {
    fn insert_clust_index_entry(
        &self,
        trx: &mut Transaction,
        index: &IndexDef,
        entry: &Tuple,
        mtr: &mut Mtr,
    ) -> DbResult<()> {
        entry.ensure_full_row(index)?;
        self.trx_start_if_not_started(trx);

        let key = entry.sort_key(index.n_uniq);
        let mut fields: Vec<FieldValue> = entry.fields().iter().map(FieldValue::from).collect();

        let tree = self.tree(index.id)?;
        let mut tree = tree.write();

        let existing = tree.get(&key)?.map(|(rec, _)| rec.clone());
        let page_no = match existing {
            Some(existing) => {
                // Duplicate check under an S lock; a delete-marked row with
                // the same key is taken over under an X lock.
                let deleted = existing.is_delete_marked();
                let mode = if deleted { LockMode::X } else { LockMode::S };
                self.lock_rec(trx, index, &key, &existing, mode)?;
                if !deleted {
                    return Err(DbError::DuplicateKey(index.name.clone()));
                }

                let big_rec = self.externalize(index, &tree, &mut fields)?;
                self.store_blobs(&big_rec)?;
                let roll_ptr = self.trx_sys.lock().add_undo(
                    trx.id(),
                    UndoRecord::Modify {
                        index: index.id,
                        key: key.clone(),
                        prev: existing,
                    },
                );
                tree.replace(&key, Record::build(&fields, trx.id(), roll_ptr))?
            }
            None => {
                let big_rec = self.externalize(index, &tree, &mut fields)?;
                self.store_blobs(&big_rec)?;
                let roll_ptr = self.trx_sys.lock().add_undo(
                    trx.id(),
                    UndoRecord::Insert {
                        index: index.id,
                        key: key.clone(),
                    },
                );
                tree.insert(key, Record::build(&fields, trx.id(), roll_ptr))?
            }
        };

        mtr.memo_push(MemoSlot::page(MemoKind::PageX, page_no));
        self.stats.lock().rows_inserted += 1;
        Ok(())
    }

    fn insert_sec_index_entry(
        &self,
        trx: &mut Transaction,
        index: &IndexDef,
        entry: &Tuple,
        mtr: &mut Mtr,
    ) -> DbResult<()> {
        entry.ensure_full_row(index)?;
        self.trx_start_if_not_started(trx);

        let key = entry.sort_key(index.n_uniq);
        let fields: Vec<FieldValue> = entry.fields().iter().map(FieldValue::from).collect();

        let tree = self.tree(index.id)?;
        let mut tree = tree.write();
        // Every field is part of the key, so an equal key is an equal entry
        if tree.get(&key)?.is_some() {
            return Ok(());
        }
        let roll_ptr = self.trx_sys.lock().add_undo(
            trx.id(),
            UndoRecord::Insert {
                index: index.id,
                key: key.clone(),
            },
        );
        let page_no = tree.insert(key, Record::build(&fields, trx.id(), roll_ptr))?;
        mtr.memo_push(MemoSlot::page(MemoKind::PageX, page_no));
        Ok(())
    }

    fn del_mark_set_clust_rec(
        &self,
        trx: &mut Transaction,
        pcur: &PersistentCursor,
        mtr: &mut Mtr,
    ) -> DbResult<()> {
        let (index, key) = self.cursor_target(pcur)?;
        let tree = self.tree(index.id)?;
        let mut tree = tree.write();

        let prev = tree
            .get(&key)?
            .map(|(rec, _)| rec.clone())
            .ok_or(DbError::RecordNotFound)?;
        let mut rec = prev.clone();
        let roll_ptr = self.trx_sys.lock().add_undo(
            trx.id(),
            UndoRecord::Modify {
                index: index.id,
                key: key.clone(),
                prev,
            },
        );
        rec.set_delete_mark(true);
        rec.set_trx_id(trx.id());
        rec.set_roll_ptr(roll_ptr);

        let page_no = tree.overwrite(&key, rec)?;
        mtr.memo_push(MemoSlot::page(MemoKind::PageX, page_no));
        self.stats.lock().rows_delete_marked += 1;
        Ok(())
    }

    fn update_in_place(
        &self,
        trx: &mut Transaction,
        pcur: &PersistentCursor,
        update: &UpdateVector,
        mtr: &mut Mtr,
    ) -> DbResult<()> {
        let (index, key) = self.cursor_target(pcur)?;
        let tree = self.tree(index.id)?;
        let mut tree = tree.write();

        let prev = tree
            .get(&key)?
            .map(|(rec, _)| rec.clone())
            .ok_or(DbError::RecordNotFound)?;
        let fields = Self::apply_update(&index, &prev, update)?;
        let mut rec = Record::build(&fields, trx.id(), 0);
        if rec.size() != prev.size() {
            return Err(DbError::DictionaryMismatch(
                "in-place update changes the record size".to_string(),
            ));
        }

        let roll_ptr = self.trx_sys.lock().add_undo(
            trx.id(),
            UndoRecord::Modify {
                index: index.id,
                key: key.clone(),
                prev,
            },
        );
        rec.set_roll_ptr(roll_ptr);
        let page_no = tree.overwrite(&key, rec)?;
        mtr.memo_push(MemoSlot::page(MemoKind::PageX, page_no));
        self.stats.lock().in_place_updates += 1;
        Ok(())
    }

    fn optimistic_update(
        &self,
        trx: &mut Transaction,
        pcur: &PersistentCursor,
        update: &UpdateVector,
        mtr: &mut Mtr,
    ) -> DbResult<()> {
        let (index, key) = self.cursor_target(pcur)?;
        let tree = self.tree(index.id)?;
        let mut tree = tree.write();

        let prev = tree
            .get(&key)?
            .map(|(rec, _)| rec.clone())
            .ok_or(DbError::RecordNotFound)?;
        let fields = Self::apply_update(&index, &prev, update)?;
        let mut rec = Record::build(&fields, trx.id(), 0);
        tree.check_replace_in_page(&key, rec.size())?;

        let roll_ptr = self.trx_sys.lock().add_undo(
            trx.id(),
            UndoRecord::Modify {
                index: index.id,
                key: key.clone(),
                prev,
            },
        );
        rec.set_roll_ptr(roll_ptr);
        let page_no = tree.overwrite(&key, rec)?;
        mtr.memo_push(MemoSlot::page(MemoKind::PageX, page_no));
        self.stats.lock().optimistic_updates += 1;
        Ok(())
    }

    fn pessimistic_update(
        &self,
        trx: &mut Transaction,
        pcur: &PersistentCursor,
        update: &UpdateVector,
        mtr: &mut Mtr,
    ) -> DbResult<Option<BigRec>> {
        let (index, key) = self.cursor_target(pcur)?;
        let tree = self.tree(index.id)?;
        let mut tree = tree.write();

        let prev = tree
            .get(&key)?
            .map(|(rec, _)| rec.clone())
            .ok_or(DbError::RecordNotFound)?;
        let mut fields = Self::apply_update(&index, &prev, update)?;
        let big_rec = self.externalize(&index, &tree, &mut fields)?;

        let roll_ptr = self.trx_sys.lock().add_undo(
            trx.id(),
            UndoRecord::Modify {
                index: index.id,
                key: key.clone(),
                prev,
            },
        );
        let page_no = tree.replace(&key, Record::build(&fields, trx.id(), roll_ptr))?;
        mtr.memo_push(MemoSlot::page(MemoKind::PageX, page_no));
        self.stats.lock().pessimistic_updates += 1;
        debug!(
            "pessimistic update in {}: {} fields moved off page",
            index.name,
            big_rec.fields.len()
        );

        Ok(if big_rec.is_empty() { None } else { Some(big_rec) })
    }

    fn store_big_rec_extern_fields(
        &self,
        _pcur: &PersistentCursor,
        big_rec: &BigRec,
        _mtr: &mut Mtr,
    ) -> DbResult<()> {
        self.store_blobs(big_rec)
    }

    fn x_lock_index(&self, index: &IndexDef, mtr: &mut Mtr) {
        mtr.memo_push(MemoSlot {
            kind: MemoKind::IndexX,
            object: index.id.0,
        });
    }
}

impl LockOps for MemoryEngine {
    fn lock_clust_rec(
        &self,
        trx: &mut Transaction,
        index: &IndexDef,
        rec: &Record,
        mode: LockMode,
    ) -> DbResult<()> {
        self.trx_start_if_not_started(trx);
        let offsets = rec_get_offsets(rec, index)?;
        let key = rec_sort_key(rec, &offsets, index);
        self.lock_rec(trx, index, &key, rec, mode)
    }

    fn lock_table(
        &self,
        trx: &mut Transaction,
        table: &TableDef,
        mode: LockMode,
    ) -> DbResult<()> {
        self.trx_start_if_not_started(trx);
        let enqueued = self
            .locks
            .lock()
            .enqueue(trx.id(), LockKey::Table(table.id), mode);
        match enqueued {
            Enqueued::Granted => Ok(()),
            Enqueued::Waiting(wait) => {
                trx.lock.wait = Some(wait);
                self.stats.lock().lock_waits += 1;
                Err(DbError::LockWait)
            }
        }
    }

    fn lock_wait(&self, trx: &mut Transaction) -> DbResult<()> {
        let Some(wait) = trx.lock.wait.take() else {
            return Ok(());
        };

        if self.config.deadlock_detection {
            let mut locks = self.locks.lock();
            if wait.status() == WaitStatus::Waiting && locks.in_deadlock(trx.id()) {
                wait.resolve(WaitStatus::Deadlock);
                locks.cancel_wait(trx.id());
                drop(locks);
                warn!("{} chosen as deadlock victim", trx.id());
                self.stats.lock().deadlocks += 1;
                return Err(DbError::Deadlock);
            }
        }

        let deadline = Instant::now() + self.config.lock_wait_timeout();
        match wait.wait_until(Some(deadline)) {
            WaitStatus::Granted => Ok(()),
            WaitStatus::Deadlock => Err(DbError::Deadlock),
            WaitStatus::TimedOut => Err(DbError::LockWaitTimeout),
            WaitStatus::Waiting => {
                let mut locks = self.locks.lock();
                if wait.resolve(WaitStatus::TimedOut) {
                    locks.cancel_wait(trx.id());
                    drop(locks);
                    warn!(
                        "{} gave up waiting for a lock after {} ms",
                        trx.id(),
                        self.config.lock_wait_timeout_ms
                    );
                    self.stats.lock().lock_wait_timeouts += 1;
                    return Err(DbError::LockWaitTimeout);
                }
                match wait.status() {
                    WaitStatus::Granted => Ok(()),
                    WaitStatus::TimedOut => Err(DbError::LockWaitTimeout),
                    _ => Err(DbError::Deadlock),
                }
            }
        }
    }
}

impl TrxOps for MemoryEngine {
    fn trx_start_if_not_started(&self, trx: &mut Transaction) {
        if !trx.is_active() {
            let id = self.trx_sys.lock().start();
            trx.begin(id);
            debug!("started {}", id);
        }
    }

    fn open_read_view(&self, trx: &mut Transaction) {
        self.trx_start_if_not_started(trx);
        if trx.read_view.is_none() {
            trx.read_view = Some(self.trx_sys.lock().open_view(trx.id()));
        }
    }

    fn commit(&self, trx: &mut Transaction) -> DbResult<()> {
        if !trx.is_active() {
            return Ok(());
        }
        self.trx_sys.lock().finish(trx.id());
        self.locks.lock().release_all(trx.id());
        debug!("committed {}", trx.id());
        trx.finish(TrxState::Committed);
        Ok(())
    }

    fn rollback(&self, trx: &mut Transaction) -> DbResult<()> {
        if !trx.is_active() {
            return Ok(());
        }

        let undo = self.trx_sys.lock().undo_list(trx.id());
        for record in &undo {
            match record {
                UndoRecord::Insert { index, key } => {
                    self.tree(*index)?.write().remove(key)?;
                }
                UndoRecord::Modify { index, key, prev } => {
                    self.tree(*index)?.write().replace(key, prev.clone())?;
                }
            }
        }

        self.trx_sys.lock().finish(trx.id());
        self.locks.lock().release_all(trx.id());
        debug!("rolled back {} ({} undo records)", trx.id(), undo.len());
        trx.finish(TrxState::RolledBack);
        Ok(())
    }
}

impl VersionOps for MemoryEngine {
    fn build_for_consistent_read(
        &self,
        rec: &Record,
        index: &IndexDef,
        view: &ReadView,
    ) -> DbResult<Option<Record>> {
        let trx_sys = self.trx_sys.lock();
        let mut version = rec.clone();
        loop {
            if view.changes_visible(version.trx_id()) {
                return Ok(Some(version));
            }
            let roll_ptr = version.roll_ptr();
            match trx_sys.undo_record(roll_ptr) {
                None => {
                    return Err(DbError::MissingHistory(format!(
                        "undo record {} of {} in index {}",
                        roll_ptr,
                        version.trx_id(),
                        index.name
                    )))
                }
                Some(UndoRecord::Insert { .. }) => return Ok(None),
                Some(UndoRecord::Modify { prev, .. }) => version = prev.clone(),
            }
        }
    }

    fn read_extern_field(&self, ext: &ExternRef) -> DbResult<Vec<u8>> {
        self.blobs.read().get(ext)
    }
}
