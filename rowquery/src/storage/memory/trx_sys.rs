// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Transaction system and undo log of the in-memory engine

use crate::dict::IndexId;
use crate::rem::Record;
use crate::trx::{ReadView, TrxId};
use std::collections::HashMap;

/// How to undo one change
#[derive(Debug, Clone)]
pub(crate) enum UndoRecord {
    /// A fresh record; undone by removing it
    Insert { index: IndexId, key: Vec<u8> },
    /// A modified record; `prev` is the full previous image
    Modify {
        index: IndexId,
        key: Vec<u8>,
        prev: Record,
    },
}

#[derive(Debug)]
pub(crate) struct UndoEntry {
    pub trx: TrxId,
    pub record: UndoRecord,
}

#[derive(Debug)]
pub(crate) struct TrxSys {
    next_id: u64,
    /// Active transactions and the roll pointers of their undo records
    active: HashMap<TrxId, Vec<u64>>,
    /// Up-limit id of every open read view, by owner
    views: HashMap<TrxId, TrxId>,
    undo: HashMap<u64, UndoEntry>,
    next_roll_ptr: u64,
}

impl Default for TrxSys {
    fn default() -> Self {
        Self {
            next_id: 1,
            active: HashMap::new(),
            views: HashMap::new(),
            undo: HashMap::new(),
            next_roll_ptr: 1,
        }
    }
}

impl TrxSys {
    pub fn start(&mut self) -> TrxId {
        let id = TrxId(self.next_id);
        self.next_id += 1;
        self.active.insert(id, Vec::new());
        id
    }

    pub fn is_active(&self, id: TrxId) -> bool {
        self.active.contains_key(&id)
    }

    pub fn n_active(&self) -> usize {
        self.active.len()
    }

    pub fn open_view(&mut self, creator: TrxId) -> ReadView {
        let view = ReadView::new(creator, TrxId(self.next_id), self.active.keys().copied());
        self.views.insert(creator, view.up_limit_id());
        view
    }

    /// Appends an undo record for `trx` and returns its roll pointer.
    pub fn add_undo(&mut self, trx: TrxId, record: UndoRecord) -> u64 {
        let roll_ptr = self.next_roll_ptr;
        self.next_roll_ptr += 1;
        self.undo.insert(roll_ptr, UndoEntry { trx, record });
        if let Some(list) = self.active.get_mut(&trx) {
            list.push(roll_ptr);
        }
        roll_ptr
    }

    pub fn undo_record(&self, roll_ptr: u64) -> Option<&UndoRecord> {
        self.undo.get(&roll_ptr).map(|entry| &entry.record)
    }

    /// Undo records of an active `trx`, newest first
    pub fn undo_list(&self, trx: TrxId) -> Vec<UndoRecord> {
        self.active
            .get(&trx)
            .map(|roll_ptrs| {
                roll_ptrs
                    .iter()
                    .rev()
                    .filter_map(|ptr| self.undo.get(ptr).map(|entry| entry.record.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Ends `trx` and returns its undo records, newest first.
    pub fn finish(&mut self, trx: TrxId) -> Vec<UndoRecord> {
        let undo = self.undo_list(trx);
        self.views.remove(&trx);
        self.active.remove(&trx);
        undo
    }

    /// Ids below this are visible to every open and future read view
    pub fn purge_limit(&self) -> TrxId {
        self.views
            .values()
            .copied()
            .min()
            .unwrap_or(TrxId(self.next_id))
    }

    /// Drops undo records no read view can need any more.
    pub fn purge_undo(&mut self) -> usize {
        let limit = self.purge_limit();
        let before = self.undo.len();
        let active = &self.active;
        self.undo
            .retain(|_, entry| entry.trx >= limit || active.contains_key(&entry.trx));
        before - self.undo.len()
    }

    pub fn truncate_undo(&mut self) {
        self.undo.clear();
    }

    pub fn n_undo(&self) -> usize {
        self.undo.len()
    }
}
