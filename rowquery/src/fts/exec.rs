// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Typed row operations on full-text tables

use super::{
    aux_table_name, common_table_name, find_common_table, FtsAuxData, FTS_COMMON_TABLES,
    FTS_CONFIG_TABLE, FTS_NUM_AUX_INDEX,
};
use crate::data::{Datum, Tuple, UpdateVector};
use crate::dict::{IndexId, TableDef, TableId};
use crate::error::{DbError, DbResult};
use crate::exec::{QueryExecutor, RecordCallback};
use crate::storage::{LockMode, SearchMode, StorageEngine};
use crate::trx::Transaction;
use log::debug;
use std::sync::Arc;

/// Field of the `CONFIG` value column
const CONFIG_VALUE_FIELD: usize = 1;

/// Query executor bound to the full-text tables of one user table.
///
/// Tables are opened by name on first use and kept for the lifetime of the
/// executor. Every operation takes the table lock it needs first, waiting
/// for it at most once.
pub struct FtsQueryExecutor<'t> {
    executor: QueryExecutor<'t>,
    table_id: TableId,
    index_id: Option<IndexId>,
    aux_tables: [Option<Arc<TableDef>>; FTS_NUM_AUX_INDEX],
    common_tables: [Option<Arc<TableDef>>; FTS_COMMON_TABLES.len()],
}

impl<'t> FtsQueryExecutor<'t> {
    /// `index_id` names the full-text index whose auxiliary tables are
    /// used; executors that only touch common tables pass `None`.
    pub fn new(
        engine: Arc<dyn StorageEngine>,
        trx: &'t mut Transaction,
        table_id: TableId,
        index_id: Option<IndexId>,
    ) -> Self {
        Self {
            executor: QueryExecutor::new(engine, trx),
            table_id,
            index_id,
            aux_tables: Default::default(),
            common_tables: Default::default(),
        }
    }

    pub fn executor(&self) -> &QueryExecutor<'t> {
        &self.executor
    }

    fn open_aux_table(&mut self, aux_index: usize) -> DbResult<Arc<TableDef>> {
        if aux_index >= FTS_NUM_AUX_INDEX {
            return Err(DbError::Generic(format!(
                "auxiliary table {} out of range",
                aux_index
            )));
        }
        if let Some(table) = &self.aux_tables[aux_index] {
            return Ok(Arc::clone(table));
        }
        let index_id = self.index_id.ok_or_else(|| {
            DbError::Generic("no full-text index bound to this executor".to_string())
        })?;
        let name = aux_table_name(self.table_id, index_id, aux_index);
        let table = self.executor.engine().table_by_name(&name)?;
        debug!("opened {}", name);
        self.aux_tables[aux_index] = Some(Arc::clone(&table));
        Ok(table)
    }

    fn open_common_table(&mut self, suffix: &str) -> DbResult<Arc<TableDef>> {
        let slot = find_common_table(suffix)
            .ok_or_else(|| DbError::Generic(format!("unknown common table {}", suffix)))?;
        if let Some(table) = &self.common_tables[slot] {
            return Ok(Arc::clone(table));
        }
        let name = common_table_name(self.table_id, suffix);
        let table = self.executor.engine().table_by_name(&name)?;
        debug!("opened {}", name);
        self.common_tables[slot] = Some(Arc::clone(&table));
        Ok(table)
    }

    fn lock(&mut self, table: &TableDef, mode: LockMode) -> DbResult<()> {
        match self.executor.lock_table(table, mode) {
            Err(DbError::LockWait) => self.executor.handle_wait(DbError::LockWait, true),
            other => other,
        }
    }

    fn aux_table(&mut self, aux_index: usize, mode: LockMode) -> DbResult<Arc<TableDef>> {
        let table = self.open_aux_table(aux_index)?;
        self.lock(&table, mode)?;
        Ok(table)
    }

    fn common_table(&mut self, suffix: &str, mode: LockMode) -> DbResult<Arc<TableDef>> {
        let table = self.open_common_table(suffix)?;
        self.lock(&table, mode)?;
        Ok(table)
    }

    /// Inserts one posting row into auxiliary table `aux_index`.
    pub fn insert_aux_record(&mut self, aux_index: usize, data: &FtsAuxData) -> DbResult<()> {
        let table = self.aux_table(aux_index, LockMode::IX)?;
        let index = table.clustered_index();
        if index.n_fields() != 5 || index.n_uniq != 2 {
            return Err(shape_mismatch(&table));
        }
        let row = Tuple::build(
            index,
            [
                Datum::from(data.word.as_str()),
                Datum::from(data.first_doc_id),
                Datum::from(data.last_doc_id),
                Datum::from(data.doc_count),
                Datum::from(data.ilist.as_slice()),
            ],
        )?;
        self.executor.insert_record(&table, &row)
    }

    /// Inserts a document id into a deleted-document table.
    pub fn insert_common_record(&mut self, suffix: &str, doc_id: u64) -> DbResult<()> {
        let table = self.common_table(suffix, LockMode::IX)?;
        let index = table.clustered_index();
        if index.n_fields() != 1 || index.n_uniq != 1 {
            return Err(shape_mismatch(&table));
        }
        let row = Tuple::build(index, [doc_id])?;
        self.executor.insert_record(&table, &row)
    }

    pub fn insert_config_record(&mut self, key: &str, value: &str) -> DbResult<()> {
        let table = self.config_table()?;
        let row = Tuple::build(table.clustered_index(), [key, value])?;
        self.executor.insert_record(&table, &row)
    }

    /// Delete-marks every row of `data.word` in auxiliary table `aux_index`.
    pub fn delete_aux_record(&mut self, aux_index: usize, data: &FtsAuxData) -> DbResult<usize> {
        let table = self.aux_table(aux_index, LockMode::IX)?;
        if table.secondary_indexes().next().is_some() {
            return Err(shape_mismatch(&table));
        }
        let key = Tuple::build(table.clustered_index(), [data.word.as_str()])?;
        self.executor.delete_record(&table, &key)
    }

    pub fn delete_common_record(&mut self, suffix: &str, doc_id: u64) -> DbResult<usize> {
        let table = self.common_table(suffix, LockMode::IX)?;
        let key = Tuple::build(table.clustered_index(), [doc_id])?;
        self.executor.delete_record(&table, &key)
    }

    /// Delete-marks every row of a common table under an exclusive table
    /// lock.
    pub fn delete_all_common_records(&mut self, suffix: &str) -> DbResult<usize> {
        let table = self.common_table(suffix, LockMode::X)?;
        self.executor.delete_all(&table)
    }

    pub fn delete_config_record(&mut self, key: &str) -> DbResult<usize> {
        let table = self.config_table()?;
        let search = Tuple::build(table.clustered_index(), [key])?;
        self.executor.delete_record(&table, &search)
    }

    /// Sets `key` to `value`, inserting the key if it is not there yet.
    pub fn update_config_record(&mut self, key: &str, value: &str) -> DbResult<()> {
        let table = self.config_table()?;
        let index = table.clustered_index();
        let search = Tuple::build(index, [key])?;
        let insert = Tuple::build(index, [key, value])?;
        let update = UpdateVector::new().set(CONFIG_VALUE_FIELD, value);
        self.executor.replace_record(&table, &search, &update, &insert)
    }

    /// Selects the row of `key` for update and hands it to `callback`.
    ///
    /// On success the row stays latched until [`Self::release_lock`].
    pub fn read_config_with_lock(
        &mut self,
        key: &str,
        callback: &mut dyn RecordCallback,
    ) -> DbResult<()> {
        let table = self.config_table()?;
        let search = Tuple::build(table.clustered_index(), [key])?;
        self.executor
            .select_for_update(&table, &search, Some(callback))
    }

    /// Scans auxiliary table `aux_index` from `word` on.
    pub fn read_aux(
        &mut self,
        aux_index: usize,
        word: &str,
        mode: SearchMode,
        callback: &mut dyn RecordCallback,
    ) -> DbResult<()> {
        let table = self.aux_table(aux_index, LockMode::IS)?;
        let search = Tuple::build(table.clustered_index(), [word])?;
        self.executor.read(&table, Some(&search), mode, callback)
    }

    pub fn read_aux_all(
        &mut self,
        aux_index: usize,
        callback: &mut dyn RecordCallback,
    ) -> DbResult<()> {
        let table = self.aux_table(aux_index, LockMode::IS)?;
        self.executor.read(&table, None, SearchMode::Ge, callback)
    }

    pub fn read_all_common(
        &mut self,
        suffix: &str,
        callback: &mut dyn RecordCallback,
    ) -> DbResult<()> {
        let table = self.common_table(suffix, LockMode::IS)?;
        self.executor.read(&table, None, SearchMode::Ge, callback)
    }

    /// Releases the row latched by [`Self::read_config_with_lock`].
    pub fn release_lock(&mut self) {
        self.executor.commit_mtr();
    }

    fn config_table(&mut self) -> DbResult<Arc<TableDef>> {
        let table = self.common_table(FTS_CONFIG_TABLE, LockMode::IX)?;
        let index = table.clustered_index();
        if index.n_fields() != 2 || index.n_uniq != 1 {
            return Err(shape_mismatch(&table));
        }
        Ok(table)
    }
}

fn shape_mismatch(table: &TableDef) -> DbError {
    DbError::DictionaryMismatch(format!(
        "{} does not have the layout of a full-text table",
        table.name
    ))
}
