// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Callbacks that decode full-text table rows

use super::FtsAuxData;
use crate::data::Tuple;
use crate::error::{DbError, DbResult};
use crate::exec::{CompareAction, RecordCallback, RecordView};
use std::cmp::Ordering;

/// Collects the document ids of a deleted-document table.
#[derive(Debug, Default)]
pub struct CommonTableReader {
    doc_ids: Vec<u64>,
}

impl CommonTableReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn doc_ids(&self) -> &[u64] {
        &self.doc_ids
    }

    pub fn clear(&mut self) {
        self.doc_ids.clear();
    }
}

impl RecordCallback for CommonTableReader {
    fn compare_record(&mut self, _search: Option<&Tuple>, _rec: &RecordView<'_>) -> CompareAction {
        CompareAction::Process
    }

    fn process_record(&mut self, rec: &RecordView<'_>) -> DbResult<bool> {
        if let Some(doc_id) = rec.field_u64(0)? {
            self.doc_ids.push(doc_id);
        }
        Ok(true)
    }
}

/// Reads the value of one `CONFIG` key.
#[derive(Debug, Default)]
pub struct ConfigReader {
    value: Option<String>,
}

impl ConfigReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// The value read, empty if the row had none
    pub fn value(&self) -> &str {
        self.value.as_deref().unwrap_or_default()
    }

    pub fn into_value(self) -> String {
        self.value.unwrap_or_default()
    }
}

impl RecordCallback for ConfigReader {
    fn compare_record(&mut self, search: Option<&Tuple>, rec: &RecordView<'_>) -> CompareAction {
        match search {
            None => CompareAction::Process,
            Some(tuple) if rec.compare(tuple) == Ordering::Equal => CompareAction::Process,
            Some(_) => CompareAction::Stop,
        }
    }

    fn process_record(&mut self, rec: &RecordView<'_>) -> DbResult<bool> {
        self.value = rec.field_string(1)?.filter(|value| !value.is_empty());
        Ok(false)
    }
}

/// Collects the posting rows of auxiliary table records.
///
/// Keyed scans stop at the first word that differs from the search word;
/// `limit` caps the number of rows collected.
#[derive(Debug, Default)]
pub struct AuxRecordReader {
    rows: Vec<FtsAuxData>,
    limit: Option<usize>,
}

impl AuxRecordReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            rows: Vec::new(),
            limit: Some(limit),
        }
    }

    pub fn rows(&self) -> &[FtsAuxData] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<FtsAuxData> {
        self.rows
    }
}

impl RecordCallback for AuxRecordReader {
    fn compare_record(&mut self, search: Option<&Tuple>, rec: &RecordView<'_>) -> CompareAction {
        match search {
            None => CompareAction::Process,
            Some(word) if rec.compare(word) == Ordering::Equal => CompareAction::Process,
            Some(_) => CompareAction::Stop,
        }
    }

    fn process_record(&mut self, rec: &RecordView<'_>) -> DbResult<bool> {
        let missing = |n: usize| {
            DbError::Corruption(format!(
                "auxiliary record in {} has no field {}",
                rec.index().name,
                n
            ))
        };
        let row = FtsAuxData {
            word: rec.field_string(0)?.ok_or_else(|| missing(0))?,
            first_doc_id: rec.field_u64(1)?.ok_or_else(|| missing(1))?,
            last_doc_id: rec.field_u64(2)?.ok_or_else(|| missing(2))?,
            doc_count: rec.field_u32(3)?.ok_or_else(|| missing(3))?,
            ilist: rec
                .field(4)?
                .map(|ilist| ilist.into_owned())
                .ok_or_else(|| missing(4))?,
        };
        self.rows.push(row);
        Ok(self.limit.map_or(true, |limit| self.rows.len() < limit))
    }
}
