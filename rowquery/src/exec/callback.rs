// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Comparison-action protocol driving scans
//!
//! For every record a scan visits, the callback first decides what to do
//! with it ([`CompareAction`]); matching records are then handed to
//! [`RecordCallback::process_record`], which tells the scan whether to go on.

use crate::data::{decode_u32, decode_u64, Tuple};
use crate::dict::IndexDef;
use crate::error::{DbError, DbResult};
use crate::rem::{cmp_dtuple_rec, Record, RecordOffsets};
use crate::storage::StorageEngine;
use crate::trx::TrxId;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

/// Decision taken for one scanned record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareAction {
    /// The record matches; hand it to the processor
    Process,
    /// The record does not match but later ones may
    Skip,
    /// No later record in scan order can match
    Stop,
}

/// Read access to the record under a scan, valid for one callback invocation.
pub struct RecordView<'a> {
    engine: &'a dyn StorageEngine,
    rec: &'a Record,
    index: &'a IndexDef,
    offsets: &'a RecordOffsets,
}

impl<'a> RecordView<'a> {
    pub(crate) fn new(
        engine: &'a dyn StorageEngine,
        rec: &'a Record,
        index: &'a IndexDef,
        offsets: &'a RecordOffsets,
    ) -> Self {
        Self {
            engine,
            rec,
            index,
            offsets,
        }
    }

    pub fn record(&self) -> &'a Record {
        self.rec
    }

    pub fn index(&self) -> &'a IndexDef {
        self.index
    }

    pub fn offsets(&self) -> &'a RecordOffsets {
        self.offsets
    }

    pub fn n_fields(&self) -> usize {
        self.offsets.n_fields()
    }

    pub fn trx_id(&self) -> TrxId {
        self.rec.trx_id()
    }

    pub fn is_delete_marked(&self) -> bool {
        self.rec.is_delete_marked()
    }

    pub fn is_null(&self, n: usize) -> bool {
        self.offsets.field(n).is_some_and(|f| f.is_null())
    }

    /// Value of field `n`; off-page fields are fetched transparently.
    ///
    /// `None` is SQL NULL.
    pub fn field(&self, n: usize) -> DbResult<Option<Cow<'a, [u8]>>> {
        let offset = self.offsets.field(n).ok_or_else(|| {
            DbError::DictionaryMismatch(format!(
                "field {} out of range for index {}",
                n, self.index.name
            ))
        })?;
        if offset.is_extern() {
            let ext = self
                .rec
                .extern_ref(self.offsets, n)
                .ok_or_else(|| DbError::Corruption(format!("bad external reference in field {}", n)))?;
            return Ok(Some(Cow::Owned(self.engine.read_extern_field(&ext)?)));
        }
        Ok(self.rec.field_bytes(self.offsets, n).map(Cow::Borrowed))
    }

    pub fn field_u64(&self, n: usize) -> DbResult<Option<u64>> {
        self.field(n)?
            .map(|data| decode_u64(&data).ok_or_else(|| self.bad_width(n, 8)))
            .transpose()
    }

    pub fn field_u32(&self, n: usize) -> DbResult<Option<u32>> {
        self.field(n)?
            .map(|data| decode_u32(&data).ok_or_else(|| self.bad_width(n, 4)))
            .transpose()
    }

    /// Field `n` as text; invalid UTF-8 is replaced.
    pub fn field_string(&self, n: usize) -> DbResult<Option<String>> {
        Ok(self
            .field(n)?
            .map(|data| String::from_utf8_lossy(&data).into_owned()))
    }

    /// Orders `tuple` against this record on the tuple's fields.
    pub fn compare(&self, tuple: &Tuple) -> Ordering {
        cmp_dtuple_rec(tuple, self.rec, self.offsets)
    }

    fn bad_width(&self, n: usize, width: usize) -> DbError {
        DbError::Corruption(format!(
            "field {} of {} is not {} bytes wide",
            n, self.index.name, width
        ))
    }
}

impl fmt::Debug for RecordView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordView")
            .field("index", &self.index.name)
            .field("trx_id", &self.rec.trx_id())
            .field("n_fields", &self.offsets.n_fields())
            .finish()
    }
}

/// Caller-supplied logic of a scan
pub trait RecordCallback {
    /// Decides what to do with `rec`.
    ///
    /// The default processes every record of a full scan and, for keyed
    /// scans, every record equal to `search` on its fields, stopping at the
    /// first one that is not.
    fn compare_record(&mut self, search: Option<&Tuple>, rec: &RecordView<'_>) -> CompareAction {
        match search {
            None => CompareAction::Process,
            Some(tuple) if rec.compare(tuple) == Ordering::Equal => CompareAction::Process,
            Some(_) => CompareAction::Stop,
        }
    }

    /// Handles a matching record; returns false to end the scan.
    fn process_record(&mut self, rec: &RecordView<'_>) -> DbResult<bool>;
}

/// Callback assembled from a comparator and a processor closure
pub struct FnCallback<C, P> {
    compare: C,
    process: P,
}

impl<C, P> FnCallback<C, P>
where
    C: FnMut(Option<&Tuple>, &RecordView<'_>) -> CompareAction,
    P: FnMut(&RecordView<'_>) -> DbResult<bool>,
{
    pub fn new(compare: C, process: P) -> Self {
        Self { compare, process }
    }
}

impl<C, P> RecordCallback for FnCallback<C, P>
where
    C: FnMut(Option<&Tuple>, &RecordView<'_>) -> CompareAction,
    P: FnMut(&RecordView<'_>) -> DbResult<bool>,
{
    fn compare_record(&mut self, search: Option<&Tuple>, rec: &RecordView<'_>) -> CompareAction {
        (self.compare)(search, rec)
    }

    fn process_record(&mut self, rec: &RecordView<'_>) -> DbResult<bool> {
        (self.process)(rec)
    }
}

/// Processes every record the default comparison accepts
pub fn process_matching<P>(process: P) -> impl RecordCallback
where
    P: FnMut(&RecordView<'_>) -> DbResult<bool>,
{
    struct Matching<P>(P);

    impl<P> RecordCallback for Matching<P>
    where
        P: FnMut(&RecordView<'_>) -> DbResult<bool>,
    {
        fn process_record(&mut self, rec: &RecordView<'_>) -> DbResult<bool> {
            (self.0)(rec)
        }
    }

    Matching(process)
}
