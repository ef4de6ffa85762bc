// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Fetching the clustered row a secondary index record points to

use super::callback::{RecordCallback, RecordView};
use super::mvcc::resolve_version;
use crate::dict::IndexDef;
use crate::error::{DbError, DbResult};
use crate::mtr::Mtr;
use crate::rem::{build_clust_ref, cmp_dtuple_rec, rec_get_offsets, Record, RecordOffsets};
use crate::storage::{LatchMode, PersistentCursor, SearchMode, StorageEngine};
use crate::trx::Transaction;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LookupOutcome {
    /// A clustered record with exactly the referenced key exists
    pub matched: bool,
    pub keep_scanning: bool,
}

impl LookupOutcome {
    const NO_MATCH: Self = Self {
        matched: false,
        keep_scanning: true,
    };
}

/// Looks up the clustered record `sec_rec` refers to and runs version
/// resolution on it.
///
/// A visible version whose indexed columns differ from `sec_rec` is not
/// handed to the callback and does not count as a match. Such entries are
/// left behind when a delete-marked row is reused by an insert with other
/// values, or belong to a version newer than the reader's snapshot.
///
/// Latches taken for the lookup are released before returning, whatever the
/// outcome, so the caller's scan position in the secondary index is kept.
#[allow(clippy::too_many_arguments)]
pub(crate) fn lookup_clustered_record(
    engine: &dyn StorageEngine,
    trx: &Transaction,
    mtr: &mut Mtr,
    sec_index: &IndexDef,
    clust_index: &Arc<IndexDef>,
    sec_rec: &Record,
    sec_offsets: &RecordOffsets,
    callback: &mut dyn RecordCallback,
) -> DbResult<LookupOutcome> {
    let clust_ref = build_clust_ref(sec_rec, sec_offsets, sec_index, clust_index)?;
    let mut clust_pcur = PersistentCursor::new();
    clust_pcur.bind(Arc::clone(clust_index));

    let savepoint = mtr.savepoint();
    let outcome = (|| -> DbResult<LookupOutcome> {
        engine.open(
            &mut clust_pcur,
            &clust_ref,
            SearchMode::Le,
            LatchMode::SearchLeaf,
            mtr,
        )?;
        let Some(clust_rec) = engine.get_rec(&clust_pcur, mtr)? else {
            return Ok(LookupOutcome::NO_MATCH);
        };
        let clust_offsets = rec_get_offsets(&clust_rec, clust_index)?;
        // The row may have been purged since the secondary entry was read
        if cmp_dtuple_rec(&clust_ref, &clust_rec, &clust_offsets) != Ordering::Equal {
            return Ok(LookupOutcome::NO_MATCH);
        }
        let Some(version) = resolve_version(engine, trx, clust_index, &clust_rec)? else {
            // Deleted, or not yet inserted in this snapshot
            return Ok(LookupOutcome {
                matched: true,
                keep_scanning: true,
            });
        };
        let old_offsets;
        let version_offsets = match &version {
            Cow::Borrowed(_) => &clust_offsets,
            Cow::Owned(old) => {
                old_offsets = rec_get_offsets(old, clust_index)?;
                &old_offsets
            }
        };

        let view = RecordView::new(engine, &version, clust_index, version_offsets);
        if !sec_rec_is_for_clust_rec(sec_rec, sec_offsets, sec_index, &view)? {
            return Ok(LookupOutcome::NO_MATCH);
        }
        let keep_scanning = callback.process_record(&view)?;
        Ok(LookupOutcome {
            matched: true,
            keep_scanning,
        })
    })();
    mtr.rollback_to_savepoint(savepoint);
    outcome
}

/// True if every column of `sec_rec` equals the same column of the
/// clustered version, under the column's collation.
fn sec_rec_is_for_clust_rec(
    sec_rec: &Record,
    sec_offsets: &RecordOffsets,
    sec_index: &IndexDef,
    clust: &RecordView<'_>,
) -> DbResult<bool> {
    for (n, column) in sec_index.columns.iter().enumerate() {
        let pos = clust.index().column_position(&column.name).ok_or_else(|| {
            DbError::DictionaryMismatch(format!(
                "column {} of {} missing from {}",
                column.name,
                sec_index.name,
                clust.index().name
            ))
        })?;
        let clust_field = clust.field(pos)?;
        if column.ty.compare(sec_rec.field_bytes(sec_offsets, n), clust_field.as_deref())
            != Ordering::Equal
        {
            return Ok(false);
        }
    }
    Ok(true)
}
