// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Consistent-read version resolution

use super::callback::{RecordCallback, RecordView};
use crate::dict::IndexDef;
use crate::error::DbResult;
use crate::rem::{rec_get_offsets, Record, RecordOffsets};
use crate::storage::StorageEngine;
use crate::trx::{ReadView, Transaction};
use log::error;
use std::borrow::Cow;

/// The version of `rec` the reader should see, or `None` when the row is
/// deleted or did not exist in the reader's snapshot.
pub(crate) fn visible_version<'r>(
    engine: &dyn StorageEngine,
    view: Option<&ReadView>,
    index: &IndexDef,
    rec: &'r Record,
) -> DbResult<Option<Cow<'r, Record>>> {
    let version = match view {
        Some(view) if !view.changes_visible(rec.trx_id()) => {
            match engine.build_for_consistent_read(rec, index, view)? {
                Some(version) => Cow::Owned(version),
                None => return Ok(None),
            }
        }
        _ => Cow::Borrowed(rec),
    };
    Ok((!version.is_delete_marked()).then_some(version))
}

/// Like [`visible_version`], logging a failure of the version builder.
pub(crate) fn resolve_version<'r>(
    engine: &dyn StorageEngine,
    trx: &Transaction,
    index: &IndexDef,
    rec: &'r Record,
) -> DbResult<Option<Cow<'r, Record>>> {
    visible_version(engine, trx.read_view.as_ref(), index, rec).inspect_err(|e| {
        error!("{}: cannot build row version in {}: {}", trx.id(), index.name, e);
    })
}

/// Hands the visible version of `rec` to `callback`.
///
/// Returns whether the scan should continue. A failure of the version
/// builder ends the scan and is returned as is.
pub(crate) fn process_record_with_mvcc(
    engine: &dyn StorageEngine,
    trx: &Transaction,
    index: &IndexDef,
    rec: &Record,
    offsets: &RecordOffsets,
    callback: &mut dyn RecordCallback,
) -> DbResult<bool> {
    let Some(version) = resolve_version(engine, trx, index, rec)? else {
        return Ok(true);
    };

    match version {
        Cow::Borrowed(current) => {
            callback.process_record(&RecordView::new(engine, current, index, offsets))
        }
        Cow::Owned(old) => {
            // Offsets are never reused across records
            let old_offsets = rec_get_offsets(&old, index)?;
            callback.process_record(&RecordView::new(engine, &old, index, &old_offsets))
        }
    }
}
