// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Conversions between clustered rows and secondary index entries

use super::{Record, RecordOffsets};
use crate::data::{DataField, Tuple};
use crate::dict::IndexDef;
use crate::error::{DbError, DbResult};

/// Builds the clustered key a secondary record refers to.
pub fn build_clust_ref(
    sec_rec: &Record,
    sec_offsets: &RecordOffsets,
    sec_index: &IndexDef,
    clust_index: &IndexDef,
) -> DbResult<Tuple> {
    if sec_index.clust_ref.len() != clust_index.n_uniq {
        return Err(DbError::DictionaryMismatch(format!(
            "index {} references {} clustered fields, {} has {}",
            sec_index.name,
            sec_index.clust_ref.len(),
            clust_index.name,
            clust_index.n_uniq
        )));
    }

    let fields = sec_index
        .clust_ref
        .iter()
        .zip(clust_index.columns.iter())
        .map(|(&pos, column)| DataField {
            ty: column.ty,
            data: sec_rec.field_bytes(sec_offsets, pos).map(<[u8]>::to_vec),
        })
        .collect();

    Ok(Tuple::from_fields(fields))
}

/// Builds the entry of `sec_index` for a full clustered row.
pub fn row_build_index_entry(
    row: &Tuple,
    clust_index: &IndexDef,
    sec_index: &IndexDef,
) -> DbResult<Tuple> {
    let fields = sec_index
        .columns
        .iter()
        .map(|column| {
            clust_index
                .column_position(&column.name)
                .and_then(|pos| row.field(pos))
                .cloned()
                .ok_or_else(|| {
                    DbError::DictionaryMismatch(format!(
                        "column {} of {} missing from row",
                        column.name, sec_index.name
                    ))
                })
        })
        .collect::<DbResult<Vec<_>>>()?;

    Ok(Tuple::from_fields(fields))
}
