// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Field boundaries of a record

use super::record::{Record, EXTERN_REF_SIZE, FIELD_EXTERN, FIELD_NULL, REC_HEADER_SIZE};
use crate::dict::IndexDef;
use crate::error::{DbError, DbResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldOffset {
    /// Start of the field data within the record
    pub start: usize,
    pub len: usize,
    null: bool,
    external: bool,
}

impl FieldOffset {
    pub fn is_null(&self) -> bool {
        self.null
    }

    pub fn is_extern(&self) -> bool {
        self.external
    }
}

/// Field boundaries of one record.
///
/// Offsets borrow nothing but describe exactly one record image; they are
/// recomputed for every record visited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOffsets {
    fields: Vec<FieldOffset>,
}

impl RecordOffsets {
    pub fn n_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, n: usize) -> Option<&FieldOffset> {
        self.fields.get(n)
    }

    pub fn has_extern(&self) -> bool {
        self.fields.iter().any(FieldOffset::is_extern)
    }
}

/// Parses the field directory of `rec` as a record of `index`.
pub fn rec_get_offsets(rec: &Record, index: &IndexDef) -> DbResult<RecordOffsets> {
    let bytes = rec.as_bytes();
    if bytes.len() < REC_HEADER_SIZE {
        return Err(DbError::Corruption(format!(
            "record of {} bytes in index {} is shorter than its header",
            bytes.len(),
            index.name
        )));
    }

    let n_fields = rec.n_fields_stored();
    if n_fields != index.n_fields() {
        return Err(DbError::Corruption(format!(
            "record has {} fields, index {} expects {}",
            n_fields,
            index.name,
            index.n_fields()
        )));
    }

    let mut fields = Vec::with_capacity(n_fields);
    let mut pos = REC_HEADER_SIZE;
    for (n, column) in index.columns.iter().enumerate() {
        let header = bytes
            .get(pos..pos + 4)
            .and_then(|h| h.try_into().ok())
            .map(u32::from_be_bytes)
            .ok_or_else(|| corrupt(index, n, "truncated field header"))?;
        pos += 4;

        if header == FIELD_NULL {
            if !column.ty.nullable {
                return Err(corrupt(index, n, "NULL in NOT NULL column"));
            }
            fields.push(FieldOffset {
                start: pos,
                len: 0,
                null: true,
                external: false,
            });
            continue;
        }

        let external = header & FIELD_EXTERN != 0;
        let len = (header & !FIELD_EXTERN) as usize;
        if pos + len > bytes.len() {
            return Err(corrupt(index, n, "field runs past end of record"));
        }
        if external {
            if !index.field_can_be_extern(n) || len != EXTERN_REF_SIZE {
                return Err(corrupt(index, n, "invalid off-page reference"));
            }
        } else if column.ty.fixed_len().is_some_and(|fixed| fixed != len) {
            return Err(corrupt(index, n, "fixed-length field has wrong length"));
        }

        fields.push(FieldOffset {
            start: pos,
            len,
            null: false,
            external,
        });
        pos += len;
    }

    if pos != bytes.len() {
        return Err(DbError::Corruption(format!(
            "{} trailing bytes after record in index {}",
            bytes.len() - pos,
            index.name
        )));
    }

    Ok(RecordOffsets { fields })
}

fn corrupt(index: &IndexDef, n: usize, what: &str) -> DbError {
    DbError::Corruption(format!("index {} field {}: {}", index.name, n, what))
}
