// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Comparison of search tuples against records

use super::{Record, RecordOffsets};
use crate::data::Tuple;
use crate::dict::IndexDef;
use std::cmp::Ordering;

/// Compares the fields of `tuple` with the leading fields of `rec`.
///
/// Returns the ordering of the tuple relative to the record and the number
/// of leading fields that compared equal. Only the tuple's fields take part,
/// so a key prefix compares `Equal` with every record that starts with it.
/// Search tuples cover ordering fields, which are never stored off page.
pub fn cmp_dtuple_rec_with_match(
    tuple: &Tuple,
    rec: &Record,
    offsets: &RecordOffsets,
) -> (Ordering, usize) {
    for (n, field) in tuple.fields().iter().enumerate() {
        if n >= offsets.n_fields() {
            return (Ordering::Greater, n);
        }
        let ord = field.ty.compare(field.bytes(), rec.field_bytes(offsets, n));
        if ord != Ordering::Equal {
            return (ord, n);
        }
    }
    (Ordering::Equal, tuple.n_fields())
}

pub fn cmp_dtuple_rec(tuple: &Tuple, rec: &Record, offsets: &RecordOffsets) -> Ordering {
    cmp_dtuple_rec_with_match(tuple, rec, offsets).0
}

/// Memcomparable key of the record's unique prefix in `index`
pub fn rec_sort_key(rec: &Record, offsets: &RecordOffsets, index: &IndexDef) -> Vec<u8> {
    let mut key = Vec::new();
    for (n, column) in index.columns.iter().take(index.n_uniq).enumerate() {
        column.ty.encode_key(&mut key, rec.field_bytes(offsets, n));
    }
    key
}
