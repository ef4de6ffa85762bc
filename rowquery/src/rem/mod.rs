// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Record manager: physical records, field offsets and comparison

pub mod compare;
pub mod offsets;
pub mod record;
pub mod row;

pub use compare::{cmp_dtuple_rec, cmp_dtuple_rec_with_match, rec_sort_key};
pub use offsets::{rec_get_offsets, FieldOffset, RecordOffsets};
pub use record::{ExternRef, FieldValue, Record, EXTERN_REF_SIZE};
pub use row::{build_clust_ref, row_build_index_entry};
