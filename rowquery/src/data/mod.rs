// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Typed values handed to the executor: column types, tuples and update vectors

pub mod tuple;
pub mod types;
pub mod update;

pub use tuple::{DataField, Datum, Tuple};
pub use types::{
    decode_u32, decode_u64, encode_u32, encode_u64, Collation, ColumnType, DataKind,
};
pub use update::{UpdateField, UpdateVector};
