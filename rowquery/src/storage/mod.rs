// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Storage engine seam
//!
//! This module provides:
//! - The traits the executor calls the storage engine through
//! - The persistent cursor and the search, latch and lock modes
//! - An in-memory engine implementing every trait (feature `memory-engine`)

pub mod cursor;
#[cfg(feature = "memory-engine")]
pub mod memory;
pub mod traits;
pub mod types;

pub use cursor::{CursorPosition, PersistentCursor};
#[cfg(feature = "memory-engine")]
pub use memory::{EngineStats, IndexStats, MemoryEngine};
pub use traits::{
    BtrCursorOps, Dictionary, LockOps, RowModifyOps, StorageEngine, TrxOps, VersionOps,
};
pub use types::{BigRec, BigRecField, LatchMode, LockMode, SearchMode};
