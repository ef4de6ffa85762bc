// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! RowQuery - A generic record query executor over transactional B-tree storage
//!
//! RowQuery performs single-row operations against arbitrary indexed tables
//! and takes care of the parts every caller would otherwise repeat: cursor
//! positioning, row locking with lock-wait retry, consistent reads through
//! the undo history, and the escalation from in-place to pessimistic updates.
//!
//! # Features
//!
//! - **Query Executor**: insert, delete, select-for-update, update, replace
//!   and forward scans over clustered and secondary indexes
//! - **Callback Protocol**: scans are driven by a [`RecordCallback`] that
//!   decides per record whether to process it, skip it or stop
//! - **MVCC**: readers see the row version their read view allows
//! - **Pluggable Storage**: the executor talks to storage through the
//!   [`StorageEngine`] traits; [`MemoryEngine`] is the bundled backend
//! - **Full-Text Tables**: typed helpers for full-text auxiliary, common and
//!   config tables in [`fts`]
//!
//! # Usage
//!
//! ```ignore
//! use rowquery::{ColumnType, Datum, MemoryEngine, QueryExecutor, TableBuilder, Transaction, Tuple};
//! use std::sync::Arc;
//!
//! let engine = Arc::new(MemoryEngine::new());
//! let table = engine.create_table(
//!     TableBuilder::new("t")
//!         .column("id", ColumnType::int())
//!         .column("name", ColumnType::varchar(64))
//!         .primary_key(&["id"]),
//! )?;
//!
//! let mut trx = Transaction::new();
//! let mut executor = QueryExecutor::new(engine.clone(), &mut trx);
//! let row = Tuple::build(table.clustered_index(), [Datum::from(1u64), Datum::from("one")])?;
//! executor.insert_record(&table, &row)?;
//! ```

pub mod config;
pub mod data;
pub mod dict;
pub mod error;
pub mod exec;
pub mod fts;
pub mod mtr;
pub mod rem;
pub mod storage;
pub mod trx;

pub use config::{ConfigError, ConfigResult, EngineConfig};
pub use data::{ColumnType, Datum, Tuple, UpdateVector};
pub use dict::{IndexDef, TableBuilder, TableDef};
pub use error::{DbError, DbResult};
pub use exec::{process_matching, CompareAction, FnCallback, QueryExecutor, RecordCallback, RecordView};
pub use storage::{LockMode, SearchMode, StorageEngine};
pub use trx::{Transaction, TrxId};

#[cfg(feature = "memory-engine")]
pub use storage::MemoryEngine;

/// RowQuery version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// RowQuery crate name
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
