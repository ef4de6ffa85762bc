// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query execution
//!
//! This module provides the record query executor together with the pieces
//! its operations are built from: the comparison-action protocol driving
//! scans, consistent-read version resolution, the lock-wait protocol and the
//! secondary-to-clustered lookup.

pub mod callback;
mod clustered_lookup;
pub mod executor;
mod lock_wait;
mod mvcc;

pub use callback::{process_matching, CompareAction, FnCallback, RecordCallback, RecordView};
pub use executor::QueryExecutor;
