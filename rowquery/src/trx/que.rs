// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query thread state

/// What kind of lock the thread is currently waiting for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueLockState {
    #[default]
    NoLock,
    Table,
    Row,
}

/// Execution context of the thread driving an executor
#[derive(Debug, Default)]
pub struct QueryThread {
    pub lock_state: QueLockState,
}

impl QueryThread {
    pub fn new() -> Self {
        Self::default()
    }
}
