// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Lock-wait protocol
//!
//! A lock request that cannot be granted leaves a wait request on the
//! transaction and fails with `LockWait`. The caller releases its latches,
//! runs [`handle_wait`] and, when it returns `Ok`, re-issues the whole
//! operation: the lock is held now but any cursor position is stale.

use crate::error::{DbError, DbResult};
use crate::storage::StorageEngine;
use crate::trx::{QueLockState, QueryThread, Transaction};
use log::{debug, warn};

pub(crate) fn handle_wait(
    engine: &dyn StorageEngine,
    trx: &mut Transaction,
    thr: &mut QueryThread,
    err: DbError,
    table_lock: bool,
) -> DbResult<()> {
    trx.error_state = Some(err.clone());
    thr.lock_state = if table_lock {
        QueLockState::Table
    } else {
        QueLockState::Row
    };

    if !trx.is_waiting() {
        return Err(err);
    }

    debug!(
        "{} waiting for a {} lock",
        trx.id(),
        if table_lock { "table" } else { "row" }
    );
    match engine.lock_wait(trx) {
        Ok(()) => {
            trx.error_state = None;
            thr.lock_state = QueLockState::NoLock;
            Ok(())
        }
        Err(wait_err) => {
            warn!("{} lock wait failed: {}", trx.id(), wait_err);
            trx.error_state = Some(wait_err.clone());
            Err(wait_err)
        }
    }
}
