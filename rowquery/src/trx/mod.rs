// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Transaction context
//!
//! A [`Transaction`] is owned by the caller and lent to the executor for the
//! duration of each operation. The storage engine assigns its id, opens its
//! read view and attaches lock wait requests to it.

pub mod que;
pub mod read_view;

pub use que::{QueLockState, QueryThread};
pub use read_view::ReadView;

use crate::error::DbError;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Transaction identifier; 0 means "not assigned"
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TrxId(pub u64);

impl fmt::Display for TrxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trx_{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrxState {
    NotStarted,
    Active,
    Committed,
    RolledBack,
}

/// Outcome of a queued lock request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    Waiting,
    Granted,
    /// The waiter was chosen as a deadlock victim
    Deadlock,
    TimedOut,
}

/// A lock request the owning transaction blocks on.
///
/// The lock manager resolves the request; the waiting thread sleeps on the
/// condition variable until then or until its deadline passes.
#[derive(Debug)]
pub struct WaitRequest {
    status: Mutex<WaitStatus>,
    cond: Condvar,
}

impl WaitRequest {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(WaitStatus::Waiting),
            cond: Condvar::new(),
        })
    }

    pub fn status(&self) -> WaitStatus {
        *self.status.lock()
    }

    /// Resolves a pending request. Returns false if it was already resolved.
    pub fn resolve(&self, outcome: WaitStatus) -> bool {
        let mut status = self.status.lock();
        if *status != WaitStatus::Waiting {
            return false;
        }
        *status = outcome;
        self.cond.notify_all();
        true
    }

    /// Blocks until the request is resolved or `deadline` passes.
    ///
    /// Returns `Waiting` only when the deadline expired first.
    pub fn wait_until(&self, deadline: Option<Instant>) -> WaitStatus {
        let mut status = self.status.lock();
        while *status == WaitStatus::Waiting {
            match deadline {
                Some(deadline) => {
                    if self.cond.wait_until(&mut status, deadline).timed_out() {
                        break;
                    }
                }
                None => self.cond.wait(&mut status),
            }
        }
        *status
    }
}

/// Lock-related state of a transaction
#[derive(Debug, Default)]
pub struct TrxLock {
    /// Request the transaction must wait for before retrying
    pub wait: Option<Arc<WaitRequest>>,
}

#[derive(Debug)]
pub struct Transaction {
    id: TrxId,
    state: TrxState,
    /// Snapshot used by consistent reads, opened on first use
    pub read_view: Option<ReadView>,
    /// Outcome of the last lock wait
    pub error_state: Option<DbError>,
    pub lock: TrxLock,
}

impl Transaction {
    pub fn new() -> Self {
        Self {
            id: TrxId::default(),
            state: TrxState::NotStarted,
            read_view: None,
            error_state: None,
            lock: TrxLock::default(),
        }
    }

    pub fn id(&self) -> TrxId {
        self.id
    }

    pub fn state(&self) -> TrxState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TrxState::Active
    }

    pub fn has_read_view(&self) -> bool {
        self.read_view.is_some()
    }

    pub fn is_waiting(&self) -> bool {
        self.lock.wait.is_some()
    }

    /// Marks the transaction active under `id`; called by the engine.
    pub fn begin(&mut self, id: TrxId) {
        self.id = id;
        self.state = TrxState::Active;
        self.error_state = None;
    }

    /// Ends the transaction; called by the engine on commit or rollback.
    pub fn finish(&mut self, state: TrxState) {
        self.state = state;
        self.read_view = None;
        self.lock.wait = None;
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_lifecycle() {
        let mut trx = Transaction::new();
        assert_eq!(trx.state(), TrxState::NotStarted);

        trx.begin(TrxId(3));
        assert!(trx.is_active());
        assert_eq!(trx.id(), TrxId(3));

        trx.read_view = Some(ReadView::new(TrxId(3), TrxId(4), []));
        trx.finish(TrxState::Committed);
        assert!(!trx.has_read_view());
        assert_eq!(trx.state(), TrxState::Committed);
    }

    #[test]
    fn test_wait_request_is_resolved_once() {
        let request = WaitRequest::new();
        assert!(request.resolve(WaitStatus::Granted));
        assert!(!request.resolve(WaitStatus::Deadlock));
        assert_eq!(request.wait_until(None), WaitStatus::Granted);
    }

    #[test]
    fn test_wait_request_wakes_waiter() {
        let request = WaitRequest::new();
        let waker = Arc::clone(&request);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            waker.resolve(WaitStatus::Granted);
        });
        let deadline = Instant::now() + Duration::from_secs(5);
        assert_eq!(request.wait_until(Some(deadline)), WaitStatus::Granted);
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_request_deadline() {
        let request = WaitRequest::new();
        let deadline = Instant::now() + Duration::from_millis(10);
        assert_eq!(request.wait_until(Some(deadline)), WaitStatus::Waiting);
    }
}
