// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Lock system of the in-memory engine
//!
//! Every lockable object has a FIFO queue of requests. A request is granted
//! when no request of another transaction ahead of it conflicts. Waiting
//! requests carry a [`WaitRequest`] the owning thread blocks on.

use crate::dict::{IndexId, TableId};
use crate::storage::types::LockMode;
use crate::trx::{TrxId, WaitRequest, WaitStatus};
use log::debug;
use petgraph::algo::has_path_connecting;
use petgraph::graphmap::DiGraphMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum LockKey {
    Table(TableId),
    /// Index and unique-prefix key of a record
    Record(IndexId, Vec<u8>),
}

#[derive(Debug)]
struct LockRequest {
    trx: TrxId,
    mode: LockMode,
    granted: bool,
    wait: Option<Arc<WaitRequest>>,
}

/// Result of adding a request to a queue
#[derive(Debug)]
pub(crate) enum Enqueued {
    Granted,
    Waiting(Arc<WaitRequest>),
}

#[derive(Debug, Default)]
pub(crate) struct LockTables {
    queues: HashMap<LockKey, Vec<LockRequest>>,
    /// Queue each waiting transaction is blocked in
    waiting: HashMap<TrxId, LockKey>,
    /// Queues each transaction has requests in
    held: HashMap<TrxId, HashSet<LockKey>>,
}

impl LockTables {
    pub fn enqueue(&mut self, trx: TrxId, key: LockKey, mode: LockMode) -> Enqueued {
        let queue = self.queues.entry(key.clone()).or_default();

        if queue
            .iter()
            .any(|r| r.trx == trx && r.granted && r.mode.covers(mode))
        {
            return Enqueued::Granted;
        }

        let blocked = queue
            .iter()
            .any(|r| r.trx != trx && r.mode.conflicts_with(mode));

        self.held.entry(trx).or_default().insert(key.clone());
        if !blocked {
            queue.push(LockRequest {
                trx,
                mode,
                granted: true,
                wait: None,
            });
            return Enqueued::Granted;
        }

        let wait = WaitRequest::new();
        queue.push(LockRequest {
            trx,
            mode,
            granted: false,
            wait: Some(Arc::clone(&wait)),
        });
        debug!("{} waits for {:?} lock on {:?}", trx, mode, key);
        self.waiting.insert(trx, key);
        Enqueued::Waiting(wait)
    }

    /// Turns the implicit lock `owner` holds on a record it modified into an
    /// explicit granted X lock at the head of the queue.
    pub fn convert_implicit(&mut self, owner: TrxId, key: LockKey) {
        let queue = self.queues.entry(key.clone()).or_default();
        if queue
            .iter()
            .any(|r| r.trx == owner && r.granted && r.mode == LockMode::X)
        {
            return;
        }
        queue.insert(
            0,
            LockRequest {
                trx: owner,
                mode: LockMode::X,
                granted: true,
                wait: None,
            },
        );
        self.held.entry(owner).or_default().insert(key);
    }

    /// True if `trx` holds a granted lock covering `mode` on `key`
    pub fn holds(&self, trx: TrxId, key: &LockKey, mode: LockMode) -> bool {
        self.queues.get(key).is_some_and(|queue| {
            queue
                .iter()
                .any(|r| r.trx == trx && r.granted && r.mode.covers(mode))
        })
    }

    /// Drops every request of `trx` and grants what became grantable.
    pub fn release_all(&mut self, trx: TrxId) {
        self.waiting.remove(&trx);
        let Some(keys) = self.held.remove(&trx) else {
            return;
        };
        for key in keys {
            if let Some(queue) = self.queues.get_mut(&key) {
                for request in queue.iter().filter(|r| r.trx == trx) {
                    if let Some(wait) = &request.wait {
                        wait.resolve(WaitStatus::Deadlock);
                    }
                }
                queue.retain(|r| r.trx != trx);
            }
            self.grant_waiting(&key);
        }
    }

    /// Removes the pending request of `trx` after it gave up waiting.
    pub fn cancel_wait(&mut self, trx: TrxId) {
        let Some(key) = self.waiting.remove(&trx) else {
            return;
        };
        if let Some(queue) = self.queues.get_mut(&key) {
            queue.retain(|r| r.trx != trx || r.granted);
            if !queue.iter().any(|r| r.trx == trx) {
                if let Some(keys) = self.held.get_mut(&trx) {
                    keys.remove(&key);
                }
            }
        }
        self.grant_waiting(&key);
    }

    fn grant_waiting(&mut self, key: &LockKey) {
        let Some(queue) = self.queues.get_mut(key) else {
            return;
        };
        for i in 0..queue.len() {
            if queue[i].granted {
                continue;
            }
            let (ahead, rest) = queue.split_at_mut(i);
            let request = &mut rest[0];
            let blocked = ahead
                .iter()
                .any(|r| r.trx != request.trx && r.mode.conflicts_with(request.mode));
            if blocked {
                continue;
            }
            request.granted = true;
            if let Some(wait) = request.wait.take() {
                wait.resolve(WaitStatus::Granted);
            }
            self.waiting.remove(&request.trx);
            debug!("granted {:?} lock on {:?} to {}", request.mode, key, request.trx);
        }
        if queue.is_empty() {
            self.queues.remove(key);
        }
    }

    /// Transactions the waiting request of `trx` is blocked behind
    fn blockers(&self, trx: TrxId) -> Vec<TrxId> {
        let Some(queue) = self.waiting.get(&trx).and_then(|key| self.queues.get(key)) else {
            return Vec::new();
        };
        let Some(pos) = queue.iter().position(|r| r.trx == trx && !r.granted) else {
            return Vec::new();
        };
        let mode = queue[pos].mode;
        queue[..pos]
            .iter()
            .filter(|r| r.trx != trx && r.mode.conflicts_with(mode))
            .map(|r| r.trx)
            .collect()
    }

    /// Waits-for graph over every blocked transaction
    fn wait_for_graph(&self) -> DiGraphMap<TrxId, ()> {
        let mut graph = DiGraphMap::new();
        for &waiter in self.waiting.keys() {
            for blocker in self.blockers(waiter) {
                graph.add_edge(waiter, blocker, ());
            }
        }
        graph
    }

    /// True if the wait of `trx` closes a cycle in the waits-for graph.
    pub fn in_deadlock(&self, trx: TrxId) -> bool {
        let blockers = self.blockers(trx);
        if blockers.is_empty() {
            return false;
        }
        let graph = self.wait_for_graph();
        blockers
            .into_iter()
            .any(|blocker| has_path_connecting(&graph, blocker, trx, None))
    }

    pub fn n_waiting(&self) -> usize {
        self.waiting.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(n: u8) -> LockKey {
        LockKey::Record(IndexId(1), vec![n])
    }

    #[test]
    fn test_conflicting_request_waits_until_release() {
        let mut locks = LockTables::default();
        assert!(matches!(
            locks.enqueue(TrxId(1), rec(1), LockMode::X),
            Enqueued::Granted
        ));
        let Enqueued::Waiting(wait) = locks.enqueue(TrxId(2), rec(1), LockMode::X) else {
            panic!("second X lock must wait");
        };
        assert_eq!(wait.status(), WaitStatus::Waiting);
        assert_eq!(locks.n_waiting(), 1);

        locks.release_all(TrxId(1));
        assert_eq!(wait.status(), WaitStatus::Granted);
        assert!(locks.holds(TrxId(2), &rec(1), LockMode::X));
        assert_eq!(locks.n_waiting(), 0);
    }

    #[test]
    fn test_reentrant_and_shared_requests() {
        let mut locks = LockTables::default();
        let table = LockKey::Table(TableId(1));
        assert!(matches!(locks.enqueue(TrxId(1), table.clone(), LockMode::IX), Enqueued::Granted));
        assert!(matches!(locks.enqueue(TrxId(2), table.clone(), LockMode::IX), Enqueued::Granted));
        assert!(matches!(locks.enqueue(TrxId(1), table.clone(), LockMode::IS), Enqueued::Granted));
        assert!(matches!(locks.enqueue(TrxId(3), table, LockMode::X), Enqueued::Waiting(_)));
    }

    #[test]
    fn test_implicit_lock_conversion() {
        let mut locks = LockTables::default();
        locks.convert_implicit(TrxId(5), rec(9));
        assert!(locks.holds(TrxId(5), &rec(9), LockMode::X));
        assert!(matches!(
            locks.enqueue(TrxId(6), rec(9), LockMode::S),
            Enqueued::Waiting(_)
        ));
    }

    #[test]
    fn test_deadlock_cycle_detection() {
        let mut locks = LockTables::default();
        locks.enqueue(TrxId(1), rec(1), LockMode::X);
        locks.enqueue(TrxId(2), rec(2), LockMode::X);
        locks.enqueue(TrxId(1), rec(2), LockMode::X);
        assert!(!locks.in_deadlock(TrxId(1)));

        locks.enqueue(TrxId(2), rec(1), LockMode::X);
        assert!(locks.in_deadlock(TrxId(2)));

        locks.cancel_wait(TrxId(2));
        assert!(!locks.in_deadlock(TrxId(1)));
        locks.release_all(TrxId(2));
        assert!(locks.holds(TrxId(1), &rec(2), LockMode::X));
    }
}
