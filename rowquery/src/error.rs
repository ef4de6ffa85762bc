// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Error codes shared by the executor and the storage engine

use thiserror::Error;

/// Outcome codes of every row operation.
///
/// Success is `Ok(_)`; everything else is one of these variants. The set is
/// closed and shared with the storage engine seam so that engine errors can
/// be propagated unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DbError {
    /// A lock request is queued; the caller must run the wait protocol
    #[error("Lock wait")]
    LockWait,

    #[error("Lock wait timeout exceeded")]
    LockWaitTimeout,

    /// The transaction was chosen as a deadlock victim
    #[error("Deadlock found when trying to get lock")]
    Deadlock,

    #[error("Record not found")]
    RecordNotFound,

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Duplicate key in index {0}")]
    DuplicateKey(String),

    /// Update does not fit on the page; retry with a heavier strategy
    #[error("Page overflow")]
    Overflow,

    /// Update leaves the page underfilled; retry with a heavier strategy
    #[error("Page underflow")]
    Underflow,

    #[error("Out of space: {0}")]
    OutOfSpace(String),

    /// The undo history needed to rebuild a row version is gone
    #[error("Missing row history: {0}")]
    MissingHistory(String),

    #[error("Data corruption: {0}")]
    Corruption(String),

    /// Tuple or index shape does not match the dictionary definition
    #[error("Dictionary mismatch: {0}")]
    DictionaryMismatch(String),

    #[error("Storage error: {0}")]
    Generic(String),
}

impl DbError {
    /// Lock waits are resolved by blocking and re-issuing the operation
    pub fn is_lock_wait(&self) -> bool {
        matches!(self, DbError::LockWait)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::RecordNotFound)
    }

    /// Control signals between update strategies, never surfaced as failures
    /// by `update_record` unless the pessimistic path also fails
    pub fn is_escalation(&self) -> bool {
        matches!(self, DbError::Overflow | DbError::Underflow)
    }

    /// Terminal errors abort the current operation immediately
    pub fn is_hard(&self) -> bool {
        !self.is_lock_wait() && !self.is_not_found() && !self.is_escalation()
    }
}

/// Result type for executor and engine operations
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes_are_disjoint() {
        let all = [
            DbError::LockWait,
            DbError::LockWaitTimeout,
            DbError::Deadlock,
            DbError::RecordNotFound,
            DbError::TableNotFound("t".to_string()),
            DbError::DuplicateKey("PRIMARY".to_string()),
            DbError::Overflow,
            DbError::Underflow,
            DbError::OutOfSpace("page".to_string()),
            DbError::MissingHistory("undo 7".to_string()),
            DbError::Corruption("crc".to_string()),
            DbError::DictionaryMismatch("n_fields".to_string()),
            DbError::Generic("io".to_string()),
        ];

        for err in &all {
            let classes = [
                err.is_lock_wait(),
                err.is_not_found(),
                err.is_escalation(),
                err.is_hard(),
            ];
            assert_eq!(classes.iter().filter(|c| **c).count(), 1, "{:?}", err);
        }
    }

    #[test]
    fn test_timeout_is_terminal() {
        assert!(DbError::LockWaitTimeout.is_hard());
        assert!(!DbError::LockWaitTimeout.is_lock_wait());
    }

    #[test]
    fn test_display() {
        let err = DbError::TableNotFound("FTS_CONFIG".to_string());
        assert_eq!(err.to_string(), "Table not found: FTS_CONFIG");
    }
}
