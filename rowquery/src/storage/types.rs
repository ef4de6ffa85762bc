// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Types shared by the storage engine seam

use crate::error::{DbError, DbResult};
use crate::rem::ExternRef;
use serde::{Deserialize, Serialize};

/// Cursor positioning mode relative to a search tuple
///
/// A search tuple may be a key prefix; records that start with the prefix
/// compare equal to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchMode {
    /// First record greater than or equal to the tuple
    Ge,
    /// First record greater than the tuple
    G,
    /// Last record less than or equal to the tuple
    Le,
    /// Last record less than the tuple
    L,
}

impl std::str::FromStr for SearchMode {
    type Err = DbError;

    fn from_str(s: &str) -> DbResult<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GE" => Ok(SearchMode::Ge),
            "G" => Ok(SearchMode::G),
            "LE" => Ok(SearchMode::Le),
            "L" => Ok(SearchMode::L),
            _ => Err(DbError::Generic(format!(
                "Unknown search mode: {}. Valid options: GE, G, LE, L",
                s
            ))),
        }
    }
}

/// Latch the cursor takes on leaf pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchMode {
    SearchLeaf,
    ModifyLeaf,
}

/// Lock modes. Record locks use `S` and `X` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockMode {
    /// Intention shared
    IS,
    /// Intention exclusive
    IX,
    S,
    X,
}

impl LockMode {
    /// Table lock compatibility matrix
    pub fn conflicts_with(self, other: LockMode) -> bool {
        use LockMode::*;
        match (self, other) {
            (X, _) | (_, X) => true,
            (S, IX) | (IX, S) => true,
            _ => false,
        }
    }

    /// True if holding `self` makes a request for `other` redundant
    pub fn covers(self, other: LockMode) -> bool {
        use LockMode::*;
        match self {
            X => true,
            S => matches!(other, S | IS),
            IX => matches!(other, IX | IS),
            IS => other == IS,
        }
    }
}

/// A field a pessimistic update moved off page whose contents still have
/// to be written to external storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigRecField {
    pub field_no: usize,
    pub ext: ExternRef,
    pub data: Vec<u8>,
}

/// Fields left over by a pessimistic update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BigRec {
    pub fields: Vec<BigRecField>,
}

impl BigRec {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_compatibility() {
        use LockMode::*;
        assert!(!IS.conflicts_with(IX));
        assert!(!IX.conflicts_with(IX));
        assert!(IX.conflicts_with(S));
        assert!(!S.conflicts_with(S));
        assert!(S.conflicts_with(X));
        assert!(X.conflicts_with(IS));
    }

    #[test]
    fn test_lock_covers() {
        use LockMode::*;
        assert!(X.covers(S));
        assert!(S.covers(IS));
        assert!(!S.covers(IX));
        assert!(!IX.covers(S));
    }

    #[test]
    fn test_search_mode_from_str() {
        assert_eq!("ge".parse::<SearchMode>().unwrap(), SearchMode::Ge);
        assert_eq!("L".parse::<SearchMode>().unwrap(), SearchMode::L);
        assert!("between".parse::<SearchMode>().is_err());
    }
}
