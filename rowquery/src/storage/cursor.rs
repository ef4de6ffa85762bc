// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Persistent cursor

use crate::dict::IndexDef;
use crate::error::{DbError, DbResult};
use std::sync::Arc;

/// Where a cursor stands inside its index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CursorPosition {
    #[default]
    Unpositioned,
    /// Before the first user record
    BeforeFirst,
    /// On the user record with this unique-prefix key
    On(Vec<u8>),
    /// After the last user record
    AfterLast,
}

/// A cursor whose position survives across mini-transactions.
///
/// The position is the record's unique-prefix key, so it stays meaningful
/// after the latches of the mini-transaction that produced it are released.
#[derive(Debug, Clone, Default)]
pub struct PersistentCursor {
    index: Option<Arc<IndexDef>>,
    pos: CursorPosition,
}

impl PersistentCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the cursor to `index` and forgets the old position.
    pub fn bind(&mut self, index: Arc<IndexDef>) {
        self.index = Some(index);
        self.pos = CursorPosition::Unpositioned;
    }

    pub fn index(&self) -> DbResult<&Arc<IndexDef>> {
        self.index
            .as_ref()
            .ok_or_else(|| DbError::Generic("cursor is not bound to an index".to_string()))
    }

    pub fn is_bound(&self) -> bool {
        self.index.is_some()
    }

    pub fn position(&self) -> &CursorPosition {
        &self.pos
    }

    pub fn set_position(&mut self, pos: CursorPosition) {
        self.pos = pos;
    }

    /// Key of the current user record
    pub fn rec_key(&self) -> Option<&[u8]> {
        match &self.pos {
            CursorPosition::On(key) => Some(key),
            _ => None,
        }
    }

    pub fn is_on_user_rec(&self) -> bool {
        matches!(self.pos, CursorPosition::On(_))
    }

    pub fn close(&mut self) {
        self.index = None;
        self.pos = CursorPosition::Unpositioned;
    }
}
