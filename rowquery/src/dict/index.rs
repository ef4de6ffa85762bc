// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Index definitions

use super::{ColumnDef, IndexId, SpaceId, TableId};
use serde::{Deserialize, Serialize};

/// Clustered indexes hold the full row; secondary indexes hold their key
/// columns followed by the clustered key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    Clustered,
    Secondary,
}

/// Definition of one B-tree index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    pub id: IndexId,
    pub table_id: TableId,
    pub space: SpaceId,
    pub name: String,
    pub kind: IndexKind,
    /// Columns in record order
    pub columns: Vec<ColumnDef>,
    /// Number of leading fields that identify a record uniquely
    pub n_uniq: usize,
    /// For secondary indexes, the record positions of the clustered key
    /// columns, in clustered key order
    pub clust_ref: Vec<usize>,
}

impl IndexDef {
    pub fn clustered(
        id: IndexId,
        table_id: TableId,
        name: impl Into<String>,
        columns: Vec<ColumnDef>,
        n_uniq: usize,
    ) -> Self {
        Self {
            id,
            table_id,
            space: SpaceId::default(),
            name: name.into(),
            kind: IndexKind::Clustered,
            columns,
            n_uniq,
            clust_ref: Vec::new(),
        }
    }

    /// Secondary index over `columns`; every field takes part in ordering.
    pub fn secondary(
        id: IndexId,
        table_id: TableId,
        name: impl Into<String>,
        columns: Vec<ColumnDef>,
        clust_ref: Vec<usize>,
    ) -> Self {
        let n_uniq = columns.len();
        Self {
            id,
            table_id,
            space: SpaceId::default(),
            name: name.into(),
            kind: IndexKind::Secondary,
            columns,
            n_uniq,
            clust_ref,
        }
    }

    pub fn with_space(mut self, space: SpaceId) -> Self {
        self.space = space;
        self
    }

    pub fn n_fields(&self) -> usize {
        self.columns.len()
    }

    pub fn is_clustered(&self) -> bool {
        self.kind == IndexKind::Clustered
    }

    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// True if field `n` may be moved to off-page storage
    pub fn field_can_be_extern(&self, n: usize) -> bool {
        self.is_clustered()
            && n >= self.n_uniq
            && self
                .columns
                .get(n)
                .is_some_and(|c| c.ty.fixed_len().is_none())
    }
}
