// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Table definitions and the builder used to declare them

use super::{ColumnDef, IndexDef, IndexId, SpaceId, TableId};
use crate::data::ColumnType;
use crate::error::{DbError, DbResult};
use std::collections::HashSet;
use std::sync::Arc;

/// A table: a clustered index plus zero or more secondary indexes
#[derive(Debug, Clone)]
pub struct TableDef {
    pub id: TableId,
    pub name: String,
    pub space: SpaceId,
    /// The first index is always the clustered one
    pub indexes: Vec<Arc<IndexDef>>,
}

impl TableDef {
    pub fn clustered_index(&self) -> &Arc<IndexDef> {
        &self.indexes[0]
    }

    pub fn secondary_indexes(&self) -> impl Iterator<Item = &Arc<IndexDef>> {
        self.indexes.iter().skip(1)
    }

    pub fn index(&self, name: &str) -> Option<&Arc<IndexDef>> {
        self.indexes.iter().find(|i| i.name == name)
    }

    pub fn index_by_id(&self, id: IndexId) -> Option<&Arc<IndexDef>> {
        self.indexes.iter().find(|i| i.id == id)
    }
}

/// Declares a table before the engine assigns its ids.
///
/// Clustered records store the primary key columns first, followed by the
/// remaining columns in declaration order.
#[derive(Debug, Clone)]
pub struct TableBuilder {
    name: String,
    columns: Vec<ColumnDef>,
    primary_key: Vec<String>,
    secondary: Vec<(String, Vec<String>)>,
}

impl TableBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            secondary: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column(mut self, name: impl Into<String>, ty: ColumnType) -> Self {
        self.columns.push(ColumnDef::new(name, ty));
        self
    }

    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn secondary_index(mut self, name: impl Into<String>, columns: &[&str]) -> Self {
        self.secondary
            .push((name.into(), columns.iter().map(|c| c.to_string()).collect()));
        self
    }

    /// Resolves column names into index definitions.
    pub fn build(self, id: TableId, space: SpaceId, first_index_id: u64) -> DbResult<TableDef> {
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(DbError::DictionaryMismatch(format!(
                    "duplicate column {} in table {}",
                    column.name, self.name
                )));
            }
        }
        if self.primary_key.is_empty() {
            return Err(DbError::DictionaryMismatch(format!(
                "table {} has no primary key",
                self.name
            )));
        }

        let mut clustered_columns = Vec::with_capacity(self.columns.len());
        for name in &self.primary_key {
            let column = self.lookup(name)?;
            if column.ty.nullable {
                return Err(DbError::DictionaryMismatch(format!(
                    "primary key column {} of {} is nullable",
                    name, self.name
                )));
            }
            clustered_columns.push(column.clone());
        }
        for column in &self.columns {
            if !self.primary_key.contains(&column.name) {
                clustered_columns.push(column.clone());
            }
        }

        let clustered = IndexDef::clustered(
            IndexId(first_index_id),
            id,
            "PRIMARY",
            clustered_columns,
            self.primary_key.len(),
        )
        .with_space(space);

        let mut indexes = vec![Arc::new(clustered)];
        for (offset, (index_name, key)) in self.secondary.iter().enumerate() {
            let mut columns = Vec::with_capacity(key.len() + self.primary_key.len());
            for name in key {
                columns.push(self.lookup(name)?.clone());
            }
            for name in &self.primary_key {
                if !key.contains(name) {
                    columns.push(self.lookup(name)?.clone());
                }
            }
            let clust_ref = self
                .primary_key
                .iter()
                .map(|pk| {
                    columns
                        .iter()
                        .position(|c| &c.name == pk)
                        .ok_or_else(|| DbError::DictionaryMismatch(pk.clone()))
                })
                .collect::<DbResult<Vec<_>>>()?;

            let index = IndexDef::secondary(
                IndexId(first_index_id + 1 + offset as u64),
                id,
                index_name.clone(),
                columns,
                clust_ref,
            )
            .with_space(space);
            indexes.push(Arc::new(index));
        }

        Ok(TableDef {
            id,
            name: self.name,
            space,
            indexes,
        })
    }

    pub fn n_indexes(&self) -> usize {
        1 + self.secondary.len()
    }

    fn lookup(&self, name: &str) -> DbResult<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name).ok_or_else(|| {
            DbError::DictionaryMismatch(format!("unknown column {} in table {}", name, self.name))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> TableBuilder {
        TableBuilder::new("people")
            .column("name", ColumnType::varchar(40))
            .column("id", ColumnType::int())
            .column("city", ColumnType::varchar(40).nullable())
            .primary_key(&["id"])
            .secondary_index("by_city", &["city"])
    }

    #[test]
    fn test_primary_key_columns_come_first() {
        let table = people().build(TableId(7), SpaceId(7), 100).unwrap();
        let clustered = table.clustered_index();
        let names: Vec<_> = clustered.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "city"]);
        assert_eq!(clustered.n_uniq, 1);
        assert_eq!(clustered.id, IndexId(100));
    }

    #[test]
    fn test_secondary_carries_clustered_key() {
        let table = people().build(TableId(7), SpaceId(7), 100).unwrap();
        let by_city = table.index("by_city").unwrap();
        let names: Vec<_> = by_city.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["city", "id"]);
        assert_eq!(by_city.clust_ref, vec![1]);
        assert_eq!(by_city.n_uniq, 2);
        assert!(!by_city.is_clustered());
    }

    #[test]
    fn test_invalid_definitions() {
        let no_pk = TableBuilder::new("t").column("a", ColumnType::int());
        assert!(no_pk.build(TableId(1), SpaceId(1), 1).is_err());

        let bad_column = TableBuilder::new("t")
            .column("a", ColumnType::int())
            .primary_key(&["b"]);
        assert!(bad_column.build(TableId(1), SpaceId(1), 1).is_err());

        let nullable_pk = TableBuilder::new("t")
            .column("a", ColumnType::int().nullable())
            .primary_key(&["a"]);
        assert!(nullable_pk.build(TableId(1), SpaceId(1), 1).is_err());
    }
}
