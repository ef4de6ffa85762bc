// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Full-text search tables
//!
//! A full-text index keeps its inverted lists in six auxiliary tables
//! (`INDEX_1` to `INDEX_6`) and its bookkeeping in common tables shared by
//! every full-text index of the same user table: the deleted-document sets
//! and the `CONFIG` key/value table. This module names and declares those
//! tables and maps their rows onto the generic query executor.

pub mod config;
pub mod exec;
pub mod readers;

pub use config::{
    config_get_index_ulint, config_get_index_value, config_get_ulint, config_get_value,
    config_set_index_ulint, config_set_index_value, config_set_ulint, config_set_value,
    index_param_name,
};
pub use exec::FtsQueryExecutor;
pub use readers::{AuxRecordReader, CommonTableReader, ConfigReader};

use crate::data::ColumnType;
use crate::dict::{IndexId, TableBuilder, TableId};
use serde::{Deserialize, Serialize};

/// Number of auxiliary tables per full-text index
pub const FTS_NUM_AUX_INDEX: usize = 6;

/// Longest word an auxiliary table stores, in bytes
pub const FTS_MAX_WORD_LEN: usize = 336;

pub const FTS_MAX_CONFIG_KEY_LEN: usize = 50;

pub const FTS_MAX_CONFIG_VALUE_LEN: usize = 200;

/// Upper bound for one encoded posting list
pub const FTS_MAX_ILIST_LEN: usize = 1 << 20;

/// Common table holding the configuration
pub const FTS_CONFIG_TABLE: &str = "CONFIG";

/// Suffixes of the common tables, in lookup order
pub const FTS_COMMON_TABLES: [&str; 5] = [
    "BEING_DELETED",
    "BEING_DELETED_CACHE",
    FTS_CONFIG_TABLE,
    "DELETED",
    "DELETED_CACHE",
];

/// Position of a common table suffix in [`FTS_COMMON_TABLES`]
pub fn find_common_table(suffix: &str) -> Option<usize> {
    FTS_COMMON_TABLES.iter().position(|name| *name == suffix)
}

/// Name of auxiliary table `aux_index` (zero based) of a full-text index.
pub fn aux_table_name(table_id: TableId, index_id: IndexId, aux_index: usize) -> String {
    format!(
        "FTS_{:016x}_{:016x}_INDEX_{}",
        table_id.0,
        index_id.0,
        aux_index + 1
    )
}

pub fn common_table_name(table_id: TableId, suffix: &str) -> String {
    format!("FTS_{:016x}_{}", table_id.0, suffix)
}

/// Declaration of an auxiliary table:
/// `(word, first_doc_id, last_doc_id, doc_count, ilist)` clustered on
/// `(word, first_doc_id)`.
pub fn aux_table_builder(name: impl Into<String>) -> TableBuilder {
    TableBuilder::new(name)
        .column("word", ColumnType::varchar(FTS_MAX_WORD_LEN))
        .column("first_doc_id", ColumnType::int())
        .column("last_doc_id", ColumnType::int())
        .column("doc_count", ColumnType::uint32())
        .column("ilist", ColumnType::varbinary(FTS_MAX_ILIST_LEN))
        .primary_key(&["word", "first_doc_id"])
}

/// Declaration of a common table; `CONFIG` is a key/value table, the others
/// hold document ids.
pub fn common_table_builder(name: impl Into<String>, suffix: &str) -> TableBuilder {
    if suffix == FTS_CONFIG_TABLE {
        TableBuilder::new(name)
            .column("key", ColumnType::varchar(FTS_MAX_CONFIG_KEY_LEN))
            .column("value", ColumnType::varchar(FTS_MAX_CONFIG_VALUE_LEN))
            .primary_key(&["key"])
    } else {
        TableBuilder::new(name)
            .column("doc_id", ColumnType::int())
            .primary_key(&["doc_id"])
    }
}

/// Creates the common tables of `table_id` and, given an index, its six
/// auxiliary tables.
#[cfg(feature = "memory-engine")]
pub fn create_fts_tables(
    engine: &crate::storage::MemoryEngine,
    table_id: TableId,
    index_id: Option<IndexId>,
) -> crate::error::DbResult<()> {
    for suffix in FTS_COMMON_TABLES {
        engine.create_table(common_table_builder(
            common_table_name(table_id, suffix),
            suffix,
        ))?;
    }
    if let Some(index_id) = index_id {
        for aux_index in 0..FTS_NUM_AUX_INDEX {
            engine.create_table(aux_table_builder(aux_table_name(
                table_id, index_id, aux_index,
            )))?;
        }
    }
    Ok(())
}

/// One row of an auxiliary table: the postings of `word` for documents
/// `first_doc_id..=last_doc_id`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FtsAuxData {
    pub word: String,
    pub first_doc_id: u64,
    pub last_doc_id: u64,
    pub doc_count: u32,
    pub ilist: Vec<u8>,
}

impl FtsAuxData {
    /// Key-only row, enough to delete or look up `word`
    pub fn new(word: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            ..Default::default()
        }
    }

    pub fn with_postings(
        word: impl Into<String>,
        first_doc_id: u64,
        last_doc_id: u64,
        doc_count: u32,
        ilist: Vec<u8>,
    ) -> Self {
        Self {
            word: word.into(),
            first_doc_id,
            last_doc_id,
            doc_count,
            ilist,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names() {
        assert_eq!(
            aux_table_name(TableId(0x2a), IndexId(0x1f), 0),
            "FTS_000000000000002a_000000000000001f_INDEX_1"
        );
        assert_eq!(
            common_table_name(TableId(7), "DELETED"),
            "FTS_0000000000000007_DELETED"
        );
    }

    #[test]
    fn test_find_common_table() {
        assert_eq!(find_common_table("CONFIG"), Some(2));
        assert_eq!(find_common_table("DELETED_CACHE"), Some(4));
        assert_eq!(find_common_table("INDEX_1"), None);
    }

    #[test]
    fn test_table_shapes() {
        let aux = aux_table_builder("aux")
            .build(TableId(1), crate::dict::SpaceId(1), 10)
            .unwrap();
        let clust = aux.clustered_index();
        assert_eq!(clust.n_fields(), 5);
        assert_eq!(clust.n_uniq, 2);

        let config = common_table_builder("cfg", FTS_CONFIG_TABLE)
            .build(TableId(2), crate::dict::SpaceId(2), 20)
            .unwrap();
        assert_eq!(config.clustered_index().n_fields(), 2);

        let deleted = common_table_builder("del", "DELETED")
            .build(TableId(3), crate::dict::SpaceId(3), 30)
            .unwrap();
        assert_eq!(deleted.clustered_index().n_fields(), 1);
        assert_eq!(deleted.clustered_index().n_uniq, 1);
    }
}
