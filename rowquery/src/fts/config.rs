// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Full-text `CONFIG` table access
//!
//! Values are stored as text. Index specific parameters share the table of
//! their user table under the name `<param>_<index id>`.

use super::exec::FtsQueryExecutor;
use super::readers::ConfigReader;
use crate::dict::{IndexDef, TableId};
use crate::error::{DbError, DbResult};
use crate::storage::StorageEngine;
use crate::trx::Transaction;
use log::error;
use std::sync::Arc;

/// Config key of an index specific parameter
pub fn index_param_name(param: &str, index: &IndexDef) -> String {
    format!("{}_{:016x}", param, index.id.0)
}

/// Reads `name` from the config table of `table_id`.
///
/// The row is locked for the rest of the transaction.
pub fn config_get_value(
    engine: Arc<dyn StorageEngine>,
    trx: &mut Transaction,
    table_id: TableId,
    name: &str,
) -> DbResult<String> {
    let mut executor = FtsQueryExecutor::new(engine, trx, table_id, None);
    let mut reader = ConfigReader::new();
    executor.read_config_with_lock(name, &mut reader)?;
    executor.release_lock();
    Ok(reader.into_value())
}

/// Sets `name` in the config table of `table_id`, adding it if missing.
pub fn config_set_value(
    engine: Arc<dyn StorageEngine>,
    trx: &mut Transaction,
    table_id: TableId,
    name: &str,
    value: &str,
) -> DbResult<()> {
    let mut executor = FtsQueryExecutor::new(engine, trx, table_id, None);
    executor.update_config_record(name, value)
}

pub fn config_get_ulint(
    engine: Arc<dyn StorageEngine>,
    trx: &mut Transaction,
    table_id: TableId,
    name: &str,
) -> DbResult<u64> {
    let value = config_get_value(engine, trx, table_id, name).map_err(|e| {
        error!("({}) reading `{}'", e, name);
        e
    })?;
    value.trim().parse::<u64>().map_err(|_| {
        error!("`{}' holds {:?}, not a number", name, value);
        DbError::Corruption(format!("config value of {} is not a number", name))
    })
}

pub fn config_set_ulint(
    engine: Arc<dyn StorageEngine>,
    trx: &mut Transaction,
    table_id: TableId,
    name: &str,
    value: u64,
) -> DbResult<()> {
    config_set_value(engine, trx, table_id, name, &value.to_string()).map_err(|e| {
        error!("({}) writing `{}'", e, name);
        e
    })
}

pub fn config_get_index_value(
    engine: Arc<dyn StorageEngine>,
    trx: &mut Transaction,
    index: &IndexDef,
    param: &str,
) -> DbResult<String> {
    let name = index_param_name(param, index);
    config_get_value(engine, trx, index.table_id, &name)
}

pub fn config_set_index_value(
    engine: Arc<dyn StorageEngine>,
    trx: &mut Transaction,
    index: &IndexDef,
    param: &str,
    value: &str,
) -> DbResult<()> {
    let name = index_param_name(param, index);
    config_set_value(engine, trx, index.table_id, &name, value)
}

pub fn config_get_index_ulint(
    engine: Arc<dyn StorageEngine>,
    trx: &mut Transaction,
    index: &IndexDef,
    param: &str,
) -> DbResult<u64> {
    let name = index_param_name(param, index);
    config_get_ulint(engine, trx, index.table_id, &name)
}

pub fn config_set_index_ulint(
    engine: Arc<dyn StorageEngine>,
    trx: &mut Transaction,
    index: &IndexDef,
    param: &str,
    value: u64,
) -> DbResult<()> {
    let name = index_param_name(param, index);
    config_set_ulint(engine, trx, index.table_id, &name, value)
}
