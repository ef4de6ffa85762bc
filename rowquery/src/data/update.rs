// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Update vectors: (field position, new value) pairs applied to one row

use super::tuple::Datum;
use crate::dict::IndexDef;
use crate::error::{DbError, DbResult};
use crate::rem::{Record, RecordOffsets};

/// One field assignment of an update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateField {
    /// Position of the field in the clustered index
    pub field_no: usize,
    pub new_val: Datum,
}

/// Ordered list of field assignments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateVector {
    fields: Vec<UpdateField>,
}

impl UpdateVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an assignment, replacing an earlier one for the same field.
    pub fn set(mut self, field_no: usize, new_val: impl Into<Datum>) -> Self {
        let new_val = new_val.into();
        match self.fields.iter_mut().find(|f| f.field_no == field_no) {
            Some(existing) => existing.new_val = new_val,
            None => self.fields.push(UpdateField { field_no, new_val }),
        }
        self
    }

    pub fn fields(&self) -> &[UpdateField] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field_no: usize) -> Option<&Datum> {
        self.fields
            .iter()
            .find(|f| f.field_no == field_no)
            .map(|f| &f.new_val)
    }

    /// Checks positions and value types against the target index.
    ///
    /// Fields of the unique prefix decide the row's position in the index and
    /// cannot be changed through an update.
    pub fn validate(&self, index: &IndexDef) -> DbResult<()> {
        for field in &self.fields {
            let column = index.columns.get(field.field_no).ok_or_else(|| {
                DbError::DictionaryMismatch(format!(
                    "update field {} out of range for index {}",
                    field.field_no, index.name
                ))
            })?;

            if field.field_no < index.n_uniq {
                return Err(DbError::DictionaryMismatch(format!(
                    "update changes ordering field {} of index {}",
                    column.name, index.name
                )));
            }

            column.ty.validate(field.new_val.as_bytes())?;
        }
        Ok(())
    }

    /// True if any assignment changes the stored size of its field.
    ///
    /// A NULL transition and a field currently stored off page both count as
    /// size changes.
    pub fn changes_size(&self, rec: &Record, offsets: &RecordOffsets) -> bool {
        self.fields.iter().any(|field| {
            let Some(old) = offsets.field(field.field_no) else {
                return true;
            };
            if old.is_extern() {
                return true;
            }
            match (rec.field_bytes(offsets, field.field_no), field.new_val.as_bytes()) {
                (None, None) => false,
                (Some(old), Some(new)) => old.len() != new.len(),
                _ => true,
            }
        })
    }
}
