// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Typed fields and tuples used as rows to insert and as search keys

use super::types::{encode_u32, encode_u64, ColumnType};
use crate::dict::IndexDef;
use crate::error::{DbError, DbResult};

/// A caller-supplied value before it is bound to a column type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datum {
    Null,
    Bytes(Vec<u8>),
}

impl Datum {
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Datum::Null => None,
            Datum::Bytes(b) => Some(b),
        }
    }
}

impl From<&str> for Datum {
    fn from(value: &str) -> Self {
        Datum::Bytes(value.as_bytes().to_vec())
    }
}

impl From<String> for Datum {
    fn from(value: String) -> Self {
        Datum::Bytes(value.into_bytes())
    }
}

impl From<&[u8]> for Datum {
    fn from(value: &[u8]) -> Self {
        Datum::Bytes(value.to_vec())
    }
}

impl From<Vec<u8>> for Datum {
    fn from(value: Vec<u8>) -> Self {
        Datum::Bytes(value)
    }
}

impl From<u64> for Datum {
    fn from(value: u64) -> Self {
        Datum::Bytes(encode_u64(value))
    }
}

impl From<u32> for Datum {
    fn from(value: u32) -> Self {
        Datum::Bytes(encode_u32(value))
    }
}

/// One typed field of a tuple
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataField {
    pub ty: ColumnType,
    pub data: Option<Vec<u8>>,
}

impl DataField {
    pub fn new(ty: ColumnType, datum: Datum) -> DbResult<Self> {
        ty.validate(datum.as_bytes())?;
        let data = match datum {
            Datum::Null => None,
            Datum::Bytes(b) => Some(b),
        };
        Ok(Self { ty, data })
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Length the value occupies inside a record
    pub fn stored_len(&self) -> usize {
        self.data.as_ref().map_or(0, Vec::len)
    }
}

/// An ordered sequence of typed fields.
///
/// Types are copied from the target index when the tuple is built, so a
/// tuple always matches a prefix of that index's column list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    fields: Vec<DataField>,
}

impl Tuple {
    /// Builds a tuple for the first `values.len()` columns of `index`.
    pub fn build<I>(index: &IndexDef, values: I) -> DbResult<Self>
    where
        I: IntoIterator,
        I::Item: Into<Datum>,
    {
        let values: Vec<Datum> = values.into_iter().map(Into::into).collect();
        if values.len() > index.n_fields() {
            return Err(DbError::DictionaryMismatch(format!(
                "tuple has {} fields but index {} has {}",
                values.len(),
                index.name,
                index.n_fields()
            )));
        }

        let fields = values
            .into_iter()
            .zip(index.columns.iter())
            .map(|(datum, column)| DataField::new(column.ty, datum))
            .collect::<DbResult<Vec<_>>>()?;

        Ok(Self { fields })
    }

    /// Builds a tuple from already typed fields.
    pub fn from_fields(fields: Vec<DataField>) -> Self {
        Self { fields }
    }

    pub fn n_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &[DataField] {
        &self.fields
    }

    pub fn field(&self, n: usize) -> Option<&DataField> {
        self.fields.get(n)
    }

    /// Memcomparable encoding of the first `n` fields
    pub fn sort_key(&self, n: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 * n);
        for field in self.fields.iter().take(n) {
            field.ty.encode_key(&mut out, field.bytes());
        }
        out
    }

    /// Checks that the field types match the leading columns of `index`
    pub fn ensure_prefix_of(&self, index: &IndexDef) -> DbResult<()> {
        if self.fields.len() > index.n_fields() {
            return Err(DbError::DictionaryMismatch(format!(
                "tuple has {} fields but index {} has {}",
                self.fields.len(),
                index.name,
                index.n_fields()
            )));
        }
        for (n, (field, column)) in self.fields.iter().zip(index.columns.iter()).enumerate() {
            if field.ty != column.ty {
                return Err(DbError::DictionaryMismatch(format!(
                    "field {} does not match the type of {}.{}",
                    n, index.name, column.name
                )));
            }
        }
        Ok(())
    }

    /// Checks that this tuple is a complete row for `index`
    pub fn ensure_full_row(&self, index: &IndexDef) -> DbResult<()> {
        self.ensure_prefix_of(index)?;
        if self.fields.len() != index.n_fields() {
            return Err(DbError::DictionaryMismatch(format!(
                "row has {} fields but index {} has {}",
                self.fields.len(),
                index.name,
                index.n_fields()
            )));
        }
        Ok(())
    }
}
