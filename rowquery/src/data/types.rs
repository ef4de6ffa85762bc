// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Column types, collations and the memcomparable key encoding

use crate::error::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Comparison rules for character columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collation {
    /// Byte-wise comparison
    Binary,
    /// ASCII letters compare without regard to case
    AsciiCaseInsensitive,
}

/// Physical kind of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataKind {
    /// 8-byte unsigned integer, big-endian
    Int,
    /// 4-byte unsigned integer, big-endian
    Uint32,
    /// Variable-length character data
    Varchar,
    /// Variable-length binary data
    Varbinary,
}

/// Type of one column, copied into every tuple field that targets it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnType {
    pub kind: DataKind,
    /// Maximum length in bytes (exact length for fixed-size kinds)
    pub max_len: usize,
    pub collation: Collation,
    pub nullable: bool,
}

impl ColumnType {
    pub fn int() -> Self {
        Self {
            kind: DataKind::Int,
            max_len: 8,
            collation: Collation::Binary,
            nullable: false,
        }
    }

    pub fn uint32() -> Self {
        Self {
            kind: DataKind::Uint32,
            max_len: 4,
            collation: Collation::Binary,
            nullable: false,
        }
    }

    pub fn varchar(max_len: usize) -> Self {
        Self {
            kind: DataKind::Varchar,
            max_len,
            collation: Collation::Binary,
            nullable: false,
        }
    }

    pub fn varchar_ci(max_len: usize) -> Self {
        Self {
            collation: Collation::AsciiCaseInsensitive,
            ..Self::varchar(max_len)
        }
    }

    pub fn varbinary(max_len: usize) -> Self {
        Self {
            kind: DataKind::Varbinary,
            max_len,
            collation: Collation::Binary,
            nullable: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Exact on-page length for fixed-size kinds
    pub fn fixed_len(&self) -> Option<usize> {
        match self.kind {
            DataKind::Int => Some(8),
            DataKind::Uint32 => Some(4),
            DataKind::Varchar | DataKind::Varbinary => None,
        }
    }

    /// Checks that a value can be stored in a column of this type.
    pub fn validate(&self, data: Option<&[u8]>) -> DbResult<()> {
        let Some(data) = data else {
            return if self.nullable {
                Ok(())
            } else {
                Err(DbError::DictionaryMismatch(
                    "NULL value for NOT NULL column".to_string(),
                ))
            };
        };

        match self.fixed_len() {
            Some(len) if data.len() != len => Err(DbError::DictionaryMismatch(format!(
                "{:?} column expects {} bytes, got {}",
                self.kind,
                len,
                data.len()
            ))),
            None if data.len() > self.max_len => Err(DbError::DictionaryMismatch(format!(
                "{:?} column holds at most {} bytes, got {}",
                self.kind,
                self.max_len,
                data.len()
            ))),
            _ => Ok(()),
        }
    }

    /// Compares two values of this type. SQL NULL sorts before everything.
    pub fn compare(&self, a: Option<&[u8]>, b: Option<&[u8]>) -> Ordering {
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => match self.collation {
                Collation::Binary => a.cmp(b),
                Collation::AsciiCaseInsensitive => a
                    .iter()
                    .map(u8::to_ascii_lowercase)
                    .cmp(b.iter().map(u8::to_ascii_lowercase)),
            },
        }
    }

    /// Appends the order-preserving encoding of a value to `out`.
    ///
    /// Every encoded field is self-delimiting, so the encoding of a key
    /// prefix is a byte prefix of the encoding of any key that starts with
    /// it, and byte order equals `compare` order field by field.
    pub fn encode_key(&self, out: &mut Vec<u8>, data: Option<&[u8]>) {
        let Some(data) = data else {
            out.push(0x00);
            return;
        };

        out.push(0x01);
        for &byte in data {
            let byte = match self.collation {
                Collation::Binary => byte,
                Collation::AsciiCaseInsensitive => byte.to_ascii_lowercase(),
            };
            if byte == 0x00 {
                out.extend_from_slice(&[0x00, 0xFF]);
            } else {
                out.push(byte);
            }
        }
        out.extend_from_slice(&[0x00, 0x01]);
    }
}

/// Encodes an unsigned 64-bit integer the way `Int` columns store it
pub fn encode_u64(value: u64) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

/// Encodes an unsigned 32-bit integer the way `Uint32` columns store it
pub fn encode_u32(value: u32) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

/// Decodes an `Int` column value
pub fn decode_u64(data: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = data.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

/// Decodes a `Uint32` column value
pub fn decode_u32(data: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = data.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(ty: &ColumnType, data: Option<&[u8]>) -> Vec<u8> {
        let mut out = Vec::new();
        ty.encode_key(&mut out, data);
        out
    }

    #[test]
    fn test_encoding_matches_compare() {
        let ty = ColumnType::varbinary(64).nullable();
        let values: Vec<Option<&[u8]>> = vec![
            None,
            Some(b""),
            Some(b"\x00"),
            Some(b"\x00\x00"),
            Some(b"a"),
            Some(b"a\x00"),
            Some(b"ab"),
            Some(b"b"),
            Some(b"\xff"),
        ];

        for a in &values {
            for b in &values {
                assert_eq!(
                    ty.compare(*a, *b),
                    key(&ty, *a).cmp(&key(&ty, *b)),
                    "{:?} vs {:?}",
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn test_case_insensitive_collation() {
        let ty = ColumnType::varchar_ci(50);
        assert_eq!(ty.compare(Some(b"Cat"), Some(b"cAT")), Ordering::Equal);
        assert_eq!(key(&ty, Some(b"Cat")), key(&ty, Some(b"cat")));
        assert_eq!(ty.compare(Some(b"cat"), Some(b"Dog")), Ordering::Less);
    }

    #[test]
    fn test_prefix_encoding_is_byte_prefix() {
        let word = ColumnType::varchar(32);
        let id = ColumnType::int();

        let mut full = Vec::new();
        word.encode_key(&mut full, Some(b"cat"));
        id.encode_key(&mut full, Some(&encode_u64(5)));

        let prefix = key(&word, Some(b"cat"));
        assert!(full.starts_with(&prefix));
        assert!(prefix < full);
    }

    #[test]
    fn test_integer_ordering() {
        let id = ColumnType::int();
        assert!(key(&id, Some(&encode_u64(2))) < key(&id, Some(&encode_u64(256))));
        assert_eq!(decode_u64(&encode_u64(77)), Some(77));
        assert_eq!(decode_u32(&encode_u32(9)), Some(9));
        assert_eq!(decode_u64(b"short"), None);
    }

    #[test]
    fn test_validate() {
        assert!(ColumnType::int().validate(Some(&encode_u64(1))).is_ok());
        assert!(ColumnType::int().validate(Some(b"abc")).is_err());
        assert!(ColumnType::int().validate(None).is_err());
        assert!(ColumnType::int().nullable().validate(None).is_ok());
        assert!(ColumnType::varchar(3).validate(Some(b"abcd")).is_err());
    }
}
