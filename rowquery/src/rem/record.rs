// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Physical record format
//!
//! ```text
//! +------+----------+-----------+----------+---------------------------+
//! | info | trx_id   | roll_ptr  | n_fields | (len u32 | data) * fields |
//! | 1 B  | 6 B      | 7 B       | 2 B      |                           |
//! +------+----------+-----------+----------+---------------------------+
//! ```
//!
//! A field length of `0xFFFF_FFFF` marks SQL NULL. The high bit of the length
//! marks a field stored off page; its data is then a 20-byte [`ExternRef`].

use super::offsets::RecordOffsets;
use crate::data::DataField;
use crate::trx::TrxId;

pub const REC_INFO_DELETED_FLAG: u8 = 0x20;
pub const REC_INFO_MIN_REC_FLAG: u8 = 0x10;

pub(crate) const REC_HEADER_SIZE: usize = 16;
pub(crate) const FIELD_NULL: u32 = 0xFFFF_FFFF;
pub(crate) const FIELD_EXTERN: u32 = 0x8000_0000;

/// Size of a reference to an off-page field
pub const EXTERN_REF_SIZE: usize = 20;

const TRX_ID_LEN: usize = 6;
const ROLL_PTR_LEN: usize = 7;

/// Location of a field value stored outside the leaf page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternRef {
    pub blob_id: u64,
    pub len: u64,
    /// CRC32 of the blob contents
    pub checksum: u32,
}

impl ExternRef {
    pub fn to_bytes(&self) -> [u8; EXTERN_REF_SIZE] {
        let mut out = [0u8; EXTERN_REF_SIZE];
        out[0..8].copy_from_slice(&self.blob_id.to_be_bytes());
        out[8..16].copy_from_slice(&self.len.to_be_bytes());
        out[16..20].copy_from_slice(&self.checksum.to_be_bytes());
        out
    }

    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() != EXTERN_REF_SIZE {
            return None;
        }
        Some(Self {
            blob_id: u64::from_be_bytes(data[0..8].try_into().ok()?),
            len: u64::from_be_bytes(data[8..16].try_into().ok()?),
            checksum: u32::from_be_bytes(data[16..20].try_into().ok()?),
        })
    }
}

/// Value of one field as it is laid out in a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Null,
    Inline(Vec<u8>),
    Extern(ExternRef),
}

impl FieldValue {
    /// Bytes this field occupies in the record, header included
    pub fn stored_size(&self) -> usize {
        4 + match self {
            FieldValue::Null => 0,
            FieldValue::Inline(data) => data.len(),
            FieldValue::Extern(_) => EXTERN_REF_SIZE,
        }
    }
}

impl From<&DataField> for FieldValue {
    fn from(field: &DataField) -> Self {
        match field.bytes() {
            None => FieldValue::Null,
            Some(data) => FieldValue::Inline(data.to_vec()),
        }
    }
}

/// An owned copy of one physical record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    bytes: Vec<u8>,
}

impl Record {
    pub fn build(fields: &[FieldValue], trx_id: TrxId, roll_ptr: u64) -> Self {
        let size = REC_HEADER_SIZE + fields.iter().map(FieldValue::stored_size).sum::<usize>();
        let mut bytes = Vec::with_capacity(size);
        bytes.push(0);
        bytes.extend_from_slice(&trx_id.0.to_be_bytes()[8 - TRX_ID_LEN..]);
        bytes.extend_from_slice(&roll_ptr.to_be_bytes()[8 - ROLL_PTR_LEN..]);
        bytes.extend_from_slice(&(fields.len() as u16).to_be_bytes());

        for field in fields {
            match field {
                FieldValue::Null => bytes.extend_from_slice(&FIELD_NULL.to_be_bytes()),
                FieldValue::Inline(data) => {
                    bytes.extend_from_slice(&(data.len() as u32).to_be_bytes());
                    bytes.extend_from_slice(data);
                }
                FieldValue::Extern(ext) => {
                    bytes.extend_from_slice(&(FIELD_EXTERN | EXTERN_REF_SIZE as u32).to_be_bytes());
                    bytes.extend_from_slice(&ext.to_bytes());
                }
            }
        }
        Self { bytes }
    }

    /// Wraps raw bytes; validity is checked by `rec_get_offsets`.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn info_bits(&self) -> u8 {
        self.bytes.first().copied().unwrap_or(0)
    }

    pub fn is_delete_marked(&self) -> bool {
        self.info_bits() & REC_INFO_DELETED_FLAG != 0
    }

    pub fn set_delete_mark(&mut self, deleted: bool) {
        if let Some(info) = self.bytes.first_mut() {
            if deleted {
                *info |= REC_INFO_DELETED_FLAG;
            } else {
                *info &= !REC_INFO_DELETED_FLAG;
            }
        }
    }

    /// The leftmost record of a non-leaf level
    pub fn is_min_rec(&self) -> bool {
        self.info_bits() & REC_INFO_MIN_REC_FLAG != 0
    }

    /// Id of the transaction that last modified the record
    pub fn trx_id(&self) -> TrxId {
        TrxId(read_be(self.bytes.get(1..1 + TRX_ID_LEN)))
    }

    pub fn set_trx_id(&mut self, trx_id: TrxId) {
        if let Some(dst) = self.bytes.get_mut(1..1 + TRX_ID_LEN) {
            dst.copy_from_slice(&trx_id.0.to_be_bytes()[8 - TRX_ID_LEN..]);
        }
    }

    /// Undo record holding the previous version, 0 if there is none
    pub fn roll_ptr(&self) -> u64 {
        read_be(self.bytes.get(7..7 + ROLL_PTR_LEN))
    }

    pub fn set_roll_ptr(&mut self, roll_ptr: u64) {
        if let Some(dst) = self.bytes.get_mut(7..7 + ROLL_PTR_LEN) {
            dst.copy_from_slice(&roll_ptr.to_be_bytes()[8 - ROLL_PTR_LEN..]);
        }
    }

    pub fn n_fields_stored(&self) -> usize {
        read_be(self.bytes.get(14..REC_HEADER_SIZE)) as usize
    }

    /// Inline bytes of field `n`, `None` for SQL NULL.
    ///
    /// For a field stored off page this is the 20-byte reference.
    pub fn field_bytes(&self, offsets: &RecordOffsets, n: usize) -> Option<&[u8]> {
        let field = offsets.field(n)?;
        if field.is_null() {
            return None;
        }
        self.bytes.get(field.start..field.start + field.len)
    }

    pub fn extern_ref(&self, offsets: &RecordOffsets, n: usize) -> Option<ExternRef> {
        if !offsets.field(n)?.is_extern() {
            return None;
        }
        ExternRef::from_bytes(self.field_bytes(offsets, n)?)
    }

    /// Decomposes the record back into field values.
    pub fn field_values(&self, offsets: &RecordOffsets) -> Vec<FieldValue> {
        (0..offsets.n_fields())
            .map(|n| {
                if let Some(ext) = self.extern_ref(offsets, n) {
                    FieldValue::Extern(ext)
                } else {
                    match self.field_bytes(offsets, n) {
                        None => FieldValue::Null,
                        Some(data) => FieldValue::Inline(data.to_vec()),
                    }
                }
            })
            .collect()
    }
}

fn read_be(bytes: Option<&[u8]>) -> u64 {
    bytes
        .unwrap_or_default()
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}
