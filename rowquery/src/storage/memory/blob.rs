// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Off-page storage for fields too large to stay on a leaf page

use crate::error::{DbError, DbResult};
use crate::rem::ExternRef;
use std::collections::HashMap;

#[derive(Debug)]
pub(crate) struct BlobStore {
    blobs: HashMap<u64, Vec<u8>>,
    next_id: u64,
}

impl Default for BlobStore {
    fn default() -> Self {
        Self {
            blobs: HashMap::new(),
            next_id: 1,
        }
    }
}

impl BlobStore {
    /// Reserves an id and builds the reference for `data` without storing it.
    pub fn reserve(&mut self, data: &[u8]) -> ExternRef {
        let blob_id = self.next_id;
        self.next_id += 1;
        ExternRef {
            blob_id,
            len: data.len() as u64,
            checksum: crc32fast::hash(data),
        }
    }

    pub fn put(&mut self, ext: &ExternRef, data: Vec<u8>) -> DbResult<()> {
        if data.len() as u64 != ext.len || crc32fast::hash(&data) != ext.checksum {
            return Err(DbError::Corruption(format!(
                "blob {} does not match its reference",
                ext.blob_id
            )));
        }
        self.blobs.insert(ext.blob_id, data);
        Ok(())
    }

    pub fn get(&self, ext: &ExternRef) -> DbResult<Vec<u8>> {
        let data = self
            .blobs
            .get(&ext.blob_id)
            .ok_or_else(|| DbError::Corruption(format!("missing blob {}", ext.blob_id)))?;
        if data.len() as u64 != ext.len {
            return Err(DbError::Corruption(format!(
                "blob {} has {} bytes, reference says {}",
                ext.blob_id,
                data.len(),
                ext.len
            )));
        }
        if crc32fast::hash(data) != ext.checksum {
            return Err(DbError::Corruption(format!(
                "checksum mismatch in blob {}",
                ext.blob_id
            )));
        }
        Ok(data.clone())
    }

    pub fn remove(&mut self, blob_id: u64) {
        self.blobs.remove(&blob_id);
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    #[cfg(test)]
    fn corrupt(&mut self, blob_id: u64) {
        if let Some(data) = self.blobs.get_mut(&blob_id) {
            if let Some(byte) = data.first_mut() {
                *byte ^= 0xFF;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_fetch() {
        let mut store = BlobStore::default();
        let data = vec![3u8; 5000];
        let ext = store.reserve(&data);
        store.put(&ext, data.clone()).unwrap();
        assert_eq!(store.get(&ext).unwrap(), data);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_checksum_mismatch_is_corruption() {
        let mut store = BlobStore::default();
        let data = b"posting list".to_vec();
        let ext = store.reserve(&data);
        store.put(&ext, data).unwrap();
        store.corrupt(ext.blob_id);
        assert!(matches!(store.get(&ext), Err(DbError::Corruption(_))));
    }

    #[test]
    fn test_missing_blob() {
        let mut store = BlobStore::default();
        let ext = store.reserve(b"never written");
        assert!(store.get(&ext).is_err());
        assert!(store.put(&ext, b"other".to_vec()).is_err());
    }
}
