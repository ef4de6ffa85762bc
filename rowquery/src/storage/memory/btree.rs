// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Leaf level of an in-memory B-tree
//!
//! Records are kept in leaf pages ordered by the memcomparable key of their
//! unique prefix. Pages are keyed by their low fence; the leftmost page has
//! the empty fence, so every key is covered by exactly one page. Page fill is
//! accounted in bytes against a fixed capacity.

use crate::error::{DbError, DbResult};
use crate::rem::Record;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Bytes of every page not available to records
pub(crate) const PAGE_OVERHEAD: usize = 120;

/// Directory slot each record costs in addition to its own bytes
const REC_SLOT_SIZE: usize = 2;

fn rec_space(rec: &Record) -> usize {
    rec.size() + REC_SLOT_SIZE
}

#[derive(Debug)]
pub(crate) struct LeafPage {
    pub page_no: u32,
    pub records: BTreeMap<Vec<u8>, Record>,
    pub used: usize,
}

impl LeafPage {
    fn new(page_no: u32) -> Self {
        Self {
            page_no,
            records: BTreeMap::new(),
            used: 0,
        }
    }
}

#[derive(Debug)]
pub(crate) struct IndexTree {
    pages: BTreeMap<Vec<u8>, LeafPage>,
    next_page_no: u32,
    capacity: usize,
    pub splits: u64,
    pub merges: u64,
}

impl IndexTree {
    pub fn new(page_size: usize) -> Self {
        let mut pages = BTreeMap::new();
        pages.insert(Vec::new(), LeafPage::new(1));
        Self {
            pages,
            next_page_no: 2,
            capacity: page_size.saturating_sub(PAGE_OVERHEAD),
            splits: 0,
            merges: 0,
        }
    }

    /// True if a record of `size` bytes may live on a page.
    ///
    /// At least two records must fit on every page.
    pub fn fits_on_page(&self, size: usize) -> bool {
        size + REC_SLOT_SIZE <= self.capacity / 2
    }

    pub fn n_pages(&self) -> usize {
        self.pages.len()
    }

    pub fn n_records(&self) -> usize {
        self.pages.values().map(|p| p.records.len()).sum()
    }

    pub fn records(&self) -> impl Iterator<Item = (&Vec<u8>, &Record)> {
        self.pages.values().flat_map(|p| p.records.iter())
    }

    fn locate(&self, key: &[u8]) -> DbResult<(&Vec<u8>, &LeafPage)> {
        self.pages
            .range::<[u8], _>((Bound::Unbounded, Bound::Included(key)))
            .next_back()
            .ok_or_else(|| DbError::Corruption("no leaf page covers key".to_string()))
    }

    fn locate_mut(&mut self, key: &[u8]) -> DbResult<(Vec<u8>, &mut LeafPage)> {
        self.pages
            .range_mut::<[u8], _>((Bound::Unbounded, Bound::Included(key)))
            .next_back()
            .map(|(fence, page)| (fence.clone(), page))
            .ok_or_else(|| DbError::Corruption("no leaf page covers key".to_string()))
    }

    /// The record stored under `key` and the number of its page
    pub fn get(&self, key: &[u8]) -> DbResult<Option<(&Record, u32)>> {
        let (_, page) = self.locate(key)?;
        Ok(page.records.get(key).map(|rec| (rec, page.page_no)))
    }

    /// First record after `bound`, with its page number
    pub fn next_from(&self, bound: Bound<&[u8]>) -> Option<(Vec<u8>, u32)> {
        let start: &[u8] = match bound {
            Bound::Included(key) | Bound::Excluded(key) => self
                .locate(key)
                .map(|(fence, _)| fence.as_slice())
                .unwrap_or_default(),
            Bound::Unbounded => &[],
        };
        self.pages
            .range::<[u8], _>((Bound::Included(start), Bound::Unbounded))
            .find_map(|(_, page)| {
                page.records
                    .range::<[u8], _>((bound, Bound::Unbounded))
                    .next()
                    .map(|(key, _)| (key.clone(), page.page_no))
            })
    }

    /// Last record before `bound`, with its page number
    pub fn prev_from(&self, bound: Bound<&[u8]>) -> Option<(Vec<u8>, u32)> {
        let pages = match bound {
            Bound::Included(key) | Bound::Excluded(key) => {
                (Bound::Unbounded, Bound::Included(key))
            }
            Bound::Unbounded => (Bound::Unbounded, Bound::Unbounded),
        };
        self.pages
            .range::<[u8], _>(pages)
            .rev()
            .find_map(|(_, page)| {
                page.records
                    .range::<[u8], _>((Bound::Unbounded, bound))
                    .next_back()
                    .map(|(key, _)| (key.clone(), page.page_no))
            })
    }

    /// Inserts a record that is not yet present, splitting pages as needed.
    pub fn insert(&mut self, key: Vec<u8>, rec: Record) -> DbResult<u32> {
        let (fence, page) = self.locate_mut(&key)?;
        page.used += rec_space(&rec);
        if let Some(old) = page.records.insert(key.clone(), rec) {
            page.used -= rec_space(&old);
        }
        self.split_if_needed(fence);
        Ok(self.locate(&key)?.1.page_no)
    }

    /// Checks that the record under `key` can grow or shrink to `new_size`
    /// bytes without reorganizing its page.
    ///
    /// `Overflow` if the page cannot hold it, `Underflow` if the page of a
    /// multi-page tree would drop below half full.
    pub fn check_replace_in_page(&self, key: &[u8], new_size: usize) -> DbResult<()> {
        if !self.fits_on_page(new_size) {
            return Err(DbError::Overflow);
        }
        let (_, page) = self.locate(key)?;
        let old_space = page
            .records
            .get(key)
            .map(rec_space)
            .ok_or(DbError::RecordNotFound)?;

        let new_used = page.used - old_space + new_size + REC_SLOT_SIZE;
        if new_used > self.capacity {
            return Err(DbError::Overflow);
        }
        if self.pages.len() > 1 && new_used < self.capacity / 2 {
            return Err(DbError::Underflow);
        }
        Ok(())
    }

    /// Replaces an existing record on its page without any fill checks.
    pub fn overwrite(&mut self, key: &[u8], rec: Record) -> DbResult<u32> {
        let (_, page) = self.locate_mut(key)?;
        let slot = page.records.get_mut(key).ok_or(DbError::RecordNotFound)?;
        let old_space = rec_space(slot);
        let new_space = rec_space(&rec);
        *slot = rec;
        page.used = page.used - old_space + new_space;
        Ok(page.page_no)
    }

    /// Replaces or inserts a record, then splits or merges pages.
    pub fn replace(&mut self, key: &[u8], rec: Record) -> DbResult<u32> {
        let (fence, page) = self.locate_mut(key)?;
        page.used += rec_space(&rec);
        if let Some(old) = page.records.insert(key.to_vec(), rec) {
            page.used -= rec_space(&old);
        }
        self.split_if_needed(fence.clone());
        let (fence, _) = self.locate(key)?;
        let fence = fence.clone();
        self.merge_if_underfilled(&fence);
        Ok(self.locate(key)?.1.page_no)
    }

    /// Physically removes a record.
    pub fn remove(&mut self, key: &[u8]) -> DbResult<Option<Record>> {
        let (fence, page) = self.locate_mut(key)?;
        let removed = page.records.remove(key);
        if let Some(rec) = &removed {
            page.used -= rec_space(rec);
            self.merge_if_underfilled(&fence);
        }
        Ok(removed)
    }

    fn split_if_needed(&mut self, fence: Vec<u8>) {
        let mut pending = vec![fence];
        while let Some(fence) = pending.pop() {
            let Some(page) = self.pages.get_mut(&fence) else {
                continue;
            };
            if page.used <= self.capacity || page.records.len() < 2 {
                continue;
            }

            // The split key is never the first record, so both halves keep
            // at least one record.
            let half = page.used / 2;
            let mut acc = 0;
            let mut split_key = None;
            for (i, (key, rec)) in page.records.iter().enumerate() {
                if i > 0 && acc >= half {
                    split_key = Some(key.clone());
                    break;
                }
                acc += rec_space(rec);
            }
            let Some(split_key) = split_key.or_else(|| page.records.keys().next_back().cloned())
            else {
                continue;
            };

            let right = page.records.split_off(&split_key);
            let right_used: usize = right.values().map(rec_space).sum();
            page.used -= right_used;

            let page_no = self.next_page_no;
            self.next_page_no += 1;
            self.pages.insert(
                split_key.clone(),
                LeafPage {
                    page_no,
                    records: right,
                    used: right_used,
                },
            );
            self.splits += 1;
            pending.push(fence);
            pending.push(split_key);
        }
    }

    fn merge_if_underfilled(&mut self, fence: &[u8]) {
        if self.pages.len() < 2 {
            return;
        }
        match self.pages.get(fence) {
            Some(page) if page.used < self.capacity / 2 => {}
            _ => return,
        }

        let left = self
            .pages
            .range::<[u8], _>((Bound::Unbounded, Bound::Excluded(fence)))
            .next_back()
            .map(|(key, _)| key.clone());
        let (dst, src) = match left {
            Some(left) => (left, fence.to_vec()),
            None => {
                let right = self
                    .pages
                    .range::<[u8], _>((Bound::Excluded(fence), Bound::Unbounded))
                    .next()
                    .map(|(key, _)| key.clone());
                match right {
                    Some(right) => (fence.to_vec(), right),
                    None => return,
                }
            }
        };

        let used = |fence: &Vec<u8>| self.pages.get(fence).map_or(0, |p| p.used);
        if used(&dst) + used(&src) > self.capacity {
            return;
        }
        let Some(src_page) = self.pages.remove(&src) else {
            return;
        };
        if let Some(dst_page) = self.pages.get_mut(&dst) {
            dst_page.used += src_page.used;
            dst_page.records.extend(src_page.records);
            self.merges += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rem::FieldValue;
    use crate::trx::TrxId;

    fn rec(len: usize) -> Record {
        Record::build(&[FieldValue::Inline(vec![7; len])], TrxId(1), 0)
    }

    fn key(n: u32) -> Vec<u8> {
        n.to_be_bytes().to_vec()
    }

    #[test]
    fn test_inserts_split_pages() {
        let mut tree = IndexTree::new(1024);
        for n in 0..40 {
            tree.insert(key(n), rec(100)).unwrap();
        }
        assert!(tree.n_pages() > 1);
        assert!(tree.splits > 0);
        assert_eq!(tree.n_records(), 40);

        let keys: Vec<_> = tree.records().map(|(k, _)| k.clone()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_cursor_style_search() {
        let mut tree = IndexTree::new(1024);
        for n in (0..40).step_by(2) {
            tree.insert(key(n), rec(100)).unwrap();
        }

        let k5 = key(5);
        let k6 = key(6);
        assert_eq!(tree.next_from(Bound::Included(&k5)).unwrap().0, key(6));
        assert_eq!(tree.next_from(Bound::Excluded(&k6)).unwrap().0, key(8));
        assert_eq!(tree.prev_from(Bound::Included(&k5)).unwrap().0, key(4));
        assert_eq!(tree.prev_from(Bound::Excluded(&k6)).unwrap().0, key(4));
        assert_eq!(tree.next_from(Bound::Unbounded).unwrap().0, key(0));
        assert_eq!(tree.prev_from(Bound::Unbounded).unwrap().0, key(38));
        assert!(tree.next_from(Bound::Excluded(&key(38))).is_none());
    }

    #[test]
    fn test_replace_in_page_signals() {
        let mut tree = IndexTree::new(1024);
        tree.insert(key(1), rec(10)).unwrap();

        assert_eq!(
            tree.check_replace_in_page(&key(1), rec(500).size()),
            Err(DbError::Overflow)
        );
        assert_eq!(
            tree.check_replace_in_page(&key(2), rec(10).size()),
            Err(DbError::RecordNotFound)
        );
        assert!(tree.check_replace_in_page(&key(1), rec(20).size()).is_ok());
        tree.overwrite(&key(1), rec(20)).unwrap();
        assert_eq!(tree.get(&key(1)).unwrap().unwrap().0.size(), rec(20).size());

        for n in 2..30 {
            tree.insert(key(n), rec(100)).unwrap();
        }
        assert!(tree.n_pages() > 1);
        assert_eq!(
            tree.check_replace_in_page(&key(5), rec(1).size()),
            Err(DbError::Underflow)
        );
    }

    #[test]
    fn test_removes_merge_pages() {
        let mut tree = IndexTree::new(1024);
        for n in 0..40 {
            tree.insert(key(n), rec(100)).unwrap();
        }
        let pages = tree.n_pages();
        for n in 0..38 {
            assert!(tree.remove(&key(n)).unwrap().is_some());
        }
        assert!(tree.n_pages() < pages);
        assert!(tree.merges > 0);
        assert_eq!(tree.n_records(), 2);
        assert!(tree.get(&key(39)).unwrap().is_some());
    }

    #[test]
    fn test_replace_grows_and_splits() {
        let mut tree = IndexTree::new(1024);
        for n in 0..7 {
            tree.insert(key(n), rec(100)).unwrap();
        }
        assert_eq!(tree.n_pages(), 1);
        tree.replace(&key(3), rec(400)).unwrap();
        assert!(tree.n_pages() > 1);
        assert_eq!(tree.get(&key(3)).unwrap().unwrap().0.size(), rec(400).size());
    }
}
