//! Snapshot Module
//!
//! Adapts an engine transaction to the `kv::Snapshot` / `kv::MvccSnapshot`
//! read interface.
//!
//! ## Responsibilities
//! - Build single-column row requests for each read
//! - Unwrap the fixed column's value from each result row
//! - Pin reads to a version by restricting the timestamp window
//! - Release the transaction exactly once
//!
//! ## Missing Keys
//! `get` and `mvcc_get` turn a missing row (or a row without the fixed
//! column) into `SnapError::NotFound`. `batch_get` and `range_get` just leave
//! such keys out of the result. Iterators step over rows without the fixed
//! column and stop at a row with no column values.
//!
//! ## Range Bounds
//! `range_get` is inclusive of `end`. Scanners stop before their end key, so
//! the scan runs up to `end`'s immediate successor (`end ++ [0x00]`).

mod iter;

pub use iter::ScanIter;

use std::collections::HashMap;

use bytes::Bytes;

use crate::config::Config;
use crate::engine::{Column, Get, ScanOptions, TimeRange, Transaction};
use crate::error::{Result, SnapError};
use crate::kv::{Key, KvIterator, MvccSnapshot, Snapshot, Version};

/// Read view over one engine transaction and one table
pub struct TxnSnapshot<T: Transaction> {
    /// `None` once released
    txn: Option<T>,

    /// Table every request targets
    store_name: String,

    /// The fixed column values live in
    column: Column,

    /// Rows per scanner batch for iterators
    scan_batch_size: usize,
}

impl<T: Transaction> TxnSnapshot<T> {
    /// Wrap an open transaction
    pub fn new(txn: T, config: &Config) -> Self {
        tracing::debug!("Snapshot opened on table {}", config.store_name);
        Self {
            txn: Some(txn),
            store_name: config.store_name.clone(),
            column: config.column.clone(),
            scan_batch_size: config.scan_batch_size,
        }
    }

    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    pub fn column(&self) -> &Column {
        &self.column
    }

    pub fn is_released(&self) -> bool {
        self.txn.is_none()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// The live transaction, or an error if already released
    fn txn(&self, op: &'static str, key: &[u8]) -> Result<&T> {
        self.txn
            .as_ref()
            .ok_or_else(|| SnapError::engine(op, key, crate::engine::EngineError::Released))
    }

    fn new_get(&self, key: &[u8]) -> Get {
        Get::new(key).add_column(self.column.clone())
    }

    /// Fetch one row and unwrap the fixed column
    fn point_get(&self, op: &'static str, key: &[u8], get: Get) -> Result<Bytes> {
        tracing::trace!("{} {}", op, Key::from(key));
        let row = self
            .txn(op, key)?
            .get(&self.store_name, &get)
            .map_err(|e| SnapError::engine(op, key, e))?;

        row.and_then(|row| row.value(&self.column).cloned())
            .ok_or_else(|| SnapError::NotFound { key: Key::from(key) })
    }

    /// Open a forward iterator from `start` to the end of the table
    fn open_iter(
        &self,
        op: &'static str,
        start: &[u8],
        time_range: TimeRange,
    ) -> Result<ScanIter<T::Scanner>> {
        tracing::trace!("{} from {}", op, Key::from(start));
        let opts = ScanOptions::new(start)
            .batch_size(self.scan_batch_size)
            .add_column(self.column.clone())
            .time_range(time_range);
        let scanner = self
            .txn(op, start)?
            .scanner(&self.store_name, opts)
            .map_err(|e| SnapError::engine(op, start, e))?;
        ScanIter::new(scanner, self.column.clone())
    }
}

impl<T: Transaction> Snapshot for TxnSnapshot<T> {
    type Iter = ScanIter<T::Scanner>;

    fn get(&self, key: &[u8]) -> Result<Bytes> {
        self.point_get("get", key, self.new_get(key))
    }

    fn batch_get(&self, keys: &[Key]) -> Result<HashMap<Key, Bytes>> {
        let first = keys.first().map(|k| k.as_bytes()).unwrap_or_default();
        tracing::trace!("batch_get {} keys", keys.len());

        let gets: Vec<Get> = keys.iter().map(|k| self.new_get(k)).collect();
        let rows = self
            .txn("batch_get", first)?
            .batch_get(&self.store_name, &gets)
            .map_err(|e| SnapError::engine("batch_get", first, e))?;

        let mut values = HashMap::with_capacity(rows.len());
        for row in rows {
            if let Some(value) = row.value(&self.column).cloned() {
                values.insert(Key::from(row.row), value);
            }
        }
        Ok(values)
    }

    fn range_get(&self, start: &[u8], end: &[u8], limit: usize) -> Result<HashMap<Key, Bytes>> {
        let mut values = HashMap::new();
        if limit == 0 || start > end {
            return Ok(values);
        }
        tracing::trace!("range_get [{}, {}] limit {}", Key::from(start), Key::from(end), limit);

        let opts = ScanOptions::new(start)
            .end(Key::from(end).successor())
            .batch_size(limit.min(self.scan_batch_size))
            .add_column(self.column.clone());
        let scanner = self
            .txn("range_get", start)?
            .scanner(&self.store_name, opts)
            .map_err(|e| SnapError::engine("range_get", start, e))?;

        // The iterator closes the scanner on drop, including on early return
        let mut iter = ScanIter::new(scanner, self.column.clone())?;
        // An empty row ends the range
        while let Some((key, value)) = iter.take_current() {
            values.insert(key, value);
            if values.len() >= limit {
                break;
            }
            iter.advance()?;
        }
        iter.close();

        Ok(values)
    }

    fn new_iterator(&self, start: &[u8]) -> Result<Self::Iter> {
        self.open_iter("new_iterator", start, TimeRange::ALL)
    }

    fn release(&mut self) {
        if let Some(mut txn) = self.txn.take() {
            txn.release();
            tracing::debug!("Snapshot on table {} released", self.store_name);
        }
    }
}

impl<T: Transaction> MvccSnapshot for TxnSnapshot<T> {
    fn mvcc_get(&self, key: &[u8], ver: Version) -> Result<Bytes> {
        let get = self.new_get(key).time_range(TimeRange::up_to(ver));
        self.point_get("mvcc_get", key, get)
    }

    fn new_mvcc_iterator(&self, key: &[u8], ver: Version) -> Result<Self::Iter> {
        self.open_iter("new_mvcc_iterator", key, TimeRange::up_to(ver))
    }
}

impl<T: Transaction> Drop for TxnSnapshot<T> {
    fn drop(&mut self) {
        self.release();
    }
}
