//! Scan Iterator
//!
//! Pull-based `KvIterator` over an engine scanner. Holds at most one row
//! client-side; the scanner does its own batching.
//!
//! Rows that carry other columns but not the fixed one are skipped. A row
//! with no column values at all ends iteration.

use bytes::Bytes;

use crate::engine::{Column, ResultRow, Scanner};
use crate::error::{Result, SnapError};
use crate::kv::{Key, KvIterator};

/// Iterator adapter around a server-side scanner
///
/// ## Lifecycle
/// - `new` advances once, so `valid()` is meaningful immediately
/// - `close` (or drop) closes the scanner exactly once
pub struct ScanIter<S: Scanner> {
    /// Cleared on close so the scanner is never closed twice
    scanner: Option<S>,

    /// The fixed column values are read from
    column: Column,

    /// Last row fetched, `None` before the first row or past the end
    current: Option<ResultRow>,
}

impl<S: Scanner> ScanIter<S> {
    /// Wrap `scanner` and position on its first row
    pub(crate) fn new(scanner: S, column: Column) -> Result<Self> {
        let mut iter = Self {
            scanner: Some(scanner),
            column,
            current: None,
        };
        iter.advance()?;
        Ok(iter)
    }

    /// Whether the scanner has been released
    pub fn is_closed(&self) -> bool {
        self.scanner.is_none()
    }

    /// Move the current entry out, leaving the iterator invalid until the
    /// next `advance`
    pub(crate) fn take_current(&mut self) -> Option<(Key, Bytes)> {
        if !self.valid() {
            return None;
        }
        let row = self.current.take()?;
        let value = row.value(&self.column)?.clone();
        Some((Key::from(row.row), value))
    }
}

impl<S: Scanner> KvIterator for ScanIter<S> {
    fn advance(&mut self) -> Result<()> {
        let Some(scanner) = self.scanner.as_mut() else {
            self.current = None;
            return Ok(());
        };

        loop {
            match scanner.next() {
                // A row carrying only other columns has no value to yield
                Ok(Some(row)) if !row.is_empty() && row.value(&self.column).is_none() => {
                    tracing::trace!(
                        "Skipping row {} without column {}",
                        Key::from(&row.row[..]),
                        self.column
                    );
                    self.current = Some(row);
                }
                Ok(row) => {
                    self.current = row;
                    return Ok(());
                }
                Err(e) => {
                    let last = self.current.take().map(|row| row.row).unwrap_or_default();
                    return Err(SnapError::engine("advance", last, e));
                }
            }
        }
    }

    /// A row with no columns at all marks the end of data
    fn valid(&self) -> bool {
        let has_value = self.current.as_ref().is_some_and(|row| !row.is_empty());
        let open = self.scanner.as_ref().is_some_and(|s| !s.is_closed());
        has_value && open
    }

    fn key(&self) -> Option<&[u8]> {
        if !self.valid() {
            return None;
        }
        self.current.as_ref().map(|row| row.row.as_slice())
    }

    fn value(&self) -> Option<&[u8]> {
        if !self.valid() {
            return None;
        }
        self.current
            .as_ref()
            .and_then(|row| row.value(&self.column))
            .map(|v| &v[..])
    }

    fn close(&mut self) {
        if let Some(mut scanner) = self.scanner.take() {
            scanner.close();
            tracing::debug!("Scanner closed");
        }
        self.current = None;
    }
}

impl<S: Scanner> Drop for ScanIter<S> {
    fn drop(&mut self) {
        self.close();
    }
}
