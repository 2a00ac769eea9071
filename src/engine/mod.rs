//! Engine Module
//!
//! The transactional wide-column engine this crate reads through.
//!
//! ## Responsibilities (all on the engine side)
//! - Begin transactions and hand out read handles
//! - Resolve the visible cell version for a row/column/time range
//! - Serve server-side scan cursors in batches
//!
//! ## Data Model
//! ```text
//! table ─┬─ row key ─┬─ family:qualifier ─┬─ ts 3 → value
//!        │           │                    └─ ts 1 → value
//!        │           └─ ...
//!        └─ ...
//! ```
//!
//! `memory` holds an in-process implementation of these traits.

pub mod memory;

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::kv::Version;

pub use memory::{MemoryEngine, MemoryScanner, MemoryTxn, MAX_WRITE_VERSION};

/// Result type alias for engine calls
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Failures reported by the engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("transaction conflict: {0}")]
    Conflict(String),

    #[error("transaction already released")]
    Released,

    #[error("scanner already closed")]
    ScannerClosed,

    #[error("engine unavailable: {0}")]
    Unavailable(String),

    #[error("engine IO error: {0}")]
    Io(String),
}

// =============================================================================
// Row / Column / Timestamp Model
// =============================================================================

/// Column identity: a (family, qualifier) pair, rendered as `family:qualifier`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Column {
    pub family: Vec<u8>,
    pub qualifier: Vec<u8>,
}

impl Column {
    pub fn new(family: impl Into<Vec<u8>>, qualifier: impl Into<Vec<u8>>) -> Self {
        Self {
            family: family.into(),
            qualifier: qualifier.into(),
        }
    }

    /// Parse `family:qualifier`; the qualifier may itself contain ':'
    pub fn parse(s: &str) -> Option<Self> {
        let (family, qualifier) = s.split_once(':')?;
        Some(Self::new(family, qualifier))
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.family.escape_ascii(), self.qualifier.escape_ascii())
    }
}

/// One timestamped value of a column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub ts: u64,
    pub value: Bytes,
}

/// A fetched row: its key plus the visible cell of each requested column
///
/// Columns without a visible cell are absent from the map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultRow {
    pub row: Vec<u8>,
    pub columns: HashMap<Column, Cell>,
}

impl ResultRow {
    pub fn new(row: impl Into<Vec<u8>>) -> Self {
        Self {
            row: row.into(),
            columns: HashMap::new(),
        }
    }

    pub fn with_cell(mut self, column: Column, ts: u64, value: impl Into<Bytes>) -> Self {
        self.columns.insert(column, Cell { ts, value: value.into() });
        self
    }

    /// Value of `column`, if the row carries it
    pub fn value(&self, column: &Column) -> Option<&Bytes> {
        self.columns.get(column).map(|cell| &cell.value)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Half-open timestamp window `[from, to)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub from: u64,
    pub to: u64,
}

impl TimeRange {
    pub const ALL: TimeRange = TimeRange { from: 0, to: u64::MAX };

    /// Window covering every version up to and including `ver`
    ///
    /// Saturates at `u64::MAX`, so `Version::MAX` behaves like `ALL`.
    pub fn up_to(ver: Version) -> Self {
        TimeRange {
            from: 0,
            to: ver.ver.saturating_add(1),
        }
    }

    pub fn contains(&self, ts: u64) -> bool {
        ts >= self.from && ts < self.to
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        TimeRange::ALL
    }
}

/// Single-row fetch request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Get {
    pub row: Vec<u8>,
    /// Columns to return; empty means every column
    pub columns: Vec<Column>,
    pub time_range: TimeRange,
}

impl Get {
    pub fn new(row: impl Into<Vec<u8>>) -> Self {
        Self {
            row: row.into(),
            columns: Vec::new(),
            time_range: TimeRange::ALL,
        }
    }

    pub fn add_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn time_range(mut self, range: TimeRange) -> Self {
        self.time_range = range;
        self
    }
}

/// Scanner request over `[start, end)` (`end == None` is unbounded)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    pub start: Vec<u8>,
    pub end: Option<Vec<u8>>,
    /// Rows fetched per round-trip
    pub batch_size: usize,
    pub columns: Vec<Column>,
    pub time_range: TimeRange,
}

impl ScanOptions {
    pub fn new(start: impl Into<Vec<u8>>) -> Self {
        Self {
            start: start.into(),
            end: None,
            batch_size: crate::config::SCAN_BATCH_SIZE,
            columns: Vec::new(),
            time_range: TimeRange::ALL,
        }
    }

    pub fn end(mut self, end: impl Into<Vec<u8>>) -> Self {
        self.end = Some(end.into());
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    pub fn add_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn time_range(mut self, range: TimeRange) -> Self {
        self.time_range = range;
        self
    }
}

// =============================================================================
// Engine Capabilities
// =============================================================================

/// Source of transactions
pub trait TxnEngine {
    type Txn: Transaction;

    /// Begin a transaction reading at the latest committed version
    fn begin(&self) -> EngineResult<Self::Txn>;

    /// Latest committed version
    fn current_version(&self) -> EngineResult<Version>;
}

/// An open transaction handle
pub trait Transaction {
    type Scanner: Scanner;

    /// Fetch one row, `None` when nothing visible matches
    fn get(&self, table: &str, get: &Get) -> EngineResult<Option<ResultRow>>;

    /// Fetch several rows; rows with nothing visible are left out
    fn batch_get(&self, table: &str, gets: &[Get]) -> EngineResult<Vec<ResultRow>>;

    /// Open a server-side cursor
    fn scanner(&self, table: &str, opts: ScanOptions) -> EngineResult<Self::Scanner>;

    fn release(&mut self);
}

/// A server-side scan cursor, consumed one row at a time
pub trait Scanner {
    /// Next row, `None` at end of data
    fn next(&mut self) -> EngineResult<Option<ResultRow>>;

    fn close(&mut self);

    fn is_closed(&self) -> bool;
}
