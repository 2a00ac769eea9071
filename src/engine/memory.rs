//! In-memory engine
//!
//! A process-local implementation of the engine traits, used by tests,
//! benchmarks and the CLI. Writes are applied directly with a fresh
//! timestamp; there is no locking protocol or conflict detection.
//!
//! ## Visibility
//! A transaction reads at the version current when it began. A cell is
//! visible if its timestamp is <= that version and inside the request's
//! time range; the newest such cell wins. Deletes are tombstone cells.
//!
//! ## Concurrency
//! - `data`: parking_lot RwLock (many concurrent readers, exclusive writer)
//! - open transaction/scanner counts: atomics, checked by tests for leaks

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::ops::Bound;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SnapError};
use crate::kv::Version;

use super::{
    Cell, Column, EngineError, EngineResult, Get, ResultRow, ScanOptions, Scanner, TimeRange,
    Transaction, TxnEngine,
};

/// Highest version a cell can be written at
///
/// Read windows are half-open, so a cell at `u64::MAX` could never be seen.
pub const MAX_WRITE_VERSION: Version = Version::new(u64::MAX - 1);

/// ts → value, `None` marks a delete
type Versions = BTreeMap<u64, Option<Bytes>>;
type Row = BTreeMap<Column, Versions>;
type Table = BTreeMap<Vec<u8>, Row>;

#[derive(Default)]
struct Tables {
    tables: HashMap<String, Table>,
    latest_ts: u64,
}

struct Shared {
    data: RwLock<Tables>,
    open_txns: AtomicUsize,
    open_scanners: AtomicUsize,
    fail_reads: AtomicBool,
    /// Scanners fail once they have yielded this many rows (`usize::MAX` = never)
    fail_scan_after: AtomicUsize,
}

impl Shared {
    fn check_reads(&self) -> EngineResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(EngineError::Unavailable("injected read failure".to_string()));
        }
        Ok(())
    }
}

/// Shared handle to an in-memory multi-version table store
///
/// Cloning is cheap; all clones see the same data.
#[derive(Clone)]
pub struct MemoryEngine {
    shared: Arc<Shared>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::from_tables(Tables::default())
    }

    fn from_tables(tables: Tables) -> Self {
        Self {
            shared: Arc::new(Shared {
                data: RwLock::new(tables),
                open_txns: AtomicUsize::new(0),
                open_scanners: AtomicUsize::new(0),
                fail_reads: AtomicBool::new(false),
                fail_scan_after: AtomicUsize::new(usize::MAX),
            }),
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Write `value` at the next version and return that version
    pub fn put(
        &self,
        table: &str,
        row: &[u8],
        column: &Column,
        value: impl Into<Bytes>,
    ) -> Result<Version> {
        self.write_next("put", table, row, column, Some(value.into()))
    }

    /// Write a delete marker at the next version and return that version
    pub fn delete(&self, table: &str, row: &[u8], column: &Column) -> Result<Version> {
        self.write_next("delete", table, row, column, None)
    }

    /// Write `value` at an explicit version
    ///
    /// Version 0 is reserved for "nothing visible" and versions above
    /// `MAX_WRITE_VERSION` fall outside every read window; both are rejected.
    pub fn put_at(
        &self,
        table: &str,
        row: &[u8],
        column: &Column,
        ver: Version,
        value: impl Into<Bytes>,
    ) -> Result<()> {
        if ver.ver == 0 || ver > MAX_WRITE_VERSION {
            return Err(SnapError::InvalidArgument(format!(
                "version {} cannot be written, expected 1..={}",
                ver.ver, MAX_WRITE_VERSION.ver
            )));
        }
        let mut data = self.shared.data.write();
        data.latest_ts = data.latest_ts.max(ver.ver);
        Self::insert_cell(&mut data, table, row, column, ver.ver, Some(value.into()));
        Ok(())
    }

    fn write_next(
        &self,
        op: &'static str,
        table: &str,
        row: &[u8],
        column: &Column,
        value: Option<Bytes>,
    ) -> Result<Version> {
        let mut data = self.shared.data.write();
        let ts = data
            .latest_ts
            .checked_add(1)
            .filter(|&ts| ts <= MAX_WRITE_VERSION.ver)
            .ok_or_else(|| {
                SnapError::engine(
                    op,
                    row,
                    EngineError::Unavailable("version space exhausted".to_string()),
                )
            })?;
        data.latest_ts = ts;
        Self::insert_cell(&mut data, table, row, column, ts, value);
        Ok(Version::new(ts))
    }

    fn insert_cell(
        data: &mut Tables,
        table: &str,
        row: &[u8],
        column: &Column,
        ts: u64,
        value: Option<Bytes>,
    ) {
        data.tables
            .entry(table.to_string())
            .or_default()
            .entry(row.to_vec())
            .or_default()
            .entry(column.clone())
            .or_default()
            .insert(ts, value);
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Resume reading at an explicit version instead of the latest one
    pub fn begin_at(&self, ver: Version) -> MemoryTxn {
        self.shared.open_txns.fetch_add(1, Ordering::SeqCst);
        MemoryTxn {
            shared: Arc::clone(&self.shared),
            read_ts: ver.ver,
            released: false,
        }
    }

    // =========================================================================
    // Fault Injection & Accounting (for tests)
    // =========================================================================

    /// Make every read (get, batch get, scanner open and next) fail
    pub fn set_fail_reads(&self, fail: bool) {
        self.shared.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make scanners fail after yielding `rows` rows; `None` disables
    pub fn fail_scans_after(&self, rows: Option<usize>) {
        self.shared
            .fail_scan_after
            .store(rows.unwrap_or(usize::MAX), Ordering::SeqCst);
    }

    /// Transactions begun but not yet released
    pub fn open_transactions(&self) -> usize {
        self.shared.open_txns.load(Ordering::SeqCst)
    }

    /// Scanners opened but not yet closed
    pub fn open_scanners(&self) -> usize {
        self.shared.open_scanners.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Write every cell to `path` in bincode format
    ///
    /// Writes to a temporary sibling first and renames it into place.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dump = {
            let data = self.shared.data.read();
            let mut cells = Vec::new();
            for (table, rows) in &data.tables {
                for (row, columns) in rows {
                    for (column, versions) in columns {
                        for (&ts, value) in versions {
                            cells.push(DumpCell {
                                table: table.clone(),
                                row: row.clone(),
                                column: column.clone(),
                                ts,
                                value: value.as_ref().map(|v| v.to_vec()),
                            });
                        }
                    }
                }
            }
            Dump {
                latest_ts: data.latest_ts,
                cells,
            }
        };

        let tmp_path = path.with_extension("tmp");
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        bincode::serialize_into(&mut writer, &dump)?;
        writer.flush()?;
        fs::rename(&tmp_path, path)?;

        tracing::debug!("Saved {} cells to {}", dump.cells.len(), path.display());
        Ok(())
    }

    /// Load an engine saved with [`save`](Self::save); a missing file gives an empty engine
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let reader = BufReader::new(File::open(path)?);
        let dump: Dump = bincode::deserialize_from(reader)?;

        let mut tables = Tables {
            tables: HashMap::new(),
            latest_ts: dump.latest_ts,
        };
        for cell in &dump.cells {
            if cell.ts == 0 || cell.ts > MAX_WRITE_VERSION.ver {
                return Err(SnapError::Serialization(format!(
                    "cell version {} is outside the writable range",
                    cell.ts
                )));
            }
            if cell.ts > dump.latest_ts {
                return Err(SnapError::Serialization(format!(
                    "cell version {} exceeds recorded latest version {}",
                    cell.ts, dump.latest_ts
                )));
            }
            Self::insert_cell(
                &mut tables,
                &cell.table,
                &cell.row,
                &cell.column,
                cell.ts,
                cell.value.clone().map(Bytes::from),
            );
        }

        tracing::debug!("Loaded {} cells from {}", dump.cells.len(), path.display());
        Ok(Self::from_tables(tables))
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TxnEngine for MemoryEngine {
    type Txn = MemoryTxn;

    fn begin(&self) -> EngineResult<MemoryTxn> {
        let ver = self.current_version()?;
        Ok(self.begin_at(ver))
    }

    fn current_version(&self) -> EngineResult<Version> {
        Ok(Version::new(self.shared.data.read().latest_ts))
    }
}

#[derive(Serialize, Deserialize)]
struct Dump {
    latest_ts: u64,
    cells: Vec<DumpCell>,
}

#[derive(Serialize, Deserialize)]
struct DumpCell {
    table: String,
    row: Vec<u8>,
    column: Column,
    ts: u64,
    value: Option<Vec<u8>>,
}

// =============================================================================
// Visibility
// =============================================================================

/// Build the visible projection of `row`, or `None` if nothing is visible
fn visible_row(
    key: &[u8],
    row: &Row,
    columns: &[Column],
    range: TimeRange,
    read_ts: u64,
) -> Option<ResultRow> {
    let upper = read_ts.min(range.to.checked_sub(1)?);
    if range.from > upper {
        return None;
    }

    let mut result = ResultRow::new(key);
    for (column, versions) in row {
        if !columns.is_empty() && !columns.contains(column) {
            continue;
        }
        // Newest cell in the window; a delete marker hides the column
        if let Some((&ts, Some(value))) = versions.range(range.from..=upper).next_back() {
            result.columns.insert(
                column.clone(),
                Cell {
                    ts,
                    value: value.clone(),
                },
            );
        }
    }

    if result.is_empty() {
        None
    } else {
        Some(result)
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// Read handle pinned to the version current at `begin`
pub struct MemoryTxn {
    shared: Arc<Shared>,
    read_ts: u64,
    released: bool,
}

impl MemoryTxn {
    /// Version this transaction reads at
    pub fn read_version(&self) -> Version {
        Version::new(self.read_ts)
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    fn check(&self) -> EngineResult<()> {
        if self.released {
            return Err(EngineError::Released);
        }
        self.shared.check_reads()
    }
}

impl Transaction for MemoryTxn {
    type Scanner = MemoryScanner;

    fn get(&self, table: &str, get: &Get) -> EngineResult<Option<ResultRow>> {
        self.check()?;
        let data = self.shared.data.read();
        Ok(data
            .tables
            .get(table)
            .and_then(|rows| rows.get(&get.row))
            .and_then(|row| visible_row(&get.row, row, &get.columns, get.time_range, self.read_ts)))
    }

    fn batch_get(&self, table: &str, gets: &[Get]) -> EngineResult<Vec<ResultRow>> {
        self.check()?;
        let data = self.shared.data.read();
        let Some(rows) = data.tables.get(table) else {
            return Ok(Vec::new());
        };
        Ok(gets
            .iter()
            .filter_map(|get| {
                rows.get(&get.row).and_then(|row| {
                    visible_row(&get.row, row, &get.columns, get.time_range, self.read_ts)
                })
            })
            .collect())
    }

    fn scanner(&self, table: &str, opts: ScanOptions) -> EngineResult<MemoryScanner> {
        self.check()?;
        self.shared.open_scanners.fetch_add(1, Ordering::SeqCst);
        let resume = Bound::Included(opts.start.clone());
        Ok(MemoryScanner {
            shared: Arc::clone(&self.shared),
            table: table.to_string(),
            opts,
            read_ts: self.read_ts,
            resume,
            buffer: VecDeque::new(),
            exhausted: false,
            closed: false,
            yielded: 0,
        })
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.shared.open_txns.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for MemoryTxn {
    fn drop(&mut self) {
        self.release();
    }
}

// =============================================================================
// Scanner
// =============================================================================

/// Cursor that fetches `batch_size` visible rows per round-trip
pub struct MemoryScanner {
    shared: Arc<Shared>,
    table: String,
    opts: ScanOptions,
    read_ts: u64,
    /// Lower bound of the next batch
    resume: Bound<Vec<u8>>,
    buffer: VecDeque<ResultRow>,
    exhausted: bool,
    closed: bool,
    yielded: usize,
}

impl MemoryScanner {
    fn fill(&mut self) {
        let data = self.shared.data.read();
        let Some(rows) = data.tables.get(&self.table) else {
            self.exhausted = true;
            return;
        };

        let upper = match &self.opts.end {
            Some(end) => Bound::Excluded(end.clone()),
            None => Bound::Unbounded,
        };
        if range_is_empty(&self.resume, &upper) {
            self.exhausted = true;
            return;
        }

        let mut last = None;
        let mut reached_end = true;
        for (key, row) in rows.range::<Vec<u8>, _>((self.resume.clone(), upper)) {
            if self.buffer.len() >= self.opts.batch_size {
                reached_end = false;
                break;
            }
            last = Some(key);
            if let Some(visible) =
                visible_row(key, row, &self.opts.columns, self.opts.time_range, self.read_ts)
            {
                self.buffer.push_back(visible);
            }
        }

        if let Some(key) = last {
            self.resume = Bound::Excluded(key.clone());
        }
        self.exhausted = reached_end;
    }
}

/// BTreeMap::range panics on inverted bounds, so check first
fn range_is_empty(lower: &Bound<Vec<u8>>, upper: &Bound<Vec<u8>>) -> bool {
    match (lower, upper) {
        (Bound::Included(l), Bound::Excluded(u)) | (Bound::Excluded(l), Bound::Excluded(u)) => {
            l >= u
        }
        _ => false,
    }
}

impl Scanner for MemoryScanner {
    fn next(&mut self) -> EngineResult<Option<ResultRow>> {
        if self.closed {
            return Err(EngineError::ScannerClosed);
        }
        self.shared.check_reads()?;
        if self.yielded >= self.shared.fail_scan_after.load(Ordering::SeqCst) {
            return Err(EngineError::Unavailable("injected scan failure".to_string()));
        }

        if self.buffer.is_empty() && !self.exhausted {
            self.fill();
        }

        match self.buffer.pop_front() {
            Some(row) => {
                self.yielded += 1;
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.buffer.clear();
            self.shared.open_scanners.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for MemoryScanner {
    fn drop(&mut self) {
        self.close();
    }
}
