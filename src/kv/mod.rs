//! KV Module
//!
//! Caller-facing read abstractions of the key-value layer.
//!
//! ## Contracts
//! - `get` / `mvcc_get` report a missing key as `SnapError::NotFound`
//! - `batch_get` / `range_get` simply omit missing keys
//! - Iterators come back already positioned on their first row
//! - `release` is idempotent

mod key;

use std::any::Any;
use std::collections::HashMap;

use bytes::Bytes;

use crate::error::{Result, SnapError};

pub use key::{Key, Version};

/// A read view bound to one transaction
pub trait Snapshot {
    type Iter: KvIterator;

    /// Get the value for `key`, or `NotFound`
    fn get(&self, key: &[u8]) -> Result<Bytes>;

    /// Get all `keys` in one round-trip; missing keys are left out
    fn batch_get(&self, keys: &[Key]) -> Result<HashMap<Key, Bytes>>;

    /// Get up to `limit` entries with keys in `[start, end]` (both inclusive)
    fn range_get(&self, start: &[u8], end: &[u8], limit: usize) -> Result<HashMap<Key, Bytes>>;

    /// Iterate forward from `start` to the end of the table
    fn new_iterator(&self, start: &[u8]) -> Result<Self::Iter>;

    /// Release the underlying transaction; later calls are no-ops
    fn release(&mut self);
}

/// A snapshot that can also read as of a past version
pub trait MvccSnapshot: Snapshot {
    /// Get the value visible at `ver`, i.e. the newest write with version <= `ver`
    fn mvcc_get(&self, key: &[u8], ver: Version) -> Result<Bytes>;

    /// Iterate forward from `key` seeing only writes with version <= `ver`
    fn new_mvcc_iterator(&self, key: &[u8], ver: Version) -> Result<Self::Iter>;

    fn mvcc_release(&mut self) {
        self.release();
    }
}

/// Pull-based cursor over `(key, value)` pairs
pub trait KvIterator {
    /// Move to the next row that has a value
    ///
    /// Running off the end is `Ok(())` with `valid() == false`; an engine
    /// failure is returned as an error and also leaves the iterator invalid.
    fn advance(&mut self) -> Result<()>;

    fn valid(&self) -> bool;

    /// Current key, `None` unless `valid()`
    fn key(&self) -> Option<&[u8]>;

    /// Current value, `None` unless `valid()`
    fn value(&self) -> Option<&[u8]>;

    /// Release the underlying cursor; later calls are no-ops
    fn close(&mut self);
}

/// Interpret a dynamically typed iterator parameter as a start key
///
/// Accepts `Key`, `Vec<u8>`, `&[u8]`, `String` and `&str`. Anything else is a
/// caller bug and is rejected with `InvalidArgument`.
pub fn iter_param(param: &dyn Any) -> Result<Key> {
    if let Some(key) = param.downcast_ref::<Key>() {
        return Ok(key.clone());
    }
    if let Some(bytes) = param.downcast_ref::<Vec<u8>>() {
        return Ok(Key::from(bytes.as_slice()));
    }
    if let Some(bytes) = param.downcast_ref::<&[u8]>() {
        return Ok(Key::from(*bytes));
    }
    if let Some(s) = param.downcast_ref::<String>() {
        return Ok(Key::from(s.as_str()));
    }
    if let Some(s) = param.downcast_ref::<&str>() {
        return Ok(Key::from(*s));
    }

    tracing::error!("iterator parameter is not a byte-sequence key");
    Err(SnapError::InvalidArgument(
        "iterator start parameter must be a byte-sequence key".to_string(),
    ))
}
