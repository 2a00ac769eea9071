//! # snapkv
//!
//! Snapshot reads for a key-value store layered on a transactional
//! wide-column engine:
//! - Point gets, batch gets and inclusive range gets
//! - Version-pinned ("as of version V") gets and iteration
//! - Pull-based iterators over server-side scan cursors
//!
//! Every stored value lives in one fixed column (`family:qualifier`) of a
//! row keyed by the caller's key; the engine keeps one timestamped cell per
//! committed version. This crate owns none of the transaction machinery, it
//! only translates between the two models.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Caller                              │
//! │        (kv::Snapshot / kv::MvccSnapshot / KvIterator)       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  SnapshotStorage                            │
//! │         (begin transaction → TxnSnapshot)                   │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ TxnSnapshot │─────────▶│  ScanIter   │
//!   │ (get/batch) │          │  (cursor)   │
//!   └──────┬──────┘          └──────┬──────┘
//!          │                        │
//!          ▼                        ▼
//!   ┌─────────────────────────────────────┐
//!   │   engine::Transaction / Scanner     │
//!   │   (external MVCC wide-column store) │
//!   └─────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod kv;
pub mod engine;
pub mod snapshot;
pub mod storage;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, SnapError};
pub use config::Config;
pub use kv::{Key, KvIterator, MvccSnapshot, Snapshot, Version};
pub use snapshot::{ScanIter, TxnSnapshot};
pub use storage::SnapshotStorage;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of snapkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
