//! Snapshot Storage
//!
//! Entry point that begins engine transactions and hands them out wrapped
//! as snapshots.

use crate::config::Config;
use crate::engine::TxnEngine;
use crate::error::{Result, SnapError};
use crate::kv::{Key, Version};
use crate::snapshot::TxnSnapshot;

/// Snapshot factory over a transactional engine
pub struct SnapshotStorage<E: TxnEngine> {
    engine: E,
    config: Config,
}

impl<E: TxnEngine> SnapshotStorage<E> {
    /// Create storage over `engine`, validating `config` first
    pub fn new(engine: E, config: Config) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            "Snapshot storage on table {} (column {}, scan batch {})",
            config.store_name,
            config.column,
            config.scan_batch_size
        );
        Ok(Self { engine, config })
    }

    /// Snapshot of the latest committed state
    pub fn get_snapshot(&self) -> Result<TxnSnapshot<E::Txn>> {
        let txn = self
            .engine
            .begin()
            .map_err(|e| SnapError::engine("begin", Key::default(), e))?;
        Ok(TxnSnapshot::new(txn, &self.config))
    }

    /// Snapshot used for version-pinned reads
    ///
    /// Same view as `get_snapshot`; the version is chosen per call through
    /// `MvccSnapshot::mvcc_get` / `new_mvcc_iterator`.
    pub fn get_mvcc_snapshot(&self) -> Result<TxnSnapshot<E::Txn>> {
        self.get_snapshot()
    }

    /// Latest committed version
    pub fn current_version(&self) -> Result<Version> {
        self.engine
            .current_version()
            .map_err(|e| SnapError::engine("current_version", Key::default(), e))
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
