//! Configuration for snapkv
//!
//! Centralized configuration with sensible defaults. The fixed column and
//! scan batch size are named constants so a multi-schema setup only has to
//! override them here.

use std::path::PathBuf;

use crate::engine::Column;
use crate::error::{Result, SnapError};

// =============================================================================
// Fixed Column Layout
// =============================================================================

/// Column family every value is stored under
pub const DEFAULT_COLUMN_FAMILY: &str = "f";

/// Qualifier every value is stored under
pub const DEFAULT_QUALIFIER: &str = "q";

/// Rows fetched per scanner round-trip for iterators
pub const SCAN_BATCH_SIZE: usize = 1000;

/// Table the snapshots read from unless configured otherwise
pub const DEFAULT_STORE_NAME: &str = "tidb";

/// Main configuration for a snapshot storage instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Table Layout
    // -------------------------------------------------------------------------
    /// Target table name passed to every engine request
    pub store_name: String,

    /// The single (family, qualifier) pair all reads go through
    pub column: Column,

    // -------------------------------------------------------------------------
    // Scanning
    // -------------------------------------------------------------------------
    /// Rows per scanner batch for iterators opened by `new_iterator`
    pub scan_batch_size: usize,

    // -------------------------------------------------------------------------
    // CLI Persistence
    // -------------------------------------------------------------------------
    /// Dump file of the in-memory engine used by the CLI
    pub data_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_name: DEFAULT_STORE_NAME.to_string(),
            column: Column::new(DEFAULT_COLUMN_FAMILY, DEFAULT_QUALIFIER),
            scan_batch_size: SCAN_BATCH_SIZE,
            data_file: PathBuf::from("./snapkv_data.bin"),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check invariants the adapter relies on
    pub fn validate(&self) -> Result<()> {
        if self.store_name.is_empty() {
            return Err(SnapError::Config("store name must not be empty".to_string()));
        }
        if self.column.family.is_empty() || self.column.qualifier.is_empty() {
            return Err(SnapError::Config(format!(
                "column family and qualifier must not be empty, got '{}'",
                self.column
            )));
        }
        if self.scan_batch_size == 0 {
            return Err(SnapError::Config("scan batch size must be positive".to_string()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the target table name
    pub fn store_name(mut self, name: impl Into<String>) -> Self {
        self.config.store_name = name.into();
        self
    }

    /// Set the fixed column
    pub fn column(mut self, column: Column) -> Self {
        self.config.column = column;
        self
    }

    /// Set the iterator scan batch size
    pub fn scan_batch_size(mut self, size: usize) -> Self {
        self.config.scan_batch_size = size;
        self
    }

    /// Set the CLI dump file
    pub fn data_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_file = path.into();
        self
    }

    /// Validate and return the config
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
