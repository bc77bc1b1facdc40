//! Executor layer for query execution.
//!
//! Volcano-style iterators over the access layer: each executor produces
//! tuples one at a time through `next()`, so results stream instead of
//! materializing.

pub mod insert;
pub mod seq_scan;

pub use insert::InsertExecutor;
pub use seq_scan::SeqScanExecutor;

use crate::access::{DataType, Tuple};
use anyhow::Result;

/// Trait for all query executors
pub trait Executor: Send {
    /// Initialize the executor. This must be called before `next()`.
    fn init(&mut self) -> Result<()>;

    /// Get the next tuple, or None when the executor is exhausted.
    fn next(&mut self) -> Result<Option<Tuple>>;

    /// Get the output schema of this executor
    fn output_schema(&self) -> &[ColumnInfo];
}

/// Information about a column in the output schema
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: DataType,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}
