//! Sequential scan executor.

use crate::access::{TableScanner, Tuple, Value, serialize_values};
use crate::executor::{ColumnInfo, Executor};
use crate::storage::buffer::BufferPoolManager;
use crate::storage::page::PageId;
use anyhow::{Result, bail};

/// Row filter applied as tuples stream out of the scan.
pub type RowPredicate = Box<dyn Fn(&[Value]) -> bool + Send>;

/// Executor for sequential table scans
pub struct SeqScanExecutor {
    buffer_pool: BufferPoolManager,
    first_page_id: Option<PageId>,
    output_schema: Vec<ColumnInfo>,
    predicate: Option<RowPredicate>,
    scanner: Option<TableScanner>,
}

impl SeqScanExecutor {
    pub fn new(
        buffer_pool: BufferPoolManager,
        first_page_id: Option<PageId>,
        output_schema: Vec<ColumnInfo>,
        predicate: Option<RowPredicate>,
    ) -> Self {
        Self {
            buffer_pool,
            first_page_id,
            output_schema,
            predicate,
            scanner: None,
        }
    }
}

impl Executor for SeqScanExecutor {
    fn init(&mut self) -> Result<()> {
        self.scanner = Some(TableScanner::new(
            self.buffer_pool.clone(),
            self.first_page_id,
        ));
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        let Some(scanner) = self.scanner.as_mut() else {
            bail!("Executor not initialized. Call init() first.");
        };

        // Stream until a row passes the predicate (or there are none left).
        for item in scanner {
            let (tuple_id, values) = item?;
            if let Some(predicate) = &self.predicate {
                if !predicate(&values) {
                    continue;
                }
            }
            return Ok(Some(Tuple::new(tuple_id, serialize_values(&values))));
        }

        Ok(None)
    }

    fn output_schema(&self) -> &[ColumnInfo] {
        &self.output_schema
    }
}
