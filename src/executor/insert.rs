//! Insert executor.

use crate::access::{DataType, LinearProbeHashTable, TableHeap, Tuple, TupleId, Value};
use crate::executor::{ColumnInfo, Executor};
use crate::storage::page::PageId;
use anyhow::{Result, bail};
use std::sync::Arc;

/// Hash index maintained alongside a table: the index and the column
/// (which must be Int32) whose values key it.
pub type KeyedIndex = (Arc<LinearProbeHashTable<i32, TupleId>>, usize);

/// Executor for inserting rows into a table
pub struct InsertExecutor {
    heap: TableHeap,
    schema: Vec<DataType>,
    rows: Vec<Vec<Value>>,
    index: Option<KeyedIndex>,
    output_schema: Vec<ColumnInfo>,
    validated: bool,
    done: bool,
}

impl InsertExecutor {
    pub fn new(
        heap: TableHeap,
        schema: Vec<DataType>,
        rows: Vec<Vec<Value>>,
        index: Option<KeyedIndex>,
    ) -> Self {
        // Output of an INSERT is the affected-row count.
        let output_schema = vec![ColumnInfo::new("count", DataType::Int32)];

        Self {
            heap,
            schema,
            rows,
            index,
            output_schema,
            validated: false,
            done: false,
        }
    }
}

impl Executor for InsertExecutor {
    fn init(&mut self) -> Result<()> {
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != self.schema.len() {
                bail!(
                    "Row {} has {} values but table has {} columns",
                    i,
                    row.len(),
                    self.schema.len()
                );
            }
            for (j, (value, expected)) in row.iter().zip(self.schema.iter()).enumerate() {
                if !value.is_compatible_with(*expected) {
                    bail!(
                        "Row {} column {}: value {:?} is not compatible with type {:?}",
                        i,
                        j,
                        value,
                        expected
                    );
                }
            }
        }

        self.validated = true;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        if !self.validated {
            bail!("Executor not initialized. Call init() first.");
        }
        if self.done {
            return Ok(None);
        }
        self.done = true;

        let mut last_tid = TupleId::new(PageId(0), 0);
        let mut inserted = 0i32;
        for row in std::mem::take(&mut self.rows) {
            let tid = self.heap.insert_values(&row)?;

            if let Some((index, key_column)) = &self.index {
                match row[*key_column] {
                    Value::Int32(key) => {
                        index.insert(&key, &tid)?;
                    }
                    Value::Null => {} // NULL keys are not indexed
                    ref other => bail!("Cannot index non-Int32 value {:?}", other),
                }
            }

            last_tid = tid;
            inserted += 1;
        }

        // Single result row: the affected-row count.
        Ok(Some(Tuple::new(
            last_tid,
            crate::access::serialize_values(&[Value::Int32(inserted)]),
        )))
    }

    fn output_schema(&self) -> &[ColumnInfo] {
        &self.output_schema
    }
}
