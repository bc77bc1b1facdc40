//! Access layer for tuple-oriented operations and paged indexes.
//!
//! This module builds logical data structures out of buffer pool pages:
//!
//! - **TableHeap**: a table spanning a chain of slotted pages
//! - **TableScanner**: lazy sequential iteration over a heap
//! - **LinearProbeHashTable**: a disk-backed open-addressing index
//! - **Tuple** / **Value**: records and typed column values
//!
//! Higher layers work with logical records and keys; the page chains,
//! probe sequences, and latching stay in here.

pub mod hash;
pub mod heap;
pub mod scan;
pub mod tuple;
pub mod value;

pub use hash::LinearProbeHashTable;
pub use heap::TableHeap;
pub use scan::TableScanner;
pub use tuple::{Tuple, TupleId};
pub use value::{DataType, Value, deserialize_values, serialize_values};
