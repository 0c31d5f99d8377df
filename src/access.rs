//! Access layer for tuple-oriented operations.
//!
//! This module sits on top of the buffer pool and the raw page views:
//!
//! - **Tuple / TupleDesc**: fixed-width record codec and schema
//! - **Value**: tagged field values with promotion-aware comparison
//! - **HeapFile**: unordered tuple storage over bitmap-directory pages
//! - **BTreeFile**: ordered tuple storage over index and leaf pages
//! - **Scan**: iterator adapter over either file kind

pub mod btree;
pub mod heap;
pub mod scan;
pub mod tuple;
pub mod value;

pub use btree::BTreeFile;
pub use heap::HeapFile;
pub use scan::Scan;
pub use tuple::{Tuple, TupleDesc, TupleId};
pub use value::{DataType, Value, CHAR_SIZE, DOUBLE_SIZE, INT_SIZE};
