//! Record Layer
//!
//! The user-facing surface of the container: [`RecordWriter`] batches
//! records into chunks and writes them (optionally encoding in parallel),
//! [`RecordReader`] reads them back with positioned access and recovery,
//! and [`RecordPosition`] is the 16-byte sortable address of one record.

mod pool;
mod position;
mod reader;
mod writer;

pub use position::{RecordPosition, SERIALIZED_LEN};
pub use reader::{ReaderOptions, RecordReader};
pub use writer::{RecordWriter, WriterOptions};
