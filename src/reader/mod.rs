pub mod batch;

pub use batch::{BatchReadResult, BatchReader, ReadDescriptor};
