pub mod request;
pub mod batch;
pub mod transact;

pub use batch::{BatchWriteResult, BatchWriter, WriteDescriptor};
pub use transact::{plan_transact_write, TransactWriteDescriptor};
