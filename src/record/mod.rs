pub mod wrapper;

pub use wrapper::{unwrap, unwrap_for, wrap, WrappedRecord, TYPE_ATTRIBUTE, VALUE_ATTRIBUTE};
