pub mod codec;
pub mod boundary;
