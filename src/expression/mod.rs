pub mod ast;
pub mod parser;
pub mod mapper;
pub mod reserved;
pub mod compiler;

pub use ast::{Comparator, Condition, KeyPathCondition};
pub use compiler::compile_condition;
pub use mapper::ExpressionContext;
