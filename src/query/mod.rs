pub mod ast;
pub mod matcher;
pub mod planner;

pub use ast::{AdjacencyResult, ChildQuery, Cursor, FindOptions, FindQuery, FindResult, SortDirection};
