pub mod changes;
pub mod engine;
pub mod expression;

pub use changes::{UpdateAction, UpdateSpec};
pub use engine::{derive_index_changes, DerivedChanges, IndexUpdater};
pub use expression::build_update_expression;
