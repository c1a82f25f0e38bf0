pub mod key_path;
pub mod layout;
pub mod collection;
pub mod registry;
