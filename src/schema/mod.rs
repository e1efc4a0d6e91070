pub mod mapping;
pub mod registry;
