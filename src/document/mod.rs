pub mod builder;
pub mod builders;
pub mod suggest;

pub use builder::{DocumentBuilder, DocumentBuilderRegistry, SourceEntity};
