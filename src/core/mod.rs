pub mod types;
pub mod entity;
pub mod config;
pub mod error;
pub mod fqn;
pub mod stats;
