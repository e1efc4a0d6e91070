pub mod ast;
pub mod request;
