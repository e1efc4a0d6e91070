pub mod batch;
pub mod repository;

pub use batch::BulkBuffer;
pub use repository::SearchRepository;
