pub mod lineage;
pub mod results;
