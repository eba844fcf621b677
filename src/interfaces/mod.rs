pub mod csv;
pub mod fixtures;
