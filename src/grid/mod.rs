pub mod area;
pub mod error;
