pub mod aggregate;
pub mod convert;
pub mod date_selection;
pub mod error;
