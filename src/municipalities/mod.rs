pub mod error;
pub mod locate;
pub mod municipality;
