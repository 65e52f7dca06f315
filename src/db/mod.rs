mod repository;
mod schema;
pub mod upsert;

pub use repository::{Repository, TableCounts};
