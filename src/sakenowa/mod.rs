mod client;
mod ingest;
mod types;

pub use client::SakenowaClient;
pub use ingest::{Ingestor, SyncReport};
pub use types::{Area, Brand, BreweryRecord, FlavorChart};
