//! Personal sake tasting log.
//!
//! Reference data (prefectures, breweries, brands and their flavor charts) is mirrored
//! from the Sakenowa open data API into SQLite by [`sakenowa::Ingestor`]. Users keep one
//! log per sake, and [`App`] exposes the read and write operations a presentation layer
//! needs, including the per-prefecture map payload built by [`services::MapData`].

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod sakenowa;
pub mod services;

pub use app::App;
pub use config::Config;
pub use error::{AppError, FieldErrors, Result};
