//! Ingestion and caching core of the cargo-truck accident dashboard.
//!
//! Source spreadsheets and CSV exports are read ([`read`]), normalized into
//! [`record::AccidentRecord`]s ([`normalize`]), stacked per logical
//! [`dataset::Dataset`] ([`dataset`]) and served through a two-level cache
//! ([`cache`]).

pub mod cache;
pub mod config;
pub mod dataset;
pub mod logging;
pub mod normalize;
pub mod read;
pub mod record;
pub mod summary;

pub use cache::CachedDatasets;
pub use config::Config;
pub use dataset::{Dataset, DatasetLoader, LoadReport};
pub use record::{AccidentRecord, AccidentTable};
