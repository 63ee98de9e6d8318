pub mod backfill;
pub mod config;
pub mod count;
pub mod filter;
pub mod import;
pub mod lexicon;
pub mod model;
pub mod progress;
